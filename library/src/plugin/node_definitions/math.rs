use super::{expect_list, expect_number, inp, node};
use crate::error::ExecError;
use crate::model::connection::PinDataType;
use crate::model::parameter::ParameterMap;
use crate::model::value::Value;
use crate::plugin::behavior::immediate;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};

pub(super) fn math_nodes() -> Vec<NodeTypeDefinition> {
    use PinDataType::*;
    let nc = NodeCategory::Math;
    let ab = || vec![inp("a", "A", Number), inp("b", "B", Number)];
    vec![
        node("math.add", "Add", nc, || immediate(add)).with_inputs(ab()),
        node("math.subtract", "Subtract", nc, || immediate(subtract)).with_inputs(ab()),
        node("math.multiply", "Multiply", nc, || immediate(multiply)).with_inputs(ab()),
        node("math.divide", "Divide", nc, || immediate(divide)).with_inputs(ab()),
        node("math.scale", "Scale", nc, || immediate(scale))
            .with_description("Multiply the input by the `factor` parameter")
            .with_inputs(vec![inp("value", "Value", Number)])
            .with_parameters(ParameterMap::new().with("factor", 2)),
        node("math.sum", "Sum", nc, || immediate(sum))
            .with_description("Sum of a list of numbers")
            .with_inputs(vec![inp("list", "List", List)]),
    ]
}

/// Integers stay integers (overflow is an error); anything else is f64.
fn arithmetic(
    name: &str,
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, ExecError> {
    if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
        return int_op(*x, *y)
            .map(Value::Integer)
            .ok_or_else(|| ExecError::source(format!("{} overflowed", name)));
    }
    let x = expect_number(a, name)?;
    let y = expect_number(b, name)?;
    Ok(Value::from(float_op(x, y)))
}

fn add(inputs: &[Value], _: &ParameterMap) -> Result<Value, ExecError> {
    arithmetic("add", &inputs[0], &inputs[1], i64::checked_add, |x, y| x + y)
}

fn subtract(inputs: &[Value], _: &ParameterMap) -> Result<Value, ExecError> {
    arithmetic("subtract", &inputs[0], &inputs[1], i64::checked_sub, |x, y| x - y)
}

fn multiply(inputs: &[Value], _: &ParameterMap) -> Result<Value, ExecError> {
    arithmetic("multiply", &inputs[0], &inputs[1], i64::checked_mul, |x, y| x * y)
}

fn divide(inputs: &[Value], _: &ParameterMap) -> Result<Value, ExecError> {
    let x = expect_number(&inputs[0], "divide")?;
    let y = expect_number(&inputs[1], "divide")?;
    if y == 0.0 {
        return Err(ExecError::source("division by zero"));
    }
    Ok(Value::from(x / y))
}

fn scale(inputs: &[Value], parameters: &ParameterMap) -> Result<Value, ExecError> {
    let factor = parameters.get("factor").cloned().unwrap_or(Value::Integer(1));
    arithmetic("scale", &inputs[0], &factor, i64::checked_mul, |x, y| x * y)
}

fn sum(inputs: &[Value], _: &ParameterMap) -> Result<Value, ExecError> {
    let list = expect_list(&inputs[0], "sum")?;
    list.iter()
        .try_fold(Value::Integer(0), |total, item| {
            arithmetic("sum", &total, item, i64::checked_add, |x, y| x + y)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        let params = ParameterMap::new();
        assert_eq!(
            add(&[Value::Integer(10), Value::Integer(3)], &params).unwrap(),
            Value::Integer(13)
        );
        assert_eq!(
            add(&[Value::Integer(1), Value::from(0.5)], &params).unwrap(),
            Value::from(1.5)
        );
    }

    #[test]
    fn test_unconnected_input_is_a_source_error() {
        let err = multiply(&[Value::Integer(2), Value::None], &ParameterMap::new()).unwrap_err();
        assert!(err.is_source());
        assert!(err.message().contains("none"));
    }

    #[test]
    fn test_sum_mixed_list() {
        let list = Value::List(vec![Value::Integer(1), Value::from(2.5), Value::Integer(3)]);
        assert_eq!(sum(&[list], &ParameterMap::new()).unwrap(), Value::from(6.5));
    }

    #[test]
    fn test_divide_by_zero() {
        let err = divide(&[Value::Integer(1), Value::Integer(0)], &ParameterMap::new()).unwrap_err();
        assert_eq!(err, ExecError::source("division by zero"));
    }
}
