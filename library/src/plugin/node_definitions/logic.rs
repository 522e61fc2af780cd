use std::cmp::Ordering;

use super::{inp, node, numbered_inputs};
use crate::error::ExecError;
use crate::evaluation::context::EvalContext;
use crate::evaluation::executor::InputFetcher;
use crate::model::connection::PinDataType;
use crate::model::node::NodeId;
use crate::model::parameter::ParameterMap;
use crate::model::value::Value;
use crate::plugin::behavior::{advanced, deferred, immediate};
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};

pub(super) fn logic_nodes() -> Vec<NodeTypeDefinition> {
    use PinDataType::*;
    let nc = NodeCategory::Logic;
    vec![
        node("logic.switch", "Switch", nc, || advanced(switch))
            .with_description("Pulls only the branch selected by the condition")
            .with_inputs(vec![
                inp("condition", "Condition", Boolean),
                inp("true_val", "True", Any),
                inp("false_val", "False", Any),
            ]),
        node("logic.first_valid", "First Valid", nc, || deferred(first_valid))
            .with_description("First input that is not none; later inputs are not pulled")
            .with_inputs(numbered_inputs("value", "Value", 4)),
        node("logic.compare", "Compare", nc, || immediate(compare))
            .with_description("Compare A and B with `op` (==, !=, <, <=, >, >=)")
            .with_inputs(vec![inp("a", "A", Any), inp("b", "B", Any)])
            .with_parameters(ParameterMap::new().with("op", "==")),
        node("logic.any", "Any", nc, || deferred(any))
            .with_description("True once a connected input is truthy")
            .with_inputs(numbered_inputs("value", "Value", 4)),
        node("logic.all", "All", nc, || deferred(all))
            .with_description("False once a connected input is falsy")
            .with_inputs(numbered_inputs("value", "Value", 4)),
        node("logic.assert", "Assert", nc, || immediate(assert_condition))
            .with_description("Passes the value through, fails with `message` when the condition is false")
            .with_inputs(vec![
                inp("value", "Value", Any),
                inp("condition", "Condition", Boolean),
            ])
            .with_parameters(ParameterMap::new().with("message", "assertion failed")),
    ]
}

fn switch(node: NodeId, _: &ParameterMap, context: &mut EvalContext) -> Result<Value, ExecError> {
    let condition = context.fetch_input(node, 0)?;
    let (taken, skipped) = if condition.is_truthy() { (1, 2) } else { (2, 1) };
    context.ignore_input(node, skipped);
    context.fetch_input(node, taken)
}

fn first_valid(inputs: &mut InputFetcher<'_>, _: &ParameterMap) -> Result<Value, ExecError> {
    let count = inputs.len();
    for slot in 0..count {
        let value = inputs.fetch(slot)?;
        if !value.is_none() {
            for rest in slot + 1..count {
                inputs.ignore(rest);
            }
            return Ok(value);
        }
    }
    Ok(Value::None)
}

/// Pull connected inputs in order until one is truthy (`want == true`) or
/// falsy (`want == false`); the rest are ignored.
fn short_circuit(inputs: &mut InputFetcher<'_>, want: bool) -> Result<bool, ExecError> {
    let count = inputs.len();
    for slot in 0..count {
        if !inputs.is_connected(slot) {
            continue;
        }
        if inputs.fetch(slot)?.is_truthy() == want {
            for rest in slot + 1..count {
                inputs.ignore(rest);
            }
            return Ok(true);
        }
    }
    Ok(false)
}

fn any(inputs: &mut InputFetcher<'_>, _: &ParameterMap) -> Result<Value, ExecError> {
    Ok(Value::Boolean(short_circuit(inputs, true)?))
}

fn all(inputs: &mut InputFetcher<'_>, _: &ParameterMap) -> Result<Value, ExecError> {
    Ok(Value::Boolean(!short_circuit(inputs, false)?))
}

fn compare(inputs: &[Value], parameters: &ParameterMap) -> Result<Value, ExecError> {
    let op = parameters.get_string("op").unwrap_or_else(|| "==".to_string());
    let (a, b) = (&inputs[0], &inputs[1]);

    let ordering = match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => match (a, b) {
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            _ => None,
        },
    };

    let result = match op.as_str() {
        "==" => ordering.map_or(a == b, |o| o == Ordering::Equal),
        "!=" => ordering.map_or(a != b, |o| o != Ordering::Equal),
        "<" | "<=" | ">" | ">=" => {
            let ordering = ordering.ok_or_else(|| {
                ExecError::source(format!(
                    "cannot order {} and {}",
                    a.type_name(),
                    b.type_name()
                ))
            })?;
            match op.as_str() {
                "<" => ordering == Ordering::Less,
                "<=" => ordering != Ordering::Greater,
                ">" => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }
        }
        other => return Err(ExecError::source(format!("unknown comparison '{}'", other))),
    };
    Ok(Value::Boolean(result))
}

fn assert_condition(inputs: &[Value], parameters: &ParameterMap) -> Result<Value, ExecError> {
    if inputs[1].is_truthy() {
        Ok(inputs[0].clone())
    } else {
        let message = parameters
            .get_string("message")
            .unwrap_or_else(|| "assertion failed".to_string());
        Err(ExecError::source(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(op: &str) -> ParameterMap {
        ParameterMap::new().with("op", op)
    }

    #[test]
    fn test_compare_mixed_numbers() {
        let inputs = [Value::Integer(2), Value::from(2.0)];
        assert_eq!(compare(&inputs, &op("==")).unwrap(), Value::Boolean(true));
        assert_eq!(compare(&inputs, &op("<=")).unwrap(), Value::Boolean(true));
        assert_eq!(compare(&inputs, &op(">")).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_compare_rejects_unordered_types() {
        let inputs = [Value::Integer(1), Value::List(vec![])];
        assert!(compare(&inputs, &op("<")).unwrap_err().is_source());
        assert_eq!(compare(&inputs, &op("!=")).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_assert_raises_source_error() {
        let params = ParameterMap::new().with("message", "negative input");
        let err = assert_condition(&[Value::Integer(1), Value::Boolean(false)], &params).unwrap_err();
        assert_eq!(err, ExecError::source("negative input"));
    }
}
