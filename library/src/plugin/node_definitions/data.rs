use super::{expect_list, inp, node, numbered_inputs};
use crate::error::ExecError;
use crate::model::connection::PinDataType;
use crate::model::parameter::ParameterMap;
use crate::model::value::Value;
use crate::plugin::behavior::immediate;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};

pub(super) fn data_nodes() -> Vec<NodeTypeDefinition> {
    use PinDataType::*;
    let nc = NodeCategory::Data;
    vec![
        node("data.constant", "Constant", nc, || immediate(constant))
            .with_description("Outputs its `value` parameter")
            .with_parameters(ParameterMap::new().with("value", 0)),
        node("data.make_list", "Make List", nc, || immediate(make_list))
            .with_description("Collect the connected inputs into a list")
            .with_inputs(numbered_inputs("item", "Item", 4)),
        node("data.list_length", "List Length", nc, || immediate(list_length))
            .with_inputs(vec![inp("list", "List", List)]),
        node("data.get_list_item", "Get List Item", nc, || immediate(get_list_item))
            .with_description("Negative indices count from the end")
            .with_inputs(vec![inp("list", "List", List), inp("index", "Index", Integer)]),
        node("data.range", "Range", nc, || immediate(range))
            .with_description("Integers from `start` up to (excluding) the input, by `step`")
            .with_inputs(vec![inp("stop", "Stop", Integer)])
            .with_parameters(ParameterMap::new().with("start", 0).with("step", 1)),
        node("data.to_string", "To String", nc, || immediate(to_string))
            .with_inputs(vec![inp("value", "Value", Any)]),
    ]
}

fn constant(_: &[Value], parameters: &ParameterMap) -> Result<Value, ExecError> {
    Ok(parameters.get("value").cloned().unwrap_or_default())
}

fn make_list(inputs: &[Value], _: &ParameterMap) -> Result<Value, ExecError> {
    Ok(Value::List(
        inputs.iter().filter(|v| !v.is_none()).cloned().collect(),
    ))
}

fn list_length(inputs: &[Value], _: &ParameterMap) -> Result<Value, ExecError> {
    let list = expect_list(&inputs[0], "list_length")?;
    Ok(Value::Integer(list.len() as i64))
}

fn get_list_item(inputs: &[Value], _: &ParameterMap) -> Result<Value, ExecError> {
    let list = expect_list(&inputs[0], "get_list_item")?;
    let index = inputs[1]
        .as_i64()
        .ok_or_else(|| ExecError::source("get_list_item expects an integer index"))?;
    let resolved = if index < 0 {
        list.len() as i64 + index
    } else {
        index
    };
    if resolved < 0 || resolved >= list.len() as i64 {
        return Err(ExecError::source(format!(
            "index {} out of range for a list of {}",
            index,
            list.len()
        )));
    }
    Ok(list[resolved as usize].clone())
}

/// Longest list `data.range` produces.
const MAX_RANGE_LEN: usize = 1_000_000;

fn range(inputs: &[Value], parameters: &ParameterMap) -> Result<Value, ExecError> {
    let stop = inputs[0]
        .as_i64()
        .ok_or_else(|| ExecError::source("range expects an integer stop"))?;
    let start = parameters.get_i64("start").unwrap_or(0);
    let step = parameters.get_i64("step").unwrap_or(1);
    if step == 0 {
        return Err(ExecError::source("range step must not be zero"));
    }

    let span = i128::from(stop) - i128::from(start);
    let step_wide = i128::from(step);
    let len = if span.signum() == step_wide.signum() {
        (span + step_wide - step_wide.signum()) / step_wide
    } else {
        0
    };
    if len > MAX_RANGE_LEN as i128 {
        return Err(ExecError::source(format!(
            "range of {} items exceeds the limit of {}",
            len, MAX_RANGE_LEN
        )));
    }

    let mut items = Vec::with_capacity(len as usize);
    let mut current = Some(start);
    while let Some(value) = current {
        if !((step > 0 && value < stop) || (step < 0 && value > stop)) {
            break;
        }
        items.push(Value::Integer(value));
        current = value.checked_add(step);
    }
    Ok(Value::List(items))
}

fn to_string(inputs: &[Value], _: &ParameterMap) -> Result<Value, ExecError> {
    Ok(Value::String(inputs[0].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_list_item_negative_index() {
        let list = Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        let params = ParameterMap::new();
        assert_eq!(
            get_list_item(&[list.clone(), Value::Integer(-1)], &params).unwrap(),
            Value::Integer(3)
        );
        assert!(get_list_item(&[list, Value::Integer(3)], &params).unwrap_err().is_source());
    }

    #[test]
    fn test_range_with_step() {
        let params = ParameterMap::new().with("start", 1).with("step", 2);
        assert_eq!(
            range(&[Value::Integer(6)], &params).unwrap(),
            Value::List(vec![Value::Integer(1), Value::Integer(3), Value::Integer(5)])
        );
        let zero = ParameterMap::new().with("step", 0);
        assert!(range(&[Value::Integer(6)], &zero).is_err());
    }

    #[test]
    fn test_range_stops_at_integer_limit() {
        let params = ParameterMap::new().with("start", i64::MAX - 1).with("step", 2);
        assert_eq!(
            range(&[Value::Integer(i64::MAX)], &params).unwrap(),
            Value::List(vec![Value::Integer(i64::MAX - 1)])
        );
        let down = ParameterMap::new().with("start", i64::MIN + 1).with("step", -3);
        assert_eq!(
            range(&[Value::Integer(i64::MIN)], &down).unwrap(),
            Value::List(vec![Value::Integer(i64::MIN + 1)])
        );
    }

    #[test]
    fn test_range_rejects_huge_lengths() {
        let params = ParameterMap::new();
        let err = range(&[Value::Integer(i64::MAX)], &params).unwrap_err();
        assert!(err.is_source());
        let limit = MAX_RANGE_LEN as i64;
        assert!(range(&[Value::Integer(limit)], &params).is_ok());
        assert!(range(&[Value::Integer(limit + 1)], &params).is_err());
    }

    #[test]
    fn test_range_in_wrong_direction_is_empty() {
        let params = ParameterMap::new().with("start", 5);
        assert_eq!(range(&[Value::Integer(1)], &params).unwrap(), Value::List(vec![]));
    }
}
