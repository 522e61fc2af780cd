use super::{expect_list, inp, node};
use crate::error::ExecError;
use crate::model::connection::PinDataType;
use crate::model::parameter::ParameterMap;
use crate::model::value::Value;
use crate::plugin::behavior::immediate;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};

pub(super) fn text_nodes() -> Vec<NodeTypeDefinition> {
    let nc = NodeCategory::Text;
    vec![
        node("text.split", "Split", nc, || immediate(split))
            .with_description("Split text by `separator` (\\n and \\t escapes allowed)")
            .with_inputs(vec![inp("text", "Text", PinDataType::String)])
            .with_parameters(ParameterMap::new().with("separator", ",")),
        node("text.join", "Join", nc, || immediate(join))
            .with_description("Join list items with `separator`")
            .with_inputs(vec![inp("list", "List", PinDataType::List)])
            .with_parameters(ParameterMap::new().with("separator", ",")),
    ]
}

fn separator(parameters: &ParameterMap) -> String {
    parameters
        .get_string("separator")
        .unwrap_or_else(|| ",".to_string())
        .replace("\\n", "\n")
        .replace("\\t", "\t")
}

fn split(inputs: &[Value], parameters: &ParameterMap) -> Result<Value, ExecError> {
    let text = inputs[0].as_str().ok_or_else(|| {
        ExecError::source(format!("split expects a string, got {}", inputs[0].type_name()))
    })?;
    let separator = separator(parameters);
    if separator.is_empty() {
        return Err(ExecError::source("split separator must not be empty"));
    }
    Ok(Value::List(
        text.split(separator.as_str()).map(Value::from).collect(),
    ))
}

fn join(inputs: &[Value], parameters: &ParameterMap) -> Result<Value, ExecError> {
    let list = expect_list(&inputs[0], "join")?;
    let parts: Vec<String> = list.iter().map(|item| item.to_string()).collect();
    Ok(Value::String(parts.join(&separator(parameters))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_with_escaped_newline() {
        let params = ParameterMap::new().with("separator", "\\n");
        let result = split(&[Value::from("a\nb")], &params).unwrap();
        assert_eq!(result, Value::List(vec![Value::from("a"), Value::from("b")]));
    }

    #[test]
    fn test_join_formats_items() {
        let list = Value::List(vec![Value::Integer(1), Value::from("x")]);
        let params = ParameterMap::new().with("separator", "-");
        assert_eq!(join(&[list], &params).unwrap(), Value::from("1-x"));
    }
}
