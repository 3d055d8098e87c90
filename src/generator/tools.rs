//! Tool-call fabrication.
//!
//! Arguments are fabricated from each function's JSON-schema `properties`;
//! required parameters are always present, optional ones join on a coin
//! flip. The reported token count is the word count of the generated
//! argument payloads, matching what the emitter sends.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{random, text};
use crate::types::{FunctionCall, Tool, ToolCall, ToolChoiceMode};

const WORDS: &[&str] = &[
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliett",
];

/// Create tool calls for a chat request.
///
/// Returns `Ok(None)` when an `auto` tool choice randomly opts out, in which
/// case the caller falls back to text generation. `required` always yields
/// at least one call.
pub fn create_tool_calls(
    tools: &[Tool],
    choice: ToolChoiceMode,
) -> Result<Option<(Vec<ToolCall>, usize)>, String> {
    if choice == ToolChoiceMode::Auto && !random::flip_coin() {
        return Ok(None);
    }

    let count = random::random_range(1, tools.len());
    let mut calls = Vec::with_capacity(count);
    let mut completion_tokens = 0;
    for tool in tools.iter().take(count) {
        let arguments = generate_arguments(tool.function.parameters.as_ref());
        let arguments = serde_json::to_string(&arguments).map_err(|e| e.to_string())?;
        completion_tokens += text::token_count(&arguments);
        calls.push(ToolCall {
            id: format!("chatcmpl-tool-{}", Uuid::new_v4()),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: tool.function.name.clone(),
                arguments,
            },
        });
    }
    Ok(Some((calls, completion_tokens)))
}

/// Fabricate an argument object from a function's parameter schema.
fn generate_arguments(parameters: Option<&Value>) -> Value {
    let Some(schema) = parameters else {
        return json!({});
    };
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return json!({});
    };

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut arguments = Map::new();
    for (name, property) in properties {
        if required.contains(&name.as_str()) || random::flip_coin() {
            arguments.insert(name.clone(), value_for_schema(property));
        }
    }
    Value::Object(arguments)
}

fn value_for_schema(schema: &Value) -> Value {
    if let Some(options) = schema.get("enum").and_then(Value::as_array) {
        if !options.is_empty() {
            return options[random::random_index(options.len())].clone();
        }
    }

    match schema.get("type").and_then(Value::as_str) {
        Some("string") => json!(WORDS[random::random_index(WORDS.len())]),
        Some("integer") => json!(random::random_range(1, 100) as i64),
        Some("number") => json!(random::random_range(1, 100) as f64),
        Some("boolean") => json!(random::flip_coin()),
        Some("array") => match schema.get("items") {
            Some(items) => json!([value_for_schema(items)]),
            None => json!([]),
        },
        Some("object") => generate_arguments(Some(schema)),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_tool() -> Tool {
        serde_json::from_value(json!({
            "type": "function",
            "function": {
                "name": "get_weather",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "location": {"type": "string"},
                        "unit": {"type": "string", "enum": ["celsius", "fahrenheit"]},
                        "days": {"type": "integer"}
                    },
                    "required": ["location"]
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_required_produces_valid_arguments() {
        for _ in 0..20 {
            let (calls, tokens) =
                create_tool_calls(&[weather_tool()], ToolChoiceMode::Required)
                    .unwrap()
                    .expect("required must produce calls");

            assert_eq!(calls.len(), 1);
            let call = &calls[0];
            assert!(call.id.starts_with("chatcmpl-tool-"));
            assert_eq!(call.call_type, "function");
            assert_eq!(call.function.name, "get_weather");

            let args: Value = serde_json::from_str(&call.function.arguments).unwrap();
            assert!(args["location"].is_string());
            if let Some(unit) = args.get("unit") {
                assert!(unit == "celsius" || unit == "fahrenheit");
            }
            assert_eq!(tokens, text::token_count(&call.function.arguments));
        }
    }

    #[test]
    fn test_auto_sometimes_skips() {
        let mut produced = false;
        let mut skipped = false;
        for _ in 0..100 {
            match create_tool_calls(&[weather_tool()], ToolChoiceMode::Auto).unwrap() {
                Some(_) => produced = true,
                None => skipped = true,
            }
            if produced && skipped {
                return;
            }
        }
        panic!("auto tool choice never varied across 100 draws");
    }

    #[test]
    fn test_missing_parameters_yield_empty_object() {
        let tool: Tool = serde_json::from_value(json!({
            "type": "function",
            "function": {"name": "ping"}
        }))
        .unwrap();

        let (calls, tokens) = create_tool_calls(&[tool], ToolChoiceMode::Required)
            .unwrap()
            .unwrap();
        assert_eq!(calls[0].function.arguments, "{}");
        assert_eq!(tokens, 1);
    }
}
