use serde_json::json;

use crate::agent::prompt::{FAVORITE_FOOD_TOOL_DESCRIPTION, food_found_fact, food_unknown_fact};
use crate::capability::CapabilityResult;
use crate::llm::provider::{ToolCallRequest, ToolDeclaration};

pub const FAVORITE_FOOD_TOOL: &str = "get_favorite_food";

pub fn tool_declarations() -> Vec<ToolDeclaration> {
    vec![ToolDeclaration {
        name: FAVORITE_FOOD_TOOL.to_string(),
        description: FAVORITE_FOOD_TOOL_DESCRIPTION.to_string(),
        parameters_json_schema: json!({
            "type": "object",
            "properties": {
                "person": {
                    "type": "string",
                    "description": "Name of the person"
                }
            },
            "required": ["person"]
        }),
    }]
}

/// What the session should do with one requested tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCallPlan {
    Lookup { person: String },
    Rejected { reason: String },
}

pub fn plan_call(call: &ToolCallRequest) -> ToolCallPlan {
    if call.name != FAVORITE_FOOD_TOOL {
        return ToolCallPlan::Rejected {
            reason: format!("unknown function: {}", call.name),
        };
    }

    // Some models send the arguments object as an encoded string.
    let args = match &call.args_json {
        serde_json::Value::String(encoded) => {
            serde_json::from_str(encoded).unwrap_or(serde_json::Value::Null)
        }
        other => other.clone(),
    };

    match args
        .get("person")
        .and_then(|value| value.as_str())
        .map(str::trim)
    {
        Some(person) if !person.is_empty() => ToolCallPlan::Lookup {
            person: person.to_string(),
        },
        _ => ToolCallPlan::Rejected {
            reason: format!("{FAVORITE_FOOD_TOOL} requires a non-empty person argument"),
        },
    }
}

/// Text of the tool turn answering `plan`. Anything but a found food reads as unknown.
pub fn tool_turn_text(plan: &ToolCallPlan, result: Option<&CapabilityResult>) -> String {
    match (plan, result) {
        (ToolCallPlan::Lookup { person }, Some(CapabilityResult::Found(food))) => {
            food_found_fact(person, food)
        }
        (ToolCallPlan::Lookup { person }, _) => food_unknown_fact(person),
        (ToolCallPlan::Rejected { reason }, _) => {
            format!("The call could not be served ({reason}); the requested information is unknown.")
        }
    }
}
