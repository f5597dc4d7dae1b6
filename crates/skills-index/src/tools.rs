//! Named-operation dispatch for tool-invocation hosts.
//!
//! A host sends an operation name and a JSON argument object and gets back
//! a JSON value: the operation's result, or `{"error": "..."}`.

use serde::Serialize;
use serde_json::{json, Value};

use crate::models::{BatchRequest, ErrorPayload};
use crate::service::SkillService;

/// Description of one callable operation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Every operation a host can call.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_documents",
            description: "List all available skills with their descriptions, tags, and sub-skills.",
            parameters: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: "get_document",
            description: "Load a skill's primary document.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Skill name"}
                },
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: "get_sub_unit",
            description: "Load one sub-skill of a skill.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "document": {"type": "string", "description": "Skill name"},
                    "sub_unit": {"type": "string", "description": "Sub-skill name"}
                },
                "required": ["document", "sub_unit"]
            }),
        },
        ToolDefinition {
            name: "get_documents_batch",
            description: "Load several skills or sub-skills in one call.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "requests": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "document": {"type": "string"},
                                "sub_unit": {"type": "string"}
                            },
                            "required": ["document"]
                        }
                    }
                },
                "required": ["requests"]
            }),
        },
        ToolDefinition {
            name: "search_metadata",
            description: "Search skill names, descriptions, tags, and sub-skill triggers.",
            parameters: search_parameters(5),
        },
        ToolDefinition {
            name: "search_content",
            description: "Full-text search across all skill documents, with snippets.",
            parameters: search_parameters(10),
        },
        ToolDefinition {
            name: "reload",
            description: "Rebuild the skill index from disk immediately.",
            parameters: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: "get_usage_stats",
            description: "Report operation counts, skill loads, and recent queries.",
            parameters: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: "validate_all",
            description: "Validate every skill directory and report errors and warnings.",
            parameters: json!({"type": "object", "properties": {}}),
        },
    ]
}

fn search_parameters(default_limit: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {"type": "string", "description": "Search query"},
            "limit": {
                "type": "integer",
                "description": format!("Maximum number of results (default: {})", default_limit)
            }
        },
        "required": ["query"]
    })
}

/// Run `tool` with `args`. Never fails; failures become an error payload.
pub fn call(service: &SkillService, tool: &str, args: &Value) -> Value {
    match dispatch(service, tool, args) {
        Ok(value) => value,
        Err(e) => to_json(&e),
    }
}

fn dispatch(service: &SkillService, tool: &str, args: &Value) -> Result<Value, ErrorPayload> {
    let value = match tool {
        "list_documents" => to_json(&service.list_documents()),
        "get_document" => {
            let name = required_str(args, "name")?;
            to_json(&service.get_document(name)?)
        }
        "get_sub_unit" => {
            let document = required_str(args, "document")?;
            let sub_unit = required_str(args, "sub_unit")?;
            to_json(&service.get_sub_unit(document, sub_unit)?)
        }
        "get_documents_batch" => {
            let requests = args
                .get("requests")
                .ok_or_else(|| ErrorPayload::new("Missing 'requests' parameter"))?;
            let requests: Vec<BatchRequest> = serde_json::from_value(requests.clone())
                .map_err(|e| ErrorPayload::new(format!("Invalid 'requests' parameter: {}", e)))?;
            to_json(&service.get_documents_batch(&requests))
        }
        "search_metadata" => {
            let query = required_str(args, "query")?;
            to_json(&service.search_metadata(query, optional_limit(args)))
        }
        "search_content" => {
            let query = required_str(args, "query")?;
            to_json(&service.search_content(query, optional_limit(args)))
        }
        "reload" => to_json(&service.reload()?),
        "get_usage_stats" => to_json(&service.get_usage_stats()),
        "validate_all" => to_json(&service.validate_all()),
        other => return Err(ErrorPayload::new(format!("Unknown tool '{}'", other))),
    };
    Ok(value)
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ErrorPayload> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ErrorPayload::new(format!("Missing '{}' parameter", key)))
}

fn optional_limit(args: &Value) -> Option<usize> {
    args.get("limit")
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| json!({"error": format!("Failed to encode result: {}", e)}))
}
