//! The board-mutating tools exposed to the model.
//!
//! Three tools, fixed schemas, strict validation: unknown properties are
//! rejected at execution time.

mod executor;

pub use executor::execute_tool_call;

use serde_json::{json, Value};

pub const CREATE_TASK: &str = "create_task";
pub const UPDATE_TASK: &str = "update_task";
pub const DELETE_TASK: &str = "delete_task";

/// The tool array sent with every decision request.
pub fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": CREATE_TASK,
                "description": "Create a new task on the user's Kanban board",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "Task title"},
                        "description": {"type": "string", "description": "Task description"},
                        "status": {
                            "type": "string",
                            "enum": ["todo", "in_progress", "done"],
                            "description": "Task status column"
                        },
                        "priority": {
                            "type": "string",
                            "enum": ["low", "medium", "high"],
                            "description": "Task priority"
                        },
                        "due_date": {"type": "string", "description": "Due date in YYYY-MM-DD format"},
                        "tags": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Tags for the task"
                        }
                    },
                    "required": ["title"],
                    "additionalProperties": false
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": UPDATE_TASK,
                "description": "Update an existing task. Use the task title or context to find the right task ID from the user's tasks list.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "task_id": {"type": "string", "description": "The UUID of the task to update"},
                        "title": {"type": "string"},
                        "description": {"type": "string"},
                        "status": {"type": "string", "enum": ["todo", "in_progress", "done"]},
                        "priority": {"type": "string", "enum": ["low", "medium", "high"]},
                        "due_date": {"type": "string"},
                        "tags": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["task_id"],
                    "additionalProperties": false
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": DELETE_TASK,
                "description": "Delete a task from the user's board",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "task_id": {"type": "string", "description": "The UUID of the task to delete"}
                    },
                    "required": ["task_id"],
                    "additionalProperties": false
                }
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_strict_tools() {
        let tools = tool_definitions();
        assert_eq!(tools.len(), 3);
        for tool in &tools {
            assert_eq!(tool["type"], "function");
            assert_eq!(
                tool["function"]["parameters"]["additionalProperties"],
                false
            );
        }
        assert_eq!(tools[0]["function"]["name"], CREATE_TASK);
        assert_eq!(tools[1]["function"]["name"], UPDATE_TASK);
        assert_eq!(tools[2]["function"]["name"], DELETE_TASK);
    }

    #[test]
    fn test_required_fields() {
        let tools = tool_definitions();
        assert_eq!(tools[0]["function"]["parameters"]["required"][0], "title");
        assert_eq!(tools[1]["function"]["parameters"]["required"][0], "task_id");
        assert_eq!(tools[2]["function"]["parameters"]["required"][0], "task_id");
    }
}
