//! Executes model-requested tool calls against the task store.
//!
//! Every result is a JSON string handed back to the model as the tool's
//! output. Failures are error-shaped results, never Rust errors: a bad tool
//! call must not abort its siblings or the chat turn. The owner id flows
//! into every store call; the store API has no unscoped path.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{CREATE_TASK, DELETE_TASK, UPDATE_TASK};
use crate::tasks::{NewTask, TaskPatch, TaskPriority, TaskStatus, TaskStore};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateTaskArgs {
    title: String,
    description: Option<String>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    due_date: Option<NaiveDate>,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateTaskArgs {
    task_id: Uuid,
    title: Option<String>,
    description: Option<String>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    due_date: Option<NaiveDate>,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteTaskArgs {
    task_id: Uuid,
}

fn error_result(message: impl std::fmt::Display) -> String {
    json!({"error": message.to_string()}).to_string()
}

/// Run one tool call for `owner` and serialize its outcome.
pub async fn execute_tool_call(
    store: &dyn TaskStore,
    owner: Uuid,
    name: &str,
    raw_args: &str,
) -> String {
    tracing::info!(tool = name, "executing tool call");
    match name {
        CREATE_TASK => create_task(store, owner, raw_args).await,
        UPDATE_TASK => update_task(store, owner, raw_args).await,
        DELETE_TASK => delete_task(store, owner, raw_args).await,
        _ => error_result("Unknown function"),
    }
}

async fn create_task(store: &dyn TaskStore, owner: Uuid, raw_args: &str) -> String {
    let args: CreateTaskArgs = match serde_json::from_str(raw_args) {
        Ok(args) => args,
        Err(e) => return error_result(format!("invalid create_task arguments: {e}")),
    };
    let new = NewTask {
        title: args.title,
        description: args.description,
        status: args.status.unwrap_or(TaskStatus::Todo),
        priority: args.priority.unwrap_or(TaskPriority::Medium),
        due_date: args.due_date,
        tags: args.tags,
        time_estimate: None,
        position: 0,
    };
    match store.insert(owner, new).await {
        Ok(task) => json!({"success": true, "task": task}).to_string(),
        Err(e) => error_result(e),
    }
}

async fn update_task(store: &dyn TaskStore, owner: Uuid, raw_args: &str) -> String {
    let args: UpdateTaskArgs = match serde_json::from_str(raw_args) {
        Ok(args) => args,
        Err(e) => return error_result(format!("invalid update_task arguments: {e}")),
    };
    let patch = TaskPatch {
        title: args.title,
        description: args.description,
        status: args.status,
        priority: args.priority,
        due_date: args.due_date,
        tags: args.tags,
        time_estimate: None,
        position: None,
    };
    match store.update(owner, args.task_id, patch).await {
        Ok(Some(task)) => json!({"success": true, "task": task}).to_string(),
        Ok(None) => error_result("task not found"),
        Err(e) => error_result(e),
    }
}

async fn delete_task(store: &dyn TaskStore, owner: Uuid, raw_args: &str) -> String {
    let args: DeleteTaskArgs = match serde_json::from_str(raw_args) {
        Ok(args) => args,
        Err(e) => return error_result(format!("invalid delete_task arguments: {e}")),
    };
    match store.delete(owner, args.task_id).await {
        Ok(_) => json!({"success": true}).to_string(),
        Err(e) => error_result(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::MemoryTaskStore;
    use serde_json::Value;

    fn parse(result: &str) -> Value {
        serde_json::from_str(result).unwrap()
    }

    #[tokio::test]
    async fn test_create_task_with_high_priority() {
        let store = MemoryTaskStore::new();
        let owner = Uuid::new_v4();

        let result = execute_tool_call(
            &store,
            owner,
            "create_task",
            r#"{"title": "Review homepage design", "priority": "high"}"#,
        )
        .await;

        let value = parse(&result);
        assert_eq!(value["success"], true);
        assert_eq!(value["task"]["priority"], "high");
        assert_eq!(value["task"]["status"], "todo");

        let tasks = store.list(owner).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Review homepage design");
        assert_eq!(tasks[0].user_id, owner);
    }

    #[tokio::test]
    async fn test_update_task_moves_status() {
        let store = MemoryTaskStore::new();
        let owner = Uuid::new_v4();
        let task = store.insert(owner, NewTask::new("ship it")).await.unwrap();

        let args = format!(r#"{{"task_id": "{}", "status": "done"}}"#, task.id);
        let result = execute_tool_call(&store, owner, "update_task", &args).await;

        let value = parse(&result);
        assert_eq!(value["success"], true);
        assert_eq!(value["task"]["status"], "done");
    }

    #[tokio::test]
    async fn test_update_foreign_task_reports_not_found() {
        let store = MemoryTaskStore::new();
        let alice = Uuid::new_v4();
        let mallory = Uuid::new_v4();
        let task = store.insert(alice, NewTask::new("private")).await.unwrap();

        let args = format!(r#"{{"task_id": "{}", "title": "stolen"}}"#, task.id);
        let result = execute_tool_call(&store, mallory, "update_task", &args).await;

        assert_eq!(parse(&result)["error"], "task not found");
        assert_eq!(store.list(alice).await.unwrap()[0].title, "private");
    }

    #[tokio::test]
    async fn test_delete_foreign_task_affects_zero_rows() {
        let store = MemoryTaskStore::new();
        let alice = Uuid::new_v4();
        let mallory = Uuid::new_v4();
        let task = store.insert(alice, NewTask::new("private")).await.unwrap();

        let args = format!(r#"{{"task_id": "{}"}}"#, task.id);
        let result = execute_tool_call(&store, mallory, "delete_task", &args).await;

        // Matches the backend's delete semantics: no row matched, no error.
        assert_eq!(parse(&result)["success"], true);
        assert_eq!(store.list(alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_properties_rejected() {
        let store = MemoryTaskStore::new();
        let owner = Uuid::new_v4();

        let result = execute_tool_call(
            &store,
            owner,
            "create_task",
            r#"{"title": "x", "owner": "someone-else"}"#,
        )
        .await;

        let value = parse(&result);
        assert!(value["error"].as_str().unwrap().contains("create_task"));
        assert!(store.list(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_arguments_do_not_panic() {
        let store = MemoryTaskStore::new();
        let owner = Uuid::new_v4();

        let result = execute_tool_call(&store, owner, "delete_task", "not json").await;
        assert!(parse(&result)["error"].is_string());

        let result =
            execute_tool_call(&store, owner, "delete_task", r#"{"task_id": "not-a-uuid"}"#).await;
        assert!(parse(&result)["error"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_tool_name() {
        let store = MemoryTaskStore::new();
        let result = execute_tool_call(&store, Uuid::new_v4(), "drop_table", "{}").await;
        assert_eq!(parse(&result)["error"], "Unknown function");
    }

    #[tokio::test]
    async fn test_empty_update_surfaces_error_result() {
        let store = MemoryTaskStore::new();
        let owner = Uuid::new_v4();
        let task = store.insert(owner, NewTask::new("t")).await.unwrap();

        let args = format!(r#"{{"task_id": "{}"}}"#, task.id);
        let result = execute_tool_call(&store, owner, "update_task", &args).await;
        assert!(parse(&result)["error"]
            .as_str()
            .unwrap()
            .contains("at least one field"));
    }
}
