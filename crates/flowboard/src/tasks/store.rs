//! Owner-scoped persistence for task rows.
//!
//! Every operation takes the owning user's id; there is no unscoped mutation
//! API. The relay executes tools with elevated database credentials that
//! bypass the backend's row-level security, so the owner predicate carried by
//! each statement here is the isolation boundary.

use super::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, QueryBuilder};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("update_task requires at least one field to change")]
    EmptyUpdate,

    #[error("invalid stored value: {0}")]
    Decode(String),
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks owned by `owner`, ordered by board position.
    async fn list(&self, owner: Uuid) -> Result<Vec<Task>, StoreError>;

    async fn insert(&self, owner: Uuid, new: NewTask) -> Result<Task, StoreError>;

    /// Applies `patch` to the task if it exists and is owned by `owner`.
    /// Returns `None` when no row matched.
    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: TaskPatch,
    ) -> Result<Option<Task>, StoreError>;

    /// Returns whether a row was actually removed. Deleting a missing or
    /// foreign row is not an error; it simply affects zero rows.
    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError>;
}

/// Postgres-backed store used by the relay with service credentials.
#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn list(&self, owner: Uuid) -> Result<Vec<Task>, StoreError> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM tasks WHERE user_id = $1 ORDER BY position")
                .bind(owner)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    async fn insert(&self, owner: Uuid, new: NewTask) -> Result<Task, StoreError> {
        let row: TaskRow = sqlx::query_as(
            r#"
            INSERT INTO tasks (
                id, user_id, title, description, status, priority,
                due_date, tags, time_estimate, position, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.status.as_str())
        .bind(new.priority.as_str())
        .bind(new.due_date)
        .bind(&new.tags)
        .bind(new.time_estimate)
        .bind(new.position)
        .fetch_one(&self.pool)
        .await?;
        row.into_task()
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        if patch.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }

        let mut query = QueryBuilder::<sqlx::Postgres>::new("UPDATE tasks SET updated_at = now()");
        if let Some(title) = &patch.title {
            query.push(", title = ").push_bind(title);
        }
        if let Some(description) = &patch.description {
            query.push(", description = ").push_bind(description);
        }
        if let Some(status) = patch.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(priority) = patch.priority {
            query.push(", priority = ").push_bind(priority.as_str());
        }
        if let Some(due_date) = patch.due_date {
            query.push(", due_date = ").push_bind(due_date);
        }
        if let Some(tags) = &patch.tags {
            query.push(", tags = ").push_bind(tags);
        }
        if let Some(time_estimate) = patch.time_estimate {
            query.push(", time_estimate = ").push_bind(time_estimate);
        }
        if let Some(position) = patch.position {
            query.push(", position = ").push_bind(position);
        }
        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(owner)
            .push(" RETURNING *");

        let row: Option<TaskRow> = query.build_query_as().fetch_optional(&self.pool).await?;
        row.map(TaskRow::into_task).transpose()
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    due_date: Option<NaiveDate>,
    tags: Option<Vec<String>>,
    time_estimate: Option<i32>,
    position: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_task(self) -> Result<Task, StoreError> {
        let status = TaskStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Decode(format!("status '{}'", self.status)))?;
        let priority = TaskPriority::parse(&self.priority)
            .ok_or_else(|| StoreError::Decode(format!("priority '{}'", self.priority)))?;
        Ok(Task {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            status,
            priority,
            due_date: self.due_date,
            tags: self.tags,
            time_estimate: self.time_estimate,
            position: self.position,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn list(&self, owner: Uuid) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.read().await;
        let mut owned: Vec<Task> = tasks
            .values()
            .filter(|t| t.user_id == owner)
            .cloned()
            .collect();
        owned.sort_by_key(|t| t.position);
        Ok(owned)
    }

    async fn insert(&self, owner: Uuid, new: NewTask) -> Result<Task, StoreError> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            user_id: owner,
            title: new.title,
            description: new.description,
            status: new.status,
            priority: new.priority,
            due_date: new.due_date,
            tags: new.tags,
            time_estimate: new.time_estimate,
            position: new.position,
            created_at: now,
            updated_at: now,
        };
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        if patch.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(&id).filter(|t| t.user_id == owner) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(tags) = patch.tags {
            task.tags = Some(tags);
        }
        if let Some(time_estimate) = patch.time_estimate {
            task.time_estimate = Some(time_estimate);
        }
        if let Some(position) = patch.position {
            task.position = position;
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get(&id) {
            Some(task) if task.user_id == owner => {
                tasks.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
