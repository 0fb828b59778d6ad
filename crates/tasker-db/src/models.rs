/// Row types, one per SQLite table.
/// Distinct from tasker-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string, never plaintext.
    pub password: String,
    pub age: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub description: String,
    pub completed: bool,
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSortField {
    Description,
    Completed,
    CreatedAt,
    UpdatedAt,
}

impl TaskSortField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "description" => Some(Self::Description),
            "completed" => Some(Self::Completed),
            "created_at" | "createdAt" => Some(Self::CreatedAt),
            "updated_at" | "updatedAt" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::Completed => "completed",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSort {
    pub field: TaskSortField,
    pub descending: bool,
}

/// Filter, order and page for [`crate::Database::tasks_of`].
///
/// `limit` of `None` or `Some(0)` means unbounded; `skip` of `None` means 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub completed: Option<bool>,
    pub sort: Option<TaskSort>,
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}
