use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use tasker_db::{TaskRow, UserRow};
use tasker_types::models::{Task, User};

fn parse_id(value: &str, what: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, value, e);
        Uuid::default()
    })
}

fn parse_time(value: &str, what: &str) -> DateTime<Utc> {
    value.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, value, e);
        DateTime::default()
    })
}

/// Sanitized user: hash, avatar and tokens are not part of the model.
pub fn user_model(row: &UserRow) -> User {
    User {
        id: parse_id(&row.id, "user id"),
        name: row.name.clone(),
        email: row.email.clone(),
        age: row.age,
        created_at: parse_time(&row.created_at, "user created_at"),
        updated_at: parse_time(&row.updated_at, "user updated_at"),
    }
}

pub fn task_model(row: &TaskRow) -> Task {
    Task {
        id: parse_id(&row.id, "task id"),
        description: row.description.clone(),
        completed: row.completed,
        owner: parse_id(&row.owner_id, "task owner_id"),
        created_at: parse_time(&row.created_at, "task created_at"),
        updated_at: parse_time(&row.updated_at, "task updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_user_has_no_secrets() {
        let id = Uuid::new_v4();
        let row = UserRow {
            id: id.to_string(),
            name: "Test".into(),
            email: "t@t.com".into(),
            password: "$argon2id$secret".into(),
            age: 4,
            created_at: "2024-05-01T10:00:00.123Z".into(),
            updated_at: "2024-05-01T10:00:00.123Z".into(),
        };
        let json = serde_json::to_value(user_model(&row)).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj["id"], id.to_string());
        assert!(!obj.contains_key("password"));
        assert!(!obj.contains_key("avatar"));
        assert!(!obj.contains_key("tokens"));
        assert!(!json.to_string().contains("argon2"));
    }
}
