use crate::Database;
use crate::models::{TaskQuery, TaskRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row, types::Value};

const USER_COLUMNS: &str = "id, name, email, password, age, created_at, updated_at";
const TASK_COLUMNS: &str = "id, description, completed, owner_id, created_at, updated_at";
const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
        age: i64,
    ) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password, age) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, name, email, password_hash, age],
            )?;
            query_user(conn, "id", id)?.ok_or_else(|| anyhow::anyhow!("User vanished after insert: {}", id))
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    /// Writes the mutable profile columns of `user` and returns the stored row.
    pub fn update_user(&self, user: &UserRow) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE users SET name = ?2, email = ?3, password = ?4, age = ?5, updated_at = {NOW}
                     WHERE id = ?1"
                ),
                rusqlite::params![user.id, user.name, user.email, user.password, user.age],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user(conn, "id", &user.id)
        })
    }

    /// Replaces (or clears, with `None`) the avatar blob. Returns false if the
    /// user does not exist.
    pub fn set_avatar(&self, user_id: &str, avatar: Option<&[u8]>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!("UPDATE users SET avatar = ?2, updated_at = {NOW} WHERE id = ?1"),
                rusqlite::params![user_id, avatar],
            )?;
            Ok(changed > 0)
        })
    }

    /// `None` when the user is missing or has no avatar.
    pub fn get_avatar(&self, user_id: &str) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            let avatar: Option<Option<Vec<u8>>> = conn
                .query_row("SELECT avatar FROM users WHERE id = ?1", [user_id], |row| row.get(0))
                .optional()?;
            Ok(avatar.flatten())
        })
    }

    /// Removes the user's tasks and then the user row (which takes the
    /// session set with it) in one transaction. Returns the number of tasks
    /// removed, or `None` when there was no such user; nothing is deleted then.
    pub fn delete_user_cascade(&self, id: &str) -> Result<Option<usize>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let tasks = tx.execute("DELETE FROM tasks WHERE owner_id = ?1", [id])?;
            if tx.execute("DELETE FROM users WHERE id = ?1", [id])? == 0 {
                return Ok(None);
            }
            tx.commit()?;
            Ok(Some(tasks))
        })
    }

    // -- Session tokens --

    /// Appends to the session set in one statement, so concurrent logins
    /// cannot overwrite each other's tokens.
    pub fn append_token(&self, user_id: &str, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_tokens (user_id, token) VALUES (?1, ?2)",
                (user_id, token),
            )?;
            Ok(())
        })
    }

    pub fn token_exists(&self, user_id: &str, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM user_tokens WHERE user_id = ?1 AND token = ?2",
                    (user_id, token),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Tokens in issue order.
    pub fn list_tokens(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT token FROM user_tokens WHERE user_id = ?1 ORDER BY id")?;
            let tokens = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(tokens)
        })
    }

    pub fn remove_token(&self, user_id: &str, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM user_tokens WHERE user_id = ?1 AND token = ?2",
                (user_id, token),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn clear_tokens(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM user_tokens WHERE user_id = ?1", [user_id])?))
    }

    // -- Tasks (always scoped by owner) --

    pub fn create_task(
        &self,
        id: &str,
        owner_id: &str,
        description: &str,
        completed: bool,
    ) -> Result<TaskRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, description, completed, owner_id) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, description, completed, owner_id],
            )?;
            query_task(conn, id, owner_id)?.ok_or_else(|| anyhow::anyhow!("Task vanished after insert: {}", id))
        })
    }

    /// A task owned by someone else is reported exactly like a missing one.
    pub fn get_task(&self, id: &str, owner_id: &str) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| query_task(conn, id, owner_id))
    }

    pub fn update_task(
        &self,
        id: &str,
        owner_id: &str,
        description: &str,
        completed: bool,
    ) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE tasks SET description = ?3, completed = ?4, updated_at = {NOW}
                     WHERE id = ?1 AND owner_id = ?2"
                ),
                rusqlite::params![id, owner_id, description, completed],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_task(conn, id, owner_id)
        })
    }

    /// Deletes and returns the task, or `None` if it is absent or not owned.
    pub fn delete_task(&self, id: &str, owner_id: &str) -> Result<Option<TaskRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let task = query_task(&tx, id, owner_id)?;
            if task.is_some() {
                tx.execute("DELETE FROM tasks WHERE id = ?1 AND owner_id = ?2", (id, owner_id))?;
            }
            tx.commit()?;
            Ok(task)
        })
    }

    /// The derived user → tasks relationship.
    pub fn tasks_of(&self, owner_id: &str, query: &TaskQuery) -> Result<Vec<TaskRow>> {
        self.with_conn(|conn| query_tasks(conn, owner_id, query))
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        age: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        description: row.get(1)?,
        completed: row.get(2)?,
        owner_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// `column` is always one of our literals, never caller input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    let row = stmt.query_row([value], user_from_row).optional()?;
    Ok(row)
}

fn query_task(conn: &Connection, id: &str, owner_id: &str) -> Result<Option<TaskRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND owner_id = ?2"
    ))?;
    let row = stmt.query_row((id, owner_id), task_from_row).optional()?;
    Ok(row)
}

fn query_tasks(conn: &Connection, owner_id: &str, query: &TaskQuery) -> Result<Vec<TaskRow>> {
    let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ?");
    let mut params: Vec<Value> = vec![Value::Text(owner_id.to_string())];

    if let Some(completed) = query.completed {
        sql.push_str(" AND completed = ?");
        params.push(Value::Integer(completed as i64));
    }

    // rowid keeps insertion order stable for ties and for unsorted queries
    match query.sort {
        Some(sort) => {
            let direction = if sort.descending { "DESC" } else { "ASC" };
            sql.push_str(&format!(" ORDER BY {} {}, rowid ASC", sort.field.column(), direction));
        }
        None => sql.push_str(" ORDER BY rowid ASC"),
    }

    // SQLite treats a negative LIMIT as unbounded
    let limit = query.limit.filter(|l| *l > 0).map(i64::from).unwrap_or(-1);
    let skip = query.skip.map(i64::from).unwrap_or(0);
    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(Value::Integer(limit));
    params.push(Value::Integer(skip));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), task_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TaskSort, TaskSortField, is_unique_violation};

    fn db_with_user(id: &str, email: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(id, "Someone", email, "$argon2id$fake", 0).unwrap();
        db
    }

    fn ids(rows: &[TaskRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn duplicate_email_is_unique_violation() {
        let db = db_with_user("u1", "a@b.com");
        let err = db.create_user("u2", "Other", "a@b.com", "$argon2id$fake", 3).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn update_user_keeps_untouched_columns() {
        let db = db_with_user("u1", "a@b.com");
        let mut user = db.get_user_by_id("u1").unwrap().unwrap();
        user.age = 41;
        let stored = db.update_user(&user).unwrap().unwrap();
        assert_eq!(stored.age, 41);
        assert_eq!(stored.password, "$argon2id$fake");
        assert_eq!(stored.email, "a@b.com");
    }

    #[test]
    fn tokens_keep_issue_order_and_revoke_individually() {
        let db = db_with_user("u1", "a@b.com");
        db.append_token("u1", "t1").unwrap();
        db.append_token("u1", "t2").unwrap();
        db.append_token("u1", "t3").unwrap();
        assert_eq!(db.list_tokens("u1").unwrap(), vec!["t1", "t2", "t3"]);

        assert!(db.remove_token("u1", "t2").unwrap());
        assert!(!db.remove_token("u1", "t2").unwrap());
        assert!(db.token_exists("u1", "t1").unwrap());
        assert!(!db.token_exists("u1", "t2").unwrap());

        assert_eq!(db.clear_tokens("u1").unwrap(), 2);
        assert!(db.list_tokens("u1").unwrap().is_empty());
    }

    #[test]
    fn token_is_bound_to_its_user() {
        let db = db_with_user("u1", "a@b.com");
        db.create_user("u2", "Other", "c@d.com", "$argon2id$fake", 0).unwrap();
        db.append_token("u1", "t1").unwrap();
        assert!(!db.token_exists("u2", "t1").unwrap());
        assert!(!db.remove_token("u2", "t1").unwrap());
    }

    #[test]
    fn avatar_set_get_clear() {
        let db = db_with_user("u1", "a@b.com");
        assert_eq!(db.get_avatar("u1").unwrap(), None);
        assert!(db.set_avatar("u1", Some(&[1, 2, 3])).unwrap());
        assert_eq!(db.get_avatar("u1").unwrap(), Some(vec![1, 2, 3]));
        assert!(db.set_avatar("u1", None).unwrap());
        assert_eq!(db.get_avatar("u1").unwrap(), None);
        assert_eq!(db.get_avatar("nobody").unwrap(), None);
        assert!(!db.set_avatar("nobody", None).unwrap());
    }

    #[test]
    fn tasks_are_invisible_to_other_owners() {
        let db = db_with_user("u1", "a@b.com");
        db.create_user("u2", "Other", "c@d.com", "$argon2id$fake", 0).unwrap();
        db.create_task("t1", "u1", "mine", false).unwrap();

        assert!(db.get_task("t1", "u2").unwrap().is_none());
        assert!(db.update_task("t1", "u2", "stolen", true).unwrap().is_none());
        assert!(db.delete_task("t1", "u2").unwrap().is_none());

        let task = db.get_task("t1", "u1").unwrap().unwrap();
        assert_eq!(task.description, "mine");
        assert!(!task.completed);
    }

    #[test]
    fn delete_task_returns_removed_row() {
        let db = db_with_user("u1", "a@b.com");
        db.create_task("t1", "u1", "gone soon", true).unwrap();
        let removed = db.delete_task("t1", "u1").unwrap().unwrap();
        assert_eq!(removed.description, "gone soon");
        assert!(db.get_task("t1", "u1").unwrap().is_none());
    }

    #[test]
    fn tasks_of_filters_sorts_and_pages() {
        let db = db_with_user("u1", "a@b.com");
        db.create_user("u2", "Other", "c@d.com", "$argon2id$fake", 0).unwrap();
        db.create_task("a", "u1", "charlie", true).unwrap();
        db.create_task("b", "u1", "alpha", false).unwrap();
        db.create_task("c", "u1", "bravo", true).unwrap();
        db.create_task("d", "u2", "delta", true).unwrap();

        let all = db.tasks_of("u1", &TaskQuery::default()).unwrap();
        assert_eq!(ids(&all), vec!["a", "b", "c"]);

        let done = db
            .tasks_of("u1", &TaskQuery { completed: Some(true), ..Default::default() })
            .unwrap();
        assert_eq!(ids(&done), vec!["a", "c"]);

        let sorted = db
            .tasks_of(
                "u1",
                &TaskQuery {
                    sort: Some(TaskSort { field: TaskSortField::Description, descending: true }),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(ids(&sorted), vec!["a", "c", "b"]);

        let page = db
            .tasks_of("u1", &TaskQuery { limit: Some(1), skip: Some(1), ..Default::default() })
            .unwrap();
        assert_eq!(ids(&page), vec!["b"]);

        let skip_only = db.tasks_of("u1", &TaskQuery { skip: Some(2), ..Default::default() }).unwrap();
        assert_eq!(ids(&skip_only), vec!["c"]);

        let zero_limit = db.tasks_of("u1", &TaskQuery { limit: Some(0), ..Default::default() }).unwrap();
        assert_eq!(zero_limit.len(), 3);
    }

    #[test]
    fn user_delete_cascades_tasks_and_tokens() {
        let db = db_with_user("u1", "a@b.com");
        db.create_user("u2", "Other", "c@d.com", "$argon2id$fake", 0).unwrap();
        db.append_token("u1", "t1").unwrap();
        db.create_task("a", "u1", "one", false).unwrap();
        db.create_task("b", "u1", "two", false).unwrap();
        db.create_task("c", "u2", "three", false).unwrap();

        // The owner reference alone blocks removing the user row
        let blocked = db.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = 'u1'", [])?));
        assert!(blocked.is_err());

        assert_eq!(db.delete_user_cascade("u1").unwrap(), Some(2));
        assert!(db.get_user_by_id("u1").unwrap().is_none());
        assert!(db.list_tokens("u1").unwrap().is_empty());
        assert!(db.tasks_of("u1", &TaskQuery::default()).unwrap().is_empty());
        assert_eq!(ids(&db.tasks_of("u2", &TaskQuery::default()).unwrap()), vec!["c"]);
    }

    #[test]
    fn cascade_of_missing_user_deletes_nothing() {
        let db = db_with_user("u1", "a@b.com");
        db.with_conn(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = OFF; INSERT INTO tasks (id, description, completed, owner_id) VALUES ('x', 'orphan', 0, 'ghost'); PRAGMA foreign_keys = ON;")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.delete_user_cascade("ghost").unwrap(), None);
        assert_eq!(ids(&db.tasks_of("ghost", &TaskQuery::default()).unwrap()), vec!["x"]);
    }

    #[test]
    fn concurrent_appends_keep_every_token() {
        let db = db_with_user("u1", "a@b.com");
        let tokens: Vec<String> = (0..8).map(|i| format!("token-{}", i)).collect();

        std::thread::scope(|scope| {
            for token in &tokens {
                let db = &db;
                scope.spawn(move || db.append_token("u1", token).unwrap());
            }
        });

        let mut stored = db.list_tokens("u1").unwrap();
        stored.sort();
        assert_eq!(stored, tokens);
    }
}
