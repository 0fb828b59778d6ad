//! Entity constraint lists. Each check runs every rule and returns all
//! violations at once rather than stopping at the first.

use validator::ValidateEmail;

use tasker_db::{TaskRow, UserRow};
use tasker_types::api::{FieldViolation, TaskFields, UserFields};

pub const MIN_PASSWORD_LEN: usize = 7;

/// A signup that passed every user constraint. `password` is still
/// plaintext and must go through the hashing step before it is stored.
#[derive(Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: i64,
}

/// Profile state after applying a patch. `password` is `Some` only when the
/// patch supplied one.
#[derive(Debug)]
pub struct ProfileChange {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub age: i64,
}

#[derive(Debug, PartialEq)]
pub struct TaskInput {
    pub description: String,
    pub completed: bool,
}

fn violation(field: &str, message: impl Into<String>) -> FieldViolation {
    FieldViolation {
        field: field.to_string(),
        message: message.into(),
    }
}

fn null_value(field: &str) -> FieldViolation {
    violation(field, format!("{} cannot be null", field))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// HTML5 address syntax, plus a dot-atom local part and an alphabetic
/// top-level domain of two or more letters.
pub fn is_valid_email(email: &str) -> bool {
    if !email.validate_email() {
        return false;
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };

    let dot_atom = !local.starts_with('.') && !local.ends_with('.') && !local.contains("..");
    let has_tld = domain
        .rsplit_once('.')
        .is_some_and(|(_, tld)| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));
    dot_atom && has_tld
}

fn user_violations(name: &str, email: &str, password: Option<&str>, age: i64) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    if name.is_empty() {
        violations.push(violation("name", "Name is required"));
    }

    if email.is_empty() {
        violations.push(violation("email", "Email is required"));
    } else if !is_valid_email(email) {
        violations.push(violation("email", "Email is invalid!"));
    }

    if let Some(password) = password {
        if password.chars().count() < MIN_PASSWORD_LEN {
            violations.push(violation(
                "password",
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }
        if password.to_lowercase().contains("password") {
            violations.push(violation("password", "Password cannot contain the word \"password\""));
        }
    }

    if age < 0 {
        violations.push(violation("age", "Age must be a positive integer!"));
    }

    violations
}

pub fn signup_input(fields: UserFields) -> Result<NewUser, Vec<FieldViolation>> {
    let name = fields.name.as_deref().map(str::trim).unwrap_or_default().to_string();
    let email = normalize_email(fields.email.as_deref().unwrap_or_default());
    let password = fields.password.as_deref().map(|p| p.trim().to_string());
    let age = fields.age.unwrap_or(0);

    let mut violations = user_violations(&name, &email, password.as_deref(), age);
    match password {
        Some(password) if violations.is_empty() => Ok(NewUser { name, email, password, age }),
        Some(_) => Err(violations),
        None => {
            violations.push(violation("password", "Password is required"));
            Err(violations)
        }
    }
}

/// Applies exactly the `present` keys of a profile patch onto `current`.
pub fn profile_input(
    current: &UserRow,
    present: &[String],
    mut fields: UserFields,
) -> Result<ProfileChange, Vec<FieldViolation>> {
    let mut change = ProfileChange {
        name: current.name.clone(),
        email: current.email.clone(),
        password: None,
        age: current.age,
    };
    let mut violations = Vec::new();

    for key in present {
        match key.as_str() {
            "name" => match fields.name.take() {
                Some(name) => change.name = name.trim().to_string(),
                None => violations.push(null_value("name")),
            },
            "email" => match fields.email.take() {
                Some(email) => change.email = normalize_email(&email),
                None => violations.push(null_value("email")),
            },
            "password" => match fields.password.take() {
                Some(password) => change.password = Some(password.trim().to_string()),
                None => violations.push(null_value("password")),
            },
            "age" => match fields.age.take() {
                Some(age) => change.age = age,
                None => violations.push(null_value("age")),
            },
            _ => {}
        }
    }

    violations.extend(user_violations(
        &change.name,
        &change.email,
        change.password.as_deref(),
        change.age,
    ));

    if violations.is_empty() { Ok(change) } else { Err(violations) }
}

fn task_violations(input: &TaskInput) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    if input.description.is_empty() {
        violations.push(violation("description", "Description is required"));
    }
    violations
}

pub fn task_create_input(fields: TaskFields) -> Result<TaskInput, Vec<FieldViolation>> {
    let input = TaskInput {
        description: fields.description.as_deref().map(str::trim).unwrap_or_default().to_string(),
        completed: fields.completed.unwrap_or(false),
    };
    let violations = task_violations(&input);
    if violations.is_empty() { Ok(input) } else { Err(violations) }
}

pub fn task_update_input(
    current: &TaskRow,
    present: &[String],
    mut fields: TaskFields,
) -> Result<TaskInput, Vec<FieldViolation>> {
    let mut input = TaskInput {
        description: current.description.clone(),
        completed: current.completed,
    };
    let mut violations = Vec::new();

    for key in present {
        match key.as_str() {
            "description" => match fields.description.take() {
                Some(description) => input.description = description.trim().to_string(),
                None => violations.push(null_value("description")),
            },
            "completed" => match fields.completed.take() {
                Some(completed) => input.completed = completed,
                None => violations.push(null_value("completed")),
            },
            _ => {}
        }
    }

    violations.extend(task_violations(&input));
    if violations.is_empty() { Ok(input) } else { Err(violations) }
}
