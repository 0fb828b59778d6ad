use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use tasker_types::api::{TaskFields, UserFields};

use crate::error::ApiError;

/// Which write-shaped resource a payload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    UserProfile,
    Task,
}

impl ResourceKind {
    pub fn allowed_fields(self) -> &'static [&'static str] {
        match self {
            ResourceKind::UserProfile => &["name", "email", "password", "age"],
            ResourceKind::Task => &["description", "completed"],
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct AllowlistError {
    pub rejected: Vec<String>,
}

/// All-or-nothing: any key outside the allowlist rejects the whole payload.
/// On success returns the payload's keys, which are exactly the fields the
/// write may touch.
pub fn check_fields(kind: ResourceKind, payload: &Map<String, Value>) -> Result<Vec<String>, AllowlistError> {
    let allowed = kind.allowed_fields();
    let rejected: Vec<String> = payload
        .keys()
        .filter(|key| !allowed.contains(&key.as_str()))
        .cloned()
        .collect();

    if rejected.is_empty() {
        Ok(payload.keys().cloned().collect())
    } else {
        Err(AllowlistError { rejected })
    }
}

pub trait Resource: Send + Sync + 'static {
    const KIND: ResourceKind;
    type Fields: DeserializeOwned + Send;
}

pub struct UserProfile;

impl Resource for UserProfile {
    const KIND: ResourceKind = ResourceKind::UserProfile;
    type Fields = UserFields;
}

pub struct TaskResource;

impl Resource for TaskResource {
    const KIND: ResourceKind = ResourceKind::Task;
    type Fields = TaskFields;
}

/// JSON body that passed the allowlist gate for `R`.
pub struct Allowed<R: Resource> {
    /// Keys present in the payload, all within the allowlist.
    pub fields: Vec<String>,
    pub body: R::Fields,
}

impl<S, R> FromRequest<S> for Allowed<R>
where
    S: Send + Sync,
    R: Resource,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let Value::Object(payload) = value else {
            return Err(ApiError::BadRequest("Request body must be a JSON object".into()));
        };

        let fields = check_fields(R::KIND, &payload).map_err(|e| {
            debug!("Rejected {:?} write with fields {:?}", R::KIND, e.rejected);
            ApiError::Forbidden
        })?;

        let body = serde_json::from_value(Value::Object(payload))
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        Ok(Self { fields, body })
    }
}
