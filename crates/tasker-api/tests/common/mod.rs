//! Shared fixtures for the API integration tests: an in-memory store, a
//! notifier that records instead of sending, and request helpers.
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use tasker_api::credentials::{AuthConfig, CredentialManager};
use tasker_api::notify::Notifier;
use tasker_api::{AppState, AppStateInner, build_router};
use tasker_db::Database;
use tasker_types::events::Notification;

pub const SECRET: &str = "integration-test-secret";

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

pub struct Response {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Response {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }
}

pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestContext {
    pub fn new() -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            credentials: CredentialManager::new(&AuthConfig {
                jwt_secret: SECRET.to_string(),
            }),
            notifier: notifier.clone(),
        });

        Self {
            app: build_router(state.clone()),
            state,
            notifier,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        Response {
            status,
            content_type,
            bytes,
        }
    }

    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    /// Signs up a user and returns (user json, token).
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> (Value, String) {
        let res = self
            .call(
                "POST",
                "/users",
                None,
                Some(serde_json::json!({ "name": name, "email": email, "password": password })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "signup failed: {:?}", res.json());
        let body = res.json();
        let token = body["token"].as_str().unwrap().to_string();
        (body["user"].clone(), token)
    }

    pub async fn create_task(&self, token: &str, description: &str, completed: bool) -> Value {
        let res = self
            .call(
                "POST",
                "/tasks",
                Some(token),
                Some(serde_json::json!({ "description": description, "completed": completed })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "task create failed: {:?}", res.json());
        res.json()
    }

    pub async fn upload_avatar(&self, token: &str, file_name: &str, bytes: &[u8]) -> Response {
        let (content_type, body) = multipart_file("avatar", file_name, bytes);
        let request = Request::builder()
            .method("POST")
            .uri("/users/profile/avatar")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

/// Builds a single-file multipart/form-data body.
pub fn multipart_file(field: &str, file_name: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let boundary = "tasker-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}

pub fn image_bytes(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = image::ImageBuffer::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img).write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// Asserts a serialized user carries none of the private fields.
pub fn assert_sanitized(user: &Value) {
    let obj = user.as_object().expect("user is an object");
    for private in ["password", "avatar", "tokens"] {
        assert!(!obj.contains_key(private), "user exposes {}: {}", private, user);
    }
}
