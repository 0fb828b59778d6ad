pub mod allowlist;
pub mod auth;
pub mod avatar;
pub mod convert;
pub mod credentials;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod profile;
pub mod router;
pub mod tasks;
pub mod validation;

pub use auth::{AppState, AppStateInner};
pub use router::build_router;
