//! Client-side session management for the Authflow backend
//!
//! [`SessionStore`] is the single writer of [`Session`]. It drives the
//! [`AuthService`] request builders, which in turn use the shared
//! [`authflow_http::ApiClient`]; the client's refresh coordinator writes
//! tokens back into the same session.

pub mod auth;
pub mod config;
pub mod hooks;
pub mod services;

pub use auth::context::{Profile, Session, SessionStore};
pub use config::AuthConfig;
pub use hooks::bootstrap;
pub use services::AuthService;
