//! Authflow HTTP module providing the API client and backend wire types
//!
//! The client attaches the current bearer token to each request and, when the
//! backend answers 401, performs one coalesced session refresh before retrying.

pub mod client;
pub mod types;

pub use client::credentials::{CredentialStore, MemoryCredentials};
pub use client::error::{ApiError, ClientError};
pub use client::{ApiClient, ApiClientBuilder, Method, Query, RequestBody, REFRESH_TOKEN_PATH};
pub use types::{LoginRequest, ProfileResponse, RegisterRequest, TokenResponse};
