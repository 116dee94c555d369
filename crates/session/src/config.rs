//! Backend endpoint configuration

/// Authentication endpoints
pub struct AuthConfig;

impl AuthConfig {
    /// Account creation
    pub const REGISTER_PATH: &'static str = "/api/v1/auth/register";

    /// OAuth2 password-grant token endpoint
    pub const LOGIN_PATH: &'static str = "/api/v1/auth/login";

    /// Clears the refresh cookie server-side
    pub const LOGOUT_PATH: &'static str = "/api/v1/auth/logout";

    /// Current user profile
    pub const PROFILE_PATH: &'static str = "/api/v1/users/me";

    /// Base URL used when nothing else is configured
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8000";
}
