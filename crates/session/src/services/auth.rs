//! Authentication API service

use crate::config::AuthConfig;
use authflow_http::{
    ApiClient, ClientError, LoginRequest, Method, ProfileResponse, RegisterRequest, RequestBody,
    TokenResponse,
};

/// Authentication API service
#[derive(Clone, Debug)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    /// Create a new auth API service
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Underlying HTTP client
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Create an account. Does not log the user in.
    pub async fn register(&self, data: &RegisterRequest) -> Result<(), ClientError> {
        self.client
            .post(AuthConfig::REGISTER_PATH, RequestBody::json(data)?, &[])
            .await?;
        Ok(())
    }

    /// Exchange credentials for an access token.
    ///
    /// The form is sent url-encoded and without the refresh-and-retry
    /// protocol, since a 401 here means the credentials were wrong.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<TokenResponse, ClientError> {
        let body = self
            .client
            .send_once(
                Method::POST,
                AuthConfig::LOGIN_PATH,
                &[],
                RequestBody::form(credentials)?,
            )
            .await?;
        TokenResponse::from_body(body)
    }

    /// Ask the backend to drop the refresh cookie
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.client
            .post(AuthConfig::LOGOUT_PATH, RequestBody::Empty, &[])
            .await?;
        Ok(())
    }

    /// Fetch the current user's profile
    pub async fn get_profile(&self) -> Result<ProfileResponse, ClientError> {
        let body = self.client.get(AuthConfig::PROFILE_PATH, &[]).await?;
        ProfileResponse::from_body(body)
    }

    /// Mint a new access token from the refresh cookie, joining any refresh already in flight
    pub async fn refresh_access_token(&self) -> Result<TokenResponse, ClientError> {
        self.client.refresh_session().await
    }
}
