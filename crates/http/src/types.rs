//! Wire types for the auth backend and their shape checks

use crate::client::error::ClientError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

const NAME_MIN: usize = 3;
const NAME_MAX: usize = 20;
const PASSWORD_MIN: usize = 8;

/// Deserialize a response body into `T`, treating an absent body as a shape error
pub fn parse_body<T: DeserializeOwned>(body: Option<JsonValue>) -> Result<T, ClientError> {
    let body =
        body.ok_or_else(|| ClientError::Validation("expected a JSON response body".into()))?;
    serde_json::from_value(body).map_err(|e| ClientError::Validation(e.to_string()))
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl RegisterRequest {
    /// Check the fields the way the sign-up form does before submitting
    pub fn validate(&self) -> Result<(), ClientError> {
        check_name("first_name", &self.first_name)?;
        check_name("last_name", &self.last_name)?;
        check_email("email", &self.email)?;

        if self.password.chars().count() < PASSWORD_MIN {
            return Err(field_error(
                "password",
                "Password needs to have at least 8 characters.",
            ));
        }
        if !self.password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(field_error(
                "password",
                "The password must contain at least one capital letter.",
            ));
        }
        if !self.password.chars().any(|c| c.is_ascii_digit()) {
            return Err(field_error(
                "password",
                "The password must contain at least one number.",
            ));
        }
        if self.password != self.password_confirm {
            return Err(field_error("password_confirm", "Passwords dont match."));
        }
        Ok(())
    }
}

/// OAuth2 password-grant login form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub grant_type: String,
    pub scope: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    /// Password grant with empty scope and client credentials
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            grant_type: "password".to_string(),
            scope: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Check the fields the way the login form does before submitting
    pub fn validate(&self) -> Result<(), ClientError> {
        check_email("username", &self.username)?;
        if self.password.chars().count() < PASSWORD_MIN {
            return Err(field_error(
                "password",
                "Password needs to have at least 8 characters.",
            ));
        }
        Ok(())
    }
}

/// Access token issued by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    /// Parse and check a login/refresh response body
    pub fn from_body(body: Option<JsonValue>) -> Result<Self, ClientError> {
        let tokens: Self = parse_body(body)?;
        if tokens.access_token.is_empty() {
            return Err(field_error("access_token", "must not be empty"));
        }
        if tokens.token_type.is_empty() {
            return Err(field_error("token_type", "must not be empty"));
        }
        Ok(tokens)
    }
}

/// Current user as returned by the profile endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl ProfileResponse {
    /// Parse and check a profile response body
    pub fn from_body(body: Option<JsonValue>) -> Result<Self, ClientError> {
        parse_body(body)
    }
}

fn field_error(field: &str, message: &str) -> ClientError {
    ClientError::Validation(format!("{field}: {message}"))
}

fn check_name(field: &str, value: &str) -> Result<(), ClientError> {
    let len = value.chars().count();
    if len < NAME_MIN {
        return Err(field_error(
            field,
            "needs to have at least 3 characters.",
        ));
    }
    if len > NAME_MAX {
        return Err(field_error(field, "cannot exceed 20 characters."));
    }
    Ok(())
}

fn check_email(field: &str, value: &str) -> Result<(), ClientError> {
    let valid = value.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain
                .split_once('.')
                .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
    });
    if valid && !value.chars().any(char::is_whitespace) {
        Ok(())
    } else {
        Err(field_error(field, "Invalid email format."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registration() -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password: "Engine1843".into(),
            password_confirm: "Engine1843".into(),
        }
    }

    #[test]
    fn token_response_requires_access_token() {
        let err = TokenResponse::from_body(Some(json!({ "token_type": "bearer" }))).unwrap_err();
        assert!(matches!(err, ClientError::Validation(msg) if msg.contains("access_token")));
    }

    #[test]
    fn token_response_rejects_empty_token() {
        let err = TokenResponse::from_body(Some(json!({
            "access_token": "",
            "token_type": "bearer"
        })))
        .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn token_response_rejects_missing_body() {
        assert!(matches!(
            TokenResponse::from_body(None),
            Err(ClientError::Validation(_))
        ));
    }

    #[test]
    fn profile_requires_integer_id() {
        let err = ProfileResponse::from_body(Some(json!({
            "id": "7",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com"
        })))
        .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn login_form_defaults_to_password_grant() {
        let form = LoginRequest::password("a@b.com", "goodpass1");
        assert_eq!(form.grant_type, "password");
        assert!(form.scope.is_empty());
        assert!(form.validate().is_ok());
    }

    #[test]
    fn login_form_rejects_short_password() {
        let form = LoginRequest::password("a@b.com", "short");
        assert!(form.validate().is_err());
    }

    #[test]
    fn registration_accepts_valid_form() {
        assert!(registration().validate().is_ok());
    }

    #[test]
    fn registration_rejects_mismatched_confirmation() {
        let mut form = registration();
        form.password_confirm = "Engine1842".into();
        let err = form.validate().unwrap_err();
        assert_eq!(err.display_message(), "password_confirm: Passwords dont match.");
    }

    #[test]
    fn registration_rejects_weak_password() {
        let mut form = registration();
        form.password = "engine1843".into();
        form.password_confirm = "engine1843".into();
        assert!(form.validate().is_err());
    }

    #[test]
    fn registration_rejects_bad_email() {
        let mut form = registration();
        form.email = "ada.example.com".into();
        assert!(form.validate().is_err());
        form.email = "ada@localhost".into();
        assert!(form.validate().is_err());
    }

    #[test]
    fn registration_rejects_short_name() {
        let mut form = registration();
        form.first_name = "Al".into();
        assert!(form.validate().is_err());
    }
}
