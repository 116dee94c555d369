//! CLI commands

use anyhow::{Result, bail};
use authflow_http::{LoginRequest, RegisterRequest};
use authflow_session::{AuthConfig, Session, SessionStore, bootstrap};
use clap::Subcommand;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

const PROFILE_WAIT: Duration = Duration::from_secs(5);

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account
    Register {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// Defaults to --password
        #[arg(long)]
        password_confirm: Option<String>,
    },

    /// Log in and show the session
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// Call the profile endpoint through the authenticated client afterwards
        #[arg(long)]
        test_api: bool,
    },

    /// Interactive session: restores from the refresh cookie, then reads commands from stdin
    Shell,
}

impl Commands {
    pub async fn execute(self, store: &SessionStore) -> Result<()> {
        match self {
            Self::Register {
                first_name,
                last_name,
                email,
                password,
                password_confirm,
            } => {
                let form = RegisterRequest {
                    password_confirm: password_confirm.unwrap_or_else(|| password.clone()),
                    first_name,
                    last_name,
                    email,
                    password,
                };
                register(store, &form).await
            }
            Self::Login {
                email,
                password,
                test_api,
            } => {
                login(store, &LoginRequest::password(email, password)).await?;
                if test_api {
                    println!("{}", api_test(store).await);
                }
                Ok(())
            }
            Self::Shell => shell(store).await,
        }
    }
}

async fn register(store: &SessionStore, form: &RegisterRequest) -> Result<()> {
    form.validate()?;
    store.register(form).await?;
    println!("Account created for {}. You can now sign in.", form.email);
    Ok(())
}

async fn login(store: &SessionStore, form: &LoginRequest) -> Result<()> {
    form.validate()?;
    store.login(form).await?;
    wait_for_profile(store).await;
    println!("{}", render_status(&store.session()));
    Ok(())
}

async fn wait_for_profile(store: &SessionStore) {
    let mut rx = store.subscribe();
    let waited = tokio::time::timeout(
        PROFILE_WAIT,
        rx.wait_for(|s| s.user.is_some() || !s.is_authenticated),
    )
    .await;
    if waited.is_err() {
        debug!("profile not available yet");
    }
}

/// Authenticated call against the profile endpoint, formatted for display.
///
/// Available once the signed-in user's profile has loaded.
async fn api_test(store: &SessionStore) -> String {
    if store.session().user.is_none() {
        return "Sign in to test the API".to_string();
    }

    match store.api().get(AuthConfig::PROFILE_PATH, &[]).await {
        Ok(body) => {
            let body = body.unwrap_or(serde_json::Value::Null);
            let pretty = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
            format!("API Success: {pretty}")
        }
        Err(err) => format!("API Error: {err}"),
    }
}

fn render_status(session: &Session) -> String {
    if !session.is_authenticated {
        return "You are not signed in".to_string();
    }

    let mut out = String::from("You are signed in");
    match &session.user {
        Some(user) => {
            out.push_str(&format!(
                "\n  Email: {}\n  Name: {} {}\n  ID: {}",
                user.email, user.first_name, user.last_name, user.id
            ));
        }
        None => out.push_str("\n  (profile unavailable)"),
    }
    out
}

/// One line of shell input
#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Login(LoginRequest),
    Register(RegisterRequest),
    Status,
    TestApi,
    Refresh,
    Logout,
    Help,
    Quit,
}

impl ShellCommand {
    fn parse(line: &str) -> Result<Option<Self>> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            return Ok(None);
        };

        let parsed = match (command, args) {
            ("login", [email, password]) => Self::Login(LoginRequest::password(*email, *password)),
            ("register", [first, last, email, password, rest @ ..]) if rest.len() <= 1 => {
                Self::Register(RegisterRequest {
                    first_name: (*first).to_string(),
                    last_name: (*last).to_string(),
                    email: (*email).to_string(),
                    password: (*password).to_string(),
                    password_confirm: rest.first().unwrap_or(password).to_string(),
                })
            }
            ("status", []) => Self::Status,
            ("test-api", []) => Self::TestApi,
            ("refresh", []) => Self::Refresh,
            ("logout", []) => Self::Logout,
            ("help", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            _ => bail!("unrecognised command: {line} (try `help`)"),
        };
        Ok(Some(parsed))
    }
}

const SHELL_HELP: &str = "\
commands:
  login <email> <password>
  register <first> <last> <email> <password> [confirm]
  status
  test-api
  refresh
  logout
  quit";

async fn shell(store: &SessionStore) -> Result<()> {
    if bootstrap(store).await {
        info!("restored existing session");
    }
    println!("{}", render_status(&store.session()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match ShellCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        let outcome = match command {
            ShellCommand::Login(form) => login(store, &form).await,
            ShellCommand::Register(form) => register(store, &form).await,
            ShellCommand::Status => {
                println!("{}", render_status(&store.session()));
                Ok(())
            }
            ShellCommand::TestApi => {
                println!("{}", api_test(store).await);
                Ok(())
            }
            ShellCommand::Refresh => store.refresh_token().await.map_err(Into::into),
            ShellCommand::Logout => {
                store.logout().await;
                println!("{}", render_status(&store.session()));
                Ok(())
            }
            ShellCommand::Help => {
                println!("{SHELL_HELP}");
                Ok(())
            }
            ShellCommand::Quit => break,
        };

        if let Err(err) = outcome {
            println!("Error: {err}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use authflow_session::Profile;

    #[test]
    fn parses_login() {
        let parsed = ShellCommand::parse("login a@b.com goodpass1").unwrap();
        assert_eq!(
            parsed,
            Some(ShellCommand::Login(LoginRequest::password("a@b.com", "goodpass1")))
        );
    }

    #[test]
    fn register_confirmation_defaults_to_password() {
        let Some(ShellCommand::Register(form)) =
            ShellCommand::parse("register Ada Lovelace a@b.com Engine1843").unwrap()
        else {
            panic!("expected register");
        };
        assert_eq!(form.password_confirm, "Engine1843");
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(ShellCommand::parse("   ").unwrap(), None);
    }

    #[test]
    fn unknown_or_malformed_commands_are_rejected() {
        assert!(ShellCommand::parse("dance").is_err());
        assert!(ShellCommand::parse("login only-email").is_err());
        assert!(ShellCommand::parse("status now").is_err());
    }

    #[tokio::test]
    async fn api_test_requires_a_loaded_profile() {
        let store = SessionStore::local().unwrap();
        assert_eq!(api_test(&store).await, "Sign in to test the API");
    }

    #[test]
    fn status_for_anonymous_session() {
        assert_eq!(render_status(&Session::default()), "You are not signed in");
    }

    #[test]
    fn status_lists_profile() {
        let session = Session {
            access_token: Some("tok123".into()),
            is_authenticated: true,
            user: Some(Profile {
                id: 7,
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "a@b.com".into(),
            }),
            ..Session::default()
        };
        let rendered = render_status(&session);
        assert!(rendered.starts_with("You are signed in"));
        assert!(rendered.contains("Email: a@b.com"));
        assert!(rendered.contains("ID: 7"));
    }
}
