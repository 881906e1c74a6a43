//! CLI command implementations

use anyhow::{anyhow, bail, Context, Result};
use console::Term;
use dialoguer::{theme::ColorfulTheme, Input, Password};
use reqwest::Method;
use std::fs;
use tokio::sync::broadcast;

use crate::auth::{BootstrapOutcome, Navigation, RegistrationForm, SessionEvent, SessionManager};
use crate::cli::{
    error, info, navigate, print_profile_table, print_session_detail, spinner, success, warn,
    OutputFormat,
};
use crate::config::{self, loader::CONFIG_FILENAME, Config};
use crate::error::ErrorKind;

/// Initialize a new portal.toml configuration file
pub async fn init() -> Result<()> {
    let config_path = std::path::Path::new(CONFIG_FILENAME);

    if config_path.exists() {
        warn(&format!("{} already exists", CONFIG_FILENAME));
        return Ok(());
    }

    let content = config::loader::default_config_content();
    fs::write(config_path, content)?;

    success(&format!("Created {}", CONFIG_FILENAME));
    info("Set api.base_url (or PORTAL_API_URL) and run 'portal-session login'");

    Ok(())
}

/// Log in and print the resulting navigation
pub async fn login(email: Option<String>, password: Option<String>) -> Result<()> {
    let app = App::start().await?;

    let email = match email {
        Some(email) => email,
        None => prompt_input("Email")?,
    };
    let password = match password {
        Some(password) => password,
        None => prompt_password("Password", false)?,
    };

    let pb = spinner("Signing in...");
    let result = app.session.login(&email, &password).await;
    pb.finish_and_clear();

    match result {
        Ok(user) => {
            success(&format!("Logged in as {}", user));
            app.follow_navigation();
            Ok(())
        }
        Err(e) => {
            error(&format!("Login failed: {}", e));
            Err(e.into())
        }
    }
}

/// Register a new account
pub async fn register(
    username: String,
    email: String,
    password: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
) -> Result<()> {
    let app = App::start().await?;

    let password = match password {
        Some(password) => password,
        None => prompt_password("Password", true)?,
    };

    let mut form = RegistrationForm::new(username, email, password);
    form.first_name = first_name;
    form.last_name = last_name;
    form.phone = phone;

    let pb = spinner("Creating account...");
    let result = app.session.register(&form).await;
    pb.finish_and_clear();

    match result {
        Ok(user) => {
            success(&format!("Registered and logged in as {}", user));
            app.follow_navigation();
            Ok(())
        }
        Err(e) => {
            error(&format!("Registration failed: {}", e));
            Err(e.into())
        }
    }
}

/// Log out of the current session
pub async fn logout() -> Result<()> {
    let app = App::start().await?;
    let was_authenticated = app.session.is_authenticated();

    app.session.logout()?;

    if was_authenticated {
        success("Logged out");
    } else {
        info("Not logged in");
    }
    app.follow_navigation();
    Ok(())
}

/// Show the current user
pub async fn whoami(format: OutputFormat) -> Result<()> {
    let app = App::start().await?;

    let Some(user) = app.session.current_user() else {
        warn("Not logged in. Run 'portal-session login'");
        app.follow_navigation();
        return Ok(());
    };

    match format {
        OutputFormat::Table => print_profile_table(&user),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&user)?),
    }
    Ok(())
}

/// Request password reset instructions
pub async fn forgot_password(email: &str) -> Result<()> {
    let app = App::start().await?;

    let pb = spinner("Requesting reset...");
    let result = app.session.forgot_password(email).await;
    pb.finish_and_clear();

    match result {
        Ok(message) => {
            success(&message);
            Ok(())
        }
        Err(e) => {
            error(&format!("Password reset request failed: {}", e));
            Err(e.into())
        }
    }
}

/// Confirm a password reset
pub async fn reset_password(token: &str, password: Option<String>) -> Result<()> {
    let app = App::start().await?;

    let password = match password {
        Some(password) => password,
        None => prompt_password("New password", true)?,
    };

    let pb = spinner("Resetting password...");
    let result = app.session.reset_password(token, &password).await;
    pb.finish_and_clear();

    match result {
        Ok(message) => {
            success(&message);
            info("Log in again with your new password");
            app.follow_navigation();
            Ok(())
        }
        Err(e) => {
            error(&format!("Password reset failed: {}", e));
            Err(e.into())
        }
    }
}

/// Send an arbitrary authenticated request and print the response
pub async fn request(method: &str, path: &str, data: Option<String>) -> Result<()> {
    let app = App::start().await?;

    let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| anyhow!("Invalid HTTP method: {}", method))?;

    let api = app.session.api();
    let mut builder = api.request(method, path);
    if let Some(data) = data {
        let body: serde_json::Value =
            serde_json::from_str(&data).context("--data must be valid JSON")?;
        builder = builder.json(&body);
    }

    let result = api.send(builder).await;
    app.follow_navigation();

    let response = match result {
        Ok(response) => response,
        Err(e) if e.kind() == ErrorKind::RefreshExhausted => {
            error(&format!("{}. Log in again.", e));
            return Err(e.into());
        }
        Err(e) => {
            error(&format!("Request failed: {}", e));
            return Err(e.into());
        }
    };

    let status = response.status();
    let body = response.text().await?;
    let pretty = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or(body);

    if status.is_success() {
        success(&status.to_string());
    } else {
        error(&status.to_string());
    }
    if !pretty.is_empty() {
        println!("{}", pretty);
    }

    if status.is_success() {
        Ok(())
    } else {
        bail!("request returned {}", status)
    }
}

/// Show configuration and session state
pub async fn status() -> Result<()> {
    let app = App::start().await?;

    match &app.bootstrap {
        BootstrapOutcome::NoStoredSession => info("No stored session"),
        BootstrapOutcome::Restored(user) => success(&format!("Session restored for {}", user)),
        BootstrapOutcome::Discarded { kind, message } => {
            warn(&format!("Stored session discarded ({}): {}", kind, message))
        }
    }
    println!();

    print_session_detail(
        &app.session.snapshot(),
        &app.config.api.base_url,
        &app.config.storage.path.display().to_string(),
    );
    Ok(())
}

/// A bootstrapped session plus the routing side of the application
struct App {
    config: Config,
    session: SessionManager,
    bootstrap: BootstrapOutcome,
    navigation: Navigation,
    events: broadcast::Receiver<SessionEvent>,
}

impl App {
    async fn start() -> Result<Self> {
        let config = config::load_config()?;
        let session = SessionManager::from_config(&config)?;
        let events = session.events();
        let bootstrap = session.bootstrap().await;
        let navigation = Navigation::new(&config.routes);

        Ok(Self {
            config,
            session,
            bootstrap,
            navigation,
            events,
        })
    }

    /// Print the route for every session event emitted so far
    fn follow_navigation(mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let SessionEvent::SessionExpired { reason } = &event {
                warn(&format!("Session expired: {}", reason));
            }
            if let Some(route) = self.navigation.route_for(&event) {
                navigate(route);
            }
        }
    }
}

fn ensure_terminal(what: &str) -> Result<()> {
    if !Term::stderr().is_term() {
        bail!("{} is required when not running in a terminal", what);
    }
    Ok(())
}

fn prompt_input(prompt: &str) -> Result<String> {
    ensure_terminal(prompt)?;
    let value = Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact_text()?;
    Ok(value)
}

fn prompt_password(prompt: &str, confirm: bool) -> Result<String> {
    ensure_terminal(prompt)?;
    let theme = ColorfulTheme::default();
    let mut input = Password::with_theme(&theme).with_prompt(prompt);
    if confirm {
        input = input.with_confirmation("Confirm password", "Passwords do not match");
    }
    Ok(input.interact()?)
}
