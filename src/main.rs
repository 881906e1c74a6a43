use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal_session::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_session=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::init().await,
        Commands::Login { email, password } => commands::login(email, password).await,
        Commands::Register {
            username,
            email,
            password,
            first_name,
            last_name,
            phone,
        } => commands::register(username, email, password, first_name, last_name, phone).await,
        Commands::Logout => commands::logout().await,
        Commands::Whoami { format } => commands::whoami(format).await,
        Commands::ForgotPassword { email } => commands::forgot_password(&email).await,
        Commands::ResetPassword { token, password } => {
            commands::reset_password(&token, password).await
        }
        Commands::Request { method, path, data } => commands::request(&method, &path, data).await,
        Commands::Status => commands::status().await,
    }
}
