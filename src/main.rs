use std::sync::Arc;

use clap::{Parser, Subcommand};
use helpdesk_auth::guard::GuardDecision;
use helpdesk_auth::provider::http::HttpIdentityProvider;
use helpdesk_auth::{AuthConfig, AuthError, AuthFacade, FileStorage, Session, SessionStore, StoreOptions, routes};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("output encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "helpdesk-auth", about = "Helpdesk session CLI")]
struct Cli {
    #[arg(long, env = "HELPDESK_AUTH_URL")]
    auth_url: String,

    #[arg(long, env = "HELPDESK_AUTH_API_KEY", hide_env_values = true)]
    api_key: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile the saved session with the identity service and print it.
    Status,
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "HELPDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "HELPDESK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        department: Option<String>,
    },
    Logout,
    /// Show what the route guard decides for a page path.
    Access { path: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("helpdesk_auth=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AuthConfig::from_parts(cli.auth_url, cli.api_key);
    let provider = HttpIdentityProvider::new(&config)?;
    let storage = FileStorage::new(config.session_dir.clone());
    let store = SessionStore::new(Arc::new(provider), Arc::new(storage), StoreOptions::from(&config));
    let facade = AuthFacade::new(Arc::new(store));

    match cli.command {
        Command::Status => {
            let session = facade.check_auth().await;
            print_session(&session)
        }
        Command::Login { email, password } => {
            let session = facade.login(&email, &password).await?;
            print_session(&session)
        }
        Command::Register { email, password, name, department } => {
            let session = facade
                .register(&email, &password, &name, department.as_deref())
                .await?;
            print_session(&session)
        }
        Command::Logout => {
            facade.logout().await;
            println!("signed out");
            Ok(())
        }
        Command::Access { path } => {
            facade.check_auth().await;
            match routes::decide(&path, &facade.guard_input()) {
                GuardDecision::Render => println!("render {path}"),
                GuardDecision::Loading => println!("loading"),
                GuardDecision::Redirect(r) => match r.from {
                    Some(from) => println!("redirect {} (from {from})", r.to),
                    None => println!("redirect {}", r.to),
                },
            }
            Ok(())
        }
    }
}

/// Print the session without its bearer token.
fn print_session(session: &Session) -> Result<(), CliError> {
    let view = serde_json::json!({ "isAuthenticated": session.is_authenticated(), "user": session.user() });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
