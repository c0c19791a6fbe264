mod console;

use anyhow::Context;
use beacon_config::{load as load_config, AppConfig};
use beacon_gateway::{create_router, GatewayState};
use beacon_runtime::{shutdown_signal, telemetry, HubServices};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::info;

use crate::console::ConsoleCommand;

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Real-time presence and messaging hub (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server (default)
    Serve,
    /// Start the server with an operator console on stdin
    Console,
    /// Print the effective configuration as JSON
    PrintConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::Console => run_console().await,
        Commands::PrintConfig => print_config(),
    }
}

async fn start(config: &AppConfig) -> anyhow::Result<(HubServices, TcpListener)> {
    let services = HubServices::initialise(config)
        .await
        .context("failed to initialise hub services")?;

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");
    Ok((services, listener))
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting Beacon hub");

    let config = load_config().context("failed to load configuration")?;
    let (services, listener) = start(&config).await?;

    let app = create_router(GatewayState::new(
        services.hub.clone(),
        services.authenticator.clone(),
    ));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    services.shutdown().await?;
    info!("hub shut down");
    Ok(())
}

async fn run_console() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let (services, listener) = start(&config).await?;

    let app = create_router(GatewayState::new(
        services.hub.clone(),
        services.authenticator.clone(),
    ));
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    println!("Beacon operator console");
    println!("Type '/help' for commands, '/quit' to stop the server");
    println!("---");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match command {
            ConsoleCommand::Help => println!("{}", ConsoleCommand::HELP),
            ConsoleCommand::Stats => {
                let stats = services.hub.stats().await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            ConsoleCommand::Token { user_id } => {
                let session = services.authenticator.issue_session(user_id).await;
                println!("{} -> {}", session.user_id, session.token);
            }
            ConsoleCommand::Revoke { token } => {
                let revoked = services.authenticator.revoke(&token).await;
                println!("{}", if revoked { "revoked" } else { "unknown token" });
            }
            ConsoleCommand::Notify { user_id, data } => {
                services.hub.notify_user(user_id, data);
                println!("queued");
            }
            ConsoleCommand::Broadcast { content } => {
                services.hub.broadcast_to_all(content);
                println!("queued");
            }
            ConsoleCommand::Quit => break,
        }
    }

    server.abort();
    services.shutdown().await?;
    println!("Goodbye!");
    Ok(())
}

fn print_config() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
