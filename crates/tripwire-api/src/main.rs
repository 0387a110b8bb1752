//! Tripwire CLI, webhook receiver and REST API entry point.
//!
//! Binary name: `tripwire`
//!
//! Parses CLI arguments, initializes the database and engine, then dispatches
//! to a command handler or starts the server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use tokio_util::sync::CancellationToken;
use tripwire_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{AgentCommand, Cli, Commands};
use state::{AppState, ConcreteDispatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,tripwire=debug",
        _ => "trace",
    };
    let otel = matches!(cli.command, Commands::Serve { otel: true, .. });
    let options = TracingOptions::new(filter)
        .with_json(cli.json)
        .with_otel(otel);
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "tripwire", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    let result = run(cli, state.clone()).await;
    state.db_pool.close().await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli, state: AppState) -> anyhow::Result<()> {
    match cli.command {
        Commands::Agent { action } => match action {
            AgentCommand::List => cli::agent::list_agents(&state, cli.json).await?,
            AgentCommand::Show { id } => cli::agent::show_agent(&state, &id, cli.json).await?,
            AgentCommand::Import { file } => {
                cli::agent::import_agents(&state, &file, cli.json).await?
            }
            AgentCommand::Delete { id, force } => {
                cli::agent::delete_agent(&state, &id, force, cli.json).await?
            }
            AgentCommand::Enable { id } => cli::agent::set_active(&state, &id, true, cli.json).await?,
            AgentCommand::Disable { id } => {
                cli::agent::set_active(&state, &id, false, cli.json).await?
            }
        },

        Commands::Executions { agent, limit } => {
            cli::execution::list_executions(&state, agent.as_deref(), limit, cli.json).await?
        }

        Commands::Serve { port, host, .. } => serve(state, port, host, cli.quiet).await?,

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

async fn serve(
    state: AppState,
    port: Option<u16>,
    host: Option<String>,
    quiet: bool,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);

    let cancel = CancellationToken::new();
    let (dispatcher, dispatcher_task) = ConcreteDispatcher::start(
        state.engine.clone(),
        state.config.queue.capacity,
        cancel.child_token(),
    );
    let state = state.with_dispatcher(dispatcher);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if !quiet {
        println!(
            "  {} Tripwire listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!(
            "  {} POST {}",
            console::style("↳").dim(),
            console::style(format!("http://{addr}/webhooks/dialect")).dim()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }
    tracing::info!(%addr, agents = state.registry().list().await.len(), "server started");

    let router = http::router::build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop intake, then let the dispatcher drain what is already queued.
    cancel.cancel();
    if let Err(e) = dispatcher_task.await {
        tracing::error!(error = %e, "dispatcher task failed");
    }

    if !quiet {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
