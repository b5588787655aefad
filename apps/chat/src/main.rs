use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{SessionController, SessionEvent, SubmitOutcome, WsRelayTransport};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

const QUIT_COMMAND: &str = "/quit";

#[derive(Parser, Debug)]
#[command(about = "Terminal client for the chat relay")]
struct Args {
    /// Relay websocket URL (ws://, wss://, http:// or https://).
    #[arg(long)]
    relay_url: Option<String>,
    /// Config file; defaults to ./chat.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    no_reconnect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref())?;
    if let Some(relay_url) = args.relay_url {
        settings.relay_url = relay_url;
    }
    if args.no_reconnect {
        settings.reconnect = false;
    }

    let transport = WsRelayTransport::new(settings.transport_settings())
        .context("invalid relay configuration")?;
    let controller = SessionController::attach(transport.clone()).await;
    let renderer = spawn_renderer(Arc::clone(&controller));
    transport.run().await?;
    println!(
        "Connecting to {}. Type a message and press Enter; {QUIT_COMMAND} leaves.",
        transport.relay_url()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim() == QUIT_COMMAND {
            break;
        }
        if let SubmitOutcome::Forwarded(payload) = controller.submit_message(&line).await {
            debug!(unassigned = payload.is_unassigned_origin(), "submitted message");
        }
    }

    controller.dispose().await;
    transport.shutdown().await;
    let _ = renderer.await;
    Ok(())
}

fn spawn_renderer(controller: Arc<SessionController>) -> JoinHandle<()> {
    let mut events = controller.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::FeedAppended { entry, .. }) => {
                    let identity = controller.current_identity().await;
                    println!("{}", render::render_entry(&entry, &identity));
                }
                Ok(SessionEvent::IdentityChanged(identity)) => {
                    println!("{}", render::render_identity(&identity));
                }
                Ok(SessionEvent::RelayError(err)) => eprintln!("relay error: {}", err.message),
                Ok(SessionEvent::Disposed) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "renderer fell behind"),
            }
        }
    })
}
