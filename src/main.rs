// Terminal front end for the turn engine

use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use jarvis_lib::config::{self, ResponderKind};
use jarvis_lib::conversation::{self, ConversationState, OrchestratorEvent, TurnOrchestrator};
use jarvis_lib::services::{TerminalCapture, TerminalPlayback};
use jarvis_lib::{device_id, init_logging, responder};

const HELP: &str = "Commands: /start, /stop (or an empty line), /clear, /log, /quit. \
                    While listening, every other line is treated as recognised speech.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Using default configuration ({})", e);
            config::Config::default()
        }
    };
    init_logging(&cfg.general);
    tracing::info!("Jarvis starting");

    let device_id = match cfg.responder.kind {
        ResponderKind::Chat => device_id::get_device_id()
            .map_err(|e| tracing::warn!("Failed to load device id: {}", e))
            .ok(),
        ResponderKind::Rules => None,
    };
    let responder = responder::from_config(&cfg.responder, device_id);

    let (handle, inbox) = conversation::channel();
    let capture = Arc::new(TerminalCapture::new(handle.clone()));
    let playback = Arc::new(TerminalPlayback::new(handle.clone()));
    let orchestrator = TurnOrchestrator::new(
        &cfg.turn,
        inbox,
        capture.clone(),
        playback,
        responder,
    );
    let engine = orchestrator.spawn();

    let mut events = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                OrchestratorEvent::StateChanged { new, .. } => {
                    println!("[{}]", new.description());
                }
                OrchestratorEvent::CaptureError { message } => println!("! {}", message),
                _ => {}
            }
        }
    });

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read from stdin")?
    {
        match line.trim() {
            "/quit" => break,
            "/start" => handle.start_turn()?,
            "/stop" | "" => handle.end_turn()?,
            "/clear" => {
                if handle.state() != ConversationState::Idle {
                    println!("The log can only be cleared while idle");
                } else {
                    handle.clear_log()?;
                }
            }
            "/log" => {
                for message in handle.status().messages {
                    println!(
                        "{} {:?}: {}",
                        message.timestamp.format("%H:%M:%S"),
                        message.role,
                        message.text
                    );
                }
            }
            "/help" => println!("{}", HELP),
            text => {
                if !capture.feed(text) {
                    println!("Not listening. Type /start to begin a turn.");
                }
            }
        }
    }

    // The terminal services hold handles, so the engine only stops on request
    handle.shutdown()?;
    engine.await.context("Turn orchestrator task failed")?;
    tracing::info!("Jarvis stopped");
    Ok(())
}
