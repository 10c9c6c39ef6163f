// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// - config:       Configuration structs loaded from JSON
// - schema:       Event records and control messages
// - session:      Per-page-load session identity
// - util:         Shared helpers (endpoint building, text trimming)
// - control:      Start command parsing
// - dom:          Document abstraction + scripted page
// - emitter:      Fire-and-forget event delivery
// - watcher:      Join and roster watchers
// - orchestrator: Page-load / teardown wiring
//
mod config;
mod schema;
mod session;
mod util;
mod control;
mod dom;
mod emitter;
mod watcher;
mod orchestrator;
mod metrics;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, sleep};

use config::Config;
use dom::scripted::{Scenario, ScriptedDocument};
use emitter::transport::{DemoTransport, HttpTransport, Transport};
use metrics::METRICS;
use orchestrator::{Orchestrator, PageContext};
use schema::StartResponse;

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Load configuration
// - Accept one start command from the control surface (stdin)
// - Build the collector transport
// - Load the page and run it until unload or Ctrl-C
// - Give the final events a bounded chance to leave the process
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config = load_config(&config_path)?;

    // --------------------------------------------------------
    // Start handshake
    // --------------------------------------------------------
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read start command")?;

    let command = match control::parse_start_command(&line) {
        Ok(cmd) => cmd,
        Err(e) => {
            respond(&StartResponse::failed(e.clone()));
            return Err(anyhow!(e));
        }
    };

    let endpoint = config
        .collector
        .endpoint
        .clone()
        .unwrap_or_else(|| util::collector_endpoint(command.backend_base_url()));

    let transport: Arc<dyn Transport> = if config.collector.demo {
        warn!("Collector running in DEMO mode, nothing is sent");
        Arc::new(DemoTransport)
    } else {
        match HttpTransport::new(
            endpoint.clone(),
            Duration::from_millis(config.collector.timeout_ms),
        ) {
            Ok(t) => Arc::new(t),
            Err(e) => {
                respond(&StartResponse::failed(format!("{:#}", e)));
                return Err(e);
            }
        }
    };

    let scenario = match &config.scenario {
        Some(path) => Scenario::load(path)
            .with_context(|| format!("failed to load scenario {}", path))?,
        None => Scenario::default(),
    };

    respond(&StartResponse::ok());
    info!(
        "Watching {} (interview {}), reporting to {}",
        command.meet_url(),
        command.interview_id().unwrap_or("-"),
        endpoint
    );

    // --------------------------------------------------------
    // Metrics reporter (periodic, low-noise)
    // --------------------------------------------------------
    if config.debug.metrics {
        tokio::spawn(async {
            loop {
                sleep(Duration::from_secs(10)).await;
                info!("[METRICS] {}", METRICS.summary());
            }
        });
    }

    // --------------------------------------------------------
    // Page load
    // --------------------------------------------------------
    let doc = Arc::new(ScriptedDocument::new());
    let context = PageContext {
        meet_url: Some(command.meet_url().to_string()),
        interview_id: command.interview_id().map(str::to_string),
    };

    let start = Instant::now();
    let orchestrator = Orchestrator::start(doc.clone(), transport, &config, &context)?;

    let player = tokio::spawn({
        let doc = doc.clone();
        let scenario = scenario.clone();
        async move { scenario.play(&doc, start).await }
    });

    // --------------------------------------------------------
    // Page lifetime: scenario unload or Ctrl-C
    // --------------------------------------------------------
    let unload = async {
        match scenario.unload_after() {
            Some(after) => tokio::time::sleep_until(start + after).await,
            None => futures_util::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = unload => info!("Page unloading"),
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!("Ctrl-C handler failed: {}", e);
            }
            info!("Interrupted, unloading page");
        }
    }

    // --------------------------------------------------------
    // Teardown
    // --------------------------------------------------------
    player.abort();
    info!(
        "Session {} ending, join watcher {:?}",
        orchestrator.session(),
        orchestrator.join_state()
    );
    let emitter = orchestrator.teardown();

    let grace = Duration::from_millis(config.collector.flush_grace_ms);
    if !emitter.flush(grace).await {
        warn!(
            "{} event(s) still in flight after {:?}, dropping",
            emitter.in_flight(),
            grace
        );
    }

    info!("[METRICS] {}", METRICS.summary());
    Ok(())
}

fn respond(response: &StartResponse) {
    match serde_json::to_string(response) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("failed to encode start response: {}", e),
    }
}

// ------------------------------------------------------------
// Configuration loader
// ------------------------------------------------------------
//
// A missing file is not an error: every field has a default.
//
fn load_config(path: &str) -> anyhow::Result<Config> {
    let cfg: Config = match fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data)
            .with_context(|| format!("invalid config {}", path))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("{} not found, using defaults", path);
            Config::default()
        }
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path)),
    };
    cfg.validate()?;
    Ok(cfg)
}
