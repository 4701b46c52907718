//! memhub-watch — clipboard watcher that pushes marked handoffs to the hub.

use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use memhub::watch::{self, ClipboardSource, HandoffSink, WatchConfig, WatchError, DEFAULT_MARKER};

#[derive(Parser)]
#[command(name = "memhub-watch", version, about = "Watch the clipboard and push marked handoffs")]
struct Args {
    /// Hub base URL
    #[arg(long, default_value = "http://127.0.0.1:8787", env = "MEMHUB_URL")]
    url: String,

    /// Bearer token for the hub
    #[arg(long, env = "MEMHUB_API_KEY")]
    token: Option<String>,

    /// Workspace to push into
    #[arg(short, long, env = "MEMHUB_WORKSPACE")]
    workspace: String,

    /// Upload when clipboard text starts with this marker
    #[arg(long, default_value = DEFAULT_MARKER)]
    marker: String,

    /// Poll interval in seconds
    #[arg(long, default_value = "1.0")]
    interval: f64,

    /// Scope to push into: personal or team
    #[arg(long, default_value = "personal")]
    scope: String,

    /// Team key, for team scope
    #[arg(long)]
    team: Option<String>,

    /// Exit after the first successful upload
    #[arg(long)]
    once: bool,
}

struct SystemClipboard(arboard::Clipboard);

impl ClipboardSource for SystemClipboard {
    fn read_text(&mut self) -> Result<String, WatchError> {
        match self.0.get_text() {
            Ok(t) => Ok(t),
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(WatchError::Clipboard(e.to_string())),
        }
    }
}

struct HttpSink {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    workspace: String,
    scope: String,
    team: Option<String>,
}

#[async_trait::async_trait]
impl HandoffSink for HttpSink {
    async fn push(&self, content: &str) -> Result<(), WatchError> {
        let mut req = self
            .client
            .post(format!("{}/sessions", self.url))
            .json(&serde_json::json!({
                "workspace_id": self.workspace,
                "scope": self.scope,
                "team_key": self.team,
                "content": content,
            }));
        if let Some(ref t) = self.token {
            req = req.bearer_auth(t);
        }
        let res = req.send().await.map_err(|e| WatchError::Upload(e.to_string()))?;
        if !res.status().is_success() {
            return Err(WatchError::Upload(format!("hub returned {}", res.status())));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let clipboard = match arboard::Clipboard::new() {
        Ok(c) => SystemClipboard(c),
        Err(e) => {
            eprintln!("no clipboard available: {e}");
            std::process::exit(1);
        }
    };

    let sink = HttpSink {
        client: reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build http client"),
        url: args.url.trim_end_matches('/').to_string(),
        token: args.token,
        workspace: args.workspace,
        scope: args.scope,
        team: args.team,
    };

    let cfg = WatchConfig {
        marker: args.marker,
        interval: Duration::from_secs_f64(args.interval.max(0.1)),
        once: args.once,
    };

    let stats = watch::run(cfg, clipboard, &sink).await;
    info!(polls = stats.polls, uploads = stats.uploads, failures = stats.failures, "watcher stopped");
}
