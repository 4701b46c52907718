//! Clipboard trigger loop: poll a shared text buffer, upload when a marked
//! handoff appears, never upload the same content twice.

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

pub const DEFAULT_MARKER: &str = "[HANDOFF]";

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("clipboard: {0}")]
    Clipboard(String),

    #[error("upload: {0}")]
    Upload(String),
}

/// The shared text buffer being polled. The real implementation reads the
/// system clipboard; tests feed scripted text.
pub trait ClipboardSource {
    fn read_text(&mut self) -> Result<String, WatchError>;
}

/// Where triggered content goes. The real implementation POSTs to the hub.
#[async_trait]
pub trait HandoffSink: Send + Sync {
    async fn push(&self, content: &str) -> Result<(), WatchError>;
}

fn digest_of(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    Some(hasher.finalize().iter().map(|b| format!("{b:02x}")).collect())
}

/// Trigger state machine. Fires only when the content hash changed since the
/// last settled attempt AND the trimmed text starts with the marker.
pub struct Watcher {
    marker: String,
    last: Option<String>,
}

impl Watcher {
    /// Seeds the hash with whatever is already in the buffer so stale
    /// content present at startup never triggers.
    pub fn new(marker: impl Into<String>, initial_text: &str) -> Self {
        Self { marker: marker.into(), last: digest_of(initial_text) }
    }

    /// When `text` should trigger an upload, returns the digest to settle
    /// once the attempt completes.
    pub fn observe(&mut self, text: &str) -> Option<String> {
        let digest = digest_of(text)?;
        if Some(&digest) == self.last.as_ref() {
            return None;
        }
        if !text.trim().starts_with(self.marker.trim()) {
            return None;
        }
        Some(digest)
    }

    /// Record a completed attempt, success or failure. Unchanged content
    /// never retriggers; the operator retries by copying fresh content.
    pub fn settle(&mut self, digest: String) {
        self.last = Some(digest);
    }
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub marker: String,
    pub interval: Duration,
    /// Exit after the first successful upload.
    pub once: bool,
}

#[derive(Debug, Default)]
pub struct WatchStats {
    pub polls: u64,
    pub uploads: u64,
    pub failures: u64,
}

/// Poll until interrupted (or, in once mode, until the first successful
/// upload). Uploads run synchronously inside the loop, so attempts never
/// overlap; ctrl-c lands at a poll boundary.
pub async fn run<C, S>(cfg: WatchConfig, mut clipboard: C, sink: &S) -> WatchStats
where
    C: ClipboardSource,
    S: HandoffSink + ?Sized,
{
    let initial = clipboard.read_text().unwrap_or_default();
    let mut watcher = Watcher::new(cfg.marker.clone(), &initial);
    let mut stats = WatchStats::default();

    let mut ticker = tokio::time::interval(cfg.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(marker = %cfg.marker, interval_ms = cfg.interval.as_millis() as u64, once = cfg.once, "watching clipboard");

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted, stopping watcher");
                break;
            }
            _ = ticker.tick() => {}
        }

        stats.polls += 1;
        let text = match clipboard.read_text() {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "clipboard read failed");
                continue;
            }
        };
        let Some(digest) = watcher.observe(&text) else {
            continue;
        };

        info!("marker detected, uploading");
        match sink.push(&text).await {
            Ok(()) => {
                stats.uploads += 1;
                watcher.settle(digest);
                info!(uploads = stats.uploads, "upload complete");
                if cfg.once {
                    break;
                }
            }
            Err(e) => {
                stats.failures += 1;
                watcher.settle(digest);
                warn!(error = %e, "upload failed; copy fresh content to retry");
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_never_triggers() {
        let mut w = Watcher::new(DEFAULT_MARKER, "");
        assert!(w.observe("").is_none());
    }

    #[test]
    fn initial_content_is_seeded() {
        // marker content already on the clipboard at startup must not fire
        let mut w = Watcher::new(DEFAULT_MARKER, "[HANDOFF] stale");
        assert!(w.observe("[HANDOFF] stale").is_none());
    }

    #[test]
    fn marker_required() {
        let mut w = Watcher::new(DEFAULT_MARKER, "");
        assert!(w.observe("plain text without marker").is_none());
        assert!(w.observe("[HANDOFF] real handoff").is_some());
    }

    #[test]
    fn leading_whitespace_is_ignored() {
        let mut w = Watcher::new(DEFAULT_MARKER, "");
        assert!(w.observe("  \n[HANDOFF] indented").is_some());
    }

    #[test]
    fn unchanged_content_does_not_retrigger() {
        let mut w = Watcher::new(DEFAULT_MARKER, "");
        let digest = w.observe("[HANDOFF] ship it").expect("first poll triggers");
        w.settle(digest);
        assert!(w.observe("[HANDOFF] ship it").is_none());
    }

    #[test]
    fn settled_failure_does_not_retrigger() {
        let mut w = Watcher::new(DEFAULT_MARKER, "");
        let digest = w.observe("[HANDOFF] flaky").unwrap();
        // attempt failed — settling still records the hash
        w.settle(digest);
        assert!(w.observe("[HANDOFF] flaky").is_none());
        // edited content fires again
        assert!(w.observe("[HANDOFF] flaky, take two").is_some());
    }

    #[test]
    fn untriggered_observe_keeps_state() {
        let mut w = Watcher::new(DEFAULT_MARKER, "");
        assert!(w.observe("notes without the marker").is_none());
        // the non-marker content was not recorded; marker content still fires
        assert!(w.observe("[HANDOFF] now for real").is_some());
    }
}
