//! Desktop notifications for incoming messages.
//!
//! Uses the `gdbus` utility to post freedesktop.org notifications. Each
//! notification carries the handle of the previous one as its replaces-id,
//! so a new notification supersedes the visible one instead of stacking.
//! Sink failures are logged and never reach the message-event pipeline.

use async_trait::async_trait;
use hubbub_core::client::Client;
use hubbub_core::event::MessageEvent;
use hubbub_core::roster::ConversationList;
use regex::Regex;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Replaces-id meaning "do not replace anything".
pub const NO_REPLACE: u32 = 0;

pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to run notification command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("notification command timed out")]
    Timeout,
    #[error("notification command exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },
    #[error("could not parse notification id from {0:?}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub sender: String,
    pub text: String,
}

/// Narrow boundary around the concrete notification mechanism so the
/// replacement state machine can be driven by a mock in tests and swapped
/// per platform.
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn notify(&self, replaces: u32, sender: &str, text: &str) -> Result<u32, NotifyError>;
}

/// Posts notifications through `gdbus call` against
/// `org.freedesktop.Notifications`, bounded by a timeout so a hung sink
/// cannot stall the worker.
pub struct GdbusSink {
    timeout: Duration,
}

impl GdbusSink {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for GdbusSink {
    fn default() -> Self {
        Self::new(DEFAULT_SINK_TIMEOUT)
    }
}

#[async_trait]
impl NotifySink for GdbusSink {
    async fn notify(&self, replaces: u32, sender: &str, text: &str) -> Result<u32, NotifyError> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new("gdbus")
                .args([
                    "call",
                    "--session",
                    "--dest",
                    "org.freedesktop.Notifications",
                    "--object-path",
                    "/org/freedesktop/Notifications",
                    "--method",
                    "org.freedesktop.Notifications.Notify",
                    "hubbub",
                    &replaces.to_string(),
                    "",
                    sender,
                    text,
                    "[]",
                    "{}",
                    "-1",
                ])
                .output(),
        )
        .await
        .map_err(|_| NotifyError::Timeout)??;

        if !output.status.success() {
            return Err(NotifyError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_notify_reply(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse the gdbus reply `(uint32 N,)` into the next replaces-id.
pub fn parse_notify_reply(output: &str) -> Result<u32, NotifyError> {
    static REPLY_RE: OnceLock<Regex> = OnceLock::new();
    let re = REPLY_RE.get_or_init(|| Regex::new(r"\(uint32 (\d+),\)").expect("valid regex"));
    re.captures(output.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse().ok())
        .ok_or_else(|| NotifyError::Parse(output.trim().to_string()))
}

/// Escape the markup characters freedesktop.org notifications interpret.
pub fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Receives message events and hands sanitized payloads to a dedicated
/// worker task, keeping the sink's subprocess call off the UI loop.
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn spawn<S: NotifySink + 'static>(sink: S) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(sink, rx));
        Self { tx }
    }

    /// Subscribe to incoming messages. Self-authored messages never
    /// produce a notification; lookup failures are logged and dropped.
    pub fn attach(&self, client: &Client, convs: Rc<ConversationList>) {
        let tx = self.tx.clone();
        client.on_message.connect(move |event: &MessageEvent| {
            let Some(conv) = convs.get(&event.conv_id) else {
                debug!(conv_id = %event.conv_id, "no notification: unknown conversation");
                return Ok(());
            };
            let Some(user) = conv.get_user(&event.user_id).cloned() else {
                debug!(user_id = %event.user_id, "no notification: unknown sender");
                return Ok(());
            };
            if user.is_self {
                return Ok(());
            }
            let note = Notification {
                sender: escape_markup(&user.full_name),
                text: escape_markup(&event.text),
            };
            if tx.send(note).is_err() {
                warn!("notification worker is gone");
            }
            Ok(())
        });
    }
}

/// Serializes sink calls and owns the replacement handle: updated only on a
/// successful call, left unchanged on any failure so the next notification
/// still replaces the last successfully posted one.
async fn run_worker<S: NotifySink>(sink: S, mut rx: mpsc::UnboundedReceiver<Notification>) {
    let mut replaces = NO_REPLACE;
    while let Some(note) = rx.recv().await {
        match sink.notify(replaces, &note.sender, &note.text).await {
            Ok(handle) => {
                debug!(handle, "notification posted");
                replaces = handle;
            }
            Err(NotifyError::Parse(raw)) => {
                warn!(reply = %raw, "failed to parse notification command result");
            }
            Err(err) => {
                warn!(error = %err, "notification command failed");
            }
        }
    }
}
