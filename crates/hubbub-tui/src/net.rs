//! Transport seam. The protocol client proper lives outside this crate;
//! whatever implements it only has to feed `NetworkEvent`s into the event
//! channel and consume `OutgoingSend`s from the other one.
//!
//! The loopback transport below is the development stand-in: it loads a
//! roster snapshot, reports Connected, and echoes outgoing sends back as
//! self-authored messages after acknowledging them.

use anyhow::{Context, Result};
use chrono::Utc;
use hubbub_core::event::{MessageEvent, NetworkEvent, OutgoingSend, RosterSnapshot, SendOutcome};
use std::fs;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::debug;

pub fn load_roster(path: &Path) -> Result<RosterSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read roster file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse roster file {}", path.display()))
}

/// Built-in demo roster used when no roster file is given.
pub fn sample_roster() -> RosterSnapshot {
    let raw = include_str!("sample_roster.json");
    serde_json::from_str(raw).expect("valid sample roster")
}

pub fn spawn_loopback(
    roster: RosterSnapshot,
) -> (
    mpsc::UnboundedReceiver<NetworkEvent>,
    mpsc::UnboundedSender<OutgoingSend>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutgoingSend>();
    let self_id = roster
        .users
        .iter()
        .find(|user| user.is_self)
        .map(|user| user.id.clone())
        .unwrap_or_default();

    tokio::spawn(async move {
        let _ = event_tx.send(NetworkEvent::Connected(roster));
        while let Some(send) = out_rx.recv().await {
            debug!(conv_id = %send.conv_id, "loopback echoing send");
            let _ = event_tx.send(NetworkEvent::SendResult(SendOutcome::ok(
                send.conv_id.clone(),
            )));
            let _ = event_tx.send(NetworkEvent::Message(MessageEvent {
                conv_id: send.conv_id,
                user_id: self_id.clone(),
                timestamp: Utc::now(),
                text: send.text,
            }));
        }
    });

    (event_rx, out_tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_roster_parses_and_has_a_self_user() {
        let roster = sample_roster();
        assert_eq!(
            roster.users.iter().filter(|user| user.is_self).count(),
            1
        );
        assert!(!roster.conversations.is_empty());
    }

    #[tokio::test]
    async fn loopback_connects_then_echoes_sends() {
        let (mut events, out_tx) = spawn_loopback(sample_roster());

        let first = events.recv().await.unwrap();
        assert!(matches!(first, NetworkEvent::Connected(_)));

        let conv_id = match &first {
            NetworkEvent::Connected(roster) => roster.conversations[0].id.clone(),
            _ => unreachable!(),
        };
        out_tx
            .send(OutgoingSend {
                conv_id: conv_id.clone(),
                text: "ping".to_string(),
            })
            .unwrap();

        let ack = events.recv().await.unwrap();
        assert!(
            matches!(ack, NetworkEvent::SendResult(SendOutcome { conv_id: ref id, error: None }) if *id == conv_id)
        );
        let echo = events.recv().await.unwrap();
        match echo {
            NetworkEvent::Message(message) => {
                assert_eq!(message.conv_id, conv_id);
                assert_eq!(message.text, "ping");
            }
            other => panic!("expected echoed message, got {other:?}"),
        }
    }
}
