use crate::app::{ActionQueue, UiAction};
use crate::tabs::TabKey;
use chrono::{DateTime, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use hubbub_core::client::Client;
use hubbub_core::event::{MessageEvent, SendOutcome, TypingEvent, TypingStatus, UserId};
use hubbub_core::roster::{conv_name, ChatMessage, Conversation};
use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::warn;

const SEND_FAILED: &str = "Failed to send message.";
const DISCONNECTED_BANNER: &str = "Disconnected. Messages will not be received.";
const RECONNECTED_BANNER: &str = "Connected.";

/// One rendered transcript line. Info lines (banners, send failures)
/// carry no sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub timestamp: DateTime<Utc>,
    pub sender: Option<String>,
    pub text: String,
}

impl TranscriptLine {
    pub fn date_str(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%I:%M:%S %p")
            .to_string()
    }
}

pub struct ConvoState {
    conv: Rc<Conversation>,
    actions: ActionQueue,
    transcript: Vec<TranscriptLine>,
    typing: HashMap<UserId, TypingStatus>,
    unread: usize,
    input: String,
}

/// Controller for one conversation tab: transcript, unread counter,
/// typing aggregation and outgoing submission. Created lazily the first
/// time a conversation is selected or receives a message, then kept for
/// the lifetime of the session.
pub struct ConvoTab {
    inner: Rc<RefCell<ConvoState>>,
}

impl ConvoTab {
    /// Subscribes to the conversation and connection signals, replays any
    /// buffered history (history never counts as unread), and publishes
    /// the initial title.
    pub fn open(client: &Client, conv: Rc<Conversation>, actions: ActionQueue) -> Self {
        let inner = Rc::new(RefCell::new(ConvoState {
            conv: Rc::clone(&conv),
            actions,
            transcript: Vec::new(),
            typing: HashMap::new(),
            unread: 0,
            input: String::new(),
        }));

        {
            let state = Rc::clone(&inner);
            client.on_disconnect.connect(move |_| {
                state.borrow_mut().push_info(DISCONNECTED_BANNER);
                Ok(())
            });
        }
        {
            let state = Rc::clone(&inner);
            client.on_reconnect.connect(move |_| {
                state.borrow_mut().push_info(RECONNECTED_BANNER);
                Ok(())
            });
        }
        {
            let state = Rc::clone(&inner);
            conv.on_message.connect(move |event: &MessageEvent| {
                state.borrow_mut().handle_message(event);
                Ok(())
            });
        }
        {
            let state = Rc::clone(&inner);
            conv.on_typing.connect(move |event: &TypingEvent| {
                state.borrow_mut().handle_typing(event);
                Ok(())
            });
        }
        {
            let state = Rc::clone(&inner);
            conv.on_send_result.connect(move |outcome: &SendOutcome| {
                if let Some(error) = &outcome.error {
                    warn!(conv_id = %outcome.conv_id, %error, "send failed");
                    state.borrow_mut().push_info(SEND_FAILED);
                }
                Ok(())
            });
        }

        {
            let history: Vec<ChatMessage> = conv.messages().clone();
            let conv_id = conv.id.clone();
            let mut state = inner.borrow_mut();
            for message in history {
                state.handle_message(&MessageEvent {
                    conv_id: conv_id.clone(),
                    user_id: message.user_id,
                    timestamp: message.timestamp,
                    text: message.text,
                });
            }
            state.unread = 0;
            state.publish_title();
        }

        Self { inner }
    }

    pub fn state(&self) -> Ref<'_, ConvoState> {
        self.inner.borrow()
    }

    /// Any keypress while this tab is focused marks the conversation read.
    pub fn handle_key(&self, key: KeyEvent) {
        let mut state = self.inner.borrow_mut();
        state.mark_read();
        match key.code {
            KeyCode::Enter => state.submit_input(),
            KeyCode::Backspace => {
                state.input.pop();
            }
            KeyCode::Char(ch)
                if key
                    .modifiers
                    .difference(KeyModifiers::SHIFT)
                    .is_empty() =>
            {
                state.input.push(ch);
            }
            _ => {}
        }
    }
}

impl ConvoState {
    fn handle_message(&mut self, event: &MessageEvent) {
        let (first_name, is_self) = match self.conv.get_user(&event.user_id) {
            Some(user) => (user.first_name.clone(), user.is_self),
            None => {
                warn!(user_id = %event.user_id, "message from unknown user");
                (event.user_id.clone(), false)
            }
        };
        self.transcript.push(TranscriptLine {
            timestamp: event.timestamp,
            sender: Some(first_name),
            text: event.text.clone(),
        });
        // A message implies its sender stopped typing.
        self.typing
            .insert(event.user_id.clone(), TypingStatus::Stopped);
        if !is_self {
            self.unread += 1;
            self.publish_title();
        }
    }

    fn handle_typing(&mut self, event: &TypingEvent) {
        self.typing.insert(event.user_id.clone(), event.status);
    }

    fn submit_input(&mut self) {
        let text = self.input.trim().to_string();
        self.input.clear();
        if text.is_empty() {
            return;
        }
        if self.conv.send_message(&text).is_err() {
            self.push_info(SEND_FAILED);
        }
    }

    fn push_info(&mut self, text: &str) {
        self.transcript.push(TranscriptLine {
            timestamp: Utc::now(),
            sender: None,
            text: text.to_string(),
        });
    }

    fn mark_read(&mut self) {
        self.unread = 0;
        self.publish_title();
    }

    fn publish_title(&self) {
        self.actions.borrow_mut().push_back(UiAction::SetTitle(
            TabKey::Conversation(self.conv.id.clone()),
            self.title(),
        ));
    }

    pub fn title(&self) -> String {
        let mut title = conv_name(&self.conv, true);
        if self.unread > 0 {
            title.push_str(&format!(" ({})", self.unread));
        }
        title
    }

    pub fn transcript(&self) -> &[TranscriptLine] {
        &self.transcript
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    /// Sorted first names of everyone currently typing, phrased per the
    /// usual singular/plural split. Empty when nobody is typing.
    pub fn status_line(&self) -> String {
        let mut typists: Vec<&str> = self
            .typing
            .iter()
            .filter(|(_, status)| **status == TypingStatus::Typing)
            .filter_map(|(user_id, _)| {
                self.conv
                    .get_user(user_id)
                    .map(|user| user.first_name.as_str())
            })
            .collect();
        if typists.is_empty() {
            return String::new();
        }
        typists.sort_unstable();
        let verb = if typists.len() == 1 { "is" } else { "are" };
        format!("{} {} typing...", typists.join(", "), verb)
    }
}
