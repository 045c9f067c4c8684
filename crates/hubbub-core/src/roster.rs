use crate::bus::Signal;
use crate::client::Client;
use crate::event::{
    ConvId, MessageEvent, OutgoingSend, RosterSnapshot, SendOutcome, TypingEvent, UserId,
};
use chrono::{DateTime, Utc};
use std::cell::{Cell, Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("roster declares no self user")]
    MissingSelfUser,
    #[error("roster declares more than one self user")]
    MultipleSelfUsers,
    #[error("conversation {conv_id} references unknown user {user_id}")]
    UnknownParticipant { conv_id: ConvId, user_id: UserId },
    #[error("outgoing channel closed")]
    TransportGone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub first_name: String,
    pub is_self: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// One conversation: participants, buffered history and the signals that
/// fan events out to whatever is watching it (tab controller, tests).
pub struct Conversation {
    pub id: ConvId,
    users: Vec<Rc<User>>,
    last_modified: Cell<DateTime<Utc>>,
    messages: RefCell<Vec<ChatMessage>>,
    pub on_message: Signal<MessageEvent>,
    pub on_typing: Signal<TypingEvent>,
    pub on_send_result: Signal<SendOutcome>,
    outgoing: mpsc::UnboundedSender<OutgoingSend>,
}

impl Conversation {
    pub fn get_user(&self, id: &str) -> Option<&Rc<User>> {
        self.users.iter().find(|user| user.id == id)
    }

    pub fn users(&self) -> &[Rc<User>] {
        &self.users
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified.get()
    }

    pub fn messages(&self) -> Ref<'_, Vec<ChatMessage>> {
        self.messages.borrow()
    }

    /// Queue an outgoing send. The result arrives later as a `SendResult`
    /// event routed back through `on_send_result`.
    pub fn send_message(&self, text: &str) -> Result<(), CoreError> {
        self.outgoing
            .send(OutgoingSend {
                conv_id: self.id.clone(),
                text: text.to_string(),
            })
            .map_err(|_| CoreError::TransportGone)
    }

    fn deliver_message(&self, event: &MessageEvent) -> anyhow::Result<()> {
        self.messages.borrow_mut().push(ChatMessage {
            user_id: event.user_id.clone(),
            timestamp: event.timestamp,
            text: event.text.clone(),
        });
        if event.timestamp > self.last_modified.get() {
            self.last_modified.set(event.timestamp);
        }
        self.on_message.emit(event)
    }
}

/// Readable name for a conversation: the other user's full name for
/// one-to-one conversations, comma-joined first names for groups. The
/// truncated form shows at most two names plus a `+N` overflow marker.
pub fn conv_name(conv: &Conversation, truncate: bool) -> String {
    let mut participants: Vec<&Rc<User>> =
        conv.users().iter().filter(|user| !user.is_self).collect();
    participants.sort_by(|a, b| a.full_name.cmp(&b.full_name));
    let names: Vec<&str> = participants
        .iter()
        .map(|user| user.first_name.as_str())
        .collect();

    if participants.len() == 1 {
        participants[0].full_name.clone()
    } else if truncate && participants.len() > 2 {
        format!("{}, {}, +{}", names[0], names[1], names.len() - 2)
    } else {
        names.join(", ")
    }
}

/// Directory of all conversations for the session, built once from the
/// connect-time snapshot. Also the router that turns client-level events
/// into per-conversation signal emissions.
pub struct ConversationList {
    convs: HashMap<ConvId, Rc<Conversation>>,
    self_user: Rc<User>,
}

impl ConversationList {
    pub fn from_snapshot(
        snapshot: &RosterSnapshot,
        outgoing: mpsc::UnboundedSender<OutgoingSend>,
    ) -> Result<Self, CoreError> {
        let mut users: HashMap<UserId, Rc<User>> = HashMap::new();
        let mut self_user = None;
        for entry in &snapshot.users {
            let first_name = entry.first_name.clone().unwrap_or_else(|| {
                entry
                    .full_name
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });
            let user = Rc::new(User {
                id: entry.id.clone(),
                full_name: entry.full_name.clone(),
                first_name,
                is_self: entry.is_self,
            });
            if entry.is_self {
                if self_user.is_some() {
                    return Err(CoreError::MultipleSelfUsers);
                }
                self_user = Some(Rc::clone(&user));
            }
            users.insert(entry.id.clone(), user);
        }
        let self_user = self_user.ok_or(CoreError::MissingSelfUser)?;

        let mut convs = HashMap::new();
        for entry in &snapshot.conversations {
            let mut participants = Vec::with_capacity(entry.participants.len());
            for user_id in &entry.participants {
                let user =
                    users
                        .get(user_id)
                        .cloned()
                        .ok_or_else(|| CoreError::UnknownParticipant {
                            conv_id: entry.id.clone(),
                            user_id: user_id.clone(),
                        })?;
                participants.push(user);
            }
            let history: Vec<ChatMessage> = entry
                .history
                .iter()
                .map(|msg| ChatMessage {
                    user_id: msg.user_id.clone(),
                    timestamp: msg.timestamp,
                    text: msg.text.clone(),
                })
                .collect();
            let last_modified = entry
                .last_modified
                .or_else(|| history.last().map(|msg| msg.timestamp))
                .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC);
            convs.insert(
                entry.id.clone(),
                Rc::new(Conversation {
                    id: entry.id.clone(),
                    users: participants,
                    last_modified: Cell::new(last_modified),
                    messages: RefCell::new(history),
                    on_message: Signal::new(),
                    on_typing: Signal::new(),
                    on_send_result: Signal::new(),
                    outgoing: outgoing.clone(),
                }),
            );
        }

        Ok(Self { convs, self_user })
    }

    pub fn get(&self, id: &str) -> Option<Rc<Conversation>> {
        self.convs.get(id).cloned()
    }

    pub fn get_all(&self) -> Vec<Rc<Conversation>> {
        self.convs.values().cloned().collect()
    }

    pub fn self_user(&self) -> &Rc<User> {
        &self.self_user
    }

    /// Subscribe the routing observers on the client. Events for a
    /// conversation id the snapshot never mentioned are logged and dropped.
    pub fn wire(list: &Rc<Self>, client: &Client) {
        let routed = Rc::clone(list);
        client.on_message.connect(move |event: &MessageEvent| {
            match routed.convs.get(&event.conv_id) {
                Some(conv) => conv.deliver_message(event),
                None => {
                    warn!(conv_id = %event.conv_id, "message for unknown conversation");
                    Ok(())
                }
            }
        });

        let routed = Rc::clone(list);
        client.on_typing.connect(move |event: &TypingEvent| {
            match routed.convs.get(&event.conv_id) {
                Some(conv) => conv.on_typing.emit(event),
                None => {
                    warn!(conv_id = %event.conv_id, "typing update for unknown conversation");
                    Ok(())
                }
            }
        });

        let routed = Rc::clone(list);
        client.on_send_result.connect(move |outcome: &SendOutcome| {
            match routed.convs.get(&outcome.conv_id) {
                Some(conv) => conv.on_send_result.emit(outcome),
                None => {
                    warn!(conv_id = %outcome.conv_id, "send result for unknown conversation");
                    Ok(())
                }
            }
        });
    }
}
