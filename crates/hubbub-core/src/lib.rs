pub mod bus;
pub mod client;
pub mod event;
pub mod roster;

pub use client::Client;
pub use event::{
    ConvId, HistoryEntry, MessageEvent, NetworkEvent, OutgoingSend, RosterSnapshot, SendOutcome,
    TypingEvent, TypingStatus, UserId,
};
pub use roster::{conv_name, ChatMessage, Conversation, ConversationList, CoreError, User};
