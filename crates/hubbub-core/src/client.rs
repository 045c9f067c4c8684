use crate::bus::Signal;
use crate::event::{MessageEvent, NetworkEvent, RosterSnapshot, SendOutcome, TypingEvent};

/// Session-level event hub. The transport feeds `dispatch`; everything else
/// (orchestrator, roster router, notifier, open tabs) subscribes to the
/// signals it fans out. Delivery is synchronous and single-threaded, so one
/// logical event is fully handled before the next is dispatched.
pub struct Client {
    pub on_connect: Signal<RosterSnapshot>,
    pub on_disconnect: Signal<()>,
    pub on_reconnect: Signal<()>,
    pub on_message: Signal<MessageEvent>,
    pub on_typing: Signal<TypingEvent>,
    pub on_send_result: Signal<SendOutcome>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self {
            on_connect: Signal::new(),
            on_disconnect: Signal::new(),
            on_reconnect: Signal::new(),
            on_message: Signal::new(),
            on_typing: Signal::new(),
            on_send_result: Signal::new(),
        }
    }

    /// Translate one transport event into exactly one signal emission.
    /// Observer errors propagate to the caller, aborting the remaining
    /// observers for that emission.
    pub fn dispatch(&self, event: NetworkEvent) -> anyhow::Result<()> {
        match event {
            NetworkEvent::Connected(roster) => self.on_connect.emit(&roster),
            NetworkEvent::Reconnected => self.on_reconnect.emit(&()),
            NetworkEvent::Disconnected => self.on_disconnect.emit(&()),
            NetworkEvent::Message(message) => self.on_message.emit(&message),
            NetworkEvent::Typing(typing) => self.on_typing.emit(&typing),
            NetworkEvent::SendResult(outcome) => self.on_send_result.emit(&outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn dispatch_routes_each_event_to_its_signal() {
        let client = Client::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let log = Rc::clone(&log);
            client.on_disconnect.connect(move |_| {
                log.borrow_mut().push("disconnect");
                Ok(())
            });
        }
        {
            let log = Rc::clone(&log);
            client.on_message.connect(move |_: &MessageEvent| {
                log.borrow_mut().push("message");
                Ok(())
            });
        }

        client.dispatch(NetworkEvent::Disconnected).unwrap();
        client
            .dispatch(NetworkEvent::Message(MessageEvent {
                conv_id: "c".to_string(),
                user_id: "u".to_string(),
                timestamp: Utc::now(),
                text: "hey".to_string(),
            }))
            .unwrap();

        assert_eq!(*log.borrow(), vec!["disconnect", "message"]);
    }
}
