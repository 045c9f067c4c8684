use crate::convo::ConvoTab;
use crate::keys::KeyBindings;
use crate::tabs::{TabKey, TabRegistry};
use crate::theme::Palette;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use hubbub_core::client::Client;
use hubbub_core::event::{ConvId, MessageEvent, OutgoingSend, RosterSnapshot};
use hubbub_core::roster::{conv_name, ConversationList};
use hubbub_notify::Notifier;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tokio::sync::mpsc;
use tracing::warn;

pub const PICKER_TITLE: &str = "Conversations";

/// Deferred UI effects published by controllers while an event is being
/// delivered. The event loop drains them before the next draw, which keeps
/// title publication out of the app's own mutable borrow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    SetTitle(TabKey, String),
}

pub type ActionQueue = Rc<RefCell<VecDeque<UiAction>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing on screen but the placeholder; no tabs exist yet.
    Connecting,
    /// Roster and picker built, picker focused.
    Connected,
    /// At least one conversation tab is open.
    Running,
}

/// Conversation picker entries, most recently modified first.
#[derive(Debug, Default)]
pub struct PickerState {
    pub entries: Vec<(ConvId, String)>,
    pub selected: usize,
}

/// Top-level controller: owns the tab registry, the picker and every open
/// conversation tab, and routes incoming events to the right one.
pub struct ChatApp {
    pub keys: KeyBindings,
    pub palette: Palette,
    pub phase: Phase,
    pub tabs: TabRegistry,
    pub picker: PickerState,
    convo_tabs: HashMap<ConvId, ConvoTab>,
    convs: Option<Rc<ConversationList>>,
    actions: ActionQueue,
    pub should_quit: bool,
}

impl ChatApp {
    pub fn new(keys: KeyBindings, palette: Palette, actions: ActionQueue) -> Self {
        Self {
            keys,
            palette,
            phase: Phase::Connecting,
            tabs: TabRegistry::new(),
            picker: PickerState::default(),
            convo_tabs: HashMap::new(),
            convs: None,
            actions,
            should_quit: false,
        }
    }

    pub fn convo_tab(&self, conv_id: &str) -> Option<&ConvoTab> {
        self.convo_tabs.get(conv_id)
    }

    /// First successful connection: build the conversation directory and
    /// the picker tab, and focus the picker.
    fn install_roster(&mut self, convs: Rc<ConversationList>) {
        let mut all = convs.get_all();
        all.sort_by(|a, b| b.last_modified().cmp(&a.last_modified()));
        self.picker = PickerState {
            entries: all
                .iter()
                .map(|conv| (conv.id.clone(), conv_name(conv, false)))
                .collect(),
            selected: 0,
        };
        self.convs = Some(convs);
        self.tabs
            .upsert(TabKey::Picker, Some(PICKER_TITLE.to_string()), true);
        self.phase = Phase::Connected;
    }

    /// Look up or lazily create the tab for a conversation. Created at
    /// most once per conversation id; an incoming message appends the tab
    /// without stealing focus, an explicit selection also focuses it.
    fn ensure_conversation_tab(&mut self, client: &Client, conv_id: &str, focus: bool) {
        let Some(convs) = &self.convs else {
            warn!(%conv_id, "event before the roster is built");
            return;
        };
        if !self.convo_tabs.contains_key(conv_id) {
            let Some(conv) = convs.get(conv_id) else {
                warn!(%conv_id, "no such conversation");
                return;
            };
            let tab = ConvoTab::open(client, conv, Rc::clone(&self.actions));
            self.convo_tabs.insert(conv_id.to_string(), tab);
            self.tabs
                .upsert(TabKey::Conversation(conv_id.to_string()), None, false);
            self.phase = Phase::Running;
        }
        if focus {
            self.tabs
                .upsert(TabKey::Conversation(conv_id.to_string()), None, true);
        }
    }

    pub fn handle_key(&mut self, client: &Client, key: KeyEvent) {
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        if self.phase == Phase::Connecting {
            return;
        }
        if self.keys.next_tab.matches(&key) {
            self.tabs.focus_next();
            return;
        }
        if self.keys.prev_tab.matches(&key) {
            self.tabs.focus_prev();
            return;
        }
        match self.tabs.focused().cloned() {
            Some(TabKey::Picker) => self.handle_picker_key(client, key),
            Some(TabKey::Conversation(conv_id)) => {
                if let Some(tab) = self.convo_tabs.get(&conv_id) {
                    tab.handle_key(key);
                }
            }
            None => {}
        }
    }

    fn handle_picker_key(&mut self, client: &Client, key: KeyEvent) {
        match key.code {
            KeyCode::Up => {
                self.picker.selected = self.picker.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.picker.selected + 1 < self.picker.entries.len() {
                    self.picker.selected += 1;
                }
            }
            KeyCode::Enter => {
                if let Some((conv_id, _)) = self.picker.entries.get(self.picker.selected).cloned()
                {
                    self.ensure_conversation_tab(client, &conv_id, true);
                }
            }
            _ => {}
        }
    }

    pub fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::SetTitle(key, title) => self.tabs.upsert(key, Some(title), false),
        }
    }
}

/// Subscribe the orchestrator, roster router and notifier on the client.
///
/// The order of the `on_message` subscriptions is load-bearing: the
/// orchestrator first (a freshly opened tab replays history that does not
/// yet include the arriving message), then the router (buffer append and
/// per-conversation emission), then the notifier (lookup only). The three
/// are independent subscriptions, so a notifier fault cannot abort UI
/// delivery of the same event.
pub fn wire(
    app: &Rc<RefCell<ChatApp>>,
    client: &Rc<Client>,
    notifier: Notifier,
    outgoing: mpsc::UnboundedSender<OutgoingSend>,
) {
    {
        let app = Rc::clone(app);
        let client_ref = Rc::clone(client);
        client.on_message.connect(move |event: &MessageEvent| {
            app.borrow_mut()
                .ensure_conversation_tab(&client_ref, &event.conv_id, false);
            Ok(())
        });
    }
    {
        let app = Rc::clone(app);
        let client_ref = Rc::clone(client);
        client.on_connect.connect(move |roster: &RosterSnapshot| {
            let convs = Rc::new(ConversationList::from_snapshot(roster, outgoing.clone())?);
            ConversationList::wire(&convs, &client_ref);
            notifier.attach(&client_ref, Rc::clone(&convs));
            app.borrow_mut().install_roster(convs);
            Ok(())
        });
    }
}

/// Drain deferred UI actions into the registry. Runs on the event loop
/// between dispatching an event and the next draw.
pub fn drain_actions(app: &Rc<RefCell<ChatApp>>, actions: &ActionQueue) {
    loop {
        let action = actions.borrow_mut().pop_front();
        let Some(action) = action else { break };
        app.borrow_mut().apply(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::parse_chord;
    use crate::theme;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use hubbub_core::event::{
        ConversationEntry, HistoryEntry, NetworkEvent, TypingEvent, UserEntry,
    };
    use hubbub_notify::{NotifyError, NotifySink};

    struct NullSink;

    #[async_trait]
    impl NotifySink for NullSink {
        async fn notify(
            &self,
            _replaces: u32,
            _sender: &str,
            _text: &str,
        ) -> Result<u32, NotifyError> {
            Ok(1)
        }
    }

    struct Harness {
        app: Rc<RefCell<ChatApp>>,
        client: Rc<Client>,
        actions: ActionQueue,
        _out_rx: mpsc::UnboundedReceiver<OutgoingSend>,
    }

    impl Harness {
        fn dispatch(&self, event: NetworkEvent) {
            self.client.dispatch(event).unwrap();
            drain_actions(&self.app, &self.actions);
        }

        fn press(&self, code: KeyCode) {
            let key = KeyEvent::new(code, KeyModifiers::NONE);
            let client = Rc::clone(&self.client);
            self.app.borrow_mut().handle_key(&client, key);
            drain_actions(&self.app, &self.actions);
        }

        fn chord(&self, spec: &str) {
            let chord = parse_chord(spec).unwrap();
            let key = KeyEvent::new(chord.code, chord.modifiers);
            let client = Rc::clone(&self.client);
            self.app.borrow_mut().handle_key(&client, key);
            drain_actions(&self.app, &self.actions);
        }

        fn focused(&self) -> Option<TabKey> {
            self.app.borrow().tabs.focused().cloned()
        }

        fn title_of(&self, key: &TabKey) -> Option<String> {
            self.app
                .borrow()
                .tabs
                .iter()
                .find(|(k, _, _)| *k == key)
                .map(|(_, title, _)| title.to_string())
        }
    }

    fn snapshot() -> RosterSnapshot {
        RosterSnapshot {
            users: vec![
                UserEntry {
                    id: "u-me".to_string(),
                    full_name: "Mel Harper".to_string(),
                    first_name: None,
                    is_self: true,
                },
                UserEntry {
                    id: "u-dana".to_string(),
                    full_name: "Dana".to_string(),
                    first_name: None,
                    is_self: false,
                },
                UserEntry {
                    id: "u-alice".to_string(),
                    full_name: "Alice Reyes".to_string(),
                    first_name: None,
                    is_self: false,
                },
            ],
            conversations: vec![
                ConversationEntry {
                    id: "c-dana".to_string(),
                    participants: vec!["u-me".to_string(), "u-dana".to_string()],
                    last_modified: Some(Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap()),
                    history: Vec::<HistoryEntry>::new(),
                },
                ConversationEntry {
                    id: "c-alice".to_string(),
                    participants: vec!["u-me".to_string(), "u-alice".to_string()],
                    last_modified: Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()),
                    history: Vec::<HistoryEntry>::new(),
                },
            ],
        }
    }

    fn harness() -> Harness {
        let actions: ActionQueue = Rc::new(RefCell::new(VecDeque::new()));
        let keys = KeyBindings {
            next_tab: parse_chord("ctrl-d").unwrap(),
            prev_tab: parse_chord("ctrl-u").unwrap(),
        };
        let palette = theme::scheme("default").unwrap();
        let app = Rc::new(RefCell::new(ChatApp::new(
            keys,
            palette,
            Rc::clone(&actions),
        )));
        let client = Rc::new(Client::new());
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let notifier = Notifier::spawn(NullSink);
        wire(&app, &client, notifier, out_tx);
        Harness {
            app,
            client,
            actions,
            _out_rx: out_rx,
        }
    }

    fn message(conv_id: &str, user_id: &str, text: &str) -> NetworkEvent {
        NetworkEvent::Message(MessageEvent {
            conv_id: conv_id.to_string(),
            user_id: user_id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap(),
            text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn connect_builds_picker_sorted_by_recency() {
        let h = harness();
        assert_eq!(h.app.borrow().phase, Phase::Connecting);

        h.dispatch(NetworkEvent::Connected(snapshot()));

        let app = h.app.borrow();
        assert_eq!(app.phase, Phase::Connected);
        assert_eq!(app.tabs.len(), 1);
        let ids: Vec<&str> = app
            .picker
            .entries
            .iter()
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(ids, vec!["c-dana", "c-alice"]);
        drop(app);
        assert_eq!(h.focused(), Some(TabKey::Picker));
        assert_eq!(
            h.title_of(&TabKey::Picker).as_deref(),
            Some(PICKER_TITLE)
        );
    }

    #[tokio::test]
    async fn incoming_message_opens_tab_without_stealing_focus() {
        let h = harness();
        h.dispatch(NetworkEvent::Connected(snapshot()));

        h.dispatch(message("c-dana", "u-dana", "hi there"));

        let app = h.app.borrow();
        assert_eq!(app.phase, Phase::Running);
        assert_eq!(app.tabs.len(), 2);
        drop(app);
        assert_eq!(h.focused(), Some(TabKey::Picker));
        assert_eq!(
            h.title_of(&TabKey::Conversation("c-dana".to_string()))
                .as_deref(),
            Some("Dana (1)")
        );
    }

    #[tokio::test]
    async fn repeated_messages_reuse_the_same_tab() {
        let h = harness();
        h.dispatch(NetworkEvent::Connected(snapshot()));

        h.dispatch(message("c-dana", "u-dana", "one"));
        h.dispatch(message("c-dana", "u-dana", "two"));

        let app = h.app.borrow();
        assert_eq!(app.tabs.len(), 2);
        let tab = app.convo_tab("c-dana").unwrap();
        assert_eq!(tab.state().unread(), 2);
        assert_eq!(tab.state().transcript().len(), 2);
        drop(app);
        assert_eq!(
            h.title_of(&TabKey::Conversation("c-dana".to_string()))
                .as_deref(),
            Some("Dana (2)")
        );
    }

    #[tokio::test]
    async fn picker_selection_opens_and_focuses_tab() {
        let h = harness();
        h.dispatch(NetworkEvent::Connected(snapshot()));

        h.press(KeyCode::Down);
        h.press(KeyCode::Enter);

        assert_eq!(
            h.focused(),
            Some(TabKey::Conversation("c-alice".to_string()))
        );
        assert_eq!(h.app.borrow().phase, Phase::Running);
    }

    #[tokio::test]
    async fn dana_scenario_title_before_and_after_focus() {
        let h = harness();
        h.dispatch(NetworkEvent::Connected(snapshot()));
        h.dispatch(message("c-dana", "u-dana", "hi there"));

        let dana = TabKey::Conversation("c-dana".to_string());
        assert_eq!(h.title_of(&dana).as_deref(), Some("Dana (1)"));

        // Switch to the tab and press a key while it is focused.
        h.chord("ctrl-d");
        assert_eq!(h.focused(), Some(dana.clone()));
        h.press(KeyCode::Char('x'));

        assert_eq!(h.title_of(&dana).as_deref(), Some("Dana"));
    }

    #[tokio::test]
    async fn tab_navigation_chords_cycle_tabs() {
        let h = harness();
        h.dispatch(NetworkEvent::Connected(snapshot()));
        h.dispatch(message("c-dana", "u-dana", "hi"));
        h.dispatch(message("c-alice", "u-alice", "hello"));

        h.chord("ctrl-d");
        assert_eq!(
            h.focused(),
            Some(TabKey::Conversation("c-dana".to_string()))
        );
        h.chord("ctrl-d");
        assert_eq!(
            h.focused(),
            Some(TabKey::Conversation("c-alice".to_string()))
        );
        h.chord("ctrl-d");
        assert_eq!(h.focused(), Some(TabKey::Picker));
        h.chord("ctrl-u");
        assert_eq!(
            h.focused(),
            Some(TabKey::Conversation("c-alice".to_string()))
        );
    }

    #[tokio::test]
    async fn disconnect_keeps_phase_and_banners_reach_every_open_tab() {
        let h = harness();
        h.dispatch(NetworkEvent::Connected(snapshot()));
        h.dispatch(message("c-dana", "u-dana", "hi"));
        h.dispatch(message("c-alice", "u-alice", "hello"));

        h.dispatch(NetworkEvent::Disconnected);

        let app = h.app.borrow();
        assert_eq!(app.phase, Phase::Running);
        for conv_id in ["c-dana", "c-alice"] {
            let tab = app.convo_tab(conv_id).unwrap();
            let state = tab.state();
            let last = state.transcript().last().unwrap();
            assert_eq!(last.text, "Disconnected. Messages will not be received.");
        }
    }

    #[tokio::test]
    async fn typing_events_route_to_the_right_tab() {
        let h = harness();
        h.dispatch(NetworkEvent::Connected(snapshot()));
        h.dispatch(message("c-dana", "u-dana", "hi"));
        h.dispatch(message("c-alice", "u-alice", "hello"));

        h.dispatch(NetworkEvent::Typing(TypingEvent {
            conv_id: "c-alice".to_string(),
            user_id: "u-alice".to_string(),
            timestamp: Utc::now(),
            status: hubbub_core::event::TypingStatus::Typing,
        }));

        let app = h.app.borrow();
        assert_eq!(
            app.convo_tab("c-alice").unwrap().state().status_line(),
            "Alice is typing..."
        );
        assert_eq!(app.convo_tab("c-dana").unwrap().state().status_line(), "");
    }

    #[tokio::test]
    async fn ctrl_c_requests_quit() {
        let h = harness();
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let client = Rc::clone(&h.client);
        h.app.borrow_mut().handle_key(&client, key);
        assert!(h.app.borrow().should_quit);
    }
}
