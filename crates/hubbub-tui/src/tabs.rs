use hubbub_core::event::ConvId;
use std::collections::HashMap;

/// Stable identity of one tab. A conversation keeps the same key for the
/// lifetime of the session, so re-registering it can never duplicate a tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TabKey {
    Picker,
    Conversation(ConvId),
}

/// Ordered tab collection with a single focus index. Tabs are append-only:
/// nothing in the UI ever closes one, so the focus index only needs
/// revalidation on insert.
#[derive(Debug, Default)]
pub struct TabRegistry {
    order: Vec<TabKey>,
    titles: HashMap<TabKey, String>,
    focus: Option<usize>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a tab. New keys are appended at the end; an existing
    /// key never moves. Repeating the same call has no further effect.
    pub fn upsert(&mut self, key: TabKey, title: Option<String>, focus: bool) {
        if !self.titles.contains_key(&key) {
            self.order.push(key.clone());
            self.titles.insert(key.clone(), String::new());
            if self.focus.is_none() {
                self.focus = Some(0);
            }
        }
        if let Some(title) = title {
            self.titles.insert(key.clone(), title);
        }
        if focus {
            self.focus = self.order.iter().position(|entry| *entry == key);
        }
    }

    pub fn focus_next(&mut self) {
        self.step(1);
    }

    pub fn focus_prev(&mut self) {
        self.step(-1);
    }

    fn step(&mut self, delta: isize) {
        if self.order.is_empty() {
            return;
        }
        let len = self.order.len() as isize;
        let idx = self.focus.unwrap_or(0) as isize;
        self.focus = Some((idx + delta).rem_euclid(len) as usize);
    }

    pub fn focused(&self) -> Option<&TabKey> {
        self.focus.and_then(|idx| self.order.get(idx))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Tabs in insertion order: key, title, and whether the tab is focused.
    pub fn iter(&self) -> impl Iterator<Item = (&TabKey, &str, bool)> {
        self.order.iter().enumerate().map(move |(idx, key)| {
            let title = self.titles.get(key).map(String::as_str).unwrap_or("");
            (key, title, self.focus == Some(idx))
        })
    }
}
