use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// One configurable key chord, e.g. `ctrl-d` or `alt-tab`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub modifiers: KeyModifiers,
    pub code: KeyCode,
}

impl KeyChord {
    pub fn matches(&self, key: &KeyEvent) -> bool {
        key.code == self.code && key.modifiers == self.modifiers
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeyBindings {
    pub next_tab: KeyChord,
    pub prev_tab: KeyChord,
}

/// Parse a chord spec like `ctrl-d`, `alt+u`, `ctrl shift f5` or `tab`.
/// Separators may be `-`, `+` or spaces.
pub fn parse_chord(spec: &str) -> Result<KeyChord, String> {
    let parts: Vec<&str> = spec
        .split(['-', '+', ' '])
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        return Err(format!("empty key chord: {spec:?}"));
    }

    let mut modifiers = KeyModifiers::NONE;
    for part in &parts[..parts.len() - 1] {
        match part.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
            "alt" => modifiers |= KeyModifiers::ALT,
            "shift" => modifiers |= KeyModifiers::SHIFT,
            other => return Err(format!("unknown modifier {other:?} in {spec:?}")),
        }
    }

    let last = parts[parts.len() - 1];
    let code = match last.to_ascii_lowercase().as_str() {
        "tab" => KeyCode::Tab,
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        key if key.len() == 1 => KeyCode::Char(key.chars().next().unwrap_or_default()),
        key if key.starts_with('f') && key[1..].chars().all(|c| c.is_ascii_digit()) => {
            let n: u8 = key[1..]
                .parse()
                .map_err(|_| format!("bad function key in {spec:?}"))?;
            KeyCode::F(n)
        }
        other => return Err(format!("unknown key {other:?} in {spec:?}")),
    };

    Ok(KeyChord { modifiers, code })
}
