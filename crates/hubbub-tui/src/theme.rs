use ratatui::style::{Color, Modifier, Style};

/// Styles for every named role the UI draws with.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub active_tab: Style,
    pub inactive_tab: Style,
    pub msg_date: Style,
    pub msg_sender: Style,
    pub msg_text: Style,
    pub status_line: Style,
    pub tab_background: Style,
}

pub const SCHEME_NAMES: &[&str] = &["default", "solarized-dark"];

/// Look up a color scheme by name. Unknown names are a configuration
/// error the CLI rejects before the UI starts.
pub fn scheme(name: &str) -> Option<Palette> {
    match name {
        "default" => Some(Palette {
            active_tab: Style::new(),
            inactive_tab: Style::new().add_modifier(Modifier::REVERSED),
            msg_date: Style::new(),
            msg_sender: Style::new(),
            msg_text: Style::new(),
            status_line: Style::new().add_modifier(Modifier::REVERSED),
            tab_background: Style::new().add_modifier(Modifier::REVERSED),
        }),
        "solarized-dark" => Some(Palette {
            active_tab: Style::new().fg(Color::Gray).bg(Color::LightBlue),
            inactive_tab: Style::new()
                .bg(Color::LightGreen)
                .add_modifier(Modifier::UNDERLINED),
            msg_date: Style::new().fg(Color::Cyan),
            msg_sender: Style::new().fg(Color::Blue),
            msg_text: Style::new(),
            status_line: Style::new().add_modifier(Modifier::REVERSED),
            tab_background: Style::new()
                .bg(Color::Black)
                .add_modifier(Modifier::UNDERLINED),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_scheme_resolves() {
        for name in SCHEME_NAMES {
            assert!(scheme(name).is_some(), "scheme {name} should resolve");
        }
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(scheme("solarized-light").is_none());
    }
}
