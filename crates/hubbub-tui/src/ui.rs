use crate::app::{ChatApp, Phase, PickerState};
use crate::convo::ConvoState;
use crate::tabs::TabKey;
use crate::theme::Palette;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};

pub fn render(frame: &mut Frame, app: &ChatApp) {
    let size = frame.size();
    if app.phase == Phase::Connecting {
        render_connecting(frame, size);
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(size);

    render_tab_bar(frame, app, layout[0]);

    match app.tabs.focused() {
        Some(TabKey::Picker) => render_picker(frame, &app.picker, &app.palette, layout[1]),
        Some(TabKey::Conversation(conv_id)) => {
            if let Some(tab) = app.convo_tab(conv_id) {
                render_conversation(frame, &tab.state(), &app.palette, layout[1]);
            }
        }
        None => {}
    }
}

fn render_connecting(frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);
    frame.render_widget(
        Paragraph::new("Connecting...").alignment(Alignment::Center),
        rows[1],
    );
}

fn render_tab_bar(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let mut spans = Vec::new();
    for (_, title, focused) in app.tabs.iter() {
        let style = if focused {
            app.palette.active_tab
        } else {
            app.palette.inactive_tab
        };
        spans.push(Span::styled(format!(" {title} "), style));
        spans.push(Span::styled(" ", app.palette.tab_background));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(app.palette.tab_background),
        area,
    );
}

fn render_picker(frame: &mut Frame, picker: &PickerState, palette: &Palette, area: Rect) {
    let items: Vec<ListItem> = picker
        .entries
        .iter()
        .map(|(_, name)| ListItem::new(name.as_str()))
        .collect();
    let mut state = ListState::default();
    state.select(Some(picker.selected));
    let list = List::new(items).highlight_style(palette.status_line);
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_conversation(frame: &mut Frame, convo: &ConvoState, palette: &Palette, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    render_transcript(frame, convo, palette, rows[0]);

    frame.render_widget(
        Paragraph::new(convo.status_line())
            .style(palette.status_line)
            .alignment(Alignment::Center),
        rows[1],
    );

    let input = format!("Send message: {}", convo.input());
    frame.render_widget(Paragraph::new(input.clone()), rows[2]);
    frame.set_cursor(rows[2].x + input.len() as u16, rows[2].y);
}

fn render_transcript(frame: &mut Frame, convo: &ConvoState, palette: &Palette, area: Rect) {
    // Keep the newest lines on screen.
    let visible = area.height as usize;
    let transcript = convo.transcript();
    let skip = transcript.len().saturating_sub(visible);

    let lines: Vec<Line> = transcript
        .iter()
        .skip(skip)
        .map(|entry| {
            let mut spans = vec![Span::styled(
                format!("({}) ", entry.date_str()),
                palette.msg_date,
            )];
            if let Some(sender) = &entry.sender {
                spans.push(Span::styled(format!("{sender}: "), palette.msg_sender));
            }
            spans.push(Span::styled(entry.text.clone(), palette.msg_text));
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), area);
}
