use karten_core::{Phase, Side};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::{App, Mode, TopicField};

const LONG_TEXT: usize = 40;
const SHORT_TEXT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSize {
    Short,
    Normal,
    Long,
}

/// Cards are styled by length so single words stand out and phrases wrap.
pub fn text_size(text: &str) -> TextSize {
    let len = text.chars().count();
    if len > LONG_TEXT {
        TextSize::Long
    } else if len <= SHORT_TEXT {
        TextSize::Short
    } else {
        TextSize::Normal
    }
}

fn card_style(text: &str) -> Style {
    match text_size(text) {
        TextSize::Short => Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
        TextSize::Normal => Style::default().add_modifier(Modifier::BOLD),
        TextSize::Long => Style::default(),
    }
}

fn selected_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

fn active_border(active: bool) -> Style {
    if active {
        Style::default()
            .fg(Color::Blue)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

pub fn draw(frame: &mut Frame, app: &App) {
    let notice_height = if app.notice.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(notice_height),
            Constraint::Length(3),
        ])
        .split(frame.size());

    match app.mode {
        Mode::Home => render_home(frame, app, chunks[0]),
        Mode::Study => render_study(frame, app, chunks[0]),
        Mode::AdminTopics => render_admin_topics(frame, app, chunks[0]),
        Mode::AdminCards => render_admin_cards(frame, app, chunks[0]),
        Mode::TopicForm => render_topic_form(frame, app, chunks[0]),
        Mode::CardForm => render_card_form(frame, app, chunks[0]),
        Mode::Tools => render_tools(frame, app, chunks[0]),
        Mode::Confirm => frame.render_widget(render_confirm(app), chunks[0]),
    }
    if let Some(notice) = &app.notice {
        let style = if notice.error {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Green)
        };
        let widget = Paragraph::new(Span::styled(notice.text.as_str(), style))
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        frame.render_widget(widget, chunks[1]);
    }
    frame.render_widget(render_footer(app), chunks[2]);
}

/// Lines of a scrolling list that keeps `selected` in view.
fn list_lines<'a>(items: Vec<String>, selected: usize, height: usize) -> Vec<Line<'a>> {
    let total = items.len();
    let mut start = selected.saturating_sub(height / 2);
    if height > 0 && start + height > total {
        start = total.saturating_sub(height);
    }
    let end = (start + height).min(total);
    items
        .into_iter()
        .enumerate()
        .skip(start)
        .take(end - start)
        .map(|(idx, item)| {
            if idx == selected {
                Line::from(Span::styled(format!("> {item}"), selected_style()))
            } else {
                Line::from(format!("  {item}"))
            }
        })
        .collect()
}

fn render_home(frame: &mut Frame, app: &App, area: Rect) {
    let mut text = Text::default();
    text.lines.push(Line::from("Choose a topic"));
    text.lines.push(Line::from(""));
    if let Some(title) = &app.loading_topic {
        text.lines.push(Line::from(Span::styled(
            format!("Loading {title}..."),
            Style::default().add_modifier(Modifier::ITALIC),
        )));
        text.lines.push(Line::from(""));
    } else if app.reloading_topics {
        text.lines.push(Line::from(Span::styled(
            "Reloading topics...",
            Style::default().add_modifier(Modifier::ITALIC),
        )));
        text.lines.push(Line::from(""));
    }
    if app.registry.is_empty() {
        text.lines.push(Line::from("No topics available"));
    } else {
        let items = app
            .registry
            .topics()
            .iter()
            .map(|topic| format!("{} ({})", topic.title, topic.count))
            .collect();
        let height = area.height.saturating_sub(2 + text.lines.len() as u16) as usize;
        text.lines.extend(list_lines(items, app.home_selection, height));
    }

    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Karten"))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_study(frame: &mut Frame, app: &App, area: Rect) {
    let view = app.session.view();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);

    let title = view.topic.map(|topic| topic.title.as_str()).unwrap_or("Study");
    let mut header = format!("{title}  {} / {}", (view.position + 1).min(view.len), view.len);
    if view.loading {
        header.push_str("  (loading...)");
    }
    frame.render_widget(
        Paragraph::new(header).block(Block::default().borders(Borders::ALL).title("Topic")),
        chunks[0],
    );

    let mut card = Text::default();
    match view.card {
        Some(pair) => {
            card.lines.push(Line::from(""));
            card.lines.push(Line::from(Span::styled(pair.de.as_str(), card_style(&pair.de))));
            card.lines.push(Line::from(""));
            if view.revealed {
                card.lines.push(Line::from(Span::styled(
                    pair.uk.as_str(),
                    card_style(&pair.uk).fg(Color::Green),
                )));
            } else {
                card.lines.push(Line::from(Span::styled(
                    "Space to reveal",
                    Style::default().add_modifier(Modifier::DIM),
                )));
            }
        }
        None => card.lines.push(Line::from("No cards")),
    }
    let side = if view.revealed { "Back" } else { "Front" };
    frame.render_widget(
        Paragraph::new(card)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(side))
            .wrap(Wrap { trim: true }),
        chunks[1],
    );

    let ratio = view.progress.unwrap_or(0.0).clamp(0.0, 1.0);
    frame.render_widget(
        Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Blue))
            .ratio(ratio),
        chunks[2],
    );

    let mut nav = Vec::new();
    if view.can_prev {
        nav.push(Span::raw("<- prev"));
    }
    if view.at_last {
        if !nav.is_empty() {
            nav.push(Span::raw("   "));
        }
        nav.push(Span::styled("last card, r to restart", selected_style()));
    } else if view.can_next {
        if !nav.is_empty() {
            nav.push(Span::raw("   "));
        }
        nav.push(Span::raw("next ->"));
    }
    if app.session.phase() == Phase::Empty {
        nav.clear();
    }
    frame.render_widget(
        Paragraph::new(Line::from(nav)).alignment(Alignment::Center),
        chunks[3],
    );
}

fn render_admin_topics(frame: &mut Frame, app: &App, area: Rect) {
    let mut text = Text::default();
    let dirty = if app.editor.has_changes() { " (unsaved changes)" } else { "" };
    text.lines.push(Line::from(format!("Topics{dirty}")));
    text.lines.push(Line::from(""));
    let topics = app.editor.topics();
    if topics.is_empty() {
        text.lines.push(Line::from("No topics yet, press n to create one"));
    } else {
        let items = topics
            .iter()
            .map(|topic| format!("{} [{}] {} cards -> {}", topic.title, topic.id, topic.count, topic.file))
            .collect();
        let height = area.height.saturating_sub(4) as usize;
        text.lines.extend(list_lines(items, app.admin_selection, height));
    }

    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Admin"))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_admin_cards(frame: &mut Frame, app: &App, area: Rect) {
    let title = app
        .editor
        .current_topic()
        .map(|topic| topic.title.clone())
        .unwrap_or_default();
    let mut text = Text::default();
    text.lines.push(Line::from(format!("{title}: {} cards", app.editor.deck().len())));
    text.lines.push(Line::from(""));
    if app.editor.deck().is_empty() {
        text.lines.push(Line::from("Deck is empty, press n to add a card or i to import"));
    } else {
        let items = app
            .editor
            .deck()
            .iter()
            .enumerate()
            .map(|(idx, card)| format!("{:>3}. {} - {}", idx + 1, card.de, card.uk))
            .collect();
        let height = area.height.saturating_sub(4) as usize;
        text.lines.extend(list_lines(items, app.card_selection, height));
    }

    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Cards"))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn two_fields(frame: &mut Frame, area: Rect, fields: [(&str, &str, bool); 2]) {
    let boxes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    for (idx, (title, value, active)) in fields.into_iter().enumerate() {
        let widget = Paragraph::new(value)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(active_border(active)),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(widget, boxes[idx]);
    }
}

fn render_topic_form(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let form = &app.topic_form;
    let preview = karten_core::editor::slugify_id(&form.id);
    let header = if preview.is_empty() {
        "New topic".to_string()
    } else {
        format!("New topic -> data/{preview}.json")
    };
    frame.render_widget(
        Paragraph::new(header).block(Block::default().borders(Borders::ALL).title("Topic")),
        chunks[0],
    );
    two_fields(
        frame,
        chunks[1],
        [
            ("Title", form.title.as_str(), form.field == TopicField::Title),
            ("Id", form.id.as_str(), form.field == TopicField::Id),
        ],
    );
}

fn render_card_form(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let form = &app.card_form;
    let header = match form.editing {
        Some(index) => format!("Edit card {}", index + 1),
        None => "New card".to_string(),
    };
    frame.render_widget(
        Paragraph::new(header).block(Block::default().borders(Borders::ALL).title("Card")),
        chunks[0],
    );
    two_fields(
        frame,
        chunks[1],
        [
            ("Deutsch", form.de.as_str(), form.field == Side::German),
            ("Українська", form.uk.as_str(), form.field == Side::Ukrainian),
        ],
    );
}

fn render_tools(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let separator = app.separator().replace('\t', "\\t");
    frame.render_widget(
        Paragraph::new(format!("Separator: \"{separator}\""))
            .block(Block::default().borders(Borders::ALL).title("Text tools")),
        chunks[0],
    );

    let boxes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    frame.render_widget(
        Paragraph::new(app.tools.input.as_str())
            .block(Block::default().borders(Borders::ALL).title("Input"))
            .wrap(Wrap { trim: false }),
        boxes[0],
    );
    frame.render_widget(
        Paragraph::new(app.tools.output.as_str())
            .block(Block::default().borders(Borders::ALL).title("Result"))
            .wrap(Wrap { trim: false }),
        boxes[1],
    );
}

fn render_confirm(app: &App) -> Paragraph<'_> {
    let message = app
        .confirm
        .as_ref()
        .map(|(_, message)| message.as_str())
        .unwrap_or("This cannot be undone. (y/n)");
    Paragraph::new(message)
        .block(Block::default().borders(Borders::ALL).title("Confirm"))
        .wrap(Wrap { trim: true })
}

fn render_footer(app: &App) -> Paragraph<'_> {
    let info = match app.mode {
        Mode::Home => "Up/Down or j/k move | Enter study | r reload | t tools | a admin | q quit",
        Mode::Study => "Space/Enter flip | Right/l next | Left/h prev | r restart | s speak | Esc back",
        Mode::AdminTopics => {
            "Up/Down or j/k move | Enter open | n new | d delete | e export | p push | P pull | t tools | Esc back"
        }
        Mode::AdminCards => {
            "Up/Down or j/k move | Enter edit | n new | d delete | i import clipboard | c copy JSON | t tools | Esc back"
        }
        Mode::TopicForm | Mode::CardForm => "Enter save | Tab switch | Esc cancel",
        Mode::Tools => {
            "v paste | j join | s split | u/l/T case | w tidy | b bulk format | Tab separator | y copy | Esc back"
        }
        Mode::Confirm => "y confirm | n cancel",
    };

    Paragraph::new(info).block(Block::default().borders(Borders::ALL).title("Keys"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_size_thresholds() {
        assert_eq!(text_size("Apfel"), TextSize::Short);
        assert_eq!(text_size("fünfzehn Zeichn"), TextSize::Short);
        assert_eq!(text_size("sechzehn Zeichen"), TextSize::Normal);
        assert_eq!(text_size(&"ä".repeat(40)), TextSize::Normal);
        assert_eq!(text_size(&"ä".repeat(41)), TextSize::Long);
    }
}
