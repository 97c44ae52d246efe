use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{mastery_bar, retention_color, short_date, truncate};
use crate::models::MasteryLevel;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let title = if let Some(query) = &app.filter {
        format!(" Topics (search: {}) ", query)
    } else {
        " Topics ".to_string()
    };

    let threshold = app.review_threshold();
    let items: Vec<ListItem> = app
        .topics
        .items
        .iter()
        .map(|row| {
            let name_color = if row.unlocked || row.level > MasteryLevel::Unknown {
                Color::White
            } else {
                Color::DarkGray
            };
            let lock = if row.unlocked { " " } else { "·" };

            // Unknown topics have nothing to forget yet
            let retention = if row.level == MasteryLevel::Unknown {
                Span::styled(format!("{:>5}", "-"), Style::default().fg(Color::DarkGray))
            } else {
                Span::styled(
                    format!("{:>4.0}%", row.retention * 100.0),
                    Style::default().fg(retention_color(row.retention, threshold)),
                )
            };

            let overdue = row.next_review.is_some_and(|next| next < app.now);
            let (next_color, next_text) = if overdue {
                (Color::Red, format!("{} !", short_date(row.next_review)))
            } else {
                (Color::White, short_date(row.next_review))
            };

            ListItem::new(Line::from(vec![
                Span::styled(lock, Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{:<30}", truncate(&row.topic.name, 28)),
                    Style::default().fg(name_color),
                ),
                Span::styled(mastery_bar(row.level), Style::default().fg(Color::Green)),
                Span::styled(
                    format!(" {:<12}", row.level.label()),
                    Style::default().fg(Color::Yellow),
                ),
                retention,
                Span::raw("  "),
                Span::styled(next_text, Style::default().fg(next_color)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    let header_style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let header = Line::from(vec![
        Span::styled(format!(" {:<30}", "Name"), header_style),
        Span::styled(format!("{:<18}", "Mastery"), header_style),
        Span::styled("Kept ", header_style),
        Span::styled("  Next Review", header_style),
    ]);

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.topics.selected);

    // Header sits on the first row inside the border
    let header_area = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: 1,
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(1),
    };

    f.render_stateful_widget(list, list_area, &mut state);
}
