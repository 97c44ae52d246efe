use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use super::{mastery_bar, retention_color, short_date, truncate};
use crate::practice::COMPLETED_LEVEL;
use crate::tui::{App, TopicDetail};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(detail) = &app.selected_topic else {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Topic Detail ");
        let paragraph = Paragraph::new("No topic selected").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(4),
            Constraint::Length(8),
            Constraint::Min(0),
        ])
        .split(area);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[2]);

    draw_header(f, detail, chunks[0]);
    draw_progress(f, app, detail, chunks[1]);
    draw_prerequisites(f, detail, middle[0]);
    draw_fire_ancestors(f, detail, middle[1]);
    draw_history(f, detail, chunks[3]);
}

fn draw_header(f: &mut Frame, detail: &TopicDetail, area: Rect) {
    let topic = &detail.row.topic;
    let description = if topic.description.is_empty() {
        "No description"
    } else {
        topic.description.as_str()
    };

    let concepts = if topic.concepts.is_empty() {
        "None".to_string()
    } else {
        topic.concepts.join(", ")
    };

    let unlocks = if detail.unlocks.is_empty() {
        "Nothing yet".to_string()
    } else {
        detail.unlocks.join(", ")
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Description: ", Style::default().fg(Color::Gray)),
            Span::styled(description, Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("Domain: ", Style::default().fg(Color::Gray)),
            Span::styled(topic.domain.as_str(), Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled("Difficulty: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.2}", topic.difficulty),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Est: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.1}h", topic.estimated_hours),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Concepts: ", Style::default().fg(Color::Gray)),
            Span::styled(concepts, Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::styled("Unlocks: ", Style::default().fg(Color::Gray)),
            Span::styled(unlocks, Style::default().fg(Color::Green)),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ({}) ", topic.name, topic.id))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_progress(f: &mut Frame, app: &App, detail: &TopicDetail, area: Rect) {
    let row = &detail.row;

    let text = vec![
        Line::from(vec![
            Span::styled("Mastery: ", Style::default().fg(Color::Gray)),
            Span::styled(mastery_bar(row.level), Style::default().fg(Color::Green)),
            Span::styled(
                format!(" {}/5 ({})", row.level.as_u8(), row.level.label()),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw("  "),
            Span::styled("Retention: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.0}%", row.retention * 100.0),
                Style::default().fg(retention_color(row.retention, app.review_threshold())),
            ),
        ]),
        Line::from(vec![
            Span::styled("Practiced: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} (avg {:.2})", detail.practice_count, detail.average_score),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Stability: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.1}d", detail.stability),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Next: ", Style::default().fg(Color::Gray)),
            Span::styled(short_date(row.next_review), Style::default().fg(Color::White)),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Progress ")
        .title_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_prerequisites(f: &mut Frame, detail: &TopicDetail, area: Rect) {
    let items: Vec<ListItem> = detail
        .prerequisites
        .iter()
        .map(|(topic, level)| {
            let (mark, color) = if *level >= COMPLETED_LEVEL {
                ("✓ ", Color::Green)
            } else {
                ("• ", Color::Red)
            };
            ListItem::new(Line::from(vec![
                Span::styled(mark, Style::default().fg(color)),
                Span::styled(
                    format!("{:<24}", truncate(&topic.name, 24)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(level.label(), Style::default().fg(Color::Yellow)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Prerequisites ({}) ", detail.prerequisites.len()))
        .title_style(Style::default().fg(Color::Red));

    if items.is_empty() {
        let paragraph = Paragraph::new("None - a starting point")
            .style(Style::default().fg(Color::Green))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        let list = List::new(items).block(block);
        f.render_widget(list, area);
    }
}

fn draw_fire_ancestors(f: &mut Frame, detail: &TopicDetail, area: Rect) {
    let items: Vec<ListItem> = detail
        .fire_ancestors
        .iter()
        .map(|(topic_id, weight)| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<26}", truncate(topic_id, 26)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:.4}", weight),
                    Style::default().fg(Color::Magenta),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Refreshed by practice ")
        .title_style(Style::default().fg(Color::Magenta));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn draw_history(f: &mut Frame, detail: &TopicDetail, area: Rect) {
    let items: Vec<ListItem> = detail
        .history
        .iter()
        .take(10)
        .map(|event| {
            let score_color = if event.score >= 0.7 {
                Color::Green
            } else if event.score >= 0.4 {
                Color::Yellow
            } else {
                Color::Red
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<10}", event.timestamp.format("%b %d")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<13}", event.problem_type),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:<6.2}", event.score),
                    Style::default().fg(score_color),
                ),
                Span::styled(
                    format!(
                        "{} -> {}",
                        event.level_before.label(),
                        event.level_after.label()
                    ),
                    Style::default().fg(Color::Gray),
                ),
            ]))
        })
        .collect();

    let title = if detail.history.is_empty() {
        " Practice History (none) ".to_string()
    } else {
        format!(" Practice History ({}) ", detail.history.len())
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Magenta));

    if items.is_empty() {
        let paragraph = Paragraph::new("Not practiced yet. Try `learnpath practice generate`.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        let list = List::new(items).block(block);
        f.render_widget(list, area);
    }
}
