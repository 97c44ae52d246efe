use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::{retention_color, truncate};
use crate::models::MasteryLevel;
use crate::session::SessionStatus;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(0)])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(30),
            Constraint::Percentage(35),
        ])
        .split(chunks[0]);

    draw_stats(f, app, top_chunks[0]);
    draw_levels(f, app, top_chunks[1]);
    draw_due_reviews(f, app, top_chunks[2]);
    draw_recent_sessions(f, app, chunks[1]);
}

fn stat_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn draw_stats(f: &mut Frame, app: &App, area: Rect) {
    let stats = &app.stats;
    let threshold = app.review_threshold();

    let text = vec![
        Line::from(vec![
            Span::styled("Learned: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", stats.total_topics),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        stat_line(
            "Reviews",
            stats.total_reviews_completed.to_string(),
            Color::White,
        ),
        stat_line(
            "Due now",
            stats.due_now.to_string(),
            if stats.due_now > 0 {
                Color::Red
            } else {
                Color::White
            },
        ),
        stat_line("Due today", stats.due_today.to_string(), Color::Yellow),
        stat_line("Due this week", stats.due_this_week.to_string(), Color::White),
        stat_line(
            "Avg retention",
            format!("{:.0}%", stats.average_retention * 100.0),
            retention_color(stats.average_retention, threshold),
        ),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Reviews ")
        .title_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_levels(f: &mut Frame, app: &App, area: Rect) {
    let text: Vec<Line> = MasteryLevel::ALL
        .iter()
        .skip(1)
        .map(|level| {
            let count = app
                .summary
                .by_level
                .get(level.as_str())
                .copied()
                .unwrap_or(0);
            stat_line(
                level.label(),
                count.to_string(),
                if count > 0 { Color::Green } else { Color::DarkGray },
            )
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Mastery ")
        .title_style(Style::default().fg(Color::Green));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_due_reviews(f: &mut Frame, app: &App, area: Rect) {
    let threshold = app.review_threshold();
    let items: Vec<ListItem> = app
        .due_reviews
        .iter()
        .enumerate()
        .map(|(i, item)| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{}. ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{:<22}", truncate(&item.topic_id, 22)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:>4.0}%", item.retention * 100.0),
                    Style::default().fg(retention_color(item.retention, threshold)),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Due Reviews ")
        .title_style(Style::default().fg(Color::Yellow));

    if items.is_empty() {
        let paragraph = Paragraph::new("Nothing due. Nice work!")
            .style(Style::default().fg(Color::Green))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        let list = List::new(items).block(block);
        f.render_widget(list, area);
    }
}

fn draw_recent_sessions(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .recent_sessions
        .iter()
        .map(|session| {
            let (status_text, status_color) = match session.status {
                SessionStatus::Active => ("Active", Color::Cyan),
                SessionStatus::Paused => ("Paused", Color::Yellow),
                SessionStatus::Completed => ("Completed", Color::Green),
                SessionStatus::Abandoned => ("Abandoned", Color::DarkGray),
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<10}", session.started_at.format("%b %d")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<10}", truncate(&session.domain, 9)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:>3.0}/{:<4} min  ", session.elapsed_minutes(app.now), session.planned_minutes),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:>2} done  ", session.tasks_completed),
                    Style::default().fg(Color::White),
                ),
                Span::styled(status_text, Style::default().fg(status_color)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Recent Sessions ")
        .title_style(Style::default().fg(Color::Magenta));

    if items.is_empty() {
        let paragraph = Paragraph::new("No sessions yet. Start one with `learnpath session start`.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        let list = List::new(items).block(block);
        f.render_widget(list, area);
    }
}
