pub mod dashboard;
pub mod topic_detail;
pub mod topics;

use chrono::{DateTime, Utc};
use ratatui::style::Color;

use crate::models::MasteryLevel;

pub(crate) fn mastery_bar(level: MasteryLevel) -> String {
    let filled = level.as_u8() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(5 - filled))
}

pub(crate) fn retention_color(retention: f64, threshold: f64) -> Color {
    if retention >= 0.85 {
        Color::Green
    } else if retention >= threshold {
        Color::Yellow
    } else {
        Color::Red
    }
}

pub(crate) fn short_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%b %d").to_string())
        .unwrap_or_else(|| "Not set".to_string())
}

pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_has_five_cells() {
        assert_eq!(mastery_bar(MasteryLevel::Unknown), "░░░░░");
        assert_eq!(mastery_bar(MasteryLevel::Developing), "██░░░");
        assert_eq!(mastery_bar(MasteryLevel::Fluent), "█████");
    }

    #[test]
    fn retention_colors() {
        assert_eq!(retention_color(0.9, 0.7), Color::Green);
        assert_eq!(retention_color(0.75, 0.7), Color::Yellow);
        assert_eq!(retention_color(0.2, 0.7), Color::Red);
    }
}
