//! Exponential forgetting curve, `R = e^(-t/S)`, with `t` in days and `S` the
//! stability of the memory in days.

use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};

const SECONDS_PER_DAY: f64 = 86_400.0;

pub const MIN_STABILITY: f64 = 0.5;
pub const MAX_STABILITY: f64 = 30.0;
pub const INCREMENTAL_MAX_STABILITY: f64 = 10.0;

/// Fractional days between two instants. Negative if `to` precedes `from`.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

pub fn days_to_duration(days: f64) -> Duration {
    Duration::milliseconds((days * SECONDS_PER_DAY * 1000.0).round() as i64)
}

pub fn retention(days_since_review: f64, stability: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    (-days_since_review / stability).exp().clamp(0.0, 1.0)
}

/// Days until retention falls to `target_retention`.
pub fn optimal_review_interval(target_retention: f64, stability: f64) -> Result<f64> {
    if target_retention <= 0.0 || target_retention >= 1.0 || target_retention.is_nan() {
        return Err(Error::InvalidTarget(target_retention));
    }
    Ok(-stability * target_retention.ln())
}

/// Stability after a review. Good recalls grow it, poor ones shrink it, and
/// a successful recall of an almost-forgotten topic earns a bonus.
pub fn update_stability(current: f64, score: f64, retention_at_review: f64) -> f64 {
    let mut multiplier = if score >= 0.9 {
        2.5
    } else if score >= 0.7 {
        1.8
    } else if score >= 0.5 {
        1.3
    } else if score >= 0.3 {
        0.9
    } else {
        0.6
    };

    if score >= 0.7 && retention_at_review < 0.5 {
        multiplier *= 1.0 + (0.5 - retention_at_review);
    }

    (current * multiplier).clamp(MIN_STABILITY, MAX_STABILITY)
}

pub fn days_until_retention_drops_to(current: f64, target: f64, stability: f64) -> f64 {
    if current <= target {
        return 0.0;
    }

    let elapsed = if current > 0.0 {
        -stability * current.ln()
    } else {
        0.0
    };
    let at_target = -stability * target.ln();

    (at_target - elapsed).max(0.0)
}

/// Urgency of a review; higher is more urgent. Overdue time adds up to
/// double the base urgency after a week.
pub fn review_priority(retention: f64, level_importance: f64, days_overdue: f64) -> f64 {
    let urgency = (1.0 - retention).powi(2);
    let overdue_penalty = (days_overdue / 7.0).min(1.0);
    urgency * level_importance * (1.0 + overdue_penalty)
}

/// How a practice score moves a record's stability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StabilityRule {
    /// ×1.2 (cap 10) on a score of at least 0.7, ×0.8 (floor 0.5) below 0.4.
    #[default]
    Incremental,
    /// `update_stability`, fed with the retention at review time.
    Ebbinghaus,
}

impl StabilityRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            StabilityRule::Incremental => "incremental",
            StabilityRule::Ebbinghaus => "ebbinghaus",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "incremental" => Some(StabilityRule::Incremental),
            "ebbinghaus" => Some(StabilityRule::Ebbinghaus),
            _ => None,
        }
    }

    /// Highest stability the rule can produce.
    pub fn ceiling(&self) -> f64 {
        match self {
            StabilityRule::Incremental => INCREMENTAL_MAX_STABILITY,
            StabilityRule::Ebbinghaus => MAX_STABILITY,
        }
    }

    pub fn apply(&self, stability: f64, score: f64, retention_at_review: f64) -> f64 {
        match self {
            StabilityRule::Incremental => {
                if score >= 0.7 {
                    (stability * 1.2).min(INCREMENTAL_MAX_STABILITY)
                } else if score < 0.4 {
                    (stability * 0.8).max(0.5)
                } else {
                    stability
                }
            }
            StabilityRule::Ebbinghaus => update_stability(stability, score, retention_at_review),
        }
    }
}

/// Clamped review intervals around a target retention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewSchedule {
    pub target_retention: f64,
    pub min_interval: f64,
    pub max_interval: f64,
}

impl Default for ReviewSchedule {
    fn default() -> Self {
        Self {
            target_retention: 0.85,
            min_interval: 0.5,
            max_interval: 180.0,
        }
    }
}

impl ReviewSchedule {
    pub fn new(target_retention: f64) -> Self {
        Self {
            target_retention,
            ..Self::default()
        }
    }

    /// Interval in days, clamped to `[min_interval, max_interval]`.
    pub fn interval(&self, stability: f64) -> Result<f64> {
        let interval = optimal_review_interval(self.target_retention, stability)?;
        Ok(interval.clamp(self.min_interval, self.max_interval))
    }

    pub fn next_review_date(
        &self,
        last_review: DateTime<Utc>,
        stability: f64,
    ) -> Result<DateTime<Utc>> {
        Ok(last_review + days_to_duration(self.interval(stability)?))
    }

    pub fn should_review_now(
        &self,
        last_review: Option<DateTime<Utc>>,
        stability: f64,
        threshold: f64,
        now: DateTime<Utc>,
    ) -> bool {
        match last_review {
            Some(last) => retention(days_between(last, now), stability) < threshold,
            None => false,
        }
    }
}
