use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::decay::{self, ReviewSchedule};
use crate::error::Result;
use crate::mastery::MasteryTracker;
use crate::models::MasteryLevel;

/// Minimum score for a review to pass FIRe credit up to ancestors.
pub const FIRE_MIN_SCORE: f64 = 0.5;

const OPTIMIZE_LIMIT: usize = 100;
const OPTIMIZE_THRESHOLD: f64 = 0.85;

// A topic due for review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub topic_id: String,
    pub retention: f64,
    pub priority: f64,
    pub days_since_review: f64,
    pub optimal_review_date: Option<DateTime<Utc>>,
    pub mastery_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewResult {
    pub topic_id: String,
    pub score: f64,
    pub new_level: String,
    pub retention_at_review: f64,
    pub new_stability: f64,
    pub next_review_date: DateTime<Utc>,
    pub days_until_review: f64,
    pub fire_credited: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewStats {
    pub total_topics: usize,
    pub due_now: usize,
    pub due_today: usize,
    pub due_this_week: usize,
    pub total_reviews_completed: u64,
    pub average_retention: f64,
}

/// Spaced-repetition queue over the mastery records.
pub struct ReviewScheduler<'a> {
    mastery: &'a mut MasteryTracker,
    schedule: ReviewSchedule,
}

impl<'a> ReviewScheduler<'a> {
    pub fn new(mastery: &'a mut MasteryTracker, target_retention: f64) -> Self {
        Self {
            mastery,
            schedule: ReviewSchedule::new(target_retention),
        }
    }

    pub fn schedule(&self) -> &ReviewSchedule {
        &self.schedule
    }

    pub fn mastery(&self) -> &MasteryTracker {
        self.mastery
    }

    /// Learned topics whose retention fell below `threshold`, most urgent
    /// first. Higher mastery levels weigh more.
    pub fn get_due_reviews(
        &self,
        limit: usize,
        threshold: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReviewItem>> {
        let mut items = Vec::new();

        for record in self.mastery.records() {
            if record.level == MasteryLevel::Unknown {
                continue;
            }

            let days_elapsed = record.days_since_review(now).unwrap_or(0.0);
            let retention = record.retention(now);
            if retention >= threshold {
                continue;
            }

            let importance = 1.0 + 0.2 * record.level.as_u8() as f64;
            let interval = decay::optimal_review_interval(threshold, record.stability)?;
            let overdue = (days_elapsed - interval).max(0.0);
            let priority = decay::review_priority(retention, importance, overdue);

            let optimal_review_date = match record.last_review {
                Some(last) => Some(self.schedule.next_review_date(last, record.stability)?),
                None => None,
            };

            items.push(ReviewItem {
                topic_id: record.topic_id.clone(),
                retention,
                priority,
                days_since_review: days_elapsed,
                optimal_review_date,
                mastery_level: record.level.as_str().to_string(),
            });
        }

        items.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        items.truncate(limit);

        debug!(due = items.len(), threshold, "computed due reviews");
        Ok(items)
    }

    /// Records a review of `topic_id` and, on a passing score, credits the
    /// ancestors in `fire_weights`.
    pub fn complete_review(
        &mut self,
        topic_id: &str,
        score: f64,
        fire_weights: Option<&BTreeMap<String, f64>>,
        now: DateTime<Utc>,
    ) -> Result<ReviewResult> {
        let rule = self.mastery.stability_rule();
        let record = self.mastery.get_record(topic_id);
        let retention_at_review = record.retention(now);
        let new_level = record.record_practice(score, "review", 0, rule, now);
        let new_stability = record.stability;

        let fire_credited = match fire_weights {
            Some(weights) if score >= FIRE_MIN_SCORE => {
                self.mastery.credit_ancestors(weights, score, now)
            }
            _ => Vec::new(),
        };

        let next_review_date = self.schedule.next_review_date(now, new_stability)?;
        self.mastery.save()?;

        info!(
            topic = topic_id,
            score,
            level = new_level.as_str(),
            credited = fire_credited.len(),
            "review completed"
        );

        Ok(ReviewResult {
            topic_id: topic_id.to_string(),
            score,
            new_level: new_level.as_str().to_string(),
            retention_at_review,
            new_stability,
            next_review_date,
            days_until_review: decay::days_between(now, next_review_date),
            fire_credited,
        })
    }

    pub fn get_review_stats(&self, now: DateTime<Utc>) -> ReviewStats {
        let mut stats = ReviewStats::default();

        for record in self.mastery.records() {
            if record.level == MasteryLevel::Unknown {
                continue;
            }

            stats.total_topics += 1;
            stats.total_reviews_completed += record.practice_count as u64;

            let retention = record.retention(now);
            stats.average_retention += retention;

            if retention < 0.7 {
                stats.due_now += 1;
            } else if retention < 0.85 {
                stats.due_today += 1;
            } else if retention < 0.95 {
                stats.due_this_week += 1;
            }
        }

        if stats.total_topics > 0 {
            stats.average_retention /= stats.total_topics as f64;
        }
        stats
    }

    /// The most urgent reviews that fit into `available_minutes`.
    pub fn optimize_schedule(
        &self,
        available_minutes: u32,
        avg_review_minutes: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReviewItem>> {
        if avg_review_minutes <= 0.0 {
            return Ok(Vec::new());
        }

        let max_reviews = (available_minutes as f64 / avg_review_minutes).floor() as usize;
        let mut due = self.get_due_reviews(OPTIMIZE_LIMIT, OPTIMIZE_THRESHOLD, now)?;
        due.truncate(max_reviews);
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::MemoryStorage;
    use chrono::{Duration, TimeZone};
    use std::rc::Rc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn tracker() -> MasteryTracker {
        MasteryTracker::new(Rc::new(MemoryStorage::new()))
    }

    fn seed(tracker: &mut MasteryTracker, id: &str, level: MasteryLevel, stability: f64, days_ago: i64) {
        let record = tracker.get_record(id);
        record.level = level;
        record.stability = stability;
        record.last_review = Some(now() - Duration::days(days_ago));
        record.practice_count = 1;
    }

    mod due_review_tests {
        use super::*;

        #[test]
        fn skips_unknown_and_retained_topics() {
            let mut mastery = tracker();
            seed(&mut mastery, "fresh", MasteryLevel::Proficient, 10.0, 0);
            seed(&mut mastery, "forgotten", MasteryLevel::Developing, 1.0, 5);
            mastery.get_record("untouched");

            let scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            let due = scheduler.get_due_reviews(10, 0.7, now()).unwrap();

            assert_eq!(due.len(), 1);
            assert_eq!(due[0].topic_id, "forgotten");
            assert_eq!(due[0].mastery_level, "developing");
            assert!((due[0].days_since_review - 5.0).abs() < 1e-9);
            assert!(due[0].optimal_review_date.is_some());
        }

        #[test]
        fn priority_matches_formula() {
            let mut mastery = tracker();
            seed(&mut mastery, "t", MasteryLevel::Proficient, 2.0, 4);

            let scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            let item = &scheduler.get_due_reviews(10, 0.7, now()).unwrap()[0];

            let retention = (-2.0f64).exp();
            let overdue = 4.0 - (-2.0 * 0.7f64.ln());
            let expected = (1.0 - retention).powi(2) * 1.6 * (1.0 + overdue / 7.0);
            assert!((item.priority - expected).abs() < 1e-9);
        }

        #[test]
        fn sorted_by_priority_and_truncated() {
            let mut mastery = tracker();
            seed(&mut mastery, "a", MasteryLevel::Introduced, 1.0, 2);
            seed(&mut mastery, "b", MasteryLevel::Fluent, 1.0, 30);
            seed(&mut mastery, "c", MasteryLevel::Developing, 1.0, 3);

            let scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            let due = scheduler.get_due_reviews(2, 0.7, now()).unwrap();

            let ids: Vec<&str> = due.iter().map(|i| i.topic_id.as_str()).collect();
            assert_eq!(ids, vec!["b", "c"]);
            assert!(due[0].priority >= due[1].priority);
        }

        #[test]
        fn level_without_review_is_due_with_no_date() {
            let mut mastery = tracker();
            mastery.get_record("set").level = MasteryLevel::Proficient;

            let scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            let due = scheduler.get_due_reviews(10, 0.7, now()).unwrap();
            assert_eq!(due[0].retention, 0.0);
            assert_eq!(due[0].days_since_review, 0.0);
            assert_eq!(due[0].optimal_review_date, None);
        }

        #[test]
        fn invalid_threshold_is_an_error() {
            let mut mastery = tracker();
            seed(&mut mastery, "t", MasteryLevel::Proficient, 2.0, 4);
            let scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            assert!(matches!(
                scheduler.get_due_reviews(10, 1.5, now()),
                Err(Error::InvalidTarget(_))
            ));
        }
    }

    mod complete_review_tests {
        use super::*;

        #[test]
        fn records_practice_and_schedules_next() {
            let mut mastery = tracker();
            seed(&mut mastery, "t", MasteryLevel::Developing, 2.0, 4);

            let mut scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            let result = scheduler.complete_review("t", 0.9, None, now()).unwrap();

            assert_eq!(result.new_level, "proficient");
            assert!((result.retention_at_review - (-2.0f64).exp()).abs() < 1e-9);
            assert!((result.new_stability - 2.4).abs() < 1e-12);
            let interval = (-2.4 * 0.85f64.ln()).max(0.5);
            assert!((result.days_until_review - interval).abs() < 1e-6);
            assert!(result.fire_credited.is_empty());

            let record = mastery.record("t").unwrap();
            assert_eq!(record.last_review, Some(now()));
            assert_eq!(record.history.last().unwrap().problem_type, "review");
        }

        #[test]
        fn passing_score_credits_ancestors() {
            let mut mastery = tracker();
            seed(&mut mastery, "child", MasteryLevel::Developing, 2.0, 1);
            seed(&mut mastery, "parent", MasteryLevel::Proficient, 2.0, 3);
            let weights: BTreeMap<String, f64> = [("parent".to_string(), 0.5)].into();

            let mut scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            let result = scheduler
                .complete_review("child", 0.8, Some(&weights), now())
                .unwrap();

            assert_eq!(result.fire_credited, vec!["parent"]);
            assert_eq!(mastery.record("parent").unwrap().last_review, Some(now()));
        }

        #[test]
        fn failing_score_skips_fire() {
            let mut mastery = tracker();
            seed(&mut mastery, "child", MasteryLevel::Developing, 2.0, 1);
            seed(&mut mastery, "parent", MasteryLevel::Proficient, 2.0, 3);
            let weights: BTreeMap<String, f64> = [("parent".to_string(), 0.5)].into();

            let mut scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            let result = scheduler
                .complete_review("child", 0.4, Some(&weights), now())
                .unwrap();

            assert!(result.fire_credited.is_empty());
            assert_eq!(
                mastery.record("parent").unwrap().last_review,
                Some(now() - Duration::days(3))
            );
        }

        #[test]
        fn ebbinghaus_rule_flows_through() {
            let mut mastery = tracker().with_stability_rule(decay::StabilityRule::Ebbinghaus);
            seed(&mut mastery, "t", MasteryLevel::Developing, 2.0, 4);
            let retention = mastery.retention("t", now());

            let mut scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            let result = scheduler.complete_review("t", 0.8, None, now()).unwrap();
            assert_eq!(result.new_stability, decay::update_stability(2.0, 0.8, retention));
        }

        #[test]
        fn persists_the_review() {
            let storage = Rc::new(MemoryStorage::new());
            let mut mastery = MasteryTracker::new(storage.clone());
            seed(&mut mastery, "t", MasteryLevel::Developing, 2.0, 4);

            ReviewScheduler::new(&mut mastery, 0.85)
                .complete_review("t", 0.9, None, now())
                .unwrap();

            let reloaded = MasteryTracker::load(storage).unwrap();
            assert_eq!(reloaded.record("t").map(|r| r.practice_count), Some(2));
        }
    }

    mod stats_tests {
        use super::*;

        #[test]
        fn buckets_by_retention() {
            let mut mastery = tracker();
            // retentions: e^-5, e^-0.2 (0.82), e^-0.1 (0.90), 1.0
            seed(&mut mastery, "now", MasteryLevel::Developing, 1.0, 5);
            seed(&mut mastery, "today", MasteryLevel::Developing, 10.0, 2);
            seed(&mut mastery, "week", MasteryLevel::Developing, 10.0, 1);
            seed(&mut mastery, "fine", MasteryLevel::Developing, 10.0, 0);
            mastery.get_record("unknown");

            let scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            let stats = scheduler.get_review_stats(now());

            assert_eq!(stats.total_topics, 4);
            assert_eq!(stats.due_now, 1);
            assert_eq!(stats.due_today, 1);
            assert_eq!(stats.due_this_week, 1);
            assert_eq!(stats.total_reviews_completed, 4);
            let expected = ((-5.0f64).exp() + (-0.2f64).exp() + (-0.1f64).exp() + 1.0) / 4.0;
            assert!((stats.average_retention - expected).abs() < 1e-9);
        }

        #[test]
        fn empty_tracker() {
            let mut mastery = tracker();
            let scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            assert_eq!(scheduler.get_review_stats(now()), ReviewStats::default());
        }
    }

    mod optimize_tests {
        use super::*;

        #[test]
        fn fits_reviews_into_available_time() {
            let mut mastery = tracker();
            for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
                seed(&mut mastery, id, MasteryLevel::Developing, 1.0, i as i64 + 1);
            }

            let scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            assert_eq!(scheduler.optimize_schedule(10, 3.0, now()).unwrap().len(), 3);
            assert_eq!(scheduler.optimize_schedule(60, 3.0, now()).unwrap().len(), 5);
            assert!(scheduler.optimize_schedule(2, 3.0, now()).unwrap().is_empty());
            assert!(scheduler.optimize_schedule(30, 0.0, now()).unwrap().is_empty());
        }

        #[test]
        fn uses_wider_threshold() {
            let mut mastery = tracker();
            // retention e^-0.2 ~ 0.82: not due at 0.7, due at 0.85
            seed(&mut mastery, "t", MasteryLevel::Developing, 10.0, 2);

            let scheduler = ReviewScheduler::new(&mut mastery, 0.85);
            assert!(scheduler.get_due_reviews(10, 0.7, now()).unwrap().is_empty());
            assert_eq!(scheduler.optimize_schedule(30, 3.0, now()).unwrap().len(), 1);
        }
    }
}
