use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::decay::{self, StabilityRule};
use crate::error::{Error, Result};
use crate::models::{MasteryLevel, PracticeEvent};
use crate::storage::Storage;

pub const MASTERY_KEY: &str = "mastery";
pub const HISTORY_LIMIT: usize = 50;
pub const DEFAULT_REVIEW_THRESHOLD: f64 = 0.7;

// Ancestors only take FIRe credit when score * weight reaches this
const FIRE_MIN_CREDIT: f64 = 0.3;

fn default_stability() -> f64 {
    1.0
}

// Learner state for a single topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryRecord {
    pub topic_id: String,
    #[serde(default)]
    pub level: MasteryLevel,
    #[serde(default)]
    pub last_practiced: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_review: Option<DateTime<Utc>>,
    #[serde(default)]
    pub practice_count: u32,
    #[serde(default)]
    pub total_time_seconds: u64,
    #[serde(default)]
    pub average_score: f64,
    #[serde(default = "default_stability")]
    pub stability: f64,
    #[serde(default)]
    pub history: Vec<PracticeEvent>,
}

impl MasteryRecord {
    pub fn new(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            level: MasteryLevel::Unknown,
            last_practiced: None,
            last_review: None,
            practice_count: 0,
            total_time_seconds: 0,
            average_score: 0.0,
            stability: default_stability(),
            history: Vec::new(),
        }
    }

    /// Applies one practice result and returns the new level.
    pub fn record_practice(
        &mut self,
        score: f64,
        problem_type: &str,
        time_spent_seconds: u64,
        rule: StabilityRule,
        now: DateTime<Utc>,
    ) -> MasteryLevel {
        let level_before = self.level;
        let retention_at_review = self.retention(now);

        self.level = MasteryLevel::next_level(score, self.level);
        self.practice_count += 1;
        self.total_time_seconds += time_spent_seconds;
        self.last_practiced = Some(now);
        self.last_review = Some(now);

        let n = self.practice_count as f64;
        self.average_score = (self.average_score * (n - 1.0) + score) / n;
        self.stability = rule.apply(self.stability, score, retention_at_review);

        self.history.push(PracticeEvent {
            timestamp: now,
            score,
            level_before,
            level_after: self.level,
            problem_type: problem_type.to_string(),
            time_spent_seconds,
        });
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }

        self.level
    }

    pub fn days_since_review(&self, now: DateTime<Utc>) -> Option<f64> {
        self.last_review.map(|last| decay::days_between(last, now))
    }

    /// Decayed retention; zero if the topic was never reviewed.
    pub fn retention(&self, now: DateTime<Utc>) -> f64 {
        match self.days_since_review(now) {
            Some(days) => decay::retention(days, self.stability),
            None => 0.0,
        }
    }

    pub fn needs_review(&self, threshold: f64, now: DateTime<Utc>) -> bool {
        if self.level == MasteryLevel::Unknown {
            return false;
        }
        self.retention(now) < threshold
    }

    /// When retention reaches `target`, counted from midnight of the last
    /// review day.
    pub fn optimal_review_date(&self, target: f64) -> Result<Option<DateTime<Utc>>> {
        let Some(last) = self.last_review else {
            return Ok(None);
        };
        if self.level == MasteryLevel::Unknown {
            return Ok(None);
        }

        let days = decay::optimal_review_interval(target, self.stability)?;
        let midnight = last.date_naive().and_time(NaiveTime::MIN).and_utc();
        Ok(Some(midnight + decay::days_to_duration(days)))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MasterySnapshot {
    #[serde(default)]
    records: Vec<MasteryRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasterySummary {
    pub total_topics: usize,
    pub by_level: BTreeMap<String, usize>,
    pub average_retention: f64,
    pub topics_needing_review: usize,
}

/// All mastery records, committed to storage after every mutation.
pub struct MasteryTracker {
    records: BTreeMap<String, MasteryRecord>,
    storage: Rc<dyn Storage>,
    stability_rule: StabilityRule,
}

impl MasteryTracker {
    pub fn new(storage: Rc<dyn Storage>) -> Self {
        Self {
            records: BTreeMap::new(),
            storage,
            stability_rule: StabilityRule::default(),
        }
    }

    pub fn with_stability_rule(mut self, rule: StabilityRule) -> Self {
        self.stability_rule = rule;
        self
    }

    pub fn stability_rule(&self) -> StabilityRule {
        self.stability_rule
    }

    pub fn load(storage: Rc<dyn Storage>) -> Result<Self> {
        let body = storage.load(MASTERY_KEY)?;
        let mut tracker = Self::new(storage);

        let Some(body) = body else {
            return Ok(tracker);
        };

        let snapshot: MasterySnapshot =
            serde_json::from_str(&body).map_err(|e| Error::MalformedSnapshot {
                key: MASTERY_KEY.to_string(),
                reason: e.to_string(),
            })?;

        for record in snapshot.records {
            tracker.records.insert(record.topic_id.clone(), record);
        }
        debug!(records = tracker.records.len(), "loaded mastery records");
        Ok(tracker)
    }

    /// Loads the stored records, starting empty if they cannot be read.
    pub fn load_or_default(storage: Rc<dyn Storage>) -> Self {
        match Self::load(Rc::clone(&storage)) {
            Ok(tracker) => tracker,
            Err(e) => {
                warn!(error = %e, "mastery records unreadable, starting empty");
                Self::new(storage)
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let snapshot = MasterySnapshot {
            records: self.records.values().cloned().collect(),
        };
        self.storage
            .save(MASTERY_KEY, &serde_json::to_string_pretty(&snapshot)?)?;
        debug!(records = self.records.len(), "saved mastery records");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in topic id order.
    pub fn records(&self) -> impl Iterator<Item = &MasteryRecord> {
        self.records.values()
    }

    pub fn record(&self, topic_id: &str) -> Option<&MasteryRecord> {
        self.records.get(topic_id)
    }

    pub fn get_record(&mut self, topic_id: &str) -> &mut MasteryRecord {
        self.records
            .entry(topic_id.to_string())
            .or_insert_with(|| MasteryRecord::new(topic_id))
    }

    pub fn level(&self, topic_id: &str) -> MasteryLevel {
        self.record(topic_id).map(|r| r.level).unwrap_or_default()
    }

    pub fn retention(&self, topic_id: &str, now: DateTime<Utc>) -> f64 {
        self.record(topic_id).map(|r| r.retention(now)).unwrap_or(0.0)
    }

    /// Topics at or above `level`.
    pub fn topics_at_least(&self, level: MasteryLevel) -> HashSet<String> {
        self.records
            .values()
            .filter(|r| r.level >= level)
            .map(|r| r.topic_id.clone())
            .collect()
    }

    pub fn record_practice(
        &mut self,
        topic_id: &str,
        score: f64,
        problem_type: &str,
        time_spent_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<MasteryLevel> {
        let rule = self.stability_rule;
        let record = self.get_record(topic_id);
        let before = record.level;
        let level = record.record_practice(score, problem_type, time_spent_seconds, rule, now);

        if level != before {
            info!(topic = topic_id, from = before.as_str(), to = level.as_str(), "mastery level changed");
        }

        self.save()?;
        Ok(level)
    }

    /// Overrides a topic's level without logging a practice event.
    pub fn set_level(&mut self, topic_id: &str, level: MasteryLevel) -> Result<()> {
        self.get_record(topic_id).level = level;
        info!(topic = topic_id, level = level.as_str(), "mastery level set");
        self.save()
    }

    // Implicit review of ancestors; level and history stay as they are
    pub(crate) fn credit_ancestors(
        &mut self,
        weights: &BTreeMap<String, f64>,
        base_score: f64,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut credited = Vec::new();
        let ceiling = self.stability_rule.ceiling();

        for (ancestor_id, weight) in weights {
            if base_score * weight < FIRE_MIN_CREDIT {
                continue;
            }
            let Some(record) = self.records.get_mut(ancestor_id) else {
                continue;
            };
            if record.last_review.is_none() {
                continue;
            }

            // Credit never lowers stability, even above the rule's ceiling
            let nudged = (record.stability * (1.0 + 0.1 * weight)).min(ceiling);
            record.stability = record.stability.max(nudged);
            record.last_review = Some(now);
            credited.push(ancestor_id.clone());
        }

        if !credited.is_empty() {
            debug!(credited = ?credited, "applied FIRe credit");
        }
        credited
    }

    /// Gives ancestors of a practiced topic partial review credit and returns
    /// the ids that were credited.
    pub fn apply_fire_credit(
        &mut self,
        weights: &BTreeMap<String, f64>,
        base_score: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let credited = self.credit_ancestors(weights, base_score, now);
        self.save()?;
        Ok(credited)
    }

    /// Records below `threshold`, weakest first.
    pub fn topics_due_for_review(&self, threshold: f64, now: DateTime<Utc>) -> Vec<&MasteryRecord> {
        let mut due: Vec<(&MasteryRecord, f64)> = self
            .records
            .values()
            .filter(|r| r.needs_review(threshold, now))
            .map(|r| (r, r.retention(now)))
            .collect();

        due.sort_by(|a, b| a.1.total_cmp(&b.1));
        due.into_iter().map(|(r, _)| r).collect()
    }

    pub fn summary(&self, now: DateTime<Utc>) -> MasterySummary {
        if self.records.is_empty() {
            return MasterySummary {
                total_topics: 0,
                by_level: BTreeMap::new(),
                average_retention: 0.0,
                topics_needing_review: 0,
            };
        }

        let mut by_level: BTreeMap<String, usize> = MasteryLevel::ALL
            .iter()
            .map(|l| (l.as_str().to_string(), 0))
            .collect();
        let mut total_retention = 0.0;
        let mut needing_review = 0;

        for record in self.records.values() {
            *by_level.entry(record.level.as_str().to_string()).or_default() += 1;
            total_retention += record.retention(now);
            if record.needs_review(DEFAULT_REVIEW_THRESHOLD, now) {
                needing_review += 1;
            }
        }

        MasterySummary {
            total_topics: self.records.len(),
            by_level,
            average_retention: total_retention / self.records.len() as f64,
            topics_needing_review: needing_review,
        }
    }
}
