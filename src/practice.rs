use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{KnowledgeGraph, FIRE_MAX_DEPTH};
use crate::mastery::{MasteryTracker, DEFAULT_REVIEW_THRESHOLD};
use crate::models::{Difficulty, MasteryLevel, ProblemType, Topic};
use crate::scheduler::{ReviewScheduler, FIRE_MIN_SCORE};

pub const HINT_PENALTY: f64 = 0.1;

/// Level at which a topic counts as learned when unlocking dependents.
pub const COMPLETED_LEVEL: MasteryLevel = MasteryLevel::Proficient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Review,
    NewTopic,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub topic_id: Option<String>,
    pub topic: Option<Topic>,
    pub reason: String,
    pub suggested_difficulty: Option<Difficulty>,
}

/// What to practice next: the most urgent review, else the easiest unlocked
/// topic.
pub fn recommend_next(
    graph: &KnowledgeGraph,
    scheduler: &ReviewScheduler,
    now: DateTime<Utc>,
) -> Result<Recommendation> {
    let due = scheduler.get_due_reviews(1, DEFAULT_REVIEW_THRESHOLD, now)?;
    if let Some(item) = due.into_iter().next() {
        return Ok(Recommendation {
            kind: RecommendationKind::Review,
            topic: graph.get_topic(&item.topic_id).cloned(),
            reason: format!("Retention at {:.0}%, needs review", item.retention * 100.0),
            topic_id: Some(item.topic_id),
            suggested_difficulty: Some(Difficulty::Adaptive),
        });
    }

    let completed = scheduler.mastery().topics_at_least(COMPLETED_LEVEL);
    if let Some(topic) = graph.get_available_topics(&completed).into_iter().next() {
        return Ok(Recommendation {
            kind: RecommendationKind::NewTopic,
            topic_id: Some(topic.id.clone()),
            topic: Some(topic.clone()),
            reason: "All prerequisites completed".to_string(),
            suggested_difficulty: Some(Difficulty::Easy),
        });
    }

    Ok(Recommendation {
        kind: RecommendationKind::None,
        topic_id: None,
        topic: None,
        reason: "No topics available. Consider adding more to the knowledge graph.".to_string(),
        suggested_difficulty: None,
    })
}

/// `prob-{topic}-{n}`. Topic ids may themselves contain hyphens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemId {
    pub topic_id: String,
    pub sequence: Option<u32>,
}

impl ProblemId {
    pub fn new(topic_id: impl Into<String>, sequence: u32) -> Self {
        Self {
            topic_id: topic_id.into(),
            sequence: Some(sequence),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidProblemId(s.to_string());

        let rest = s.strip_prefix("prob-").ok_or_else(invalid)?;
        let (topic_id, sequence) = match rest.rsplit_once('-') {
            Some((topic, n)) => match n.parse::<u32>() {
                Ok(n) => (topic, Some(n)),
                Err(_) => (rest, None),
            },
            None => (rest, None),
        };

        if topic_id.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            topic_id: topic_id.to_string(),
            sequence,
        })
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sequence {
            Some(n) => write!(f, "prob-{}-{}", self.topic_id, n),
            None => write!(f, "prob-{}", self.topic_id),
        }
    }
}

// Problem metadata; the problem text itself comes from elsewhere
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub problem_id: String,
    pub topic: Topic,
    #[serde(rename = "type")]
    pub problem_type: ProblemType,
    pub difficulty: Difficulty,
    pub mastery_level: String,
    pub concepts: Vec<String>,
    pub hint_available: bool,
}

pub fn generate_problem(
    graph: &KnowledgeGraph,
    tracker: &MasteryTracker,
    topic_id: &str,
    problem_type: ProblemType,
    difficulty: Difficulty,
) -> Result<Problem> {
    let topic = graph
        .get_topic(topic_id)
        .ok_or_else(|| Error::UnknownTopic(topic_id.to_string()))?;

    let (level, practice_count) = tracker
        .record(topic_id)
        .map(|r| (r.level, r.practice_count))
        .unwrap_or_default();

    let problem_id = ProblemId::new(topic_id, practice_count + 1);
    debug!(problem = %problem_id, "generated problem");

    Ok(Problem {
        problem_id: problem_id.to_string(),
        topic: topic.clone(),
        problem_type,
        difficulty,
        mastery_level: level.as_str().to_string(),
        concepts: topic.concepts.iter().take(3).cloned().collect(),
        hint_available: true,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hint {
    pub problem: String,
    pub hint: String,
    pub hint_penalty: f64,
}

pub fn hint_for(graph: &KnowledgeGraph, problem_id: &str) -> Result<Hint> {
    let parsed = ProblemId::parse(problem_id)?;
    let concepts: Vec<&str> = graph
        .get_topic(&parsed.topic_id)
        .map(|t| t.concepts.iter().take(2).map(String::as_str).collect())
        .unwrap_or_default();

    let focus = if concepts.is_empty() {
        "review the topic".to_string()
    } else {
        concepts.join(", ")
    };

    Ok(Hint {
        problem: problem_id.to_string(),
        hint: format!("Consider the key concepts: {}", focus),
        hint_penalty: HINT_PENALTY,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PracticeOutcome {
    pub problem: String,
    pub topic_id: String,
    pub score: f64,
    pub new_level: String,
    pub fire_credit: Vec<String>,
}

/// Records a solved problem against its topic and, on a passing score,
/// credits the topic's ancestors.
pub fn complete_problem(
    graph: &KnowledgeGraph,
    tracker: &mut MasteryTracker,
    problem_id: &str,
    score: f64,
    problem_type: Option<ProblemType>,
    now: DateTime<Utc>,
) -> Result<PracticeOutcome> {
    let parsed = ProblemId::parse(problem_id)?;
    if !graph.contains(&parsed.topic_id) {
        return Err(Error::UnknownTopic(parsed.topic_id));
    }

    let kind = problem_type.map(|p| p.as_str()).unwrap_or("");
    let new_level = tracker.record_practice(&parsed.topic_id, score, kind, 0, now)?;

    let fire_credit = if score >= FIRE_MIN_SCORE {
        let weights = graph.get_fire_ancestors(&parsed.topic_id, FIRE_MAX_DEPTH);
        tracker.apply_fire_credit(&weights, score, now)?
    } else {
        Vec::new()
    };

    Ok(PracticeOutcome {
        problem: problem_id.to_string(),
        topic_id: parsed.topic_id,
        score,
        new_level: new_level.as_str().to_string(),
        fire_credit,
    })
}
