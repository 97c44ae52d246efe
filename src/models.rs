use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_difficulty() -> f64 {
    0.5
}

fn default_estimated_hours() -> f64 {
    1.0
}

// A learnable unit in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: f64,
    #[serde(default = "default_estimated_hours")]
    pub estimated_hours: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Topic {
    pub fn new(id: impl Into<String>, name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            domain: domain.into(),
            description: String::new(),
            difficulty: default_difficulty(),
            estimated_hours: default_estimated_hours(),
            tags: Vec::new(),
            concepts: Vec::new(),
            skills: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: f64) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = hours;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_concepts(mut self, concepts: &[&str]) -> Self {
        self.concepts = concepts.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_skills(mut self, skills: &[&str]) -> Self {
        self.skills = skills.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn matches(&self, query_lower: &str) -> bool {
        self.name.to_lowercase().contains(query_lower)
            || self.description.to_lowercase().contains(query_lower)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(query_lower))
    }
}

// Depth of understanding for a topic, Unknown through Fluent
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u8", from = "u8")]
pub enum MasteryLevel {
    #[default]
    Unknown = 0,
    Introduced = 1,
    Developing = 2,
    Proficient = 3,
    Mastered = 4,
    Fluent = 5,
}

impl MasteryLevel {
    pub const ALL: [MasteryLevel; 6] = [
        MasteryLevel::Unknown,
        MasteryLevel::Introduced,
        MasteryLevel::Developing,
        MasteryLevel::Proficient,
        MasteryLevel::Mastered,
        MasteryLevel::Fluent,
    ];

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => MasteryLevel::Introduced,
            2 => MasteryLevel::Developing,
            3 => MasteryLevel::Proficient,
            4 => MasteryLevel::Mastered,
            5 => MasteryLevel::Fluent,
            _ => MasteryLevel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryLevel::Unknown => "unknown",
            MasteryLevel::Introduced => "introduced",
            MasteryLevel::Developing => "developing",
            MasteryLevel::Proficient => "proficient",
            MasteryLevel::Mastered => "mastered",
            MasteryLevel::Fluent => "fluent",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MasteryLevel::Unknown => "Unknown",
            MasteryLevel::Introduced => "Introduced",
            MasteryLevel::Developing => "Developing",
            MasteryLevel::Proficient => "Proficient",
            MasteryLevel::Mastered => "Mastered",
            MasteryLevel::Fluent => "Fluent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MasteryLevel::Unknown => "Never encountered this topic",
            MasteryLevel::Introduced => "Seen the topic but haven't practiced",
            MasteryLevel::Developing => "Actively learning, making progress",
            MasteryLevel::Proficient => "Can solve problems with conscious effort",
            MasteryLevel::Mastered => "Reliable recall and application",
            MasteryLevel::Fluent => "Automatic, effortless mastery",
        }
    }

    /// Minimum decayed retention required to hold this rank.
    pub fn retention_threshold(&self) -> f64 {
        match self {
            MasteryLevel::Unknown => 0.0,
            MasteryLevel::Introduced => 0.1,
            MasteryLevel::Developing => 0.4,
            MasteryLevel::Proficient => 0.6,
            MasteryLevel::Mastered => 0.8,
            MasteryLevel::Fluent => 0.95,
        }
    }

    /// Minimum single-practice score required to promote into this rank.
    pub fn score_threshold(&self) -> f64 {
        match self {
            MasteryLevel::Unknown | MasteryLevel::Introduced => 0.0,
            MasteryLevel::Developing => 0.3,
            MasteryLevel::Proficient => 0.6,
            MasteryLevel::Mastered => 0.8,
            MasteryLevel::Fluent => 0.95,
        }
    }

    pub fn review_interval_multiplier(&self) -> f64 {
        match self {
            MasteryLevel::Unknown => 0.0,
            MasteryLevel::Introduced => 0.5,
            MasteryLevel::Developing => 1.0,
            MasteryLevel::Proficient => 2.0,
            MasteryLevel::Mastered => 4.0,
            MasteryLevel::Fluent => 8.0,
        }
    }

    fn promoted(self) -> Self {
        Self::from_u8((self.as_u8() + 1).min(5))
    }

    fn demoted(self) -> Self {
        Self::from_u8(self.as_u8().saturating_sub(1))
    }

    /// Level after a practice event with `score`.
    ///
    /// The score picks a target rank, but the walk is strictly incremental:
    /// at most one promotion, or one demotion on a score below 0.30, per event.
    /// A poor score never demotes below Introduced.
    pub fn next_level(score: f64, current: MasteryLevel) -> MasteryLevel {
        let target = if score >= 0.95 {
            MasteryLevel::Fluent
        } else if score >= 0.80 {
            MasteryLevel::Mastered
        } else if score >= 0.60 {
            MasteryLevel::Proficient
        } else if score >= 0.30 {
            MasteryLevel::Developing
        } else {
            current.demoted().max(MasteryLevel::Introduced)
        };

        if target > current {
            return current.promoted();
        }

        if score < 0.3 && current > MasteryLevel::Introduced {
            return current.demoted();
        }

        current
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unknown" | "0" => Some(MasteryLevel::Unknown),
            "introduced" | "1" => Some(MasteryLevel::Introduced),
            "developing" | "2" => Some(MasteryLevel::Developing),
            "proficient" | "3" => Some(MasteryLevel::Proficient),
            "mastered" | "4" => Some(MasteryLevel::Mastered),
            "fluent" | "5" => Some(MasteryLevel::Fluent),
            _ => None,
        }
    }
}

impl From<MasteryLevel> for u8 {
    fn from(level: MasteryLevel) -> Self {
        level.as_u8()
    }
}

impl From<u8> for MasteryLevel {
    fn from(v: u8) -> Self {
        MasteryLevel::from_u8(v)
    }
}

// A single entry in a mastery record's practice log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeEvent {
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub level_before: MasteryLevel,
    pub level_after: MasteryLevel,
    #[serde(default)]
    pub problem_type: String,
    #[serde(default)]
    pub time_spent_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Concept,
    Calculation,
    Proof,
    Application,
}

impl ProblemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemType::Concept => "concept",
            ProblemType::Calculation => "calculation",
            ProblemType::Proof => "proof",
            ProblemType::Application => "application",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "concept" | "c" => Some(ProblemType::Concept),
            "calculation" | "calc" => Some(ProblemType::Calculation),
            "proof" | "p" => Some(ProblemType::Proof),
            "application" | "app" | "a" => Some(ProblemType::Application),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Adaptive,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Adaptive => "adaptive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" | "e" => Some(Difficulty::Easy),
            "medium" | "m" => Some(Difficulty::Medium),
            "hard" | "h" => Some(Difficulty::Hard),
            "adaptive" | "a" => Some(Difficulty::Adaptive),
            _ => None,
        }
    }
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod topic_tests {
        use super::*;

        #[test]
        fn deserialize_applies_defaults() {
            let json = r#"{"id": "limits", "name": "Limits", "domain": "math"}"#;
            let topic: Topic = serde_json::from_str(json).unwrap();
            assert_eq!(topic.description, "");
            assert_eq!(topic.difficulty, 0.5);
            assert_eq!(topic.estimated_hours, 1.0);
            assert!(topic.tags.is_empty());
            assert!(topic.created_at.is_none());
        }

        #[test]
        fn deserialize_requires_domain() {
            let json = r#"{"id": "limits", "name": "Limits"}"#;
            assert!(serde_json::from_str::<Topic>(json).is_err());
        }

        #[test]
        fn round_trip_preserves_all_fields() {
            let topic = Topic::new("vectors", "Vectors", "math")
                .with_description("Vector operations")
                .with_difficulty(0.4)
                .with_hours(4.0)
                .with_tags(&["linear-algebra"])
                .with_concepts(&["dot product", "cross product"])
                .with_skills(&["vector operations"]);

            let json = serde_json::to_string(&topic).unwrap();
            let back: Topic = serde_json::from_str(&json).unwrap();
            assert_eq!(back, topic);
        }

        #[test]
        fn matches_is_case_insensitive_across_fields() {
            let topic = Topic::new("graphs", "Graph Algorithms", "cs")
                .with_description("Shortest paths and traversal")
                .with_tags(&["BFS"]);

            assert!(topic.matches("graph"));
            assert!(topic.matches("shortest"));
            assert!(topic.matches("bfs"));
            assert!(!topic.matches("calculus"));
        }
    }

    mod mastery_level_tests {
        use super::*;

        #[test]
        fn as_u8_returns_ordinals() {
            for (i, level) in MasteryLevel::ALL.iter().enumerate() {
                assert_eq!(level.as_u8() as usize, i);
            }
        }

        #[test]
        fn from_u8_invalid_returns_unknown() {
            assert_eq!(MasteryLevel::from_u8(6), MasteryLevel::Unknown);
            assert_eq!(MasteryLevel::from_u8(255), MasteryLevel::Unknown);
        }

        #[test]
        fn serializes_as_integer() {
            assert_eq!(serde_json::to_string(&MasteryLevel::Proficient).unwrap(), "3");
            let level: MasteryLevel = serde_json::from_str("5").unwrap();
            assert_eq!(level, MasteryLevel::Fluent);
        }

        #[test]
        fn constant_tables() {
            assert_eq!(MasteryLevel::Developing.retention_threshold(), 0.4);
            assert_eq!(MasteryLevel::Fluent.retention_threshold(), 0.95);
            assert_eq!(MasteryLevel::Proficient.score_threshold(), 0.6);
            assert_eq!(MasteryLevel::Introduced.score_threshold(), 0.0);
            assert_eq!(MasteryLevel::Mastered.review_interval_multiplier(), 4.0);
            assert_eq!(MasteryLevel::Unknown.review_interval_multiplier(), 0.0);
        }

        #[test]
        fn from_str_names_and_digits() {
            assert_eq!(MasteryLevel::from_str("Fluent"), Some(MasteryLevel::Fluent));
            assert_eq!(MasteryLevel::from_str("2"), Some(MasteryLevel::Developing));
            assert_eq!(MasteryLevel::from_str("expert"), None);
        }

        #[test]
        fn unknown_with_excellent_score_only_reaches_introduced() {
            assert_eq!(
                MasteryLevel::next_level(0.97, MasteryLevel::Unknown),
                MasteryLevel::Introduced
            );
        }

        #[test]
        fn promotes_one_rank_towards_target() {
            assert_eq!(
                MasteryLevel::next_level(0.85, MasteryLevel::Developing),
                MasteryLevel::Proficient
            );
        }

        #[test]
        fn score_at_target_keeps_level() {
            assert_eq!(
                MasteryLevel::next_level(0.65, MasteryLevel::Proficient),
                MasteryLevel::Proficient
            );
            // A mid score never demotes a higher rank.
            assert_eq!(
                MasteryLevel::next_level(0.5, MasteryLevel::Mastered),
                MasteryLevel::Mastered
            );
        }

        #[test]
        fn poor_score_demotes_one_rank() {
            assert_eq!(
                MasteryLevel::next_level(0.1, MasteryLevel::Fluent),
                MasteryLevel::Mastered
            );
            assert_eq!(
                MasteryLevel::next_level(0.1, MasteryLevel::Developing),
                MasteryLevel::Introduced
            );
        }

        #[test]
        fn poor_score_never_drops_below_introduced() {
            assert_eq!(
                MasteryLevel::next_level(0.0, MasteryLevel::Introduced),
                MasteryLevel::Introduced
            );
        }

        #[test]
        fn poor_score_on_unknown_introduces() {
            // Target is max(Introduced, Unknown - 1), which is above Unknown.
            assert_eq!(
                MasteryLevel::next_level(0.1, MasteryLevel::Unknown),
                MasteryLevel::Introduced
            );
        }
    }

    proptest! {
        #[test]
        fn next_level_moves_at_most_one_rank(score in 0.0f64..=1.0, ordinal in 0u8..=5) {
            let current = MasteryLevel::from_u8(ordinal);
            let next = MasteryLevel::next_level(score, current);
            let delta = next.as_u8() as i16 - current.as_u8() as i16;
            prop_assert!(delta.abs() <= 1, "{:?} -> {:?} on {}", current, next, score);
        }
    }

    mod problem_type_tests {
        use super::*;

        #[test]
        fn from_str_valid_inputs() {
            assert_eq!(ProblemType::from_str("proof"), Some(ProblemType::Proof));
            assert_eq!(ProblemType::from_str("CALC"), Some(ProblemType::Calculation));
            assert_eq!(ProblemType::from_str("essay"), None);
        }

        #[test]
        fn difficulty_from_str() {
            assert_eq!(Difficulty::from_str("hard"), Some(Difficulty::Hard));
            assert_eq!(Difficulty::from_str("Adaptive"), Some(Difficulty::Adaptive));
            assert_eq!(Difficulty::from_str("extreme"), None);
        }
    }

    mod json_output_tests {
        use super::*;

        #[test]
        fn ok_with_string() {
            let output = JsonOutput::ok("test data");
            assert!(output.success);
            assert_eq!(output.data, Some("test data"));
            assert!(output.error.is_none());
        }

        #[test]
        fn err_with_string() {
            let output = JsonOutput::<()>::err("something went wrong");
            assert!(!output.success);
            assert!(output.data.is_none());
            assert_eq!(output.error, Some("something went wrong".to_string()));
        }

        #[test]
        fn serializes_err_correctly() {
            let output = JsonOutput::<()>::err("error");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":false"));
            assert!(json.contains("\"data\":null"));
            assert!(json.contains("\"error\":\"error\""));
        }
    }
}
