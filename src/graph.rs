use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog;
use crate::error::{Error, Result};
use crate::models::Topic;
use crate::storage::Storage;

pub const GRAPH_KEY: &str = "knowledge_graph";

/// Weight credited to direct prerequisites when a topic is practiced.
pub const FIRE_BASE_WEIGHT: f64 = 0.5;
pub const FIRE_MAX_DEPTH: usize = 4;

static EMPTY: BTreeSet<String> = BTreeSet::new();

/// A DAG of topics where an edge `prereq -> topic` means `prereq` must be
/// learned before `topic`.
///
/// Topics keep their catalog insertion order for listing. Adjacency sets are
/// ordered by id, so traversals and tie-breaks are deterministic.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    topics: HashMap<String, Topic>,
    order: Vec<String>,
    prerequisites: BTreeMap<String, BTreeSet<String>>,
    dependents: BTreeMap<String, BTreeSet<String>>,
}

// Persisted form; dependents are rebuilt on load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default, with = "topic_map")]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub prerequisites: BTreeMap<String, Vec<String>>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph seeded with the bundled math and CS catalog.
    pub fn create_default() -> Self {
        let mut graph = Self::new();

        for topic in catalog::math_topics().into_iter().chain(catalog::cs_topics()) {
            graph.add_topic(topic);
        }

        for (topic_id, prereqs) in catalog::MATH_PREREQUISITES
            .iter()
            .chain(catalog::CS_PREREQUISITES)
        {
            for prereq_id in prereqs.iter() {
                if let Err(e) = graph.add_prerequisite(topic_id, prereq_id) {
                    warn!(topic = topic_id, prereq = prereq_id, error = %e, "skipping catalog edge");
                }
            }
        }

        graph
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, topic_id: &str) -> bool {
        self.topics.contains_key(topic_id)
    }

    pub fn get_topic(&self, topic_id: &str) -> Option<&Topic> {
        self.topics.get(topic_id)
    }

    /// All topics in catalog order.
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.order.iter().filter_map(|id| self.topics.get(id))
    }

    pub fn edge_count(&self) -> usize {
        self.prerequisites.values().map(BTreeSet::len).sum()
    }

    /// Inserts or replaces a topic. A replaced topic keeps its catalog position.
    pub fn add_topic(&mut self, topic: Topic) {
        if !self.topics.contains_key(&topic.id) {
            self.order.push(topic.id.clone());
        }
        self.topics.insert(topic.id.clone(), topic);
    }

    /// Registers `prereq_id` as a prerequisite of `topic_id`.
    ///
    /// Rejected edges leave the graph untouched.
    pub fn add_prerequisite(&mut self, topic_id: &str, prereq_id: &str) -> Result<()> {
        if !self.contains(topic_id) {
            return Err(Error::UnknownTopic(topic_id.to_string()));
        }
        if !self.contains(prereq_id) {
            return Err(Error::UnknownTopic(prereq_id.to_string()));
        }

        if self.would_create_cycle(topic_id, prereq_id) {
            return Err(Error::CycleDetected {
                topic: topic_id.to_string(),
                prerequisite: prereq_id.to_string(),
            });
        }

        self.prerequisites
            .entry(topic_id.to_string())
            .or_default()
            .insert(prereq_id.to_string());
        self.dependents
            .entry(prereq_id.to_string())
            .or_default()
            .insert(topic_id.to_string());

        debug!(topic = topic_id, prereq = prereq_id, "added prerequisite");
        Ok(())
    }

    // The edge closes a cycle iff prereq_id is already downstream of topic_id
    fn would_create_cycle(&self, topic_id: &str, prereq_id: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([topic_id]);

        while let Some(current) = queue.pop_front() {
            if current == prereq_id {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            queue.extend(self.dependent_ids(current).iter().map(String::as_str));
        }

        false
    }

    /// Direct prerequisite ids, empty for unknown topics.
    pub fn prerequisite_ids(&self, topic_id: &str) -> &BTreeSet<String> {
        self.prerequisites.get(topic_id).unwrap_or(&EMPTY)
    }

    /// Direct dependent ids, empty for unknown topics.
    pub fn dependent_ids(&self, topic_id: &str) -> &BTreeSet<String> {
        self.dependents.get(topic_id).unwrap_or(&EMPTY)
    }

    pub fn get_prerequisites(&self, topic_id: &str) -> Vec<&Topic> {
        self.resolve(self.prerequisite_ids(topic_id).iter())
    }

    pub fn get_dependents(&self, topic_id: &str) -> Vec<&Topic> {
        self.resolve(self.dependent_ids(topic_id).iter())
    }

    fn resolve<'a>(&'a self, ids: impl Iterator<Item = &'a String>) -> Vec<&'a Topic> {
        ids.filter_map(|id| self.topics.get(id)).collect()
    }

    /// Transitive closure over the prerequisite relation.
    pub fn all_prerequisite_ids(&self, topic_id: &str) -> BTreeSet<String> {
        let mut found: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<&String> = self.prerequisite_ids(topic_id).iter().collect();

        while let Some(prereq_id) = queue.pop_front() {
            if !found.insert(prereq_id.clone()) {
                continue;
            }
            queue.extend(self.prerequisite_ids(prereq_id).iter());
        }

        found
    }

    pub fn get_all_prerequisites(&self, topic_id: &str) -> Vec<&Topic> {
        let ids = self.all_prerequisite_ids(topic_id);
        ids.iter().filter_map(|id| self.topics.get(id)).collect()
    }

    /// Topics still to learn before (and including) `target_id`, in
    /// topological order. Ties are broken by topic id.
    pub fn get_learning_path(
        &self,
        target_id: &str,
        completed: &HashSet<String>,
    ) -> Result<Vec<&Topic>> {
        if !self.contains(target_id) {
            return Err(Error::UnknownTopic(target_id.to_string()));
        }

        let mut needed = self.all_prerequisite_ids(target_id);
        needed.insert(target_id.to_string());
        needed.retain(|id| !completed.contains(id));

        let path = self.topological_sort(&needed);
        debug!(target = target_id, steps = path.len(), "computed learning path");
        Ok(path)
    }

    // Kahn's algorithm restricted to `subset`
    fn topological_sort(&self, subset: &BTreeSet<String>) -> Vec<&Topic> {
        let mut in_degree: BTreeMap<&str, usize> = subset
            .iter()
            .map(|id| {
                let degree = self
                    .prerequisite_ids(id)
                    .iter()
                    .filter(|p| subset.contains(*p))
                    .count();
                (id.as_str(), degree)
            })
            .collect();

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut result = Vec::with_capacity(subset.len());

        while let Some(current) = queue.pop_front() {
            if let Some(topic) = self.topics.get(current) {
                result.push(topic);
            }

            for dependent_id in self.dependent_ids(current) {
                if let Some(degree) = in_degree.get_mut(dependent_id.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent_id);
                    }
                }
            }
        }

        result
    }

    /// Unlocked topics: not completed, every direct prerequisite completed.
    /// Sorted by difficulty, ties in catalog order.
    pub fn get_available_topics(&self, completed: &HashSet<String>) -> Vec<&Topic> {
        let mut available: Vec<&Topic> = self
            .topics()
            .filter(|topic| !completed.contains(&topic.id))
            .filter(|topic| {
                self.prerequisite_ids(&topic.id)
                    .iter()
                    .all(|p| completed.contains(p))
            })
            .collect();

        available.sort_by(|a, b| a.difficulty.total_cmp(&b.difficulty));
        available
    }

    pub fn get_topics_by_domain(&self, domain: &str) -> Vec<&Topic> {
        self.topics().filter(|t| t.domain == domain).collect()
    }

    pub fn search_topics(&self, query: &str) -> Vec<&Topic> {
        let query_lower = query.to_lowercase();
        self.topics().filter(|t| t.matches(&query_lower)).collect()
    }

    /// FIRe weights for the ancestors of `topic_id`.
    ///
    /// Direct prerequisites get 0.5, and each further layer half of the one
    /// before, for at most `max_depth` layers. An ancestor reachable at several
    /// depths keeps the weight of the shallowest one.
    pub fn get_fire_ancestors(&self, topic_id: &str, max_depth: usize) -> BTreeMap<String, f64> {
        let mut weights: BTreeMap<String, f64> = BTreeMap::new();
        let mut weight = FIRE_BASE_WEIGHT;
        let mut level: BTreeSet<&String> = self.prerequisite_ids(topic_id).iter().collect();

        for _ in 0..max_depth {
            if level.is_empty() {
                break;
            }

            for prereq_id in &level {
                weights.entry((*prereq_id).clone()).or_insert(weight);
            }

            level = level
                .iter()
                .flat_map(|id| self.prerequisite_ids(id).iter())
                .collect();
            weight *= 0.5;
        }

        weights
    }

    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            topics: self.topics().cloned().collect(),
            prerequisites: self
                .prerequisites
                .iter()
                .filter(|(_, prereqs)| !prereqs.is_empty())
                .map(|(id, prereqs)| (id.clone(), prereqs.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Rebuilds a graph by replaying every stored edge. Edges that reference
    /// unknown topics or would close a cycle are dropped.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let mut graph = Self::new();

        for topic in snapshot.topics {
            graph.add_topic(topic);
        }

        for (topic_id, prereqs) in &snapshot.prerequisites {
            for prereq_id in prereqs {
                if let Err(e) = graph.add_prerequisite(topic_id, prereq_id) {
                    warn!(topic = %topic_id, prereq = %prereq_id, error = %e, "skipping invalid edge");
                }
            }
        }

        graph
    }

    pub fn load(storage: &dyn Storage) -> Result<Option<Self>> {
        let Some(body) = storage.load(GRAPH_KEY)? else {
            return Ok(None);
        };

        let snapshot: GraphSnapshot =
            serde_json::from_str(&body).map_err(|e| Error::MalformedSnapshot {
                key: GRAPH_KEY.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Some(Self::from_snapshot(snapshot)))
    }

    /// Loads the stored graph. A missing snapshot is seeded from the catalog
    /// and written back; an unreadable one falls back to the catalog without
    /// overwriting it.
    pub fn load_or_default(storage: &dyn Storage) -> Self {
        match Self::load(storage) {
            Ok(Some(graph)) => graph,
            Ok(None) => {
                let graph = Self::create_default();
                if let Err(e) = graph.save(storage) {
                    warn!(error = %e, "failed to persist default knowledge graph");
                }
                graph
            }
            Err(e) => {
                warn!(error = %e, "knowledge graph unreadable, using default catalog");
                Self::create_default()
            }
        }
    }

    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        let body = serde_json::to_string_pretty(&self.to_snapshot())?;
        storage.save(GRAPH_KEY, &body)?;
        info!(topics = self.len(), edges = self.edge_count(), "saved knowledge graph");
        Ok(())
    }
}

// Topics persist as an id-keyed map while keeping catalog order
mod topic_map {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use crate::models::Topic;

    pub fn serialize<S: Serializer>(topics: &[Topic], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(topics.len()))?;
        for topic in topics {
            map.serialize_entry(&topic.id, topic)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Topic>, D::Error> {
        struct TopicMapVisitor;

        impl<'de> Visitor<'de> for TopicMapVisitor {
            type Value = Vec<Topic>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of topic id to topic")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut topics = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((_id, topic)) = access.next_entry::<String, Topic>()? {
                    topics.push(topic);
                }
                Ok(topics)
            }
        }

        deserializer.deserialize_map(TopicMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use proptest::prelude::*;

    fn topic(id: &str, difficulty: f64) -> Topic {
        Topic::new(id, id.to_uppercase(), "test").with_difficulty(difficulty)
    }

    fn graph_with(ids: &[&str]) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        for (i, id) in ids.iter().enumerate() {
            graph.add_topic(topic(id, 0.1 * (i + 1) as f64));
        }
        graph
    }

    fn ids(topics: &[&Topic]) -> Vec<String> {
        topics.iter().map(|t| t.id.clone()).collect()
    }

    fn completed(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    mod mutation_tests {
        use super::*;

        #[test]
        fn add_topic_overwrites_in_place() {
            let mut graph = graph_with(&["a", "b"]);
            graph.add_topic(topic("a", 0.9).with_description("replaced"));

            assert_eq!(graph.len(), 2);
            assert_eq!(graph.get_topic("a").unwrap().description, "replaced");
            let order: Vec<&str> = graph.topics().map(|t| t.id.as_str()).collect();
            assert_eq!(order, vec!["a", "b"]);
        }

        #[test]
        fn add_prerequisite_unknown_topic() {
            let mut graph = graph_with(&["a"]);
            assert!(matches!(
                graph.add_prerequisite("a", "missing"),
                Err(Error::UnknownTopic(id)) if id == "missing"
            ));
            assert!(matches!(
                graph.add_prerequisite("missing", "a"),
                Err(Error::UnknownTopic(id)) if id == "missing"
            ));
        }

        #[test]
        fn add_prerequisite_mirrors_dependents() {
            let mut graph = graph_with(&["a", "b"]);
            graph.add_prerequisite("b", "a").unwrap();

            assert!(graph.prerequisite_ids("b").contains("a"));
            assert!(graph.dependent_ids("a").contains("b"));
            assert_eq!(graph.edge_count(), 1);
        }

        #[test]
        fn transitive_cycle_is_rejected_without_mutation() {
            let mut graph = graph_with(&["a", "b", "c"]);
            graph.add_prerequisite("b", "a").unwrap();
            graph.add_prerequisite("c", "b").unwrap();

            let prereqs_before = graph.prerequisites.clone();
            let dependents_before = graph.dependents.clone();

            let result = graph.add_prerequisite("a", "c");
            assert!(matches!(result, Err(Error::CycleDetected { .. })));
            assert_eq!(graph.prerequisites, prereqs_before);
            assert_eq!(graph.dependents, dependents_before);
        }

        #[test]
        fn self_loop_is_a_cycle() {
            let mut graph = graph_with(&["a"]);
            assert!(matches!(
                graph.add_prerequisite("a", "a"),
                Err(Error::CycleDetected { .. })
            ));
        }

        #[test]
        fn reads_do_not_create_entries() {
            let graph = graph_with(&["a"]);
            assert!(graph.prerequisite_ids("a").is_empty());
            assert!(graph.dependent_ids("nope").is_empty());
            assert!(graph.prerequisites.is_empty());
            assert!(graph.dependents.is_empty());
        }
    }

    mod query_tests {
        use super::*;

        fn chain() -> KnowledgeGraph {
            // a <- b <- c, plus d <- c
            let mut graph = graph_with(&["a", "b", "c", "d"]);
            graph.add_prerequisite("b", "a").unwrap();
            graph.add_prerequisite("c", "b").unwrap();
            graph.add_prerequisite("c", "d").unwrap();
            graph
        }

        #[test]
        fn direct_neighbours() {
            let graph = chain();
            assert_eq!(ids(&graph.get_prerequisites("c")), vec!["b", "d"]);
            assert_eq!(ids(&graph.get_dependents("a")), vec!["b"]);
            assert!(graph.get_prerequisites("a").is_empty());
        }

        #[test]
        fn all_prerequisites_is_transitive() {
            let graph = chain();
            let all = graph.all_prerequisite_ids("c");
            assert_eq!(all, completed(&["a", "b", "d"]).into_iter().collect());
            assert!(!all.contains("c"));
        }

        #[test]
        fn scenario_available_and_path() {
            let mut graph = graph_with(&["A", "B", "C"]);
            graph.add_prerequisite("B", "A").unwrap();
            graph.add_prerequisite("C", "B").unwrap();

            assert_eq!(ids(&graph.get_available_topics(&HashSet::new())), vec!["A"]);
            assert_eq!(ids(&graph.get_available_topics(&completed(&["A"]))), vec!["B"]);
            assert_eq!(
                ids(&graph.get_learning_path("C", &HashSet::new()).unwrap()),
                vec!["A", "B", "C"]
            );
        }

        #[test]
        fn learning_path_excludes_completed() {
            let graph = chain();
            let path = graph.get_learning_path("c", &completed(&["a"])).unwrap();
            assert_eq!(ids(&path), vec!["b", "d", "c"]);
        }

        #[test]
        fn learning_path_unknown_target() {
            let graph = chain();
            assert!(matches!(
                graph.get_learning_path("zzz", &HashSet::new()),
                Err(Error::UnknownTopic(_))
            ));
        }

        #[test]
        fn learning_path_for_completed_target_is_empty() {
            let graph = chain();
            let path = graph
                .get_learning_path("b", &completed(&["a", "b"]))
                .unwrap();
            assert!(path.is_empty());
        }

        #[test]
        fn available_topics_sorted_by_difficulty_with_stable_ties() {
            let mut graph = KnowledgeGraph::new();
            graph.add_topic(topic("hard", 0.9));
            graph.add_topic(topic("tie-first", 0.3));
            graph.add_topic(topic("easy", 0.1));
            graph.add_topic(topic("tie-second", 0.3));

            assert_eq!(
                ids(&graph.get_available_topics(&HashSet::new())),
                vec!["easy", "tie-first", "tie-second", "hard"]
            );
        }

        #[test]
        fn search_matches_name_description_and_tags() {
            let mut graph = KnowledgeGraph::new();
            graph.add_topic(Topic::new("one", "Limits", "math"));
            graph.add_topic(Topic::new("two", "Other", "math").with_description("about LIMITS"));
            graph.add_topic(Topic::new("three", "Third", "math").with_tags(&["limit-laws"]));
            graph.add_topic(Topic::new("four", "Vectors", "math"));

            assert_eq!(ids(&graph.search_topics("limit")), vec!["one", "two", "three"]);
            assert!(graph.search_topics("zzz").is_empty());
        }

        #[test]
        fn topics_by_domain() {
            let graph = KnowledgeGraph::create_default();
            let cs = graph.get_topics_by_domain("cs");
            assert_eq!(cs.len(), 5);
            assert_eq!(cs[0].id, "programming-basics");
        }
    }

    mod fire_tests {
        use super::*;

        #[test]
        fn weights_halve_per_layer_and_stop_at_max_depth() {
            let mut graph = graph_with(&["t", "p1", "p2", "p3", "p4", "p5"]);
            graph.add_prerequisite("t", "p1").unwrap();
            graph.add_prerequisite("p1", "p2").unwrap();
            graph.add_prerequisite("p2", "p3").unwrap();
            graph.add_prerequisite("p3", "p4").unwrap();
            graph.add_prerequisite("p4", "p5").unwrap();

            let weights = graph.get_fire_ancestors("t", FIRE_MAX_DEPTH);
            assert_eq!(weights.len(), 4);
            assert_eq!(weights["p1"], 0.5);
            assert_eq!(weights["p2"], 0.25);
            assert_eq!(weights["p3"], 0.125);
            assert_eq!(weights["p4"], 0.0625);
            assert!(!weights.contains_key("p5"));
        }

        #[test]
        fn shallowest_depth_wins() {
            // root is both a direct prerequisite of t and a grandparent via mid
            let mut graph = graph_with(&["t", "mid", "root"]);
            graph.add_prerequisite("t", "mid").unwrap();
            graph.add_prerequisite("t", "root").unwrap();
            graph.add_prerequisite("mid", "root").unwrap();

            let weights = graph.get_fire_ancestors("t", FIRE_MAX_DEPTH);
            assert_eq!(weights["root"], 0.5);
            assert_eq!(weights["mid"], 0.5);
        }

        #[test]
        fn no_prerequisites_no_weights() {
            let graph = graph_with(&["solo"]);
            assert!(graph.get_fire_ancestors("solo", FIRE_MAX_DEPTH).is_empty());
        }

        #[test]
        fn default_catalog_integration_chain() {
            let graph = KnowledgeGraph::create_default();
            let weights = graph.get_fire_ancestors("integration-techniques", FIRE_MAX_DEPTH);
            assert_eq!(weights["integrals"], 0.5);
            assert_eq!(weights["derivatives"], 0.25);
            assert_eq!(weights["limits"], 0.125);
            assert_eq!(weights["functions"], 0.0625);
            assert_eq!(weights["algebra-basics"], 0.0625);
            assert!(!weights.contains_key("arithmetic"));
        }
    }

    mod snapshot_tests {
        use super::*;

        #[test]
        fn default_catalog_is_complete() {
            let graph = KnowledgeGraph::create_default();
            assert_eq!(graph.len(), 22);
            assert_eq!(graph.edge_count(), 26);
        }

        #[test]
        fn round_trip_preserves_queries() {
            let graph = KnowledgeGraph::create_default();
            let json = serde_json::to_string(&graph.to_snapshot()).unwrap();
            let snapshot: GraphSnapshot = serde_json::from_str(&json).unwrap();
            let restored = KnowledgeGraph::from_snapshot(snapshot);

            assert_eq!(restored.len(), graph.len());
            assert_eq!(restored.edge_count(), graph.edge_count());
            let order: Vec<&str> = restored.topics().map(|t| t.id.as_str()).collect();
            let original: Vec<&str> = graph.topics().map(|t| t.id.as_str()).collect();
            assert_eq!(order, original);
            assert_eq!(
                ids(&restored.get_learning_path("eigenvalues", &HashSet::new()).unwrap()),
                ids(&graph.get_learning_path("eigenvalues", &HashSet::new()).unwrap())
            );
            assert_eq!(
                restored.get_fire_ancestors("graphs", FIRE_MAX_DEPTH),
                graph.get_fire_ancestors("graphs", FIRE_MAX_DEPTH)
            );
        }

        #[test]
        fn dependents_are_not_persisted() {
            let graph = KnowledgeGraph::create_default();
            let value = serde_json::to_value(graph.to_snapshot()).unwrap();
            assert!(value.get("topics").unwrap().is_object());
            assert!(value.get("prerequisites").unwrap().is_object());
            assert!(value.get("dependents").is_none());
        }

        #[test]
        fn load_drops_cyclic_and_dangling_edges() {
            let json = r#"{
                "topics": {
                    "a": {"id": "a", "name": "A", "domain": "x"},
                    "b": {"id": "b", "name": "B", "domain": "x"}
                },
                "prerequisites": {
                    "a": ["b"],
                    "b": ["a", "ghost"]
                }
            }"#;
            let snapshot: GraphSnapshot = serde_json::from_str(json).unwrap();
            let graph = KnowledgeGraph::from_snapshot(snapshot);

            // "a" <- "b" replays first; "b" <- "a" would close the cycle.
            assert_eq!(graph.edge_count(), 1);
            assert!(graph.prerequisite_ids("a").contains("b"));
            assert!(graph.prerequisite_ids("b").is_empty());
        }

        #[test]
        fn load_or_default_seeds_missing_snapshot() {
            let storage = MemoryStorage::new();
            let graph = KnowledgeGraph::load_or_default(&storage);
            assert_eq!(graph.len(), 22);
            assert!(storage.load(GRAPH_KEY).unwrap().is_some());
        }

        #[test]
        fn load_or_default_keeps_unreadable_snapshot() {
            let storage = MemoryStorage::new();
            storage.save(GRAPH_KEY, "{not json").unwrap();

            assert!(matches!(
                KnowledgeGraph::load(&storage),
                Err(Error::MalformedSnapshot { .. })
            ));
            let graph = KnowledgeGraph::load_or_default(&storage);
            assert_eq!(graph.len(), 22);
            assert_eq!(storage.load(GRAPH_KEY).unwrap().as_deref(), Some("{not json"));
        }

        #[test]
        fn save_then_load() {
            let storage = MemoryStorage::new();
            let mut graph = graph_with(&["a", "b"]);
            graph.add_prerequisite("b", "a").unwrap();
            graph.save(&storage).unwrap();

            let loaded = KnowledgeGraph::load(&storage).unwrap().unwrap();
            assert_eq!(ids(&loaded.get_prerequisites("b")), vec!["a"]);
            assert_eq!(ids(&loaded.get_dependents("a")), vec!["b"]);
        }
    }

    // Edges only point from a higher index to a lower one, so every insert is valid.
    fn random_dag() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
        (2usize..12).prop_flat_map(|n| {
            let edges = prop::collection::vec((0..n, 0..n), 0..30).prop_map(|pairs| {
                pairs
                    .into_iter()
                    .filter(|(a, b)| a > b)
                    .collect::<Vec<_>>()
            });
            (Just(n), edges)
        })
    }

    fn build(n: usize, edges: &[(usize, usize)]) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        for i in 0..n {
            graph.add_topic(topic(&format!("t{:02}", i), 0.5));
        }
        for (a, b) in edges {
            graph
                .add_prerequisite(&format!("t{:02}", a), &format!("t{:02}", b))
                .unwrap();
        }
        graph
    }

    proptest! {
        #[test]
        fn closure_is_fixed_point((n, edges) in random_dag()) {
            let graph = build(n, &edges);
            for t in graph.topics() {
                let closure = graph.all_prerequisite_ids(&t.id);
                prop_assert!(!closure.contains(&t.id));

                let mut expected: BTreeSet<String> = graph.prerequisite_ids(&t.id).clone();
                loop {
                    let next: BTreeSet<String> = expected
                        .iter()
                        .flat_map(|id| graph.prerequisite_ids(id).iter().cloned())
                        .chain(expected.iter().cloned())
                        .collect();
                    if next == expected {
                        break;
                    }
                    expected = next;
                }
                prop_assert_eq!(closure, expected);
            }
        }

        #[test]
        fn learning_path_is_topological(
            (n, edges) in random_dag(),
            done in prop::collection::vec(any::<bool>(), 12),
        ) {
            let graph = build(n, &edges);
            let completed: HashSet<String> = (0..n)
                .filter(|i| done[*i])
                .map(|i| format!("t{:02}", i))
                .collect();
            let target = format!("t{:02}", n - 1);

            let path = graph.get_learning_path(&target, &completed).unwrap();
            let position: HashMap<&str, usize> = path
                .iter()
                .enumerate()
                .map(|(i, t)| (t.id.as_str(), i))
                .collect();

            for t in &path {
                prop_assert!(!completed.contains(&t.id));
                for p in graph.prerequisite_ids(&t.id) {
                    if let Some(pos) = position.get(p.as_str()) {
                        prop_assert!(*pos < position[t.id.as_str()]);
                    }
                }
            }
        }

        #[test]
        fn cycle_closing_edges_are_rejected((n, edges) in random_dag()) {
            let mut graph = build(n, &edges);
            for (a, b) in &edges {
                let result = graph.add_prerequisite(&format!("t{:02}", b), &format!("t{:02}", a));
                prop_assert!(
                    matches!(result, Err(Error::CycleDetected { .. })),
                    "expected a cycle error"
                );
            }
        }
    }
}
