mod catalog;
mod config;
mod decay;
mod error;
mod graph;
mod logging;
mod mastery;
mod models;
mod practice;
mod scheduler;
mod session;
mod storage;
mod tui;

use std::path::PathBuf;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use config::{Backend, Config, Overrides};
use decay::StabilityRule;
use error::Error;
use graph::{KnowledgeGraph, FIRE_MAX_DEPTH};
use mastery::{MasteryRecord, MasteryTracker};
use models::{Difficulty, JsonOutput, MasteryLevel, ProblemType, Topic};
use practice::{ProblemId, COMPLETED_LEVEL};
use scheduler::ReviewScheduler;
use session::{SessionManager, StudySession, DEFAULT_SESSION_MINUTES};
use storage::Storage;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "learnpath")]
#[command(about = "Prerequisite-aware learning paths with mastery tracking and spaced review")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding the learner state
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Storage backend
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Retention the scheduler aims to keep topics above
    #[arg(long, global = true, value_parser = parse_fraction)]
    target_retention: Option<f64>,

    /// Retention below which a topic counts as due
    #[arg(long, global = true, value_parser = parse_fraction)]
    review_threshold: Option<f64>,

    /// Stability update rule: incremental/ebbinghaus
    #[arg(long, global = true, value_parser = parse_stability_rule)]
    stability_rule: Option<StabilityRule>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse and edit the knowledge graph
    #[command(subcommand)]
    Knowledge(KnowledgeCommands),

    /// Inspect and update mastery
    #[command(subcommand)]
    Mastery(MasteryCommands),

    /// Spaced-repetition reviews
    #[command(subcommand)]
    Review(ReviewCommands),

    /// Practice problems
    #[command(subcommand)]
    Practice(PracticeCommands),

    /// Timed study sessions
    #[command(subcommand)]
    Session(SessionCommands),

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum KnowledgeCommands {
    /// List topics
    Topics {
        /// Only topics in this domain
        #[arg(long, short)]
        domain: Option<String>,
    },

    /// Search topics by name, description, tags and concepts
    Search {
        /// Search text
        query: String,
    },

    /// Show a topic's prerequisites
    Prerequisites {
        /// Topic ID
        topic: String,

        /// Include indirect prerequisites
        #[arg(long, short)]
        all: bool,
    },

    /// Ordered list of topics to learn before reaching a target
    Path {
        /// Target topic ID
        target: String,
    },

    /// Add or replace a topic from a JSON object
    AddTopic {
        /// Topic as JSON, e.g. '{"id":"sets","name":"Sets","domain":"math"}'
        #[arg(long)]
        topic_json: String,
    },

    /// Add a prerequisite edge
    AddPrereq {
        /// Topic that depends on the prerequisite
        topic: String,

        /// Prerequisite topic ID
        prerequisite: String,
    },
}

#[derive(Subcommand)]
enum MasteryCommands {
    /// Show mastery for one topic or all practiced topics
    Status {
        /// Topic ID
        #[arg(long, short)]
        topic: Option<String>,
    },

    /// Set a level directly or record a practice score
    #[command(group(ArgGroup::new("change").required(true).args(["level", "score"])))]
    Update {
        /// Topic ID
        #[arg(long, short)]
        topic: String,

        /// Level name or number (unknown..fluent, 0..5)
        #[arg(long, short)]
        level: Option<String>,

        /// Practice score between 0 and 1
        #[arg(long, short, value_parser = parse_score)]
        score: Option<f64>,
    },

    /// Recent practice events for a topic
    History {
        /// Topic ID
        #[arg(long, short)]
        topic: String,

        /// Number of events to show
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },

    /// Retention and forgetting-curve details
    Decay {
        /// Topic ID
        #[arg(long, short)]
        topic: Option<String>,
    },

    /// Counts by level and overall retention
    Summary,
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// Topics whose retention has dropped below the review threshold
    Due {
        /// Maximum number of topics
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,
    },

    /// When a topic should next be reviewed
    Schedule {
        /// Topic ID
        #[arg(long, short)]
        topic: String,
    },

    /// Record a review result
    Complete {
        /// Topic ID
        #[arg(long, short)]
        topic: String,

        /// Score between 0 and 1
        #[arg(long, short, value_parser = parse_score)]
        score: f64,
    },

    /// Review load overview
    Stats,

    /// Most urgent reviews that fit in the available time
    Optimize {
        /// Minutes available
        #[arg(long, short, default_value_t = DEFAULT_SESSION_MINUTES)]
        minutes: u32,

        /// Expected minutes per review
        #[arg(long, default_value_t = 3.0)]
        per_review: f64,
    },
}

#[derive(Subcommand)]
enum PracticeCommands {
    /// Recommend what to practice next
    Next,

    /// Generate a practice problem for a topic
    Generate {
        /// Topic ID
        #[arg(long, short)]
        topic: String,

        /// Problem type: concept/calculation/proof/application
        #[arg(long = "type", short = 'p', default_value = "concept", value_parser = parse_problem_type)]
        problem_type: ProblemType,

        /// Difficulty: easy/medium/hard/adaptive
        #[arg(long, short, default_value = "medium", value_parser = parse_difficulty)]
        difficulty: Difficulty,
    },

    /// Record a solved problem
    Complete {
        /// Problem ID, e.g. prob-limits-3
        #[arg(long)]
        problem: String,

        /// Score between 0 and 1
        #[arg(long, short, value_parser = parse_score)]
        score: f64,

        /// Problem type, recorded in the practice history
        #[arg(long = "type", short = 'p', value_parser = parse_problem_type)]
        problem_type: Option<ProblemType>,
    },

    /// Skip a problem in the current session
    Skip {
        /// Problem ID
        #[arg(long)]
        problem: String,
    },

    /// Get a hint for a problem
    Hint {
        /// Problem ID
        #[arg(long)]
        problem: String,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Start a study session, abandoning any open one
    Start {
        /// Domain to study
        #[arg(long, short, default_value = "math")]
        domain: String,

        /// Planned length in minutes
        #[arg(long, short, default_value_t = DEFAULT_SESSION_MINUTES)]
        minutes: u32,
    },

    /// End the current session
    End,

    /// Show the current session
    Status,

    /// Pause the current session
    Pause,

    /// Resume a paused session
    Resume,

    /// Past sessions, newest first
    History {
        /// Number of sessions to show
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,
    },
}

fn parse_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("{} must be strictly between 0 and 1", value))
    }
}

fn parse_score(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("score {} must be between 0 and 1", value))
    }
}

fn parse_stability_rule(s: &str) -> Result<StabilityRule, String> {
    StabilityRule::from_str(s).ok_or_else(|| {
        format!(
            "Invalid stability rule '{}'. Use: incremental or ebbinghaus",
            s
        )
    })
}

fn parse_problem_type(s: &str) -> Result<ProblemType, String> {
    ProblemType::from_str(s).ok_or_else(|| {
        format!(
            "Invalid problem type '{}'. Use: concept, calculation, proof, or application",
            s
        )
    })
}

fn parse_difficulty(s: &str) -> Result<Difficulty, String> {
    Difficulty::from_str(s).ok_or_else(|| {
        format!(
            "Invalid difficulty '{}'. Use: easy, medium, hard, or adaptive",
            s
        )
    })
}

/// Resolved configuration plus the storage every store shares for one
/// invocation.
struct Context {
    config: Config,
    storage: Rc<dyn Storage>,
    now: DateTime<Utc>,
}

impl Context {
    fn graph(&self) -> KnowledgeGraph {
        KnowledgeGraph::load_or_default(self.storage.as_ref())
    }

    fn mastery(&self) -> MasteryTracker {
        MasteryTracker::load_or_default(Rc::clone(&self.storage))
            .with_stability_rule(self.config.stability_rule)
    }

    fn sessions(&self) -> SessionManager {
        SessionManager::load_or_default(Rc::clone(&self.storage))
    }
}

fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli) {
        if json {
            let envelope = JsonOutput::<()>::err(e.to_string());
            println!("{}", serde_json::to_string(&envelope).unwrap_or_default());
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult {
    let config = Config::resolve(Overrides {
        state_dir: cli.state_dir,
        backend: cli.backend,
        target_retention: cli.target_retention,
        review_threshold: cli.review_threshold,
        stability_rule: cli.stability_rule,
    })?;
    logging::init_tracing(&config.log_filter);

    let storage = config.open_storage()?;
    debug!(state_dir = %config.state_dir.display(), backend = config.backend.as_str(), "opened storage");

    let ctx = Context {
        config,
        storage,
        now: Utc::now(),
    };

    match cli.command {
        Commands::Knowledge(cmd) => run_knowledge(cmd, &ctx, cli.json),
        Commands::Mastery(cmd) => run_mastery(cmd, &ctx, cli.json),
        Commands::Review(cmd) => run_review(cmd, &ctx, cli.json),
        Commands::Practice(cmd) => run_practice(cmd, &ctx, cli.json),
        Commands::Session(cmd) => run_session(cmd, &ctx, cli.json),
        Commands::Tui => tui::run(Rc::clone(&ctx.storage), ctx.config.clone()),
    }
}

fn print_json<T: Serialize>(data: T) -> CliResult {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn require_topic<'g>(graph: &'g KnowledgeGraph, topic_id: &str) -> Result<&'g Topic, Error> {
    graph
        .get_topic(topic_id)
        .ok_or_else(|| Error::UnknownTopic(topic_id.to_string()))
}

fn print_topic_table(topics: &[&Topic]) {
    if topics.is_empty() {
        println!("No topics found.");
        return;
    }

    println!("{:<28} {:<34} {:<8} {:>5}", "ID", "Name", "Domain", "Diff");
    println!("{}", "-".repeat(78));
    for topic in topics {
        println!(
            "{:<28} {:<34} {:<8} {:>5.2}",
            truncate(&topic.id, 28),
            truncate(&topic.name, 34),
            topic.domain,
            topic.difficulty
        );
    }
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn run_knowledge(cmd: KnowledgeCommands, ctx: &Context, json: bool) -> CliResult {
    let mut graph = ctx.graph();

    match cmd {
        KnowledgeCommands::Topics { domain } => {
            let topics: Vec<&Topic> = match &domain {
                Some(domain) => graph.get_topics_by_domain(domain),
                None => graph.topics().collect(),
            };
            if json {
                print_json(&topics)?;
            } else {
                print_topic_table(&topics);
            }
        }

        KnowledgeCommands::Search { query } => {
            let topics = graph.search_topics(&query);
            if json {
                print_json(&topics)?;
            } else {
                print_topic_table(&topics);
            }
        }

        KnowledgeCommands::Prerequisites { topic, all } => {
            require_topic(&graph, &topic)?;
            let prerequisites = if all {
                graph.get_all_prerequisites(&topic)
            } else {
                graph.get_prerequisites(&topic)
            };

            if json {
                print_json(json!({
                    "topic_id": topic,
                    "prerequisites": prerequisites,
                }))?;
            } else if prerequisites.is_empty() {
                println!("'{}' has no prerequisites.", topic);
            } else {
                println!("Prerequisites for '{}':", topic);
                for prereq in &prerequisites {
                    println!("  - {} ({})", prereq.name, prereq.id);
                }
            }
        }

        KnowledgeCommands::Path { target } => {
            let completed = ctx.mastery().topics_at_least(COMPLETED_LEVEL);
            let path = graph.get_learning_path(&target, &completed)?;
            let total_hours: f64 = path.iter().map(|t| t.estimated_hours).sum();

            if json {
                print_json(json!({
                    "target": target,
                    "path": path,
                    "total_hours": total_hours,
                }))?;
            } else if path.is_empty() {
                println!("'{}' is already completed.", target);
            } else {
                println!("=== Learning Path to '{}' ===", target);
                println!();
                for (i, topic) in path.iter().enumerate() {
                    println!("{:>3}. {:<34} {:>5.1}h", i + 1, truncate(&topic.name, 34), topic.estimated_hours);
                }
                println!();
                println!("{} topics, about {:.1} hours", path.len(), total_hours);
            }
        }

        KnowledgeCommands::AddTopic { topic_json } => {
            let topic: Topic = serde_json::from_str(&topic_json)?;
            let topic_id = topic.id.clone();
            graph.add_topic(topic);
            graph.save(ctx.storage.as_ref())?;

            if json {
                print_json(json!({ "topic_id": topic_id }))?;
            } else {
                println!("Saved topic '{}'.", topic_id);
            }
        }

        KnowledgeCommands::AddPrereq {
            topic,
            prerequisite,
        } => {
            graph.add_prerequisite(&topic, &prerequisite)?;
            graph.save(ctx.storage.as_ref())?;

            if json {
                print_json(json!({
                    "topic_id": topic,
                    "prerequisite": prerequisite,
                }))?;
            } else {
                println!("'{}' now requires '{}'.", topic, prerequisite);
            }
        }
    }

    Ok(())
}

fn run_mastery(cmd: MasteryCommands, ctx: &Context, json: bool) -> CliResult {
    let graph = ctx.graph();
    let mut tracker = ctx.mastery();
    let now = ctx.now;
    let threshold = ctx.config.review_threshold;

    match cmd {
        MasteryCommands::Status { topic: Some(topic_id) } => {
            require_topic(&graph, &topic_id)?;
            let record = tracker
                .record(&topic_id)
                .cloned()
                .unwrap_or_else(|| MasteryRecord::new(topic_id.as_str()));
            let retention = record.retention(now);
            let needs_review = record.needs_review(threshold, now);

            if json {
                print_json(json!({
                    "topic_id": record.topic_id,
                    "level": record.level.as_str(),
                    "level_value": record.level.as_u8(),
                    "retention": retention,
                    "stability": record.stability,
                    "practice_count": record.practice_count,
                    "average_score": record.average_score,
                    "last_practiced": record.last_practiced,
                    "last_review": record.last_review,
                    "needs_review": needs_review,
                }))?;
            } else {
                println!("=== {} ===", topic_id);
                println!(
                    "Level: {} ({}) - {}",
                    record.level.label(),
                    record.level.as_u8(),
                    record.level.description()
                );
                println!("Retention: {:.0}%", retention * 100.0);
                println!("Stability: {:.2} days", record.stability);
                println!(
                    "Practiced: {} times (avg score {:.2})",
                    record.practice_count, record.average_score
                );
                println!("Last review: {}", format_date(record.last_review));
                if needs_review {
                    println!("Due for review.");
                }
            }
        }

        MasteryCommands::Status { topic: None } => {
            let records: Vec<&MasteryRecord> = tracker.records().collect();
            if json {
                let rows: Vec<_> = records
                    .iter()
                    .map(|r| {
                        json!({
                            "topic_id": r.topic_id,
                            "level": r.level.as_str(),
                            "retention": r.retention(now),
                            "practice_count": r.practice_count,
                        })
                    })
                    .collect();
                print_json(rows)?;
            } else if records.is_empty() {
                println!("No practice recorded yet.");
            } else {
                println!("{:<28} {:<12} {:>9} {:>9}", "Topic", "Level", "Retention", "Practice");
                println!("{}", "-".repeat(61));
                for record in records {
                    println!(
                        "{:<28} {:<12} {:>8.0}% {:>9}",
                        truncate(&record.topic_id, 28),
                        record.level.label(),
                        record.retention(now) * 100.0,
                        record.practice_count
                    );
                }
            }
        }

        MasteryCommands::Update {
            topic,
            level,
            score,
        } => {
            require_topic(&graph, &topic)?;
            let new_level = match (level, score) {
                (Some(name), _) => {
                    let level = MasteryLevel::from_str(&name).ok_or_else(|| {
                        format!(
                            "Invalid level '{}'. Use: unknown, introduced, developing, proficient, mastered, or fluent",
                            name
                        )
                    })?;
                    tracker.set_level(&topic, level)?;
                    level
                }
                (None, Some(score)) => tracker.record_practice(&topic, score, "manual", 0, now)?,
                (None, None) => return Err("Provide --level or --score".into()),
            };

            if json {
                print_json(json!({
                    "topic_id": topic,
                    "level": new_level.as_str(),
                    "level_value": new_level.as_u8(),
                }))?;
            } else {
                println!("Mastery for '{}' is now {}.", topic, new_level.label());
            }
        }

        MasteryCommands::History { topic, limit } => {
            require_topic(&graph, &topic)?;
            let events: Vec<_> = tracker
                .record(&topic)
                .map(|r| r.history.iter().rev().take(limit).cloned().collect())
                .unwrap_or_default();

            if json {
                print_json(json!({ "topic_id": topic, "history": events }))?;
            } else if events.is_empty() {
                println!("No practice history for '{}'.", topic);
            } else {
                println!("{:<17} {:>6} {:<24} {:<12}", "When", "Score", "Level", "Type");
                println!("{}", "-".repeat(62));
                for event in &events {
                    println!(
                        "{:<17} {:>6.2} {:<24} {:<12}",
                        event.timestamp.format("%Y-%m-%d %H:%M"),
                        event.score,
                        format!("{} -> {}", event.level_before.label(), event.level_after.label()),
                        event.problem_type
                    );
                }
            }
        }

        MasteryCommands::Decay { topic: Some(topic_id) } => {
            require_topic(&graph, &topic_id)?;
            let record = tracker
                .record(&topic_id)
                .ok_or_else(|| format!("'{}' has not been practiced yet", topic_id))?;
            let retention = record.retention(now);
            let days_until_due =
                decay::days_until_retention_drops_to(retention, threshold, record.stability);
            let optimal_review_date = record.optimal_review_date(ctx.config.target_retention)?;

            if json {
                print_json(json!({
                    "topic_id": topic_id,
                    "retention": retention,
                    "stability": record.stability,
                    "days_since_review": record.days_since_review(now),
                    "days_until_review": days_until_due,
                    "optimal_review_date": optimal_review_date,
                }))?;
            } else {
                println!("=== Decay for '{}' ===", topic_id);
                println!("Retention: {:.0}%", retention * 100.0);
                println!("Stability: {:.2} days", record.stability);
                if let Some(days) = record.days_since_review(now) {
                    println!("Last review: {:.1} days ago", days);
                }
                println!(
                    "Drops below {:.0}% in {:.1} days",
                    threshold * 100.0,
                    days_until_due
                );
                println!("Optimal review date: {}", format_date(optimal_review_date));
            }
        }

        MasteryCommands::Decay { topic: None } => {
            let due = tracker.topics_due_for_review(threshold, now);
            if json {
                let rows: Vec<_> = due
                    .iter()
                    .map(|r| {
                        json!({
                            "topic_id": r.topic_id,
                            "retention": r.retention(now),
                            "stability": r.stability,
                            "days_since_review": r.days_since_review(now),
                        })
                    })
                    .collect();
                print_json(rows)?;
            } else if due.is_empty() {
                println!("Every practiced topic is above {:.0}% retention.", threshold * 100.0);
            } else {
                println!("{:<28} {:>9} {:>9} {:>10}", "Topic", "Retention", "Stability", "Days since");
                println!("{}", "-".repeat(59));
                for record in due {
                    println!(
                        "{:<28} {:>8.0}% {:>9.2} {:>10.1}",
                        truncate(&record.topic_id, 28),
                        record.retention(now) * 100.0,
                        record.stability,
                        record.days_since_review(now).unwrap_or(0.0)
                    );
                }
            }
        }

        MasteryCommands::Summary => {
            let summary = tracker.summary(now);
            if json {
                print_json(&summary)?;
            } else {
                println!("=== Mastery Summary ===");
                println!("Topics practiced: {}", summary.total_topics);
                for level in MasteryLevel::ALL {
                    if let Some(count) = summary.by_level.get(level.as_str()) {
                        println!("  {:<12} {}", level.label(), count);
                    }
                }
                println!("Average retention: {:.0}%", summary.average_retention * 100.0);
                println!("Needing review: {}", summary.topics_needing_review);
            }
        }
    }

    Ok(())
}

fn run_review(cmd: ReviewCommands, ctx: &Context, json: bool) -> CliResult {
    let mut tracker = ctx.mastery();
    let now = ctx.now;
    let threshold = ctx.config.review_threshold;

    match cmd {
        ReviewCommands::Due { limit } => {
            let scheduler = ReviewScheduler::new(&mut tracker, ctx.config.target_retention);
            let due = scheduler.get_due_reviews(limit, threshold, now)?;
            if json {
                print_json(&due)?;
            } else if due.is_empty() {
                println!("Nothing due for review.");
            } else {
                println!(
                    "{:<28} {:<12} {:>9} {:>8} {:>10}",
                    "Topic", "Level", "Retention", "Priority", "Days since"
                );
                println!("{}", "-".repeat(71));
                for item in &due {
                    println!(
                        "{:<28} {:<12} {:>8.0}% {:>8.2} {:>10.1}",
                        truncate(&item.topic_id, 28),
                        item.mastery_level,
                        item.retention * 100.0,
                        item.priority,
                        item.days_since_review
                    );
                }
            }
        }

        ReviewCommands::Schedule { topic } => {
            require_topic(&ctx.graph(), &topic)?;
            let scheduler = ReviewScheduler::new(&mut tracker, ctx.config.target_retention);
            let record = scheduler
                .mastery()
                .record(&topic)
                .cloned()
                .unwrap_or_else(|| MasteryRecord::new(topic.as_str()));
            let next_review = match record.last_review {
                Some(last) => Some(scheduler.schedule().next_review_date(last, record.stability)?),
                None => None,
            };
            let review_now =
                scheduler
                    .schedule()
                    .should_review_now(record.last_review, record.stability, threshold, now);

            if json {
                print_json(json!({
                    "topic_id": topic,
                    "retention": record.retention(now),
                    "stability": record.stability,
                    "last_review": record.last_review,
                    "next_review_date": next_review,
                    "review_now": review_now,
                }))?;
            } else {
                println!("=== Schedule for '{}' ===", topic);
                println!("Retention: {:.0}%", record.retention(now) * 100.0);
                println!("Last review: {}", format_date(record.last_review));
                println!("Next review: {}", format_date(next_review));
                if review_now {
                    println!("Review now.");
                }
            }
        }

        ReviewCommands::Complete { topic, score } => {
            let graph = ctx.graph();
            require_topic(&graph, &topic)?;
            let weights = graph.get_fire_ancestors(&topic, FIRE_MAX_DEPTH);

            let mut scheduler = ReviewScheduler::new(&mut tracker, ctx.config.target_retention);
            let result = scheduler.complete_review(&topic, score, Some(&weights), now)?;

            if json {
                print_json(&result)?;
            } else {
                println!("Review recorded for '{}'.", topic);
                println!("New mastery level: {}", result.new_level);
                println!(
                    "Retention at review: {:.0}%, stability now {:.2} days",
                    result.retention_at_review * 100.0,
                    result.new_stability
                );
                println!(
                    "Next review: {} (in {:.1} days)",
                    result.next_review_date.format("%Y-%m-%d"),
                    result.days_until_review
                );
                if !result.fire_credited.is_empty() {
                    println!("Also refreshed: {}", result.fire_credited.join(", "));
                }
            }
        }

        ReviewCommands::Stats => {
            let scheduler = ReviewScheduler::new(&mut tracker, ctx.config.target_retention);
            let stats = scheduler.get_review_stats(now);
            if json {
                print_json(&stats)?;
            } else {
                println!("=== Review Statistics ===");
                println!("Topics learned: {}", stats.total_topics);
                println!("Due now: {}", stats.due_now);
                println!("Due today: {}", stats.due_today);
                println!("Due this week: {}", stats.due_this_week);
                println!("Reviews completed: {}", stats.total_reviews_completed);
                println!("Average retention: {:.0}%", stats.average_retention * 100.0);
            }
        }

        ReviewCommands::Optimize {
            minutes,
            per_review,
        } => {
            let scheduler = ReviewScheduler::new(&mut tracker, ctx.config.target_retention);
            let plan = scheduler.optimize_schedule(minutes, per_review, now)?;
            if json {
                print_json(json!({
                    "available_minutes": minutes,
                    "reviews": plan,
                }))?;
            } else if plan.is_empty() {
                println!("Nothing worth reviewing in {} minutes.", minutes);
            } else {
                println!("=== {} reviews for {} minutes ===", plan.len(), minutes);
                for (i, item) in plan.iter().enumerate() {
                    println!(
                        "{:>3}. {:<28} {:>4.0}%",
                        i + 1,
                        truncate(&item.topic_id, 28),
                        item.retention * 100.0
                    );
                }
            }
        }
    }

    Ok(())
}

// Open task for the problem's topic in the active session, if any
fn open_task_id(sessions: &SessionManager, topic_id: &str) -> Option<String> {
    sessions
        .active()
        .and_then(|s| s.open_task_for(topic_id))
        .map(|t| t.task_id.clone())
}

fn run_practice(cmd: PracticeCommands, ctx: &Context, json: bool) -> CliResult {
    let graph = ctx.graph();
    let mut tracker = ctx.mastery();
    let mut sessions = ctx.sessions();
    let now = ctx.now;

    match cmd {
        PracticeCommands::Next => {
            let scheduler = ReviewScheduler::new(&mut tracker, ctx.config.target_retention);
            let recommendation = practice::recommend_next(&graph, &scheduler, now)?;
            if json {
                print_json(&recommendation)?;
            } else {
                match &recommendation.topic {
                    Some(topic) => {
                        println!("=== Next: {} ({}) ===", topic.name, topic.id);
                        println!("{}", recommendation.reason);
                        if let Some(difficulty) = recommendation.suggested_difficulty {
                            println!("Suggested difficulty: {}", difficulty.as_str());
                        }
                        println!();
                        println!("Generate a problem with:");
                        println!("  learnpath practice generate --topic {}", topic.id);
                    }
                    None => println!("{}", recommendation.reason),
                }
            }
        }

        PracticeCommands::Generate {
            topic,
            problem_type,
            difficulty,
        } => {
            let problem =
                practice::generate_problem(&graph, &tracker, &topic, problem_type, difficulty)?;
            let task = if sessions.active().is_some() {
                let task =
                    sessions.task_for_topic(&topic, problem_type.as_str(), difficulty.as_str())?;
                Some(sessions.start_task(&task.task_id, now)?)
            } else {
                None
            };

            if json {
                print_json(json!({ "problem": problem, "session_task": task }))?;
            } else {
                println!("=== Problem {} ===", problem.problem_id);
                println!("Topic: {} ({})", problem.topic.name, problem.topic.id);
                println!(
                    "Type: {}  Difficulty: {}  Your level: {}",
                    problem.problem_type.as_str(),
                    problem.difficulty.as_str(),
                    problem.mastery_level
                );
                if !problem.concepts.is_empty() {
                    println!("Concepts: {}", problem.concepts.join(", "));
                }
                println!();
                println!("Record your result with:");
                println!(
                    "  learnpath practice complete --problem {} --score <0..1>",
                    problem.problem_id
                );
            }
        }

        PracticeCommands::Complete {
            problem,
            score,
            problem_type,
        } => {
            let outcome =
                practice::complete_problem(&graph, &mut tracker, &problem, score, problem_type, now)?;
            let task = match open_task_id(&sessions, &outcome.topic_id) {
                Some(task_id) => Some(sessions.complete_task(&task_id, score, now)?),
                None => None,
            };

            if json {
                print_json(json!({ "outcome": outcome, "session_task": task }))?;
            } else {
                println!("Recorded {:.2} for '{}'.", score, outcome.topic_id);
                println!("Mastery level: {}", outcome.new_level);
                if !outcome.fire_credit.is_empty() {
                    println!("Also refreshed: {}", outcome.fire_credit.join(", "));
                }
            }
        }

        PracticeCommands::Skip { problem } => {
            let parsed = ProblemId::parse(&problem)?;
            let task = match open_task_id(&sessions, &parsed.topic_id) {
                Some(task_id) => Some(sessions.skip_task(&task_id)?),
                None => None,
            };

            if json {
                print_json(json!({
                    "problem": problem,
                    "status": "skipped",
                    "session_task": task,
                }))?;
            } else {
                println!("Skipped {}.", problem);
            }
        }

        PracticeCommands::Hint { problem } => {
            let hint = practice::hint_for(&graph, &problem)?;
            let topic_id = ProblemId::parse(&problem)?.topic_id;
            if let Some(task_id) = open_task_id(&sessions, &topic_id) {
                sessions.mark_hint_used(&task_id)?;
            }

            if json {
                print_json(&hint)?;
            } else {
                println!("Hint: {}", hint.hint);
                println!("(costs {:.0}% of the score)", hint.hint_penalty * 100.0);
            }
        }
    }

    Ok(())
}

fn session_view(session: &StudySession, now: DateTime<Utc>) -> serde_json::Value {
    json!({
        "session": session,
        "elapsed_minutes": session.elapsed_minutes(now),
        "remaining_minutes": session.remaining_minutes(now),
        "time_up": session.is_time_up(now),
        "average_score": session.average_score(),
    })
}

fn print_session(session: &StudySession, now: DateTime<Utc>) {
    println!("Session: {} ({})", session.session_id, session.status.as_str());
    println!("Domain: {}", session.domain);
    println!(
        "Time: {:.0} of {} minutes ({:.0} left)",
        session.elapsed_minutes(now),
        session.planned_minutes,
        session.remaining_minutes(now)
    );
    println!(
        "Tasks: {} completed, {} skipped, avg score {:.2}",
        session.tasks_completed,
        session.tasks_skipped,
        session.average_score()
    );
}

fn run_session(cmd: SessionCommands, ctx: &Context, json: bool) -> CliResult {
    let mut sessions = ctx.sessions();
    let now = ctx.now;

    match cmd {
        SessionCommands::Start { domain, minutes } => {
            let session = sessions.start(&domain, minutes, now)?;
            if json {
                print_json(session_view(session, now))?;
            } else {
                println!(
                    "Started {} ({} minutes of {}).",
                    session.session_id, minutes, domain
                );
            }
        }

        SessionCommands::End => {
            let session = sessions.end(now)?;
            if json {
                print_json(session_view(&session, now))?;
            } else {
                println!("=== Session Complete ===");
                print_session(&session, now);
            }
        }

        SessionCommands::Status => match sessions.active() {
            Some(session) => {
                if json {
                    print_json(session_view(session, now))?;
                } else {
                    print_session(session, now);
                    if session.is_time_up(now) {
                        println!("Time is up.");
                    }
                }
            }
            None if json => print_json(())?,
            None => println!("No active session."),
        },

        SessionCommands::Pause => {
            let session = sessions.pause(now)?;
            if json {
                print_json(session_view(session, now))?;
            } else {
                println!("Paused {}.", session.session_id);
            }
        }

        SessionCommands::Resume => {
            let session = sessions.resume(now)?;
            if json {
                print_json(session_view(session, now))?;
            } else {
                println!("Resumed {}.", session.session_id);
            }
        }

        SessionCommands::History { limit } => {
            let history = sessions.history(limit)?;
            if json {
                print_json(&history)?;
            } else if history.is_empty() {
                println!("No sessions yet.");
            } else {
                println!(
                    "{:<18} {:<10} {:<10} {:<11} {:>5} {:>6}",
                    "ID", "Domain", "Started", "Status", "Tasks", "Score"
                );
                println!("{}", "-".repeat(65));
                for session in &history {
                    println!(
                        "{:<18} {:<10} {:<10} {:<11} {:>5} {:>6.2}",
                        session.session_id,
                        truncate(&session.domain, 10),
                        session.started_at.format("%Y-%m-%d"),
                        session.status.as_str(),
                        session.tasks_completed,
                        session.average_score()
                    );
                }
            }
        }
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
