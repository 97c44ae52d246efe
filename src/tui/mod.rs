mod ui;
mod widgets;

use std::collections::HashSet;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::config::Config;
use crate::decay::ReviewSchedule;
use crate::graph::{KnowledgeGraph, FIRE_MAX_DEPTH};
use crate::mastery::{MasterySummary, MasteryTracker};
use crate::models::{MasteryLevel, PracticeEvent, Topic};
use crate::practice::COMPLETED_LEVEL;
use crate::scheduler::{ReviewItem, ReviewScheduler, ReviewStats};
use crate::session::{SessionManager, StudySession};
use crate::storage::Storage;

const DASHBOARD_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Topics,
    TopicDetail,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Dashboard => View::Topics,
            View::Topics => View::Dashboard,
            View::TopicDetail => View::Topics,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Dashboard => View::Topics,
            View::Topics => View::Dashboard,
            View::TopicDetail => View::Topics,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) if i + 1 < self.items.len() => i + 1,
            _ => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(0) | None => self.items.len() - 1,
            Some(i) => i - 1,
        };
        self.selected = Some(i);
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

/// One line of the topics view.
#[derive(Debug, Clone)]
pub struct TopicRow {
    pub topic: Topic,
    pub level: MasteryLevel,
    pub retention: f64,
    pub unlocked: bool,
    pub next_review: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TopicDetail {
    pub row: TopicRow,
    pub stability: f64,
    pub practice_count: u32,
    pub average_score: f64,
    pub prerequisites: Vec<(Topic, MasteryLevel)>,
    pub unlocks: Vec<String>,
    pub fire_ancestors: Vec<(String, f64)>,
    pub history: Vec<PracticeEvent>,
}

pub struct App {
    storage: Rc<dyn Storage>,
    config: Config,
    graph: KnowledgeGraph,
    tracker: MasteryTracker,
    pub now: DateTime<Utc>,
    pub view: View,
    pub topics: StatefulList<TopicRow>,
    pub selected_topic: Option<TopicDetail>,
    pub stats: ReviewStats,
    pub summary: MasterySummary,
    pub due_reviews: Vec<ReviewItem>,
    pub recent_sessions: Vec<StudySession>,
    pub filter: Option<String>,
    pub filter_input: String,
    pub filter_mode: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(storage: Rc<dyn Storage>, config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let graph = KnowledgeGraph::load_or_default(storage.as_ref());
        let tracker = MasteryTracker::load_or_default(Rc::clone(&storage))
            .with_stability_rule(config.stability_rule);
        let now = Utc::now();

        let mut app = Self {
            storage,
            config,
            graph,
            tracker,
            now,
            view: View::Dashboard,
            topics: StatefulList::with_items(Vec::new()),
            selected_topic: None,
            stats: ReviewStats::default(),
            summary: MasterySummary {
                total_topics: 0,
                by_level: Default::default(),
                average_retention: 0.0,
                topics_needing_review: 0,
            },
            due_reviews: Vec::new(),
            recent_sessions: Vec::new(),
            filter: None,
            filter_input: String::new(),
            filter_mode: false,
            should_quit: false,
        };
        app.refresh_data()?;
        Ok(app)
    }

    pub fn refresh_data(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.graph = KnowledgeGraph::load_or_default(self.storage.as_ref());
        self.tracker = MasteryTracker::load_or_default(Rc::clone(&self.storage))
            .with_stability_rule(self.config.stability_rule);
        self.now = Utc::now();

        let scheduler = ReviewScheduler::new(&mut self.tracker, self.config.target_retention);
        self.stats = scheduler.get_review_stats(self.now);
        self.due_reviews =
            scheduler.get_due_reviews(DASHBOARD_LIMIT, self.config.review_threshold, self.now)?;
        self.summary = self.tracker.summary(self.now);
        self.recent_sessions =
            SessionManager::load_or_default(Rc::clone(&self.storage)).history(DASHBOARD_LIMIT)?;
        self.topics = StatefulList::with_items(self.topic_rows());
        Ok(())
    }

    pub fn review_threshold(&self) -> f64 {
        self.config.review_threshold
    }

    fn topic_rows(&self) -> Vec<TopicRow> {
        let completed = self.tracker.topics_at_least(COMPLETED_LEVEL);
        let unlocked: HashSet<&str> = self
            .graph
            .get_available_topics(&completed)
            .into_iter()
            .map(|t| t.id.as_str())
            .collect();

        let topics: Vec<&Topic> = match &self.filter {
            Some(query) => self.graph.search_topics(query),
            None => self.graph.topics().collect(),
        };

        topics
            .into_iter()
            .map(|topic| self.topic_row(topic, unlocked.contains(topic.id.as_str())))
            .collect()
    }

    fn topic_row(&self, topic: &Topic, unlocked: bool) -> TopicRow {
        let schedule = ReviewSchedule::new(self.config.target_retention);
        let record = self.tracker.record(&topic.id);

        TopicRow {
            topic: topic.clone(),
            level: self.tracker.level(&topic.id),
            retention: self.tracker.retention(&topic.id, self.now),
            unlocked,
            next_review: record.and_then(|r| {
                r.last_review
                    .and_then(|last| schedule.next_review_date(last, r.stability).ok())
            }),
        }
    }

    fn apply_filter(&mut self) {
        self.filter = if self.filter_input.is_empty() {
            None
        } else {
            Some(self.filter_input.clone())
        };
        self.topics = StatefulList::with_items(self.topic_rows());
    }

    fn select_topic(&mut self) {
        let Some(row) = self.topics.selected_item().cloned() else {
            return;
        };
        let topic_id = row.topic.id.clone();

        let prerequisites = self
            .graph
            .get_prerequisites(&topic_id)
            .into_iter()
            .map(|t| (t.clone(), self.tracker.level(&t.id)))
            .collect();

        let mut fire_ancestors: Vec<(String, f64)> = self
            .graph
            .get_fire_ancestors(&topic_id, FIRE_MAX_DEPTH)
            .into_iter()
            .collect();
        fire_ancestors.sort_by(|a, b| b.1.total_cmp(&a.1));

        let record = self.tracker.record(&topic_id);
        self.selected_topic = Some(TopicDetail {
            row,
            stability: record.map(|r| r.stability).unwrap_or(1.0),
            practice_count: record.map(|r| r.practice_count).unwrap_or(0),
            average_score: record.map(|r| r.average_score).unwrap_or(0.0),
            prerequisites,
            unlocks: self
                .graph
                .get_dependents(&topic_id)
                .into_iter()
                .map(|t| t.name.clone())
                .collect(),
            fire_ancestors,
            history: record
                .map(|r| r.history.iter().rev().cloned().collect())
                .unwrap_or_default(),
        });
        self.view = View::TopicDetail;
    }

    fn handle_key(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> Result<(), Box<dyn std::error::Error>> {
        // Filter input (vim-like / search)
        if self.filter_mode {
            match key {
                KeyCode::Esc => {
                    self.filter_mode = false;
                    self.filter_input.clear();
                }
                KeyCode::Enter => {
                    self.filter_mode = false;
                    self.apply_filter();
                }
                KeyCode::Backspace => {
                    self.filter_input.pop();
                }
                KeyCode::Char(c) => {
                    self.filter_input.push(c);
                }
                _ => {}
            }
            return Ok(());
        }

        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data()?;
                if self.view == View::TopicDetail {
                    self.view = View::Topics;
                    self.selected_topic = None;
                }
            }

            KeyCode::Char('/') if self.view == View::Topics => {
                self.filter_mode = true;
                self.filter_input.clear();
            }

            KeyCode::Esc => match self.view {
                View::TopicDetail => {
                    self.view = View::Topics;
                    self.selected_topic = None;
                }
                View::Topics if self.filter.is_some() => {
                    self.filter_input.clear();
                    self.apply_filter();
                }
                _ => {}
            },

            // h/l move between views like vim
            KeyCode::Char('h') | KeyCode::Left => match self.view {
                View::TopicDetail => {
                    self.view = View::Topics;
                    self.selected_topic = None;
                }
                _ => self.view = self.view.prev(),
            },
            KeyCode::Char('l') | KeyCode::Right => match self.view {
                View::Topics => self.select_topic(),
                _ => self.view = self.view.next(),
            },

            KeyCode::Tab => {
                if modifiers.contains(KeyModifiers::SHIFT) {
                    self.view = self.view.prev();
                } else {
                    self.view = self.view.next();
                }
            }
            KeyCode::BackTab => {
                self.view = self.view.prev();
            }

            KeyCode::Char('j') | KeyCode::Down if self.view == View::Topics => self.topics.next(),
            KeyCode::Char('k') | KeyCode::Up if self.view == View::Topics => {
                self.topics.previous()
            }

            KeyCode::Char('g') if self.view == View::Topics && !self.topics.items.is_empty() => {
                self.topics.selected = Some(0);
            }
            KeyCode::Char('G') if self.view == View::Topics && !self.topics.items.is_empty() => {
                self.topics.selected = Some(self.topics.items.len() - 1);
            }

            KeyCode::Enter if self.view == View::Topics => self.select_topic(),

            _ => {}
        }
        Ok(())
    }
}

pub fn run(storage: Rc<dyn Storage>, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(storage, config)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers)?;
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use crate::decay::StabilityRule;
    use crate::storage::MemoryStorage;
    use std::path::PathBuf;

    fn app() -> App {
        let storage: Rc<dyn Storage> = Rc::new(MemoryStorage::new());
        let config = Config {
            state_dir: PathBuf::from("."),
            backend: Backend::Json,
            target_retention: 0.85,
            review_threshold: 0.7,
            stability_rule: StabilityRule::Incremental,
            log_filter: "warn".to_string(),
        };
        App::new(storage, config).unwrap()
    }

    mod list_tests {
        use super::*;

        #[test]
        fn wraps_around() {
            let mut list = StatefulList::with_items(vec![1, 2, 3]);
            list.previous();
            assert_eq!(list.selected, Some(2));
            list.next();
            assert_eq!(list.selected, Some(0));
        }

        #[test]
        fn empty_list_has_no_selection() {
            let mut list: StatefulList<u8> = StatefulList::with_items(Vec::new());
            list.next();
            assert_eq!(list.selected, None);
        }
    }

    mod app_tests {
        use super::*;

        #[test]
        fn lists_catalog_with_roots_unlocked() {
            let app = app();
            assert_eq!(app.topics.items.len(), app.graph.len());

            let arithmetic = app
                .topics
                .items
                .iter()
                .find(|r| r.topic.id == "arithmetic")
                .unwrap();
            assert!(arithmetic.unlocked);
            assert_eq!(arithmetic.level, MasteryLevel::Unknown);

            let limits = app.topics.items.iter().find(|r| r.topic.id == "limits").unwrap();
            assert!(!limits.unlocked);
        }

        #[test]
        fn filter_narrows_topics() {
            let mut app = app();
            app.handle_key(KeyCode::Tab, KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::Topics);

            app.handle_key(KeyCode::Char('/'), KeyModifiers::NONE).unwrap();
            for c in "matri".chars() {
                app.handle_key(KeyCode::Char(c), KeyModifiers::NONE).unwrap();
            }
            app.handle_key(KeyCode::Enter, KeyModifiers::NONE).unwrap();

            assert_eq!(app.filter.as_deref(), Some("matri"));
            assert!(app.topics.items.iter().any(|r| r.topic.id == "matrices"));
            assert!(app.topics.items.iter().all(|r| r.topic.id != "arithmetic"));

            app.handle_key(KeyCode::Esc, KeyModifiers::NONE).unwrap();
            assert!(app.filter.is_none());
        }

        #[test]
        fn opening_a_topic_shows_its_ancestors() {
            let mut app = app();
            app.view = View::Topics;
            let index = app
                .topics
                .items
                .iter()
                .position(|r| r.topic.id == "derivatives")
                .unwrap();
            app.topics.selected = Some(index);

            app.handle_key(KeyCode::Enter, KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::TopicDetail);

            let detail = app.selected_topic.as_ref().unwrap();
            assert_eq!(detail.prerequisites.len(), 1);
            assert_eq!(detail.unlocks, vec!["Integrals".to_string()]);
            assert_eq!(detail.fire_ancestors[0], ("limits".to_string(), 0.5));

            app.handle_key(KeyCode::Char('h'), KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::Topics);
            assert!(app.selected_topic.is_none());
        }

        #[test]
        fn quits_on_q() {
            let mut app = app();
            app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE).unwrap();
            assert!(app.should_quit);
        }
    }
}
