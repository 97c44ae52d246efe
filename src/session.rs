use std::rc::Rc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::storage::Storage;

pub const SESSION_PREFIX: &str = "sessions/";
pub const ACTIVE_SESSION_KEY: &str = "sessions/active";
pub const DEFAULT_SESSION_MINUTES: u32 = 30;

fn random_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    format!("{}-{:08x}", prefix, rng.gen::<u32>())
}

fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Paused)
    }
}

fn default_problem_type() -> String {
    "concept".to_string()
}

fn default_difficulty() -> String {
    "medium".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeTask {
    pub task_id: String,
    pub topic_id: String,
    #[serde(default = "default_problem_type")]
    pub problem_type: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub hint_used: bool,
}

impl PracticeTask {
    pub fn is_open(&self) -> bool {
        self.completed_at.is_none() && !self.skipped
    }
}

fn default_planned_minutes() -> u32 {
    DEFAULT_SESSION_MINUTES
}

// A timed block of practice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub session_id: String,
    pub domain: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default = "default_planned_minutes")]
    pub planned_minutes: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_paused_seconds: i64,
    #[serde(default)]
    pub tasks: Vec<PracticeTask>,
    #[serde(default)]
    pub tasks_completed: u32,
    #[serde(default)]
    pub tasks_skipped: u32,
    #[serde(default)]
    pub total_score: f64,
}

impl StudySession {
    pub fn new(domain: impl Into<String>, planned_minutes: u32, now: DateTime<Utc>) -> Self {
        Self {
            session_id: random_id("session"),
            domain: domain.into(),
            status: SessionStatus::Active,
            planned_minutes,
            started_at: now,
            ended_at: None,
            paused_at: None,
            total_paused_seconds: 0,
            tasks: Vec::new(),
            tasks_completed: 0,
            tasks_skipped: 0,
            total_score: 0.0,
        }
    }

    /// Active minutes: wall time up to the end (or pause) minus paused time.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> f64 {
        let end = self.ended_at.or(self.paused_at).unwrap_or(now);
        let seconds = (end - self.started_at).num_seconds() - self.total_paused_seconds;
        (seconds as f64 / 60.0).max(0.0)
    }

    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> f64 {
        (self.planned_minutes as f64 - self.elapsed_minutes(now)).max(0.0)
    }

    pub fn is_time_up(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_minutes(now) >= self.planned_minutes as f64
    }

    pub fn average_score(&self) -> f64 {
        if self.tasks_completed == 0 {
            return 0.0;
        }
        self.total_score / self.tasks_completed as f64
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.status == SessionStatus::Active {
            self.status = SessionStatus::Paused;
            self.paused_at = Some(now);
        }
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.status != SessionStatus::Paused {
            return;
        }
        if let Some(paused_at) = self.paused_at.take() {
            self.total_paused_seconds += (now - paused_at).num_seconds().max(0);
        }
        self.status = SessionStatus::Active;
    }

    pub fn end(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        // Time spent paused up to the end is not session time
        if let Some(paused_at) = self.paused_at.take() {
            self.total_paused_seconds += (now - paused_at).num_seconds().max(0);
        }
        self.status = status;
        self.ended_at = Some(now);
    }

    pub fn add_task(&mut self, topic_id: &str, problem_type: &str, difficulty: &str) -> &PracticeTask {
        let index = self.tasks.len();
        self.tasks.push(PracticeTask {
            task_id: random_id("task"),
            topic_id: topic_id.to_string(),
            problem_type: problem_type.to_string(),
            difficulty: difficulty.to_string(),
            started_at: None,
            completed_at: None,
            score: None,
            skipped: false,
            hint_used: false,
        });
        &self.tasks[index]
    }

    fn task_index(&self, task_id: &str) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.task_id == task_id)
            .ok_or_else(|| Error::UnknownTask(task_id.to_string()))
    }

    /// Most recent task for `topic_id` that is neither completed nor skipped.
    pub fn open_task_for(&self, topic_id: &str) -> Option<&PracticeTask> {
        self.tasks
            .iter()
            .rev()
            .find(|t| t.topic_id == topic_id && t.is_open())
    }

    pub fn start_task(&mut self, task_id: &str, now: DateTime<Utc>) -> Result<&PracticeTask> {
        let index = self.task_index(task_id)?;
        let task = &mut self.tasks[index];
        task.started_at = Some(now);
        Ok(task)
    }

    pub fn complete_task(
        &mut self,
        task_id: &str,
        score: f64,
        now: DateTime<Utc>,
    ) -> Result<&PracticeTask> {
        let index = self.task_index(task_id)?;
        self.tasks_completed += 1;
        self.total_score += score;

        let task = &mut self.tasks[index];
        task.completed_at = Some(now);
        task.score = Some(score);
        Ok(task)
    }

    pub fn skip_task(&mut self, task_id: &str) -> Result<&PracticeTask> {
        let index = self.task_index(task_id)?;
        self.tasks_skipped += 1;

        let task = &mut self.tasks[index];
        task.skipped = true;
        Ok(task)
    }

    pub fn mark_hint_used(&mut self, task_id: &str) -> Result<()> {
        let index = self.task_index(task_id)?;
        self.tasks[index].hint_used = true;
        Ok(())
    }
}

/// Owns the open session (active or paused) and the session archive.
pub struct SessionManager {
    storage: Rc<dyn Storage>,
    active: Option<StudySession>,
}

impl SessionManager {
    pub fn new(storage: Rc<dyn Storage>) -> Self {
        Self {
            storage,
            active: None,
        }
    }

    pub fn load(storage: Rc<dyn Storage>) -> Result<Self> {
        let mut manager = Self::new(storage);

        let Some(pointer) = manager.storage.load(ACTIVE_SESSION_KEY)? else {
            return Ok(manager);
        };
        let session_id: Option<String> = serde_json::from_str(&pointer).map_err(|e| {
            Error::MalformedSnapshot {
                key: ACTIVE_SESSION_KEY.to_string(),
                reason: e.to_string(),
            }
        })?;

        if let Some(session_id) = session_id {
            let session = manager.load_session(&session_id)?;
            manager.active = session.filter(|s| s.status.is_open());
        }
        Ok(manager)
    }

    pub fn load_or_default(storage: Rc<dyn Storage>) -> Self {
        match Self::load(Rc::clone(&storage)) {
            Ok(manager) => manager,
            Err(e) => {
                warn!(error = %e, "session state unreadable, starting without an active session");
                Self::new(storage)
            }
        }
    }

    fn load_session(&self, session_id: &str) -> Result<Option<StudySession>> {
        let key = session_key(session_id);
        let Some(body) = self.storage.load(&key)? else {
            return Ok(None);
        };
        let session = serde_json::from_str(&body).map_err(|e| Error::MalformedSnapshot {
            key,
            reason: e.to_string(),
        })?;
        Ok(Some(session))
    }

    fn save_session(&self, session: &StudySession) -> Result<()> {
        self.storage.save(
            &session_key(&session.session_id),
            &serde_json::to_string_pretty(session)?,
        )?;

        let pointer = session
            .status
            .is_open()
            .then(|| session.session_id.clone());
        self.storage
            .save(ACTIVE_SESSION_KEY, &serde_json::to_string(&pointer)?)?;

        debug!(session = %session.session_id, status = session.status.as_str(), "saved session");
        Ok(())
    }

    // Saves the open session, dropping it from memory once it has ended
    fn commit(&mut self) -> Result<()> {
        if let Some(session) = &self.active {
            self.save_session(session)?;
            if !session.status.is_open() {
                self.active = None;
            }
        }
        Ok(())
    }

    pub fn active(&self) -> Option<&StudySession> {
        self.active.as_ref()
    }

    fn active_mut(&mut self) -> Result<&mut StudySession> {
        self.active.as_mut().ok_or(Error::NoActiveSession)
    }

    /// Starts a session, abandoning whichever one was open.
    pub fn start(&mut self, domain: &str, minutes: u32, now: DateTime<Utc>) -> Result<&StudySession> {
        if let Some(mut previous) = self.active.take() {
            previous.end(SessionStatus::Abandoned, now);
            self.save_session(&previous)?;
            info!(session = %previous.session_id, "abandoned session");
        }

        let session = StudySession::new(domain, minutes, now);
        self.save_session(&session)?;
        info!(session = %session.session_id, domain, minutes, "started session");
        Ok(self.active.insert(session))
    }

    pub fn end(&mut self, now: DateTime<Utc>) -> Result<StudySession> {
        let mut session = self.active.take().ok_or(Error::NoActiveSession)?;
        session.end(SessionStatus::Completed, now);
        self.save_session(&session)?;
        info!(session = %session.session_id, completed = session.tasks_completed, "ended session");
        Ok(session)
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<&StudySession> {
        self.active_mut()?.pause(now);
        self.commit()?;
        self.active.as_ref().ok_or(Error::NoActiveSession)
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<&StudySession> {
        self.active_mut()?.resume(now);
        self.commit()?;
        self.active.as_ref().ok_or(Error::NoActiveSession)
    }

    pub fn add_task(
        &mut self,
        topic_id: &str,
        problem_type: &str,
        difficulty: &str,
    ) -> Result<PracticeTask> {
        let task = self
            .active_mut()?
            .add_task(topic_id, problem_type, difficulty)
            .clone();
        self.commit()?;
        Ok(task)
    }

    pub fn start_task(&mut self, task_id: &str, now: DateTime<Utc>) -> Result<PracticeTask> {
        let task = self.active_mut()?.start_task(task_id, now)?.clone();
        self.commit()?;
        Ok(task)
    }

    pub fn complete_task(
        &mut self,
        task_id: &str,
        score: f64,
        now: DateTime<Utc>,
    ) -> Result<PracticeTask> {
        let task = self.active_mut()?.complete_task(task_id, score, now)?.clone();
        self.commit()?;
        Ok(task)
    }

    pub fn skip_task(&mut self, task_id: &str) -> Result<PracticeTask> {
        let task = self.active_mut()?.skip_task(task_id)?.clone();
        self.commit()?;
        Ok(task)
    }

    pub fn mark_hint_used(&mut self, task_id: &str) -> Result<()> {
        self.active_mut()?.mark_hint_used(task_id)?;
        self.commit()
    }

    /// Open task for `topic_id` in the active session, created if missing.
    pub fn task_for_topic(
        &mut self,
        topic_id: &str,
        problem_type: &str,
        difficulty: &str,
    ) -> Result<PracticeTask> {
        let session = self.active_mut()?;
        if let Some(task) = session.open_task_for(topic_id) {
            return Ok(task.clone());
        }
        self.add_task(topic_id, problem_type, difficulty)
    }

    /// Most recently started sessions first; unreadable entries are skipped.
    pub fn history(&self, limit: usize) -> Result<Vec<StudySession>> {
        let mut sessions = Vec::new();

        for key in self.storage.keys(SESSION_PREFIX)? {
            if key == ACTIVE_SESSION_KEY {
                continue;
            }
            let session_id = &key[SESSION_PREFIX.len()..];
            match self.load_session(session_id) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable session"),
            }
        }

        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(limit);
        Ok(sessions)
    }
}
