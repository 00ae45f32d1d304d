use std::sync::{Arc, RwLock};

use backend_api::Lesson;
use serde::{Deserialize, Serialize};

pub const IDLE_STATUS_TEXT: &str = "System ready";

/// Last-known activity shown on every page.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PanelStatus {
    pub text: String,
    pub current_lesson: Option<Lesson>,
}

impl Default for PanelStatus {
    fn default() -> Self {
        Self {
            text: IDLE_STATUS_TEXT.to_string(),
            current_lesson: None,
        }
    }
}

/// Fields to overwrite; `None` leaves the field as it is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    pub text: Option<String>,
    pub current_lesson: Option<Option<Lesson>>,
}

impl StatusUpdate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            current_lesson: None,
        }
    }

    pub fn lesson(lesson: Option<Lesson>) -> Self {
        Self {
            text: None,
            current_lesson: Some(lesson),
        }
    }

    pub fn with_lesson(mut self, lesson: Option<Lesson>) -> Self {
        self.current_lesson = Some(lesson);
        self
    }
}

/// Shared status record. Writes are unconditional merges: concurrent actions
/// interleave and the last writer wins.
#[derive(Clone, Debug, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<PanelStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> PanelStatus {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn write(&self, update: StatusUpdate) -> PanelStatus {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(text) = update.text {
            guard.text = text;
        }
        if let Some(lesson) = update.current_lesson {
            guard.current_lesson = lesson;
        }
        guard.clone()
    }

    pub fn set_text(&self, text: impl Into<String>) -> PanelStatus {
        self.write(StatusUpdate::text(text))
    }
}
