//! User-facing notices raised at the engine boundary.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use fibermesh_core::SpliceError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Machine code of the error that raised this notice, if any.
    pub code: Option<String>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self::plain(NoticeLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::plain(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::plain(NoticeLevel::Warning, message)
    }

    /// Local validation failures are warnings; everything else is an error.
    pub fn from_error(context: &str, err: &SpliceError) -> Self {
        let level = if err.is_validation() {
            NoticeLevel::Warning
        } else {
            NoticeLevel::Error
        };
        Self {
            level,
            message: format!("{context}: {}", err.message()),
            code: Some(err.code().to_string()),
        }
    }

    fn plain(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            code: None,
        }
    }
}

/// Bounded log of notices, oldest dropped first.
#[derive(Debug)]
pub struct NoticeLog {
    items: VecDeque<Notice>,
    max_retained: usize,
}

impl NoticeLog {
    pub fn new(max_retained: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_retained: max_retained.max(1),
        }
    }

    pub fn push(&mut self, notice: Notice) {
        if self.items.len() == self.max_retained {
            self.items.pop_front();
        }
        self.items.push_back(notice);
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.items.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.items.iter()
    }
}
