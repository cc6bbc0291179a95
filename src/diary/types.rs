use crate::analysis::Subject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the problem reached the tutor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiaryKind {
    Image,
    Voice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: Uuid,
    pub subject: Subject,
    pub kind: DiaryKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl DiaryEntry {
    pub fn new(subject: Subject, kind: DiaryKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject,
            kind,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// First line of the content, cut to `max_chars`
    pub fn preview(&self, max_chars: usize) -> String {
        let line = self.content.lines().next().unwrap_or("");
        if line.chars().count() > max_chars {
            let cut: String = line.chars().take(max_chars).collect();
            format!("{cut}…")
        } else {
            line.to_string()
        }
    }
}
