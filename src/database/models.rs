use crate::core::image::DuplicateRecord;
use serde::{Deserialize, Serialize};

// Duplicate relationship as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateImage {
    pub id: i64,
    pub owner: String,
    pub image_id: String,
    pub ref_image_id: String,
    pub similarity: f64,
    pub created_at: String,
}

impl DuplicateImage {
    pub fn to_record(&self) -> DuplicateRecord {
        DuplicateRecord {
            owner: self.owner.clone(),
            image_id: self.image_id.clone(),
            ref_image_id: self.ref_image_id.clone(),
            similarity: self.similarity,
        }
    }
}

// One processing pass over a submission directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: String,
    pub directory: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub records_written: i64,
    pub redundant_skipped: i64,
    pub status: String,
}

impl ScanSession {
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from(self.status.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    InProgress,
    Completed,
    Skipped(String),
    Failed(String),
}

impl From<String> for SessionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "in_progress" => SessionStatus::InProgress,
            "completed" => SessionStatus::Completed,
            s if s.starts_with("skipped:") => {
                SessionStatus::Skipped(s.strip_prefix("skipped:").unwrap_or("").to_string())
            }
            s if s.starts_with("failed:") => {
                SessionStatus::Failed(s.strip_prefix("failed:").unwrap_or("").to_string())
            }
            _ => SessionStatus::InProgress,
        }
    }
}

impl From<SessionStatus> for String {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::InProgress => "in_progress".to_string(),
            SessionStatus::Completed => "completed".to_string(),
            SessionStatus::Skipped(msg) => format!("skipped:{}", msg),
            SessionStatus::Failed(msg) => format!("failed:{}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(String::from(SessionStatus::Completed), "completed");
        assert_eq!(
            SessionStatus::from("failed:disk full".to_string()),
            SessionStatus::Failed("disk full".to_string())
        );
        assert_eq!(
            SessionStatus::from("skipped:gone".to_string()),
            SessionStatus::Skipped("gone".to_string())
        );
        assert_eq!(
            SessionStatus::from("garbage".to_string()),
            SessionStatus::InProgress
        );
    }
}
