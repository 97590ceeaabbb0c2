//! Job payload types, one variant per job kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use fileworks_core::error::AppError;
use fileworks_core::types::id::{FileId, UserId};

/// Kind of background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Hash, measure, and transform an uploaded file.
    ProcessFile,
}

impl JobKind {
    /// All job kinds.
    pub const ALL: [JobKind; 1] = [Self::ProcessFile];

    /// Return the kind as its wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessFile => "process-file",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Unknown job kind '{s}'")))
    }
}

/// Payload for a job, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JobPayload {
    /// Process one uploaded file.
    ProcessFile(ProcessFilePayload),
}

/// Payload of a `process-file` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFilePayload {
    /// The file record to update.
    pub file_id: FileId,
    /// Owner of the file record.
    pub user_id: UserId,
    /// Provider-relative location of the stored bytes.
    pub file_path: String,
}

impl JobPayload {
    /// Build a `process-file` payload.
    pub fn process_file(file_id: FileId, user_id: UserId, file_path: impl Into<String>) -> Self {
        Self::ProcessFile(ProcessFilePayload {
            file_id,
            user_id,
            file_path: file_path.into(),
        })
    }

    /// The kind of job this payload belongs to.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::ProcessFile(_) => JobKind::ProcessFile,
        }
    }

    /// The file record this job reports status to.
    pub fn file_id(&self) -> FileId {
        match self {
            Self::ProcessFile(p) => p.file_id,
        }
    }

    /// Reject payloads that cannot possibly be processed.
    pub fn validate(&self) -> Result<(), AppError> {
        match self {
            Self::ProcessFile(p) => {
                if p.file_path.trim().is_empty() {
                    return Err(AppError::validation("file_path must not be empty"));
                }
                if p.file_path.split(['/', '\\']).any(|segment| segment == "..") {
                    return Err(AppError::validation(format!(
                        "file_path '{}' escapes the storage root",
                        p.file_path
                    )));
                }
                Ok(())
            }
        }
    }
}
