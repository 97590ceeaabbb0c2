//! File processing status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use fileworks_core::error::AppError;

/// Processing status of an uploaded file.
///
/// Transitions are monotonic: `Uploaded → Processing → {Processed | Failed}`.
/// A terminal status may be overwritten by a later terminal outcome, but
/// never moves back to `Uploaded` or `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Stored and waiting for processing.
    Uploaded,
    /// A worker has claimed the processing job.
    Processing,
    /// Processing succeeded; extracted data is present.
    Processed,
    /// Processing failed terminally; an error payload is present.
    Failed,
}

impl FileStatus {
    /// Check if the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }

    /// The statuses a record may be in for a move to `self` to be applied.
    pub fn allowed_predecessors(&self) -> &'static [FileStatus] {
        match self {
            Self::Uploaded => &[],
            Self::Processing => &[Self::Uploaded, Self::Processing],
            Self::Processed | Self::Failed => &[
                Self::Uploaded,
                Self::Processing,
                Self::Processed,
                Self::Failed,
            ],
        }
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(Self::Uploaded),
            "processing" => Ok(Self::Processing),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            other => Err(AppError::validation(format!(
                "Unknown file status '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(FileStatus::Processing.allowed_predecessors().contains(&FileStatus::Uploaded));
        assert!(FileStatus::Processed.allowed_predecessors().contains(&FileStatus::Processing));
        assert!(FileStatus::Failed.allowed_predecessors().contains(&FileStatus::Processing));
    }

    #[test]
    fn test_never_reverts() {
        assert!(!FileStatus::Processing.allowed_predecessors().contains(&FileStatus::Processed));
        assert!(!FileStatus::Processing.allowed_predecessors().contains(&FileStatus::Failed));
        assert!(!FileStatus::Uploaded.allowed_predecessors().contains(&FileStatus::Processing));
    }

    #[test]
    fn test_parse_roundtrip() {
        for status in [
            FileStatus::Uploaded,
            FileStatus::Processing,
            FileStatus::Processed,
            FileStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<FileStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<FileStatus>().is_err());
    }
}
