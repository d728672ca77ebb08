//! Shared domain enumerations aligned with persisted values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Collection that owns the page hierarchy and the homepage.
pub const PAGES_COLLECTION: &str = "pages";

/// Publication state of a document. The index tracks each state separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Published,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Published => "published",
        }
    }

    /// Status the read path should consult for the given draft flag.
    pub fn for_draft_mode(draft: bool) -> Self {
        if draft {
            DocumentStatus::Draft
        } else {
            DocumentStatus::Published
        }
    }
}

impl TryFrom<&str> for DocumentStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "draft" => Ok(DocumentStatus::Draft),
            "published" => Ok(DocumentStatus::Published),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write that triggered change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOperation {
    Create,
    Update,
    Delete,
}

/// Bulk dependent-update operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CascadeOperation {
    ArchivePageUpdate,
    PageHierarchyUpdate,
    HomepageChange,
    SettingsChange,
}

impl CascadeOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            CascadeOperation::ArchivePageUpdate => "archive-page-update",
            CascadeOperation::PageHierarchyUpdate => "page-hierarchy-update",
            CascadeOperation::HomepageChange => "homepage-change",
            CascadeOperation::SettingsChange => "settings-change",
        }
    }
}

impl TryFrom<&str> for CascadeOperation {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "archive-page-update" => Ok(CascadeOperation::ArchivePageUpdate),
            "page-hierarchy-update" => Ok(CascadeOperation::PageHierarchyUpdate),
            "homepage-change" => Ok(CascadeOperation::HomepageChange),
            "settings-change" => Ok(CascadeOperation::SettingsChange),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "Pending",
            JobState::Running => "Running",
            JobState::Done => "Done",
            JobState::Failed => "Failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl TryFrom<&str> for JobState {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Pending" => Ok(JobState::Pending),
            "Running" => Ok(JobState::Running),
            "Done" => Ok(JobState::Done),
            "Failed" => Ok(JobState::Failed),
            _ => Err(()),
        }
    }
}

/// How disruptive a change is for routing and caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_operation_round_trips_through_str() {
        for op in [
            CascadeOperation::ArchivePageUpdate,
            CascadeOperation::PageHierarchyUpdate,
            CascadeOperation::HomepageChange,
            CascadeOperation::SettingsChange,
        ] {
            assert_eq!(CascadeOperation::try_from(op.as_str()), Ok(op));
        }
        assert!(CascadeOperation::try_from("site-wipe").is_err());
    }

    #[test]
    fn severity_orders_by_impact() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::None);
    }

    #[test]
    fn draft_mode_selects_status() {
        assert_eq!(DocumentStatus::for_draft_mode(true), DocumentStatus::Draft);
        assert_eq!(
            DocumentStatus::for_draft_mode(false),
            DocumentStatus::Published
        );
    }
}
