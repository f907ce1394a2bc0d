use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;

/// Outcome of a finished build as reported by the build service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildResult {
    Succeeded,
    PartiallySucceeded,
    Failed,
    Canceled,
    #[serde(other)]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Completed,
}

impl BuildStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Build {
    pub build_number: String,
    pub definition_name: String,
    pub result: Option<BuildResult>,
    pub queue_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamProject {
    pub name: String,
    pub server_item: String,
}

impl TeamProject {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            server_item: format!("$/{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    pub id: u32,
    pub owner_display_name: String,
    pub creation_date: DateTime<Utc>,
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionType {
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSpec {
    Latest,
}

/// Parameters of a version-control history query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub path: String,
    pub recursion: RecursionType,
    pub item_version: VersionSpec,
    pub deletion_id: u32,
    pub author: Option<String>,
    /// Carries the client's offset so the server reads the same instant.
    pub from_date: DateTime<FixedOffset>,
    pub to_date: Option<DateTime<FixedOffset>>,
    pub max_results: usize,
    pub include_changes: bool,
    pub include_download_info: bool,
    pub slot_mode: bool,
    pub sort_ascending: bool,
}
