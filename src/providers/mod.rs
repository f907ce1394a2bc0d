pub mod tfs;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::models::{Build, BuildStatus, Changeset, HistoryQuery, TeamProject};

#[async_trait]
pub trait BuildService: Sync {
    async fn list_builds(&self, project: &str, status: BuildStatus) -> Result<Vec<Build>>;
}

#[async_trait]
pub trait VersionControl: Sync {
    async fn list_projects(&self) -> Result<Vec<TeamProject>>;

    async fn team_project(&self, name: &str) -> Result<TeamProject>;

    /// Lazily yields the changesets matching `query`, fetching pages on demand.
    fn query_history<'a>(&'a self, query: &'a HistoryQuery) -> BoxStream<'a, Result<Changeset>>;
}
