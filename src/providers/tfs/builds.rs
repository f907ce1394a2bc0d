use async_trait::async_trait;
use log::{debug, info};

use super::client::TfsClient;
use super::dto::{BuildDto, ListResponse};
use crate::error::Result;
use crate::models::{Build, BuildStatus};
use crate::providers::BuildService;

const BUILD_API_VERSION: &str = "2.0";

#[async_trait]
impl BuildService for TfsClient {
    async fn list_builds(&self, project: &str, status: BuildStatus) -> Result<Vec<Build>> {
        let url = self.api_url(&[project, "_apis", "build", "builds"])?;
        let query = [
            ("statusFilter", status.as_str().to_string()),
            ("api-version", BUILD_API_VERSION.to_string()),
        ];

        let response: ListResponse<BuildDto> = self.get_json(url, &query).await?;
        debug!("Build service reported count={}", response.count);

        info!(
            "Fetched {} {} builds for project {project}",
            response.value.len(),
            status.as_str()
        );

        Ok(response.value.into_iter().map(Build::from).collect())
    }
}
