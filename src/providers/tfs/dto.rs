use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{Build, BuildResult, Changeset, TeamProject};

/// Envelope used by every TFS list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default)]
    pub count: usize,
    pub value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDto {
    pub build_number: String,
    pub result: Option<BuildResult>,
    pub queue_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub definition: DefinitionReferenceDto,
}

#[derive(Debug, Deserialize)]
pub struct DefinitionReferenceDto {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectDto {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesetDto {
    pub changeset_id: u32,
    pub author: IdentityRefDto,
    pub created_date: DateTime<Utc>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRefDto {
    pub display_name: String,
}

impl From<BuildDto> for Build {
    fn from(dto: BuildDto) -> Self {
        Self {
            build_number: dto.build_number,
            definition_name: dto.definition.name,
            result: dto.result,
            queue_time: dto.queue_time,
            start_time: dto.start_time,
            finish_time: dto.finish_time,
        }
    }
}

impl From<ProjectDto> for TeamProject {
    fn from(dto: ProjectDto) -> Self {
        Self::new(&dto.name)
    }
}

impl From<ChangesetDto> for Changeset {
    fn from(dto: ChangesetDto) -> Self {
        Self {
            id: dto.changeset_id,
            owner_display_name: dto.author.display_name,
            creation_date: dto.created_date,
            comment: dto.comment.unwrap_or_default(),
        }
    }
}
