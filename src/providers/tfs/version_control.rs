use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use log::{debug, info};

use super::client::TfsClient;
use super::dto::{ChangesetDto, ListResponse, ProjectDto};
use crate::error::{Result, TfsError};
use crate::models::{Changeset, HistoryQuery, TeamProject};
use crate::providers::VersionControl;

const CORE_API_VERSION: &str = "1.0";
const TFVC_API_VERSION: &str = "1.0";
const HISTORY_PAGE_SIZE: usize = 256;
const PROJECT_PAGE_SIZE: usize = 1000;

impl TfsClient {
    /// The changeset endpoint never returns deleted items or change details.
    fn ensure_supported(query: &HistoryQuery) -> Result<()> {
        let supported =
            query.deletion_id == 0 && !query.include_changes && !query.include_download_info;

        if supported {
            Ok(())
        } else {
            Err(TfsError::Config(format!(
                "History query not supported by the changeset endpoint: {query:?}"
            )))
        }
    }

    fn history_params(
        query: &HistoryQuery,
        skip: usize,
        top: usize,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("searchCriteria.itemPath", query.path.clone()),
            ("searchCriteria.fromDate", query.from_date.to_rfc3339()),
            // Slot mode matches history by path, so renames are not followed.
            ("searchCriteria.followRenames", (!query.slot_mode).to_string()),
            ("$skip", skip.to_string()),
            ("$top", top.to_string()),
            (
                "$orderby",
                if query.sort_ascending { "id asc" } else { "id desc" }.to_string(),
            ),
            ("maxCommentLength", i32::MAX.to_string()),
            ("api-version", TFVC_API_VERSION.to_string()),
        ];

        if let Some(author) = &query.author {
            params.push(("searchCriteria.author", author.clone()));
        }
        if let Some(to_date) = query.to_date {
            params.push(("searchCriteria.toDate", to_date.to_rfc3339()));
        }

        params
    }

    async fn fetch_changeset_page(
        &self,
        query: &HistoryQuery,
        skip: usize,
        top: usize,
    ) -> Result<Vec<Changeset>> {
        let url = self.api_url(&["_apis", "tfvc", "changesets"])?;
        let params = Self::history_params(query, skip, top);

        let response: ListResponse<ChangesetDto> = self.get_json(url, &params).await?;
        debug!(
            "Changeset page at offset {skip}: {} records",
            response.value.len()
        );

        Ok(response.value.into_iter().map(Changeset::from).collect())
    }

    /// Fetches the page starting at `cursor` and returns the cursor of the next
    /// one, or `None` once the result cap is reached or a short page arrives.
    async fn next_history_page(
        &self,
        query: &HistoryQuery,
        cursor: Option<usize>,
    ) -> Result<Option<(Vec<Changeset>, Option<usize>)>> {
        let Some(skip) = cursor else {
            return Ok(None);
        };

        let top = query.max_results.saturating_sub(skip).min(HISTORY_PAGE_SIZE);
        if top == 0 {
            return Ok(None);
        }

        let page = self.fetch_changeset_page(query, skip, top).await?;
        let next = (page.len() == top).then_some(skip + top);

        Ok(Some((page, next)))
    }
}

#[async_trait]
impl VersionControl for TfsClient {
    async fn list_projects(&self) -> Result<Vec<TeamProject>> {
        let url = self.api_url(&["_apis", "projects"])?;
        let mut projects: Vec<TeamProject> = Vec::new();

        loop {
            let query = [
                ("$top", PROJECT_PAGE_SIZE.to_string()),
                ("$skip", projects.len().to_string()),
                ("api-version", CORE_API_VERSION.to_string()),
            ];
            let response: ListResponse<ProjectDto> = self.get_json(url.clone(), &query).await?;
            let fetched = response.value.len();
            projects.extend(response.value.into_iter().map(TeamProject::from));

            if fetched < PROJECT_PAGE_SIZE {
                break;
            }
        }

        projects.sort_by_key(|p| p.name.to_lowercase());

        info!("Found {} team projects", projects.len());
        Ok(projects)
    }

    async fn team_project(&self, name: &str) -> Result<TeamProject> {
        let url = self.api_url(&["_apis", "projects", name])?;
        let query = [("api-version", CORE_API_VERSION.to_string())];

        let project: ProjectDto = self.get_json(url, &query).await?;
        Ok(project.into())
    }

    fn query_history<'a>(&'a self, query: &'a HistoryQuery) -> BoxStream<'a, Result<Changeset>> {
        if let Err(e) = Self::ensure_supported(query) {
            return stream::once(async move { Err(e) }).boxed();
        }

        info!(
            "Querying history of {} since {} (max {} results)",
            query.path, query.from_date, query.max_results
        );

        stream::try_unfold(Some(0), move |cursor| self.next_history_page(query, cursor))
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, TfsError>)))
            .try_flatten()
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use mockito::Matcher;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::models::{RecursionType, VersionSpec};

    const PROJECTS_PATH: &str = "/tfs/DefaultCollection/_apis/projects";
    const CHANGESETS_PATH: &str = "/tfs/DefaultCollection/_apis/tfvc/changesets";

    fn client_for(server: &mockito::ServerGuard) -> TfsClient {
        let url = Url::parse(&format!("{}/tfs/DefaultCollection", server.url())).unwrap();
        TfsClient::new(&url, None).unwrap()
    }

    fn history_query(author: Option<&str>, max_results: usize) -> HistoryQuery {
        HistoryQuery {
            path: "$/DART".to_string(),
            recursion: RecursionType::Full,
            item_version: VersionSpec::Latest,
            deletion_id: 0,
            author: author.map(str::to_string),
            from_date: FixedOffset::east_opt(3600)
                .unwrap()
                .with_ymd_and_hms(2017, 2, 1, 0, 0, 0)
                .unwrap(),
            to_date: None,
            max_results,
            include_changes: false,
            include_download_info: false,
            slot_mode: true,
            sort_ascending: true,
        }
    }

    fn changesets_body(ids: impl Iterator<Item = u32>) -> String {
        let value: Vec<_> = ids
            .map(|id| {
                json!({
                    "changesetId": id,
                    "author": { "displayName": "Sam Hutchinson" },
                    "createdDate": "2017-03-03T16:31:50.56Z",
                    "comment": format!("change {id}")
                })
            })
            .collect();
        json!({ "count": value.len(), "value": value }).to_string()
    }

    #[tokio::test]
    async fn test_list_projects_sorted_by_name() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", PROJECTS_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("$skip".into(), "0".into()),
                Matcher::UrlEncoded("api-version".into(), "1.0".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "count": 3,
                    "value": [
                        { "id": "1", "name": "Tools" },
                        { "id": "2", "name": "DART" },
                        { "id": "3", "name": "archive" }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let projects = client_for(&server).list_projects().await.unwrap();
        let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();

        assert_eq!(names, ["archive", "DART", "Tools"]);
        assert_eq!(projects[1].server_item, "$/DART");
    }

    #[tokio::test]
    async fn test_list_projects_reads_every_page() {
        let mut server = mockito::Server::new_async().await;
        let first_page: Vec<_> = (0..PROJECT_PAGE_SIZE)
            .map(|i| json!({ "id": i.to_string(), "name": format!("Project {i:04}") }))
            .collect();
        let first = server
            .mock("GET", PROJECTS_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("$top".into(), "1000".into()),
                Matcher::UrlEncoded("$skip".into(), "0".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "count": first_page.len(), "value": first_page }).to_string())
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", PROJECTS_PATH)
            .match_query(Matcher::UrlEncoded("$skip".into(), "1000".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "count": 1, "value": [{ "id": "x", "name": "Zeta" }] }).to_string())
            .expect(1)
            .create_async()
            .await;

        let projects = client_for(&server).list_projects().await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(projects.len(), PROJECT_PAGE_SIZE + 1);
        assert_eq!(projects.last().map(|p| p.name.as_str()), Some("Zeta"));
    }

    #[tokio::test]
    async fn test_team_project_resolves_root_path() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tfs/DefaultCollection/_apis/projects/DART")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "id": "2", "name": "DART" }).to_string())
            .create_async()
            .await;

        let project = client_for(&server).team_project("DART").await.unwrap();

        assert_eq!(project, TeamProject::new("DART"));
    }

    #[tokio::test]
    async fn test_query_history_sends_search_criteria() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", CHANGESETS_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("searchCriteria.itemPath".into(), "$/DART".into()),
                Matcher::UrlEncoded("searchCriteria.author".into(), "ICI\\HutchinsonS".into()),
                Matcher::UrlEncoded(
                    "searchCriteria.fromDate".into(),
                    "2017-02-01T00:00:00+01:00".into(),
                ),
                Matcher::UrlEncoded("searchCriteria.followRenames".into(), "false".into()),
                Matcher::UrlEncoded("$orderby".into(), "id asc".into()),
                Matcher::UrlEncoded("$skip".into(), "0".into()),
                Matcher::UrlEncoded("$top".into(), "256".into()),
                Matcher::UrlEncoded("maxCommentLength".into(), i32::MAX.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(changesets_body(1..=2))
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let query = history_query(Some("ICI\\HutchinsonS"), 10_000);
        let changesets: Vec<Changeset> = client.query_history(&query).try_collect().await.unwrap();

        mock.assert_async().await;
        assert_eq!(changesets.len(), 2);
        assert_eq!(changesets[0].id, 1);
        assert_eq!(changesets[1].comment, "change 2");
    }

    #[tokio::test]
    async fn test_query_history_follows_full_pages() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", CHANGESETS_PATH)
            .match_query(Matcher::UrlEncoded("$skip".into(), "0".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(changesets_body(1..=256))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", CHANGESETS_PATH)
            .match_query(Matcher::UrlEncoded("$skip".into(), "256".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(changesets_body(257..=260))
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let query = history_query(None, 10_000);
        let changesets: Vec<Changeset> = client.query_history(&query).try_collect().await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(changesets.len(), 260);
        assert_eq!(changesets.last().map(|c| c.id), Some(260));
    }

    #[tokio::test]
    async fn test_query_history_stops_at_max_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", CHANGESETS_PATH)
            .match_query(Matcher::UrlEncoded("$top".into(), "3".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(changesets_body(1..=3))
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let query = history_query(None, 3);
        let changesets: Vec<Changeset> = client.query_history(&query).try_collect().await.unwrap();

        mock.assert_async().await;
        assert_eq!(changesets.len(), 3);
    }

    #[tokio::test]
    async fn test_query_history_rejects_change_details() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server);
        let mut query = history_query(None, 10);
        query.include_changes = true;

        let result: Result<Vec<Changeset>> = client.query_history(&query).try_collect().await;

        assert!(matches!(result, Err(TfsError::Config(_))));
    }

    #[tokio::test]
    async fn test_query_history_rejects_deleted_items() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server);
        let mut query = history_query(None, 10);
        query.deletion_id = 12;

        let result: Result<Vec<Changeset>> = client.query_history(&query).try_collect().await;

        assert!(matches!(result, Err(TfsError::Config(_))));
    }

    #[test]
    fn test_history_params_descending_without_author() {
        let mut query = history_query(None, 10_000);
        query.sort_ascending = false;

        let params = TfsClient::history_params(&query, 0, 256);

        assert!(params.contains(&("$orderby", "id desc".to_string())));
        assert!(params.iter().all(|(k, _)| *k != "searchCriteria.author"));
        assert!(params.iter().all(|(k, _)| *k != "searchCriteria.toDate"));
    }

    #[test]
    fn test_history_params_send_dates_with_offset() {
        let mut query = history_query(None, 10_000);
        query.to_date = Some(
            FixedOffset::west_opt(5 * 3600)
                .unwrap()
                .with_ymd_and_hms(2017, 3, 3, 18, 0, 0)
                .unwrap(),
        );

        let params = TfsClient::history_params(&query, 0, 256);

        assert!(params.contains(&(
            "searchCriteria.fromDate",
            "2017-02-01T00:00:00+01:00".to_string()
        )));
        assert!(params.contains(&(
            "searchCriteria.toDate",
            "2017-03-03T18:00:00-05:00".to_string()
        )));
    }
}
