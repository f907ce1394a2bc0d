use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{Result, TfsError};

pub struct TfsClient {
    client: Client,
    collection_url: Url,
    token: Option<Token>,
}

impl TfsClient {
    pub fn new(collection_url: &Url, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("tfs-query/0.1.0")
            .build()
            .map_err(|e| TfsError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            collection_url: collection_url.clone(),
            token,
        })
    }

    pub fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    /// Personal access tokens travel as basic auth with an empty user name.
    fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.token {
            request.basic_auth("", Some(token.as_str()))
        } else {
            request
        }
    }

    /// Appends path segments to the collection URL, percent-encoding each one.
    pub(super) fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.collection_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                TfsError::Config(format!(
                    "Collection URI cannot carry a path: {}",
                    self.collection_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(super) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T> {
        debug!("GET {url} {query:?}");

        let request = self.auth_request(self.client.get(url).query(query));
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TfsError::Api(format!("{status} - {body}")));
        }

        Ok(response.json::<T>().await?)
    }
}
