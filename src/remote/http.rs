//! HTTP remote source: `GET {base}/nodes?parentId=&page=&pageSize=`

use super::RemoteSource;
use crate::error::FetchError;
use crate::types::{PageRequest, PageResponse};
use async_trait::async_trait;
use tracing::debug;

pub struct HttpRemoteSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn nodes_url(&self) -> String {
        format!("{}/nodes", self.base_url)
    }
}

/// Query pairs for a page request; roots are requested with an empty parent id
pub fn query_params(request: &PageRequest) -> Vec<(&'static str, String)> {
    vec![
        (
            "parentId",
            request
                .parent
                .as_ref()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
        ),
        ("page", request.page.to_string()),
        ("pageSize", request.page_size.to_string()),
    ]
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, FetchError> {
        let url = self.nodes_url();
        debug!(url = %url, parent = ?request.parent, page = request.page, "Fetching remote page");

        let response = self
            .client
            .get(&url)
            .query(&query_params(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
