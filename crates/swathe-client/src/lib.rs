#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
//! `reqwest` implementation of the list and mutation backends.
//!
//! - `GET /v1/torrents` serves pages (`search`, `filter.<name>`, `sort`, `order`, `offset`, `limit`).
//! - `POST /v1/torrents/bulk` accepts an action descriptor and returns a mutation report.
//! - Every request carries a fresh `x-request-id`; `409` maps to an addressing conflict.

pub mod error;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use swathe_api_models::{ActionDescriptor, ListResponse, MutationReport, ProblemDetails};
use swathe_core::{BackendError, ListBackend, MutationBackend, Page, Query};
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

pub use error::{ClientError, ClientResult};

/// Header carrying the API key.
pub const HEADER_API_KEY: &str = "x-swathe-api-key";
/// Header carrying the per-request correlation id.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

const LIST_PATH: &str = "v1/torrents";
const BULK_PATH: &str = "v1/torrents/bulk";

/// HTTP backend bound to one API base URL.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    /// Backend for `base_url`, authenticating with `api_key` when given.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the URL is unusable, the key is not a valid header value, or
    /// the underlying client cannot be built.
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> ClientResult<Self> {
        let mut base_url = Url::parse(base_url).map_err(|source| ClientError::InvalidUrl {
            url: base_url.to_string(),
            source: Some(source),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: base_url.to_string(),
                source: None,
            });
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.map(str::trim).filter(|key| !key.is_empty()) {
            let value = HeaderValue::from_str(key).map_err(|_| ClientError::InvalidApiKey)?;
            headers.insert(HEADER_API_KEY, value);
        }
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| ClientError::Build { source })?;
        Ok(Self { client, base_url })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url.join(path).map_err(|err| BackendError::Rejected {
            status: 0,
            detail: format!("invalid endpoint '{path}': {err}"),
        })
    }

    fn list_url(&self, query: &Query, offset: usize, limit: usize) -> Result<Url, BackendError> {
        let mut url = self.endpoint(LIST_PATH)?;
        {
            let mut pairs = url.query_pairs_mut();
            if !query.search.is_empty() {
                pairs.append_pair("search", &query.search);
            }
            for (name, value) in &query.filters {
                pairs.append_pair(&format!("filter.{name}"), value);
            }
            pairs
                .append_pair("sort", &query.sort.field)
                .append_pair("order", query.sort.direction.as_str())
                .append_pair("offset", &offset.to_string())
                .append_pair("limit", &limit.to_string());
        }
        Ok(url)
    }

    async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
        let request_id = Uuid::new_v4().to_string();
        debug!(request_id = %request_id, "sending API request");
        let response = request
            .header(HEADER_REQUEST_ID, request_id)
            .send()
            .await
            .map_err(BackendError::network)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(classify_problem(response).await)
        }
    }
}

#[async_trait(?Send)]
impl ListBackend for HttpBackend {
    #[instrument(skip(self, query), fields(search = %query.search))]
    async fn fetch_page(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> Result<Page, BackendError> {
        let url = self.list_url(query, offset, limit)?;
        let response = Self::send(self.client.get(url)).await?;
        let body: ListResponse = response.json().await.map_err(decode)?;
        Ok(Page::from_response(body, offset))
    }
}

#[async_trait(?Send)]
impl MutationBackend for HttpBackend {
    #[instrument(skip_all, fields(action = descriptor.action.verb(), select_all = descriptor.select_all))]
    async fn submit(&self, descriptor: &ActionDescriptor) -> Result<MutationReport, BackendError> {
        let url = self.endpoint(BULK_PATH)?;
        let response = Self::send(self.client.post(url).json(descriptor)).await?;
        response.json().await.map_err(decode)
    }
}

fn decode(err: reqwest::Error) -> BackendError {
    BackendError::Decode {
        source: Box::new(err),
    }
}

/// Map a non-success response to a backend error, preferring problem-details text.
async fn classify_problem(response: Response) -> BackendError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let problem = serde_json::from_slice::<ProblemDetails>(&bytes).ok();
    let detail = problem
        .as_ref()
        .and_then(|problem| problem.detail.clone())
        .or_else(|| problem.as_ref().map(|problem| problem.title.clone()))
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            if text.is_empty() {
                format!("request failed with status {status}")
            } else {
                text
            }
        });

    if status == StatusCode::CONFLICT {
        BackendError::Conflict { detail }
    } else {
        BackendError::Rejected {
            status: status.as_u16(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use serde_json::json;
    use swathe_api_models::{BulkAction, ItemKey, SortSpec};

    fn backend_for(server: &MockServer, api_key: Option<&str>) -> Result<HttpBackend> {
        Ok(HttpBackend::new(
            &server.base_url(),
            api_key,
            Duration::from_secs(5),
        )?)
    }

    #[tokio::test]
    async fn list_request_encodes_query_and_decodes_page() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/torrents")
                .query_param("search", "linux")
                .query_param("filter.state", "seeding")
                .query_param("sort", "added_at")
                .query_param("order", "desc")
                .query_param("offset", "100")
                .query_param("limit", "50")
                .header("x-swathe-api-key", "secret")
                .header_exists("x-request-id");
            then.status(200).json_body(json!({
                "items": [{ "hash": "aa", "name": "debian.iso" }],
                "totalCount": 101
            }));
        });

        let backend = backend_for(&server, Some("secret"))?;
        let query = Query::default()
            .with_search("linux")
            .with_filter("state", Some("seeding"))
            .with_sort(SortSpec::desc("added_at"));
        let page = backend.fetch_page(&query, 100, 50).await?;

        mock.assert();
        assert_eq!(page.offset, 100);
        assert_eq!(page.total_count, 101);
        assert_eq!(page.items[0].text("name"), Some("debian.iso"));
        Ok(())
    }

    #[tokio::test]
    async fn bulk_request_posts_descriptor() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v1/torrents/bulk").json_body(json!({
                "action": "pause",
                "hashes": ["aa", "bb"],
                "selectAll": false
            }));
            then.status(200).json_body(json!({
                "succeeded": 1,
                "failed": [{ "hash": "bb", "message": "locked" }]
            }));
        });

        let backend = backend_for(&server, None)?;
        let descriptor = ActionDescriptor::explicit(
            BulkAction::Pause,
            vec![ItemKey::from("aa"), ItemKey::from("bb")],
        );
        let report = backend.submit(&descriptor).await?;

        mock.assert();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed[0].hash, ItemKey::from("bb"));
        Ok(())
    }

    #[tokio::test]
    async fn conflict_maps_to_addressing_conflict() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/torrents/bulk");
            then.status(409).json_body(json!({
                "type": "https://swathe.dev/problems/selection-conflict",
                "title": "selection conflict",
                "status": 409,
                "detail": "matching set changed"
            }));
        });

        let backend = backend_for(&server, None)?;
        let descriptor = ActionDescriptor::all_matching(
            BulkAction::Remove { delete_data: false },
            Default::default(),
            String::new(),
            vec![],
        );
        let err = backend.submit(&descriptor).await.unwrap_err();
        assert!(
            matches!(err, BackendError::Conflict { ref detail } if detail == "matching set changed")
        );
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_are_rejections_with_body_text() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/v1/torrents");
            then.status(503).body("maintenance");
        });

        let backend = backend_for(&server, None)?;
        let err = backend
            .fetch_page(&Query::default(), 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::Rejected { status: 503, ref detail } if detail == "maintenance"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/v1/torrents");
            then.status(200).body("not json");
        });

        let backend = backend_for(&server, None)?;
        let err = backend
            .fetch_page(&Query::default(), 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode { .. }));
        Ok(())
    }

    #[test]
    fn base_url_keeps_its_path_prefix() -> Result<()> {
        let backend = HttpBackend::new("http://localhost:7070/api", None, Duration::from_secs(1))?;
        let url = backend.list_url(&Query::default(), 0, 10)?;
        assert_eq!(url.path(), "/api/v1/torrents");
        assert_eq!(
            url.query(),
            Some("sort=name&order=asc&offset=0&limit=10")
        );
        Ok(())
    }

    #[test]
    fn unusable_inputs_are_rejected() {
        assert!(matches!(
            HttpBackend::new("not a url", None, Duration::from_secs(1)),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(matches!(
            HttpBackend::new("mailto:ops@example.com", None, Duration::from_secs(1)),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(matches!(
            HttpBackend::new("http://localhost", Some("bad\nkey"), Duration::from_secs(1)),
            Err(ClientError::InvalidApiKey)
        ));
    }
}
