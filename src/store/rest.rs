//! REST transport for the Azure Blob service.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::auth::SharedKeyCredential;
use crate::config::DEFAULT_API_VERSION;
use crate::error::StoreError;
use crate::store::{PageStore, PageWriteKind};

/// HTTP date format used by the `x-ms-date` header.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// [`PageStore`] implementation speaking the Azure Blob REST API.
pub struct RestPageStore {
    client: reqwest::Client,
    endpoint: Url,
    credential: SharedKeyCredential,
}

impl RestPageStore {
    /// Creates a store against the account's production endpoint
    /// (`https://{account}.blob.core.windows.net`).
    pub fn new(account: &str, key: &str) -> Result<Self, StoreError> {
        let endpoint = format!("https://{}.blob.core.windows.net", account)
            .parse()
            .map_err(|e| StoreError::Network(format!("invalid endpoint: {}", e)))?;
        Ok(Self::with_endpoint(endpoint, account, key))
    }

    /// Creates a store against an explicit endpoint, e.g. an emulator's
    /// path-style URL (`http://127.0.0.1:10000/devstoreaccount1`).
    pub fn with_endpoint(endpoint: Url, account: &str, key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            credential: SharedKeyCredential::new(account, key),
        }
    }

    /// Builds a request URL under the endpoint from path segments and query
    /// parameters. Segments are percent-encoded by the `Url` API.
    fn request_url(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut path = url
                .path_segments_mut()
                .expect("endpoint is always a base URL");
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        for (key, value) in query {
            url.query_pairs_mut().append_pair(key, value);
        }
        url
    }

    /// Standing `x-ms-*` headers every request carries, plus per-request
    /// extras.
    fn ms_headers(&self, extra: &[(&str, String)]) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert(
            "x-ms-date".to_string(),
            Utc::now().format(HTTP_DATE_FORMAT).to_string(),
        );
        headers.insert("x-ms-version".to_string(), DEFAULT_API_VERSION.to_string());
        headers.insert(
            "x-ms-client-request-id".to_string(),
            Uuid::new_v4().to_string(),
        );
        for (name, value) in extra {
            headers.insert((*name).to_string(), value.clone());
        }
        headers
    }

    /// Signs and sends a PUT request.
    async fn put(
        &self,
        url: Url,
        query: &[(&str, &str)],
        ms_headers: BTreeMap<String, String>,
        body: Option<Bytes>,
    ) -> Result<reqwest::Response, StoreError> {
        let content_length = body.as_ref().map(|b| b.len() as u64).unwrap_or(0);
        let authorization = self.credential.authorization(
            "PUT",
            url.path(),
            query,
            &ms_headers,
            content_length,
        )?;

        debug!("PUT {}", url);

        let mut request = self.client.put(url);
        for (name, value) in &ms_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = request.header(reqwest::header::AUTHORIZATION, authorization);
        request = match body {
            Some(body) => request.body(body),
            None => request.header(reqwest::header::CONTENT_LENGTH, "0"),
        };

        request
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
    }
}

/// Extracts the service's error code from a response, falling back to the
/// HTTP status line.
fn error_detail(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(|code| format!("{} ({})", code, response.status()))
        .unwrap_or_else(|| response.status().to_string())
}

#[async_trait]
impl PageStore for RestPageStore {
    async fn create_container(&self, container: &str) -> Result<(), StoreError> {
        let query = [("restype", "container")];
        let url = self.request_url(&[container], &query);
        let response = self.put(url, &query, self.ms_headers(&[]), None).await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::CONFLICT {
            Err(StoreError::AlreadyExists)
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(StoreError::Auth(error_detail(&response)))
        } else {
            Err(StoreError::Network(error_detail(&response)))
        }
    }

    async fn init_page_blob(
        &self,
        container: &str,
        blob: &str,
        size: u64,
    ) -> Result<(), StoreError> {
        let url = self.request_url(&[container, blob], &[]);
        let headers = self.ms_headers(&[
            ("x-ms-blob-type", "PageBlob".to_string()),
            ("x-ms-blob-content-length", size.to_string()),
        ]);
        let response = self.put(url, &[], headers, None).await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(StoreError::Auth(error_detail(&response)))
        } else {
            Err(StoreError::Network(error_detail(&response)))
        }
    }

    async fn write_pages(
        &self,
        container: &str,
        blob: &str,
        offset: u64,
        length: u64,
        payload: Option<Bytes>,
        kind: PageWriteKind,
    ) -> Result<(), StoreError> {
        let query = [("comp", "page")];
        let url = self.request_url(&[container, blob], &query);
        let range = format!("bytes={}-{}", offset, offset + length - 1);
        let headers = self.ms_headers(&[
            ("x-ms-page-write", kind.as_str().to_string()),
            ("x-ms-range", range),
        ]);

        let response = self
            .put(url, &query, headers, payload)
            .await
            .map_err(|e| match e {
                // A write that never reached the service is worth retrying.
                StoreError::Network(message) => StoreError::Transient(message),
                other => other,
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(StoreError::Auth(error_detail(&response)))
        } else {
            Err(StoreError::Transient(error_detail(&response)))
        }
    }
}
