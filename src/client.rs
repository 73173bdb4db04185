//! HTTP client for the remote share metadata/content service.
//!
//! All status-code and error-envelope interpretation happens here, once,
//! at the boundary: callers only ever see typed [`TransferError`]
//! variants and decoded response bodies.

use crate::config::RemoteConfig;
use crate::error::{Error, Result, TransferError};
use crate::types::{NodeAttributes, NodeId};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// One page of a directory listing.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenPage {
    /// Child entries of this page
    #[serde(default)]
    pub children: Vec<ChildEntry>,
    /// Continuation token for the next page, when there is one
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Whether this is the final page
    #[serde(default)]
    pub is_last: Option<bool>,
}

/// One child entry of a directory listing.
#[derive(Clone, Debug, Deserialize)]
pub struct ChildEntry {
    /// Node ID of the child (some service versions emit `file_id`)
    #[serde(alias = "file_id", alias = "fileId")]
    pub id: NodeId,
    /// Child name, when the service includes it in the listing
    #[serde(default)]
    pub name: Option<String>,
}

/// Reply to a content request.
pub enum ContentReply {
    /// Success: the body can be streamed
    Stream(reqwest::Response),
    /// HTTP 416 — the requested byte range starts at or past the end of
    /// the resource
    RangeNotSatisfiable,
}

/// Error envelope the service returns on content failures:
/// `{"error": {"details": {"errno": "eacces"}}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    details: Option<ErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    #[serde(default)]
    errno: Option<String>,
}

/// Client for the remote share service.
#[derive(Clone)]
pub struct ShareClient {
    http: reqwest::Client,
    base: Url,
    request_timeout: Duration,
}

impl ShareClient {
    /// Build a client for the configured service endpoint.
    pub fn new(remote: &RemoteConfig) -> Result<Self> {
        let mut base = Url::parse(&remote.base_url).map_err(|e| {
            Error::config(
                "base_url",
                format!("invalid base URL '{}': {}", remote.base_url, e),
            )
        })?;
        // API paths are appended textually below, so the base must end
        // with a slash even when it carries a path component.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        // Content responses stream for as long as the file is large, so
        // only the connect phase gets a hard timeout here; metadata
        // requests apply the full request timeout individually.
        let http = reqwest::Client::builder()
            .connect_timeout(remote.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base,
            request_timeout: remote.request_timeout,
        })
    }

    fn data_url(&self, id: &NodeId, tail: &str) -> String {
        format!(
            "{}api/v3/onezone/shares/data/{}{}",
            self.base,
            urlencoding::encode(id.as_str()),
            tail
        )
    }

    /// Fetch the basic attributes of a node.
    pub async fn node_attributes(
        &self,
        id: &NodeId,
    ) -> std::result::Result<NodeAttributes, TransferError> {
        let response = self
            .http
            .get(self.data_url(id, ""))
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }
        Ok(response.json::<NodeAttributes>().await?)
    }

    /// Fetch one page of a directory listing.
    pub async fn children_page(
        &self,
        id: &NodeId,
        token: Option<&str>,
    ) -> std::result::Result<ChildrenPage, TransferError> {
        let mut request = self
            .http
            .get(self.data_url(id, "/children"))
            .timeout(self.request_timeout);
        if let Some(token) = token {
            request = request.query(&[("token", token)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }
        Ok(response.json::<ChildrenPage>().await?)
    }

    /// List every child of a directory, following pagination until the
    /// service reports the last page (or stops returning a token).
    pub async fn list_children(
        &self,
        id: &NodeId,
    ) -> std::result::Result<Vec<ChildEntry>, TransferError> {
        let mut children = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.children_page(id, token.as_deref()).await?;
            children.extend(page.children);

            if page.is_last.unwrap_or(false) {
                break;
            }
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        tracing::debug!(node_id = %id, count = children.len(), "listed children");
        Ok(children)
    }

    /// Request the content of a file node, optionally from a byte offset
    /// onward (`Range: bytes=offset-`).
    ///
    /// HTTP 416 is not an error here — it is part of the resume protocol
    /// and surfaced as [`ContentReply::RangeNotSatisfiable`].
    pub async fn content(
        &self,
        id: &NodeId,
        offset: Option<u64>,
    ) -> std::result::Result<ContentReply, TransferError> {
        let mut request = self.http.get(self.data_url(id, "/content"));
        if let Some(offset) = offset {
            request = request.header(reqwest::header::RANGE, format!("bytes={}-", offset));
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(ContentReply::RangeNotSatisfiable);
        }
        if !status.is_success() {
            return Err(classify_failure(response).await);
        }
        Ok(ContentReply::Stream(response))
    }
}

/// Decode a non-success response into a typed [`TransferError`].
///
/// The service's error envelope takes precedence; a plain status code is
/// the fallback for proxies and older service versions.
async fn classify_failure(response: reqwest::Response) -> TransferError {
    let status = response.status();

    if let Ok(body) = response.bytes().await
        && let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(&body)
        && let Some(errno) = envelope.error.details.and_then(|d| d.errno)
    {
        return match errno.as_str() {
            "eacces" | "eperm" => TransferError::PermissionDenied,
            "enoent" => TransferError::NotFound,
            _ => TransferError::Http(status.as_u16()),
        };
    }

    match status {
        reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::UNAUTHORIZED => {
            TransferError::PermissionDenied
        }
        reqwest::StatusCode::NOT_FOUND => TransferError::NotFound,
        other => TransferError::Http(other.as_u16()),
    }
}
