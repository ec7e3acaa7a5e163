// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GitHub Releases feed.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Release, ReleaseAsset, ReleaseError, ReleaseSource};

/// Default GitHub REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 512;

/// Release source backed by the GitHub REST API.
pub struct GitHubReleaseSource {
    client: reqwest::Client,
    token: Option<String>,
    api_base: String,
}

impl GitHubReleaseSource {
    /// Create a client for the public GitHub API.
    pub fn new(token: Option<String>) -> Result<Self, ReleaseError> {
        let client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .user_agent(concat!("slotswap/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            token: token.filter(|t| !t.is_empty()),
            api_base: DEFAULT_API_URL.to_string(),
        })
    }

    /// Point the client at a different API base (GitHub Enterprise, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("token {}", token)),
            None => request,
        }
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleaseSource {
    fn source_type(&self) -> &'static str {
        "github"
    }

    async fn latest(&self, repo: &str) -> Result<Release, ReleaseError> {
        let url = format!("{}/repos/{}/releases/latest", self.api_base, repo);
        debug!(url = %url, "Fetching latest release");

        let response = self
            .authorize(self.client.get(&url))
            .header(ACCEPT, "application/vnd.github.v3+json")
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                return Err(ReleaseError::RateLimited);
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(ReleaseError::Http {
                    status: status.as_u16(),
                    body: truncate(body),
                });
            }
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ReleaseError::Decode(e.to_string()))
    }

    async fn download(&self, asset: &ReleaseAsset, dest: &Path) -> Result<(), ReleaseError> {
        debug!(
            asset = %asset.name,
            url = %asset.browser_download_url,
            dest = %dest.display(),
            "Downloading asset"
        );

        let mut response = self
            .authorize(self.client.get(&asset.browser_download_url))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ReleaseError::Http {
                status,
                body: truncate(body),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part = partial_path(dest);
        let result = async {
            let mut file = tokio::fs::File::create(&part).await?;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
            }
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&part, dest).await?;
            Ok::<(), ReleaseError>(())
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&part).await;
        }
        result
    }
}

/// Temporary path a download is written to before being moved into place.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}
