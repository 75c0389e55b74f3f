use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use karten_core::SyncConfig;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::source::clean_reference;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("sync is not configured: {0}")]
    NotConfigured(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0} changed on the remote since it was last pulled")]
    Conflict(String),

    #[error("{0} does not exist on the remote")]
    NotFound(String),

    #[error("remote answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote content is not valid: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub content: String,
    /// Version token; must accompany the next update of this file.
    pub sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    content: UpdatedContent,
}

#[derive(Debug, Deserialize)]
struct UpdatedContent {
    sha: String,
}

/// GitHub Contents API client for the topic list and deck files.
pub struct GithubSync {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
    branch: String,
    token: String,
}

impl GithubSync {
    /// Reads the access token from the environment variable named in the config.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| SyncError::NotConfigured(format!("missing {} environment variable", config.token_env)))?;
        Self::new(config, token)
    }

    pub fn new(config: &SyncConfig, token: String) -> Result<Self, SyncError> {
        if config.owner.trim().is_empty() || config.repo.trim().is_empty() {
            return Err(SyncError::NotConfigured("owner and repo are required".to_string()));
        }
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token,
        })
    }

    pub fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            self.owner,
            self.repo,
            clean_reference(path)
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "karten")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    pub fn fetch(&self, path: &str) -> Result<RemoteFile, SyncError> {
        let url = format!("{}?ref={}", self.contents_url(path), self.branch);
        let response = self.request(Method::GET, &url).send()?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let contents: ContentsResponse = response.json()?;
        Ok(RemoteFile {
            content: decode_content(&contents.content)?,
            sha: contents.sha,
        })
    }

    /// Writes `content` to `path`. `sha` is the token from the last fetch of
    /// the file (`None` for a new file); a stale token is a conflict.
    pub fn update(&self, path: &str, content: &str, sha: Option<&str>, message: &str) -> Result<String, SyncError> {
        let payload = UpdateRequest {
            message,
            content: STANDARD.encode(content),
            sha,
            branch: &self.branch,
        };
        let response = self
            .request(Method::PUT, &self.contents_url(path))
            .json(&payload)
            .send()?;
        let status = response.status();
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(SyncError::Conflict(path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let updated: UpdateResponse = response.json()?;
        info!(path, sha = %updated.content.sha, "pushed file");
        Ok(updated.content.sha)
    }
}

/// GitHub wraps base64 content at 60 columns.
pub fn decode_content(raw: &str) -> Result<String, SyncError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|err| SyncError::Decode(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| SyncError::Decode(err.to_string()))
}
