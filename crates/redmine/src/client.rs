use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::directory;
use crate::models::{Issue, IssueList, User, UserList};

const API_KEY_HEADER: &str = "X-Redmine-API-Key";

#[derive(Debug, Error)]
pub enum RedmineError {
    #[error("tracker api key cannot be used as a request header")]
    InvalidApiKey,
    #[error("could not build tracker http client: {source}")]
    BuildClient { source: reqwest::Error },
    #[error("tracker request `{operation}` failed: {source}")]
    Request { operation: &'static str, source: reqwest::Error },
    #[error("tracker request `{operation}` returned status {status}")]
    Status { operation: &'static str, status: StatusCode },
    #[error("tracker response for `{operation}` could not be decoded: {source}")]
    Decode { operation: &'static str, source: reqwest::Error },
}

/// Thin client for the two tracker endpoints the bot consumes.
///
/// Requests carry the static API key header and are bounded by the
/// configured timeout; neither endpoint is paginated, the full listing is
/// expected in a single response.
#[derive(Clone, Debug)]
pub struct RedmineClient {
    http: reqwest::Client,
    base_url: String,
}

impl RedmineClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: &SecretString,
        timeout: Duration,
    ) -> Result<Self, RedmineError> {
        let mut key_value = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|_| RedmineError::InvalidApiKey)?;
        key_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key_value);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| RedmineError::BuildClient { source })?;

        Ok(Self { http, base_url: base_url.into() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches the complete user listing.
    pub async fn list_users(&self) -> Result<Vec<User>, RedmineError> {
        const OPERATION: &str = "users.json";

        let url = format!("{}/users.json", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| RedmineError::Request { operation: OPERATION, source })?;

        if !response.status().is_success() {
            return Err(RedmineError::Status { operation: OPERATION, status: response.status() });
        }

        let listing: UserList = response
            .json()
            .await
            .map_err(|source| RedmineError::Decode { operation: OPERATION, source })?;
        Ok(listing.users)
    }

    /// Fetches every issue currently assigned to the given tracker user.
    pub async fn assigned_issues(&self, assignee_id: u32) -> Result<Vec<Issue>, RedmineError> {
        const OPERATION: &str = "issues.json";

        let url = format!("{}/issues.json", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("assigned_to_id", assignee_id)])
            .send()
            .await
            .map_err(|source| RedmineError::Request { operation: OPERATION, source })?;

        if !response.status().is_success() {
            return Err(RedmineError::Status { operation: OPERATION, status: response.status() });
        }

        let listing: IssueList = response
            .json()
            .await
            .map_err(|source| RedmineError::Decode { operation: OPERATION, source })?;
        Ok(listing.issues)
    }

    /// Looks up the tracker id for a chat display name, scanning a fresh
    /// listing. `Ok(None)` is the unknown-sender case, not an error.
    pub async fn resolve_user_id(&self, login: &str) -> Result<Option<u32>, RedmineError> {
        let users = self.list_users().await?;
        Ok(directory::find_user_id(&users, login))
    }
}
