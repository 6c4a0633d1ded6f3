//! REST directory client.
//!
//! Talks to a directory exposing `/login`, `/users/{id}` and the
//! `/groups/{id}/users` and `/groups/{id}/groups` membership collections.

use crate::client::MembershipClient;
use crate::config::HttpDirectoryConfig;
use crate::error::DirectoryError;
use crate::types::{Group, MemberKind, MembershipOperation, User};
use async_trait::async_trait;
use membersync_core::{GroupId, Result, UserId};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Tokens are refreshed this long before the directory says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the login response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_at
    }
}

/// HTTP implementation of [`MembershipClient`].
///
/// Cloning is cheap; clones share the HTTP connection pool and the cached
/// access token.
#[derive(Clone)]
pub struct HttpDirectoryClient {
    base_url: Url,
    config: Arc<HttpDirectoryConfig>,
    http: Client,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl HttpDirectoryClient {
    /// Creates a client with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: HttpDirectoryConfig) -> Result<Self, DirectoryError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DirectoryError::ConnectionFailed {
                details: e.to_string(),
            })?;
        Self::with_http_client(config, http)
    }

    /// Creates a client on top of an existing `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn with_http_client(
        config: HttpDirectoryConfig,
        http: Client,
    ) -> Result<Self, DirectoryError> {
        let base_url = Url::parse(config.base_url()).map_err(|e| {
            DirectoryError::ConnectionFailed {
                details: format!("invalid base URL '{}': {}", config.base_url(), e),
            }
        })?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::ConnectionFailed {
                details: format!("base URL '{}' cannot carry a path", config.base_url()),
            }
            .into());
        }

        Ok(Self {
            base_url,
            config: Arc::new(config),
            http,
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Builds an endpoint URL; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Returns a valid access token, logging in if the cached one is stale.
    async fn access_token(&self) -> Result<String, DirectoryError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.login().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    #[instrument(skip(self))]
    async fn login(&self) -> Result<AccessToken, DirectoryError> {
        let response = self
            .http
            .post(self.endpoint(&["login"]))
            .form(&[
                ("client_id", self.config.client_id()),
                ("client_secret", self.config.client_secret()),
            ])
            .send()
            .await
            .map_err(|e| DirectoryError::ConnectionFailed {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::AuthenticationFailed {
                details: describe_status(status, &body),
            }
            .into());
        }

        let login: LoginResponse =
            response
                .json()
                .await
                .map_err(|e| DirectoryError::InvalidResponse {
                    details: format!("login response: {e}"),
                })?;

        let lifetime = login
            .expires_in
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);

        debug!(expires_in_secs = lifetime.as_secs(), "logged in to directory");
        Ok(AccessToken {
            value: login.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        })
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Sends an authenticated request and maps non-success statuses.
    ///
    /// `subject` names the entity a 404 refers to; without it a 404 is a
    /// plain request failure.
    async fn send(
        &self,
        operation: MembershipOperation,
        request: RequestBuilder,
        subject: Option<(MemberKind, &str)>,
    ) -> Result<Response, DirectoryError> {
        let token = self.access_token().await?;
        let response = request
            .header(reqwest::header::AUTHORIZATION, format!("token {token}"))
            .send()
            .await
            .map_err(|e| DirectoryError::ConnectionFailed {
                details: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match (status, subject) {
            (StatusCode::NOT_FOUND, Some((kind, id))) => Err(DirectoryError::NotFound {
                kind,
                id: id.to_string(),
            }
            .into()),
            (StatusCode::UNAUTHORIZED, _) => {
                self.invalidate_token().await;
                Err(DirectoryError::AuthenticationFailed {
                    details: describe_status(status, &body),
                }
                .into())
            }
            _ => {
                if status == StatusCode::TOO_MANY_REQUESTS {
                    warn!(operation = %operation, "directory rate limited the request");
                }
                Err(DirectoryError::RequestFailed {
                    operation,
                    details: describe_status(status, &body),
                }
                .into())
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: MembershipOperation,
        url: Url,
        query: &[(&str, String)],
        subject: Option<(MemberKind, &str)>,
    ) -> Result<T, DirectoryError> {
        let response = self
            .send(operation, self.http.get(url).query(query), subject)
            .await?;
        response
            .json()
            .await
            .map_err(|e| {
                DirectoryError::InvalidResponse {
                    details: format!("{operation}: {e}"),
                }
                .into()
            })
    }
}

fn describe_status(status: StatusCode, body: &str) -> String {
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {body}")
    }
}

#[async_trait]
impl MembershipClient for HttpDirectoryClient {
    #[instrument(skip_all, fields(group_id = %group_id))]
    async fn list_group_users(
        &self,
        group_id: &GroupId,
    ) -> Result<BTreeSet<UserId>, DirectoryError> {
        let operation = MembershipOperation::ListGroupUsers;
        let url = self.endpoint(&["groups", group_id.as_str(), "users"]);
        let page_size = self.config.page_size();

        let mut user_ids = BTreeSet::new();
        for page in 0..self.config.max_pages() {
            let offset = u64::from(page) * u64::from(page_size);
            let batch: Vec<User> = self
                .get_json(
                    operation,
                    url.clone(),
                    &[("limit", page_size.to_string()), ("offset", offset.to_string())],
                    Some((MemberKind::Group, group_id.as_str())),
                )
                .await?;

            let received = batch.len();
            user_ids.extend(batch.into_iter().map(|user| user.id));
            if received < page_size as usize {
                debug!(count = user_ids.len(), pages = page + 1, "listed group users");
                return Ok(user_ids);
            }
        }

        // Every allowed page was full; only a further member means truncation.
        let offset = u64::from(self.config.max_pages()) * u64::from(page_size);
        let overflow: Vec<User> = self
            .get_json(
                operation,
                url,
                &[("limit", "1".to_string()), ("offset", offset.to_string())],
                Some((MemberKind::Group, group_id.as_str())),
            )
            .await?;
        if overflow.is_empty() {
            debug!(count = user_ids.len(), "listed group users at page limit");
            return Ok(user_ids);
        }

        Err(DirectoryError::ListingTruncated {
            group_id: group_id.to_string(),
            fetched: user_ids.len(),
        }
        .into())
    }

    #[instrument(skip_all, fields(group_id = %group_id))]
    async fn list_group_groups(
        &self,
        group_id: &GroupId,
    ) -> Result<BTreeSet<GroupId>, DirectoryError> {
        let groups: Vec<Group> = self
            .get_json(
                MembershipOperation::ListGroupGroups,
                self.endpoint(&["groups", group_id.as_str(), "groups"]),
                &[],
                Some((MemberKind::Group, group_id.as_str())),
            )
            .await?;

        let group_ids: BTreeSet<GroupId> = groups.into_iter().map(|group| group.id).collect();
        debug!(count = group_ids.len(), "listed group groups");
        Ok(group_ids)
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    async fn get_user(&self, user_id: &UserId) -> Result<User, DirectoryError> {
        self.get_json(
            MembershipOperation::GetUser,
            self.endpoint(&["users", user_id.as_str()]),
            &[],
            Some((MemberKind::User, user_id.as_str())),
        )
        .await
    }

    #[instrument(skip_all, fields(group_id = %group_id, user_id = %user_id))]
    async fn add_user_to_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), DirectoryError> {
        let request = self
            .http
            .post(self.endpoint(&["groups", group_id.as_str(), "users"]))
            .json(&serde_json::json!({ "user_id": user_id }));
        self.send(MembershipOperation::AddUserToGroup, request, None)
            .await?;

        debug!("user added to group");
        Ok(())
    }

    #[instrument(skip_all, fields(group_id = %group_id, member_group_id = %member_group_id))]
    async fn add_group_to_group(
        &self,
        group_id: &GroupId,
        member_group_id: &GroupId,
    ) -> Result<(), DirectoryError> {
        let request = self
            .http
            .post(self.endpoint(&["groups", group_id.as_str(), "groups"]))
            .json(&serde_json::json!({ "group_id": member_group_id }));
        self.send(MembershipOperation::AddGroupToGroup, request, None)
            .await?;

        debug!("group added to group");
        Ok(())
    }

    #[instrument(skip_all, fields(group_id = %group_id, user_id = %user_id))]
    async fn remove_user_from_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), DirectoryError> {
        let request = self.http.delete(self.endpoint(&[
            "groups",
            group_id.as_str(),
            "users",
            user_id.as_str(),
        ]));
        self.send(MembershipOperation::RemoveUserFromGroup, request, None)
            .await?;

        debug!("user removed from group");
        Ok(())
    }

    #[instrument(skip_all, fields(group_id = %group_id, member_group_id = %member_group_id))]
    async fn remove_group_from_group(
        &self,
        group_id: &GroupId,
        member_group_id: &GroupId,
    ) -> Result<(), DirectoryError> {
        let request = self.http.delete(self.endpoint(&[
            "groups",
            group_id.as_str(),
            "groups",
            member_group_id.as_str(),
        ]));
        self.send(MembershipOperation::RemoveGroupFromGroup, request, None)
            .await?;

        debug!("group removed from group");
        Ok(())
    }
}
