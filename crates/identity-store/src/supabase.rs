//! Supabase PostgREST identity store.
//!
//! Tables (all keyed by `app_id`):
//! - `profiles`  private profiles, primary key `(app_id, id)`
//! - `directory` public entries, primary key `(app_id, id)`
//! - `messages`  channel messages; `id` and `sent_at` default server-side
//!
//! `last_seen_at` is refreshed by the `touch_last_seen(p_app_id, p_user_id)`
//! RPC, which updates both tables and returns the new timestamp.
//!
//! Live queries poll: one task per subscription, which re-reads the query
//! every poll interval, forwards the result when it changed and exits as
//! soon as the subscription is closed or dropped.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{StoreError, StoreResult};
use crate::live::LiveSubscription;
use crate::path::DocumentPath;
use crate::store::IdentityStore;
use crate::types::{
    AppId, ChannelId, Identity, IdentityId, Message, MessageId, NewMessage, ProfileDraft,
    ServerTimestamp, Snapshot,
};

const IDENTITY_COLUMNS: &str = "id,display_name,phone,last_seen_at,avatar_tag";
const MESSAGE_COLUMNS: &str = "id,sender_id,text,sent_at";

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Supplies the bearer token for row-level-security checks.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> StoreResult<String>;
}

/// A fixed access token.
pub struct StaticAccessToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticAccessToken {
    async fn access_token(&self) -> StoreResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct IdentityRow {
    id: String,
    display_name: String,
    phone: String,
    last_seen_at: DateTime<Utc>,
    avatar_tag: String,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Identity {
            id: IdentityId::from(row.id),
            display_name: row.display_name,
            phone: row.phone,
            last_seen_at: ServerTimestamp::from_datetime(row.last_seen_at),
            avatar_tag: row.avatar_tag,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageRow {
    id: String,
    sender_id: String,
    text: String,
    sent_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: MessageId::from(row.id),
            text: row.text,
            sender_id: IdentityId::from(row.sender_id),
            sent_at: ServerTimestamp::from_datetime(row.sent_at),
        }
    }
}

#[derive(Debug, Serialize)]
struct ProfileUpsert<'a> {
    app_id: &'a str,
    id: &'a str,
    display_name: &'a str,
    phone: &'a str,
    avatar_tag: &'a str,
}

#[derive(Debug, Serialize)]
struct DirectoryUpsert<'a> {
    app_id: &'a str,
    id: &'a str,
    display_name: &'a str,
    phone: &'a str,
    avatar_tag: &'a str,
    last_seen_at: String,
}

#[derive(Debug, Serialize)]
struct MessageInsert<'a> {
    app_id: &'a str,
    channel_id: &'a str,
    sender_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct TouchLastSeenRequest<'a> {
    p_app_id: &'a str,
    p_user_id: &'a str,
}

/// Identity store backed by Supabase PostgREST.
#[derive(Clone)]
pub struct SupabaseIdentityStore {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
    tokens: Arc<dyn AccessTokenSource>,
    poll_interval: Duration,
}

impl SupabaseIdentityStore {
    /// Create a new store client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `publishable_key` - The Supabase publishable API key
    /// * `tokens` - Source of the signed-in user's access token
    /// * `poll_interval` - How often live queries re-read their result
    pub fn new(
        api_url: impl Into<String>,
        publishable_key: impl Into<String>,
        tokens: Arc<dyn AccessTokenSource>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            publishable_key: publishable_key.into(),
            tokens,
            poll_interval,
        }
    }

    /// Build the REST API URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    async fn request(&self, method: reqwest::Method, url: &str) -> StoreResult<reqwest::RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(self
            .http_client
            .request(method, url)
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/json"))
    }

    /// Turns a non-success response into a store error.
    async fn check(response: reqwest::Response, action: &str, write: bool) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let body_summary = summarize_response_body(&body);
        tracing::error!(status = %status, body_summary = %body_summary, "Failed to {}", action);

        let detail = format!("Failed to {}: {} ({})", action, status, body_summary);
        if status == reqwest::StatusCode::NOT_FOUND {
            Err(StoreError::NotFound(detail))
        } else if write && status.is_client_error() {
            Err(StoreError::WriteRejected(detail))
        } else {
            Err(StoreError::Unavailable(detail))
        }
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
        action: &str,
    ) -> StoreResult<Vec<T>> {
        let response = self
            .request(reqwest::Method::GET, &self.rest_url(table))
            .await?
            .query(query)
            .send()
            .await?;
        let response = Self::check(response, action, false).await?;
        Ok(response.json().await?)
    }

    async fn fetch_directory(&self, app: &AppId) -> StoreResult<Vec<Identity>> {
        let rows: Vec<IdentityRow> = self
            .select(
                "directory",
                &[
                    ("app_id", format!("eq.{}", app)),
                    ("select", IDENTITY_COLUMNS.to_string()),
                    ("order", "id.asc".to_string()),
                ],
                "fetch directory",
            )
            .await?;
        Ok(rows.into_iter().map(Identity::from).collect())
    }

    async fn fetch_messages(&self, app: &AppId, channel: &ChannelId) -> StoreResult<Vec<Message>> {
        let rows: Vec<MessageRow> = self
            .select(
                "messages",
                &[
                    ("app_id", format!("eq.{}", app)),
                    ("channel_id", format!("eq.{}", channel)),
                    ("select", MESSAGE_COLUMNS.to_string()),
                    ("order", "sent_at.asc,id.asc".to_string()),
                ],
                "fetch messages",
            )
            .await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    /// Spawns the polling task behind a live query.
    fn spawn_poller<T, F, Fut>(&self, path: DocumentPath, fetch: F) -> LiveSubscription<T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(SupabaseIdentityStore) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = StoreResult<Vec<T>>> + Send,
    {
        let key = path.to_string();
        let (sender, subscription) = LiveSubscription::channel(key.clone());
        let store = self.clone();
        let interval = self.poll_interval;

        tokio::spawn(async move {
            tracing::debug!(path = %key, "live query poller started");
            poll_loop(store, sender, interval, &key, fetch).await;
            tracing::debug!(path = %key, "live query poller stopped");
        });

        subscription
    }
}

async fn poll_loop<T, F, Fut>(
    store: SupabaseIdentityStore,
    sender: UnboundedSender<Snapshot<T>>,
    interval: Duration,
    key: &str,
    fetch: F,
) where
    T: Clone + PartialEq,
    F: Fn(SupabaseIdentityStore) -> Fut,
    Fut: std::future::Future<Output = StoreResult<Vec<T>>>,
{
    let mut last: Option<Vec<T>> = None;
    let mut sequence = 0u64;

    loop {
        match fetch(store.clone()).await {
            Ok(items) => {
                if last.as_ref() != Some(&items) {
                    sequence += 1;
                    tracing::debug!(path = %key, sequence, items = items.len(), "live query changed");
                    if sender.send(Snapshot::new(sequence, items.clone())).is_err() {
                        return;
                    }
                    last = Some(items);
                }
            }
            Err(e) => {
                tracing::warn!(path = %key, error = %e, transient = e.is_transient(), "live query poll failed");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = sender.closed() => return,
        }
    }
}

#[async_trait]
impl IdentityStore for SupabaseIdentityStore {
    async fn get_profile(&self, app: &AppId, user: &IdentityId) -> StoreResult<Option<Identity>> {
        let path = DocumentPath::profile(app, user)?;
        tracing::debug!(path = %path, "Fetching profile from Supabase");

        let rows: Vec<IdentityRow> = self
            .select(
                "profiles",
                &[
                    ("app_id", format!("eq.{}", app)),
                    ("id", format!("eq.{}", user)),
                    ("select", IDENTITY_COLUMNS.to_string()),
                    ("limit", "1".to_string()),
                ],
                "fetch profile",
            )
            .await?;
        Ok(rows.into_iter().next().map(Identity::from))
    }

    async fn upsert_profile(&self, app: &AppId, draft: &ProfileDraft) -> StoreResult<Identity> {
        let path = DocumentPath::profile(app, &draft.id)?;
        let body = ProfileUpsert {
            app_id: app.as_str(),
            id: draft.id.as_str(),
            display_name: &draft.display_name,
            phone: &draft.phone,
            avatar_tag: &draft.avatar_tag,
        };

        tracing::debug!(path = %path, "Upserting profile in Supabase");

        let response = self
            .request(reqwest::Method::POST, &self.rest_url("profiles"))
            .await?
            .query(&[("select", IDENTITY_COLUMNS)])
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, "upsert profile", true).await?;

        let rows: Vec<IdentityRow> = response.json().await?;
        let identity = rows
            .into_iter()
            .next()
            .map(Identity::from)
            .ok_or_else(|| StoreError::WriteRejected(format!("no row returned for {}", path)))?;

        tracing::info!(user_id = %identity.id, "Profile stored in Supabase");
        Ok(identity)
    }

    async fn upsert_directory_entry(&self, app: &AppId, identity: &Identity) -> StoreResult<()> {
        let path = DocumentPath::directory_entry(app, &identity.id)?;
        let body = DirectoryUpsert {
            app_id: app.as_str(),
            id: identity.id.as_str(),
            display_name: &identity.display_name,
            phone: &identity.phone,
            avatar_tag: &identity.avatar_tag,
            last_seen_at: identity.last_seen_at.as_datetime().to_rfc3339(),
        };

        tracing::debug!(path = %path, "Upserting directory entry in Supabase");

        let response = self
            .request(reqwest::Method::POST, &self.rest_url("directory"))
            .await?
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await?;
        Self::check(response, "upsert directory entry", true).await?;
        Ok(())
    }

    async fn subscribe_directory(&self, app: &AppId) -> StoreResult<LiveSubscription<Identity>> {
        let path = DocumentPath::directory(app)?;
        let app = app.clone();
        Ok(self.spawn_poller(path, move |store: SupabaseIdentityStore| {
            let app = app.clone();
            async move { store.fetch_directory(&app).await }
        }))
    }

    async fn append_message(
        &self,
        app: &AppId,
        channel: &ChannelId,
        message: NewMessage,
    ) -> StoreResult<Message> {
        let path = DocumentPath::messages(app, channel)?;
        let body = MessageInsert {
            app_id: app.as_str(),
            channel_id: channel.as_str(),
            sender_id: message.sender_id.as_str(),
            text: &message.text,
        };

        tracing::debug!(path = %path, "Appending message in Supabase");

        let response = self
            .request(reqwest::Method::POST, &self.rest_url("messages"))
            .await?
            .query(&[("select", MESSAGE_COLUMNS)])
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, "append message", true).await?;

        let rows: Vec<MessageRow> = response.json().await?;
        rows.into_iter()
            .next()
            .map(Message::from)
            .ok_or_else(|| StoreError::WriteRejected(format!("no row returned for {}", path)))
    }

    async fn subscribe_messages(
        &self,
        app: &AppId,
        channel: &ChannelId,
    ) -> StoreResult<LiveSubscription<Message>> {
        let path = DocumentPath::messages(app, channel)?;
        let app = app.clone();
        let channel = channel.clone();
        Ok(self.spawn_poller(path, move |store: SupabaseIdentityStore| {
            let app = app.clone();
            let channel = channel.clone();
            async move { store.fetch_messages(&app, &channel).await }
        }))
    }

    async fn touch_last_seen(&self, app: &AppId, user: &IdentityId) -> StoreResult<ServerTimestamp> {
        let path = DocumentPath::profile(app, user)?;
        let body = TouchLastSeenRequest {
            p_app_id: app.as_str(),
            p_user_id: user.as_str(),
        };

        let response = self
            .request(reqwest::Method::POST, &self.rest_url("rpc/touch_last_seen"))
            .await?
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, "touch last seen", true).await?;

        let at: Option<DateTime<Utc>> = response.json().await?;
        at.map(ServerTimestamp::from_datetime)
            .ok_or(StoreError::NotFound(path.to_string()))
    }
}
