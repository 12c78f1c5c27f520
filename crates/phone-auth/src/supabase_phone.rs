//! Supabase phone-OTP challenge provider.
//!
//! - `POST /auth/v1/otp` sends the SMS code
//! - `POST /auth/v1/verify` with `type = "sms"` exchanges it for a session
//! - `GET /auth/v1/user` checks a restored session is still accepted
//! - `POST /auth/v1/token?grant_type=refresh_token` renews an expired one
//!
//! Access and refresh tokens go to the platform credential store through
//! [`SessionSecrets`]. `Paths::session_file()` only holds the user id, phone
//! and expiry, written atomically and readable by the owner alone.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chat_config_and_utils::{Config, Paths};
use chrono::{DateTime, Utc};
use identity_store::{AccessTokenSource, AppId, IdentityId, StoreError, StoreResult, SupabaseIdentityStore};
use reqwest::{Client, StatusCode};
use secure_storage::{SecureStorage, SessionSecrets, SessionTokens};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::controller::AuthController;
use crate::error::{AuthError, AuthResult};
use crate::provider::{AuthenticatedIdentity, Challenge, ChallengeHandle, ChallengeProvider};

/// Renew tokens this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Produces the anti-automation token sent with a code request.
///
/// Where it comes from (a captcha widget, an attestation service) is up to
/// the embedding application.
#[async_trait]
pub trait AntiAutomationProof: Send + Sync {
    async fn proof(&self, full_phone: &str) -> AuthResult<Option<String>>;
}

/// For projects with captcha protection disabled.
pub struct NoProof;

#[async_trait]
impl AntiAutomationProof for NoProof {
    async fn proof(&self, _full_phone: &str) -> AuthResult<Option<String>> {
        Ok(None)
    }
}

/// A token obtained ahead of time.
pub struct StaticProof(pub String);

#[async_trait]
impl AntiAutomationProof for StaticProof {
    async fn proof(&self, _full_phone: &str) -> AuthResult<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

/// Configuration for retry behavior during token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// The non-secret half of a session, kept in the session file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SessionMeta {
    user_id: String,
    phone: String,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
struct StoredSession {
    access_token: String,
    refresh_token: String,
    user_id: String,
    phone: String,
    expires_at: DateTime<Utc>,
}

impl StoredSession {
    fn from_parts(meta: SessionMeta, tokens: SessionTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user_id: meta.user_id,
            phone: meta.phone,
            expires_at: meta.expires_at,
        }
    }

    fn meta(&self) -> SessionMeta {
        SessionMeta {
            user_id: self.user_id.clone(),
            phone: self.phone.clone(),
            expires_at: self.expires_at,
        }
    }

    fn tokens(&self) -> SessionTokens {
        SessionTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now() + chrono::Duration::seconds(EXPIRY_MARGIN_SECS)
    }

    fn identity(&self) -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            id: IdentityId::from(self.user_id.as_str()),
            phone: self.phone.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CaptchaMeta<'a> {
    captcha_token: &'a str,
}

#[derive(Debug, Serialize)]
struct OtpRequest<'a> {
    phone: &'a str,
    create_user: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    gotrue_meta_security: Option<CaptchaMeta<'a>>,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    phone: &'a str,
    token: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Supabase token response (verify and refresh).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: UserResponse,
}

/// Supabase user response.
#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    phone: Option<String>,
}

/// Shared pieces used by the provider and its challenge handles.
struct SessionBackend {
    http_client: Client,
    supabase_url: String,
    publishable_key: String,
    session_file: PathBuf,
    secrets: SessionSecrets,
    session: Mutex<Option<StoredSession>>,
    refresh_config: RefreshConfig,
}

impl SessionBackend {
    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.supabase_url, endpoint)
    }

    fn current(&self) -> Option<StoredSession> {
        self.session.lock().expect("lock poisoned").clone()
    }

    fn store_session(&self, session: StoredSession) -> AuthResult<()> {
        self.secrets.store(&session.tokens())?;
        write_session_meta(&self.session_file, &session.meta())?;
        *self.session.lock().expect("lock poisoned") = Some(session);
        Ok(())
    }

    /// The persisted session, if both the file and the tokens are present.
    fn load_session(&self) -> AuthResult<Option<StoredSession>> {
        let Some(meta) = read_session_meta(&self.session_file)? else {
            return Ok(None);
        };
        let Some(tokens) = self.secrets.load()? else {
            warn!(user_id = %meta.user_id, "Session file without stored tokens, discarding");
            self.clear_session()?;
            return Ok(None);
        };
        Ok(Some(StoredSession::from_parts(meta, tokens)))
    }

    fn clear_session(&self) -> AuthResult<()> {
        *self.session.lock().expect("lock poisoned") = None;
        self.secrets.clear()?;
        match std::fs::remove_file(&self.session_file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn session_from_tokens(&self, data: TokenResponse, fallback_phone: &str) -> StoredSession {
        StoredSession {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            user_id: data.user.id,
            phone: data
                .user
                .phone
                .filter(|p| !p.is_empty())
                .map(|p| if p.starts_with('+') { p } else { format!("+{}", p) })
                .unwrap_or_else(|| fallback_phone.to_string()),
            expires_at: Utc::now() + chrono::Duration::seconds(data.expires_in),
        }
    }

    /// Single attempt to refresh the session.
    async fn try_refresh(&self, session: &StoredSession) -> AuthResult<StoredSession> {
        let url = format!("{}?grant_type=refresh_token", self.auth_url("token"));
        debug!(url = %url, "Refreshing token");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&RefreshRequest {
                refresh_token: &session.refresh_token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body_len = body.len(), "Token refresh failed");
            if status.is_server_error() {
                return Err(AuthError::AuthProvider(format!("token refresh: HTTP {}", status)));
            }
            return Err(AuthError::NotReady(format!(
                "refresh token rejected: HTTP {}",
                status
            )));
        }

        let data: TokenResponse = response.json().await?;
        let refreshed = self.session_from_tokens(data, &session.phone);
        self.store_session(refreshed.clone())?;

        info!(user_id = %refreshed.user_id, "Token refreshed successfully");
        Ok(refreshed)
    }

    /// Refreshes with exponential backoff on transient failures.
    async fn refresh_with_backoff(&self, session: &StoredSession) -> AuthResult<StoredSession> {
        let mut attempt = 0;
        loop {
            match self.try_refresh(session).await {
                Ok(refreshed) => return Ok(refreshed),
                Err(e) if retryable(&e) && attempt < self.refresh_config.max_retries => {
                    let delay = self.refresh_config.delay_for_attempt(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying token refresh");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Returns the user ID if the server still accepts the token.
    async fn verify_with_server(&self, access_token: &str) -> AuthResult<Option<String>> {
        let url = self.auth_url("user");
        debug!(url = %url, "Verifying session with Supabase");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = %status, "Server rejected stored session");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AuthError::AuthProvider(format!(
                "session verification: HTTP {}",
                status
            )));
        }

        let user: UserResponse = response.json().await?;
        Ok(Some(user.id))
    }

    /// A usable session, refreshed if it is about to expire.
    async fn valid_session(&self) -> AuthResult<Option<StoredSession>> {
        let Some(session) = self.current() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        match self.refresh_with_backoff(&session).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(AuthError::NotReady(reason)) => {
                warn!(reason = %reason, "Dropping session that can no longer be refreshed");
                self.clear_session()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn retryable(error: &AuthError) -> bool {
    error.is_transient() || matches!(error, AuthError::AuthProvider(_))
}

fn read_session_meta(path: &Path) -> AuthResult<Option<SessionMeta>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_session_meta(path: &Path, meta: &SessionMeta) -> AuthResult<()> {
    write_private_file(path, &serde_json::to_string_pretty(meta)?)?;
    Ok(())
}

/// Replaces `path` with `content` through a sibling temp file and a rename.
///
/// On unix the file is created with mode `0o600`.
fn write_private_file(path: &Path, content: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp_path = dir.join(format!(".{}.tmp.{}", file_name, Uuid::new_v4()));

    let result = (|| -> io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)?;

        if let Ok(parent) = File::open(dir) {
            let _ = parent.sync_all();
        }
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

/// [`ChallengeProvider`] backed by Supabase phone auth.
///
/// Also serves as the [`AccessTokenSource`] for [`SupabaseIdentityStore`].
#[derive(Clone)]
pub struct SupabasePhoneProvider {
    backend: Arc<SessionBackend>,
    proof: Arc<dyn AntiAutomationProof>,
}

impl SupabasePhoneProvider {
    pub fn new(
        supabase_url: &str,
        publishable_key: &str,
        session_file: PathBuf,
        storage: Arc<dyn SecureStorage>,
        proof: Arc<dyn AntiAutomationProof>,
    ) -> Self {
        Self::with_refresh_config(
            supabase_url,
            publishable_key,
            session_file,
            storage,
            proof,
            RefreshConfig::default(),
        )
    }

    pub fn with_refresh_config(
        supabase_url: &str,
        publishable_key: &str,
        session_file: PathBuf,
        storage: Arc<dyn SecureStorage>,
        proof: Arc<dyn AntiAutomationProof>,
        refresh_config: RefreshConfig,
    ) -> Self {
        Self {
            backend: Arc::new(SessionBackend {
                http_client: Client::new(),
                supabase_url: supabase_url.trim_end_matches('/').to_string(),
                publishable_key: publishable_key.to_string(),
                session_file,
                secrets: SessionSecrets::new(storage),
                session: Mutex::new(None),
                refresh_config,
            }),
            proof,
        }
    }

    /// Provider for the configured project. Tokens go to `storage`, the
    /// rest of the session to `paths.session_file()`.
    ///
    /// [`secure_storage::create_storage`] gives the platform credential store.
    pub fn from_config(
        config: &Config,
        paths: &Paths,
        storage: Arc<dyn SecureStorage>,
        proof: Arc<dyn AntiAutomationProof>,
    ) -> AuthResult<Self> {
        let url = config
            .supabase_url()
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        Ok(Self::new(
            url.as_str(),
            &config.supabase_publishable_key,
            paths.session_file(),
            storage,
            proof,
        ))
    }

    /// User ID of the loaded session, if any.
    pub fn user_id(&self) -> Option<String> {
        self.backend.current().map(|s| s.user_id)
    }
}

#[async_trait]
impl ChallengeProvider for SupabasePhoneProvider {
    async fn request_challenge(&self, full_phone: &str) -> AuthResult<Box<dyn ChallengeHandle>> {
        let captcha = self.proof.proof(full_phone).await?;
        let url = self.backend.auth_url("otp");
        debug!(url = %url, "Requesting SMS code");

        let response = self
            .backend
            .http_client
            .post(&url)
            .header("apikey", &self.backend.publishable_key)
            .header("Content-Type", "application/json")
            .json(&OtpRequest {
                phone: full_phone,
                create_user: true,
                gotrue_meta_security: captcha.as_deref().map(|token| CaptchaMeta {
                    captcha_token: token,
                }),
            })
            .send()
            .await
            .map_err(|e| AuthError::AuthProvider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body_len = body.len(), "SMS code request failed");
            return Err(AuthError::AuthProvider(format!(
                "code request failed: HTTP {}",
                status
            )));
        }

        info!("SMS code requested");
        Ok(Box::new(SupabaseChallengeHandle {
            challenge: Challenge::new(Uuid::new_v4().to_string(), full_phone),
            backend: Arc::clone(&self.backend),
        }))
    }

    async fn restore_session(&self) -> AuthResult<Option<AuthenticatedIdentity>> {
        let Some(stored) = self.backend.load_session()? else {
            return Ok(None);
        };
        *self.backend.session.lock().expect("lock poisoned") = Some(stored);

        let Some(session) = self.backend.valid_session().await? else {
            return Ok(None);
        };

        match self.backend.verify_with_server(&session.access_token).await? {
            Some(user_id) if user_id == session.user_id => {
                info!(user_id = %user_id, "Stored session verified");
                Ok(Some(session.identity()))
            }
            _ => {
                self.backend.clear_session()?;
                Ok(None)
            }
        }
    }

    async fn sign_out(&self) -> AuthResult<()> {
        if let Some(session) = self.backend.current() {
            let result = self
                .backend
                .http_client
                .post(self.backend.auth_url("logout"))
                .header("apikey", &self.backend.publishable_key)
                .header("Authorization", format!("Bearer {}", session.access_token))
                .send()
                .await;
            if let Err(e) = result {
                warn!(error = %e, "Server logout failed");
            }
        }
        self.backend.clear_session()
    }
}

#[async_trait]
impl AccessTokenSource for SupabasePhoneProvider {
    async fn access_token(&self) -> StoreResult<String> {
        match self.backend.valid_session().await {
            Ok(Some(session)) => Ok(session.access_token),
            Ok(None) => Err(StoreError::WriteRejected("not signed in".to_string())),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }
}

struct SupabaseChallengeHandle {
    challenge: Challenge,
    backend: Arc<SessionBackend>,
}

#[async_trait]
impl ChallengeHandle for SupabaseChallengeHandle {
    fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    async fn confirm(&mut self, code: &str) -> AuthResult<AuthenticatedIdentity> {
        if self.challenge.consumed {
            return Err(AuthError::AuthProvider(
                "challenge was already used".to_string(),
            ));
        }

        let url = self.backend.auth_url("verify");
        let response = self
            .backend
            .http_client
            .post(&url)
            .header("apikey", &self.backend.publishable_key)
            .header("Content-Type", "application/json")
            .json(&VerifyRequest {
                kind: "sms",
                phone: &self.challenge.target_phone,
                token: code,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            warn!(status = %status, "Verification code rejected");
            return Err(AuthError::InvalidCode(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(AuthError::AuthProvider(format!(
                "code verification: HTTP {}",
                status
            )));
        }

        let data: TokenResponse = response.json().await?;
        let session = self
            .backend
            .session_from_tokens(data, &self.challenge.target_phone);
        self.backend.store_session(session.clone())?;
        self.challenge.consumed = true;

        info!(user_id = %session.user_id, "Phone number verified");
        Ok(session.identity())
    }
}

/// Wires a controller to Supabase: phone OTP for sign-in and PostgREST for
/// the identity store, authorised with the signed-in user's token.
pub fn supabase_auth_controller(
    config: &Config,
    paths: &Paths,
    storage: Arc<dyn SecureStorage>,
    proof: Arc<dyn AntiAutomationProof>,
) -> AuthResult<AuthController> {
    config
        .validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;
    let provider = Arc::new(SupabasePhoneProvider::from_config(config, paths, storage, proof)?);
    let store = SupabaseIdentityStore::new(
        config.supabase_url.clone(),
        config.supabase_publishable_key.clone(),
        provider.clone(),
        config.poll_interval(),
    );
    Ok(AuthController::new(
        AppId::from(config.app_id.as_str()),
        provider,
        Arc::new(store),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_fsm::AuthState;
    use secure_storage::MemorySecureStorage;
    use tempfile::tempdir;

    fn session(expires_in_secs: i64) -> StoredSession {
        StoredSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            user_id: "user-1".to_string(),
            phone: "+15550001111".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
        }
    }

    fn provider_with(session_file: PathBuf, storage: MemorySecureStorage) -> SupabasePhoneProvider {
        SupabasePhoneProvider::new(
            "https://example.supabase.co/",
            "publishable",
            session_file,
            Arc::new(storage),
            Arc::new(NoProof),
        )
    }

    fn provider(session_file: PathBuf) -> SupabasePhoneProvider {
        provider_with(session_file, MemorySecureStorage::new())
    }

    #[test]
    fn test_delay_for_attempt_is_capped() {
        let config = RefreshConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(5000));
        assert_eq!(config.delay_for_attempt(80), Duration::from_millis(5000));
    }

    #[test]
    fn test_session_expiry_margin() {
        assert!(session(-10).is_expired());
        assert!(session(30).is_expired());
        assert!(!session(3600).is_expired());
    }

    #[test]
    fn test_session_meta_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        assert!(read_session_meta(&path).unwrap().is_none());

        let meta = session(3600).meta();
        write_session_meta(&path, &meta).unwrap();
        assert_eq!(read_session_meta(&path).unwrap(), Some(meta));
    }

    #[test]
    fn test_session_file_holds_no_tokens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = MemorySecureStorage::new();
        let provider = provider_with(path.clone(), storage.clone());

        provider.backend.store_session(session(3600)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("token"));
        assert!(!content.contains("\"access\""));
        assert!(!content.contains("\"refresh\""));
        assert!(content.contains("user-1"));
        assert_eq!(storage.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let provider = provider(path.clone());

        provider.backend.store_session(session(3600)).unwrap();
        provider.backend.store_session(session(7200)).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_session_file_without_tokens_is_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        write_session_meta(&path, &session(3600).meta()).unwrap();

        let provider = provider(path.clone());
        assert!(provider.restore_session().await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_clear_session_removes_tokens_and_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = MemorySecureStorage::new();
        let provider = provider_with(path.clone(), storage.clone());

        provider.backend.store_session(session(3600)).unwrap();
        provider.backend.clear_session().unwrap();

        assert!(storage.is_empty());
        assert!(!path.exists());
        assert!(provider.user_id().is_none());
    }

    #[test]
    fn test_otp_request_shape() {
        let with_proof = serde_json::to_value(OtpRequest {
            phone: "+15550001111",
            create_user: true,
            gotrue_meta_security: Some(CaptchaMeta {
                captcha_token: "proof",
            }),
        })
        .unwrap();
        assert_eq!(with_proof["gotrue_meta_security"]["captcha_token"], "proof");

        let without = serde_json::to_value(OtpRequest {
            phone: "+15550001111",
            create_user: true,
            gotrue_meta_security: None,
        })
        .unwrap();
        assert!(without.get("gotrue_meta_security").is_none());
    }

    #[test]
    fn test_verify_request_uses_sms_type() {
        let json = serde_json::to_value(VerifyRequest {
            kind: "sms",
            phone: "+15550001111",
            token: "123456",
        })
        .unwrap();
        assert_eq!(json["type"], "sms");
        assert_eq!(json["token"], "123456");
    }

    #[test]
    fn test_token_response_phone_gets_plus_prefix() {
        let dir = tempdir().unwrap();
        let provider = provider(dir.path().join("session.json"));
        let data: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600,"user":{"id":"u1","phone":"15550001111"}}"#,
        )
        .unwrap();

        let stored = provider.backend.session_from_tokens(data, "+10000000000");
        assert_eq!(stored.phone, "+15550001111");
        assert_eq!(stored.user_id, "u1");
        assert!(!stored.is_expired());
    }

    #[tokio::test]
    async fn test_restore_without_session_file_is_none() {
        let dir = tempdir().unwrap();
        let provider = provider(dir.path().join("session.json"));
        assert!(provider.restore_session().await.unwrap().is_none());
        assert!(provider.user_id().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_a_no_op() {
        let dir = tempdir().unwrap();
        let provider = provider(dir.path().join("session.json"));
        provider.sign_out().await.unwrap();
    }

    #[tokio::test]
    async fn test_access_token_requires_sign_in() {
        let dir = tempdir().unwrap();
        let provider = provider(dir.path().join("session.json"));
        assert!(provider.access_token().await.is_err());
    }

    #[tokio::test]
    async fn test_access_token_uses_loaded_session() {
        let dir = tempdir().unwrap();
        let provider = provider(dir.path().join("session.json"));
        provider.backend.store_session(session(3600)).unwrap();

        assert_eq!(provider.access_token().await.unwrap(), "access");
        assert_eq!(provider.user_id().as_deref(), Some("user-1"));
        assert!(dir.path().join("session.json").exists());
    }

    #[test]
    fn test_controller_from_config_starts_unauthenticated() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let controller = supabase_auth_controller(
            &Config::default(),
            &paths,
            Arc::new(MemorySecureStorage::new()),
            Arc::new(NoProof),
        )
        .unwrap();
        assert_eq!(controller.state(), AuthState::Unauthenticated);
        assert_eq!(controller.app_id().as_str(), "chat-pro-t-ultimate");
    }
}
