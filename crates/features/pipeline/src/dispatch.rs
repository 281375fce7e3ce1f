use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use parapet_envelope::{Envelope, EnvelopeError, IdentityKey, RecipientKey, TransportEnvelope};
use parapet_kernel::config::RetryConfig;
use parapet_kernel::domain::Namespace;
use parapet_kernel::{fingerprint, safe_nanoid};
use parapet_vault::{PutOptions, SecureVault};

use crate::error::PipelineError;
use crate::retry::retry_with_backoff;
use crate::session::{SessionTokens, TokenStore};
use crate::transport::{ApiRequest, Method, Transport, WireRequest, WireResponse};

/// Pref-namespace key the device fingerprint is stored under.
const FINGERPRINT_KEY: &str = "device.fingerprint";

const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// The response handed back to callers, with any sealed body already opened.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ApiResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    /// Returns the underlying decode error.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// The orchestrator between callers and the transport.
///
/// Explicitly constructed with its collaborators (no ambient singletons);
/// see [`PipelineBuilder`]. Cheap to share behind an [`Arc`]; `dispatch`
/// takes `&self`.
pub struct RequestPipeline<T: Transport> {
    transport: T,
    vault: Arc<SecureVault>,
    envelope: TransportEnvelope,
    identity: IdentityKey,
    recipient: RecipientKey,
    tokens: TokenStore,
    retry: RetryConfig,
    refresh_path: String,
    fingerprint: String,
    refresh_lock: AsyncMutex<()>,
}

impl<T: Transport> std::fmt::Debug for RequestPipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("refresh_path", &self.refresh_path)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Runtime-checked builder for [`RequestPipeline`].
#[derive(Debug)]
pub struct PipelineBuilder<T> {
    transport: Option<T>,
    vault: Option<Arc<SecureVault>>,
    envelope: Option<TransportEnvelope>,
    identity: Option<IdentityKey>,
    recipient: Option<RecipientKey>,
    retry: RetryConfig,
    refresh_path: String,
}

impl<T: Transport> Default for PipelineBuilder<T> {
    fn default() -> Self {
        Self {
            transport: None,
            vault: None,
            envelope: None,
            identity: None,
            recipient: None,
            retry: RetryConfig::default(),
            refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
        }
    }
}

impl<T: Transport> PipelineBuilder<T> {
    /// The network seam. Required.
    #[must_use]
    pub fn transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    /// The vault holding session tokens and the fingerprint. Required.
    #[must_use]
    pub fn vault(mut self, vault: Arc<SecureVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    /// The envelope engine used for sealed exchanges. Required.
    #[must_use]
    pub fn envelope(mut self, envelope: TransportEnvelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    /// The local identity sealed responses are opened with. Required.
    #[must_use]
    pub fn identity(mut self, identity: IdentityKey) -> Self {
        self.identity = Some(identity);
        self
    }

    /// The server's public key requests are sealed to. Required.
    #[must_use]
    pub fn recipient(mut self, recipient: RecipientKey) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Overrides the backoff policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the token-refresh endpoint path.
    #[must_use]
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Finalizes the pipeline, loading or minting the device fingerprint.
    ///
    /// # Errors
    /// Returns [`PipelineError::InvalidConfiguration`] if a required
    /// collaborator is missing.
    pub fn build(self) -> Result<RequestPipeline<T>, PipelineError> {
        let missing = |what: &'static str| PipelineError::InvalidConfiguration {
            message: format!("{what} is required").into(),
            context: Some("builder".into()),
        };

        let vault = self.vault.ok_or_else(|| missing("a vault"))?;
        let pipeline = RequestPipeline {
            transport: self.transport.ok_or_else(|| missing("a transport"))?,
            envelope: self.envelope.ok_or_else(|| missing("an envelope engine"))?,
            identity: self.identity.ok_or_else(|| missing("an identity key"))?,
            recipient: self.recipient.ok_or_else(|| missing("a recipient key"))?,
            tokens: TokenStore::new(Arc::clone(&vault)),
            retry: self.retry,
            refresh_path: self.refresh_path,
            fingerprint: load_fingerprint(&vault),
            refresh_lock: AsyncMutex::new(()),
            vault,
        };
        Ok(pipeline)
    }
}

impl<T: Transport> RequestPipeline<T> {
    /// Returns a new [`PipelineBuilder`].
    #[must_use]
    pub fn builder() -> PipelineBuilder<T> {
        PipelineBuilder::default()
    }

    /// The session token store (used by the login flow to deposit tokens).
    #[must_use]
    pub const fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// The stable per-installation descriptor attached to every request.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Sends a request through the full pipeline.
    ///
    /// Attaches the request id, device fingerprint, and identity token
    /// (unless `skip_auth`); seals the body when `encrypt` is set and opens
    /// the sealed response body. Transient transport failures are retried
    /// with exponential backoff before any status handling.
    ///
    /// # Errors
    /// * [`PipelineError::SessionExpired`] after refresh is exhausted; the
    ///   session namespace has been purged.
    /// * [`PipelineError::RateLimited`] on 429, with the server's hint.
    /// * [`PipelineError::Transport`] when retries are exhausted.
    /// * [`PipelineError::Envelope`] when sealing or opening fails.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, PipelineError> {
        let request_id = safe_nanoid!(16);
        let used_token = self.access_token(&request);

        let wire = self.prepare(&request, &request_id, used_token.as_deref())?;
        let mut response = self.send_with_retry(wire).await?;

        if response.status == 401 && !request.skip_auth {
            debug!(%request_id, "Unauthorized; coalescing into a token refresh");
            self.refresh_once(used_token.as_deref()).await?;

            let replay_token = self.access_token(&request);
            let wire = self.prepare(&request, &request_id, replay_token.as_deref())?;
            response = self.send_with_retry(wire).await?;

            if response.status == 401 {
                warn!(%request_id, "Replay still unauthorized; expiring session");
                self.expire_session();
                return Err(PipelineError::SessionExpired);
            }
        }

        if response.status == 429 {
            let retry_after_ms = parse_retry_after(&response);
            debug!(%request_id, ?retry_after_ms, "Rate limited");
            return Err(PipelineError::RateLimited { retry_after_ms });
        }

        self.finish(&request, response)
    }

    /// Exactly one refresh may be in flight; concurrent 401s wait on the
    /// lock and observe the winner's result instead of racing their own
    /// refresh calls (which could invalidate each other's tokens).
    async fn refresh_once(&self, stale_access: Option<&str>) -> Result<(), PipelineError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.tokens.current();
        if current.as_ref().map(|t| t.access_token.as_str()) != stale_access {
            debug!("Token already refreshed by a concurrent request");
            return Ok(());
        }
        let Some(current) = current else {
            self.expire_session();
            return Err(PipelineError::SessionExpired);
        };

        let request_id = safe_nanoid!(16);
        let wire = WireRequest {
            method: Method::Post,
            path: self.refresh_path.clone(),
            headers: self.base_headers(&request_id),
            body: Some(
                serde_json::json!({ "refreshToken": current.refresh_token }).to_string(),
            ),
        };

        info!(%request_id, "Refreshing identity token");
        let response = self.send_with_retry(wire).await?;
        if !response.is_success() {
            warn!(status = response.status, "Token refresh rejected; expiring session");
            self.expire_session();
            return Err(PipelineError::SessionExpired);
        }

        let fresh: SessionTokens = match serde_json::from_str(&response.body) {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, "Token refresh returned an unusable body; expiring session");
                self.expire_session();
                return Err(PipelineError::SessionExpired);
            },
        };
        self.tokens.replace(&fresh)?;
        Ok(())
    }

    fn access_token(&self, request: &ApiRequest) -> Option<String> {
        if request.skip_auth {
            None
        } else {
            self.tokens.current().map(|t| t.access_token)
        }
    }

    fn prepare(
        &self,
        request: &ApiRequest,
        request_id: &str,
        access_token: Option<&str>,
    ) -> Result<WireRequest, PipelineError> {
        let mut headers = self.base_headers(request_id);
        if let Some(token) = access_token {
            headers.push(("authorization".to_owned(), format!("Bearer {token}")));
        }

        let body = match &request.body {
            Some(value) if request.encrypt => {
                let plaintext = serde_json::to_vec(value)?;
                let sealed = self.envelope.seal(&plaintext, &self.recipient)?;
                Some(sealed.to_json()?)
            },
            Some(value) => Some(value.to_string()),
            None => None,
        };

        Ok(WireRequest { method: request.method, path: request.path.clone(), headers, body })
    }

    fn base_headers(&self, request_id: &str) -> Vec<(String, String)> {
        vec![
            ("x-request-id".to_owned(), request_id.to_owned()),
            ("x-device-fingerprint".to_owned(), self.fingerprint.clone()),
            ("content-type".to_owned(), "application/json".to_owned()),
        ]
    }

    async fn send_with_retry(&self, wire: WireRequest) -> Result<WireResponse, PipelineError> {
        retry_with_backoff(
            || self.transport.send(wire.clone()),
            self.retry.max_retries,
            Duration::from_millis(self.retry.base_delay_ms),
        )
        .await
        .map_err(PipelineError::from)
    }

    fn finish(
        &self,
        request: &ApiRequest,
        response: WireResponse,
    ) -> Result<ApiResponse, PipelineError> {
        let body = if request.encrypt && response.is_success() && !response.body.is_empty() {
            // A sealed exchange must come back sealed; a plaintext body here
            // is treated exactly like a failed authentication.
            let envelope =
                Envelope::from_json(&response.body).map_err(|_| EnvelopeError::Integrity)?;
            let plaintext = self.envelope.open(&envelope, &self.identity)?;
            String::from_utf8(plaintext)
                .map_err(|_| PipelineError::Envelope(EnvelopeError::Integrity))?
        } else {
            response.body
        };

        Ok(ApiResponse { status: response.status, headers: response.headers, body })
    }

    fn expire_session(&self) {
        if let Err(e) = self.vault.clear(Namespace::Session) {
            warn!(error = %e, "Failed to purge session namespace");
        }
    }
}

/// Loads the per-installation fingerprint from the pref namespace, minting
/// and persisting one on first run.
fn load_fingerprint(vault: &SecureVault) -> String {
    if let Some(existing) = vault.get::<String>(Namespace::Pref, FINGERPRINT_KEY) {
        if fingerprint::is_valid(&existing) {
            return existing;
        }
        warn!("Stored device fingerprint is malformed; minting a fresh one");
    }

    let minted = fingerprint::generate();
    if let Err(e) = vault.put(
        Namespace::Pref,
        FINGERPRINT_KEY,
        &minted,
        PutOptions::persistent().plaintext(),
    ) {
        warn!(error = %e, "Failed to persist device fingerprint");
    }
    minted
}

fn parse_retry_after(response: &WireResponse) -> Option<u64> {
    response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|seconds| seconds * 1_000)
}
