use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parapet_envelope::{IdentityKey, TransportEnvelope};
use parapet_kernel::clock::SystemClock;
use parapet_kernel::config::{CryptoConfig, RetryConfig};
use parapet_keys::KeyManager;
use parapet_pipeline::prelude::*;
use parapet_vault::SecureVault;

pub const CLIENT_SEED: [u8; 32] = [7; 32];
pub const SERVER_SEED: [u8; 32] = [9; 32];

/// In-memory transport double. Guarded paths return 401 unless the request
/// carries the currently valid bearer token; `/auth/refresh` mints the
/// configured fresh pair and counts invocations.
#[derive(Debug, Default)]
pub struct MockState {
    pub log: Mutex<Vec<WireRequest>>,
    pub refresh_calls: AtomicU32,
    pub fail_network_times: AtomicU32,
    /// Bearer token guarded paths accept; `None` disables the gate.
    pub valid_token: Mutex<Option<String>>,
    /// Body `/auth/refresh` answers with; `None` → 500.
    pub refresh_body: Mutex<Option<String>>,
    /// Canned responses by path, served before the auth gate.
    pub canned: Mutex<FxHashMap<String, WireResponse>>,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport(pub Arc<MockState>);

impl MockTransport {
    pub fn sends(&self) -> usize {
        self.0.log.lock().len()
    }

    pub fn refresh_calls(&self) -> u32 {
        self.0.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn accept_token(&self, token: &str) {
        *self.0.valid_token.lock() = Some(token.to_owned());
    }

    pub fn refresh_yields(&self, access: &str, refresh: &str) {
        *self.0.refresh_body.lock() =
            Some(format!(r#"{{"accessToken":"{access}","refreshToken":"{refresh}"}}"#));
    }

    pub fn respond(&self, path: &str, response: WireResponse) {
        self.0.canned.lock().insert(path.to_owned(), response);
    }
}

pub fn ok(body: impl Into<String>) -> WireResponse {
    WireResponse { status: 200, headers: Vec::new(), body: body.into() }
}

pub fn status(code: u16) -> WireResponse {
    WireResponse { status: code, headers: Vec::new(), body: String::new() }
}

impl Transport for MockTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        // Yield once so concurrent dispatches genuinely interleave.
        tokio::time::sleep(Duration::from_millis(1)).await;

        self.0.log.lock().push(request.clone());

        let failures = self.0.fail_network_times.load(Ordering::SeqCst);
        if failures > 0 {
            self.0.fail_network_times.store(failures - 1, Ordering::SeqCst);
            return Err(TransportError::Network { message: "connection reset".into() });
        }

        if request.path == "/auth/refresh" {
            self.0.refresh_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(match self.0.refresh_body.lock().clone() {
                Some(body) => ok(body),
                None => status(500),
            });
        }

        if let Some(response) = self.0.canned.lock().get(&request.path).cloned() {
            return Ok(response);
        }

        if let Some(expected) = self.0.valid_token.lock().clone() {
            let authorized =
                request.header("authorization") == Some(format!("Bearer {expected}").as_str());
            if !authorized {
                return Ok(status(401));
            }
        }

        // Echo for everything else.
        Ok(ok(request.body.unwrap_or_default()))
    }
}

pub struct Harness {
    pub pipeline: RequestPipeline<MockTransport>,
    pub transport: MockTransport,
    pub vault: Arc<SecureVault>,
    pub envelope: TransportEnvelope,
}

pub fn setup() -> Harness {
    let transport = MockTransport::default();
    let keys = Arc::new(KeyManager::new(CryptoConfig::default(), Arc::new(SystemClock)));
    let vault = Arc::new(
        SecureVault::builder()
            .master_key(keys.vault_key().expect("vault key"))
            .build()
            .expect("vault should build"),
    );
    let envelope = TransportEnvelope::new(Arc::clone(&keys));

    let pipeline = RequestPipeline::builder()
        .transport(transport.clone())
        .vault(Arc::clone(&vault))
        .envelope(envelope.clone())
        .identity(IdentityKey::from_bytes(CLIENT_SEED))
        .recipient(IdentityKey::from_bytes(SERVER_SEED).public())
        .retry(RetryConfig { max_retries: 3, base_delay_ms: 50 })
        .build()
        .expect("pipeline should build");

    Harness { pipeline, transport, vault, envelope }
}
