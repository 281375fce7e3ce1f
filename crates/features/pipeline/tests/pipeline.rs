pub mod fixtures;

use fixtures::{CLIENT_SEED, SERVER_SEED, ok, setup, status};
use parapet_envelope::{Envelope, IdentityKey};
use parapet_kernel::domain::{Namespace, StorageTier};
use parapet_pipeline::prelude::*;
use parapet_vault::PutOptions;

fn tokens(access: &str, refresh: &str) -> SessionTokens {
    SessionTokens { access_token: access.to_owned(), refresh_token: refresh.to_owned() }
}

#[tokio::test(start_paused = true)]
async fn dispatch_attaches_identity_fingerprint_and_request_id() {
    let harness = setup();
    harness
        .pipeline
        .tokens()
        .store(&tokens("acc-1", "ref-1"), StorageTier::Volatile)
        .unwrap();

    let response =
        harness.pipeline.dispatch(ApiRequest::get("/profile")).await.unwrap();
    assert!(response.is_success());

    let log = harness.transport.0.log.lock();
    let wire = &log[0];
    assert_eq!(wire.header("authorization"), Some("Bearer acc-1"));
    assert_eq!(wire.header("x-device-fingerprint"), Some(harness.pipeline.fingerprint()));
    assert_eq!(wire.header("x-request-id").map(str::len), Some(16));
}

#[tokio::test(start_paused = true)]
async fn skip_auth_omits_the_identity_token() {
    let harness = setup();
    harness
        .pipeline
        .tokens()
        .store(&tokens("acc-1", "ref-1"), StorageTier::Volatile)
        .unwrap();

    harness
        .pipeline
        .dispatch(ApiRequest::post("/login", serde_json::json!({"u": "ada"})).without_auth())
        .await
        .unwrap();

    let log = harness.transport.0.log.lock();
    assert_eq!(log[0].header("authorization"), None);
}

#[tokio::test(start_paused = true)]
async fn encrypted_requests_are_sealed_and_responses_opened() {
    let harness = setup();
    let server_identity = IdentityKey::from_bytes(SERVER_SEED);
    let client_identity = IdentityKey::from_bytes(CLIENT_SEED);

    // The server answers with a payload sealed to the client.
    let reply = harness
        .envelope
        .seal(br#"{"balance":42}"#, &client_identity.public())
        .unwrap();
    harness.transport.respond("/account", ok(reply.to_json().unwrap()));

    let response = harness
        .pipeline
        .dispatch(
            ApiRequest::post("/account", serde_json::json!({"query": "balance"})).encrypted(),
        )
        .await
        .unwrap();

    // Response body arrived sealed and was opened transparently.
    assert_eq!(response.body, r#"{"balance":42}"#);

    // The outgoing body was a valid envelope the server could open, not
    // plaintext JSON.
    let log = harness.transport.0.log.lock();
    let sent = log[0].body.as_deref().unwrap();
    let envelope = Envelope::from_json(sent).expect("body must be an envelope");
    let opened = harness.envelope.open(&envelope, &server_identity).unwrap();
    assert_eq!(opened, br#"{"query":"balance"}"#);
}

#[tokio::test(start_paused = true)]
async fn plaintext_reply_to_a_sealed_request_is_an_integrity_failure() {
    let harness = setup();
    harness.transport.respond("/account", ok(r#"{"balance":42}"#));

    let result = harness
        .pipeline
        .dispatch(ApiRequest::post("/account", serde_json::json!({})).encrypted())
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::Envelope(parapet_envelope::EnvelopeError::Integrity))
    ));
}

#[tokio::test(start_paused = true)]
async fn a_401_triggers_one_refresh_and_one_replay() {
    let harness = setup();
    harness.transport.accept_token("fresh");
    harness.transport.refresh_yields("fresh", "ref-2");
    harness
        .pipeline
        .tokens()
        .store(&tokens("stale", "ref-1"), StorageTier::Volatile)
        .unwrap();

    let response = harness.pipeline.dispatch(ApiRequest::get("/data")).await.unwrap();

    assert!(response.is_success());
    assert_eq!(harness.transport.refresh_calls(), 1);
    // initial + refresh + replay
    assert_eq!(harness.transport.sends(), 3);
    // The rotated pair is what the store now holds.
    assert_eq!(
        harness.pipeline.tokens().current().unwrap(),
        tokens("fresh", "ref-2")
    );
}

#[tokio::test(start_paused = true)]
async fn a_second_401_purges_the_session_and_surfaces_expiry() {
    let harness = setup();
    harness.transport.accept_token("unobtainable");
    harness.transport.refresh_yields("still-wrong", "ref-2");
    harness
        .pipeline
        .tokens()
        .store(&tokens("stale", "ref-1"), StorageTier::Volatile)
        .unwrap();
    harness
        .vault
        .put(Namespace::Session, "scratch", &"state", PutOptions::default())
        .unwrap();
    harness
        .vault
        .put(Namespace::Pref, "theme", &"dark", PutOptions::default())
        .unwrap();

    let result = harness.pipeline.dispatch(ApiRequest::get("/data")).await;
    assert!(matches!(result, Err(PipelineError::SessionExpired)));

    // The whole session namespace is gone; preferences survive.
    assert!(harness.pipeline.tokens().current().is_none());
    assert!(harness.vault.get::<String>(Namespace::Session, "scratch").is_none());
    assert_eq!(harness.vault.get::<String>(Namespace::Pref, "theme").as_deref(), Some("dark"));
}

#[tokio::test(start_paused = true)]
async fn a_failed_refresh_purges_the_session() {
    let harness = setup();
    harness.transport.accept_token("fresh");
    // No refresh body configured: the endpoint answers 500.
    harness
        .pipeline
        .tokens()
        .store(&tokens("stale", "ref-1"), StorageTier::Volatile)
        .unwrap();

    let result = harness.pipeline.dispatch(ApiRequest::get("/data")).await;
    assert!(matches!(result, Err(PipelineError::SessionExpired)));
    assert!(harness.pipeline.tokens().current().is_none());
}

#[tokio::test(start_paused = true)]
async fn five_concurrent_401s_coalesce_into_one_refresh_call() {
    let harness = setup();
    harness.transport.accept_token("fresh");
    harness.transport.refresh_yields("fresh", "ref-2");
    harness
        .pipeline
        .tokens()
        .store(&tokens("stale", "ref-1"), StorageTier::Volatile)
        .unwrap();

    let (a, b, c, d, e) = tokio::join!(
        harness.pipeline.dispatch(ApiRequest::get("/one")),
        harness.pipeline.dispatch(ApiRequest::get("/two")),
        harness.pipeline.dispatch(ApiRequest::get("/three")),
        harness.pipeline.dispatch(ApiRequest::get("/four")),
        harness.pipeline.dispatch(ApiRequest::get("/five")),
    );

    for result in [a, b, c, d, e] {
        assert!(result.unwrap().is_success());
    }
    assert_eq!(harness.transport.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limiting_surfaces_the_hint_and_never_retries() {
    let harness = setup();
    harness.transport.respond(
        "/burst",
        WireResponse {
            status: 429,
            headers: vec![("Retry-After".to_owned(), "30".to_owned())],
            body: String::new(),
        },
    );

    let result = harness.pipeline.dispatch(ApiRequest::get("/burst")).await;
    assert!(matches!(
        result,
        Err(PipelineError::RateLimited { retry_after_ms: Some(30_000) })
    ));
    assert_eq!(harness.transport.sends(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_network_failures_are_retried_with_backoff() {
    let harness = setup();
    harness.transport.0.fail_network_times.store(2, std::sync::atomic::Ordering::SeqCst);

    let response = harness.pipeline.dispatch(ApiRequest::get("/flaky")).await.unwrap();
    assert!(response.is_success());
    assert_eq!(harness.transport.sends(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_the_transport_error() {
    let harness = setup();
    harness.transport.0.fail_network_times.store(10, std::sync::atomic::Ordering::SeqCst);

    let result = harness.pipeline.dispatch(ApiRequest::get("/down")).await;
    assert!(matches!(
        result,
        Err(PipelineError::Transport(TransportError::Network { .. }))
    ));
    // One initial attempt plus max_retries.
    assert_eq!(harness.transport.sends(), 4);
}

#[tokio::test(start_paused = true)]
async fn business_rule_rejections_are_returned_not_retried() {
    let harness = setup();
    harness.transport.respond("/validate", status(422));

    let response = harness.pipeline.dispatch(ApiRequest::get("/validate")).await.unwrap();
    assert_eq!(response.status, 422);
    assert_eq!(harness.transport.sends(), 1);
}

#[tokio::test(start_paused = true)]
async fn fingerprint_is_minted_once_and_reused() {
    let harness = setup();
    let first = harness.pipeline.fingerprint().to_owned();

    // A second pipeline over the same vault sees the stored fingerprint.
    let again = setup_over(&harness);
    assert_eq!(again.fingerprint(), first);
}

fn setup_over(harness: &fixtures::Harness) -> RequestPipeline<fixtures::MockTransport> {
    RequestPipeline::builder()
        .transport(harness.transport.clone())
        .vault(std::sync::Arc::clone(&harness.vault))
        .envelope(harness.envelope.clone())
        .identity(IdentityKey::from_bytes(CLIENT_SEED))
        .recipient(IdentityKey::from_bytes(SERVER_SEED).public())
        .build()
        .unwrap()
}
