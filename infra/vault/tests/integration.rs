pub mod fixtures;

use std::sync::Arc;

use fixtures::{SharedBackend, key_manager, master_key, setup_vault};
use parapet_kernel::clock::ManualClock;
use parapet_vault::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Profile {
    user: String,
    token: String,
}

fn sample() -> Profile {
    Profile { user: "ada".to_owned(), token: "tok-123".to_owned() }
}

#[test]
fn encrypted_roundtrip() {
    let vault = setup_vault(ManualClock::new(1_000));
    vault.put(Namespace::Session, "profile", &sample(), PutOptions::default()).unwrap();

    let restored: Profile = vault.get(Namespace::Session, "profile").unwrap();
    assert_eq!(restored, sample());
}

#[test]
fn plaintext_roundtrip() {
    let vault = setup_vault(ManualClock::new(1_000));
    vault
        .put(Namespace::Pref, "lang", &"en-GB", PutOptions::default().plaintext())
        .unwrap();

    let restored: Option<String> = vault.get(Namespace::Pref, "lang");
    assert_eq!(restored.as_deref(), Some("en-GB"));
}

#[test]
fn missing_key_is_absent() {
    let vault = setup_vault(ManualClock::new(1_000));
    let absent: Option<Profile> = vault.get(Namespace::Session, "nope");
    assert!(absent.is_none());
}

#[test]
fn expired_entry_is_absent_both_times_and_deleted() {
    let clock = ManualClock::new(1_000);
    let vault = setup_vault(Arc::clone(&clock));

    vault
        .put(Namespace::Session, "short", &sample(), PutOptions::default().ttl_ms(500))
        .unwrap();
    assert!(vault.get::<Profile>(Namespace::Session, "short").is_some());

    clock.advance(500);
    assert!(vault.get::<Profile>(Namespace::Session, "short").is_none());
    // Idempotent: the second read is just as absent and does not panic.
    assert!(vault.get::<Profile>(Namespace::Session, "short").is_none());
    assert!(vault.keys(Namespace::Session).unwrap().is_empty());
}

#[test]
fn tampered_entry_is_absent_both_times() {
    let clock = ManualClock::new(1_000);
    let backend = SharedBackend::default();
    let vault = SecureVault::builder()
        .master_key(master_key(Arc::clone(&clock)))
        .volatile_backend(Box::new(backend.clone()))
        .clock(clock)
        .build()
        .unwrap();

    vault.put(Namespace::Session, "profile", &sample(), PutOptions::default()).unwrap();

    // Corrupt the ciphertext in place, keeping the record shape valid.
    let raw = backend.load("session:profile").unwrap().unwrap();
    let mut record: serde_json::Value = serde_json::from_str(&raw).unwrap();
    record["v"] = serde_json::Value::String("AAAA".repeat(20));
    backend.store("session:profile", &record.to_string()).unwrap();

    assert!(vault.get::<Profile>(Namespace::Session, "profile").is_none());
    assert!(vault.get::<Profile>(Namespace::Session, "profile").is_none());
}

#[test]
fn record_copied_to_another_key_fails_authentication() {
    let clock = ManualClock::new(1_000);
    let backend = SharedBackend::default();
    let vault = SecureVault::builder()
        .master_key(master_key(Arc::clone(&clock)))
        .volatile_backend(Box::new(backend.clone()))
        .clock(clock)
        .build()
        .unwrap();

    vault.put(Namespace::Session, "original", &sample(), PutOptions::default()).unwrap();
    let raw = backend.load("session:original").unwrap().unwrap();
    backend.store("session:copy", &raw).unwrap();

    // AAD binding: the copy reports absent under its new address.
    assert!(vault.get::<Profile>(Namespace::Session, "copy").is_none());
    assert!(vault.get::<Profile>(Namespace::Session, "original").is_some());
}

#[test]
fn clear_session_preserves_pref() {
    let vault = setup_vault(ManualClock::new(1_000));
    vault.put(Namespace::Session, "token", &sample(), PutOptions::default()).unwrap();
    vault.put(Namespace::Pref, "theme", &"dark", PutOptions::default()).unwrap();
    vault
        .put(Namespace::Pref, "fingerprint", &"v1:abc", PutOptions::persistent())
        .unwrap();

    vault.clear(Namespace::Session).unwrap();

    assert!(vault.get::<Profile>(Namespace::Session, "token").is_none());
    assert_eq!(vault.get::<String>(Namespace::Pref, "theme").as_deref(), Some("dark"));
    assert_eq!(
        vault.get::<String>(Namespace::Pref, "fingerprint").as_deref(),
        Some("v1:abc")
    );
}

#[test]
fn persistent_tier_survives_a_rebuild_volatile_does_not() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let clock = ManualClock::new(1_000);
    let manager = key_manager(Arc::clone(&clock));
    let master = manager.vault_key().unwrap();

    let vault = SecureVault::builder()
        .master_key(Arc::clone(&master))
        .persistent_backend(Box::new(FileBackend::open(&path).unwrap()))
        .clock(clock.clone())
        .build()
        .unwrap();
    vault.put(Namespace::Pref, "keep", &"yes", PutOptions::persistent()).unwrap();
    vault.put(Namespace::Session, "drop", &"gone", PutOptions::default()).unwrap();
    drop(vault);

    let rebuilt = SecureVault::builder()
        .master_key(master)
        .persistent_backend(Box::new(FileBackend::open(&path).unwrap()))
        .clock(clock)
        .build()
        .unwrap();
    assert_eq!(rebuilt.get::<String>(Namespace::Pref, "keep").as_deref(), Some("yes"));
    assert!(rebuilt.get::<String>(Namespace::Session, "drop").is_none());
}

#[test]
fn rewriting_a_key_in_another_tier_moves_it() {
    let clock = ManualClock::new(1_000);
    let volatile = SharedBackend::default();
    let persistent = SharedBackend::default();
    let vault = SecureVault::builder()
        .master_key(master_key(Arc::clone(&clock)))
        .volatile_backend(Box::new(volatile.clone()))
        .persistent_backend(Box::new(persistent.clone()))
        .clock(clock)
        .build()
        .unwrap();

    vault.put(Namespace::Pref, "spot", &1u32, PutOptions::default()).unwrap();
    assert!(volatile.load("pref:spot").unwrap().is_some());

    vault.put(Namespace::Pref, "spot", &2u32, PutOptions::persistent()).unwrap();
    assert!(volatile.load("pref:spot").unwrap().is_none());
    assert!(persistent.load("pref:spot").unwrap().is_some());
    assert_eq!(vault.get::<u32>(Namespace::Pref, "spot"), Some(2));
}

#[test]
fn rekey_keeps_every_entry_readable() {
    let clock = ManualClock::new(1_000);
    let manager = key_manager(Arc::clone(&clock));
    let vault = SecureVault::builder()
        .master_key(manager.vault_key().unwrap())
        .clock(clock.clone())
        .build()
        .unwrap();

    vault.put(Namespace::Session, "a", &sample(), PutOptions::default()).unwrap();
    vault.put(Namespace::Pref, "b", &"plain", PutOptions::default().plaintext()).unwrap();
    vault.put(Namespace::Pref, "c", &42u32, PutOptions::persistent()).unwrap();

    let candidate = manager.mint_vault_key().unwrap();
    vault.rekey(&candidate).unwrap();

    assert_eq!(vault.get::<Profile>(Namespace::Session, "a"), Some(sample()));
    assert_eq!(vault.get::<String>(Namespace::Pref, "b").as_deref(), Some("plain"));
    assert_eq!(vault.get::<u32>(Namespace::Pref, "c"), Some(42));
}

#[test]
fn rekey_aborts_without_changes_when_an_entry_is_tampered() {
    let clock = ManualClock::new(1_000);
    let manager = key_manager(Arc::clone(&clock));
    let backend = SharedBackend::default();
    let vault = SecureVault::builder()
        .master_key(manager.vault_key().unwrap())
        .volatile_backend(Box::new(backend.clone()))
        .clock(clock.clone())
        .build()
        .unwrap();

    vault.put(Namespace::Session, "good", &sample(), PutOptions::default()).unwrap();
    vault.put(Namespace::Session, "bad", &sample(), PutOptions::default()).unwrap();

    let raw = backend.load("session:bad").unwrap().unwrap();
    let mut record: serde_json::Value = serde_json::from_str(&raw).unwrap();
    record["v"] = serde_json::Value::String("AAAA".repeat(20));
    backend.store("session:bad", &record.to_string()).unwrap();
    let good_before = backend.load("session:good").unwrap().unwrap();

    let candidate = manager.mint_vault_key().unwrap();
    assert!(vault.rekey(&candidate).is_err());

    // All-or-nothing: the untampered entry was not rewritten and still opens
    // under the original key.
    assert_eq!(backend.load("session:good").unwrap().unwrap(), good_before);
    assert_eq!(vault.get::<Profile>(Namespace::Session, "good"), Some(sample()));
}

#[tokio::test]
async fn changes_are_published_on_the_keyed_bus() {
    let clock = ManualClock::new(1_000);
    let vault = setup_vault(Arc::clone(&clock));
    let mut rx = vault.subscribe(Namespace::Session, "watched");

    vault
        .put(Namespace::Session, "watched", &1u32, PutOptions::default().ttl_ms(100))
        .unwrap();
    assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Updated);

    clock.advance(100);
    let _: Option<u32> = vault.get(Namespace::Session, "watched");
    assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Expired);

    vault.put(Namespace::Session, "watched", &2u32, PutOptions::default()).unwrap();
    vault.remove(Namespace::Session, "watched").unwrap();
    assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Updated);
    assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Removed);
}
