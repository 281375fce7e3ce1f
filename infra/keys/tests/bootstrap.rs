use std::sync::Arc;

use parapet_kernel::clock::SystemClock;
use parapet_kernel::config::CryptoConfig;
use parapet_keys::{KeyManager, KeysError};

#[test]
fn vault_key_is_stable_within_a_process() {
    let manager = KeyManager::new(CryptoConfig::default(), Arc::new(SystemClock));
    let a = manager.vault_key().unwrap();
    let b = manager.vault_key().unwrap();
    assert_eq!(a.expose(), b.expose());
}

#[test]
fn vault_key_survives_a_restart_through_the_bootstrap_secret() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bootstrap.key");

    let first = KeyManager::with_bootstrap(
        CryptoConfig::default(),
        Arc::new(SystemClock),
        path.clone(),
    );
    let original = first.vault_key().unwrap();

    // A new manager simulates a process restart.
    let second =
        KeyManager::with_bootstrap(CryptoConfig::default(), Arc::new(SystemClock), path);
    let restored = second.vault_key().unwrap();

    assert_eq!(original.expose(), restored.expose());
    assert_eq!(original.algorithm(), restored.algorithm());
}

#[test]
fn corrupted_bootstrap_secret_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bootstrap.key");
    std::fs::write(&path, "not-a-bootstrap-secret").unwrap();

    let manager =
        KeyManager::with_bootstrap(CryptoConfig::default(), Arc::new(SystemClock), path);
    assert!(matches!(manager.vault_key(), Err(KeysError::Bootstrap { .. })));
}

#[test]
fn configured_key_size_drives_the_master_key() {
    let config = CryptoConfig { symmetric_key_bits: 128, ..CryptoConfig::default() };
    let manager = KeyManager::new(config, Arc::new(SystemClock));
    let key = manager.vault_key().unwrap();
    assert_eq!(key.bits(), 128);
}

#[test]
fn rotation_commit_swaps_the_master_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bootstrap.key");

    let manager = KeyManager::with_bootstrap(
        CryptoConfig::default(),
        Arc::new(SystemClock),
        path.clone(),
    );
    let before = manager.vault_key().unwrap();

    let candidate = manager.mint_vault_key().unwrap();
    let committed = manager.commit_vault_key(candidate).unwrap();
    assert_ne!(before.expose(), committed.expose());

    // The persisted secret now yields the rotated key.
    let reloaded =
        KeyManager::with_bootstrap(CryptoConfig::default(), Arc::new(SystemClock), path);
    assert_eq!(reloaded.vault_key().unwrap().expose(), committed.expose());
}
