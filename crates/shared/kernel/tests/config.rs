use parapet_kernel::config::{MIN_KDF_ITERATIONS, PostLockout, SecurityConfig};

#[test]
fn defaults_are_valid_and_documented() {
    let cfg = SecurityConfig::default();
    cfg.validate().expect("defaults must validate");

    assert_eq!(cfg.defense.captcha_threshold, 3);
    assert_eq!(cfg.defense.lock_threshold, 5);
    assert_eq!(cfg.defense.lockout_duration_ms, 300_000);
    assert_eq!(cfg.defense.post_lockout, PostLockout::Normal);
    assert_eq!(cfg.crypto.kdf_iterations, 600_000);
    assert_eq!(cfg.crypto.symmetric_key_bits, 256);
    assert_eq!(cfg.retry.max_retries, 3);
    assert_eq!(cfg.retry.base_delay_ms, 250);
}

#[test]
fn lock_threshold_must_exceed_captcha_threshold() {
    let mut cfg = SecurityConfig::default();
    cfg.defense.lock_threshold = cfg.defense.captcha_threshold;
    assert!(cfg.validate().is_err());
}

#[test]
fn kdf_iterations_floor_is_enforced() {
    let mut cfg = SecurityConfig::default();
    cfg.crypto.kdf_iterations = MIN_KDF_ITERATIONS - 1;
    assert!(cfg.validate().is_err());

    cfg.crypto.kdf_iterations = MIN_KDF_ITERATIONS;
    cfg.validate().expect("floor itself is acceptable");
}

#[test]
fn key_bits_are_bounded() {
    let mut cfg = SecurityConfig::default();
    for bits in [128, 192, 256] {
        cfg.crypto.symmetric_key_bits = bits;
        cfg.validate().expect("supported size rejected");
    }
    cfg.crypto.symmetric_key_bits = 512;
    assert!(cfg.validate().is_err());
}

#[test]
fn config_deserializes_from_toml_fragment() {
    let cfg: SecurityConfig = toml_from_str(
        r#"
        [defense]
        captcha_threshold = 2
        lock_threshold = 4
        lockout_duration_ms = 60000
        post_lockout = "challenge_required"
        "#,
    );
    assert_eq!(cfg.defense.captcha_threshold, 2);
    assert_eq!(cfg.defense.post_lockout, PostLockout::ChallengeRequired);
    // Untouched sections keep their defaults.
    assert_eq!(cfg.crypto.symmetric_key_bits, 256);
}

fn toml_from_str(raw: &str) -> SecurityConfig {
    config::Config::builder()
        .add_source(config::File::from_str(raw, config::FileFormat::Toml))
        .build()
        .expect("fragment must parse")
        .try_deserialize()
        .expect("fragment must deserialize")
}
