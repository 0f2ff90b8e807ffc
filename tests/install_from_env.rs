//! Installing the process-wide cipher from the real environment.
//!
//! Environment mutation is only sound while no other thread reads it, so
//! everything runs in one test in its own binary.

use base64::{Engine, engine::general_purpose::STANDARD};
use pwcipher::{CipherConfig, Envelope, ErrorKind, KeyId, Operation};

fn clear_pwcipher_vars() {
    let names: Vec<String> = std::env::vars()
        .map(|(name, _)| name)
        .filter(|name| name.starts_with("PWCIPHER_"))
        .collect();
    for name in names {
        // SAFETY: this binary runs a single test and spawns no threads.
        unsafe { std::env::remove_var(name) };
    }
}

#[test]
fn test_install_from_env() {
    clear_pwcipher_vars();

    // No key source at all.
    let err = pwcipher::install_from_env().unwrap_err();
    assert_eq!(err.kind, Some(ErrorKind::Config));
    assert_eq!(err.operation, Operation::Configure);
    let err = CipherConfig::from_env()
        .unwrap()
        .into_keyring()
        .unwrap_err();
    assert_eq!(err.kind, Some(ErrorKind::Config));
    assert!(!pwcipher::verify("Hello123!", "pwcipher1:AAAA"));

    // SAFETY: as above.
    unsafe {
        std::env::set_var("PWCIPHER_KEY", STANDARD.encode([0x5au8; 32]));
        std::env::set_var("PWCIPHER_KEY_ID", "6");
    }

    let cfg = CipherConfig::from_env().unwrap();
    assert_eq!(cfg.key_id, 6);
    assert!(cfg.key.is_some());

    pwcipher::install_from_env().unwrap();

    let envelope = pwcipher::encrypt("Hello123!").unwrap();
    assert_eq!(pwcipher::decrypt(&envelope).unwrap(), "Hello123!");
    assert!(pwcipher::verify("Hello123!", &envelope));
    assert!(!pwcipher::verify("wrong", &envelope));

    let parsed: Envelope = envelope.parse().unwrap();
    assert_eq!(parsed.key_id(), KeyId::new(6));

    let err = pwcipher::install_from_env().unwrap_err();
    assert_eq!(err.kind, Some(ErrorKind::AlreadyInstalled));
}
