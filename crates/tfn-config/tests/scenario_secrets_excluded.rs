//! Tokens never live in YAML.
//!
//! - secret-looking literals abort the load with CONFIG_SECRET_DETECTED
//! - env var NAMES load fine and resolve at startup
//! - a missing env var is reported by NAME only
//! - Debug output of a resolved credential is redacted

use tfn_config::{load_layered_yaml_from_strings, resolve_credentials, TiffinConfig};

#[test]
fn secret_literal_is_rejected() {
    let yaml = r#"
auth:
  credentials:
    - token_env: "ghp_abcdefghijklmnop"
      subscriber_id: "9000000001"
      name: "Owner"
      role: owner
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"), "got: {msg}");
    assert!(!msg.contains("abcdefghijklmnop"), "value must be redacted: {msg}");
}

#[test]
fn missing_token_env_is_reported_by_name() {
    let yaml = r#"
auth:
  credentials:
    - token_env: "TFN_TEST_SENTINEL_TOKEN_NEVER_SET_7F3A"
      subscriber_id: "9000000001"
      name: "Owner"
      role: owner
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let cfg = TiffinConfig::from_json(&loaded.config_json).unwrap();
    let err = resolve_credentials(&cfg).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("SECRETS_MISSING"), "got: {msg}");
    assert!(msg.contains("TFN_TEST_SENTINEL_TOKEN_NEVER_SET_7F3A"));
}

#[test]
fn resolved_credential_debug_is_redacted() {
    let var = "TFN_TEST_TOKEN_RESOLVE_OK_91C2";
    std::env::set_var(var, "owner-token-value-123");
    let yaml = format!(
        r#"
auth:
  credentials:
    - token_env: "{var}"
      subscriber_id: "9000000001"
      name: "Owner"
      role: owner
"#
    );
    let loaded = load_layered_yaml_from_strings(&[yaml.as_str()]).unwrap();
    let cfg = TiffinConfig::from_json(&loaded.config_json).unwrap();
    let creds = resolve_credentials(&cfg).unwrap();
    assert_eq!(creds.len(), 1);
    assert_eq!(creds[0].token, "owner-token-value-123");
    assert_eq!(creds[0].subscriber_id.as_str(), "9000000001");

    let dbg = format!("{:?}", creds[0]);
    assert!(dbg.contains("<REDACTED>"));
    assert!(!dbg.contains("owner-token-value-123"));
}

#[test]
fn invalid_subscriber_id_in_credential_is_rejected() {
    let var = "TFN_TEST_TOKEN_BAD_ID_44D1";
    std::env::set_var(var, "some-token");
    let yaml = format!(
        r#"
auth:
  credentials:
    - token_env: "{var}"
      subscriber_id: "12345"
      name: "Owner"
      role: owner
"#
    );
    let loaded = load_layered_yaml_from_strings(&[yaml.as_str()]).unwrap();
    let cfg = TiffinConfig::from_json(&loaded.config_json).unwrap();
    let err = resolve_credentials(&cfg).unwrap_err();
    assert!(err.to_string().contains("CONFIG_INVALID"));
}
