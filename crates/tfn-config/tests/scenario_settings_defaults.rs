use std::time::Duration;

use tfn_config::{load_layered_yaml_from_strings, LoadedConfig, TiffinConfig};

#[test]
fn empty_config_yields_documented_defaults() {
    let cfg = LoadedConfig::empty().unwrap().settings().unwrap();
    assert_eq!(cfg.server.addr, "127.0.0.1:8000");
    assert_eq!(cfg.db.max_connections, 10);
    assert_eq!(cfg.billing.number_prefix, "BILL");
    assert_eq!(cfg.billing.number_width, 6);
    assert_eq!(cfg.notify.push_timeout(), Duration::from_millis(250));
    assert_eq!(cfg.notify.channel_buffer, 64);
    assert!(cfg.sweep.enabled);
    assert_eq!(cfg.sweep.interval(), Duration::from_secs(3600));
    assert_eq!(cfg.clock.timezone, "Asia/Kolkata");
    assert!(cfg.auth.credentials.is_empty());
    assert_eq!(cfg, TiffinConfig::default());
}

#[test]
fn partial_section_keeps_sibling_defaults() {
    let loaded = load_layered_yaml_from_strings(&["notify:\n  push_timeout_ms: 50\n"]).unwrap();
    let cfg = loaded.settings().unwrap();
    assert_eq!(cfg.notify.push_timeout_ms, 50);
    assert_eq!(cfg.notify.channel_buffer, 64);
}

#[test]
fn out_of_range_values_are_rejected() {
    for yaml in [
        "billing:\n  number_width: 0\n",
        "notify:\n  channel_buffer: 0\n",
        "sweep:\n  interval_secs: 0\n",
        "billing:\n  number_prefix: \"  \"\n",
    ] {
        let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
        let err = loaded.settings().unwrap_err();
        assert!(err.to_string().contains("CONFIG_INVALID"), "{yaml}: {err}");
    }
}

#[test]
fn unknown_role_fails_schema() {
    let yaml = r#"
auth:
  credentials:
    - token_env: "X"
      subscriber_id: "9000000001"
      name: "Owner"
      role: admin
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    assert!(loaded.settings().is_err());
}
