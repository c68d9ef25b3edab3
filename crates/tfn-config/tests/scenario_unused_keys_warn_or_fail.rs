use tfn_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigConsumer, UnusedKeyPolicy};

const YAML: &str = r#"
server:
  addr: "127.0.0.1:9000"
sweep:
  interval_secs: 60
legacy:
  menu_csv: "menu.csv"
"#;

#[test]
fn warn_reports_unused_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report = report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .unwrap();
    assert_eq!(report.unused_leaf_pointers, vec!["/legacy/menu_csv".to_string()]);
}

#[test]
fn fail_errors_on_unused() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Fail,
    )
    .unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn cli_does_not_consume_daemon_only_sections() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigConsumer::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)
            .unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/legacy/menu_csv".to_string(),
            "/server/addr".to_string(),
            "/sweep/interval_secs".to_string(),
        ]
    );
}

#[test]
fn prefix_match_respects_segment_boundary() {
    let yaml = r#"
serverless:
  x: 1
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .unwrap();
    assert_eq!(report.unused_leaf_pointers, vec!["/serverless/x".to_string()]);
}
