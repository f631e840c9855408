//! Tests for the safe-queue-cli library module.

use super::*;
use std::io::Write;

fn in_memory_config_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(b"queue:\n  name: cli-test\nstore:\n  type: in_memory\n")
        .expect("Failed to write config");
    file
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments should parse")
}

#[test]
fn test_cli_parsing() {
    let cli = parse(&["safe-queue", "checkout", "--ack"]);

    match cli.command {
        Commands::Checkout { ack } => assert!(ack),
        _ => panic!("Expected Checkout command"),
    }
    assert_eq!(cli.log_level, "info");
    assert!(!cli.json_logs);
}

#[test]
fn test_push_requires_payload() {
    assert!(Cli::try_parse_from(["safe-queue", "push"]).is_err());

    let cli = parse(&["safe-queue", "push", "a", "b|c"]);
    match cli.command {
        Commands::Push { payloads } => assert_eq!(payloads, vec!["a", "b|c"]),
        _ => panic!("Expected Push command"),
    }
}

#[test]
fn test_global_overrides_are_applied() {
    let file = in_memory_config_file();
    let path = file.path().to_str().unwrap();
    let cli = parse(&[
        "safe-queue",
        "--config",
        path,
        "--queue",
        "orders",
        "--redis-url",
        "redis://cache:6379",
        "stats",
    ]);

    let config = load_configuration(&cli).unwrap();

    assert_eq!(config.queue.name, "orders");
    assert_eq!(config.pending_name().unwrap().as_str(), "ack:orders");
    assert_eq!(
        config.store,
        StoreConfig::Redis {
            url: "redis://cache:6379".to_string()
        }
    );
}

#[test]
fn test_invalid_queue_override_is_rejected() {
    let cli = parse(&["safe-queue", "--queue", "bad name", "stats"]);

    assert!(matches!(
        load_configuration(&cli),
        Err(CliError::Configuration(_))
    ));
}

#[test]
fn test_render_config_formats() {
    let config = QueueConfig::default();

    let yaml = render_config(&config, &ConfigFormat::Yaml).unwrap();
    assert!(yaml.contains("name: queue"));
    assert!(yaml.contains("ttl_seconds: 30"));

    let json = render_config(&config, &ConfigFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["store"]["type"], "redis");
    assert_eq!(value["queue"]["retry"]["max_attempts"], 3);
}

#[test]
fn test_parse_receipt() {
    let receipt = parse_receipt("1700000000000000:4|a|b").unwrap();
    assert_eq!(receipt.delivered_at(), 1_700_000_000_000_000);
    assert_eq!(receipt.token().sequence(), 4);
    assert_eq!(receipt.token().payload(), "a|b");

    assert!(matches!(
        parse_receipt("4|a|b"),
        Err(CliError::InvalidArgument { .. })
    ));
    assert!(parse_receipt("17:x|payload").is_err());
}

#[tokio::test]
async fn test_run_against_in_memory_store() {
    let file = in_memory_config_file();
    let path = file.path().to_str().unwrap();

    run(parse(&["safe-queue", "--config", path, "push", "one", "two"]))
        .await
        .unwrap();
    run(parse(&["safe-queue", "--config", path, "checkout", "--ack"]))
        .await
        .unwrap();
    run(parse(&["safe-queue", "--config", path, "stats", "--format", "json"]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_ack_of_unknown_receipt_fails() {
    let file = in_memory_config_file();
    let path = file.path().to_str().unwrap();

    let result = run(parse(&["safe-queue", "--config", path, "ack", "17:0|missing"])).await;

    assert!(matches!(
        result,
        Err(CliError::Queue(QueueError::AckFailed { .. }))
    ));
}

#[tokio::test]
async fn test_purge_requires_confirmation() {
    let result = run(parse(&["safe-queue", "purge"])).await;

    assert!(matches!(
        result,
        Err(CliError::InvalidArgument { arg, .. }) if arg == "--yes"
    ));
}
