//! Tests for configuration loading and validation

use super::*;
use std::io::Write;

fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config");
    file
}

fn env(vars: &[(&str, &str)]) -> Option<HashMap<String, String>> {
    Some(
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

mod defaults {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = QueueConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.queue_name().unwrap().as_str(), "queue");
        assert_eq!(config.pending_name().unwrap().as_str(), "ack:queue");
        assert_eq!(config.ttl(), Duration::from_secs(30));
        assert_eq!(
            config.store,
            StoreConfig::Redis {
                url: "redis://127.0.0.1:6379".to_string()
            }
        );
    }

    #[test]
    fn test_default_retry_policy_matches_retry_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_load_without_sources_gives_defaults() {
        let config = QueueConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(config, QueueConfig::default());
    }
}

mod loading {
    use super::*;

    #[test]
    fn test_load_yaml_file() {
        let file = write_config(
            ".yaml",
            r#"
queue:
  name: jobs
  retry:
    max_attempts: 5
    use_jitter: false
safe:
  ttl_seconds: 90
store:
  type: in_memory
"#,
        );

        let config = QueueConfig::load_with_env(Some(file.path()), env(&[])).unwrap();

        assert_eq!(config.queue.name, "jobs");
        assert_eq!(config.pending_name().unwrap().as_str(), "ack:jobs");
        assert_eq!(config.ttl(), Duration::from_secs(90));
        assert_eq!(config.store, StoreConfig::InMemory);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert!(!policy.use_jitter);
        assert_eq!(policy.initial_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_load_toml_file_with_explicit_pending_name() {
        let file = write_config(
            ".toml",
            r#"
[queue]
name = "orders"

[safe]
pending_name = "orders-inflight"

[store]
type = "redis"
url = "redis://cache:6380/2"
"#,
        );

        let config = QueueConfig::load_with_env(Some(file.path()), env(&[])).unwrap();

        assert_eq!(config.pending_name().unwrap().as_str(), "orders-inflight");
        assert_eq!(
            config.store,
            StoreConfig::Redis {
                url: "redis://cache:6380/2".to_string()
            }
        );
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config(".yaml", "queue:\n  name: jobs\nsafe:\n  ttl_seconds: 90\n");

        let config = QueueConfig::load_with_env(
            Some(file.path()),
            env(&[
                ("SAFE_QUEUE__SAFE__TTL_SECONDS", "5"),
                ("SAFE_QUEUE__QUEUE__NAME", "emails"),
            ]),
        )
        .unwrap();

        assert_eq!(config.queue.name, "emails");
        assert_eq!(config.ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_environment_selects_store() {
        let config = QueueConfig::load_with_env(
            None,
            env(&[
                ("SAFE_QUEUE__STORE__TYPE", "redis"),
                ("SAFE_QUEUE__STORE__URL", "redis://other:6379"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.store,
            StoreConfig::Redis {
                url: "redis://other:6379".to_string()
            }
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let result = QueueConfig::load_with_env(Some(&path), env(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_value_is_parsing_error() {
        let file = write_config(".yaml", "safe:\n  ttl_seconds: soon\n");

        let result = QueueConfig::load_with_env(Some(file.path()), env(&[]));
        assert!(matches!(result, Err(ConfigurationError::Parsing { .. })));
    }
}

mod validation {
    use super::*;

    #[test]
    fn test_zero_ttl_is_rejected() {
        let mut config = QueueConfig::default();
        config.safe.ttl_seconds = 0;

        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Invalid { .. })
        ));
    }

    #[test]
    fn test_invalid_queue_name_is_rejected() {
        let mut config = QueueConfig::default();
        config.queue.name = "bad name!".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pending_name_equal_to_queue_name_is_rejected() {
        let mut config = QueueConfig::default();
        config.safe.pending_name = Some("queue".to_string());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_long_queue_name_needs_explicit_pending_name() {
        let mut config = QueueConfig::default();
        config.queue.name = "q".repeat(258);

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("derived from queue.name"), "{}", message);
        assert!(message.contains("set safe.pending_name explicitly"), "{}", message);

        config.safe.pending_name = Some("q-inflight".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_explicit_pending_name_names_the_setting() {
        let mut config = QueueConfig::default();
        config.safe.pending_name = Some("bad name".to_string());

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("safe.pending_name:"), "{}", message);
    }

    #[test]
    fn test_shrinking_backoff_is_rejected() {
        let mut config = QueueConfig::default();
        config.queue.retry.backoff_multiplier = 0.5;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_delay_below_initial_is_rejected() {
        let mut config = QueueConfig::default();
        config.queue.retry.initial_delay_ms = 500;
        config.queue.retry.max_delay_ms = 100;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_redis_url_is_missing() {
        let mut config = QueueConfig::default();
        config.store = StoreConfig::Redis {
            url: "  ".to_string(),
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Missing { key }) if key == "store.url"
        ));
    }
}
