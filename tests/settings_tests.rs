//! Configuration loading tests

#[cfg(test)]
mod tests {
    use agent_body::settings::{load_config, validate};
    use agent_body::types::{AgentConfig, RuntimeConfig, TurnStrategy};
    use agent_body::AgentError;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn write_config(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("agent-body-{}-{}.toml", name, std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_without_file() {
        let config = assert_ok!(load_config(None));
        assert_eq!(config.connect.world_id, "default");
        assert_eq!(config.connect.identity.name, "agent");
        assert_eq!(config.runtime.tick_rate_hz, 30.0);
        assert_eq!(config.navigation.tick_interval_ms, 100);
        assert_eq!(config.navigation.strategy, TurnStrategy::SignedAngle);
        assert_eq!(config.random_walk.interval_ms, 5_000);
        assert_eq!(config.random_walk.max_distance, 7.0);
    }

    #[test]
    fn file_overrides_defaults_per_key() {
        let path = write_config(
            "partial",
            r#"
[connect]
ws_url = "wss://world.example/ws"
world_id = "plaza"

[connect.identity]
name = "scout"

[navigation]
strategy = "snap"
turn_threshold_deg = 30.0

[random_walk]
max_distance = 12.5
"#,
        );

        let config = assert_ok!(load_config(Some(&path)));
        assert_eq!(config.connect.ws_url, "wss://world.example/ws");
        assert_eq!(config.connect.world_id, "plaza");
        assert_eq!(config.connect.identity.name, "scout");
        assert_eq!(config.navigation.strategy, TurnStrategy::Snap);
        assert_eq!(config.navigation.turn_threshold_deg, 30.0);
        // Untouched keys keep their defaults.
        assert_eq!(config.navigation.tick_interval_ms, 100);
        assert_eq!(config.random_walk.max_distance, 12.5);
        assert_eq!(config.random_walk.interval_ms, 5_000);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn environment_overrides_file() {
        std::env::set_var("AGENT_RUNTIME__ENTITY_SYNC_INTERVAL_MS", "250");
        let path = write_config(
            "env",
            r#"
[runtime]
entity_sync_interval_ms = 5000
appearance_retry_ms = 750
"#,
        );

        let config = assert_ok!(load_config(Some(&path)));
        assert_eq!(config.runtime.entity_sync_interval_ms, 250);
        assert_eq!(config.runtime.appearance_retry_ms, 750);

        std::env::remove_var("AGENT_RUNTIME__ENTITY_SYNC_INTERVAL_MS");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn non_finite_tick_rate_is_rejected() {
        let path = write_config(
            "nan-rate",
            r#"
[runtime]
tick_rate_hz = nan
"#,
        );

        let err = assert_err!(load_config(Some(&path)));
        assert!(matches!(err, AgentError::InvalidArgument(_)));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn validate_rejects_overrides_applied_after_loading() {
        let mut config = AgentConfig::default();
        assert_ok!(validate(&config));

        config.runtime.tick_rate_hz = f32::NAN;
        assert_err!(validate(&config));

        config.runtime.tick_rate_hz = 30.0;
        config.random_walk.max_distance = 0.0;
        assert_err!(validate(&config));
    }

    #[test]
    fn tick_period_falls_back_on_non_finite_rate() {
        let mut runtime = RuntimeConfig::default();
        let default_period = runtime.tick_period();

        runtime.tick_rate_hz = f32::NAN;
        assert_eq!(runtime.tick_period(), default_period);

        runtime.tick_rate_hz = 1_000.0;
        assert_eq!(runtime.tick_period(), Duration::from_secs_f32(1.0 / 240.0));
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("agent-body-does-not-exist.toml");
        let err = assert_err!(load_config(Some(&path)));
        assert!(matches!(err, AgentError::Config(_)));
    }
}
