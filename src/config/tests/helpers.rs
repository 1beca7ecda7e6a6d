//! Shared fixtures and helper functions for config tests.

use std::sync::Arc;

use ortho_config::MergeComposer;
use rstest::fixture;

use crate::config::AppConfig;
use crate::mode::UpdateMode;

/// Fixture providing an `AppConfig` parsed from a full TOML example.
#[fixture]
pub fn app_config_from_full_toml() -> AppConfig {
    let toml = r#"
        engine_socket = "unix:///var/run/docker.sock"
        update_mode = "exec"
        kube_context = "kind-dev"

        [cluster]
        kubectl = "/usr/local/bin/kubectl"
        namespace = "dev"
        env = "kind"

        [probe]
        daemon_timeout_secs = 3
        cluster_timeout_secs = 7
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Fixture providing an `AppConfig` parsed from a minimal TOML example.
#[fixture]
pub fn app_config_from_partial_toml() -> AppConfig {
    let toml = r#"
        engine_socket = "unix:///tmp/docker.sock"
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Creates a `MergeComposer` with the serialised defaults layer pushed.
pub fn create_composer_with_defaults() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = MergeComposer::new();
    let defaults = ortho_config::serde_json::to_value(AppConfig::default())?;
    composer.push_defaults(defaults);
    Ok(composer)
}

/// Merges layers from a composer into `AppConfig`.
pub fn merge_config(composer: MergeComposer) -> Result<AppConfig, Arc<ortho_config::OrthoError>> {
    AppConfig::merge_from_layers(composer.layers())
}

/// Asserts that every field holds its default.
pub fn assert_config_has_defaults(config: &AppConfig) {
    assert!(config.engine_socket.is_none(), "engine_socket should be None");
    assert!(config.kube_context.is_none(), "kube_context should be None");
    assert_eq!(config.update_mode, UpdateMode::Auto);
    assert_eq!(config.cluster.kubectl, "kubectl");
    assert_eq!(config.cluster.namespace, "default");
    assert!(config.cluster.env.is_none(), "cluster.env should be None");
    assert_eq!(config.probe.daemon_timeout_secs, 10);
    assert_eq!(config.probe.cluster_timeout_secs, 20);
}

/// Creates a composer with defaults, a file layer and an env layer.
pub fn create_composer_with_file_and_env() -> Result<MergeComposer, serde_json::Error> {
    use ortho_config::serde_json::json;

    let mut composer = create_composer_with_defaults()?;
    composer.push_file(
        json!({
            "engine_socket": "unix:///from/file.sock",
            "update_mode": "image"
        }),
        None,
    );
    composer.push_environment(json!({
        "engine_socket": "unix:///from/env.sock"
    }));
    Ok(composer)
}
