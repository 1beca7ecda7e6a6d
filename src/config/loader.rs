//! Layered configuration loading.
//!
//! Layers merge lowest to highest: defaults, the configuration file,
//! `LIVESWAP_*` environment variables, then command-line flags. The layers
//! are composed by hand with `MergeComposer` because the `Cli` owns
//! subcommand parsing and the `--config` path, and because typed
//! environment values must fail loudly instead of being skipped.
//!
//! # Environment variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `LIVESWAP_ENGINE_SOCKET` | `engine_socket` |
//! | `LIVESWAP_UPDATE_MODE` | `update_mode` |
//! | `LIVESWAP_KUBE_CONTEXT` | `kube_context` |
//! | `LIVESWAP_CLUSTER_KUBECTL` | `cluster.kubectl` |
//! | `LIVESWAP_CLUSTER_NAMESPACE` | `cluster.namespace` |
//! | `LIVESWAP_CLUSTER_ENV` | `cluster.env` |
//! | `LIVESWAP_PROBE_DAEMON_TIMEOUT_SECS` | `probe.daemon_timeout_secs` |
//! | `LIVESWAP_PROBE_CLUSTER_TIMEOUT_SECS` | `probe.cluster_timeout_secs` |

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};
use tracing::debug;

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, Result};
use crate::mode::UpdateMode;

/// How a raw environment value is checked before it joins the env layer.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// Accepted as-is.
    String,
    /// Must parse as an update mode.
    UpdateMode,
    /// Must parse as an unsigned integer.
    U64,
}

struct EnvVarSpec {
    env_var: &'static str,
    path: &'static [&'static str],
    var_type: EnvVarType,
}

const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "LIVESWAP_ENGINE_SOCKET",
        path: &["engine_socket"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "LIVESWAP_UPDATE_MODE",
        path: &["update_mode"],
        var_type: EnvVarType::UpdateMode,
    },
    EnvVarSpec {
        env_var: "LIVESWAP_KUBE_CONTEXT",
        path: &["kube_context"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "LIVESWAP_CLUSTER_KUBECTL",
        path: &["cluster", "kubectl"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "LIVESWAP_CLUSTER_NAMESPACE",
        path: &["cluster", "namespace"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "LIVESWAP_CLUSTER_ENV",
        path: &["cluster", "env"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "LIVESWAP_PROBE_DAEMON_TIMEOUT_SECS",
        path: &["probe", "daemon_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "LIVESWAP_PROBE_CLUSTER_TIMEOUT_SECS",
        path: &["probe", "cluster_timeout_secs"],
        var_type: EnvVarType::U64,
    },
];

/// Names of every environment variable the loader reads.
///
/// Does not include `LIVESWAP_CONFIG_PATH`, which only affects discovery.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Load configuration from every layer.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` for an unreadable or malformed file,
/// `ConfigError::InvalidValue` for a malformed typed environment variable,
/// and `ConfigError::OrthoConfig` when the merged layers do not form a valid
/// configuration.
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    if let Some(path) = config_file_path(cli) {
        debug!(path = %path, "loading configuration file");
        load_config_file(&path, &mut composer)?;
    }

    let env_values = collect_env_vars()?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    Ok(config)
}

/// The `--config` path when it exists, else the first discovered candidate.
fn config_file_path(cli: &Cli) -> Option<Utf8PathBuf> {
    cli.config.clone().filter(|p| p.exists()).or_else(|| {
        ConfigDiscovery::builder("liveswap")
            .env_var("LIVESWAP_CONFIG_PATH")
            .config_file_name("config.toml")
            .dotfile_name(".liveswap.toml")
            .build()
            .candidates()
            .into_iter()
            .filter(|p| p.exists())
            .find_map(|p| Utf8PathBuf::try_from(p).ok())
    })
}

fn load_config_file(path: &Utf8Path, composer: &mut MergeComposer) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;
    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;
    let value = toml::from_str::<Value>(&content).map_err(|e| ConfigError::ParseError {
        message: format!("failed to parse {path}: {e}"),
    })?;

    composer.push_file(value, Some(path.to_path_buf()));
    Ok(())
}

fn collect_env_vars() -> Result<Value> {
    let mut root = Map::new();
    for spec in ENV_VAR_SPECS {
        let Ok(raw_value) = std::env::var(spec.env_var) else {
            continue;
        };
        let json_value = parse_env_value(spec, raw_value)?;
        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

fn parse_env_value(spec: &EnvVarSpec, raw_value: String) -> Result<Value> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        field: spec.env_var.to_owned(),
        reason,
    };
    match spec.var_type {
        EnvVarType::String => Ok(Value::String(raw_value)),
        EnvVarType::UpdateMode => raw_value
            .parse::<UpdateMode>()
            .map(|mode| Value::String(String::from(mode)))
            .map_err(|reason| invalid(reason).into()),
        EnvVarType::U64 => raw_value
            .parse::<u64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| invalid(format!("expected unsigned integer, got '{raw_value}'")).into()),
    }
}

/// Insert `value` under `path`, creating intermediate objects.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }
    current.insert(field.to_owned(), value);
}

fn build_cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();

    if let Some(ref socket) = cli.engine_socket {
        overrides.insert("engine_socket".to_owned(), Value::String(socket.clone()));
    }
    if let Some(mode) = cli.update_mode {
        overrides.insert("update_mode".to_owned(), Value::String(String::from(mode)));
    }
    if let Some(ref context) = cli.kube_context {
        overrides.insert("kube_context".to_owned(), Value::String(context.clone()));
    }

    if overrides.is_empty() {
        Value::Null
    } else {
        Value::Object(overrides)
    }
}
