//! Configuration resolution from the environment.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::config::env::EnvSource;
use crate::config::schema::{AppEnv, ConfigSchema, SettingKind};

/// Error type for configuration resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting did not parse.
    #[error("{key} must be an integer, got {value:?}")]
    InvalidInteger { key: String, value: String },

    /// A required variable has no value and no safe default.
    #[error("{0} not set")]
    MissingVariable(String),

    /// The resolved values did not fit the typed configuration.
    #[error("invalid configuration: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Resolve every setting in `schema` against `env`.
///
/// A variable that is present and non-empty overrides the declared default.
/// Resolution is a pure function of the schema and the environment contents.
pub fn resolve<E: EnvSource>(schema: &ConfigSchema, env: &E) -> Result<AppEnv, ConfigError> {
    let mut values = Map::new();

    for setting in schema.settings() {
        let raw = match env.var(setting.key) {
            Some(v) if !v.is_empty() => v,
            _ => setting.default.to_string(),
        };

        let value = match setting.kind {
            SettingKind::String => Value::String(raw),
            SettingKind::Integer => Value::Number(Number::from(parse_u64(setting.key, &raw)?)),
            SettingKind::Port => {
                let port: u16 = raw.trim().parse().map_err(|_| ConfigError::InvalidInteger {
                    key: setting.key.to_string(),
                    value: raw.clone(),
                })?;
                Value::Number(Number::from(port))
            }
        };

        values.insert(setting.key.to_string(), value);
    }

    let app_env: AppEnv = serde_json::from_value(Value::Object(values))?;

    tracing::debug!(
        address = %app_env.address,
        port = app_env.port,
        debug_port = app_env.debug_port,
        database_name = %app_env.database_name,
        "Environment resolved"
    );

    Ok(app_env)
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidInteger {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults_without_overrides() {
        let app_env = resolve(&ConfigSchema::standard(), &env(&[])).unwrap();
        assert_eq!(app_env.address, "0.0.0.0");
        assert_eq!(app_env.port, 651);
        assert_eq!(app_env.debug_port, 1051);
        assert_eq!(app_env.database_name, "pachyderm");
        assert_eq!(app_env.database_address, "");
        assert_eq!(app_env.pfs_candidates(), PfsCandidates::default());
        assert_eq!(app_env.server().request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides_win() {
        let app_env = resolve(
            &ConfigSchema::standard(),
            &env(&[
                (PPS_PORT, "7651"),
                (PPS_TRACE_PORT, "8051"),
                (PPS_DATABASE_NAME, "pps_test"),
                (PPS_DATABASE_ADDRESS, "db.internal:28015"),
            ]),
        )
        .unwrap();
        assert_eq!(app_env.port, 7651);
        assert_eq!(app_env.debug_port, 8051);
        assert_eq!(app_env.database_name, "pps_test");
        assert_eq!(app_env.persist().address, "db.internal:28015");
    }

    #[test]
    fn test_empty_value_falls_back_to_default() {
        let app_env =
            resolve(&ConfigSchema::standard(), &env(&[(PPS_PORT, ""), (PPS_DATABASE_NAME, "")]))
                .unwrap();
        assert_eq!(app_env.port, 651);
        assert_eq!(app_env.database_name, "pachyderm");
    }

    #[test]
    fn test_malformed_integer_is_config_error() {
        let err = resolve(&ConfigSchema::standard(), &env(&[(PPS_PORT, "six-fifty-one")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidInteger { key, value } => {
                assert_eq!(key, PPS_PORT);
                assert_eq!(value, "six-fifty-one");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_port_out_of_range_is_config_error() {
        let err = resolve(&ConfigSchema::standard(), &env(&[(PPS_TRACE_PORT, "70000")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInteger { .. }));
        assert!(err.to_string().contains(PPS_TRACE_PORT));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let source = env(&[
            (PACHYDERM_PFSD_1_PORT, "tcp://10.0.0.5:650"),
            (PPS_REQUEST_TIMEOUT_SECS, "5"),
            (DOCKER_HOST, "tcp://127.0.0.1:2375"),
        ]);
        let schema = ConfigSchema::standard();
        let first = resolve(&schema, &source).unwrap();
        let second = resolve(&schema, &source).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_schema_default() {
        let schema = ConfigSchema::standard().with_default(PPS_DATABASE_NAME, "scratch");
        let app_env = resolve(&schema, &env(&[])).unwrap();
        assert_eq!(app_env.database_name, "scratch");
    }
}
