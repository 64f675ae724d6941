use core_config::{env_or_default, env_parse_or};

use domain_memory::{MemoryError, MemoryResult};

/// Env var consulted for the tenant fallback unless overridden.
pub const DEFAULT_USER_ID_ENV: &str = "DENKER_CURRENT_USER_ID";

/// Tool server configuration
#[derive(Debug, Clone)]
pub struct MemoryServerConfig {
    /// Collection used when a call does not name one.
    pub default_collection: String,
    /// Result count for `find` when the caller does not pass a limit.
    pub default_find_limit: u64,
    /// Upper bound accepted for a caller-supplied limit.
    pub max_find_limit: u64,
    /// Environment variable consulted as the lowest-priority tenant
    /// strategy. `None` disables the fallback entirely (recommended for
    /// production, where identity must come from the call or session).
    pub user_id_env: Option<String>,
}

impl MemoryServerConfig {
    pub fn from_env() -> MemoryResult<Self> {
        // DENKER_USER_ID_ENV="" explicitly disables the env fallback.
        let user_id_env = match std::env::var("DENKER_USER_ID_ENV") {
            Ok(name) if name.trim().is_empty() => None,
            Ok(name) => Some(name),
            Err(_) => Some(DEFAULT_USER_ID_ENV.to_string()),
        };

        let config = Self {
            default_collection: env_or_default("DENKER_DEFAULT_COLLECTION", "memories"),
            default_find_limit: env_parse_or("DENKER_FIND_LIMIT", 10),
            max_find_limit: env_parse_or("DENKER_MAX_FIND_LIMIT", 100),
            user_id_env,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> MemoryResult<()> {
        if self.default_find_limit == 0 || self.max_find_limit == 0 {
            return Err(MemoryError::Config(
                "find limits must be positive integers".to_string(),
            ));
        }
        if self.default_find_limit > self.max_find_limit {
            return Err(MemoryError::Config(format!(
                "DENKER_FIND_LIMIT ({}) exceeds DENKER_MAX_FIND_LIMIT ({})",
                self.default_find_limit, self.max_find_limit
            )));
        }
        if self.default_collection.trim().is_empty() {
            return Err(MemoryError::Config(
                "DENKER_DEFAULT_COLLECTION must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryServerConfig {
    fn default() -> Self {
        Self {
            default_collection: "memories".to_string(),
            default_find_limit: 10,
            max_find_limit: 100,
            user_id_env: Some(DEFAULT_USER_ID_ENV.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        temp_env::with_vars_unset(
            [
                "DENKER_DEFAULT_COLLECTION",
                "DENKER_FIND_LIMIT",
                "DENKER_MAX_FIND_LIMIT",
                "DENKER_USER_ID_ENV",
            ],
            || {
                let config = MemoryServerConfig::from_env().unwrap();
                assert_eq!(config.default_collection, "memories");
                assert_eq!(config.default_find_limit, 10);
                assert_eq!(config.max_find_limit, 100);
                assert_eq!(config.user_id_env.as_deref(), Some(DEFAULT_USER_ID_ENV));
            },
        );
    }

    #[test]
    fn test_empty_user_id_env_disables_fallback() {
        temp_env::with_var("DENKER_USER_ID_ENV", Some(""), || {
            let config = MemoryServerConfig::from_env().unwrap();
            assert_eq!(config.user_id_env, None);
        });
    }

    #[test]
    fn test_default_limit_above_max_is_a_config_error() {
        temp_env::with_vars(
            [
                ("DENKER_FIND_LIMIT", Some("50")),
                ("DENKER_MAX_FIND_LIMIT", Some("10")),
            ],
            || {
                let err = MemoryServerConfig::from_env().unwrap_err();
                assert_eq!(err.code(), "CONFIG_ERROR");
            },
        );
    }
}
