use crate::error::{ReconError, Result};
use crate::types::Config;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variables holding provider keys, comma-separated when several.
const KEY_VARIABLES: [(&str, &str); 4] = [
    ("dnsdumpster", "API_KEY_DNSDUMPSTER"),
    ("securitytrails", "API_KEY_SECURITYTRAILS"),
    ("virustotal", "API_KEY_VIRUSTOTAL"),
    ("hackertarget", "API_KEY_HACKERTARGET"),
];

pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(path) = config_path {
        if !Path::new(path).exists() {
            return Err(ReconError::ConfigError(format!("Config file not found: {}", path)));
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| ReconError::ConfigError(format!("Failed to read config file: {}", e)))?;
        apply_toml(&mut config, &contents)?;
    }

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

pub fn apply_toml(config: &mut Config, contents: &str) -> Result<()> {
    let value: toml::Value = toml::from_str(contents)
        .map_err(|e| ReconError::ConfigError(format!("Failed to parse config file: {}", e)))?;

    let table = match value.as_table() {
        Some(table) => table,
        None => return Ok(()),
    };

    if let Some(secs) = table.get("timeout_secs").and_then(|v| v.as_integer()) {
        config.timeout = Duration::from_secs(non_negative(secs, "timeout_secs")?);
    }
    if let Some(agent) = table.get("user_agent").and_then(|v| v.as_str()) {
        config.user_agent = agent.to_string();
    }
    if let Some(proxy) = table.get("proxy").and_then(|v| v.as_str()) {
        config.proxy = Some(proxy.to_string());
    }
    if let Some(ms) = table.get("page_delay_ms").and_then(|v| v.as_integer()) {
        config.page_delay = Duration::from_millis(non_negative(ms, "page_delay_ms")?);
    }
    if let Some(parallel) = table.get("parallel").and_then(|v| v.as_bool()) {
        config.parallel = parallel;
    }
    if let Some(sources) = table.get("sources").and_then(|v| v.as_array()) {
        config.sources = string_array(sources);
    }

    if let Some(api_keys) = table.get("api_keys").and_then(|v| v.as_table()) {
        for (source, value) in api_keys {
            let keys = match value {
                toml::Value::Array(values) => string_array(values),
                toml::Value::String(key) => vec![key.clone()],
                _ => continue,
            };
            config.api_keys.insert(source.to_lowercase(), keys);
        }
    }

    if let Some(rate_limits) = table.get("rate_limits").and_then(|v| v.as_table()) {
        for (source, value) in rate_limits {
            let limit = match value.as_integer() {
                Some(0) | None => None,
                Some(n) => Some(u32::try_from(n).map_err(|_| {
                    ReconError::ConfigError(format!("Invalid rate limit for {}: {}", source, n))
                })?),
            };
            config.rate_limits.insert(source.to_lowercase(), limit);
        }
    }

    if let Some(endpoints) = table.get("endpoints").and_then(|v| v.as_table()) {
        for (source, value) in endpoints {
            if let Some(url) = value.as_str() {
                config.endpoints.insert(source.to_lowercase(), url.trim_end_matches('/').to_string());
            }
        }
    }

    if let Some(resolver) = table.get("resolver").and_then(|v| v.as_table()) {
        if let Some(enabled) = resolver.get("enabled").and_then(|v| v.as_bool()) {
            config.resolver.enabled = enabled;
        }
        if let Some(threads) = resolver.get("threads").and_then(|v| v.as_integer()) {
            config.resolver.threads = non_negative(threads, "resolver.threads")? as usize;
        }
        if let Some(secs) = resolver.get("timeout_secs").and_then(|v| v.as_integer()) {
            config.resolver.timeout = Duration::from_secs(non_negative(secs, "resolver.timeout_secs")?);
        }
        if let Some(nameservers) = resolver.get("nameservers").and_then(|v| v.as_array()) {
            config.resolver.nameservers = string_array(nameservers);
        }
        if let Some(system) = resolver.get("use_system_resolver").and_then(|v| v.as_bool()) {
            config.resolver.use_system_resolver = system;
        }
    }

    if let Some(correlation) = table.get("correlation").and_then(|v| v.as_table()) {
        if let Some(patterns) = correlation.get("generic_patterns").and_then(|v| v.as_array()) {
            config.correlation.generic_patterns = string_array(patterns);
        }
        if let Some(defaults) = correlation.get("use_default_patterns").and_then(|v| v.as_bool()) {
            config.correlation.use_default_patterns = defaults;
        }
    }

    Ok(())
}

pub fn apply_env_overrides(config: &mut Config) {
    for (source, variable) in KEY_VARIABLES {
        if let Ok(value) = env::var(variable) {
            let keys = split_keys(&value);
            if !keys.is_empty() {
                config.api_keys.insert(source.to_string(), keys);
            }
        }
    }
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.timeout.is_zero() {
        return Err(ReconError::ConfigError("Timeout must be greater than 0".to_string()));
    }
    if config.page_delay.is_zero() {
        return Err(ReconError::ConfigError("Page delay must be greater than 0".to_string()));
    }
    if config.resolver.threads == 0 {
        return Err(ReconError::ConfigError("Resolver threads must be greater than 0".to_string()));
    }
    Ok(())
}

fn split_keys(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn string_array(values: &[toml::Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect()
}

fn non_negative(value: i64, key: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| ReconError::ConfigError(format!("{} must not be negative", key)))
}
