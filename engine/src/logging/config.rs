use std::collections::HashMap;
use tracing::Level;

/// Per-scope log levels layered over a global level.
///
/// Parsed from strings such as `warn,locomotion=debug,session=info`: bare
/// entries set the global level, `scope=level` entries override one scope.
#[derive(Debug, Clone)]
pub struct LogConfig {
    global_level: Level,
    scope_levels: HashMap<String, Level>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self {
            global_level: Level::WARN,
            scope_levels: HashMap::new(),
        }
    }

    pub fn from_env(env_var_name: &str) -> Self {
        let mut config = Self::new();

        if let Ok(log_config) = std::env::var(env_var_name) {
            config.parse_config_string(&log_config);
        }

        config
    }

    pub fn parse(config_str: &str) -> Self {
        let mut config = Self::new();
        config.parse_config_string(config_str);
        config
    }

    fn parse_config_string(&mut self, config_str: &str) {
        for part in config_str.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('=') {
                Some((scope, level)) => {
                    if let Some(level) = parse_level(level.trim()) {
                        self.scope_levels.insert(scope.trim().to_string(), level);
                    }
                }
                None => {
                    if let Some(level) = parse_level(part) {
                        self.global_level = level;
                    }
                }
            }
        }
    }

    pub fn should_log(&self, scope: &str, level: Level) -> bool {
        let target_level = self.scope_levels.get(scope).unwrap_or(&self.global_level);
        level <= *target_level
    }

    pub fn global_level(&self) -> Level {
        self.global_level
    }

    pub fn set_global_level(&mut self, level: Level) {
        self.global_level = level;
    }

    pub fn set_scope_level(&mut self, scope: String, level: Level) {
        self.scope_levels.insert(scope, level);
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_level(level_str: &str) -> Option<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Install the global `tracing` subscriber and the scoped level table.
///
/// The subscriber honours `RUST_LOG`; the scope table is read from
/// `env_var_name` (e.g. `init_logging("WAYFINDER_LOG")`). Calling this more
/// than once keeps the first installation.
pub fn init_logging(env_var_name: &str) -> LogConfig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let config = LogConfig::from_env(env_var_name);
    super::set_log_config(config.clone());
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_level() {
        let config = LogConfig::parse("debug");
        assert_eq!(config.global_level, Level::DEBUG);
    }

    #[test]
    fn test_parse_scope_levels() {
        let config = LogConfig::parse("warn, locomotion=debug ,session=trace");

        assert_eq!(config.global_level, Level::WARN);
        assert_eq!(config.scope_levels.get("locomotion"), Some(&Level::DEBUG));
        assert_eq!(config.scope_levels.get("session"), Some(&Level::TRACE));
    }

    #[test]
    fn test_unknown_levels_are_ignored() {
        let config = LogConfig::parse("loud,teleport=shouting");

        assert_eq!(config.global_level, Level::WARN);
        assert!(config.scope_levels.is_empty());
    }

    #[test]
    fn test_should_log() {
        let mut config = LogConfig::new();
        config.set_global_level(Level::WARN);
        config.set_scope_level("comfort".to_string(), Level::DEBUG);

        assert!(config.should_log("unknown", Level::ERROR));
        assert!(config.should_log("unknown", Level::WARN));
        assert!(!config.should_log("unknown", Level::INFO));

        assert!(config.should_log("comfort", Level::ERROR));
        assert!(config.should_log("comfort", Level::DEBUG));
        assert!(!config.should_log("comfort", Level::TRACE));
    }
}
