use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys are addressed with a double underscore, e.g.
/// `FEEDLINE_PIPELINE__MAX_CONCURRENT_WRITES=8`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("FEEDLINE_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[server]
port = 9000

[pipeline]
max_concurrent_writes = 5
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.pipeline.max_concurrent_writes, 5);
    }

    #[test]
    fn test_load_config_from_str_empty_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.container, "arxiv-data");
        assert!(config.llm.is_none());
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[server]
port = "not a port"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
host = "127.0.0.1"
port = 3000

[feed]
base_url = "http://localhost:9999/rss"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.feed.base_url, "http://localhost:9999/rss");
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
[pipeline]
max_concurrent_writes = 4

[storage]
container = "from-file"

[llm]
api_base = "http://localhost:8000/v1"
"#,
            )?;
            jail.set_env("FEEDLINE_PIPELINE__MAX_CONCURRENT_WRITES", "12");
            jail.set_env("FEEDLINE_RETRY__MAX_ATTEMPTS", "5");
            jail.set_env("FEEDLINE_LLM__API_KEY", "from-env");

            let config = load_config(Path::new("config.toml")).expect("config loads");
            assert_eq!(config.pipeline.max_concurrent_writes, 12);
            assert_eq!(config.retry.max_attempts, 5);
            assert_eq!(config.storage.container, "from-file");
            assert_eq!(
                config.llm.and_then(|llm| llm.api_key).as_deref(),
                Some("from-env")
            );
            Ok(())
        });
    }

    #[test]
    fn test_env_override_with_bad_value_fails() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "")?;
            jail.set_env("FEEDLINE_PIPELINE__MAX_CONCURRENT_WRITES", "many");

            let result = load_config(Path::new("config.toml"));
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }
}
