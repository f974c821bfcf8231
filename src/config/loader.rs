//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let expanded = Self::expand_env_vars(&content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables.
    ///
    /// Supports `${VAR_NAME}` and `${VAR_NAME:-default}`. A variable that is
    /// unset and has no default keeps its placeholder, so validation catches
    /// it with a readable message instead of an empty value.
    fn expand_env_vars(content: &str) -> String {
        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]+))?\}").unwrap();
        let mut result = String::with_capacity(content.len());
        let mut last_match = 0;

        for cap in re.captures_iter(content) {
            let full = cap.get(0).unwrap();
            result.push_str(&content[last_match..full.start()]);

            let var_name = cap.get(1).unwrap().as_str();
            match std::env::var(var_name) {
                Ok(value) => result.push_str(&value),
                Err(_) => match cap.get(2) {
                    Some(default) => result.push_str(default.as_str()),
                    None => result.push_str(full.as_str()),
                },
            }

            last_match = full.end();
        }

        result.push_str(&content[last_match..]);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("EXP_UPLOADR_TEST_TOKEN", "secret_from_env");
        let content = "notion_token: ${EXP_UPLOADR_TEST_TOKEN}";
        let expanded = ConfigLoader::expand_env_vars(content);
        assert_eq!(expanded, "notion_token: secret_from_env");
        std::env::remove_var("EXP_UPLOADR_TEST_TOKEN");
    }

    #[test]
    fn test_expand_with_default() {
        let content = "platform_name: ${EXP_UPLOADR_NO_SUCH_VAR:-workstation}";
        let expanded = ConfigLoader::expand_env_vars(content);
        assert_eq!(expanded, "platform_name: workstation");
    }

    #[test]
    fn test_unknown_vars_left_in_place() {
        let content = "notion_token: ${EXP_UPLOADR_NO_SUCH_VAR}";
        let expanded = ConfigLoader::expand_env_vars(content);
        assert_eq!(expanded, content);
    }

    #[test]
    fn test_load_rejects_unresolved_credential() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notion_key.yaml");
        std::fs::write(
            &path,
            "notion_token: ${EXP_UPLOADR_UNSET_TOKEN}\ndatabase_id: db\n",
        )
        .unwrap();

        let result = ConfigLoader::load(&path);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
