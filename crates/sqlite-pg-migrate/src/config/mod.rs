//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl TargetConfig {
    /// Build a libpq-style connection string (password omitted).
    pub fn display_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} sslmode={}",
            self.host, self.port, self.database, self.user, self.ssl_mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let yaml = r#"
source:
  path: ./database.sqlite
target:
  host: localhost
  database: management_db
  user: postgres
  password: postgres
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.source.r#type, "sqlite");
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.schema, "public");
        assert_eq!(config.target.ssl_mode, "disable");
        assert!(config.migration.tables.is_empty());
        assert!(config.migration.column_overrides.is_empty());
    }

    #[test]
    fn test_from_yaml_reads_overrides() {
        let yaml = r#"
source:
  path: /data/app.sqlite
target:
  host: db
  port: 6543
  database: app
  user: app
migration:
  tables: [ad_types]
  column_overrides:
    communities:
      ad_specialist_name: specialist
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.target.port, 6543);
        assert_eq!(config.migration.tables, vec!["ad_types".to_string()]);
        assert_eq!(
            config.migration.column_overrides["communities"]["ad_specialist_name"],
            "specialist"
        );
    }

    #[test]
    fn test_from_yaml_missing_target_fails() {
        let yaml = "source:\n  path: ./database.sqlite\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_display_string_hides_password() {
        let yaml = r#"
source:
  path: ./database.sqlite
target:
  host: localhost
  database: management_db
  user: postgres
  password: hunter2
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let display = config.target.display_string();
        assert!(display.contains("dbname=management_db"));
        assert!(!display.contains("hunter2"));
    }
}
