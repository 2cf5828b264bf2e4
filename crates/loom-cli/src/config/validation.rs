use crate::config::AppConfig;
use crate::error::{ConfigError, Result};
use std::collections::HashSet;

impl AppConfig {
    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.app.has_backend {
            if self.actions.units.is_empty() {
                return Err(ConfigError::MissingField {
                    field: "actions.units".to_string(),
                    hint: "Declare at least one unit or set app.has_backend = false".to_string(),
                }
                .into());
            }

            let mut seen = HashSet::new();
            for unit in &self.actions.units {
                if unit.name.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "actions.units.name".to_string(),
                        value: String::new(),
                        hint: "Unit names cannot be empty".to_string(),
                    }
                    .into());
                }
                if !seen.insert(unit.qualified_name()) {
                    return Err(ConfigError::InvalidValue {
                        field: "actions.units.name".to_string(),
                        value: unit.qualified_name(),
                        hint: "Unit names must be unique within a package".to_string(),
                    }
                    .into());
                }
                if unit.sources.is_empty() {
                    return Err(ConfigError::MissingField {
                        field: format!("actions.units.{}.sources", unit.name),
                        hint: "Point the unit at a file or a folder".to_string(),
                    }
                    .into());
                }
            }
        }

        if self.app.has_frontend && self.web.src.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "web.src".to_string(),
                hint: "Set web.src or app.has_frontend = false".to_string(),
            }
            .into());
        }

        if self.fetch_log_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch_log_interval_ms".to_string(),
                value: "0".to_string(),
                hint: "Use a positive interval in milliseconds".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
