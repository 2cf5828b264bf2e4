#[cfg(test)]
mod tests {
    use crate::config::*;
    use std::path::PathBuf;

    fn unit(name: &str, source: &str) -> BuildUnit {
        BuildUnit {
            name: name.to_string(),
            package: default_package(),
            sources: vec![PathBuf::from(source)],
            web: true,
        }
    }

    fn backend_config() -> AppConfig {
        let mut config = AppConfig::new("/project");
        config.app.has_backend = true;
        config.actions.units = vec![unit("action", "actions/action"), unit("action-zip", "actions/zip")];
        config
    }

    #[test]
    fn test_serialization() {
        let config = backend_config();
        let json = serde_json::to_value(&config).unwrap();

        // root is never persisted
        assert!(json.get("root").is_none());
        // empty maps are skipped
        assert!(json.get("hooks").is_none());
        assert_eq!(json["app"]["has_backend"], true);
        assert_eq!(json["actions"]["units"][1]["name"], "action-zip");

        let back: AppConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.actions, config.actions);
        assert_eq!(back.root, PathBuf::new());
    }

    #[test]
    fn test_unit_defaults() {
        let unit: BuildUnit = serde_json::from_str(r#"{"name":"hello","sources":["actions/hello.js"]}"#).unwrap();
        assert_eq!(unit.package, "default");
        assert!(unit.web);
        assert_eq!(unit.qualified_name(), "default/hello");
    }

    #[test]
    fn test_resolve_paths() {
        let config = AppConfig::new("/project");
        assert_eq!(config.actions_src(), PathBuf::from("/project/actions"));
        assert_eq!(config.web_dist(), PathBuf::from("/project/dist/web-dev"));
        assert_eq!(
            config.injected_config_path(),
            PathBuf::from("/project/web-src/src/config.json")
        );
        assert_eq!(config.resolve(&PathBuf::from("/abs")), PathBuf::from("/abs"));
    }

    #[test]
    fn test_validation() {
        // No frontend, no backend is a valid (empty) project
        assert!(AppConfig::new("/project").validate().is_ok());

        assert!(backend_config().validate().is_ok());

        // Backend without units fails
        let mut config = backend_config();
        config.actions.units.clear();
        assert!(config.validate().is_err());

        // Duplicate unit names fail
        let mut config = backend_config();
        config.actions.units.push(unit("action", "actions/other"));
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("default/action"));

        // Units need at least one source
        let mut config = backend_config();
        config.actions.units[0].sources.clear();
        assert!(config.validate().is_err());

        // Zero log interval fails
        let mut config = AppConfig::new("/project");
        config.fetch_log_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
