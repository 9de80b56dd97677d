//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use crate::types::Condition;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.models.dir, "models");
        assert_eq!(config.models.heart_disease, "heart_disease_ensemble.json");
        assert_eq!(config.models.gastric_cancer, "gastric_cancer_ensemble.json");
        assert_eq!(config.training.test_fraction, 0.2);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert!(config.server.jwt_secret.is_none());
        assert_eq!(config.storage.database_url, "sqlite://predictions.db");
        assert!(config.storage.enabled);
    }

    #[test]
    fn test_partial_sections() {
        let toml_str = r#"
[server]
port = 8080
jwt_secret = "s3cret"

[storage]
enabled = false
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.jwt_secret.as_deref(), Some("s3cret"));
        assert!(!config.storage.enabled);
        assert_eq!(config.storage.database_url, "sqlite://predictions.db");
    }

    #[test]
    fn test_path_for_condition() {
        let models = ModelsConfig {
            dir: "/srv/models".to_string(),
            ..Default::default()
        };
        assert_eq!(
            models.path_for(Condition::HeartDisease).unwrap(),
            PathBuf::from("/srv/models/heart_disease_ensemble.json")
        );
        assert_eq!(
            models.path_for(Condition::GastricCancer).unwrap(),
            PathBuf::from("/srv/models/gastric_cancer_ensemble.json")
        );
    }

    #[test]
    fn test_absolute_bundle_path_overrides_dir() {
        let models = ModelsConfig {
            dir: "models".to_string(),
            heart_disease: "/opt/heart.json".to_string(),
            ..Default::default()
        };
        assert_eq!(
            models.path_for(Condition::HeartDisease).unwrap(),
            PathBuf::from("/opt/heart.json")
        );
    }

    #[test]
    fn test_training_fraction_validation() {
        let ok = TrainingConfig::default();
        assert!(ok.validate().is_ok());

        let bad = TrainingConfig {
            test_fraction: 1.5,
            seed: 1,
        };
        assert!(bad.validate().is_err());

        let zero = TrainingConfig {
            test_fraction: 0.0,
            seed: 1,
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[models]
dir = "/tmp/bundles"

[training]
seed = 7
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.models.dir, "/tmp/bundles");
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.training.test_fraction, 0.2);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = Config::load("/nonexistent/dual-risk-config.toml").unwrap();
        assert_eq!(config.server.port, 5000);
    }
}
