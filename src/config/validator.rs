use crate::config::{parse_duration, Config};
use crate::error::{ClaritasError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every violation at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_ranking(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ClaritasError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }

        if config.storage.database_file.trim().is_empty() {
            errors.push(ValidationError::new(
                "storage.database_file",
                "Database file name cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }

        if !(-1.0..=1.0).contains(&retrieval.score_threshold) {
            errors.push(ValidationError::new(
                "retrieval.score_threshold",
                format!(
                    "Threshold must be a cosine similarity between -1.0 and 1.0, got {}",
                    retrieval.score_threshold
                ),
            ));
        }

        if retrieval.search_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.search_multiplier",
                "Search multiplier must be at least 1",
            ));
        }

        if retrieval.fallback_scan_limit == 0 {
            errors.push(ValidationError::new(
                "retrieval.fallback_scan_limit",
                "Fallback scan limit must be greater than 0",
            ));
        }

        for (path, value) in [
            ("retrieval.search_timeout", &retrieval.search_timeout),
            ("retrieval.embed_timeout", &retrieval.embed_timeout),
        ] {
            match parse_duration(value) {
                Some(d) if !d.is_zero() => {}
                _ => errors.push(ValidationError::new(
                    path,
                    format!("Invalid duration format: {}", value),
                )),
            }
        }
    }

    fn validate_ranking(config: &Config, errors: &mut Vec<ValidationError>) {
        let ranking = &config.ranking;

        if !(ranking.base_weight.is_finite() && ranking.base_weight > 0.0) {
            errors.push(ValidationError::new(
                "ranking.base_weight",
                format!("Base weight must be positive, got {}", ranking.base_weight),
            ));
        }

        for (path, boost) in [
            ("ranking.topic_boost", ranking.topic_boost),
            ("ranking.keyword_boost", ranking.keyword_boost),
            ("ranking.authority_boost", ranking.authority_boost),
        ] {
            if !(boost.is_finite() && boost >= 0.0) {
                errors.push(ValidationError::new(
                    path,
                    format!("Boost must be a non-negative number, got {}", boost),
                ));
            }
        }

        if ranking.primary_speaker.trim().is_empty() {
            errors.push(ValidationError::new(
                "ranking.primary_speaker",
                "Primary speaker cannot be empty",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_empty_data_dir() {
        let mut config = Config::default();
        config.storage.data_dir = PathBuf::new();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_negative_boost() {
        let mut config = Config::default();
        config.ranking.keyword_boost = -0.1;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        config.retrieval.search_timeout = "soon".to_string();
        config.embedding.dimension = 0;

        match ConfigValidator::validate(&config) {
            Err(ClaritasError::ConfigValidation { errors }) => {
                let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
                assert!(paths.contains(&"retrieval.top_k"));
                assert!(paths.contains(&"retrieval.search_timeout"));
                assert!(paths.contains(&"embedding.dimension"));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.retrieval.embed_timeout = "0s".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
