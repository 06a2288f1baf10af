//! Configuration file loader for mapservice-publisher
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::WorkflowError;
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".mapservice-publish.yaml";

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Configuration load options
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// CLI arguments (highest priority)
    pub cli_args: Option<PublisherConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    pub valid: bool,
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "capacity.maxInstances")
    pub field: String,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (./.mapservice-publish.yaml)
    /// 4. Global config (~/.mapservice-publish.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublisherConfig, WorkflowError> {
        let mut configs: Vec<PublisherConfig> = Vec::new();

        configs.push(PublisherConfig::default());

        if let Some(global_config) = Self::load_global_config().await? {
            configs.push(global_config);
        }

        if let Some(project_config) = Self::load_project_config(&options.project_path).await? {
            configs.push(project_config);
        }

        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged_config = Self::merge_configs(configs);

        Self::expand_env_vars(merged_config, &options.env)
    }

    /// Load global configuration from ~/.mapservice-publish.yaml
    async fn load_global_config() -> Result<Option<PublisherConfig>, WorkflowError> {
        let Ok(home_dir) = env::var("HOME") else {
            tracing::debug!("HOME not set, skipping global configuration");
            return Ok(None);
        };
        let global_config_path = PathBuf::from(home_dir).join(CONFIG_FILENAME);

        Self::load_config_file(&global_config_path).await
    }

    /// Load project configuration from ./.mapservice-publish.yaml
    async fn load_project_config(
        project_path: &Path,
    ) -> Result<Option<PublisherConfig>, WorkflowError> {
        let project_config_path = project_path.join(CONFIG_FILENAME);

        Self::load_config_file(&project_config_path).await
    }

    /// Load configuration from YAML file, following `extends`
    fn load_config_file(
        file_path: &Path,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Option<PublisherConfig>, WorkflowError>>
                + Send
                + '_,
        >,
    > {
        Box::pin(async move {
            if !file_path.exists() {
                return Ok(None);
            }

            tracing::debug!(path = %file_path.display(), "loading configuration file");

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                WorkflowError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: PublisherConfig = serde_yaml::from_str(&content).map_err(|e| {
                WorkflowError::ConfigError(format!("Failed to parse YAML config: {}", e))
            })?;

            if let Some(extends_path) = &config.extends {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| {
                        WorkflowError::ConfigError("Invalid config file path".to_string())
                    })?
                    .join(extends_path);

                if let Some(base_config) = Self::load_config_file(&base_path).await? {
                    return Ok(Some(Self::merge_configs(vec![base_config, config])));
                }
            }

            Ok(Some(config))
        })
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<PublisherConfig> {
        let mut config = PublisherConfig {
            capacity: None,
            security: None,
            ..Default::default()
        };
        let mut has_changes = false;

        // MAPSERVICE_SERVER -> server.endpoint
        if let Some(endpoint) = env.get("MAPSERVICE_SERVER") {
            config.server.get_or_insert_with(ServerConfig::default).endpoint =
                Some(endpoint.clone());
            has_changes = true;
        }

        // MAPSERVICE_OUTPUT_DIR -> server.outputDirectory
        if let Some(output_directory) = env.get("MAPSERVICE_OUTPUT_DIR") {
            config
                .server
                .get_or_insert_with(ServerConfig::default)
                .output_directory = Some(output_directory.clone());
            has_changes = true;
        }

        // MAPSERVICE_CONNECTION -> datastore.connection
        if let Some(connection) = env.get("MAPSERVICE_CONNECTION") {
            config
                .datastore
                .get_or_insert_with(DatastoreConfig::default)
                .connection = Some(connection.clone());
            has_changes = true;
        }

        // MAPSERVICE_DATASET -> datastore.dataset
        if let Some(dataset) = env.get("MAPSERVICE_DATASET") {
            config
                .datastore
                .get_or_insert_with(DatastoreConfig::default)
                .dataset = Some(dataset.clone());
            has_changes = true;
        }

        // MAPSERVICE_CONNECTION_FILE_PUBLISHING -> workflow.connectionFilePublishing
        if let Some(flag) = env.get("MAPSERVICE_CONNECTION_FILE_PUBLISHING") {
            let enabled = match flag.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            };

            if let Some(enabled) = enabled {
                config
                    .workflow
                    .get_or_insert_with(WorkflowConfig::default)
                    .connection_file_publishing = Some(enabled);
                has_changes = true;
            }
        }

        if has_changes { Some(config) } else { None }
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<PublisherConfig>) -> PublisherConfig {
        let mut result = PublisherConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target, field by field
    fn merge_into(target: &mut PublisherConfig, source: PublisherConfig) {
        if !source.version.is_empty() {
            target.version = source.version;
        }

        if source.extends.is_some() {
            target.extends = source.extends;
        }

        if let Some(source_server) = source.server {
            let target_server = target.server.get_or_insert_with(ServerConfig::default);
            if source_server.endpoint.is_some() {
                target_server.endpoint = source_server.endpoint;
            }
            if source_server.output_directory.is_some() {
                target_server.output_directory = source_server.output_directory;
            }
        }

        if let Some(source_datastore) = source.datastore {
            let target_datastore = target.datastore.get_or_insert_with(DatastoreConfig::default);
            if source_datastore.connection.is_some() {
                target_datastore.connection = source_datastore.connection;
            }
            if source_datastore.dataset.is_some() {
                target_datastore.dataset = source_datastore.dataset;
            }
            if source_datastore.enterprise.is_some() {
                target_datastore.enterprise = source_datastore.enterprise;
            }
        }

        if source.capacity.is_some() {
            target.capacity = source.capacity;
        }

        if let Some(source_workflow) = source.workflow {
            let target_workflow = target.workflow.get_or_insert_with(WorkflowConfig::default);
            if source_workflow.on_create_failure.is_some() {
                target_workflow.on_create_failure = source_workflow.on_create_failure;
            }
            if source_workflow.unpublish_trim.is_some() {
                target_workflow.unpublish_trim = source_workflow.unpublish_trim;
            }
            if source_workflow.connection_file_publishing.is_some() {
                target_workflow.connection_file_publishing =
                    source_workflow.connection_file_publishing;
            }
        }

        if source.helper.is_some() {
            target.helper = source.helper;
        }

        if source.security.is_some() {
            target.security = source.security;
        }
    }

    /// Expand environment variables in configuration
    ///
    /// Only `${VAR_NAME}` references are expanded, subject to the configured
    /// allowed prefixes and forbidden patterns.
    fn expand_env_vars(
        mut config: PublisherConfig,
        env: &HashMap<String, String>,
    ) -> Result<PublisherConfig, WorkflowError> {
        let expansion = config
            .security
            .as_ref()
            .and_then(|s| s.env_var_expansion.clone());

        let enabled = expansion.as_ref().and_then(|e| e.enabled).unwrap_or(true);
        if !enabled {
            return Ok(config);
        }

        let allowed_prefixes = expansion.as_ref().and_then(|e| e.allowed_prefixes.clone());

        let forbidden_patterns: Vec<Regex> = expansion
            .and_then(|e| e.forbidden_patterns)
            .unwrap_or_default()
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        let expand = |value: &mut Option<String>| -> Result<(), WorkflowError> {
            if let Some(current) = value.as_deref() {
                *value = Some(Self::expand_string(
                    current,
                    env,
                    &allowed_prefixes,
                    &forbidden_patterns,
                )?);
            }
            Ok(())
        };

        if let Some(server) = &mut config.server {
            expand(&mut server.endpoint)?;
            expand(&mut server.output_directory)?;
        }

        if let Some(datastore) = &mut config.datastore {
            expand(&mut datastore.connection)?;
        }

        if let Some(helper) = &mut config.helper {
            expand(&mut helper.script)?;
        }

        Ok(config)
    }

    /// Expand environment variables in a single string
    fn expand_string(
        input: &str,
        env: &HashMap<String, String>,
        allowed_prefixes: &Option<Vec<String>>,
        forbidden_patterns: &[Regex],
    ) -> Result<String, WorkflowError> {
        let env_var_regex = Regex::new(ENV_VAR_PATTERN)
            .map_err(|e| WorkflowError::ConfigError(format!("Invalid pattern: {}", e)))?;

        let mut result = input.to_string();
        for cap in env_var_regex.captures_iter(input) {
            let var_name = &cap[1];

            if forbidden_patterns.iter().any(|p| p.is_match(var_name)) {
                tracing::warn!(variable = var_name, "environment variable matches forbidden pattern, skipping");
                continue;
            }

            if let Some(prefixes) = allowed_prefixes {
                let allowed = prefixes.iter().any(|prefix| var_name.starts_with(prefix));
                if !allowed {
                    tracing::warn!(variable = var_name, "environment variable not allowed by prefix whitelist, skipping");
                    continue;
                }
            }

            if let Some(value) = env.get(var_name) {
                result = result.replace(&format!("${{{}}}", var_name), value);
            } else {
                tracing::warn!(variable = var_name, "environment variable not found");
            }
        }

        Ok(result)
    }

    /// Validate configuration
    pub fn validate(config: &PublisherConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check version (required)
        if config.version.is_empty() {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
                expected: Some("string (e.g., \"1.0\")".to_string()),
                actual: Some("empty".to_string()),
            });
        } else if config.version != "1.0" {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some("Currently supported version is \"1.0\" only".to_string()),
            });
        }

        // 2. Server endpoint
        let endpoint = config.server.as_ref().and_then(|s| s.endpoint.as_deref());
        if endpoint.is_none_or(str::is_empty) {
            warnings.push(ConfigValidationWarning {
                field: "server.endpoint".to_string(),
                message: "No server endpoint configured".to_string(),
                suggestion: Some("Pass --server or set MAPSERVICE_SERVER".to_string()),
            });
        }

        // 3. Capacity
        if let Some(capacity) = &config.capacity {
            Self::validate_capacity(capacity, &mut errors, &mut warnings);
        }

        // 4. Helper
        if let Some(helper) = &config.helper {
            Self::validate_helper(helper, &mut errors, &mut warnings);
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Validate instance pool settings
    fn validate_capacity(
        capacity: &crate::core::traits::CapacitySettings,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        if capacity.min_instances > capacity.max_instances {
            errors.push(ConfigValidationError {
                field: "capacity.minInstances".to_string(),
                message: "minInstances must not exceed maxInstances".to_string(),
                expected: Some(format!("<= {}", capacity.max_instances)),
                actual: Some(capacity.min_instances.to_string()),
            });
        }

        if capacity.max_instances == 0 {
            warnings.push(ConfigValidationWarning {
                field: "capacity.maxInstances".to_string(),
                message: "maxInstances is 0; the service will not start any instance".to_string(),
                suggestion: Some("Use at least 1 for legacy publishing".to_string()),
            });
        }
    }

    /// Validate helper script settings
    fn validate_helper(
        helper: &HelperConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        if let (Some(interpreter), Some(allowed)) =
            (&helper.interpreter, &helper.allowed_interpreters)
            && !allowed.contains(interpreter)
        {
            errors.push(ConfigValidationError {
                field: "helper.interpreter".to_string(),
                message: format!("Interpreter '{}' is not in allowedInterpreters", interpreter),
                expected: Some(allowed.join(", ")),
                actual: Some(interpreter.clone()),
            });
        }

        if helper.timeout_seconds == Some(0) {
            warnings.push(ConfigValidationWarning {
                field: "helper.timeoutSeconds".to_string(),
                message: "A timeout of 0 seconds fails every helper call".to_string(),
                suggestion: Some("Remove the field to disable the timeout".to_string()),
            });
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
                if let (Some(expected), Some(actual)) = (&error.expected, &error.actual) {
                    lines.push(format!("    Expected: {}", expected));
                    lines.push(format!("    Actual: {}", actual));
                }
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::CapacitySettings;
    use tempfile::TempDir;

    #[test]
    fn test_load_env_config() {
        let mut env = HashMap::new();
        env.insert("MAPSERVICE_SERVER".to_string(), "http://gis:6080".to_string());
        env.insert("MAPSERVICE_CONNECTION".to_string(), "/data/osm.gdb".to_string());
        env.insert(
            "MAPSERVICE_CONNECTION_FILE_PUBLISHING".to_string(),
            "false".to_string(),
        );

        let config = ConfigLoader::load_env_config(&env).unwrap();

        assert_eq!(
            config.server.as_ref().unwrap().endpoint.as_deref(),
            Some("http://gis:6080")
        );
        assert_eq!(
            config.datastore.as_ref().unwrap().connection.as_deref(),
            Some("/data/osm.gdb")
        );
        assert_eq!(
            config.workflow.as_ref().unwrap().connection_file_publishing,
            Some(false)
        );
    }

    #[test]
    fn test_load_env_config_without_variables() {
        assert!(ConfigLoader::load_env_config(&HashMap::new()).is_none());
    }

    #[test]
    fn test_expand_string() {
        let mut env = HashMap::new();
        env.insert("GIS_HOST".to_string(), "gis.example.com".to_string());

        let input = "http://${GIS_HOST}:6080/arcgis/admin";
        let result = ConfigLoader::expand_string(input, &env, &None, &[]).unwrap();

        assert_eq!(result, "http://gis.example.com:6080/arcgis/admin");
    }

    #[test]
    fn test_expand_string_with_allowed_prefixes() {
        let mut env = HashMap::new();
        env.insert("GIS_HOST".to_string(), "gis".to_string());
        env.insert("SECRET_KEY".to_string(), "forbidden".to_string());

        let allowed_prefixes = Some(vec!["GIS_".to_string()]);

        let input = "${GIS_HOST}-${SECRET_KEY}";
        let result = ConfigLoader::expand_string(input, &env, &allowed_prefixes, &[]).unwrap();

        assert_eq!(result, "gis-${SECRET_KEY}");
    }

    #[test]
    fn test_expand_string_with_forbidden_pattern() {
        let mut env = HashMap::new();
        env.insert("DB_PASSWORD".to_string(), "hunter2".to_string());

        let forbidden = vec![Regex::new("PASSWORD").unwrap()];
        let result =
            ConfigLoader::expand_string("${DB_PASSWORD}", &env, &None, &forbidden).unwrap();

        assert_eq!(result, "${DB_PASSWORD}");
    }

    #[test]
    fn test_validate_version_required() {
        let config = PublisherConfig {
            version: String::new(),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "version");
    }

    #[test]
    fn test_validate_capacity_bounds() {
        let config = PublisherConfig {
            capacity: Some(CapacitySettings {
                min_instances: 3,
                max_instances: 1,
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "capacity.minInstances");
    }

    #[test]
    fn test_validate_helper_interpreter_whitelist() {
        let config = PublisherConfig {
            helper: Some(HelperConfig {
                interpreter: Some("bash".to_string()),
                allowed_interpreters: Some(vec!["python".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "helper.interpreter");
    }

    #[test]
    fn test_merge_configs() {
        let base = PublisherConfig {
            server: Some(ServerConfig {
                endpoint: Some("http://base".to_string()),
                output_directory: Some("/base/out".to_string()),
            }),
            ..Default::default()
        };

        let overlay = PublisherConfig {
            server: Some(ServerConfig {
                endpoint: Some("http://overlay".to_string()),
                output_directory: None,
            }),
            workflow: Some(WorkflowConfig {
                on_create_failure: Some(CreateFailurePolicy::Abort),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = ConfigLoader::merge_configs(vec![base, overlay]);
        let server = merged.server.as_ref().unwrap();

        assert_eq!(server.endpoint.as_deref(), Some("http://overlay"));
        assert_eq!(server.output_directory.as_deref(), Some("/base/out"));
        assert_eq!(
            merged.workflow_options().on_create_failure,
            CreateFailurePolicy::Abort
        );
    }

    #[tokio::test]
    async fn test_load_project_config_with_extends() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("base.yaml"),
            "version: \"1.0\"\nserver:\n  outputDirectory: /srv/mxd\n",
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            "version: \"1.0\"\nextends: base.yaml\nserver:\n  endpoint: http://${GIS_HOST}\n",
        )
        .unwrap();

        let mut env = HashMap::new();
        env.insert("GIS_HOST".to_string(), "gis".to_string());

        let config = ConfigLoader::load(ConfigLoadOptions {
            project_path: temp_dir.path().to_path_buf(),
            cli_args: None,
            env,
        })
        .await
        .unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.endpoint.as_deref(), Some("http://gis"));
        assert_eq!(server.output_directory.as_deref(), Some("/srv/mxd"));
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILENAME), "version: [unclosed").unwrap();

        let result = ConfigLoader::load(ConfigLoadOptions {
            project_path: temp_dir.path().to_path_buf(),
            cli_args: None,
            env: HashMap::new(),
        })
        .await;

        assert!(matches!(result, Err(WorkflowError::ConfigError(_))));
    }

    #[test]
    fn test_format_validation_result() {
        let result = ConfigValidationResult {
            valid: false,
            errors: vec![ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
                expected: Some("string".to_string()),
                actual: Some("empty".to_string()),
            }],
            warnings: vec![ConfigValidationWarning {
                field: "server.endpoint".to_string(),
                message: "No server endpoint configured".to_string(),
                suggestion: Some("Pass --server".to_string()),
            }],
        };

        let formatted = ConfigLoader::format_validation_result(&result);

        assert!(formatted.contains("❌ Configuration has errors"));
        assert!(formatted.contains("[version]"));
        assert!(formatted.contains("🟡 Warnings:"));
        assert!(formatted.contains("[server.endpoint]"));
    }
}
