//! Request Validator - pre-flight checks for a publication request
//!
//! Nothing here blocks a workflow by itself: the workflow reports missing
//! inputs in its own response text. The validator gives the CLI a fuller
//! picture before anything is sent to the document manager.
//!
//! # Example
//!
//! ```no_run
//! use mapservice_publisher::core::PublicationRequest;
//! use mapservice_publisher::validation::RequestValidator;
//!
//! # async fn example() {
//! let request = PublicationRequest::new(r"C:\maps\roads.mxd", "http://gis:6080/arcgis/admin");
//! let result = RequestValidator::new().validate(&request, Some("Roads")).await;
//!
//! for warning in &result.warnings {
//!     println!("{}: {}", warning.field, warning.message);
//! }
//! # }
//! ```

use crate::core::sanitizer::is_sanitized;
use crate::core::traits::{
    PublicationRequest, TEMPLATE_EXTENSION, ValidationError, ValidationResult, ValidationWarning,
    template_base_name,
};
use lazy_static::lazy_static;
use regex::Regex;
use tokio::fs;

lazy_static! {
    static ref SERVER_URL: Regex = Regex::new(r"^https?://[^\s/]+").unwrap();
}

/// Validator for [`PublicationRequest`]s
pub struct RequestValidator;

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate `request`
    ///
    /// `raw_service_name` is the name as the user typed it, used to warn
    /// when sanitization changed it.
    pub async fn validate(
        &self,
        request: &PublicationRequest,
        raw_service_name: Option<&str>,
    ) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let template = request.template_path();
        if template.is_empty() {
            errors.push(error("templatePath", "No template (.mxd) given"));
        } else {
            if template_base_name(template).is_none() {
                warnings.push(warning(
                    "templatePath",
                    format!(
                        "'{}' has no {} file name; publishing will abort",
                        template, TEMPLATE_EXTENSION
                    ),
                ));
            }
            if fs::metadata(template).await.is_err() {
                warnings.push(warning(
                    "templatePath",
                    format!("'{}' is not readable from this machine", template),
                ));
            }
        }

        let server = request.server();
        if server.is_empty() {
            errors.push(error("server", "No server endpoint given"));
        } else if !SERVER_URL.is_match(server) {
            warnings.push(warning(
                "server",
                format!("'{}' does not look like an http(s) URL", server),
            ));
        }

        let output_directory = request.output_directory();
        if output_directory.is_empty() {
            warnings.push(warning(
                "outputDirectory",
                "No output directory; the working document is written relative to the current directory",
            ));
        } else if !fs::metadata(output_directory)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            warnings.push(warning(
                "outputDirectory",
                format!("'{}' is not an existing directory", output_directory),
            ));
        }

        if let Some(raw) = raw_service_name
            && !is_sanitized(raw)
        {
            warnings.push(warning(
                "serviceName",
                format!(
                    "'{}' will be published as '{}'",
                    raw,
                    request.service_name()
                ),
            ));
        }

        if request.is_enterprise() && request.targets_file_geodatabase() {
            warnings.push(warning(
                "datastore",
                "Enterprise flag set for a file geodatabase connection",
            ));
        }

        tracing::debug!(
            errors = errors.len(),
            warnings = warnings.len(),
            "request validated"
        );

        ValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

fn error(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

fn warning(field: &str, message: impl Into<String>) -> ValidationWarning {
    ValidationWarning {
        field: field.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn warning_fields(result: &ValidationResult) -> Vec<&str> {
        result.warnings.iter().map(|w| w.field.as_str()).collect()
    }

    #[tokio::test]
    async fn test_valid_request() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("roads.mxd");
        std::fs::write(&template, b"").unwrap();
        let request = PublicationRequest::new(template.display().to_string(), "https://gis/arcgis")
            .with_service_name("Roads")
            .with_output_directory(dir.path().display().to_string());

        let result = RequestValidator::new().validate(&request, Some("Roads")).await;

        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[tokio::test]
    async fn test_missing_template_and_server() {
        let request = PublicationRequest::new("", "");

        let result = RequestValidator::new().validate(&request, None).await;

        assert!(!result.valid);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["templatePath", "server"]);
    }

    #[tokio::test]
    async fn test_template_without_extension() {
        let request = PublicationRequest::new("/maps/roads.lyr", "http://gis");

        let result = RequestValidator::new().validate(&request, None).await;

        assert!(result.valid);
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.message.contains("no .mxd file name"))
        );
    }

    #[tokio::test]
    async fn test_mxd_directory_is_not_a_template() {
        let request = PublicationRequest::new("/maps.mxd/roads", "http://gis");

        let result = RequestValidator::new().validate(&request, None).await;

        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.field == "templatePath" && w.message.contains("publishing will abort"))
        );
    }

    #[tokio::test]
    async fn test_sanitized_name_warning() {
        let request =
            PublicationRequest::new("/maps/roads.mxd", "http://gis").with_service_name("Roads, 2024");

        let result = RequestValidator::new()
            .validate(&request, Some("Roads, 2024"))
            .await;

        let warning = result
            .warnings
            .iter()
            .find(|w| w.field == "serviceName")
            .unwrap();
        assert_eq!(warning.message, "'Roads, 2024' will be published as 'Roads_2024'");
    }

    #[tokio::test]
    async fn test_enterprise_file_geodatabase_warning() {
        let request = PublicationRequest::new("/maps/roads.mxd", "http://gis").with_datastore(
            "/data/osm.gdb",
            "osm",
            true,
        );

        let result = RequestValidator::new().validate(&request, None).await;

        assert!(warning_fields(&result).contains(&"datastore"));
    }

    #[tokio::test]
    async fn test_server_url_and_output_directory_warnings() {
        let request = PublicationRequest::new("/maps/roads.mxd", "gis-server")
            .with_output_directory("/nonexistent/output/dir");

        let result = RequestValidator::new().validate(&request, None).await;

        let fields = warning_fields(&result);
        assert!(fields.contains(&"server"));
        assert!(fields.contains(&"outputDirectory"));
    }
}
