pub mod types;
mod validators;

// Re-export all public types
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validators::{
        parse_size_string, validate_content_size, validate_filename_length,
        validate_listen_address,
    };
    use crate::types::{ConfigError, Error};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::{tempdir, NamedTempFile, TempDir};

    // Test utilities
    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn config_in(dir: &TempDir) -> SystemConfig {
        let mut config = SystemConfig::default();
        config.signing.temp_dir = dir.path().to_string_lossy().to_string();
        config
    }

    fn assert_validation_field(result: crate::types::Result<ServerSettings>, expected: &str) {
        match result {
            Err(Error::Validation { field, .. }) => assert_eq!(field, expected),
            other => panic!("Expected validation error for {}, got {:?}", expected, other),
        }
    }

    #[test]
    fn test_system_config_complete() {
        let config_toml = r#"
[server]
listen = "0.0.0.0:9000"
tls_enabled = false
tls_cert_file = "/etc/ssl/cert.pem"

[signing]
temp_dir = "/var/tmp"
max_content_size = "20MB"
max_concurrent_jobs = 4
max_filename_length = 128
full_error_responses = true
templates_dir = "/srv/templates"
signer_program = "/usr/bin/shortcuts"
signer_timeout = 30

[logging]
level = "debug"
format = "json"
file = "/var/log/signer.log"
quiet = true

[monitoring]
metrics_enabled = false
metrics_path = "/prom"
health_path = "/healthz"
        "#;

        let config: SystemConfig = toml::from_str(config_toml).unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert!(!config.server.tls_enabled);
        assert_eq!(
            config.server.tls_cert_file.as_deref(),
            Some("/etc/ssl/cert.pem")
        );
        assert_eq!(config.server.tls_key_file, None);

        assert_eq!(config.signing.temp_dir, "/var/tmp");
        assert_eq!(config.signing.max_content_size, "20MB");
        assert_eq!(config.signing.max_concurrent_jobs, 4);
        assert_eq!(config.signing.max_filename_length, 128);
        assert!(config.signing.full_error_responses);
        assert_eq!(
            config.signing.templates_dir.as_deref(),
            Some("/srv/templates")
        );
        assert_eq!(config.signing.signer_program, "/usr/bin/shortcuts");
        assert_eq!(config.signing.signer_timeout, 30);

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.file.as_deref(), Some("/var/log/signer.log"));
        assert!(config.logging.quiet);

        assert!(!config.monitoring.metrics_enabled);
        assert_eq!(config.monitoring.metrics_path, "/prom");
        assert_eq!(config.monitoring.health_path, "/healthz");
    }

    #[test]
    fn test_system_config_minimal() {
        let config: SystemConfig = toml::from_str("").unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert!(!config.server.tls_enabled);
        assert_eq!(config.signing.max_content_size, "10MB");
        assert_eq!(config.signing.max_concurrent_jobs, 0);
        assert_eq!(config.signing.max_filename_length, 255);
        assert!(!config.signing.full_error_responses);
        assert_eq!(config.signing.signer_program, "shortcuts");
        assert_eq!(config.signing.signer_timeout, 0);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.monitoring.metrics_enabled);
    }

    #[test]
    fn test_serde_default_application() {
        let config_toml = r#"
[signing]
max_concurrent_jobs = -1
        "#;

        let config: SystemConfig = toml::from_str(config_toml).unwrap();
        assert_eq!(config.signing.max_concurrent_jobs, -1);
        assert_eq!(config.signing.max_content_size, "10MB");
        assert_eq!(config.server.listen, "127.0.0.1:8080");
    }

    #[test]
    fn test_load_valid_system_config() {
        let config_toml = r#"
[server]
listen = "127.0.0.1:8081"

[signing]
max_concurrent_jobs = 2
        "#;

        let file = create_temp_file(config_toml);
        let config = SystemConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:8081");
        assert_eq!(config.signing.max_concurrent_jobs, 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = SystemConfig::load_from_file("/nonexistent/path/config.toml");
        match result {
            Err(Error::Config(ConfigError::FileNotFound { path })) => {
                assert_eq!(path, "/nonexistent/path/config.toml");
            }
            _ => panic!("Expected FileNotFound error"),
        }
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = SystemConfig::load_or_default("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080");
    }

    #[test]
    fn test_load_invalid_toml() {
        let invalid_toml = r#"
[server
listen = "127.0.0.1:8080"
        "#;

        let file = create_temp_file(invalid_toml);
        match SystemConfig::load_or_default(file.path()) {
            Err(Error::Config(ConfigError::ParseError(_))) => {}
            _ => panic!("Expected ParseError"),
        }
    }

    #[test]
    fn test_load_invalid_structure() {
        let config_toml = r#"
[signing]
max_concurrent_jobs = "not_a_number"
        "#;

        let file = create_temp_file(config_toml);
        match SystemConfig::load_from_file(file.path()) {
            Err(Error::Config(ConfigError::ParseError(_))) => {}
            _ => panic!("Expected ParseError for type mismatch"),
        }
    }

    // Validation Tests
    #[tokio::test]
    async fn test_validation_success() {
        let dir = tempdir().unwrap();
        let mut config = config_in(&dir);
        config.signing.max_concurrent_jobs = 3;
        config.signing.signer_timeout = 45;

        let settings = config.validate().await.unwrap();

        assert_eq!(settings.listen.to_string(), "127.0.0.1:8080");
        assert_eq!(settings.temp_dir, dir.path());
        assert_eq!(settings.max_content_size, 10 * 1024 * 1024);
        assert_eq!(settings.max_concurrent_jobs, 3);
        assert_eq!(settings.max_filename_length, 255);
        assert_eq!(settings.signer_program, "shortcuts");
        assert_eq!(settings.signer_timeout, Some(Duration::from_secs(45)));
        assert!(settings.templates_dir.is_none());
    }

    #[tokio::test]
    async fn test_validation_zero_timeout_means_unbounded() {
        let dir = tempdir().unwrap();
        let settings = config_in(&dir).validate().await.unwrap();
        assert_eq!(settings.signer_timeout, None);
    }

    #[tokio::test]
    async fn test_validation_invalid_listen_address() {
        let dir = tempdir().unwrap();
        let mut config = config_in(&dir);
        config.server.listen = "localhost".to_string();

        assert_validation_field(config.validate().await, "server.listen");
    }

    #[tokio::test]
    async fn test_validation_rejects_tls() {
        let dir = tempdir().unwrap();
        let mut config = config_in(&dir);
        config.server.tls_enabled = true;

        assert_validation_field(config.validate().await, "server.tls_enabled");
    }

    #[tokio::test]
    async fn test_validation_tls_files_without_tls_only_warn() {
        let dir = tempdir().unwrap();
        let mut config = config_in(&dir);
        config.server.tls_cert_file = Some("/etc/ssl/cert.pem".to_string());
        config.server.tls_key_file = Some("/etc/ssl/key.pem".to_string());

        assert!(config.validate().await.is_ok());
    }

    #[tokio::test]
    async fn test_validation_missing_temp_dir() {
        let dir = tempdir().unwrap();
        let mut config = config_in(&dir);
        config.signing.temp_dir = dir.path().join("missing").to_string_lossy().to_string();

        assert_validation_field(config.validate().await, "signing.temp_dir");
    }

    #[tokio::test]
    async fn test_validation_temp_dir_is_file() {
        let file = create_temp_file("not a directory");
        let mut config = SystemConfig::default();
        config.signing.temp_dir = file.path().to_string_lossy().to_string();

        assert_validation_field(config.validate().await, "signing.temp_dir");
    }

    #[tokio::test]
    async fn test_validation_invalid_content_size() {
        let dir = tempdir().unwrap();

        for size in ["0", "0MB", "lots", "1.5MB"] {
            let mut config = config_in(&dir);
            config.signing.max_content_size = size.to_string();
            assert_validation_field(config.validate().await, "signing.max_content_size");
        }
    }

    #[tokio::test]
    async fn test_validation_filename_length_too_small() {
        let dir = tempdir().unwrap();
        let mut config = config_in(&dir);
        config.signing.max_filename_length = 9;

        assert_validation_field(config.validate().await, "signing.max_filename_length");
    }

    #[tokio::test]
    async fn test_validation_templates_dir() {
        let dir = tempdir().unwrap();
        let templates = tempdir().unwrap();

        let mut config = config_in(&dir);
        config.signing.templates_dir = Some(templates.path().to_string_lossy().to_string());
        assert_validation_field(config.validate().await, "signing.templates_dir");

        std::fs::write(templates.path().join("form.html"), "<form></form>").unwrap();
        let settings = config.validate().await.unwrap();
        assert_eq!(settings.templates_dir.as_deref(), Some(templates.path()));

        // Blank means "use the built-in form"
        config.signing.templates_dir = Some("  ".to_string());
        let settings = config.validate().await.unwrap();
        assert!(settings.templates_dir.is_none());
    }

    #[tokio::test]
    async fn test_validation_empty_signer_program() {
        let dir = tempdir().unwrap();
        let mut config = config_in(&dir);
        config.signing.signer_program = " ".to_string();

        assert_validation_field(config.validate().await, "signing.signer_program");
    }

    #[tokio::test]
    async fn test_validation_invalid_log_settings() {
        let dir = tempdir().unwrap();

        let mut config = config_in(&dir);
        config.logging.level = "verbose".to_string();
        assert_validation_field(config.validate().await, "logging.level");

        let mut config = config_in(&dir);
        config.logging.format = "xml".to_string();
        assert_validation_field(config.validate().await, "logging.format");

        let mut config = config_in(&dir);
        config.logging.format = "compact".to_string();
        assert!(config.validate().await.is_ok());
    }

    #[tokio::test]
    async fn test_validation_log_file_directory_must_exist() {
        let dir = tempdir().unwrap();
        let mut config = config_in(&dir);
        config.logging.file = Some(
            dir.path()
                .join("missing/server.log")
                .to_string_lossy()
                .to_string(),
        );

        assert_validation_field(config.validate().await, "logging.file");

        config.logging.file = Some(dir.path().join("server.log").to_string_lossy().to_string());
        assert!(config.validate().await.is_ok());
    }

    #[tokio::test]
    async fn test_validation_monitoring_paths() {
        let dir = tempdir().unwrap();

        let mut config = config_in(&dir);
        config.monitoring.health_path = "health".to_string();
        assert_validation_field(config.validate().await, "monitoring.health_path");

        let mut config = config_in(&dir);
        config.monitoring.metrics_path = "/sign".to_string();
        assert_validation_field(config.validate().await, "monitoring.metrics_path");

        let mut config = config_in(&dir);
        config.monitoring.metrics_path = "/health".to_string();
        assert_validation_field(config.validate().await, "monitoring.metrics_path");

        // Metrics path is irrelevant once metrics are off
        config.monitoring.metrics_enabled = false;
        assert!(config.validate().await.is_ok());
    }

    #[test]
    fn test_validate_listen_address() {
        assert!(validate_listen_address("127.0.0.1:8080").is_ok());
        assert!(validate_listen_address("0.0.0.0:80").is_ok());
        assert!(validate_listen_address("[::1]:8080").is_ok());
        assert!(validate_listen_address("127.0.0.1").is_err());
        assert!(validate_listen_address("localhost:8080").is_err());
    }

    #[test]
    fn test_parse_size_string() {
        // Valid sizes
        assert_eq!(parse_size_string("1000").unwrap(), 1000);
        assert_eq!(parse_size_string("512B").unwrap(), 512);
        assert_eq!(parse_size_string("1KB").unwrap(), 1024);
        assert_eq!(parse_size_string("10MB").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size_string("1GB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size_string(" 2 KB ").unwrap(), 2048);

        // Case insensitive
        assert_eq!(parse_size_string("1kb").unwrap(), 1024);
        assert_eq!(parse_size_string("1mb").unwrap(), 1024 * 1024);

        // Invalid formats
        assert!(parse_size_string("").is_err());
        assert!(parse_size_string("abc").is_err());
        assert!(parse_size_string("1TB").is_err());
        assert!(parse_size_string("-1KB").is_err());
        assert!(parse_size_string("1.5MB").is_err());
        assert!(parse_size_string("99999999999999999999GB").is_err());
    }

    #[test]
    fn test_validate_content_size_field() {
        assert_eq!(validate_content_size("1KB", "f").unwrap(), 1024);
        match validate_content_size("nope", "signing.max_content_size") {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "signing.max_content_size"),
            _ => panic!("Expected validation error"),
        }
    }

    #[test]
    fn test_validate_filename_length() {
        assert!(validate_filename_length(0).is_err());
        assert!(validate_filename_length(9).is_err());
        assert_eq!(validate_filename_length(10).unwrap(), 10);
        assert_eq!(validate_filename_length(255).unwrap(), 255);
    }
}
