
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        let config = SupervisorConfig::default();
        let result = ConfigValidator::validate(&config);
        assert!(result.is_valid());
        // Default config has no sync source.
        assert!(result.warnings.iter().any(|w| w.path == "sync.source"));
    }

    #[test]
    fn test_validate_empty_service_name() {
        let mut config = SupervisorConfig::default();
        config.service.name = "  ".to_string();

        let result = ConfigValidator::validate(&config);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.path == "service.name"));
    }

    #[test]
    fn test_validate_invalid_health_url() {
        let mut config = SupervisorConfig::default();
        config.service.health_url = "localhost:8080/health".to_string();

        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.path == "service.health_url"));
    }

    #[test]
    fn test_validate_zero_ceiling_is_warning() {
        let mut config = SupervisorConfig::default();
        config.service.restart_ceiling = 0;

        let result = ConfigValidator::validate(&config);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.path == "service.restart_ceiling"));
    }

    #[test]
    fn test_validate_restart_window_range() {
        for bad in [0, MAX_RESTART_WINDOW_SECS + 1, 100_000_000_000_000_000, u64::MAX] {
            let mut config = SupervisorConfig::default();
            config.service.restart_window_secs = bad;
            let result = ConfigValidator::validate(&config);
            assert!(
                result.errors.iter().any(|e| e.path == "service.restart_window_secs"),
                "window {} should be rejected",
                bad
            );
        }

        let mut config = SupervisorConfig::default();
        config.service.restart_window_secs = MAX_RESTART_WINDOW_SECS;
        assert!(ConfigValidator::validate(&config).is_valid());
    }

    #[test]
    fn test_validate_threshold_range() {
        for bad in [0.0, -5.0, 100.5, f64::NAN] {
            let mut config = SupervisorConfig::default();
            config.memory.threshold_percent = bad;
            let result = ConfigValidator::validate(&config);
            assert!(
                result.errors.iter().any(|e| e.path == "memory.threshold_percent"),
                "threshold {} should be rejected",
                bad
            );
        }

        let mut config = SupervisorConfig::default();
        config.memory.threshold_percent = 100.0;
        assert!(ConfigValidator::validate(&config).is_valid());
    }

    #[test]
    fn test_validate_zero_retention() {
        let mut config = SupervisorConfig::default();
        config.backup.retention = 0;

        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.path == "backup.retention"));
    }

    #[test]
    fn test_validate_root_inside_volume() {
        let mut config = SupervisorConfig::default();
        config.paths.volume = PathBuf::from("/srv/data");
        config.paths.root = PathBuf::from("/srv/data/caretaker");

        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.path == "paths.root"));
    }

    #[test]
    fn test_validate_sync_missing_remote_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = SupervisorConfig::default();
        config.sync.source = Some(dir.path().to_path_buf());

        let result = ConfigValidator::validate(&config);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.path == "sync.remote_path"));
        assert!(!result.warnings.iter().any(|w| w.path == "sync.source"));
    }

    #[test]
    fn test_validate_zero_webhook_timeout() {
        let mut config = SupervisorConfig::default();
        config.alerts.webhook_timeout_secs = 0;

        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.path == "alerts.webhook_timeout_secs"));
    }

    #[test]
    fn test_validate_invalid_webhook_url() {
        let mut config = SupervisorConfig::default();
        config.alerts.webhook_url = Some("hooks.example.com".to_string());

        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.path == "alerts.webhook_url"));
    }

    #[test]
    fn test_validate_zero_log_caps() {
        let mut config = SupervisorConfig::default();
        config.logs.max_bytes = 0;
        config.logs.keep_lines = 0;

        let result = ConfigValidator::validate(&config);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_into_result_joins_errors() {
        let mut config = SupervisorConfig::default();
        config.backup.retention = 0;
        config.service.probe_timeout_secs = 0;

        let err = ConfigValidator::validate(&config).into_result().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("backup.retention"));
        assert!(message.contains("service.probe_timeout_secs"));
    }
