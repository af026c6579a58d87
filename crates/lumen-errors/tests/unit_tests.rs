//! Unit tests for all error variants.
//!
//! Tests Display implementations, std::error::Error implementations,
//! From conversions and classification.

use lumen_errors::prelude::*;
use std::io;

mod control_error_tests {
    use super::*;

    #[test]
    fn test_all_variants_display() {
        let variants = vec![
            ControlError::location_not_found("porch"),
            ControlError::ApiNotEnabled("porch".into()),
            ControlError::effect_not_found("Fire"),
            ControlError::effect_id_not_found("porch", "abcd1234"),
            ControlError::DuplicateEffectId {
                location: "porch".into(),
                id: "abcd1234".into(),
            },
            ControlError::QueueFull {
                location: "porch".into(),
                capacity: 64,
            },
            ControlError::invalid_settings("Rainbow", "speed must be positive"),
            ControlError::CanvasUnavailable("porch".into()),
        ];

        for variant in variants {
            assert!(!variant.to_string().is_empty());
            let err: LumenError = variant.into();
            assert_eq!(err.category(), ErrorCategory::Control);
            assert!(err.is_recoverable());
        }
    }
}

mod transport_error_tests {
    use super::*;

    #[test]
    fn test_short_write_message() {
        let err = TransportError::ShortWrite {
            host: "10.0.0.7".into(),
            sent: 12,
            expected: 96,
        };
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("96"));
        assert!(err.is_socket_fatal());
    }

    #[test]
    fn test_not_connected_keeps_socket() {
        let err = TransportError::NotConnected("10.0.0.7".into());
        assert!(!err.is_socket_fatal());
        assert_eq!(err.severity(), ErrorSeverity::Info);
    }

    #[test]
    fn test_io_source_is_preserved() {
        let err = TransportError::io(
            "10.0.0.7",
            io::Error::new(io::ErrorKind::BrokenPipe, "pipe"),
        );
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
    }
}

mod lumen_error_tests {
    use super::*;

    #[test]
    fn test_from_io_error() {
        let err: LumenError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.category(), ErrorCategory::IO);
    }

    #[test]
    fn test_config_error_conversion() {
        let err: LumenError = ConfigError::invalid("porch", "framesPerSecond", "must be > 0").into();
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(err.to_string().contains("framesPerSecond"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(!err.is_recoverable());

        let read = ConfigError::Io {
            path: "locations/porch.json".into(),
            source: io::Error::new(io::ErrorKind::Interrupted, "busy"),
        };
        assert!(read.is_retryable());
        assert!(!ConfigError::DuplicateLocation("porch".into()).is_retryable());
        assert!(!EffectError::Panicked("Rainbow".into()).is_retryable());
    }

    #[test]
    fn test_effect_error_severity() {
        let err: LumenError = EffectError::Panicked("Rainbow".into()).into();
        assert_eq!(err.severity(), ErrorSeverity::Error);
        assert!(err.is_recoverable());
    }
}
