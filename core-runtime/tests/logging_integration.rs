//! Integration tests for logging system

use bridge_traits::time::{ConsoleLogger, LogLevel};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_url, strip_path, LogFormat, LoggingConfig,
};
use core_runtime::Error;
use std::sync::Arc;

#[test]
fn test_init_logging_only_once() {
    // Only this test installs a global subscriber in this binary.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(Arc::new(ConsoleLogger::default()));
    init_logging(config.clone()).unwrap();

    tracing::debug!(index = 0u64, "logging initialized");

    let second = init_logging(config);
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_invalid_filter_rejected_before_install() {
    let config = LoggingConfig::default().with_filter("core_playback=verbose");
    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_signed_stream_urls_are_redacted() {
    let signed = "https://rr3.cdn.example.com/videoplayback?expire=1700&sig=AOq0QJ8&ip=1.2.3.4";
    assert_eq!(redact_url(signed), "https://rr3.cdn.example.com/videoplayback");
    assert_eq!(
        redact_if_sensitive("url", signed),
        "https://rr3.cdn.example.com/videoplayback"
    );
}

#[test]
fn test_credential_fields_are_masked() {
    assert_eq!(redact_if_sensitive("session_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("Authorization", "Bearer x"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("api_key", "k"), "[REDACTED]");
}

#[test]
fn test_plain_values_pass_through() {
    assert_eq!(redact_if_sensitive("index", "12"), "12");
    assert_eq!(redact_if_sensitive("title", "Lecture 3"), "Lecture 3");
    assert_eq!(redact_if_sensitive("service_id", "0"), "0");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/sdcard/Movies/clip.webm"), "clip.webm");
    assert_eq!(strip_path("D:\\data\\clip.mkv"), "clip.mkv");
    assert_eq!(strip_path("clip.mp4"), "clip.mp4");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
