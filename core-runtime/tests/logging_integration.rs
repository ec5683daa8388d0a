//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{redact_if_sensitive, strip_path, LogFormat, LoggingConfig};

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_pii_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_pii);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}

#[test]
fn test_secret_fields_redacted() {
    assert_eq!(redact_if_sensitive("session_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("api_key", "k"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("password", "p"), "[REDACTED]");
}

#[test]
fn test_source_locators_reduced_to_basename() {
    assert_eq!(
        redact_if_sensitive("source", "https://media.example.com/course/7/intro.mp4?token=abc#t=10"),
        "intro.mp4"
    );
    assert_eq!(redact_if_sensitive("url", "/srv/books/manual.html"), "manual.html");
}

#[test]
fn test_other_fields_pass_through() {
    assert_eq!(redact_if_sensitive("media_id", "lesson-3"), "lesson-3");
    assert_eq!(redact_if_sensitive("view_mode", "MINI"), "MINI");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/user/media/clip.webm"), "clip.webm");
    assert_eq!(strip_path("D:\\data\\book.epub"), "book.epub");
    assert_eq!(strip_path("filename.txt"), "filename.txt");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_format_selection() {
    let config = LoggingConfig::default();
    if cfg!(debug_assertions) {
        assert_eq!(config.format, LogFormat::Pretty);
    } else {
        assert_eq!(config.format, LogFormat::Json);
    }
}
