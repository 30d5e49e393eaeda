//! Unit tests for the application error type.

use pomodoro_intercom::AppError;

#[test]
fn config_error_display() {
    let err = AppError::Config("bad file".into());
    assert_eq!(err.to_string(), "config: bad file");
}

#[test]
fn slack_error_display() {
    let err = AppError::Slack("post failed".into());
    assert_eq!(err.to_string(), "slack: post failed");
}

#[test]
fn invalid_input_error_display() {
    let err = AppError::InvalidInput("entered value - abc".into());
    assert_eq!(err.to_string(), "invalid input: entered value - abc");
}

#[test]
fn already_exists_error_display() {
    let err = AppError::AlreadyExists("user U1".into());
    assert_eq!(err.to_string(), "already exists: user U1");
}

#[test]
fn not_found_error_display() {
    let err = AppError::NotFound("user U1".into());
    assert_eq!(err.to_string(), "not found: user U1");
}

#[test]
fn toml_errors_convert_to_config() {
    let parse_err = toml::from_str::<toml::Value>("not [ valid").unwrap_err();
    let err: AppError = parse_err.into();
    assert!(matches!(err, AppError::Config(_)), "got: {err}");
}

#[test]
fn errors_implement_std_error() {
    fn assert_error<E: std::error::Error>(_err: &E) {}
    assert_error(&AppError::NotFound("x".into()));
}
