use std::env;

use time::UtcOffset;

use super::types::{ConfigError, Environment, ReportMode};

const DEFAULT_CORS_ORIGINS: &[&str] =
    &["http://localhost:5173", "http://localhost:3000", "http://localhost:8080"];

pub(super) fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub(super) fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_usize(field: &'static str, value: String) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = value else {
        return Ok(default_cors_origins());
    };

    if raw.trim().is_empty() {
        return Ok(default_cors_origins());
    }

    if raw.trim_start().starts_with('[') {
        let parsed: Vec<String> =
            serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?;
        if parsed.is_empty() {
            return Ok(default_cors_origins());
        }
        return Ok(parsed);
    }

    let items: Vec<String> = raw
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        return Ok(default_cors_origins());
    }

    Ok(items)
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

pub(super) fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|item| item.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

pub(super) fn parse_report_mode(value: Option<String>) -> Result<ReportMode, ConfigError> {
    match value.as_deref().map(|item| item.to_ascii_lowercase()) {
        None => Ok(ReportMode::Background),
        Some(ref val) if val == "background" || val == "async" => Ok(ReportMode::Background),
        Some(ref val) if val == "inline" || val == "sync" => Ok(ReportMode::Inline),
        Some(other) => {
            Err(ConfigError::InvalidValue { field: "REPORT_GENERATION_MODE", value: other })
        }
    }
}

/// Whole-hour offsets only; the stored timestamps carry no zone information.
pub(super) fn parse_utc_offset(field: &'static str, value: String) -> Result<UtcOffset, ConfigError> {
    let hours: i8 =
        value.parse().map_err(|_| ConfigError::InvalidValue { field, value: value.clone() })?;
    UtcOffset::from_hms(hours, 0, 0).map_err(|_| ConfigError::InvalidValue { field, value })
}

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cors_origins_json() {
        let raw = "[\"http://a\",\"http://b\"]".to_string();
        let parsed = parse_cors_origins(Some(raw)).expect("cors json");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn parse_cors_origins_csv() {
        let raw = "http://a, http://b".to_string();
        let parsed = parse_cors_origins(Some(raw)).expect("cors csv");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn parse_cors_origins_defaults_on_empty() {
        let parsed = parse_cors_origins(Some(" ".to_string())).expect("cors empty");
        assert_eq!(parsed, default_cors_origins());
    }

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn parse_environment_variants() {
        assert_eq!(parse_environment(Some("prod".to_string())), Environment::Production);
        assert_eq!(parse_environment(Some("staging".to_string())), Environment::Staging);
        assert_eq!(parse_environment(Some("testing".to_string())), Environment::Test);
        assert_eq!(parse_environment(None), Environment::Development);
    }

    #[test]
    fn parse_report_mode_variants() {
        assert_eq!(parse_report_mode(None).unwrap(), ReportMode::Background);
        assert_eq!(parse_report_mode(Some("INLINE".to_string())).unwrap(), ReportMode::Inline);
        assert_eq!(parse_report_mode(Some("async".to_string())).unwrap(), ReportMode::Background);
        assert!(parse_report_mode(Some("later".to_string())).is_err());
    }

    #[test]
    fn parse_utc_offset_accepts_whole_hours() {
        let offset = parse_utc_offset("LOCAL_UTC_OFFSET_HOURS", "9".to_string()).unwrap();
        assert_eq!(offset.whole_hours(), 9);
        let offset = parse_utc_offset("LOCAL_UTC_OFFSET_HOURS", "-5".to_string()).unwrap();
        assert_eq!(offset.whole_hours(), -5);
        assert!(parse_utc_offset("LOCAL_UTC_OFFSET_HOURS", "99".to_string()).is_err());
        assert!(parse_utc_offset("LOCAL_UTC_OFFSET_HOURS", "nine".to_string()).is_err());
    }
}
