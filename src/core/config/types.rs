use thiserror::Error;
use time::UtcOffset;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) server: ServerSettings,
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) cors: CorsSettings,
    pub(super) database: DatabaseSettings,
    pub(super) redis: RedisSettings,
    pub(super) ai: AiSettings,
    pub(super) intake: IntakeSettings,
    pub(super) grading: GradingSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl ServerSettings {
    pub(super) fn bind(host: String, port: &str) -> Result<Self, ConfigError> {
        if host.trim().is_empty() {
            return Err(ConfigError::InvalidValue { field: "GRADING_HOST", value: host });
        }
        match port.parse::<u16>() {
            Ok(port) if port > 0 => Ok(Self { host, port }),
            _ => Err(ConfigError::InvalidValue { field: "GRADING_PORT", value: port.to_string() }),
        }
    }

    pub(crate) fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `DATABASE_URL` takes precedence over the individual `POSTGRES_*` parts.
#[derive(Debug, Clone)]
pub(crate) enum DatabaseSettings {
    Url(String),
    Parts { host: String, port: u16, user: String, password: String, name: String },
}

impl DatabaseSettings {
    pub(crate) fn connection_url(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Parts { host, port, user, password, name } => {
                format!("postgresql://{user}:{password}@{host}:{port}/{name}")
            }
        }
    }

    pub(super) fn lacks_password(&self) -> bool {
        matches!(self, Self::Parts { password, .. } if password.is_empty())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RedisSettings {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) db: u16,
    pub(crate) password: Option<String>,
}

impl RedisSettings {
    pub(crate) fn connection_url(&self) -> String {
        let auth = self.password.as_deref().map(|password| format!(":{password}@")).unwrap_or_default();
        format!("redis://{auth}{}:{}/{}", self.host, self.port, self.db)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
    pub(crate) api_v1_str: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct AiSettings {
    pub(crate) gemini_api_key: String,
    pub(crate) gemini_base_url: String,
    pub(crate) ai_model: String,
    /// Seconds.
    pub(crate) ai_request_timeout: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct IntakeSettings {
    pub(crate) max_image_size_bytes: usize,
    pub(crate) max_images_per_submission: usize,
    pub(crate) max_request_body_mb: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct GradingSettings {
    pub(crate) local_offset: UtcOffset,
    pub(crate) report_every_n_submissions: i64,
    pub(crate) report_mode: ReportMode,
    /// `0` turns the per-student quota off.
    pub(crate) rate_limit_per_minute: u64,
}

/// Where progress reports are produced once the trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReportMode {
    /// The job row is committed with the grading and picked up by the report worker.
    Background,
    /// Generated before the grading response is returned. A failed attempt hands the
    /// job to the report worker.
    Inline,
}

impl ReportMode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Inline => "inline",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

impl RuntimeSettings {
    /// Production always enforces secrets, other environments only on request.
    pub(super) fn requires_secrets(&self) -> bool {
        self.strict_config || self.environment == Environment::Production
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }
}
