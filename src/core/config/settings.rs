use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment,
    parse_report_mode, parse_u16, parse_u64, parse_usize, parse_utc_offset,
};
use super::types::{
    AiSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, GradingSettings,
    IntakeSettings, RedisSettings, RuntimeSettings, ServerSettings, Settings, TelemetrySettings,
};

const DEFAULT_MAX_IMAGE_SIZE_BYTES: &str = "4194304";

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let server = ServerSettings::bind(
            env_or_default("GRADING_HOST", "0.0.0.0"),
            &env_or_default("GRADING_PORT", "8000"),
        )?;

        let environment = parse_environment(
            env_optional("GRADING_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let runtime = RuntimeSettings {
            environment,
            strict_config: env_optional("GRADING_STRICT_CONFIG")
                .map(|value| parse_bool(&value))
                .unwrap_or(false),
        };

        let project_name = env_or_default("PROJECT_NAME", "Homework Grading API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let database = match env_optional("DATABASE_URL") {
            Some(url) => DatabaseSettings::Url(url),
            None => DatabaseSettings::Parts {
                host: env_or_default("POSTGRES_SERVER", "localhost"),
                port: parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?,
                user: env_or_default("POSTGRES_USER", "grading"),
                password: env_or_default("POSTGRES_PASSWORD", ""),
                name: env_or_default("POSTGRES_DB", "homework_grading"),
            },
        };

        let redis = RedisSettings {
            host: env_or_default("REDIS_HOST", "localhost"),
            port: parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?,
            db: parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?,
            password: env_optional("REDIS_PASSWORD"),
        };

        let gemini_api_key = env_or_default("GEMINI_API_KEY", "");
        let gemini_base_url =
            env_or_default("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com/v1beta");
        let ai_model = env_or_default("AI_MODEL", "gemini-2.5-flash");
        let ai_request_timeout =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "120"))?;

        let max_image_size_bytes = parse_usize(
            "MAX_IMAGE_SIZE_BYTES",
            env_or_default("MAX_IMAGE_SIZE_BYTES", DEFAULT_MAX_IMAGE_SIZE_BYTES),
        )?;
        let max_images_per_submission = parse_usize(
            "MAX_IMAGES_PER_SUBMISSION",
            env_or_default("MAX_IMAGES_PER_SUBMISSION", "10"),
        )?;
        let max_request_body_mb =
            parse_usize("MAX_REQUEST_BODY_MB", env_or_default("MAX_REQUEST_BODY_MB", "64"))?;

        let local_offset = parse_utc_offset(
            "LOCAL_UTC_OFFSET_HOURS",
            env_or_default("LOCAL_UTC_OFFSET_HOURS", "9"),
        )?;
        let report_every_n_submissions = parse_u64(
            "REPORT_EVERY_N_SUBMISSIONS",
            env_or_default("REPORT_EVERY_N_SUBMISSIONS", "3"),
        )? as i64;
        let report_mode = parse_report_mode(env_optional("REPORT_GENERATION_MODE"))?;
        let rate_limit_per_minute = parse_u64(
            "GRADE_RATE_LIMIT_PER_MINUTE",
            env_or_default("GRADE_RATE_LIMIT_PER_MINUTE", "10"),
        )?;

        let log_level = env_or_default("GRADING_LOG_LEVEL", "info");
        let json = env_optional("GRADING_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server,
            runtime,
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            database,
            redis,
            ai: AiSettings { gemini_api_key, gemini_base_url, ai_model, ai_request_timeout },
            intake: IntakeSettings {
                max_image_size_bytes,
                max_images_per_submission,
                max_request_body_mb,
            },
            grading: GradingSettings {
                local_offset,
                report_every_n_submissions,
                report_mode,
                rate_limit_per_minute,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server(&self) -> &ServerSettings {
        &self.server
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn intake(&self) -> &IntakeSettings {
        &self.intake
    }

    pub(crate) fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.intake.max_image_size_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_IMAGE_SIZE_BYTES",
                value: "0".to_string(),
            });
        }

        if self.intake.max_images_per_submission == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_IMAGES_PER_SUBMISSION",
                value: "0".to_string(),
            });
        }

        if self.grading.report_every_n_submissions <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "REPORT_EVERY_N_SUBMISSIONS",
                value: self.grading.report_every_n_submissions.to_string(),
            });
        }

        if !self.runtime.requires_secrets() {
            return Ok(());
        }

        if self.database.lacks_password() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.gemini_api_key.is_empty() {
            return Err(ConfigError::MissingSecret("GEMINI_API_KEY"));
        }
        if self.ai.gemini_base_url.is_empty() {
            return Err(ConfigError::MissingSecret("GEMINI_BASE_URL"));
        }

        Ok(())
    }
}
