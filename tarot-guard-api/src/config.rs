use anyhow::{Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use std::path::{Path, PathBuf};
use tarot_guard_core::{
    AuthorizedRoles, ContentPolicy, Role, SensitiveFieldSet, DEFAULT_MAX_DEPTH,
    DEFAULT_SENSITIVE_FIELDS,
};

use crate::observability::LogConfig;
use crate::security::{
    AuditLogger, CompositeAuditWriter, DatabaseAuditWriter, EndpointGuards, FailureMode,
    FileAuditWriter, TracingAuditWriter, DEFAULT_AI_GENERATION_PATTERNS, DEFAULT_BODY_LIMIT,
    DEFAULT_READING_PATTERNS,
};
use crate::{middleware::JwtDecoder, GuardState};

const ENV_PREFIX: &str = "TAROT_GUARD";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    pub policy: PolicyConfig,
    pub endpoints: EndpointConfig,
    pub auth: AuthConfig,
    pub audit: AuditConfig,
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub sensitive_fields: Vec<String>,
    pub authorized_roles: Vec<Role>,
    pub max_depth: usize,
    pub max_body_bytes: usize,
    pub failure_mode: FailureMode,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            sensitive_fields: DEFAULT_SENSITIVE_FIELDS.iter().map(|s| s.to_string()).collect(),
            authorized_roles: vec![Role::Reader, Role::Admin, Role::SuperAdmin],
            max_depth: DEFAULT_MAX_DEPTH,
            max_body_bytes: DEFAULT_BODY_LIMIT,
            failure_mode: FailureMode::Open,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub reading_patterns: Vec<String>,
    pub ai_generation_patterns: Vec<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            reading_patterns: DEFAULT_READING_PATTERNS.iter().map(|s| s.to_string()).collect(),
            ai_generation_patterns: DEFAULT_AI_GENERATION_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret shared with the auth service; all requests are anonymous when unset
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub database_url: Option<String>,
    pub file_path: Option<PathBuf>,
    pub tracing: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            file_path: None,
            tracing: true,
        }
    }
}

impl GuardConfig {
    /// Load from `config/guard.*` and `TAROT_GUARD__*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_builder(
            ConfigLoader::builder()
                .add_source(File::with_name("config/guard").required(false))
                .add_source(Self::environment()),
        )
    }

    /// Load from an explicit file, still honouring environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::from_builder(
            ConfigLoader::builder()
                .add_source(File::from(path))
                .add_source(Self::environment()),
        )
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("policy.sensitive_fields")
            .with_list_parse_key("policy.authorized_roles")
            .with_list_parse_key("endpoints.reading_patterns")
            .with_list_parse_key("endpoints.ai_generation_patterns")
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config = builder.build().context("failed to read guard configuration")?;
        Ok(config.try_deserialize()?)
    }

    pub fn content_policy(&self) -> Result<ContentPolicy> {
        let fields = SensitiveFieldSet::new(&self.policy.sensitive_fields)?;
        let roles = AuthorizedRoles::new(self.policy.authorized_roles.iter().copied());
        Ok(ContentPolicy::new(fields, roles).with_max_depth(self.policy.max_depth))
    }

    pub fn endpoint_guards(&self) -> Result<EndpointGuards> {
        EndpointGuards::new(
            &self.endpoints.reading_patterns,
            &self.endpoints.ai_generation_patterns,
        )
        .context("invalid endpoint guard pattern")
    }

    /// Audit writer stack described by the `audit` section, tracing if nothing is enabled.
    pub fn audit_logger(&self) -> Result<AuditLogger> {
        let mut writer = CompositeAuditWriter::new();

        if self.audit.tracing {
            writer = writer.add_writer(Box::new(TracingAuditWriter::new()));
        }
        if let Some(ref path) = self.audit.file_path {
            writer = writer.add_writer(Box::new(FileAuditWriter::new(path.clone())));
        }
        if let Some(ref url) = self.audit.database_url {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect_lazy(url)
                .context("invalid audit database url")?;
            writer = writer.add_writer(Box::new(DatabaseAuditWriter::new(pool)));
        }

        if writer.is_empty() {
            return Ok(AuditLogger::new(Box::new(TracingAuditWriter::new())));
        }
        Ok(AuditLogger::new(Box::new(writer)))
    }

    /// Build the shared state for the guard layers.
    pub fn build_state(&self) -> Result<GuardState> {
        let mut state = GuardState::new(self.content_policy()?, self.audit_logger()?)
            .with_guards(self.endpoint_guards()?)
            .with_failure_mode(self.policy.failure_mode)
            .with_body_limit(self.policy.max_body_bytes);

        if let Some(ref secret) = self.auth.jwt_secret {
            state = state.with_jwt(JwtDecoder::from_secret(secret));
        }

        tracing::info!(
            patterns = self.policy.sensitive_fields.len(),
            failure_mode = self.policy.failure_mode.as_str(),
            "Guard state built"
        );
        Ok(state)
    }
}
