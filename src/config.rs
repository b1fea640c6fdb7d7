use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3-compatible object storage (MinIO in development).
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub url_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub gemini: GeminiConfig,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| var(key).with_context(|| format!("{key} must be set"));
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: or("JWT_ISSUER", "foodlens"),
            audience: or("JWT_AUDIENCE", "foodlens-users"),
            ttl_minutes: parse_or(&var, "JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parse_or(&var, "JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };

        let storage = StorageConfig {
            endpoint: or("MINIO_ENDPOINT", "http://localhost:9000"),
            bucket: or("MINIO_BUCKET", "food-images"),
            access_key: required("MINIO_ACCESS_KEY")?,
            secret_key: required("MINIO_SECRET_KEY")?,
            region: or("MINIO_REGION", "us-east-1"),
            url_ttl_secs: parse_or(&var, "IMAGE_URL_TTL_SECS", 60 * 60),
        };

        let gemini = GeminiConfig {
            api_key: required("GEMINI_API_KEY")?,
            model: or("GEMINI_MODEL", "gemini-1.5-flash"),
            base_url: or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            timeout_secs: parse_or(&var, "GEMINI_TIMEOUT_SECS", 30),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt,
            storage,
            gemini,
            max_upload_bytes: parse_or(&var, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
        })
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    var(key).and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}
