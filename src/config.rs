use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub generator: GeneratorConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let generator = GeneratorConfig {
            api_key: std::env::var("GENERATOR_API_KEY").unwrap_or_default(),
            model: std::env::var("GENERATOR_MODEL").unwrap_or_else(|_| "openai/gpt-4o-mini".into()),
            base_url: std::env::var("GENERATOR_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".into()),
            timeout_secs: std::env::var("GENERATOR_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(15),
        };
        Ok(Self {
            database_url,
            generator,
        })
    }
}
