//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml`, `config.<env>.toml`,
//! the legacy unprefixed environment keys (`MODEL`, `EMBEDDINGS_MODEL_NAME`,
//! `PERSIST_DIRECTORY`, `TARGET_SOURCE_CHUNKS`) and finally `APP_*` variables.
//! The result is resolved once into [`Settings`] and handed to every
//! constructor explicitly.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Metric, TruncationPolicy};

const LEGACY_ENV_KEYS: &[&str] = &[
    "MODEL",
    "EMBEDDINGS_MODEL_NAME",
    "PERSIST_DIRECTORY",
    "TARGET_SOURCE_CHUNKS",
];

/// Fully resolved settings. Missing keys fall back to [`Settings::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Generation model served by Ollama.
    pub model: String,
    pub embeddings_model_name: String,
    pub persist_directory: PathBuf,
    /// Default k for retrieval.
    pub target_source_chunks: usize,
    pub table_name: String,
    pub metric: Metric,
    /// Directory holding `tokenizer.json`, `config.json` and weights.
    /// Defaults to `models/<embeddings_model_name>`.
    pub model_dir: Option<PathBuf>,
    pub ollama_url: String,
    /// Deadline for the first token and between consecutive tokens.
    pub generation_timeout_secs: u64,
    /// Forwarded to the model server as `num_ctx`.
    pub context_window: Option<usize>,
    pub max_prompt_chars: Option<usize>,
    pub truncation: TruncationPolicy,
    #[serde(deserialize_with = "lenient_bool")]
    pub use_fake_embeddings: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub use_fake_llm: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "mistral".to_string(),
            embeddings_model_name: "all-MiniLM-L6-v2".to_string(),
            persist_directory: PathBuf::from("db"),
            target_source_chunks: 4,
            table_name: "documents".to_string(),
            metric: Metric::Cosine,
            model_dir: None,
            ollama_url: "http://localhost:11434".to_string(),
            generation_timeout_secs: 120,
            context_window: None,
            max_prompt_chars: None,
            truncation: TruncationPolicy::TruncateStart,
            use_fake_embeddings: false,
            use_fake_llm: false,
        }
    }
}

impl Settings {
    /// Load and validate settings for the environment named by `RUST_ENV`.
    pub fn load() -> Result<Self> {
        Config::load()?.settings()
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_source_chunks == 0 {
            return Err(Error::InvalidConfig(
                "target_source_chunks must be >= 1".to_string(),
            ));
        }
        if self.generation_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "generation_timeout_secs must be >= 1".to_string(),
            ));
        }
        if self.max_prompt_chars == Some(0) {
            return Err(Error::InvalidConfig(
                "max_prompt_chars must be >= 1 when set".to_string(),
            ));
        }
        if self.table_name.trim().is_empty() {
            return Err(Error::InvalidConfig("table_name is empty".to_string()));
        }
        Ok(())
    }

    pub fn model_dir(&self) -> PathBuf {
        match &self.model_dir {
            Some(dir) => dir.clone(),
            None => PathBuf::from("models").join(&self.embeddings_model_name),
        }
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment
            .merge(Env::raw().only(LEGACY_ENV_KEYS))
            .merge(Env::prefixed("APP_"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Extract, expand paths and validate.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.persist_directory = expand_path(settings.persist_directory.to_string_lossy());
        settings.model_dir = settings
            .model_dir
            .map(|dir| expand_path(dir.to_string_lossy()));
        settings.validate()?;
        debug!(
            model = %settings.model,
            embeddings = %settings.embeddings_model_name,
            persist_directory = %settings.persist_directory.display(),
            k = settings.target_source_chunks,
            "resolved settings"
        );
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands ${VAR} and $VAR environment variables
/// - Expands leading '~' to the user's home directory
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

// Accepts `true`, `1`, `"yes"` and friends so `APP_USE_FAKE_EMBEDDINGS=1` works.
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(i) => Ok(i != 0),
        Flag::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("not a boolean: {other}"))),
        },
    }
}
