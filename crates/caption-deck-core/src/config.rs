use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llava:latest";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MODELS_TIMEOUT_SECS: u64 = 3;

/// Prompt file picked up from the working directory when present.
pub const SYSTEM_PROMPT_FILE: &str = "system.txt";

pub const DEFAULT_SYSTEM_PROMPT: &str = "Your function is to generate an exacting and objective visual description for an AI art generator, constrained to a single paragraph of no more than three sentences. Specify the artistic style and medium, then articulate the composition, lighting, color story, and prevailing mood. If a dominant figure is present, inventory their distinct characteristics including physical build, complexion, and posture. You must also meticulously account for any digital overlays or post-processing effects, such as cinematic bars or filters, and for any 'text', you are required to quote its content directly and describe its font and position on the canvas. All subjective interpretation, meta-commentary, and extraneous remarks are to be excluded, delivering only the core English description.";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub endpoint: String,
    pub model: String,
    pub system_prompt: String,
    pub request_timeout_secs: u64,
    pub models_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            models_timeout_secs: DEFAULT_MODELS_TIMEOUT_SECS,
        }
    }
}

/// Load `Config.toml` (optional) and `CAPTION_DECK_*` environment overrides
/// on top of the built-in defaults.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_with(&AppConfig::default())
}

/// Same as [`load_configuration`], with host-specific defaults underneath
/// the file and environment layers. A `system.txt` in the working directory
/// still replaces the default prompt.
pub fn load_configuration_with(defaults: &AppConfig) -> Result<AppConfig, ConfigError> {
    let system_prompt = if defaults.system_prompt == DEFAULT_SYSTEM_PROMPT {
        default_system_prompt(Path::new(SYSTEM_PROMPT_FILE))
    } else {
        defaults.system_prompt.clone()
    };

    let builder = Config::builder()
        .set_default("endpoint", defaults.endpoint.as_str())?
        .set_default("model", defaults.model.as_str())?
        .set_default("system_prompt", system_prompt)?
        .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
        .set_default("models_timeout_secs", defaults.models_timeout_secs as i64)?
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("CAPTION_DECK"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

fn default_system_prompt(prompt_file: &Path) -> String {
    if prompt_file.is_file() {
        match fs::read_to_string(prompt_file) {
            Ok(text) => {
                debug!("Using system prompt from {}", prompt_file.display());
                return text;
            }
            Err(e) => warn!("Could not read {}: {}", prompt_file.display(), e),
        }
    }
    DEFAULT_SYSTEM_PROMPT.to_string()
}

/// Treat `value` as a path when it names an existing file, otherwise as the
/// prompt text itself.
pub fn resolve_system_prompt(value: &str) -> std::io::Result<String> {
    let path = Path::new(value);
    if path.is_file() {
        Ok(fs::read_to_string(path)?.trim().to_string())
    } else {
        Ok(value.to_string())
    }
}

/// Settings for one batch run. Not mutated once the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub endpoint: String,
    pub directory: PathBuf,
    pub model: String,
    pub prompt: String,
    pub overwrite: bool,
    pub timeout: Duration,
}

impl JobConfig {
    pub fn new(config: &AppConfig, directory: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            directory: directory.into(),
            model: config.model.clone(),
            prompt: config.system_prompt.clone(),
            overwrite: false,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Directory and model are both required before a run can start.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.directory.as_os_str().is_empty() || self.model.trim().is_empty() {
            return Err(crate::Error::Other(
                "Error: Check directory and model.".to_string(),
            ));
        }
        Ok(())
    }
}
