use color_eyre::eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::{
    env, fs, io,
    path::PathBuf,
    sync::{OnceLock, RwLock},
    time::Duration,
};

/// Globally accessible application configuration values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_timeout_secs_value")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_shuffle_quiz_options_value")]
    pub shuffle_quiz_options: bool,
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    #[serde(default = "default_tutor_name")]
    pub tutor_name: String,
    /// Ring the terminal bell when an answer is revealed.
    #[serde(default = "default_feedback_bell_value")]
    pub feedback_bell: bool,
}

impl AppConfig {
    fn normalize(&mut self) {
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
        if self.gemini_model.trim().is_empty() {
            self.gemini_model = default_gemini_model();
        }
        if self.tutor_name.trim().is_empty() {
            self.tutor_name = default_tutor_name();
        }
        self.api_base = self.api_base.trim_end_matches('/').to_string();
        if self.api_base.is_empty() {
            self.api_base = default_api_base();
        }
    }

    pub fn system_prompt(&self) -> String {
        SYSTEM_PROMPT_TEMPLATE.replace("{TUTOR_NAME}", &self.tutor_name)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured key, falling back to `GEMINI_API_KEY` and then `API_KEY` from the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        let configured = self.gemini_api_key.trim();
        if !configured.is_empty() {
            return Some(configured.to_string());
        }
        ["GEMINI_API_KEY", "API_KEY"]
            .iter()
            .filter_map(|name| env::var(name).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_model: default_gemini_model(),
            gemini_api_key: String::new(),
            api_base: default_api_base(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            shuffle_quiz_options: default_shuffle_quiz_options_value(),
            storage_path: default_storage_path(),
            tutor_name: default_tutor_name(),
            feedback_bell: default_feedback_bell_value(),
        }
    }
}

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 45;
const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_STORAGE_PATH: &str = "data/mandarin_master.sqlite";
const DEFAULT_TUTOR_NAME: &str = "Suun Yi Yang";

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_storage_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_PATH)
}
fn default_tutor_name() -> String {
    DEFAULT_TUTOR_NAME.to_string()
}
const fn default_request_timeout_secs_value() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
const fn default_shuffle_quiz_options_value() -> bool {
    true
}
const fn default_feedback_bell_value() -> bool {
    true
}

const SYSTEM_PROMPT_TEMPLATE: &str = r#"Anda adalah {TUTOR_NAME}, seorang tutor Bahasa Mandarin profesional asal Indonesia yang mengenakan jilbab resmi.
Gunakan Bahasa Indonesia yang sopan, ramah, dan sangat menyemangati (encouraging).
Tugas Anda adalah membantu siswa Indonesia menguasai HSK tingkat 1 sampai 4.
Setiap penjelasan harus mencakup Hanzi, Pinyin, dan Arti dalam Bahasa Indonesia.
Kembalikan hanya JSON yang sesuai dengan skema yang diberikan."#;

const CONFIG_FILE_PATH: &str = "config/app_config.toml";

static APP_CONFIG: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn config_lock() -> &'static RwLock<AppConfig> {
    APP_CONFIG.get_or_init(|| RwLock::new(AppConfig::default()))
}

/// Attempt to load configuration from disk. If loading fails, the in-memory config will be reset to defaults
/// and the error will be returned for the caller to surface if desired.
pub fn initialize() -> Result<()> {
    let (config, outcome) = match load_config_from_disk() {
        Ok(config) => (config, Ok(())),
        Err(err) => (AppConfig::default(), Err(err)),
    };
    match config_lock().write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
    outcome
}

/// Retrieve a clone of the current configuration.
pub fn current() -> AppConfig {
    match config_lock().read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Path to the configuration file used for persistence.
pub fn config_file_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_PATH)
}

fn load_config_from_disk() -> Result<AppConfig> {
    let path = config_file_path();
    match fs::read_to_string(&path) {
        Ok(contents) => parse_config(&contents)
            .wrap_err_with(|| format!("failed to parse configuration at {}", path.display())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(err) => Err(eyre!(
            "failed to read configuration at {}: {}",
            path.display(),
            err
        )),
    }
}

fn parse_config(contents: &str) -> Result<AppConfig> {
    let mut config: AppConfig = toml::from_str(contents)?;
    config.normalize();
    Ok(config)
}
