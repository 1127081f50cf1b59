use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chatline_chat::{ControllerConfig, LatencyWindow};
use chatline_llm::{HTTP_BACKEND_ID, ServiceConfig};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use tempfile::NamedTempFile;

pub const SETTINGS_DIRECTORY_NAME: &str = "chatline";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
/// Environment variables with this prefix override the settings file.
pub const ENV_PREFIX: &str = "CHATLINE_";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MIN_LATENCY_MS: u64 = 1_000;
pub const DEFAULT_MAX_LATENCY_MS: u64 = 3_000;
pub const DEFAULT_MESSAGE_COPY_FEEDBACK_MS: u64 = 2_000;
pub const DEFAULT_CODE_COPY_FEEDBACK_MS: u64 = 1_500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Empty means the backend's own default endpoint.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
    #[serde(default = "default_message_copy_feedback_ms")]
    pub message_copy_feedback_ms: u64,
    #[serde(default = "default_code_copy_feedback_ms")]
    pub code_copy_feedback_ms: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: String::new(),
            api_key: String::new(),
            model: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            min_latency_ms: default_min_latency_ms(),
            max_latency_ms: default_max_latency_ms(),
            message_copy_feedback_ms: default_message_copy_feedback_ms(),
            code_copy_feedback_ms: default_code_copy_feedback_ms(),
        }
    }
}

impl ChatSettings {
    pub fn normalized(mut self) -> Self {
        self.backend = if self.backend.trim().is_empty() {
            default_backend()
        } else {
            self.backend.trim().to_ascii_lowercase()
        };
        self.endpoint = self.endpoint.trim().to_string();
        self.api_key = self.api_key.trim().to_string();
        self.model = self.model.trim().to_string();

        // An inverted window collapses to a fixed delay.
        if self.max_latency_ms < self.min_latency_ms {
            self.max_latency_ms = self.min_latency_ms;
        }
        if self.message_copy_feedback_ms == 0 {
            self.message_copy_feedback_ms = default_message_copy_feedback_ms();
        }
        if self.code_copy_feedback_ms == 0 {
            self.code_copy_feedback_ms = default_code_copy_feedback_ms();
        }

        self
    }

    pub fn to_service_config(&self) -> ServiceConfig {
        let model = Some(self.model.clone()).filter(|model| !model.trim().is_empty());
        // Zero disables the client-side timeout.
        let timeout = Some(self.request_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        ServiceConfig::new(&self.backend, &self.endpoint, &self.api_key, model)
            .with_request_timeout(timeout)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            latency: LatencyWindow::new(
                Duration::from_millis(self.min_latency_ms),
                Duration::from_millis(self.max_latency_ms),
            ),
            message_copy_window: Duration::from_millis(self.message_copy_feedback_ms),
            code_copy_window: Duration::from_millis(self.code_copy_feedback_ms),
        }
    }
}

pub struct SettingsStore {
    settings: Arc<ChatSettings>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".chatline"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_sources(&config_path);
        Self {
            settings: Arc::new(settings),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ChatSettings> {
        Arc::clone(&self.settings)
    }

    /// Writes the default settings to the config path when no file exists yet.
    ///
    /// Only defaults are written, so values taken from `CHATLINE_*` variables never
    /// land on disk. Returns whether a file was created.
    pub fn write_defaults_if_missing(&self) -> Result<bool, SettingsError> {
        if self.config_path.exists() {
            return Ok(false);
        }

        let defaults = ChatSettings::default();
        let content = serde_json::to_string_pretty(&defaults).context(EncodeSnafu {
            stage: "encode-default-settings",
        })?;

        let dir = self
            .config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).context(CreateDirSnafu {
            stage: "create-settings-directory",
            path: dir.to_path_buf(),
        })?;

        let mut staged = NamedTempFile::new_in(dir).context(StageFileSnafu {
            stage: "create-staged-settings-file",
            path: dir.to_path_buf(),
        })?;
        staged.write_all(content.as_bytes()).context(StageFileSnafu {
            stage: "write-staged-settings-file",
            path: staged.path().to_path_buf(),
        })?;
        // A file that appeared since the existence check wins.
        staged.persist_noclobber(&self.config_path).context(PlaceFileSnafu {
            stage: "place-settings-file",
            path: self.config_path.clone(),
        })?;

        tracing::info!(path = ?self.config_path, "wrote default settings file");
        Ok(true)
    }

    fn load_from_sources(path: &Path) -> ChatSettings {
        if !path.exists() {
            tracing::info!(path = ?path, "settings file not found, using defaults");
        }

        let figment = Figment::from(Serialized::defaults(ChatSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX));

        match figment.extract::<ChatSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    path = ?path,
                    error = %error,
                    "failed to parse settings, using defaults"
                );
                ChatSettings::default()
            }
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to encode settings on `{stage}`: {source}"))]
    Encode {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to create settings directory {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to stage settings in {path:?} on `{stage}`: {source}"))]
    StageFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to place settings file at {path:?} on `{stage}`: {source}"))]
    PlaceFile {
        stage: &'static str,
        path: PathBuf,
        source: tempfile::PersistError,
    },
}

fn default_backend() -> String {
    HTTP_BACKEND_ID.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_min_latency_ms() -> u64 {
    DEFAULT_MIN_LATENCY_MS
}

fn default_max_latency_ms() -> u64 {
    DEFAULT_MAX_LATENCY_MS
}

fn default_message_copy_feedback_ms() -> u64 {
    DEFAULT_MESSAGE_COPY_FEEDBACK_MS
}

fn default_code_copy_feedback_ms() -> u64 {
    DEFAULT_CODE_COPY_FEEDBACK_MS
}

#[cfg(test)]
mod tests {
    use chatline_chat::{CODE_COPY_WINDOW, MESSAGE_COPY_WINDOW};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_match_the_lifecycle_constants() {
        let config = ChatSettings::default().controller_config();

        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.message_copy_window, MESSAGE_COPY_WINDOW);
        assert_eq!(config.code_copy_window, CODE_COPY_WINDOW);
    }

    #[test]
    fn normalization_trims_and_repairs_values() {
        let settings = ChatSettings {
            backend: "  OpenAI ".to_string(),
            endpoint: " https://example.test/v1 ".to_string(),
            api_key: " sk-test ".to_string(),
            model: "   ".to_string(),
            min_latency_ms: 500,
            max_latency_ms: 100,
            message_copy_feedback_ms: 0,
            ..ChatSettings::default()
        }
        .normalized();

        assert_eq!(settings.backend, "openai");
        assert_eq!(settings.endpoint, "https://example.test/v1");
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.model, "");
        assert_eq!(settings.max_latency_ms, 500);
        assert_eq!(
            settings.message_copy_feedback_ms,
            DEFAULT_MESSAGE_COPY_FEEDBACK_MS
        );
    }

    #[test]
    fn blank_backend_falls_back_to_http() {
        let settings = ChatSettings {
            backend: " ".to_string(),
            ..ChatSettings::default()
        }
        .normalized();

        assert_eq!(settings.backend, HTTP_BACKEND_ID);
    }

    #[test]
    fn service_config_carries_model_and_timeout() {
        let settings = ChatSettings {
            backend: "openai".to_string(),
            api_key: "sk-test".to_string(),
            model: "gpt-4o".to_string(),
            request_timeout_secs: 0,
            ..ChatSettings::default()
        };

        let config = settings.to_service_config();

        assert_eq!(config.backend, "openai");
        assert_eq!(config.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn first_run_writes_a_defaults_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);
        let store = SettingsStore::new(path.clone());

        assert!(store.write_defaults_if_missing().expect("defaults are written"));
        assert!(path.exists());
        assert_eq!(*SettingsStore::new(path.clone()).settings(), ChatSettings::default());

        let leftovers = std::fs::read_dir(path.parent().expect("nested dir"))
            .expect("list settings dir")
            .count();
        assert_eq!(leftovers, 1);

        assert!(!store.write_defaults_if_missing().expect("second call is a no-op"));
    }

    #[test]
    fn existing_settings_file_is_left_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        let content = r#"{ "backend": "openai" }"#;
        std::fs::write(&path, content).expect("write settings");

        let store = SettingsStore::new(path.clone());

        assert!(!store.write_defaults_if_missing().expect("nothing to write"));
        assert_eq!(std::fs::read_to_string(&path).expect("read settings"), content);
        assert_eq!(store.settings().backend, "openai");
    }

    #[test]
    fn unwritable_directory_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").expect("write blocker");

        let store = SettingsStore::new(blocker.join(SETTINGS_FILE_NAME));
        let error = store
            .write_defaults_if_missing()
            .expect_err("a file cannot hold a settings directory");

        assert!(matches!(error, SettingsError::CreateDir { .. }));
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, r#"{ "min_latency_ms": 0, "max_latency_ms": 0 }"#)
            .expect("write settings");

        let settings = SettingsStore::new(path).settings();

        assert_eq!(settings.min_latency_ms, 0);
        assert_eq!(settings.max_latency_ms, 0);
        assert_eq!(
            settings.code_copy_feedback_ms,
            DEFAULT_CODE_COPY_FEEDBACK_MS
        );
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{ not json").expect("write settings");

        let store = SettingsStore::new(path);

        assert_eq!(*store.settings(), ChatSettings::default());
    }
}
