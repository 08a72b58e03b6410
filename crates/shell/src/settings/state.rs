use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::{ResultExt, Snafu};

use crate::chat::metrics::{
    DEFAULT_COLUMNS, DEFAULT_LINE_HEIGHT, DEFAULT_VERTICAL_PADDING, LineMetrics,
};

pub const SETTINGS_DIRECTORY_NAME: &str = "thespis";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const STORE_FILE_NAME: &str = "local_storage.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn is_dark(self) -> bool {
        matches!(self, Self::Dark)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComposerSettings {
    #[serde(default = "default_line_height")]
    pub line_height: f32,
    #[serde(default = "default_vertical_padding")]
    pub vertical_padding: f32,
    #[serde(default = "default_columns")]
    pub columns: usize,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            line_height: default_line_height(),
            vertical_padding: default_vertical_padding(),
            columns: default_columns(),
        }
    }
}

impl ComposerSettings {
    fn normalized(mut self) -> Self {
        if !self.line_height.is_finite() || self.line_height <= 0.0 {
            self.line_height = default_line_height();
        }
        if !self.vertical_padding.is_finite() || self.vertical_padding < 0.0 {
            self.vertical_padding = default_vertical_padding();
        }
        if self.columns == 0 {
            self.columns = default_columns();
        }
        self
    }

    pub fn line_metrics(&self) -> LineMetrics {
        LineMetrics {
            line_height: self.line_height,
            vertical_padding: self.vertical_padding,
            columns: self.columns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellSettings {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(
        default,
        serialize_with = "serialize_theme_mode",
        deserialize_with = "deserialize_theme_mode"
    )]
    pub theme_mode: ThemeMode,
    #[serde(default)]
    pub composer: ComposerSettings,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            theme_mode: ThemeMode::default(),
            composer: ComposerSettings::default(),
        }
    }
}

impl ShellSettings {
    pub fn normalized(mut self) -> Self {
        if self.store_path.as_os_str().is_empty() {
            self.store_path = default_store_path();
        }
        self.composer = self.composer.normalized();
        self
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ShellSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".thespis"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ShellSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: ShellSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn load_from_disk(path: &Path) -> ShellSettings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
            return ShellSettings::default();
        }

        let figment = Figment::from(Serialized::defaults(ShellSettings::default()))
            .merge(Json::file(path));

        match figment.extract::<ShellSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                ShellSettings::default()
            }
        }
    }

    fn persist(&self, settings: &ShellSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn default_store_path() -> PathBuf {
    SettingsStore::default_config_dir().join(STORE_FILE_NAME)
}

fn default_line_height() -> f32 {
    DEFAULT_LINE_HEIGHT
}

fn default_vertical_padding() -> f32 {
    DEFAULT_VERTICAL_PADDING
}

fn default_columns() -> usize {
    DEFAULT_COLUMNS
}

fn serialize_theme_mode<S>(value: &ThemeMode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.name())
}

fn deserialize_theme_mode<'de, D>(deserializer: D) -> Result<ThemeMode, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(parse_theme_mode(&value))
}

fn parse_theme_mode(value: &str) -> ThemeMode {
    if value.trim().eq_ignore_ascii_case("dark") {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}
