//! Configuration management

use crate::speech::BackendKind;
use crate::story::{StoryLength, StoryRequest};
use crate::story::generator::CREDENTIAL_VAR;
use crate::{Result, StoryError};
use ini::Ini;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Application configuration
///
/// Persistent settings: speech backend, voice and rate, the default
/// story parameters, the generator command and where history is kept.
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path (~/.storyteller.cfg)
    path: PathBuf,
}

impl Config {
    /// Load configuration from the home directory, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from `path`, creating a default file if missing
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| StoryError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(&path)
                .map_err(|e| StoryError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self { ini, path })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| StoryError::Config(format!("Failed to save config: {}", e)))
    }

    /// Get config file path (~/.storyteller.cfg)
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!(".{}.cfg", crate::APP_NAME))
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create default configuration
    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("speech"))
            .set("backend", "auto")
            .set("rate", "1.0");

        ini.with_section(Some("story"))
            .set("genre", "any")
            .set("tone", "neutral")
            .set("theme", "modern")
            .set("length", "medium")
            .set("keywords", "");

        ini.with_section(Some("generator"))
            .set("credential_env", CREDENTIAL_VAR);

        ini.with_section(Some("history"));

        ini
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get a non-empty string value, if present
    pub fn get_opt(&self, section: &str, key: &str) -> Option<String> {
        self.ini
            .get_from(Some(section), key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Get a float value from config
    pub fn get_float(&self, section: &str, key: &str, default: f32) -> f32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    // Speech settings

    /// Which speech backend to use
    pub fn backend(&self) -> BackendKind {
        let value = self.get_string("speech", "backend", "auto");
        value.parse().unwrap_or_else(|e| {
            warn!("{}; using auto", e);
            BackendKind::Auto
        })
    }

    /// Preferred voice name, if one was saved
    pub fn voice(&self) -> Option<String> {
        self.get_opt("speech", "voice")
    }

    /// Speech rate multiplier
    pub fn rate(&self) -> f32 {
        self.get_float("speech", "rate", 1.0)
    }

    // Story defaults

    /// Story parameters to start the session with
    pub fn story_defaults(&self) -> StoryRequest {
        let defaults = StoryRequest::default();
        let length = self
            .get_opt("story", "length")
            .and_then(|v| match v.parse::<StoryLength>() {
                Ok(length) => Some(length),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            })
            .unwrap_or(defaults.length);

        StoryRequest {
            prompt: String::new(),
            genre: self.get_string("story", "genre", &defaults.genre),
            tone: self.get_string("story", "tone", &defaults.tone),
            theme: self.get_string("story", "theme", &defaults.theme),
            length,
            keywords: self.get_string("story", "keywords", ""),
        }
    }

    // Generator settings

    /// Command line of the story generator
    pub fn generator_command(&self) -> Option<String> {
        self.get_opt("generator", "command")
    }

    /// Environment variable holding the API credential
    pub fn credential_env(&self) -> String {
        self.get_opt("generator", "credential_env")
            .unwrap_or_else(|| CREDENTIAL_VAR.to_string())
    }

    /// Credential read from the configured environment variable
    pub fn credential(&self) -> Option<String> {
        std::env::var(self.credential_env())
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    // History

    /// Directory the story history is stored in
    pub fn history_dir(&self) -> PathBuf {
        self.get_opt("history", "dir")
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|d| d.join(crate::APP_NAME)))
            .unwrap_or_else(|| PathBuf::from(format!(".{}", crate::APP_NAME)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_file_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyteller.cfg");
        let config = Config::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.backend(), BackendKind::Auto);
        assert_eq!(config.rate(), 1.0);
        assert_eq!(config.voice(), None);
        assert_eq!(config.story_defaults(), StoryRequest::default());
        assert_eq!(config.generator_command(), None);
        assert_eq!(config.credential_env(), CREDENTIAL_VAR);
    }

    #[test]
    fn test_default_history_dir_named_after_app() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path().join("storyteller.cfg")).unwrap();
        match dirs::data_dir() {
            Some(data) => assert_eq!(config.history_dir(), data.join(crate::APP_NAME)),
            None => assert_eq!(config.history_dir(), PathBuf::from(".storyteller")),
        }
    }

    #[test]
    fn test_values_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyteller.cfg");
        std::fs::write(
            &path,
            "[speech]\nbackend=silent\nvoice=English (America)\nrate=1.5\n\
             [story]\ngenre=horror\nlength=long\n\
             [generator]\ncommand=python3 gen.py\n\
             [history]\ndir=/tmp/tales\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend(), BackendKind::Silent);
        assert_eq!(config.voice().as_deref(), Some("English (America)"));
        assert_eq!(config.rate(), 1.5);

        let story = config.story_defaults();
        assert_eq!(story.genre, "horror");
        assert_eq!(story.tone, "neutral");
        assert_eq!(story.length, StoryLength::Long);

        assert_eq!(config.generator_command().as_deref(), Some("python3 gen.py"));
        assert_eq!(config.history_dir(), PathBuf::from("/tmp/tales"));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyteller.cfg");
        std::fs::write(&path, "[speech]\nbackend=sapi\nrate=fast\n[story]\nlength=epic\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend(), BackendKind::Auto);
        assert_eq!(config.rate(), 1.0);
        assert_eq!(config.story_defaults().length, StoryLength::Medium);
    }

    #[test]
    fn test_set_and_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storyteller.cfg");
        let mut config = Config::load_from(&path).unwrap();
        config.set("speech", "rate", "0.8");
        config.set("speech", "voice", "Alice");
        config.save().unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.rate(), 0.8);
        assert_eq!(reloaded.voice().as_deref(), Some("Alice"));
    }
}
