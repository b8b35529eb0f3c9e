//! Voice catalog and playback configuration
//!
//! Caches the voices the speech platform offers and holds the user's
//! voice and rate choices. Changes made here apply to the next paragraph
//! spoken, never to one already being spoken.

use crate::{Result, StoryError};
use log::{debug, info, warn};
use std::fmt;

/// A voice offered by the speech platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceDescriptor {
    /// Backend identifier used to select the voice
    pub id: String,
    /// Human readable name, unique within one listing
    pub name: String,
    /// Language tag, e.g. `en-US`
    pub language: String,
}

impl VoiceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
        }
    }
}

impl fmt::Display for VoiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.language)
    }
}

/// Speech rate multiplier, 1.0 is the platform's normal speed
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Rate(f32);

impl Rate {
    pub const MIN: f32 = 0.5;
    pub const MAX: f32 = 2.0;
    pub const NORMAL: Rate = Rate(1.0);

    /// Validate a rate; NaN and values outside 0.5..=2.0 are rejected
    pub fn new(value: f32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(StoryError::InvalidRate(value))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

/// Which voice utterances are spoken with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VoiceSelection {
    /// Let the platform decide
    #[default]
    PlatformDefault,
    Named(VoiceDescriptor),
}

impl VoiceSelection {
    pub fn voice(&self) -> Option<&VoiceDescriptor> {
        match self {
            VoiceSelection::PlatformDefault => None,
            VoiceSelection::Named(voice) => Some(voice),
        }
    }
}

/// Voice and rate used for the next utterance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackConfig {
    pub voice: VoiceSelection,
    pub rate: Rate,
}

/// Anything that can enumerate platform voices
pub trait VoiceSource {
    fn voices(&mut self) -> Result<Vec<VoiceDescriptor>>;
}

/// Cached voice list plus the current playback configuration
#[derive(Debug, Default)]
pub struct VoiceCatalog {
    voices: Vec<VoiceDescriptor>,
    config: PlaybackConfig,
    /// Explicitly chose the platform default; refresh must not override it
    default_chosen: bool,
}

impl VoiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-read the voice list from the platform
    ///
    /// Selects the first voice when nothing is selected yet. A selected
    /// voice that disappeared from the listing is replaced by the first
    /// voice, or by the platform default when the listing is empty.
    pub fn refresh<S: VoiceSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        let voices = source.voices()?;
        info!("Voice catalog refreshed: {} voices", voices.len());
        self.voices = voices;

        let current = self.config.voice.voice().map(|v| v.name.clone());
        match current {
            Some(name) => match self.find(&name).cloned() {
                Some(voice) => self.config.voice = VoiceSelection::Named(voice),
                None => {
                    warn!("Selected voice '{}' is no longer available", name);
                    self.config.voice = self.first_or_default();
                }
            },
            None if !self.default_chosen => {
                self.config.voice = self.first_or_default();
            }
            None => {}
        }

        debug!("Active voice after refresh: {:?}", self.config.voice);
        Ok(())
    }

    /// Select a voice by name
    pub fn select(&mut self, name: &str) -> Result<()> {
        let voice = self
            .find(name)
            .cloned()
            .ok_or_else(|| StoryError::InvalidVoice(name.to_string()))?;
        debug!("Selecting voice: {}", voice);
        self.config.voice = VoiceSelection::Named(voice);
        self.default_chosen = false;
        Ok(())
    }

    /// Use whatever voice the platform picks
    pub fn select_platform_default(&mut self) {
        debug!("Selecting platform default voice");
        self.config.voice = VoiceSelection::PlatformDefault;
        self.default_chosen = true;
    }

    /// Set the speech rate; out-of-range values leave the rate unchanged
    pub fn set_rate(&mut self, value: f32) -> Result<()> {
        let rate = Rate::new(value)?;
        debug!("Setting rate to {}", rate);
        self.config.rate = rate;
        Ok(())
    }

    pub fn voices(&self) -> &[VoiceDescriptor] {
        &self.voices
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn selected(&self) -> Option<&VoiceDescriptor> {
        self.config.voice.voice()
    }

    pub fn rate(&self) -> Rate {
        self.config.rate
    }

    fn find(&self, name: &str) -> Option<&VoiceDescriptor> {
        self.voices.iter().find(|v| v.name == name)
    }

    fn first_or_default(&self) -> VoiceSelection {
        self.voices
            .first()
            .cloned()
            .map_or(VoiceSelection::PlatformDefault, VoiceSelection::Named)
    }
}
