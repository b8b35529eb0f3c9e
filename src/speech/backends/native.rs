//! Native Rust TTS backend using the tts crate
//!
//! This backend uses the `tts` crate which provides a unified interface to:
//! - Speech Dispatcher on Linux (via native bindings)
//! - AVFoundation on macOS/iOS (via native bindings)
//! - WinRT / SAPI on Windows
//!
//! Completion is reported through the crate's utterance-end callback, so
//! platforms without utterance callbacks are rejected at construction.

use crate::speech::catalog::{Rate, VoiceDescriptor, VoiceSource};
use crate::speech::synth::{EventSink, Generation, Synth, SynthEvent, Utterance};
use crate::{Result, StoryError};
use log::{debug, error, warn};
use std::sync::{Arc, Mutex};
use tts::{Tts as TtsCrate, UtteranceId};

/// Utterances submitted to the platform, waiting for their end callback
#[derive(Default)]
struct Pending {
    tracked: Vec<(UtteranceId, Generation)>,
    /// End callbacks that arrived before `speak` returned the id
    ended_early: Vec<UtteranceId>,
}

/// What has to change on the platform before the next utterance
#[derive(Debug, PartialEq, Eq)]
enum VoiceChange<'a> {
    Keep,
    Set(&'a VoiceDescriptor),
    /// A named voice is applied but the platform default is wanted
    RestoreDefault,
}

/// Native TTS backend using the tts crate
pub struct NativeSynth {
    /// The tts crate's TTS instance
    tts: TtsCrate,

    events: EventSink,

    pending: Arc<Mutex<Pending>>,

    /// Voice id currently applied to the platform; `None` while the
    /// platform default is in use
    voice_id: Option<String>,

    /// Voice the platform used before any voice was selected
    default_voice: Option<tts::Voice>,

    /// Rate currently applied to the platform
    rate: Option<Rate>,
}

impl NativeSynth {
    /// Create a new native TTS synthesizer
    ///
    /// Initializes the platform-appropriate TTS backend
    pub fn new(events: EventSink) -> Result<Self> {
        debug!("Creating native TTS backend");

        let tts = TtsCrate::default()
            .map_err(|e| StoryError::Synthesis(format!("Failed to initialize TTS: {}", e)))?;

        let features = tts.supported_features();
        if !features.utterance_callbacks {
            return Err(StoryError::Synthesis(
                "Platform TTS does not report utterance completion".to_string(),
            ));
        }

        let pending = Arc::new(Mutex::new(Pending::default()));
        let callback_pending = Arc::clone(&pending);
        let callback_events = events.clone();
        tts.on_utterance_end(Some(Box::new(move |id: UtteranceId| {
            let Ok(mut pending) = callback_pending.lock() else {
                return;
            };
            match pending.tracked.iter().position(|(tracked, _)| *tracked == id) {
                Some(pos) => {
                    let (_, generation) = pending.tracked.remove(pos);
                    callback_events.send(SynthEvent::Finished(generation));
                }
                None => pending.ended_early.push(id),
            }
        })))
        .map_err(|e| StoryError::Synthesis(format!("Failed to register callback: {}", e)))?;

        let default_voice = if features.voice {
            tts.voice().ok().flatten()
        } else {
            None
        };

        debug!("Native TTS backend created successfully");

        Ok(Self {
            tts,
            events,
            pending,
            voice_id: None,
            default_voice,
            rate: None,
        })
    }

    /// Map a rate multiplier onto the platform's rate range
    ///
    /// 1.0 maps to the platform's normal rate, 0.5 to its minimum and
    /// 2.0 to its maximum, linearly in between.
    fn convert_rate(rate: Rate, min: f32, normal: f32, max: f32) -> f32 {
        let m = rate.value();
        let converted = if m >= 1.0 {
            normal + (max - normal) * (m - 1.0)
        } else {
            normal - (normal - min) * (1.0 - m) / (1.0 - Rate::MIN)
        };
        converted.clamp(min.min(max), max.max(min))
    }

    fn apply_rate(&mut self, rate: Rate) -> Result<()> {
        if self.rate == Some(rate) {
            return Ok(());
        }
        if !self.tts.supported_features().rate {
            warn!("Rate control not supported on this platform");
            self.rate = Some(rate);
            return Ok(());
        }

        let converted = Self::convert_rate(
            rate,
            self.tts.min_rate(),
            self.tts.normal_rate(),
            self.tts.max_rate(),
        );
        debug!("Setting rate to {} (platform {})", rate, converted);
        self.tts
            .set_rate(converted)
            .map_err(|e| StoryError::Synthesis(format!("Failed to set rate: {}", e)))?;
        self.rate = Some(rate);
        Ok(())
    }

    fn voice_change<'a>(applied: Option<&str>, wanted: Option<&'a VoiceDescriptor>) -> VoiceChange<'a> {
        match wanted {
            Some(voice) if applied == Some(voice.id.as_str()) => VoiceChange::Keep,
            Some(voice) => VoiceChange::Set(voice),
            None if applied.is_some() => VoiceChange::RestoreDefault,
            None => VoiceChange::Keep,
        }
    }

    fn apply_voice(&mut self, voice: Option<&VoiceDescriptor>) -> Result<()> {
        let change = Self::voice_change(self.voice_id.as_deref(), voice);
        if change == VoiceChange::Keep {
            return Ok(());
        }
        if !self.tts.supported_features().voice {
            warn!("Voice selection not supported on this platform");
            return Ok(());
        }

        match change {
            VoiceChange::Keep => Ok(()),
            VoiceChange::RestoreDefault => self.restore_default_voice(),
            VoiceChange::Set(voice) => self.set_named_voice(voice),
        }
    }

    fn restore_default_voice(&mut self) -> Result<()> {
        match &self.default_voice {
            Some(default) => {
                debug!("Restoring platform default voice: {}", default.name());
                self.tts
                    .set_voice(default)
                    .map_err(|e| StoryError::Synthesis(format!("Failed to set voice: {}", e)))?;
            }
            None => warn!("Platform default voice unknown; keeping the current voice"),
        }
        self.voice_id = None;
        Ok(())
    }

    fn set_named_voice(&mut self, voice: &VoiceDescriptor) -> Result<()> {
        let voices = self
            .tts
            .voices()
            .map_err(|e| StoryError::Synthesis(format!("Failed to get voices: {}", e)))?;

        match voices.iter().find(|v| v.id() == voice.id) {
            Some(platform_voice) => {
                debug!("Selecting voice: {}", voice);
                self.tts
                    .set_voice(platform_voice)
                    .map_err(|e| StoryError::Synthesis(format!("Failed to set voice: {}", e)))?;
                self.voice_id = Some(voice.id.clone());
            }
            None => warn!("Voice {} not offered by the platform any more", voice),
        }
        Ok(())
    }
}

impl VoiceSource for NativeSynth {
    fn voices(&mut self) -> Result<Vec<VoiceDescriptor>> {
        let voices = self
            .tts
            .voices()
            .map_err(|e| StoryError::Synthesis(format!("Failed to get voices: {}", e)))?;

        Ok(voices
            .iter()
            .map(|v| VoiceDescriptor::new(v.id(), v.name(), v.language().to_string()))
            .collect())
    }
}

impl Synth for NativeSynth {
    fn name(&self) -> &'static str {
        "native"
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<()> {
        self.apply_rate(utterance.rate)?;
        self.apply_voice(utterance.voice.as_ref())?;

        debug!("Speaking {}: {}", utterance.generation, utterance.text);
        let id = self.tts.speak(utterance.text.as_str(), false).map_err(|e| {
            error!("Failed to speak: {}", e);
            StoryError::Synthesis(format!("Speak failed: {}", e))
        })?;

        let Some(id) = id else {
            return Err(StoryError::Synthesis(
                "Platform did not return an utterance id".to_string(),
            ));
        };

        let mut pending = self
            .pending
            .lock()
            .map_err(|_| StoryError::Synthesis("Utterance tracking poisoned".to_string()))?;
        if let Some(pos) = pending.ended_early.iter().position(|early| *early == id) {
            pending.ended_early.remove(pos);
            drop(pending);
            self.events.send(SynthEvent::Finished(utterance.generation));
        } else {
            pending.tracked.push((id, utterance.generation));
        }
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<()> {
        debug!("Canceling speech");
        self.tts.stop().map_err(|e| {
            error!("Failed to cancel speech: {}", e);
            StoryError::Synthesis(format!("Cancel failed: {}", e))
        })?;

        // Stopped utterances never report an end; forget them.
        if let Ok(mut pending) = self.pending.lock() {
            pending.tracked.clear();
            pending.ended_early.clear();
        }
        Ok(())
    }
}

impl Drop for NativeSynth {
    fn drop(&mut self) {
        debug!("Shutting down native TTS backend");
        let _ = self.tts.on_utterance_end(None);
    }
}
