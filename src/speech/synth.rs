//! Speech synthesizer abstraction
//!
//! Provides a unified interface for text-to-speech across platforms.
//! Speaking is asynchronous: `speak` only submits an utterance, and the
//! backend later reports its completion or failure as a [`SynthEvent`]
//! tagged with the utterance's [`Generation`].

use crate::speech::catalog::{Rate, VoiceDescriptor, VoiceSource};
use crate::{Result, StoryError};
use log::{debug, info};
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

/// Tag identifying one speech request
///
/// Strictly increasing per player, so a callback can be matched against
/// the one request still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One unit of text submitted for playback
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub generation: Generation,
    pub text: String,
    /// `None` means the platform default voice
    pub voice: Option<VoiceDescriptor>,
    pub rate: Rate,
}

/// Notifications from the speech platform
#[derive(Debug, Clone, PartialEq)]
pub enum SynthEvent {
    /// The utterance finished playing
    Finished(Generation),
    /// The utterance could not be played
    Failed { generation: Generation, reason: String },
    /// The set of available voices changed
    ///
    /// Neither the native nor the espeak-ng backend raises this today:
    /// the `tts` crate has no voice-change notification and espeak-ng's
    /// voice list is static. The player still refreshes its catalog when
    /// a backend sends it.
    VoicesChanged,
}

/// Where backends deliver their events
///
/// Backends call this from whatever thread the platform uses; the
/// receiving side serialises the events onto the application thread.
#[derive(Clone)]
pub struct EventSink {
    deliver: Arc<dyn Fn(SynthEvent) + Send + Sync>,
}

impl EventSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(SynthEvent) + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Forward events into a channel whose item type wraps `SynthEvent`
    pub fn from_sender<T>(sender: Sender<T>) -> Self
    where
        T: From<SynthEvent> + Send + 'static,
    {
        let sender = Mutex::new(sender);
        Self::new(move |event| {
            let Ok(sender) = sender.lock() else {
                return;
            };
            if sender.send(T::from(event)).is_err() {
                debug!("Speech event dropped: receiver gone");
            }
        })
    }

    pub fn send(&self, event: SynthEvent) {
        (self.deliver)(event);
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventSink")
    }
}

/// Speech synthesizer trait
///
/// All backends implement this to provide text-to-speech. Only the
/// player talks to a synthesizer.
pub trait Synth: VoiceSource + Send {
    /// Short backend name for logs and status output
    fn name(&self) -> &'static str;

    /// Submit an utterance; returns once it is queued, not when spoken
    fn speak(&mut self, utterance: &Utterance) -> Result<()>;

    /// Silence current speech and drop anything queued
    fn cancel_all(&mut self) -> Result<()>;
}

/// Which speech backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Pick the best available backend
    #[default]
    Auto,
    /// Platform TTS through the `tts` crate
    Native,
    /// espeak-ng subprocesses
    Espeak,
    /// No audio
    Silent,
}

impl FromStr for BackendKind {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "native" => Ok(BackendKind::Native),
            "espeak" | "espeak-ng" => Ok(BackendKind::Espeak),
            "silent" | "none" => Ok(BackendKind::Silent),
            other => Err(StoryError::Config(format!("Unknown speech backend '{}'", other))),
        }
    }
}

/// Create a speech synthesizer
///
/// `Auto` selects:
///
/// **Linux:**
/// 1. Speech Dispatcher via the `tts` crate
/// 2. espeak-ng (fallback if Speech Dispatcher is unavailable)
///
/// **macOS / Windows:**
/// - native platform TTS via the `tts` crate
pub fn create_synth(kind: BackendKind, events: EventSink) -> Result<Box<dyn Synth>> {
    use super::backends::native::NativeSynth;
    use super::backends::silent::SilentSynth;

    match kind {
        BackendKind::Native => Ok(Box::new(NativeSynth::new(events)?)),
        BackendKind::Espeak => create_espeak(events),
        BackendKind::Silent => Ok(Box::new(SilentSynth::new(events).auto_complete(true))),
        BackendKind::Auto => {
            let platform = std::env::consts::OS;
            info!("Creating speech synthesizer for platform: {}", platform);

            info!("Trying native TTS backend...");
            let native_err = match NativeSynth::new(events.clone()) {
                Ok(synth) => {
                    info!("✓ Successfully initialized native TTS backend");
                    return Ok(Box::new(synth));
                }
                Err(e) => {
                    info!("✗ Native TTS unavailable: {}", e);
                    e
                }
            };

            if platform != "linux" {
                return Err(StoryError::Synthesis(format!(
                    "Failed to initialize speech backend for platform '{}': {}",
                    platform, native_err
                )));
            }

            info!("Trying espeak-ng backend...");
            match create_espeak(events) {
                Ok(synth) => {
                    info!("✓ Successfully initialized espeak-ng backend");
                    Ok(synth)
                }
                Err(e) => Err(StoryError::Synthesis(format!(
                    "No speech backend available on Linux. Tried:\n\
                     1. Speech Dispatcher (install: sudo apt install speech-dispatcher)\n\
                     2. espeak-ng (install: sudo apt install espeak-ng)\n\
                     Error: {}",
                    e
                ))),
            }
        }
    }
}

#[cfg(unix)]
fn create_espeak(events: EventSink) -> Result<Box<dyn Synth>> {
    Ok(Box::new(super::backends::espeak::EspeakSynth::new(events)?))
}

#[cfg(not(unix))]
fn create_espeak(_events: EventSink) -> Result<Box<dyn Synth>> {
    Err(StoryError::Synthesis(
        "The espeak-ng backend is only available on Unix systems".to_string(),
    ))
}
