//! Speech synthesis system

pub mod backends;
pub mod catalog;
pub mod player;
pub mod synth;

pub use backends::silent::{SilentSynth, SynthLogHandle};
pub use catalog::{PlaybackConfig, Rate, VoiceCatalog, VoiceDescriptor, VoiceSelection, VoiceSource};
pub use player::{PlaybackState, PlaybackUpdate, Player};
pub use synth::{create_synth, BackendKind, EventSink, Generation, Synth, SynthEvent, Utterance};
