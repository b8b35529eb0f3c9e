//! Platform-specific speech backends

// Native TTS backend using the tts crate (cross-platform)
pub mod native;

// espeak-ng subprocess backend, fallback on Linux
#[cfg(unix)]
pub mod espeak;

// No audio; records what would have been spoken
pub mod silent;
