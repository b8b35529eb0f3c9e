//! Silent backend
//!
//! Produces no audio. Every utterance and cancel is recorded so callers
//! can inspect what would have been spoken. With auto-complete enabled
//! each utterance is reported finished as soon as it is submitted, which
//! lets a story run to the end on machines without any speech engine.

use crate::speech::catalog::{VoiceDescriptor, VoiceSource};
use crate::speech::synth::{EventSink, Synth, SynthEvent, Utterance};
use crate::{Result, StoryError};
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard};

/// What the silent backend has been asked to do
#[derive(Debug, Default)]
pub struct SynthLog {
    pub spoken: Vec<Utterance>,
    pub cancels: usize,
    fail_next: Option<String>,
    fail_next_cancel: Option<String>,
}

/// Shared view of a [`SilentSynth`]'s log, usable after the synth is boxed
#[derive(Debug, Clone, Default)]
pub struct SynthLogHandle(Arc<Mutex<SynthLog>>);

impl SynthLogHandle {
    pub fn lock(&self) -> MutexGuard<'_, SynthLog> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Texts spoken so far, in order
    pub fn texts(&self) -> Vec<String> {
        self.lock().spoken.iter().map(|u| u.text.clone()).collect()
    }

    pub fn last(&self) -> Option<Utterance> {
        self.lock().spoken.last().cloned()
    }

    pub fn cancels(&self) -> usize {
        self.lock().cancels
    }

    /// Make the next `speak` call fail synchronously
    pub fn fail_next_speak(&self, reason: impl Into<String>) {
        self.lock().fail_next = Some(reason.into());
    }

    /// Make the next `cancel_all` call fail
    pub fn fail_next_cancel(&self, reason: impl Into<String>) {
        self.lock().fail_next_cancel = Some(reason.into());
    }
}

/// Backend that speaks nothing
#[derive(Debug)]
pub struct SilentSynth {
    events: EventSink,
    voices: Vec<VoiceDescriptor>,
    log: SynthLogHandle,
    auto_complete: bool,
}

impl SilentSynth {
    pub fn new(events: EventSink) -> Self {
        debug!("Creating silent speech backend");
        Self {
            events,
            voices: Vec::new(),
            log: SynthLogHandle::default(),
            auto_complete: false,
        }
    }

    /// Report each utterance finished immediately after it is submitted
    pub fn auto_complete(mut self, enabled: bool) -> Self {
        self.auto_complete = enabled;
        self
    }

    /// Voices to report from [`VoiceSource::voices`]
    pub fn with_voices(mut self, voices: Vec<VoiceDescriptor>) -> Self {
        self.voices = voices;
        self
    }

    pub fn log(&self) -> SynthLogHandle {
        self.log.clone()
    }
}

impl VoiceSource for SilentSynth {
    fn voices(&mut self) -> Result<Vec<VoiceDescriptor>> {
        Ok(self.voices.clone())
    }
}

impl Synth for SilentSynth {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<()> {
        {
            let mut log = self.log.lock();
            if let Some(reason) = log.fail_next.take() {
                return Err(StoryError::Synthesis(reason));
            }
            debug!("Silently speaking {}: {}", utterance.generation, utterance.text);
            log.spoken.push(utterance.clone());
        }

        if self.auto_complete {
            self.events.send(SynthEvent::Finished(utterance.generation));
        }
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<()> {
        debug!("Canceling silent speech");
        let mut log = self.log.lock();
        if let Some(reason) = log.fail_next_cancel.take() {
            return Err(StoryError::Synthesis(reason));
        }
        log.cancels += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::catalog::Rate;
    use crate::speech::synth::Generation;
    use std::sync::mpsc;

    fn utterance(n: u64, text: &str) -> Utterance {
        Utterance {
            generation: Generation(n),
            text: text.to_string(),
            voice: None,
            rate: Rate::NORMAL,
        }
    }

    #[test]
    fn test_records_utterances() {
        let (tx, rx) = mpsc::channel::<SynthEvent>();
        let mut synth = SilentSynth::new(EventSink::from_sender(tx));
        let log = synth.log();

        synth.speak(&utterance(1, "hello")).unwrap();
        synth.cancel_all().unwrap();

        assert_eq!(log.texts(), vec!["hello"]);
        assert_eq!(log.cancels(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_auto_complete() {
        let (tx, rx) = mpsc::channel::<SynthEvent>();
        let mut synth = SilentSynth::new(EventSink::from_sender(tx)).auto_complete(true);
        synth.speak(&utterance(3, "hello")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), SynthEvent::Finished(Generation(3)));
    }

    #[test]
    fn test_fail_next() {
        let (tx, _rx) = mpsc::channel::<SynthEvent>();
        let mut synth = SilentSynth::new(EventSink::from_sender(tx));
        synth.log().fail_next_speak("device busy");
        assert!(synth.speak(&utterance(1, "a")).is_err());
        assert!(synth.speak(&utterance(2, "b")).is_ok());
        assert_eq!(synth.log().texts(), vec!["b"]);
    }
}
