//! Paragraph-by-paragraph story playback
//!
//! The player owns the speech synthesizer and walks a paragraph
//! sequence, speaking one paragraph at a time. The next paragraph is only
//! requested once the platform reports the previous one finished, so at
//! most one utterance is ever outstanding.
//!
//! Every utterance carries a fresh [`Generation`]. Completion and error
//! events are matched against the generation still outstanding; events
//! for utterances that were cancelled or superseded are ignored.

use crate::speech::catalog::VoiceCatalog;
use crate::speech::synth::{Generation, Synth, SynthEvent, Utterance};
use crate::story::{segment, ParagraphSequence};
use crate::Result;
use log::{debug, error, info};
use std::fmt;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// What a speech event did to the player
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackUpdate {
    /// Event belonged to a cancelled or superseded utterance
    Ignored,
    /// Moved on to the paragraph at this index
    Advanced(usize),
    /// Last paragraph done; back to idle
    Finished,
    /// Utterance failed; playback abandoned
    Failed(String),
    /// Voice list re-read from the platform
    VoicesRefreshed,
}

/// Sequential story player
pub struct Player {
    synth: Box<dyn Synth>,
    catalog: VoiceCatalog,
    paragraphs: ParagraphSequence,
    /// Index of the paragraph being (or next to be) spoken
    cursor: usize,
    state: PlaybackState,
    last_generation: u64,
    /// Utterance currently submitted to the synthesizer
    outstanding: Option<Generation>,
}

impl Player {
    /// Create a player that speaks through `synth`
    pub fn new(synth: Box<dyn Synth>) -> Self {
        info!("Player using {} speech backend", synth.name());
        Self {
            synth,
            catalog: VoiceCatalog::new(),
            paragraphs: ParagraphSequence::empty(),
            cursor: 0,
            state: PlaybackState::Idle,
            last_generation: 0,
            outstanding: None,
        }
    }

    // ========== Story ==========

    /// Replace the story being read
    ///
    /// Playback is stopped before the new text is segmented, so nothing
    /// from the old story can be spoken against the new paragraphs.
    pub fn load_story(&mut self, text: &str) -> Result<()> {
        let stopped = self.stop();
        self.paragraphs = segment(text);
        info!("Loaded story with {} paragraphs", self.paragraphs.len());
        stopped
    }

    /// Drop the current story
    pub fn clear_story(&mut self) -> Result<()> {
        self.load_story("")
    }

    pub fn paragraphs(&self) -> &ParagraphSequence {
        &self.paragraphs
    }

    // ========== Transport ==========

    /// Start reading from the first paragraph
    ///
    /// Does nothing when there are no paragraphs.
    pub fn play_from_start(&mut self) -> Result<()> {
        if self.paragraphs.is_empty() {
            debug!("Nothing to play");
            return Ok(());
        }
        self.cancel_outstanding()?;
        self.cursor = 0;
        self.speak_current()
    }

    /// Continue from the paused paragraph
    ///
    /// From idle this starts at the beginning; while playing it does
    /// nothing. The paused paragraph is read again from its start.
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Paused => {
                debug!("Resuming at paragraph {}", self.cursor);
                self.speak_current()
            }
            PlaybackState::Idle => self.play_from_start(),
            PlaybackState::Playing => Ok(()),
        }
    }

    /// Resume when paused, otherwise start from the beginning
    pub fn play(&mut self) -> Result<()> {
        if self.state == PlaybackState::Paused {
            self.resume()
        } else {
            self.play_from_start()
        }
    }

    /// Silence the current paragraph and keep the position
    pub fn pause(&mut self) -> Result<()> {
        if self.state != PlaybackState::Playing {
            return Ok(());
        }
        debug!("Pausing at paragraph {}", self.cursor);
        self.state = PlaybackState::Paused;
        self.cancel_outstanding()
    }

    /// Silence speech and rewind to the first paragraph
    pub fn stop(&mut self) -> Result<()> {
        if self.state != PlaybackState::Idle {
            debug!("Stopping playback");
        }
        self.state = PlaybackState::Idle;
        self.cursor = 0;
        self.cancel_outstanding()
    }

    /// Stop when playing, otherwise play
    pub fn toggle(&mut self) -> Result<()> {
        if self.state == PlaybackState::Playing {
            self.stop()
        } else {
            self.play()
        }
    }

    // ========== Speech events ==========

    /// Apply an event reported by the speech platform
    pub fn handle_event(&mut self, event: SynthEvent) -> Result<PlaybackUpdate> {
        match event {
            SynthEvent::VoicesChanged => {
                self.refresh_voices()?;
                Ok(PlaybackUpdate::VoicesRefreshed)
            }
            SynthEvent::Finished(generation) => {
                if self.outstanding != Some(generation) {
                    debug!("Ignoring stale completion {}", generation);
                    return Ok(PlaybackUpdate::Ignored);
                }
                self.outstanding = None;
                self.cursor += 1;

                if self.cursor < self.paragraphs.len() && self.state == PlaybackState::Playing {
                    self.speak_current()?;
                    Ok(PlaybackUpdate::Advanced(self.cursor))
                } else {
                    debug!("Reached end of story");
                    self.state = PlaybackState::Idle;
                    self.cursor = 0;
                    Ok(PlaybackUpdate::Finished)
                }
            }
            SynthEvent::Failed { generation, reason } => {
                if self.outstanding != Some(generation) {
                    debug!("Ignoring stale failure {}: {}", generation, reason);
                    return Ok(PlaybackUpdate::Ignored);
                }
                error!("Speech synthesis error: {}", reason);
                self.outstanding = None;
                self.state = PlaybackState::Idle;
                self.cursor = 0;
                Ok(PlaybackUpdate::Failed(reason))
            }
        }
    }

    // ========== Voices ==========

    /// Re-read the platform's voices into the catalog
    pub fn refresh_voices(&mut self) -> Result<()> {
        self.catalog.refresh(self.synth.as_mut())
    }

    pub fn catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    /// Voice and rate changes apply from the next paragraph on
    pub fn catalog_mut(&mut self) -> &mut VoiceCatalog {
        &mut self.catalog
    }

    // ========== Status ==========

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Paragraph to highlight: the one being read or paused on
    pub fn current_paragraph(&self) -> Option<(usize, &str)> {
        match self.state {
            PlaybackState::Idle => None,
            _ => self.paragraphs.get(self.cursor).map(|p| (self.cursor, p)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.synth.name()
    }

    // ========== Internals ==========

    /// Submit the paragraph at the cursor with the current voice and rate
    fn speak_current(&mut self) -> Result<()> {
        let Some(text) = self.paragraphs.get(self.cursor) else {
            self.state = PlaybackState::Idle;
            self.cursor = 0;
            return Ok(());
        };

        self.last_generation += 1;
        let generation = Generation(self.last_generation);
        let config = self.catalog.config();
        let utterance = Utterance {
            generation,
            text: text.to_string(),
            voice: config.voice.voice().cloned(),
            rate: config.rate,
        };

        debug!("Paragraph {} as utterance {}", self.cursor, generation);
        match self.synth.speak(&utterance) {
            Ok(()) => {
                self.outstanding = Some(generation);
                self.state = PlaybackState::Playing;
                Ok(())
            }
            Err(e) => {
                error!("Speech synthesis error: {}", e);
                self.outstanding = None;
                self.state = PlaybackState::Idle;
                self.cursor = 0;
                Err(e)
            }
        }
    }

    /// Cancel the outstanding utterance, if there is one
    ///
    /// A failed cancel abandons playback: the player goes idle at the
    /// first paragraph and any later event for the utterance is ignored.
    fn cancel_outstanding(&mut self) -> Result<()> {
        let Some(generation) = self.outstanding.take() else {
            return Ok(());
        };
        debug!("Canceling utterance {}", generation);
        if let Err(e) = self.synth.cancel_all() {
            error!("Failed to cancel utterance {}: {}", generation, e);
            self.state = PlaybackState::Idle;
            self.cursor = 0;
            return Err(e);
        }
        Ok(())
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let _ = self.cancel_outstanding();
    }
}
