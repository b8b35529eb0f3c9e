//! espeak-ng backend
//!
//! Runs one espeak-ng process per utterance and plays through the
//! default audio output (PulseAudio/PipeWire on most Linux systems).
//! A watcher thread waits for the process and reports its exit: success
//! finishes the utterance, a non-zero status fails it, and a process
//! killed by `cancel_all` reports nothing.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)

use crate::speech::catalog::{Rate, VoiceDescriptor, VoiceSource};
use crate::speech::synth::{EventSink, Generation, Synth, SynthEvent, Utterance};
use crate::{Result, StoryError};
use log::{debug, error, warn};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use once_cell::sync::Lazy;
use regex::Regex;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

/// espeak-ng's default speed in words per minute
const NORMAL_WPM: f32 = 175.0;

/// One row of `espeak-ng --voices`:
/// `Pty Language Age/Gender VoiceName File Other Languages`
static VOICE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d+\s+(\S+)\s+\S+\s+(\S+)\s+\S+").expect("voice line pattern is valid")
});

/// espeak-ng backend
pub struct EspeakSynth {
    events: EventSink,

    /// Path to espeak-ng
    espeak_path: String,

    /// Process currently speaking, if any
    current: Arc<Mutex<Option<u32>>>,
}

impl EspeakSynth {
    /// Create a new espeak-ng synthesizer
    ///
    /// Verifies espeak-ng is installed
    pub fn new(events: EventSink) -> Result<Self> {
        debug!("Creating espeak-ng backend");

        let espeak_path = Self::find_espeak()?;
        debug!("Found espeak-ng at: {}", espeak_path);

        Ok(Self {
            events,
            espeak_path,
            current: Arc::new(Mutex::new(None)),
        })
    }

    /// Find espeak-ng executable
    fn find_espeak() -> Result<String> {
        let paths = ["espeak-ng", "/usr/bin/espeak-ng", "/usr/local/bin/espeak-ng"];

        for path in paths {
            if let Ok(status) = Command::new(path)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                if status.success() {
                    return Ok(path.to_string());
                }
            }
        }

        Err(StoryError::Synthesis(
            "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
        ))
    }

    /// Convert a rate multiplier to espeak speed (words per minute)
    fn rate_to_espeak_speed(rate: Rate) -> u16 {
        (NORMAL_WPM * rate.value()).round() as u16
    }

    /// Parse the table printed by `espeak-ng --voices`
    fn parse_voices(listing: &str) -> Vec<VoiceDescriptor> {
        listing
            .lines()
            .filter_map(|line| VOICE_LINE.captures(line))
            .map(|caps| {
                let language = caps[1].to_string();
                let name = caps[2].replace('_', " ");
                VoiceDescriptor::new(language.clone(), name, language)
            })
            .collect()
    }

    /// Kill the process currently speaking, if any
    fn cancel_process(&mut self) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        if let Some(pid) = current.take() {
            debug!("Killing espeak-ng process {}", pid);
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                debug!("Failed to kill espeak-ng process: {}", e);
            }
        }
    }

    /// Wait for the process in the background and report how it ended
    fn watch(&self, mut child: std::process::Child, generation: Generation) -> Result<()> {
        let events = self.events.clone();
        let current = Arc::clone(&self.current);
        let pid = child.id();

        thread::Builder::new()
            .name(format!("espeak-{}", generation.0))
            .spawn(move || {
                let status = child.wait();

                if let Ok(mut current) = current.lock() {
                    if *current == Some(pid) {
                        *current = None;
                    }
                }

                match status {
                    Ok(status) if status.success() => {
                        events.send(SynthEvent::Finished(generation));
                    }
                    Ok(status) if status.signal().is_some() => {
                        debug!("espeak-ng {} stopped by signal", generation);
                    }
                    Ok(status) => events.send(SynthEvent::Failed {
                        generation,
                        reason: format!("espeak-ng exited with {}", status),
                    }),
                    Err(e) => events.send(SynthEvent::Failed {
                        generation,
                        reason: format!("Failed to wait for espeak-ng: {}", e),
                    }),
                }
            })
            .map_err(|e| StoryError::Synthesis(format!("Failed to start watcher: {}", e)))?;

        Ok(())
    }
}

impl VoiceSource for EspeakSynth {
    fn voices(&mut self) -> Result<Vec<VoiceDescriptor>> {
        let output = Command::new(&self.espeak_path)
            .arg("--voices")
            .stderr(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(StoryError::Synthesis(format!(
                "espeak-ng --voices exited with {}",
                output.status
            )));
        }

        let voices = Self::parse_voices(&String::from_utf8_lossy(&output.stdout));
        if voices.is_empty() {
            warn!("espeak-ng reported no voices");
        }
        Ok(voices)
    }
}

impl Synth for EspeakSynth {
    fn name(&self) -> &'static str {
        "espeak-ng"
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<()> {
        // One utterance at a time
        self.cancel_process();

        let speed = Self::rate_to_espeak_speed(utterance.rate);

        let mut cmd = Command::new(&self.espeak_path);
        if let Some(voice) = &utterance.voice {
            cmd.arg("-v").arg(&voice.id);
        }
        cmd.arg("-s").arg(speed.to_string());
        // End of options; the story text may start with a dash
        cmd.arg("--").arg(&utterance.text);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        debug!("Speaking {} at {} wpm: {}", utterance.generation, speed, utterance.text);

        let child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn espeak-ng: {}", e);
            StoryError::Synthesis(format!("Failed to start espeak-ng: {}", e))
        })?;

        if let Ok(mut current) = self.current.lock() {
            *current = Some(child.id());
        }
        self.watch(child, utterance.generation)
    }

    fn cancel_all(&mut self) -> Result<()> {
        debug!("Canceling speech");
        self.cancel_process();
        Ok(())
    }
}

impl Drop for EspeakSynth {
    fn drop(&mut self) {
        debug!("Shutting down espeak-ng backend");
        self.cancel_process();
    }
}
