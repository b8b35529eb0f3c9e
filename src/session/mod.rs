//! Story session
//!
//! The session is the central state of the application: the story
//! parameters being edited, the current story, the last error shown to
//! the user, the history of generated stories and the player reading the
//! story aloud.

pub mod config;
pub mod history;
pub mod store;

use crate::speech::{PlaybackState, Player};
use crate::story::{ParagraphSequence, StoryGenerator, StoryRequest};
use crate::{Result, StoryError};
use history::{History, HistoryEntry};
use log::{error, info, warn};

/// Application session
pub struct Session {
    /// Story parameters for the next generation
    pub request: StoryRequest,

    /// Reads the current story aloud
    pub player: Player,

    generator: Option<Box<dyn StoryGenerator>>,

    /// API credential handed to the generator
    credential: Option<String>,

    /// Name of the environment variable the credential comes from
    credential_env: String,

    history: History,

    story: Option<String>,

    /// Main character profile of the current story
    character: Option<String>,

    /// Message to show the user after a failed generation
    last_error: Option<String>,

    /// Non-fatal problem from the last operation, such as an unsaved history
    warning: Option<String>,
}

impl Session {
    pub fn new(request: StoryRequest, player: Player, history: History) -> Self {
        Self {
            request,
            player,
            generator: None,
            credential: None,
            credential_env: crate::story::generator::CREDENTIAL_VAR.to_string(),
            history,
            story: None,
            character: None,
            last_error: None,
            warning: None,
        }
    }

    /// Use `generator` for [`Session::generate`]
    pub fn with_generator(mut self, generator: Box<dyn StoryGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Credential for the generator; `env` names where it came from
    pub fn with_credential(mut self, credential: Option<String>, env: impl Into<String>) -> Self {
        self.credential = credential;
        self.credential_env = env.into();
        self
    }

    /// Generate a story from the current request
    ///
    /// Playback stops and the previous story is dropped first. A missing
    /// credential fails before the generator is contacted. On failure
    /// the user-facing message is kept in [`Session::last_error`].
    pub fn generate(&mut self) -> Result<()> {
        self.last_error = None;
        self.warning = None;
        self.story = None;
        self.character = None;
        self.player.clear_story()?;

        let Some(credential) = self.credential.clone() else {
            let err = StoryError::MissingCredential(self.credential_env.clone());
            self.last_error =
                Some("API key is missing. Please check your environment variables.".to_string());
            warn!("{}", err);
            return Err(err);
        };

        let Some(generator) = self.generator.as_mut() else {
            let err = StoryError::GenerationFailed("no story generator configured".to_string());
            self.last_error = Some(format!("Failed to generate story. Error: {}", err));
            return Err(err);
        };

        info!("Generating {} {} story", self.request.tone, self.request.genre);
        match generator.generate(&self.request, &credential) {
            Ok(generated) => {
                self.character = generated.character;
                self.on_story_ready(&generated.story)
            }
            Err(e) => {
                let reason = match &e {
                    StoryError::GenerationFailed(reason) => reason.clone(),
                    other => other.to_string(),
                };
                error!("Story generation failed: {}", reason);
                self.last_error = Some(format!("Failed to generate story. Error: {}", reason));
                Err(StoryError::GenerationFailed(reason))
            }
        }
    }

    /// Take a freshly generated story
    ///
    /// Stops playback, segments the text, leaves the player idle and
    /// records the story in the history. A history that cannot be saved
    /// leaves a [`Session::warning`]; the story itself stays loaded.
    pub fn on_story_ready(&mut self, text: &str) -> Result<()> {
        self.load(text)?;

        let entry = HistoryEntry::new(text, &self.request).with_character(self.character.clone());
        if let Err(e) = self.history.push(entry) {
            warn!("Story history not saved: {}", e);
            self.warning = Some(format!("Story history could not be saved: {}", e));
        }
        Ok(())
    }

    /// Display a story without recording it, such as one read from a file
    pub fn show_story(&mut self, text: &str) -> Result<()> {
        self.character = None;
        self.load(text)
    }

    /// Reopen the history entry at `index`
    pub fn open_history(&mut self, index: usize) -> Result<()> {
        let entry = self
            .history
            .get(index)
            .cloned()
            .ok_or_else(|| StoryError::Other(format!("No history entry {}", index + 1)))?;
        self.character = entry.character;
        self.load(&entry.story)
    }

    fn load(&mut self, text: &str) -> Result<()> {
        self.player.load_story(text)?;
        self.story = Some(text.to_string());
        self.last_error = None;
        Ok(())
    }

    pub fn story(&self) -> Option<&str> {
        self.story.as_deref()
    }

    pub fn character(&self) -> Option<&str> {
        self.character.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.player.state()
    }

    pub fn playback_cursor(&self) -> usize {
        self.player.cursor()
    }

    pub fn paragraphs(&self) -> &ParagraphSequence {
        self.player.paragraphs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::{KeyValueStore, MemoryStore};
    use crate::speech::{EventSink, SilentSynth, SynthEvent, SynthLogHandle};
    use crate::story::GeneratedStory;
    use std::sync::mpsc;

    struct CannedGenerator {
        result: std::result::Result<GeneratedStory, String>,
    }

    impl StoryGenerator for CannedGenerator {
        fn generate(&mut self, _request: &StoryRequest, _credential: &str) -> Result<GeneratedStory> {
            self.result.clone().map_err(StoryError::GenerationFailed)
        }
    }

    fn canned(result: std::result::Result<&str, &str>) -> Box<CannedGenerator> {
        Box::new(CannedGenerator {
            result: result.map(GeneratedStory::new).map_err(str::to_string),
        })
    }

    /// Store that cannot be written
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(StoryError::Other("disk full".to_string()))
        }
    }

    fn session_with_store(
        generator: Box<dyn StoryGenerator>,
        store: Box<dyn KeyValueStore>,
    ) -> (Session, SynthLogHandle) {
        let (tx, _rx) = mpsc::channel::<SynthEvent>();
        let synth = SilentSynth::new(EventSink::from_sender(tx));
        let log = synth.log();
        let history = History::load(store).unwrap();
        let session = Session::new(StoryRequest::default(), Player::new(Box::new(synth)), history)
            .with_generator(generator)
            .with_credential(Some("key".to_string()), "TEST_KEY");
        (session, log)
    }

    fn session(result: std::result::Result<&str, &str>) -> (Session, SynthLogHandle) {
        session_with_store(canned(result), Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_generate_success() {
        let (mut session, log) = session(Ok("Once.\n\nUpon.\n"));
        session.generate().unwrap();

        assert_eq!(session.story(), Some("Once.\n\nUpon.\n"));
        assert_eq!(session.paragraphs().len(), 2);
        assert_eq!(session.playback_state(), PlaybackState::Idle);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.warning(), None);
        assert!(log.texts().is_empty());
    }

    #[test]
    fn test_missing_credential_short_circuits() {
        let (session, _) = session(Ok("never"));
        let mut session = session.with_credential(None, "TEST_KEY");

        match session.generate() {
            Err(StoryError::MissingCredential(var)) => assert_eq!(var, "TEST_KEY"),
            other => panic!("expected MissingCredential, got {:?}", other),
        }
        assert!(session.last_error().unwrap().contains("API key is missing"));
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_generation_failure_keeps_no_story() {
        let (mut session, log) = session(Ok("First story."));
        session.generate().unwrap();
        session.player.play().unwrap();

        session.generator = Some(canned(Err("quota exceeded")));
        assert!(matches!(session.generate(), Err(StoryError::GenerationFailed(_))));

        assert_eq!(session.story(), None);
        assert!(session.paragraphs().is_empty());
        assert_eq!(session.playback_state(), PlaybackState::Idle);
        assert_eq!(log.cancels(), 1);
        assert_eq!(
            session.last_error(),
            Some("Failed to generate story. Error: quota exceeded")
        );
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_unsaved_history_does_not_fail_generation() {
        let (mut session, _) = session_with_store(canned(Ok("A tale.")), Box::new(ReadOnlyStore));

        session.generate().unwrap();
        assert_eq!(session.story(), Some("A tale."));
        assert_eq!(session.last_error(), None);
        assert!(session.warning().unwrap().contains("disk full"));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_character_profile_kept_and_recorded() {
        let generated = GeneratedStory::new("Mira sailed.")
            .with_character(Some("Mira, 34, stubborn".to_string()));
        let generator = Box::new(CannedGenerator {
            result: Ok(generated),
        });
        let (mut session, _) = session_with_store(generator, Box::new(MemoryStore::new()));

        session.generate().unwrap();
        assert_eq!(session.character(), Some("Mira, 34, stubborn"));
        assert_eq!(
            session.history().get(0).unwrap().character.as_deref(),
            Some("Mira, 34, stubborn")
        );

        session.show_story("From a file.").unwrap();
        assert_eq!(session.character(), None);

        session.open_history(0).unwrap();
        assert_eq!(session.character(), Some("Mira, 34, stubborn"));
    }

    #[test]
    fn test_open_history() {
        let (mut session, _) = session(Ok("Remembered tale."));
        session.generate().unwrap();
        session.show_story("Something else.").unwrap();

        session.open_history(0).unwrap();
        assert_eq!(session.story(), Some("Remembered tale."));
        assert!(session.open_history(5).is_err());
    }
}
