//! Story generation boundary
//!
//! Generation is delegated to an external program. The program receives
//! the story request as JSON on stdin and answers with `{"story": "..."}`
//! on stdout. The answer may also carry a `"character"` profile of the
//! main character. The API credential travels in the environment.

use crate::story::StoryRequest;
use crate::{Result, StoryError};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};

/// Environment variable the generator process reads its credential from
pub const CREDENTIAL_VAR: &str = "STORYTELLER_API_KEY";

/// Something that turns a story request into story text
pub trait StoryGenerator {
    /// Produce a story for `request`
    ///
    /// Any failure is reported as [`StoryError::GenerationFailed`].
    fn generate(&mut self, request: &StoryRequest, credential: &str) -> Result<GeneratedStory>;
}

/// What a generator produced
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedStory {
    pub story: String,
    /// Profile of the main character, when the generator wrote one
    pub character: Option<String>,
}

impl GeneratedStory {
    /// A story without a character profile
    pub fn new(story: impl Into<String>) -> Self {
        Self {
            story: story.into(),
            character: None,
        }
    }

    /// Attach a character profile; blank profiles are dropped
    pub fn with_character(mut self, character: Option<String>) -> Self {
        self.character = character
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }
}

/// Input sent to the generator process
#[derive(Debug, Serialize)]
struct GeneratorInput<'a> {
    #[serde(flatten)]
    request: &'a StoryRequest,
    word_count: u32,
}

/// Output read back from the generator process
#[derive(Debug, Deserialize)]
struct GeneratorOutput {
    story: String,
    #[serde(default)]
    character: Option<String>,
}

/// Generator backed by an external command
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a command line such as `python3 ~/bin/gen.py`
    ///
    /// Arguments are split on whitespace; no shell quoting is applied.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    fn run(&self, request: &StoryRequest, credential: &str) -> Result<GeneratedStory> {
        let input = GeneratorInput {
            request,
            word_count: request.length.word_count(),
        };
        let input_json = serde_json::to_string(&input)?;

        debug!("Running generator: {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(CREDENTIAL_VAR, credential)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("could not start '{}': {}", self.program, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input_json.as_bytes())?;
            stdin.write_all(b"\n")?;
        }

        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.trim();
            if reason.is_empty() {
                return Err(format!("generator exited with {}", output.status).into());
            }
            return Err(reason.to_string().into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let result: GeneratorOutput = serde_json::from_str(stdout.trim())
            .map_err(|e| format!("unreadable generator output: {}", e))?;

        if result.story.trim().is_empty() {
            return Err("generator returned an empty story".into());
        }

        debug!("Generator returned {} chars", result.story.len());
        Ok(GeneratedStory::new(result.story).with_character(result.character))
    }
}

impl StoryGenerator for CommandGenerator {
    fn generate(&mut self, request: &StoryRequest, credential: &str) -> Result<GeneratedStory> {
        self.run(request, credential).map_err(|e| {
            error!("Generator failed: {}", e);
            match e {
                StoryError::GenerationFailed(_) => e,
                StoryError::Other(msg) => StoryError::GenerationFailed(msg),
                other => StoryError::GenerationFailed(other.to_string()),
            }
        })
    }
}
