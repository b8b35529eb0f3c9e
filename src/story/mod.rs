//! Story requests, segmentation and generation

pub mod generator;
pub mod segment;

pub use generator::{CommandGenerator, GeneratedStory, StoryGenerator};
pub use segment::{segment, ParagraphSequence};

use crate::StoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested story length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl StoryLength {
    /// Approximate number of words the generator is asked for
    pub fn word_count(self) -> u32 {
        match self {
            StoryLength::Short => 250,
            StoryLength::Medium => 500,
            StoryLength::Long => 1000,
        }
    }
}

impl FromStr for StoryLength {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(StoryLength::Short),
            "medium" => Ok(StoryLength::Medium),
            "long" => Ok(StoryLength::Long),
            other => Err(StoryError::Config(format!(
                "Unknown story length '{}' (expected short, medium or long)",
                other
            ))),
        }
    }
}

impl fmt::Display for StoryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoryLength::Short => "short",
            StoryLength::Medium => "medium",
            StoryLength::Long => "long",
        };
        f.write_str(name)
    }
}

/// Everything the user filled in for one story
///
/// Sent to the generator as-is; turning it into prompt text is the
/// generator's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRequest {
    pub prompt: String,
    pub genre: String,
    pub tone: String,
    pub theme: String,
    pub length: StoryLength,
    pub keywords: String,
}

impl Default for StoryRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            genre: "any".to_string(),
            tone: "neutral".to_string(),
            theme: "modern".to_string(),
            length: StoryLength::default(),
            keywords: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_parse() {
        assert_eq!("short".parse::<StoryLength>().unwrap(), StoryLength::Short);
        assert_eq!(" Long ".parse::<StoryLength>().unwrap(), StoryLength::Long);
        assert!("epic".parse::<StoryLength>().is_err());
    }

    #[test]
    fn test_word_counts() {
        assert_eq!(StoryLength::Short.word_count(), 250);
        assert_eq!(StoryLength::Medium.word_count(), 500);
        assert_eq!(StoryLength::Long.word_count(), 1000);
    }

    #[test]
    fn test_request_json_shape() {
        let request = StoryRequest {
            prompt: "a lighthouse keeper".to_string(),
            length: StoryLength::Long,
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["length"], "long");
        assert_eq!(json["genre"], "any");
        assert_eq!(json["prompt"], "a lighthouse keeper");
    }
}
