//! Story history
//!
//! The ten most recent stories, newest first, persisted as JSON.

use crate::session::store::KeyValueStore;
use crate::story::StoryRequest;
use crate::{Result, StoryError};
use chrono::{DateTime, Local};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Store key the history is saved under
pub const HISTORY_KEY: &str = "storyHistory";

/// Number of stories kept
pub const HISTORY_LIMIT: usize = 10;

/// One generated story and what it was generated from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub story: String,
    pub prompt: String,
    pub genre: String,
    pub tone: String,
    pub theme: String,
    /// Main character profile written alongside the story
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
}

impl HistoryEntry {
    /// Entry for `story`, stamped with the current time
    pub fn new(story: &str, request: &StoryRequest) -> Self {
        Self {
            timestamp: Local::now(),
            story: story.to_string(),
            prompt: request.prompt.clone(),
            genre: request.genre.clone(),
            tone: request.tone.clone(),
            theme: request.theme.clone(),
            character: None,
        }
    }

    pub fn with_character(mut self, character: Option<String>) -> Self {
        self.character = character;
        self
    }

    /// First line of the story, shortened to `max` characters
    pub fn preview(&self, max: usize) -> String {
        let first = self
            .story
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");
        if first.chars().count() <= max {
            first.to_string()
        } else {
            let cut: String = first.chars().take(max).collect();
            format!("{}...", cut.trim_end())
        }
    }
}

/// Bounded newest-first list of stories backed by a store
pub struct History {
    entries: Vec<HistoryEntry>,
    store: Box<dyn KeyValueStore>,
}

impl History {
    /// Load the saved history; a store without one yields an empty history
    pub fn load(store: Box<dyn KeyValueStore>) -> Result<Self> {
        let entries = match store.get(HISTORY_KEY)? {
            Some(json) => {
                let mut entries: Vec<HistoryEntry> = serde_json::from_str(&json)
                    .map_err(|e| StoryError::History(format!("Corrupt history: {}", e)))?;
                if entries.len() > HISTORY_LIMIT {
                    warn!("Saved history has {} entries, keeping {}", entries.len(), HISTORY_LIMIT);
                    entries.truncate(HISTORY_LIMIT);
                }
                entries
            }
            None => Vec::new(),
        };

        debug!("Loaded {} history entries", entries.len());
        Ok(Self { entries, store })
    }

    /// Add a story at the front, evicting the oldest beyond the limit,
    /// and persist the result
    pub fn push(&mut self, entry: HistoryEntry) -> Result<()> {
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_LIMIT);
        self.save()
    }

    fn save(&mut self) -> Result<()> {
        let json = serde_json::to_string(&self.entries)?;
        self.store.set(HISTORY_KEY, &json)
    }

    /// Entries, newest first
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::MemoryStore;

    fn entry(story: &str) -> HistoryEntry {
        HistoryEntry::new(story, &StoryRequest::default())
    }

    #[test]
    fn test_empty_store() {
        let history = History::load(Box::new(MemoryStore::new())).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_newest_first() {
        let mut history = History::load(Box::new(MemoryStore::new())).unwrap();
        history.push(entry("first")).unwrap();
        history.push(entry("second")).unwrap();
        assert_eq!(history.get(0).unwrap().story, "second");
        assert_eq!(history.get(1).unwrap().story, "first");
    }

    #[test]
    fn test_eleventh_entry_evicts_oldest() {
        let mut history = History::load(Box::new(MemoryStore::new())).unwrap();
        for i in 0..10 {
            history.push(entry(&format!("story {}", i))).unwrap();
        }
        assert_eq!(history.len(), 10);
        assert_eq!(history.get(9).unwrap().story, "story 0");

        history.push(entry("story 10")).unwrap();
        assert_eq!(history.len(), 10);
        assert_eq!(history.get(0).unwrap().story, "story 10");
        assert_eq!(history.get(9).unwrap().story, "story 1");
        assert!(history.entries().iter().all(|e| e.story != "story 0"));
    }

    #[test]
    fn test_corrupt_history() {
        let mut store = MemoryStore::new();
        store.set(HISTORY_KEY, "{not json").unwrap();
        assert!(matches!(
            History::load(Box::new(store)),
            Err(StoryError::History(_))
        ));
    }

    #[test]
    fn test_entries_without_character_still_load() {
        let mut store = MemoryStore::new();
        store
            .set(
                HISTORY_KEY,
                r#"[{"timestamp":"2024-05-01T10:00:00+02:00","story":"Old.","prompt":"","genre":"any","tone":"neutral","theme":"modern"}]"#,
            )
            .unwrap();
        let history = History::load(Box::new(store)).unwrap();
        assert_eq!(history.get(0).unwrap().character, None);
    }

    #[test]
    fn test_preview() {
        let e = entry("\n  The dragon slept under the mountain.\nMore.");
        assert_eq!(e.preview(100), "The dragon slept under the mountain.");
        assert_eq!(e.preview(10), "The dragon...");
    }
}
