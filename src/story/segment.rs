//! Paragraph segmentation
//!
//! A story is read aloud one paragraph at a time. Paragraphs are the
//! non-blank lines of the story text, trimmed, in their original order.

use log::debug;
use std::ops::Index;
use std::sync::Arc;

/// Ordered, immutable paragraphs of one story
///
/// Cloning is cheap; clones share the same paragraphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphSequence {
    paragraphs: Arc<[String]>,
}

impl Default for ParagraphSequence {
    fn default() -> Self {
        Self {
            paragraphs: Arc::from(Vec::new()),
        }
    }
}

impl ParagraphSequence {
    /// Sequence with no paragraphs
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Paragraph at `index`, if any
    pub fn get(&self, index: usize) -> Option<&str> {
        self.paragraphs.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paragraphs.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.paragraphs
    }
}

impl Index<usize> for ParagraphSequence {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.paragraphs[index]
    }
}

/// Split story text into paragraphs
///
/// Splits on line breaks (`\r\n` is treated as one), trims every line and
/// drops the ones left empty.
pub fn segment(text: &str) -> ParagraphSequence {
    let paragraphs: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    debug!("Segmented {} chars into {} paragraphs", text.len(), paragraphs.len());

    ParagraphSequence {
        paragraphs: paragraphs.into(),
    }
}
