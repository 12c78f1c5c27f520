//! The local input buffer for a conversation.

use crate::error::ChatError;

/// Text being typed, plus the sends that failed.
///
/// Sending clears the buffer straight away. If the write later fails,
/// [`Composer::restore`] brings the text back.
#[derive(Debug, Default, Clone)]
pub struct Composer {
    text: String,
    failed: Vec<String>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Empties the buffer and returns what it held.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    /// Records a failed send and puts its text back.
    ///
    /// Text typed since the send is kept; the failed text goes in front of it.
    /// Returns false for errors that carry no unsent text.
    pub fn restore(&mut self, error: &ChatError) -> bool {
        let Some(unsent) = error.unsent_text() else {
            return false;
        };

        self.failed.push(unsent.to_string());
        self.text = if self.text.is_empty() {
            unsent.to_string()
        } else {
            format!("{}\n{}", unsent, self.text)
        };
        true
    }

    /// Texts whose send failed, oldest first.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn clear_failed(&mut self) {
        self.failed.clear();
    }
}
