//! PII boundary between ticket data and the inference service
//!
//! Every free-text field that leaves the process goes through a [`Redactor`],
//! which is the only way to build a [`ScrubbedText`]. Request payloads hold
//! `ScrubbedText` rather than `String`, so unscrubbed text cannot be placed in
//! a request by construction.
//!
//! Model responses are not re-scrubbed: they are derived from already scrubbed
//! input.

mod digest;
mod scrubber;

pub use digest::{MessageDigest, TicketDigest};
pub use scrubber::{RegexScrubber, Scrubber};

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Marker appended to text cut at the length limit
const TRUNCATION_MARKER: char = '…';

/// Text that has passed through a scrubber and the length limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScrubbedText(String);

impl ScrubbedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ScrubbedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scrubs and truncates free text before it is forwarded
#[derive(Clone)]
pub struct Redactor {
    scrubber: Arc<dyn Scrubber>,
    max_chars: usize,
}

impl Redactor {
    pub fn new(scrubber: Arc<dyn Scrubber>, max_chars: usize) -> Self {
        Self { scrubber, max_chars }
    }

    /// Redactor over the built-in regex scrubber
    pub fn with_default_scrubber(max_chars: usize) -> Result<Self, regex::Error> {
        Ok(Self::new(Arc::new(RegexScrubber::new()?), max_chars))
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Scrub the full text, then cut it to `max_chars` characters.
    ///
    /// Scrubbing runs first so a PII token straddling the cut point is still
    /// recognised.
    pub fn redact(&self, text: &str) -> ScrubbedText {
        let scrubbed = self.scrubber.scrub(text);
        if scrubbed.chars().count() <= self.max_chars {
            return ScrubbedText(scrubbed);
        }
        let mut truncated: String = scrubbed.chars().take(self.max_chars).collect();
        truncated.push(TRUNCATION_MARKER);
        ScrubbedText(truncated)
    }
}

impl fmt::Debug for Redactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redactor")
            .field("max_chars", &self.max_chars)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper() -> Redactor {
        Redactor::new(Arc::new(|text: &str| text.to_uppercase()), 5)
    }

    #[test]
    fn test_redact_applies_scrubber() {
        assert_eq!(upper().redact("abc").as_str(), "ABC");
    }

    #[test]
    fn test_redact_truncates_on_char_boundary() {
        let redactor = Redactor::new(Arc::new(|text: &str| text.to_string()), 3);
        assert_eq!(redactor.redact("héllo").as_str(), "hél…");
        assert_eq!(redactor.redact("hé").as_str(), "hé");
    }

    #[test]
    fn test_scrub_before_truncate() {
        let redactor = Redactor::with_default_scrubber(12).unwrap();
        let out = redactor.redact("mail: someone@example.com please");
        assert!(!out.as_str().contains("someone"));
        assert!(out.as_str().starts_with("mail: [EMAIL"));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&upper().redact("hi")).unwrap();
        assert_eq!(json, "\"HI\"");
    }
}
