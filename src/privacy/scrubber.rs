//! Scrubber seam and the built-in regex scrubber

use regex::Regex;
use std::fmt;

/// Pure, total text transform that removes PII
pub trait Scrubber: Send + Sync {
    fn scrub(&self, text: &str) -> String;
}

impl<F> Scrubber for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn scrub(&self, text: &str) -> String {
        self(text)
    }
}

/// Replaces emails, card numbers, IP addresses and phone numbers with
/// placeholder tags. Patterns run in that order.
#[derive(Clone)]
pub struct RegexScrubber {
    rules: Vec<(Regex, &'static str)>,
}

impl RegexScrubber {
    pub fn new() -> Result<Self, regex::Error> {
        let rules = vec![
            (
                Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
                "[EMAIL]",
            ),
            (Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b")?, "[IP]"),
            (Regex::new(r"\b\d(?:[ -]?\d){12,18}\b")?, "[CARD]"),
            (Regex::new(r"\+?\d[\d\s().-]{7,}\d")?, "[PHONE]"),
        ];
        Ok(Self { rules })
    }
}

impl Scrubber for RegexScrubber {
    fn scrub(&self, text: &str) -> String {
        let mut scrubbed = text.to_string();
        for (pattern, tag) in &self.rules {
            scrubbed = pattern.replace_all(&scrubbed, *tag).into_owned();
        }
        scrubbed
    }
}

impl fmt::Debug for RegexScrubber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexScrubber")
            .field("rules", &self.rules.len())
            .finish()
    }
}
