//! Cloze span recognition and locator assignment
//!
//! Spans are written inline in document text:
//!
//! ```text
//! The capital of France is {{Paris}}.
//! The capital of Japan is {{[jp-capital]Tokyo}}.
//! Say it aloud: {{bonjour}}@[bon-ZHOOR].
//! ```
//!
//! A span is `{{...}}` on a single line, with an optional bracketed
//! explicit id immediately after the opening braces and an optional
//! `@[...]` text-to-speech annotation immediately after the closing
//! braces. Anything that does not match the grammar is left alone as
//! plain text; there is no parse error.

use log::debug;
use regex::Regex;

/// A recognized cloze span, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClozeSpan {
    /// Stable identity used as the review-schedule key: the explicit
    /// `[id]` when present, otherwise `auto-<n>`
    pub locator: String,
    /// The text to be occluded
    pub content: String,
    /// Optional text-to-speech payload from the `@[...]` annotation
    pub audio_text: Option<String>,
}

/// Recognizes cloze spans and assigns locators.
///
/// Owns its compiled pattern; one parser can serve any number of parse
/// passes. Each pass starts its auto-id counter at zero and keeps no
/// other state, so repeated calls on unchanged text are reproducible.
///
/// Known limitation: `auto-<n>` ids number the *unlabeled* spans in
/// encounter order, so inserting or removing an unlabeled span shifts
/// every later auto id and silently re-targets their review history.
/// Give spans explicit ids when their history matters across edits.
pub struct ClozeParser {
    pattern: Regex,
}

impl Default for ClozeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ClozeParser {
    pub fn new() -> Self {
        // {{[id]content}}@[audio], id and audio optional; content may not
        // span lines or contain braces
        let pattern = Regex::new(
            r"\{\{(?:\[([^\[\]{}\r\n]+)\])?([^{}\r\n]+?)\}\}(?:@\[([^\[\]\r\n]+)\])?",
        )
        .expect("cloze pattern should compile");
        Self { pattern }
    }

    /// Scan `text` and return its cloze spans in document order.
    ///
    /// The auto-id counter is local to this call: it resets to zero at
    /// the start of every pass and advances only on spans without an
    /// explicit id.
    pub fn parse(&self, text: &str) -> Vec<ClozeSpan> {
        let mut spans = Vec::new();
        let mut auto_counter = 0usize;

        for captures in self.pattern.captures_iter(text) {
            let locator = match captures.get(1) {
                Some(id) => id.as_str().to_string(),
                None => {
                    let locator = format!("auto-{}", auto_counter);
                    auto_counter += 1;
                    locator
                }
            };

            if spans.iter().any(|s: &ClozeSpan| s.locator == locator) {
                debug!("duplicate cloze locator '{}', later span shadows earlier", locator);
            }

            spans.push(ClozeSpan {
                locator,
                content: captures[2].to_string(),
                audio_text: captures.get(3).map(|m| m.as_str().to_string()),
            });
        }

        spans
    }
}
