//! Text input rules
//!
//! An input rule watches the text just before the cursor. When typed text
//! completes a match, the rule's handler rewrites the match inside a
//! transaction that already contains the typed text, e.g. turning `--` into
//! an em dash or `**bold**` into bold text.

use crate::core::{EditorError, Result};
use quill_model::{Doc, Mark, Transaction};
use regex::Regex;
use std::fmt;
use std::rc::Rc;

/// Characters before the cursor that rules are matched against
pub const MAX_MATCH: usize = 500;

/// Capture group of a match, in document positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGroup {
    pub text: String,
    pub from: usize,
    pub to: usize,
}

/// A completed match, in positions of the document after the typed text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRuleMatch {
    pub text: String,
    pub from: usize,
    pub to: usize,
    /// Capture groups; index 0 is the first explicit group
    pub groups: Vec<Option<MatchGroup>>,
}

impl InputRuleMatch {
    pub fn group(&self, index: usize) -> Option<&MatchGroup> {
        self.groups.get(index).and_then(Option::as_ref)
    }
}

/// Rewrites a match; returns `false` to let later rules try
pub type InputRuleHandler = Rc<dyn Fn(&mut Transaction, &InputRuleMatch) -> Result<bool>>;

#[derive(Clone)]
pub struct InputRule {
    pattern: Regex,
    handler: InputRuleHandler,
}

impl InputRule {
    /// Rule matching `pattern` at the end of the text before the cursor
    pub fn new<F>(pattern: &str, handler: F) -> Result<Self>
    where
        F: Fn(&mut Transaction, &InputRuleMatch) -> Result<bool> + 'static,
    {
        let pattern = Regex::new(&format!("(?:{pattern})$"))
            .map_err(|err| EditorError::config(format!("invalid input rule pattern: {err}")))?;
        Ok(Self {
            pattern,
            handler: Rc::new(handler),
        })
    }

    /// Replace the whole match with fixed text
    pub fn text(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        let replacement = replacement.into();
        Self::new(pattern, move |tr, found| {
            tr.insert_text_at(&replacement, found.from, found.to)?;
            Ok(true)
        })
    }

    /// Apply a mark to the first capture group and drop the rest of the match
    pub fn mark(pattern: &str, mark: impl Into<String>) -> Result<Self> {
        let mark = mark.into();
        Self::new(pattern, move |tr, found| {
            let Some(group) = found.group(0) else {
                return Ok(false);
            };
            let length = group.to - group.from;
            tr.delete(group.to, found.to)?
                .delete(found.from, group.from)?
                .add_mark(found.from, found.from + length, Mark::new(mark.as_str()))?;
            Ok(true)
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Match against the text before `from` followed by `typed`
    ///
    /// Positions in the result refer to the document once `typed` replaced
    /// `from..to`.
    pub fn find(&self, doc: &Doc, from: usize, typed: &str) -> Result<Option<InputRuleMatch>> {
        let start = from.saturating_sub(MAX_MATCH);
        let mut window = doc.text_between(start, from)?;
        window.push_str(typed);

        let Some(captures) = self.pattern.captures(&window) else {
            return Ok(None);
        };
        let Some(whole) = captures.get(0) else {
            return Ok(None);
        };

        let position = |byte: usize| start + window[..byte].chars().count();
        let groups = captures
            .iter()
            .skip(1)
            .map(|group| {
                group.map(|group| MatchGroup {
                    text: group.as_str().to_string(),
                    from: position(group.start()),
                    to: position(group.end()),
                })
            })
            .collect();

        Ok(Some(InputRuleMatch {
            text: whole.as_str().to_string(),
            from: position(whole.start()),
            to: position(whole.end()),
            groups,
        }))
    }

    /// Try the rule; on a match the typed text and the rewrite are added to `tr`
    pub fn apply(&self, tr: &mut Transaction, from: usize, to: usize, typed: &str) -> Result<bool> {
        let Some(found) = self.find(tr.doc(), from, typed)? else {
            return Ok(false);
        };
        tr.insert_text_at(typed, from, to)?;
        (self.handler)(tr, &found)
    }
}

impl fmt::Debug for InputRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRule")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}
