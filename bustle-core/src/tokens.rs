//! Identifier detection and substitution outside strings and comments
//!
//! Both operations match whole words only and run on the code segments
//! produced by the [`scanner`](crate::scanner).

use std::collections::{BTreeMap, BTreeSet};

use regex::{Captures, Regex};

use crate::scanner::{collect_code, process_code};

/// Compiled whole-word matcher for a fixed set of tokens
///
/// Tokens are tried longest first, so `FooBar` wins over `Foo` at the same
/// position.
#[derive(Debug, Clone)]
pub struct TokenMatcher {
    regex: Option<Regex>,
}

impl TokenMatcher {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens: Vec<String> = tokens
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        tokens.dedup();

        let regex = if tokens.is_empty() {
            None
        } else {
            let alternation = tokens
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"\b(?:{})\b", alternation)).ok()
        };

        Self { regex }
    }

    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }

    /// Add every token occurring in `segment` to `found`
    pub fn scan_segment(&self, segment: &str, found: &mut BTreeSet<String>) {
        if let Some(re) = &self.regex {
            for m in re.find_iter(segment) {
                found.insert(m.as_str().to_string());
            }
        }
    }

    /// Tokens occurring in the code of `text` (never inside strings or comments)
    pub fn detect(&self, text: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        if self.is_empty() {
            return found;
        }
        collect_code(text, |segment, _| {
            self.scan_segment(segment, &mut found);
            String::new()
        });
        found
    }
}

/// Detect which of `tokens` occur as whole words in the code of `text`
pub fn detect_tokens<I, S>(text: &str, tokens: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    TokenMatcher::new(tokens).detect(text)
}

/// Replace whole-word tokens in a single code segment
pub fn apply_replacements(segment: &str, matcher: &TokenMatcher, replacements: &BTreeMap<String, String>) -> String {
    match &matcher.regex {
        Some(re) => re
            .replace_all(segment, |caps: &Captures| {
                replacements
                    .get(&caps[0])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned(),
        None => segment.to_string(),
    }
}

/// Replace whole-word occurrences of each key with its value, outside strings
/// and comments
///
/// All keys are matched in one pass, so a replacement is never matched again.
pub fn substitute_tokens(text: &str, replacements: &BTreeMap<String, String>) -> String {
    let matcher = TokenMatcher::new(replacements.keys());
    if matcher.is_empty() {
        return text.to_string();
    }
    process_code(text, |segment, _| apply_replacements(segment, &matcher, replacements))
}
