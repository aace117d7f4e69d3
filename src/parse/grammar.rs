//! The annotation grammar shared by the extractor and the line rewriter.
//!
//! An annotation head is a comment introducer followed by a tag keyword:
//!
//! ```text
//! // TODO(high)*: refactor the parser
//! ^^ ^^^^                                head (introducer + tag)
//!        ^^^^^^                          priority
//!              ^                         pin marker
//!               ^^                       separator
//!                 ^^^^^^^^^^^^^^^^^^^    free text
//! ```
//!
//! Both readers and writers go through [`AnnotationGrammar`] so the two never
//! disagree about where the priority or pin marker sits.

use std::ops::Range;

use regex::{Captures, Regex};

use crate::model::config::resolve_tags;
use crate::model::task::Priority;

/// Comment introducers, as regex fragments. `<!--` must come before `--`.
const INTRODUCERS: [&str; 8] = [r"<!--", r"//", r"/\*\*?", r"--", r"#", r";", r"%", r"\*"];

/// Length of the longest introducer, `<!--`.
const MAX_INTRODUCER_LEN: usize = 4;

/// Block comment closers stripped from the end of free text.
pub const CLOSERS: [&str; 2] = ["*/", "-->"];

pub const PIN_MARKER: char = '*';

/// Introducer, preceded by start-of-line or a non-word character.
fn introducer_fragment() -> String {
    format!(r"(?:^|[^\w])(?P<intro>{})\s*", INTRODUCERS.join("|"))
}

/// Alternation of tag keywords. A trailing word boundary is only added for
/// tags ending in a word character, otherwise `\b` could never match.
fn tag_fragment<S: AsRef<str>>(tags: &[S]) -> String {
    let alternatives: Vec<String> = tags
        .iter()
        .map(|t| {
            let t = t.as_ref();
            let escaped = regex::escape(t);
            if t.chars().last().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                format!(r"{}\b", escaped)
            } else {
                escaped
            }
        })
        .collect();
    format!("(?P<tag>{})", alternatives.join("|"))
}

fn priority_fragment() -> String {
    let words: Vec<&str> = Priority::ALL.iter().map(|p| p.as_str()).collect();
    format!(r"(?P<priority>\s*\(\s*(?P<level>{})\s*\))?", words.join("|"))
}

/// The modifiers that may follow a tag, as located in the text after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifiers {
    /// Span of the parenthesized priority, including leading whitespace
    pub priority: Option<Range<usize>>,
    /// Lowercased priority token
    pub level: Option<Priority>,
    /// Span of the pin marker, including leading whitespace
    pub pin: Option<Range<usize>>,
    /// Offset where the modifiers end
    pub end: usize,
}

/// A located annotation head within a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    /// Start of the whole match (may include the preceding character)
    pub start: usize,
    /// Byte offset of the comment introducer
    pub intro: usize,
    /// Span of the tag keyword
    pub tag: Range<usize>,
}

/// Compiled grammar for one tag configuration.
#[derive(Debug, Clone)]
pub struct AnnotationGrammar {
    tags: Vec<String>,
    head: Regex,
    /// A whole string that is exactly one introducer
    introducer: Regex,
    modifiers: Regex,
}

impl AnnotationGrammar {
    /// Build the grammar for the given tags. Empty or blank tag lists fall
    /// back to the default set.
    pub fn new(tags: &[String]) -> Self {
        let tags = resolve_tags(Some(tags));
        let head = build_regex(&format!("(?i){}{}", introducer_fragment(), tag_fragment(&tags)));
        let introducer = build_regex(&format!("^(?:{})$", INTRODUCERS.join("|")));
        let modifiers = build_regex(&format!(r"(?i)^{}(?P<pin>\s*\*)?", priority_fragment()));
        AnnotationGrammar {
            tags,
            head,
            introducer,
            modifiers,
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// All annotation heads on a line, left to right, non-overlapping.
    pub fn heads(&self, line: &str) -> Vec<Head> {
        self.head
            .captures_iter(line)
            .filter_map(|caps| self.head_from(line, &caps))
            .collect()
    }

    /// The leftmost annotation head on a line.
    pub fn first_head(&self, line: &str) -> Option<Head> {
        let caps = self.head.captures(line)?;
        self.head_from(line, &caps)
    }

    /// Characters just before the matched introducer may form a longer
    /// introducer with it (`x/* TODO`: `/` then `*`). The longest one wins.
    fn head_from(&self, line: &str, caps: &Captures<'_>) -> Option<Head> {
        let whole = caps.get(0)?;
        let intro = caps.name("intro")?;
        let tag = caps.name("tag")?;
        let intro_start = (1..=MAX_INTRODUCER_LEN - 1)
            .rev()
            .filter_map(|back| intro.start().checked_sub(back))
            .find(|&start| {
                line.get(start..intro.end())
                    .is_some_and(|candidate| self.introducer.is_match(candidate))
            })
            .unwrap_or(intro.start());
        Some(Head {
            start: whole.start().min(intro_start),
            intro: intro_start,
            tag: tag.range(),
        })
    }

    /// Annotation heads whose tag equals `tag` (case-insensitive).
    pub fn heads_for_tag(&self, line: &str, tag: &str) -> Vec<Head> {
        self.heads(line)
            .into_iter()
            .filter(|h| line[h.tag.clone()].eq_ignore_ascii_case(tag))
            .collect()
    }

    /// Decompose the text directly after a tag into priority and pin marker.
    ///
    /// A `*` immediately followed by `/` closes a block comment and is never
    /// taken as a pin marker.
    pub fn modifiers(&self, rest: &str) -> Modifiers {
        let Some(caps) = self.modifiers.captures(rest) else {
            return Modifiers {
                priority: None,
                level: None,
                pin: None,
                end: 0,
            };
        };
        let priority = caps.name("priority").map(|m| m.range());
        let level = caps.name("level").and_then(|m| m.as_str().parse().ok());
        let mut pin = caps.name("pin").map(|m| m.range());
        if let Some(span) = &pin
            && rest[span.end..].starts_with('/')
        {
            pin = None;
        }
        let end = pin
            .as_ref()
            .or(priority.as_ref())
            .map_or(0, |span| span.end);
        Modifiers {
            priority,
            level,
            pin,
            end,
        }
    }
}

/// Length of the separator (optional colon and/or whitespace) at the start
/// of `rest`.
pub fn separator_len(rest: &str) -> usize {
    let after_ws = rest.trim_start();
    let after_colon = after_ws.strip_prefix(':').unwrap_or(after_ws);
    rest.len() - after_colon.trim_start().len()
}

/// Trim free text and strip trailing block/HTML comment closers until none
/// remain.
pub fn clean_text(raw: &str) -> &str {
    let mut text = raw.trim();
    while let Some(stripped) = CLOSERS.iter().find_map(|c| text.strip_suffix(c)) {
        text = stripped.trim();
    }
    text
}

fn build_regex(pattern: &str) -> Regex {
    // Every piece is either a fixed fragment or regex-escaped.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid annotation grammar {pattern:?}: {e}"))
}
