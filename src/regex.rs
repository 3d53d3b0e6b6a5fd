use std::collections::BTreeMap;
use std::fmt;
use std::iter::FusedIterator;
use std::rc::Rc;

use log::trace;

use crate::context::{MatchingContext, Span};
use crate::error::Result;
use crate::node::Node;
use crate::options::RegexOptions;
use crate::parser::parse_regex;

/// A compiled pattern plus the options it matches with.
#[derive(Debug, Clone)]
pub struct Regex {
    root: Node,
    options: RegexOptions,
}

/// Subject text split into characters, with the byte offset of every
/// character boundary so matches can hand out `&str` slices.
struct Haystack {
    chars: Vec<char>,
    offsets: Rc<[usize]>,
}

impl Haystack {
    fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let offsets: Rc<[usize]> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        Self { chars, offsets }
    }

    fn len(&self) -> usize {
        self.chars.len()
    }
}

/// One successful match. Positions are character indices into `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch<'t> {
    text: &'t str,
    offsets: Rc<[usize]>,
    start: usize,
    end: usize,
    groups: BTreeMap<usize, Span>,
}

impl<'t> RegexMatch<'t> {
    pub fn text(&self) -> &'t str {
        self.text
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// The matched text.
    pub fn value(&self) -> &'t str {
        self.slice(self.span())
    }

    /// Spans of the groups that took part in the match, by index.
    pub fn groups(&self) -> &BTreeMap<usize, Span> {
        &self.groups
    }

    /// Span of group `index`; 0 is the whole match.
    pub fn group_span(&self, index: usize) -> Option<Span> {
        if index == 0 {
            Some(self.span())
        } else {
            self.groups.get(&index).copied()
        }
    }

    /// Text of group `index`; 0 is the whole match. `None` when the group
    /// did not take part in the match.
    pub fn group(&self, index: usize) -> Option<&'t str> {
        self.group_span(index).map(|span| self.slice(span))
    }

    fn slice(&self, span: Span) -> &'t str {
        &self.text[self.offsets[span.start]..self.offsets[span.end]]
    }
}

impl Regex {
    pub fn new(pattern: &str) -> Result<Regex> {
        Self::with_options(pattern, RegexOptions::empty())
    }

    pub fn with_options(pattern: &str, options: RegexOptions) -> Result<Regex> {
        Ok(Self::from_node(parse_regex(pattern)?, options))
    }

    /// Wraps an operator tree built by the caller.
    pub fn from_node(root: Node, options: RegexOptions) -> Regex {
        Regex { root, options }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn options(&self) -> RegexOptions {
        self.options
    }

    pub fn capture_count(&self) -> usize {
        self.root.count_groups()
    }

    /// Attempts a match starting exactly at character `start`.
    pub fn match_at<'t>(&self, text: &'t str, start: usize) -> Option<RegexMatch<'t>> {
        let haystack = Haystack::new(text);
        self.match_haystack(text, &haystack, start)
    }

    /// The leftmost match in `text`.
    pub fn search<'t>(&self, text: &'t str) -> Option<RegexMatch<'t>> {
        let haystack = Haystack::new(text);
        (0..=haystack.len()).find_map(|start| self.match_haystack(text, &haystack, start))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.search(text).is_some()
    }

    /// Lazily yields the non-overlapping matches in `text`, left to right.
    pub fn matches<'r, 't>(&'r self, text: &'t str) -> Matches<'r, 't> {
        Matches {
            regex: self,
            text,
            haystack: Haystack::new(text),
            position: 0,
        }
    }

    /// Replaces every match with the expansion of `template`.
    ///
    /// `$$` is a literal `$`, `$&` and `$0` the whole match, `$n` (any number
    /// of digits) group `n` or nothing if it did not take part. Any other `$`
    /// is kept as written.
    pub fn replace(&self, text: &str, template: &str) -> String {
        self.replace_with(text, |m| expand_template(template, m))
    }

    /// Replaces every match with whatever `replacer` returns for it.
    pub fn replace_with<F>(&self, text: &str, mut replacer: F) -> String
    where
        F: FnMut(&RegexMatch<'_>) -> String,
    {
        let mut result = String::with_capacity(text.len());
        let mut last = 0;
        let mut last_byte = 0;
        for m in self.matches(text) {
            if m.start < last {
                continue;
            }
            let start_byte = m.offsets[m.start];
            result.push_str(&text[last_byte..start_byte]);
            result.push_str(&replacer(&m));
            last = m.end;
            last_byte = m.offsets[m.end];
        }
        result.push_str(&text[last_byte..]);
        result
    }

    /// The pieces of `text` between matches, including the (possibly empty)
    /// leading and trailing pieces.
    ///
    /// A zero-width match sitting exactly at the end of the previous piece
    /// still produces an empty piece.
    pub fn split<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut parts = Vec::new();
        let mut last = 0;
        let mut last_byte = 0;
        for m in self.matches(text) {
            let zero_width_at_cursor = m.start == m.end && m.start == last;
            if !zero_width_at_cursor && m.start < last {
                continue;
            }
            let start_byte = m.offsets[m.start];
            parts.push(&text[last_byte..start_byte]);
            last = m.end;
            last_byte = m.offsets[m.end];
        }
        parts.push(&text[last_byte..]);
        parts
    }

    fn match_haystack<'t>(&self, text: &'t str, haystack: &Haystack, start: usize) -> Option<RegexMatch<'t>> {
        if start > haystack.len() {
            return None;
        }
        let mut ctx = MatchingContext::new(&haystack.chars, self.options);
        let mut result = self.root.match_at(&mut ctx, start);

        while !result.is_success() {
            let Some(point) = ctx.pop_backtrack() else {
                break;
            };
            trace!("resuming {point:?} for attempt at {start}");
            ctx.restore(&point.snapshot);
            result = self.root.resume(&mut ctx, &point);
        }

        let end = result.position()?;
        Some(RegexMatch {
            text,
            offsets: Rc::clone(&haystack.offsets),
            start: ctx.match_start().unwrap_or(start),
            end,
            groups: ctx.captures().clone(),
        })
    }
}

impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

/// Iterator returned by [`Regex::matches`].
pub struct Matches<'r, 't> {
    regex: &'r Regex,
    text: &'t str,
    haystack: Haystack,
    position: usize,
}

impl<'t> Iterator for Matches<'_, 't> {
    type Item = RegexMatch<'t>;

    fn next(&mut self) -> Option<RegexMatch<'t>> {
        while self.position <= self.haystack.len() {
            match self.regex.match_haystack(self.text, &self.haystack, self.position) {
                Some(m) => {
                    self.position = m.end.max(m.start + 1);
                    return Some(m);
                }
                None => self.position += 1,
            }
        }
        None
    }
}

impl FusedIterator for Matches<'_, '_> {}

fn expand_template(template: &str, m: &RegexMatch<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => out.push('$'),
            Some('$') => out.push('$'),
            Some('&' | '0') => out.push_str(m.value()),
            Some(d) if d.is_ascii_digit() => {
                let mut index = d.to_digit(10).unwrap_or(0) as usize;
                while let Some(next) = chars.peek().and_then(|c| c.to_digit(10)) {
                    index = index.saturating_mul(10).saturating_add(next as usize);
                    chars.next();
                }
                if let Some(group) = m.group(index) {
                    out.push_str(group);
                }
            }
            Some(other) => {
                out.push('$');
                out.push(other);
            }
        }
    }
    out
}
