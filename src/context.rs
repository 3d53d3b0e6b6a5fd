use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::node::Node;
use crate::options::RegexOptions;

/// A captured range of character positions, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Outcome of matching (or resuming) one operator at one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// Matched; the payload is the position just past the match.
    Success(usize),
    Failure,
}

impl MatchResult {
    pub fn is_success(self) -> bool {
        matches!(self, MatchResult::Success(_))
    }

    pub fn position(self) -> Option<usize> {
        match self {
            MatchResult::Success(position) => Some(position),
            MatchResult::Failure => None,
        }
    }
}

/// A suspended alternative left behind by `owner` after a successful match.
///
/// `state` is only meaningful to the owner: the alternation's "try the right
/// branch" tag, or the repetition count a quantifier falls back to.
#[derive(Clone)]
pub struct BacktrackPoint<'a> {
    pub owner: &'a Node,
    pub position: usize,
    pub snapshot: Rc<Snapshot<'a>>,
    pub state: usize,
}

impl<'a> BacktrackPoint<'a> {
    pub fn new(owner: &'a Node, position: usize, snapshot: Rc<Snapshot<'a>>, state: usize) -> Self {
        Self {
            owner,
            position,
            snapshot,
            state,
        }
    }
}

impl fmt::Debug for BacktrackPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BacktrackPoint")
            .field("owner", &format_args!("{}", self.owner))
            .field("position", &self.position)
            .field("state", &self.state)
            .field("depth", &self.snapshot.backtrack.len())
            .finish()
    }
}

/// Repetition in progress for one quantifier: how many repetitions were
/// complete when it started, and where it started.
#[derive(Debug, Clone, Copy)]
pub struct LoopFrame<'a> {
    pub node: &'a Node,
    pub count: usize,
    pub start: usize,
}

/// Everything a failed attempt may have changed. Restoring a snapshot puts the
/// context back exactly as it was when the snapshot was taken.
#[derive(Debug, Clone, Default)]
pub struct Snapshot<'a> {
    captures: BTreeMap<usize, Span>,
    group_starts: BTreeMap<usize, usize>,
    loops: Vec<LoopFrame<'a>>,
    backtrack: Vec<BacktrackPoint<'a>>,
}

/// Mutable state of one match attempt at one start offset.
pub struct MatchingContext<'a> {
    text: &'a [char],
    options: RegexOptions,
    state: Snapshot<'a>,
    match_start: Option<usize>,
}

impl<'a> MatchingContext<'a> {
    pub fn new(text: &'a [char], options: RegexOptions) -> Self {
        Self {
            text,
            options,
            state: Snapshot::default(),
            match_start: None,
        }
    }

    pub fn text(&self) -> &'a [char] {
        self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn char_at(&self, position: usize) -> Option<char> {
        self.text.get(position).copied()
    }

    pub fn options(&self) -> RegexOptions {
        self.options
    }

    pub fn ignore_case(&self) -> bool {
        self.options.contains(RegexOptions::IGNORE_CASE)
    }

    pub fn multiline(&self) -> bool {
        self.options.contains(RegexOptions::MULTILINE)
    }

    pub fn singleline(&self) -> bool {
        self.options.contains(RegexOptions::SINGLELINE)
    }

    pub fn culture_sensitive(&self) -> bool {
        self.options.contains(RegexOptions::CULTURE_SENSITIVE)
    }

    pub fn is_newline(&self, c: char) -> bool {
        matches!(c, '\n' | '\r')
    }

    /// Lowercases `c` when ignore-case is on; identity otherwise.
    pub fn fold_case(&self, c: char) -> char {
        if self.ignore_case() {
            fold(c, self.culture_sensitive())
        } else {
            c
        }
    }

    pub fn capture(&self, index: usize) -> Option<Span> {
        self.state.captures.get(&index).copied()
    }

    pub fn set_capture(&mut self, index: usize, start: usize, end: usize) {
        debug_assert!(start <= end && end <= self.text.len(), "capture [{start}, {end}) out of range");
        self.state.captures.insert(index, Span::new(start, end));
    }

    pub fn captures(&self) -> &BTreeMap<usize, Span> {
        &self.state.captures
    }

    pub(crate) fn open_group(&mut self, index: usize, position: usize) {
        self.state.group_starts.insert(index, position);
    }

    pub(crate) fn group_start(&self, index: usize) -> Option<usize> {
        self.state.group_starts.get(&index).copied()
    }

    pub(crate) fn enter_loop(&mut self, node: &'a Node, count: usize, start: usize) {
        let frame = LoopFrame { node, count, start };
        match self.state.loops.iter_mut().find(|f| std::ptr::eq(f.node, node)) {
            Some(existing) => *existing = frame,
            None => self.state.loops.push(frame),
        }
    }

    pub(crate) fn loop_frame(&self, node: &Node) -> Option<LoopFrame<'a>> {
        self.state
            .loops
            .iter()
            .find(|f| std::ptr::eq(f.node, node))
            .copied()
    }

    pub fn snapshot(&self) -> Rc<Snapshot<'a>> {
        Rc::new(self.state.clone())
    }

    pub fn restore(&mut self, snapshot: &Snapshot<'a>) {
        self.state = snapshot.clone();
    }

    pub fn push_backtrack(&mut self, point: BacktrackPoint<'a>) {
        self.state.backtrack.push(point);
    }

    pub fn pop_backtrack(&mut self) -> Option<BacktrackPoint<'a>> {
        self.state.backtrack.pop()
    }

    pub fn backtrack_depth(&self) -> usize {
        self.state.backtrack.len()
    }

    /// Drops every point pushed after the stack was `depth` deep.
    pub fn discard_backtracks_from(&mut self, depth: usize) {
        self.state.backtrack.truncate(depth);
    }

    pub fn match_start(&self) -> Option<usize> {
        self.match_start
    }

    pub fn set_match_start(&mut self, position: usize) {
        self.match_start = Some(position);
    }
}

pub(crate) fn fold(c: char, culture_sensitive: bool) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        (Some(l), Some(_)) if culture_sensitive => l,
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_restore_discards_later_captures() {
        let text = chars("abc");
        let mut ctx = MatchingContext::new(&text, RegexOptions::empty());
        ctx.set_capture(1, 0, 1);
        let snapshot = ctx.snapshot();

        ctx.set_capture(1, 1, 3);
        ctx.set_capture(2, 2, 3);
        ctx.restore(&snapshot);

        assert_eq!(ctx.capture(1), Some(Span::new(0, 1)));
        assert_eq!(ctx.capture(2), None);
    }

    #[test]
    fn test_snapshot_is_independent_of_backtrack_pushes() {
        let text = chars("ab");
        let node = Node::Literal('a');
        let mut ctx = MatchingContext::new(&text, RegexOptions::empty());
        let snapshot = ctx.snapshot();

        ctx.push_backtrack(BacktrackPoint::new(&node, 0, snapshot.clone(), 0));
        ctx.push_backtrack(BacktrackPoint::new(&node, 1, snapshot.clone(), 1));
        assert_eq!(ctx.backtrack_depth(), 2);

        ctx.restore(&snapshot);
        assert_eq!(ctx.backtrack_depth(), 0);
        assert!(ctx.pop_backtrack().is_none());
    }

    #[test]
    fn test_discard_backtracks_from_checkpoint() {
        let text = chars("a");
        let node = Node::Wildcard;
        let mut ctx = MatchingContext::new(&text, RegexOptions::empty());
        let snapshot = ctx.snapshot();
        ctx.push_backtrack(BacktrackPoint::new(&node, 0, snapshot.clone(), 0));
        let checkpoint = ctx.backtrack_depth();
        ctx.push_backtrack(BacktrackPoint::new(&node, 1, snapshot.clone(), 0));
        ctx.push_backtrack(BacktrackPoint::new(&node, 1, snapshot, 0));

        ctx.discard_backtracks_from(checkpoint);

        assert_eq!(ctx.backtrack_depth(), 1);
        assert_eq!(ctx.pop_backtrack().map(|p| p.position), Some(0));
    }

    #[test]
    fn test_fold_case_respects_ignore_case() {
        let text = chars("");
        let plain = MatchingContext::new(&text, RegexOptions::empty());
        assert_eq!(plain.fold_case('A'), 'A');

        let folding = MatchingContext::new(&text, RegexOptions::IGNORE_CASE);
        assert_eq!(folding.fold_case('A'), 'a');
        assert_eq!(folding.fold_case('Ä'), 'ä');
    }

    #[test]
    fn test_culture_sensitive_fold_takes_first_char_of_expansion() {
        // U+0130 lowercases to "i\u{307}".
        assert_eq!(fold('\u{130}', false), '\u{130}');
        assert_eq!(fold('\u{130}', true), 'i');
    }

    #[test]
    fn test_loop_frame_is_replaced_per_node() {
        let text = chars("aaa");
        let node = Node::Literal('a');
        let mut ctx = MatchingContext::new(&text, RegexOptions::empty());
        ctx.enter_loop(&node, 0, 0);
        ctx.enter_loop(&node, 2, 2);

        let frame = ctx.loop_frame(&node).expect("frame recorded");
        assert_eq!((frame.count, frame.start), (2, 2));
    }

    #[test]
    fn test_match_start_marker_survives_restore() {
        let text = chars("abc");
        let mut ctx = MatchingContext::new(&text, RegexOptions::empty());
        assert_eq!(ctx.match_start(), None);

        let snapshot = ctx.snapshot();
        ctx.set_match_start(2);
        ctx.restore(&snapshot);
        assert_eq!(ctx.match_start(), Some(2));
    }
}
