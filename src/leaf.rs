use crate::context::{MatchResult, MatchingContext};
use crate::node::{CharacterClass, Node};

pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Consumes one character at `position` if `accept` holds for it.
fn single(ctx: &MatchingContext<'_>, position: usize, accept: impl FnOnce(char) -> bool) -> MatchResult {
    match ctx.char_at(position) {
        Some(c) if accept(c) => MatchResult::Success(position + 1),
        _ => MatchResult::Failure,
    }
}

fn zero_width(holds: bool, position: usize) -> MatchResult {
    if holds {
        MatchResult::Success(position)
    } else {
        MatchResult::Failure
    }
}

impl CharacterClass {
    fn matches(&self, ctx: &MatchingContext<'_>, position: usize, c: char) -> bool {
        if self.singles.contains(&c) || self.ranges.iter().any(|r| r.contains(c)) {
            return true;
        }
        if ctx.ignore_case() {
            let folded = ctx.fold_case(c);
            let hit = self.singles.iter().any(|&s| ctx.fold_case(s) == folded)
                || self.ranges.iter().any(|r| {
                    let (start, end) = (ctx.fold_case(r.start), ctx.fold_case(r.end));
                    start <= folded && folded <= end
                });
            if hit {
                return true;
            }
        }
        self.specials
            .iter()
            .any(|special| special_matches(special, ctx, position))
    }
}

/// Class specials are shorthand leaves or negated leaves (`\D` inside `[...]`),
/// so they are tested against the context without being able to change it.
fn special_matches(special: &Node, ctx: &MatchingContext<'_>, position: usize) -> bool {
    match special {
        Node::Negation(inner) => ctx.char_at(position).is_some() && !special_matches(inner, ctx, position),
        leaf => leaf.match_leaf(ctx, position).is_success(),
    }
}

impl Node {
    /// Matches a single-position operator. Leaves never push backtrack points
    /// and never touch captures.
    pub(crate) fn match_leaf(&self, ctx: &MatchingContext<'_>, position: usize) -> MatchResult {
        match self {
            Node::Empty => MatchResult::Success(position),
            Node::Literal(expected) => {
                let expected = ctx.fold_case(*expected);
                single(ctx, position, |c| ctx.fold_case(c) == expected)
            }
            Node::Wildcard => single(ctx, position, |c| ctx.singleline() || !ctx.is_newline(c)),
            Node::Digit => single(ctx, position, |c| c.is_ascii_digit()),
            Node::WordChar => single(ctx, position, is_word_char),
            Node::Whitespace => single(ctx, position, char::is_whitespace),
            Node::CharacterClass(class) => match ctx.char_at(position) {
                Some(c) if class.matches(ctx, position, c) => MatchResult::Success(position + 1),
                _ => MatchResult::Failure,
            },
            Node::StartAnchor => zero_width(
                position == 0
                    || (ctx.multiline()
                        && position
                            .checked_sub(1)
                            .and_then(|p| ctx.char_at(p))
                            .is_some_and(|c| ctx.is_newline(c))),
                position,
            ),
            Node::EndAnchor => zero_width(
                position == ctx.len()
                    || (ctx.multiline() && ctx.char_at(position).is_some_and(|c| ctx.is_newline(c))),
                position,
            ),
            Node::WordBoundary => {
                let before = position
                    .checked_sub(1)
                    .and_then(|p| ctx.char_at(p))
                    .is_some_and(is_word_char);
                let after = ctx.char_at(position).is_some_and(is_word_char);
                zero_width(before != after, position)
            }
            Node::Backreference(index) => match_backreference(ctx, *index, position),
            _ => MatchResult::Failure,
        }
    }
}

/// An unset group matches the empty string.
fn match_backreference(ctx: &MatchingContext<'_>, index: usize, position: usize) -> MatchResult {
    let Some(span) = ctx.capture(index) else {
        return MatchResult::Success(position);
    };
    let end = position + span.len();
    if end > ctx.len() {
        return MatchResult::Failure;
    }
    let text = ctx.text();
    let same = text[span.start..span.end]
        .iter()
        .zip(&text[position..end])
        .all(|(&a, &b)| ctx.fold_case(a) == ctx.fold_case(b));
    if same {
        MatchResult::Success(end)
    } else {
        MatchResult::Failure
    }
}
