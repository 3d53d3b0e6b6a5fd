use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{anychar, char, digit1, none_of},
    combinator::{map, map_res, opt, value},
    error::ErrorKind,
    multi::{many0, many1},
    sequence::{pair, preceded},
    IResult,
};
use std::cell::{Cell, RefCell};

use log::debug;

use crate::error::{Error, Result};
use crate::node::{CharRange, CharacterClass, Node};

struct ParseContext {
    group_counter: Cell<usize>,
    error: RefCell<Option<Error>>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            group_counter: Cell::new(0),
            error: RefCell::new(None),
        }
    }

    fn next_group_number(&self) -> usize {
        let next = self.group_counter.get() + 1;
        self.group_counter.set(next);
        next
    }

    /// Records a semantic error and aborts parsing; `alt` will not try other
    /// branches after a `Failure`.
    fn fail<'a>(&self, input: &'a str, error: Error) -> nom::Err<nom::error::Error<&'a str>> {
        let mut slot = self.error.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
        nom::Err::Failure(nom::error::Error::new(input, ErrorKind::Verify))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    Capturing,
    NonCapturing,
    Atomic,
    Lookahead,
    NegativeLookahead,
    Lookbehind,
    NegativeLookbehind,
}

/// Compiles `input` into an operator tree.
pub fn parse_regex(input: &str) -> Result<Node> {
    let context = ParseContext::new();
    let parsed = regex(input, &context);
    if let Some(error) = context.error.take() {
        return Err(error);
    }
    match parsed {
        Ok(("", result)) => {
            debug!("compiled {input:?} into {result:?}");
            Ok(result)
        }
        Ok((remaining, _)) => Err(Error::UnexpectedInput {
            offset: input.len() - remaining.len(),
            remaining: remaining.to_string(),
        }),
        Err(e) => Err(Error::Syntax(e.to_string())),
    }
}

fn regex<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Node> {
    alternation(input, context)
}

fn alternation<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Node> {
    let (input, first) = sequence(input, context)?;
    let (input, rest) = many0(preceded(char('|'), |i| sequence(i, context)))(input)?;

    Ok((input, rest.into_iter().fold(first, Node::alternation)))
}

fn sequence<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Node> {
    let (input, parts) = many0(|i| quantified(i, context))(input)?;
    Ok((input, Node::sequence(parts)))
}

fn quantified<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Node> {
    let (mut input, mut node) = atom(input, context)?;

    while let Ok((rest, (min, max))) = quantifier(input) {
        node = match Node::repeat(node, min, max) {
            Ok(node) => node,
            Err(e) => return Err(context.fail(input, e)),
        };
        input = rest;
    }

    Ok((input, node))
}

fn quantifier(input: &str) -> IResult<&str, (usize, Option<usize>)> {
    alt((
        value((0, None), char('*')),
        value((1, None), char('+')),
        value((0, Some(1)), char('?')),
        bounds,
    ))(input)
}

fn bounds(input: &str) -> IResult<&str, (usize, Option<usize>)> {
    let (input, _) = char('{')(input)?;
    let (input, min) = number(input)?;
    let (input, max) = opt(preceded(char(','), opt(number)))(input)?;
    let (input, _) = char('}')(input)?;

    let max = match max {
        None => Some(min),
        Some(upper) => upper,
    };
    Ok((input, (min, max)))
}

fn number(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse::<usize>)(input)
}

fn atom<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Node> {
    alt((
        anchor,
        dot,
        char_class,
        escaped,
        |i| grouped(i, context),
        literal_char,
        // A `{` that does not open valid bounds is literal.
        value(Node::Literal('{'), char('{')),
    ))(input)
}

fn anchor(input: &str) -> IResult<&str, Node> {
    alt((
        value(Node::StartAnchor, char('^')),
        value(Node::EndAnchor, char('$')),
    ))(input)
}

fn dot(input: &str) -> IResult<&str, Node> {
    value(Node::Wildcard, char('.'))(input)
}

fn char_class(input: &str) -> IResult<&str, Node> {
    let (input, _) = char('[')(input)?;
    let (input, negated) = opt(char('^'))(input)?;
    let (input, items) = many1(class_item)(input)?;
    let (input, _) = char(']')(input)?;

    let mut class = CharacterClass::default();
    for item in items {
        match item {
            ClassItem::Single(c) => class.singles.push(c),
            ClassItem::Range(start, end) => class.ranges.push(CharRange::new(start, end)),
            ClassItem::Special(node) => class.specials.push(node),
        }
    }

    let node = Node::CharacterClass(class);
    Ok((input, if negated.is_some() { Node::negate(node) } else { node }))
}

enum ClassItem {
    Single(char),
    Range(char, char),
    Special(Node),
}

fn class_item(input: &str) -> IResult<&str, ClassItem> {
    alt((
        map(preceded(char('\\'), anychar), |c| match shorthand(c) {
            Some(node) => ClassItem::Special(node),
            None => ClassItem::Single(control_escape(c).unwrap_or(c)),
        }),
        map(pair(class_char, preceded(char('-'), class_char)), |(start, end)| {
            ClassItem::Range(start, end)
        }),
        map(none_of("]"), ClassItem::Single),
    ))(input)
}

/// A range endpoint: an escaped character or anything but `]` and `\`.
fn class_char(input: &str) -> IResult<&str, char> {
    alt((
        map(preceded(char('\\'), anychar), |c| control_escape(c).unwrap_or(c)),
        none_of("]\\"),
    ))(input)
}

fn shorthand(c: char) -> Option<Node> {
    let node = match c {
        'd' => Node::Digit,
        'w' => Node::WordChar,
        's' => Node::Whitespace,
        'D' => Node::negate(Node::Digit),
        'W' => Node::negate(Node::WordChar),
        'S' => Node::negate(Node::Whitespace),
        _ => return None,
    };
    Some(node)
}

fn control_escape(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        'f' => Some('\u{c}'),
        'v' => Some('\u{b}'),
        '0' => Some('\0'),
        _ => None,
    }
}

fn escaped(input: &str) -> IResult<&str, Node> {
    let (input, _) = char('\\')(input)?;
    let (input, ch) = anychar(input)?;

    let result = match ch {
        'b' => Node::WordBoundary,
        'B' => Node::negate(Node::WordBoundary),
        c @ '1'..='9' => Node::Backreference(c as usize - '0' as usize),
        c => match shorthand(c) {
            Some(node) => node,
            None => Node::Literal(control_escape(c).unwrap_or(c)),
        },
    };

    Ok((input, result))
}

fn group_kind(input: &str) -> IResult<&str, GroupKind> {
    let (input, kind) = opt(preceded(
        char('?'),
        alt((
            value(GroupKind::NonCapturing, char(':')),
            value(GroupKind::Atomic, char('>')),
            value(GroupKind::Lookahead, char('=')),
            value(GroupKind::NegativeLookahead, char('!')),
            value(GroupKind::Lookbehind, tag("<=")),
            value(GroupKind::NegativeLookbehind, tag("<!")),
        )),
    ))(input)?;
    Ok((input, kind.unwrap_or(GroupKind::Capturing)))
}

fn grouped<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Node> {
    let (input, _) = char('(')(input)?;
    let (input, kind) = group_kind(input)?;
    let group_num = (kind == GroupKind::Capturing).then(|| context.next_group_number());
    let body_start = input;
    let (input, inner) = regex(input, context)?;
    let (input, _) = char(')')(input)?;

    let node = match kind {
        GroupKind::Capturing => Node::group(inner, group_num.unwrap_or_default()),
        GroupKind::NonCapturing => inner,
        GroupKind::Atomic => Node::atomic(inner),
        GroupKind::Lookahead => Node::lookahead(inner),
        GroupKind::NegativeLookahead => Node::negate(Node::lookahead(inner)),
        GroupKind::Lookbehind | GroupKind::NegativeLookbehind => {
            let lookbehind = Node::lookbehind(inner).map_err(|e| context.fail(body_start, e))?;
            if kind == GroupKind::NegativeLookbehind {
                Node::negate(lookbehind)
            } else {
                lookbehind
            }
        }
    };
    Ok((input, node))
}

fn literal_char(input: &str) -> IResult<&str, Node> {
    map(none_of("^$.*+?()[]{|\\"), Node::Literal)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_numbers_follow_opening_parens() {
        let node = parse_regex("((a)(?:b)(c))").unwrap();
        let expected = Node::group(
            Node::sequence(vec![
                Node::group(Node::Literal('a'), 2),
                Node::Literal('b'),
                Node::group(Node::Literal('c'), 3),
            ]),
            1,
        );
        assert_eq!(node, expected);
    }

    #[test]
    fn test_alternation_nests_to_the_left() {
        let node = parse_regex("a|b|c").unwrap();
        let expected = Node::alternation(
            Node::alternation(Node::Literal('a'), Node::Literal('b')),
            Node::Literal('c'),
        );
        assert_eq!(node, expected);
    }

    #[test]
    fn test_bounded_quantifiers() {
        assert_eq!(
            parse_regex("a{2,4}").unwrap(),
            Node::repeat(Node::Literal('a'), 2, Some(4)).unwrap()
        );
        assert_eq!(
            parse_regex("a{3}").unwrap(),
            Node::repeat(Node::Literal('a'), 3, Some(3)).unwrap()
        );
        assert_eq!(
            parse_regex("a{3,}").unwrap(),
            Node::repeat(Node::Literal('a'), 3, None).unwrap()
        );
    }

    #[test]
    fn test_reversed_bounds_are_rejected() {
        assert_eq!(
            parse_regex("a{4,2}"),
            Err(Error::InvalidQuantifierBounds { min: 4, max: 2 })
        );
    }

    #[test]
    fn test_brace_without_bounds_is_literal() {
        assert_eq!(
            parse_regex("a{x").unwrap(),
            Node::sequence(vec![Node::Literal('a'), Node::Literal('{'), Node::Literal('x')])
        );
    }

    #[test]
    fn test_lookbehind_length_is_computed() {
        let node = parse_regex("(?<=a\\d{2})").unwrap();
        assert!(matches!(node, Node::PositiveLookbehind { length: 3, .. }));
    }

    #[test]
    fn test_variable_lookbehind_is_rejected() {
        assert!(matches!(
            parse_regex("(?<=a*)b"),
            Err(Error::UnresolvableLookbehind(_))
        ));
        assert!(matches!(
            parse_regex("(?<!ab|cd)"),
            Err(Error::UnresolvableLookbehind(_))
        ));
        assert!(matches!(
            parse_regex("(?<=a?)"),
            Err(Error::UnresolvableLookbehind(_))
        ));
    }

    #[test]
    fn test_negated_forms() {
        assert_eq!(parse_regex("\\D").unwrap(), Node::negate(Node::Digit));
        assert_eq!(
            parse_regex("(?!x)").unwrap(),
            Node::negate(Node::lookahead(Node::Literal('x')))
        );
        assert!(matches!(parse_regex("[^a-c]").unwrap(), Node::Negation(_)));
    }

    #[test]
    fn test_class_items() {
        let Node::CharacterClass(class) = parse_regex("[a-c_\\d\\]]").unwrap() else {
            panic!("expected a character class");
        };
        assert_eq!(class.ranges, vec![CharRange::new('a', 'c')]);
        assert_eq!(class.singles, vec!['_', ']']);
        assert_eq!(class.specials, vec![Node::Digit]);
    }

    #[test]
    fn test_unbalanced_input_is_rejected() {
        assert!(matches!(
            parse_regex("a)"),
            Err(Error::UnexpectedInput { offset: 1, .. })
        ));
        assert!(parse_regex("(a").is_err());
        assert!(parse_regex("[abc").is_err());
    }

    #[test]
    fn test_empty_pattern_and_branches() {
        assert_eq!(parse_regex("").unwrap(), Node::Empty);
        assert_eq!(
            parse_regex("a|").unwrap(),
            Node::alternation(Node::Literal('a'), Node::Empty)
        );
    }
}
