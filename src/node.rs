use std::fmt;

use crate::error::{Error, Result};

/// A node of a compiled pattern: one match operator.
///
/// Trees are immutable once built. Capturing groups carry the index assigned
/// by the compiler in order of their opening parenthesis, starting at 1.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Empty,
    Literal(char),
    Wildcard,
    Digit,
    WordChar,
    Whitespace,
    CharacterClass(CharacterClass),
    StartAnchor,
    EndAnchor,
    WordBoundary,
    Backreference(usize),
    Sequence(Vec<Node>),
    Alternation(Box<Node>, Box<Node>),
    Quantifier {
        child: Box<Node>,
        min: usize,
        max: Option<usize>,
    },
    Group {
        child: Box<Node>,
        index: usize,
    },
    AtomicGroup(Box<Node>),
    PositiveLookahead(Box<Node>),
    PositiveLookbehind {
        child: Box<Node>,
        length: usize,
    },
    Negation(Box<Node>),
}

/// An inclusive character range inside a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRange {
    pub start: char,
    pub end: char,
}

impl CharRange {
    pub fn new(start: char, end: char) -> Self {
        if start > end {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn contains(&self, c: char) -> bool {
        self.start <= c && c <= self.end
    }
}

/// `[...]`: single characters, ranges and nested special classes such as `\d`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CharacterClass {
    pub ranges: Vec<CharRange>,
    pub singles: Vec<char>,
    pub specials: Vec<Node>,
}

impl Node {
    pub fn sequence(children: Vec<Node>) -> Node {
        match children.len() {
            0 => Node::Empty,
            1 => children.into_iter().next().unwrap_or(Node::Empty),
            _ => Node::Sequence(children),
        }
    }

    pub fn alternation(left: Node, right: Node) -> Node {
        Node::Alternation(Box::new(left), Box::new(right))
    }

    pub fn star(child: Node) -> Node {
        Node::Quantifier {
            child: Box::new(child),
            min: 0,
            max: None,
        }
    }

    pub fn plus(child: Node) -> Node {
        Node::Quantifier {
            child: Box::new(child),
            min: 1,
            max: None,
        }
    }

    pub fn optional(child: Node) -> Node {
        Node::Quantifier {
            child: Box::new(child),
            min: 0,
            max: Some(1),
        }
    }

    /// `{min,max}`; `max` of `None` is unbounded.
    pub fn repeat(child: Node, min: usize, max: Option<usize>) -> Result<Node> {
        if let Some(max) = max {
            if max < min {
                return Err(Error::InvalidQuantifierBounds { min, max });
            }
        }
        Ok(Node::Quantifier {
            child: Box::new(child),
            min,
            max,
        })
    }

    pub fn group(child: Node, index: usize) -> Node {
        Node::Group {
            child: Box::new(child),
            index,
        }
    }

    pub fn atomic(child: Node) -> Node {
        Node::AtomicGroup(Box::new(child))
    }

    pub fn lookahead(child: Node) -> Node {
        Node::PositiveLookahead(Box::new(child))
    }

    /// Builds a lookbehind, rejecting bodies whose width is not static.
    pub fn lookbehind(child: Node) -> Result<Node> {
        match child.fixed_length() {
            Some(length) => Ok(Node::PositiveLookbehind {
                child: Box::new(child),
                length,
            }),
            None => Err(Error::UnresolvableLookbehind(child.to_string())),
        }
    }

    pub fn negate(child: Node) -> Node {
        Node::Negation(Box::new(child))
    }

    /// True for operators that can succeed without consuming input.
    pub fn is_zero_width(&self) -> bool {
        match self {
            Node::Empty
            | Node::StartAnchor
            | Node::EndAnchor
            | Node::WordBoundary
            | Node::PositiveLookahead(_)
            | Node::PositiveLookbehind { .. } => true,
            Node::Negation(child) => child.is_zero_width(),
            _ => false,
        }
    }

    /// The number of characters every match of this node consumes, if that
    /// number is the same for all matches.
    ///
    /// Alternations are never fixed, even when every branch has the same
    /// width, and neither are backreferences or quantifiers with `min != max`.
    pub fn fixed_length(&self) -> Option<usize> {
        match self {
            Node::Literal(_)
            | Node::Wildcard
            | Node::Digit
            | Node::WordChar
            | Node::Whitespace
            | Node::CharacterClass(_) => Some(1),
            Node::Empty
            | Node::StartAnchor
            | Node::EndAnchor
            | Node::WordBoundary
            | Node::PositiveLookahead(_)
            | Node::PositiveLookbehind { .. } => Some(0),
            Node::Negation(child) => Some(if child.is_zero_width() { 0 } else { 1 }),
            Node::Sequence(children) => children
                .iter()
                .try_fold(0usize, |total, child| total.checked_add(child.fixed_length()?)),
            Node::Group { child, .. } | Node::AtomicGroup(child) => child.fixed_length(),
            Node::Quantifier { child, min, max } if *max == Some(*min) => {
                child.fixed_length()?.checked_mul(*min)
            }
            Node::Quantifier { .. } | Node::Alternation(..) | Node::Backreference(_) => None,
        }
    }

    /// True if `target` is this node or sits anywhere below it.
    pub fn owns(&self, target: &Node) -> bool {
        if std::ptr::eq(self, target) {
            return true;
        }
        match self {
            Node::Sequence(children) => children.iter().any(|c| c.owns(target)),
            Node::Alternation(left, right) => left.owns(target) || right.owns(target),
            Node::Quantifier { child, .. }
            | Node::Group { child, .. }
            | Node::AtomicGroup(child)
            | Node::PositiveLookahead(child)
            | Node::PositiveLookbehind { child, .. }
            | Node::Negation(child) => child.owns(target),
            _ => false,
        }
    }

    /// Highest capture-group index used in the tree.
    pub fn count_groups(&self) -> usize {
        match self {
            Node::Group { child, index } => (*index).max(child.count_groups()),
            Node::Sequence(children) => children.iter().map(|c| c.count_groups()).max().unwrap_or(0),
            Node::Alternation(left, right) => left.count_groups().max(right.count_groups()),
            Node::Quantifier { child, .. }
            | Node::AtomicGroup(child)
            | Node::PositiveLookahead(child)
            | Node::PositiveLookbehind { child, .. }
            | Node::Negation(child) => child.count_groups(),
            _ => 0,
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    match c {
        '\n' => f.write_str("\\n"),
        '\r' => f.write_str("\\r"),
        '\t' => f.write_str("\\t"),
        '^' | '$' | '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '|' | '\\' => {
            write!(f, "\\{c}")
        }
        _ => write!(f, "{c}"),
    }
}

fn write_atom(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
    match node {
        Node::Sequence(_) | Node::Alternation(..) | Node::Quantifier { .. } => write!(f, "(?:{node})"),
        _ => write!(f, "{node}"),
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.singles {
            match c {
                ']' | '\\' | '^' | '-' => write!(f, "\\{c}")?,
                _ => write_literal(f, *c)?,
            }
        }
        for range in &self.ranges {
            write!(f, "{}-{}", range.start, range.end)?;
        }
        for special in &self.specials {
            write!(f, "{special}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Empty => Ok(()),
            Node::Literal(c) => write_literal(f, *c),
            Node::Wildcard => f.write_str("."),
            Node::Digit => f.write_str("\\d"),
            Node::WordChar => f.write_str("\\w"),
            Node::Whitespace => f.write_str("\\s"),
            Node::CharacterClass(class) => write!(f, "[{class}]"),
            Node::StartAnchor => f.write_str("^"),
            Node::EndAnchor => f.write_str("$"),
            Node::WordBoundary => f.write_str("\\b"),
            Node::Backreference(index) => write!(f, "\\{index}"),
            Node::Sequence(children) => {
                for child in children {
                    match child {
                        Node::Alternation(..) => write!(f, "(?:{child})")?,
                        _ => write!(f, "{child}")?,
                    }
                }
                Ok(())
            }
            Node::Alternation(left, right) => write!(f, "{left}|{right}"),
            Node::Quantifier { child, min, max } => {
                write_atom(f, child)?;
                match (min, max) {
                    (0, None) => f.write_str("*"),
                    (1, None) => f.write_str("+"),
                    (0, Some(1)) => f.write_str("?"),
                    (min, None) => write!(f, "{{{min},}}"),
                    (min, Some(max)) if min == max => write!(f, "{{{min}}}"),
                    (min, Some(max)) => write!(f, "{{{min},{max}}}"),
                }
            }
            Node::Group { child, .. } => write!(f, "({child})"),
            Node::AtomicGroup(child) => write!(f, "(?>{child})"),
            Node::PositiveLookahead(child) => write!(f, "(?={child})"),
            Node::PositiveLookbehind { child, .. } => write!(f, "(?<={child})"),
            Node::Negation(child) => match child.as_ref() {
                Node::Digit => f.write_str("\\D"),
                Node::WordChar => f.write_str("\\W"),
                Node::Whitespace => f.write_str("\\S"),
                Node::WordBoundary => f.write_str("\\B"),
                Node::CharacterClass(class) => write!(f, "[^{class}]"),
                Node::PositiveLookahead(inner) => write!(f, "(?!{inner})"),
                Node::PositiveLookbehind { child: inner, .. } => write!(f, "(?<!{inner})"),
                other if other.is_zero_width() => write!(f, "(?!{other})"),
                other => write!(f, "(?!{other})."),
            },
        }
    }
}
