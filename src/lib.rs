pub mod combinator;
pub mod context;
pub mod error;
pub mod leaf;
pub mod node;
pub mod options;
pub mod parser;
pub mod regex;

pub use context::{BacktrackPoint, MatchResult, MatchingContext, Span};
pub use error::{Error, Result};
pub use node::{CharRange, CharacterClass, Node};
pub use options::RegexOptions;
pub use parser::parse_regex;
pub use regex::{Matches, Regex, RegexMatch};
