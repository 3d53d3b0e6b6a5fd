use bitflags::bitflags;

bitflags! {
    /// Global mode flags consulted by the leaf operators.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegexOptions: u8 {
        /// Compare literals and character classes case-insensitively.
        const IGNORE_CASE = 0b0001;
        /// `^` and `$` also match next to line terminators.
        const MULTILINE = 0b0010;
        /// `.` also matches line terminators.
        const SINGLELINE = 0b0100;
        /// Use the full Unicode lowercase mapping when folding case.
        const CULTURE_SENSITIVE = 0b1000;
    }
}
