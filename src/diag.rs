//! Source locations and fatal diagnostics.
//!
//! The front end has no error recovery: the first diagnostic produced by
//! the lexer, parser, or resolver travels up as an `Err(Diag)` and ends the
//! compilation. The driver prints it as `file:line:col: message` and exits
//! non-zero.

use crate::intern::{Interner, Symbol};

/// A position in a source file. Line and column are 1-based. Never mutated
/// after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLoc {
    pub file: Symbol,
    pub line: u32,
    pub col: u32,
}

impl SourceLoc {
    pub fn new(file: Symbol, line: u32, col: u32) -> Self {
        SourceLoc { file, line, col }
    }
}

/// A fatal diagnostic, already rendered against the interner so it can be
/// displayed without further context.
#[derive(Debug, Clone)]
pub struct Diag {
    pub loc: SourceLoc,
    text: String,
}

impl Diag {
    pub fn at(interner: &Interner, loc: SourceLoc, message: impl AsRef<str>) -> Self {
        let text = format!(
            "{}:{}:{}: {}",
            interner.resolve(loc.file),
            loc.line,
            loc.col,
            message.as_ref()
        );
        Diag { loc, text }
    }

    /// A diagnostic with no useful source position (driver-level failures).
    pub fn bare(message: impl Into<String>) -> Self {
        Diag {
            loc: SourceLoc::default(),
            text: message.into(),
        }
    }
}

impl std::fmt::Display for Diag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl std::error::Error for Diag {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_file_line_col_prefix() {
        let mut interner = Interner::new();
        let file = interner.intern("demo.ada");
        let loc = SourceLoc::new(file, 12, 3);
        let diag = Diag::at(&interner, loc, "undefined identifier 'foo'");
        assert_eq!(diag.to_string(), "demo.ada:12:3: undefined identifier 'foo'");
    }

    #[test]
    fn keeps_location_for_inspection() {
        let mut interner = Interner::new();
        let file = interner.intern("p.adb");
        let diag = Diag::at(&interner, SourceLoc::new(file, 4, 9), "bad digit");
        assert_eq!(diag.loc.line, 4);
        assert_eq!(diag.loc.col, 9);
    }

    #[test]
    fn bare_diag_has_no_prefix() {
        let diag = Diag::bare("cannot open file");
        assert_eq!(diag.to_string(), "cannot open file");
    }
}
