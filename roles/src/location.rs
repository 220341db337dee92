use std::fmt;

/// Where a call site sits in its source, reported with undefined names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// 1-based.
    pub line: u32,
    /// 1-based, in bytes.
    pub column: u32,
}

impl SourceLocation {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// For call sites that were not built from source text.
    pub const fn synthetic() -> Self {
        Self { line: 0, column: 0 }
    }

    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_synthetic() {
            write!(f, "<synthetic>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}
