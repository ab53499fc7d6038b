/// Largest object number a PDF file may use (PDF 32000-1, Annex C).
pub const MAX_OBJECT_COUNT: u32 = 8_388_607;

/// Default bound on the number of sections visited along a `/Prev` chain.
pub const MAX_XREF_CHAIN_LENGTH: usize = 65_536;

/// Limits and leniency applied while reading cross reference data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Object numbers at or above this value are rejected.
    pub max_object_count: u32,

    /// Maximum number of sections followed while resolving `/Prev` and `/XRefStm`.
    pub max_xref_chain_length: usize,

    /// Reject malformed 20 byte table entries instead of skipping them.
    pub strict_xref_entries: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_object_count: MAX_OBJECT_COUNT,
            max_xref_chain_length: MAX_XREF_CHAIN_LENGTH,
            strict_xref_entries: true,
        }
    }
}

impl ParseOptions {
    /// Create a builder for ParseOptions
    pub fn builder() -> ParseOptionsBuilder {
        ParseOptionsBuilder::default()
    }
}

/// Builder for ParseOptions
#[derive(Debug, Clone, Default)]
pub struct ParseOptionsBuilder {
    options: ParseOptions,
}

impl ParseOptionsBuilder {
    /// Set the exclusive upper bound for object numbers
    pub fn max_object_count(mut self, value: u32) -> Self {
        self.options.max_object_count = value;
        self
    }

    /// Set the maximum cross reference chain length
    pub fn max_xref_chain_length(mut self, value: usize) -> Self {
        self.options.max_xref_chain_length = value;
        self
    }

    /// Enable or disable rejection of malformed table entries
    pub fn strict_xref_entries(mut self, value: bool) -> Self {
        self.options.strict_xref_entries = value;
        self
    }

    /// Build the ParseOptions
    pub fn build(self) -> ParseOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_starts_from_defaults() {
        let options = ParseOptions::builder().strict_xref_entries(false).build();
        assert_eq!(options.max_object_count, MAX_OBJECT_COUNT);
        assert_eq!(options.max_xref_chain_length, MAX_XREF_CHAIN_LENGTH);
        assert!(!options.strict_xref_entries);
    }
}
