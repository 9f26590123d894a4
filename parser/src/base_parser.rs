use crate::{ParsedLog, ParseError};
use std::io::Read;

/// Base trait for event log parsers
/// Uses Box<dyn Read> to be object-safe (dyn compatible)
pub trait Parser: Send + Sync {
    /// Returns the name of this parser (e.g., "bracketed")
    fn name(&self) -> &'static str;

    /// Returns the file extensions this parser supports (e.g., ["txt", "log"])
    fn extensions(&self) -> &'static [&'static str];

    /// Checks if this parser can handle the given data by inspecting a leading sample
    fn can_parse(&self, data: &[u8]) -> bool;

    /// Parse every line from a reader.
    /// Malformed lines are skipped and reported in the result; only read
    /// failures are returned as errors.
    fn parse(&self, reader: Box<dyn Read>) -> Result<ParsedLog, ParseError>;

    /// Whether a file name carries one of the supported extensions
    fn supports_file(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, ext)) => self
                .extensions()
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}
