use core::fmt;

/// Error type for bulk compression and decompression operations.
#[derive(Debug, PartialEq, Eq)]
pub enum BulkError {
    /// The compression type bits name a dialect this build does not carry
    /// (RDP6 / RDP6.1).
    UnsupportedCompressionType(u8),
    /// The compressed bit stream is malformed or truncated.
    MalformedStream(&'static str),
    /// A decoded symbol would write past the history buffer.
    HistoryBufferOverflow,
    /// The input is outside the range the compressor accepts.
    InvalidInputLength { length: usize, maximum: usize },
}

impl fmt::Display for BulkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedCompressionType(value) => {
                write!(f, "unsupported compression type: {value:#04x}")
            }
            Self::MalformedStream(detail) => {
                write!(f, "malformed compressed stream: {detail}")
            }
            Self::HistoryBufferOverflow => {
                write!(f, "history buffer overflow")
            }
            Self::InvalidInputLength { length, maximum } => {
                write!(f, "invalid input length {length} (maximum {maximum})")
            }
        }
    }
}

impl std::error::Error for BulkError {}
