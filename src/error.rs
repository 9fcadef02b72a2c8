use core::fmt;

#[derive(Debug, Clone)]
pub enum WibError {
    InvalidInput(&'static str),
    Unsupported(&'static str),
    /// Destination buffer smaller than the layout requires. No partial write
    /// is guaranteed to be valid.
    Capacity { required: usize, provided: usize },
    /// Malformed table of contents, histogram, or bitstream. Aborts the
    /// affected channel or packet; sibling units stay decodable.
    Format(&'static str),
    /// Huffman model built from zero symbols.
    EmptyModel,
    UnexpectedEof { bit_pos: usize },
}

impl fmt::Display for WibError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WibError::InvalidInput(s) => write!(f, "invalid input: {s}"),
            WibError::Unsupported(s) => write!(f, "unsupported: {s}"),
            WibError::Capacity { required, provided } => {
                write!(f, "destination too small: need {required} bytes, have {provided}")
            }
            WibError::Format(s) => write!(f, "format error: {s}"),
            WibError::EmptyModel => write!(f, "cannot build an entropy model from zero symbols"),
            WibError::UnexpectedEof { bit_pos } => {
                write!(f, "unexpected end of input at bit {bit_pos}")
            }
        }
    }
}

impl std::error::Error for WibError {}
