use std::fmt;
use std::io;

/// Errors surfaced while constructing a machine. Nothing inside the emulation
/// loop itself returns an error: out-of-range bank selects wrap and unmapped
/// reads yield the open-bus byte.
#[derive(Debug)]
pub enum NesError {
    /// The file does not carry a valid iNES or NSF header.
    InvalidHeader(&'static str),
    /// The header names a mapper this core does not implement.
    UnsupportedMapper(u8),
    /// The file is shorter than its header claims.
    RomTruncated,
    Io(io::Error),
}

impl fmt::Display for NesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NesError::InvalidHeader(msg) => write!(f, "invalid ROM header: {}", msg),
            NesError::UnsupportedMapper(id) => write!(f, "unsupported mapper: {}", id),
            NesError::RomTruncated => write!(f, "ROM image is shorter than its header claims"),
            NesError::Io(err) => write!(f, "i/o error: {}", err),
        }
    }
}

impl std::error::Error for NesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NesError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for NesError {
    fn from(err: io::Error) -> Self {
        NesError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            NesError::UnsupportedMapper(71).to_string(),
            "unsupported mapper: 71"
        );
        assert_eq!(
            NesError::InvalidHeader("bad iNES magic").to_string(),
            "invalid ROM header: bad iNES magic"
        );
        assert_eq!(
            NesError::RomTruncated.to_string(),
            "ROM image is shorter than its header claims"
        );
    }

    #[test]
    fn io_errors_convert_and_chain() {
        let err: NesError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, NesError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
