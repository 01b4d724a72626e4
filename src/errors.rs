//! Error types shared across the storage engine, the statement executor and the REPL.
use std::fmt;

/// Builds a formatted `Error` variant without spelling out `format!` at every call site.
macro_rules! err {
    ($variant:ident, $($arg:tt)*) => {
        $crate::errors::Error::$variant(format!($($arg)*))
    };
}
pub(crate) use err;

/// Every fallible operation in this crate returns one of these variants.
///
/// `Io` and `Corrupt` are the "fatal" tier described by the executor: they indicate the
/// on-disk file or the page cache is no longer in a state the engine can reason about, and
/// the only sane response is to report and stop. `Prepare` and `Execute` are user-recoverable:
/// they are printed to the REPL and the loop continues.
#[derive(Debug)]
pub enum Error {
    /// Failure reading, writing or seeking the database file.
    Io(std::io::Error),
    /// An on-disk invariant was violated (bad page length, cell index out of range, a page
    /// number beyond `TABLE_MAX_PAGES`, flushing a page that was never read in).
    Corrupt(String),
    /// A statement failed to parse (`PrepareResult`'s non-`Success` variants).
    Prepare(String),
    /// A statement parsed but could not be applied to the tree (`ExecuteResult`'s non-`Success`
    /// variants).
    Execute(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Corrupt(msg) => write!(f, "Corrupt database: {msg}"),
            Error::Prepare(msg) => write!(f, "{msg}"),
            Error::Execute(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl Error {
    /// Fatal errors are the ones the CLI converts into a non-zero exit code; `Prepare` and
    /// `Execute` are reported to stdout and the REPL keeps going.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Corrupt(_))
    }
}
