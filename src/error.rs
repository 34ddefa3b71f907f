use std::fmt;
use std::io;
use std::path::PathBuf;

pub type VermiglioResult<T> = Result<T, Error>;

/// Errors that can occur during vermiglio usage
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred when reading a theme file or a manifest
    Io(io::Error),

    /// JSON parsing failed when loading a theme or a manifest.
    Json(serde_json::Error),

    /// A theme condition string could not be parsed.
    /// `position` is the byte offset of the offending substring.
    #[allow(missing_docs)]
    InvalidThemeCondition { value: String, position: usize },

    /// An inline option in a code fence could not be parsed.
    /// `position` is the byte offset of the fragment within the fence text.
    #[allow(missing_docs)]
    InvalidOption { fragment: String, position: usize },

    /// A theme was requested that the catalog does not know about, or whose
    /// file does not exist on disk. Fatal for the whole document pass.
    #[allow(missing_docs)]
    ThemeNotFound {
        identifier: String,
        path: Option<PathBuf>,
    },

    /// A canonical class name did not have the `mtk<N>` / modifier-marker
    /// shape. This indicates an internal inconsistency, not bad user input.
    InvalidClassName(String),

    /// The grammar engine failed while tokenizing a line.
    Tokenize(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Json(err) => write!(f, "JSON parsing error: {}", err),
            Error::InvalidThemeCondition { value, position } => {
                write!(
                    f,
                    "invalid theme condition '{}' at offset {}",
                    value, position
                )
            }
            Error::InvalidOption { fragment, position } => {
                write!(f, "invalid option '{}' at offset {}", fragment, position)
            }
            Error::ThemeNotFound { identifier, path } => match path {
                Some(path) => write!(
                    f,
                    "theme '{}' not found: expected file at {}",
                    identifier,
                    path.display()
                ),
                None => write!(f, "theme '{}' not found", identifier),
            },
            Error::InvalidClassName(name) => {
                write!(f, "invalid canonical class name '{}'", name)
            }
            Error::Tokenize(message) => write!(f, "tokenization error: {}", message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::InvalidThemeCondition { .. }
            | Error::InvalidOption { .. }
            | Error::ThemeNotFound { .. }
            | Error::InvalidClassName(_)
            | Error::Tokenize(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
