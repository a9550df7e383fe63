use std::{error, fmt};

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort a conversion. Link resolution problems are not errors; see
/// `LinkWarning`.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Required structure is missing or malformed. `path` locates the element, like
    /// `road[id=7]/planView/geometry[2]`.
    Document { path: String, message: String },
    /// Something asked for a position too far outside a road's reference line.
    GeometryRange { road: i64, s: f64, length: f64 },
    /// A border keeps referencing other borders without ever reaching the reference line.
    CyclicBorder { road: i64, hops: usize },
    /// The input isn't well-formed XML at all.
    Xml(String),
    /// A conversion setting that has to be a positive distance isn't.
    InvalidOption { name: &'static str, value: f64 },
}

impl Error {
    pub fn document<P: Into<String>, M: Into<String>>(path: P, message: M) -> Error {
        Error::Document {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The road this error is scoped to, if any. Errors without a road abort the whole parse.
    pub fn road(&self) -> Option<i64> {
        match self {
            Error::GeometryRange { road, .. } | Error::CyclicBorder { road, .. } => Some(*road),
            Error::Document { .. } | Error::Xml(_) | Error::InvalidOption { .. } => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Document { path, message } => write!(f, "{}: {}", path, message),
            Error::GeometryRange { road, s, length } => write!(
                f,
                "road {}: position s={} is outside the reference line of length {}",
                road, s, length
            ),
            Error::CyclicBorder { road, hops } => write!(
                f,
                "road {}: lane border chain didn't reach the reference line after {} hops",
                road, hops
            ),
            Error::Xml(msg) => write!(f, "bad XML: {}", msg),
            Error::InvalidOption { name, value } => {
                write!(f, "{} must be a positive distance, not {}", name, value)
            }
        }
    }
}

impl error::Error for Error {}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Error {
        Error::Xml(err.to_string())
    }
}
