pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A caller-supplied argument violates a documented precondition
    /// (e.g. a zero-size hash table).
    InvalidArgument,
    /// An allocation could not be satisfied, or a caller-imposed
    /// capacity ceiling was exceeded.
    OutOfMemory,
    /// A short read or short write against the spool file.
    Io,
    /// The spool file's contents do not match the documented wire
    /// format (an oversize dname, a truncated record, ...).
    Format,
    /// The spool's apex or old serial does not match the context that
    /// produced it.
    ZoneMismatch,
    /// An internal invariant of the diff walker was violated.
    Logic,
    SerdeYaml,
    DomainStr,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}", message),
            None => self.kind.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ErrorKind::*;

        match self {
            InvalidArgument => write!(f, "invalid argument"),
            OutOfMemory => write!(f, "out of memory"),
            Io => write!(f, "io error"),
            Format => write!(f, "format error"),
            ZoneMismatch => write!(f, "zone mismatch"),
            Logic => write!(f, "logic error"),
            SerdeYaml => write!(f, "serde yaml error"),
            DomainStr => write!(f, "invalid domain name"),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(value: serde_yaml::Error) -> Self {
        Self {
            kind: ErrorKind::SerdeYaml,
            message: Some(value.to_string()),
        }
    }
}

impl From<domain::base::name::FromStrError> for Error {
    fn from(value: domain::base::name::FromStrError) -> Self {
        Self {
            kind: ErrorKind::DomainStr,
            message: Some(value.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io,
            message: Some(value.to_string()),
        }
    }
}
