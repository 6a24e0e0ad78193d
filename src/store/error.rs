use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    NotFound { entity: &'static str, id: i64 },
    AlreadyExists { entity: &'static str, key: String },
    /// A record points at a parent that does not exist.
    MissingReference { entity: &'static str, id: i64 },
    Invalid(String),
    LimitExceeded(&'static str),
    WalError(String),
}

impl StoreError {
    /// True for failures of the store itself rather than of the data handed to it.
    pub fn is_data_access(&self) -> bool {
        matches!(self, StoreError::WalError(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            StoreError::AlreadyExists { entity, key } => write!(f, "{entity} already exists: {key}"),
            StoreError::MissingReference { entity, id } => {
                write!(f, "referenced {entity} does not exist: {id}")
            }
            StoreError::Invalid(msg) => write!(f, "invalid value: {msg}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
