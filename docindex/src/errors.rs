use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

use crate::common::RecordId;
use crate::index::CompositeKey;

/// Error kinds for index subsystem operations.
///
/// Kinds are grouped into families: schema errors surface from definition
/// and catalog calls, consistency errors surface from record writes.
///
/// # Examples
///
/// ```rust,ignore
/// use docindex::errors::{IndexError, ErrorKind, IndexResult};
///
/// fn example() -> IndexResult<()> {
///     Err(IndexError::new("Index not found", ErrorKind::IndexNotFound))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Schema errors
    /// Index name is empty or contains a reserved character
    InvalidIndexName,
    /// Field spec string is malformed or names an unsupported modifier
    InvalidFieldName,
    /// A named property does not exist on the class
    FieldNotFound,
    /// An embedded collection property has no element type
    LinkedTypeMissing,
    /// An index was requested without any field
    EmptyFieldList,
    /// Index type is unknown, rejected (PROXY) or misused (multi-field FULLTEXT)
    InvalidIndexType,
    /// An index with the same name already exists
    IndexAlreadyExists,
    /// Index does not exist
    IndexNotFound,
    /// Class does not exist
    ClassNotFound,
    /// Class already exists
    ClassAlreadyExists,
    /// Property already exists on the class
    PropertyAlreadyExists,
    /// Property is still referenced by a live index
    PropertyInUse,

    // Consistency errors
    /// A unique constraint was violated
    UniqueConstraintViolation,

    // Runtime errors
    /// An index was swapped by a rebuild while a query was reading it
    ConcurrencyConflict,
    /// Operation requires a capability the index kind does not have
    IndexTypeMismatch,
    /// A bulk build or rebuild did not complete
    IndexBuildFailed,
    /// Generic indexing error
    IndexingError,
    /// Record reference does not resolve
    RecordNotFound,
    /// Generic validation error
    ValidationError,
    /// The operation is not valid in the current context
    InvalidOperation,
    /// The record store backend failed
    BackendError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl ErrorKind {
    /// Whether this kind belongs to the schema error family.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidIndexName
                | ErrorKind::InvalidFieldName
                | ErrorKind::FieldNotFound
                | ErrorKind::LinkedTypeMissing
                | ErrorKind::EmptyFieldList
                | ErrorKind::InvalidIndexType
                | ErrorKind::IndexAlreadyExists
                | ErrorKind::IndexNotFound
                | ErrorKind::ClassNotFound
                | ErrorKind::ClassAlreadyExists
                | ErrorKind::PropertyAlreadyExists
                | ErrorKind::PropertyInUse
        )
    }

    /// Whether this kind belongs to the consistency error family.
    pub fn is_consistency_error(&self) -> bool {
        matches!(self, ErrorKind::UniqueConstraintViolation)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidIndexName => write!(f, "Invalid index name"),
            ErrorKind::InvalidFieldName => write!(f, "Invalid field name"),
            ErrorKind::FieldNotFound => write!(f, "Field not found"),
            ErrorKind::LinkedTypeMissing => write!(f, "Linked type missing"),
            ErrorKind::EmptyFieldList => write!(f, "Empty field list"),
            ErrorKind::InvalidIndexType => write!(f, "Invalid index type"),
            ErrorKind::IndexAlreadyExists => write!(f, "Index already exists"),
            ErrorKind::IndexNotFound => write!(f, "Index not found"),
            ErrorKind::ClassNotFound => write!(f, "Class not found"),
            ErrorKind::ClassAlreadyExists => write!(f, "Class already exists"),
            ErrorKind::PropertyAlreadyExists => write!(f, "Property already exists"),
            ErrorKind::PropertyInUse => write!(f, "Property in use"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::ConcurrencyConflict => write!(f, "Concurrency conflict"),
            ErrorKind::IndexTypeMismatch => write!(f, "Index type mismatch"),
            ErrorKind::IndexBuildFailed => write!(f, "Index build failed"),
            ErrorKind::IndexingError => write!(f, "Indexing error"),
            ErrorKind::RecordNotFound => write!(f, "Record not found"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Details of a unique-constraint violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateKey {
    /// Name of the index that rejected the key.
    pub index_name: String,
    /// The offending composite key.
    pub key: CompositeKey,
    /// The record already holding the key.
    pub existing: RecordId,
}

impl Display for DuplicateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "key {} in index '{}' is already held by record {}",
            self.key, self.index_name, self.existing
        )
    }
}

/// Error type of the index subsystem.
///
/// `IndexError` carries a message, a kind, an optional cause and, for
/// unique-constraint violations, the conflicting key and record.
///
/// # Examples
///
/// ```rust,ignore
/// use docindex::errors::{IndexError, ErrorKind};
///
/// let cause = IndexError::new("duplicate", ErrorKind::UniqueConstraintViolation);
/// let err = IndexError::new_with_cause("Index build failed", ErrorKind::IndexBuildFailed, cause);
/// ```
#[derive(Clone)]
pub struct IndexError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<IndexError>>,
    duplicate: Option<Box<DuplicateKey>>,
    backtrace: Arc<Backtrace>,
}

impl IndexError {
    /// Creates a new `IndexError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        IndexError {
            message: message.to_string(),
            error_kind,
            cause: None,
            duplicate: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `IndexError` wrapping a cause.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: IndexError) -> Self {
        IndexError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            duplicate: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a unique-constraint violation error for the given conflict.
    pub fn duplicate_key(duplicate: DuplicateKey) -> Self {
        IndexError {
            message: format!("Unique constraint violated: {}", duplicate),
            error_kind: ErrorKind::UniqueConstraintViolation,
            cause: None,
            duplicate: Some(Box::new(duplicate)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&IndexError> {
        self.cause.as_deref()
    }

    /// The conflict behind a unique-constraint violation, searching the cause chain.
    pub fn duplicate(&self) -> Option<&DuplicateKey> {
        match &self.duplicate {
            Some(duplicate) => Some(duplicate),
            None => self.cause.as_ref().and_then(|cause| cause.duplicate()),
        }
    }
}

impl Display for IndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for IndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for IndexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for index subsystem operations.
pub type IndexResult<T> = Result<T, IndexError>;

impl From<regex::Error> for IndexError {
    fn from(err: regex::Error) -> Self {
        IndexError::new(
            &format!("Invalid pattern: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<std::fmt::Error> for IndexError {
    fn from(err: std::fmt::Error) -> Self {
        IndexError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<String> for IndexError {
    fn from(msg: String) -> Self {
        IndexError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for IndexError {
    fn from(msg: &str) -> Self {
        IndexError::new(msg, ErrorKind::InternalError)
    }
}
