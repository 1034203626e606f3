//! Error types for persistent object operations.
//!
//! Every public operation returns [`Result`]. Driver-level failures arrive as
//! [`DriverError`](crate::DriverError) and are translated into
//! [`Error::QueryExecution`] at the session's query choke point, so no raw driver
//! error ever reaches the caller.

use crate::value::Value;

/// Result alias used throughout the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a relation lookup did not produce the requested related object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationLookup {
    /// The source class declares no relation to the requested class.
    Undeclared,
    /// The relation exists but no related row matched.
    NoRelatedObject,
    /// A single related object was required but several matched.
    Ambiguous(usize),
}

impl std::fmt::Display for RelationLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationLookup::Undeclared => f.write_str("no relation is declared"),
            RelationLookup::NoRelatedObject => f.write_str("no related object was found"),
            RelationLookup::Ambiguous(n) => write!(f, "{n} related objects matched, expected one"),
        }
    }
}

/// Errors produced by the persistent object runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The class has no definition in the definition source.
    #[error("no persistent object definition found for class '{class}': {reason}")]
    DefinitionNotFound { class: String, reason: String },

    /// A definition violates the metadata invariants.
    #[error("invalid definition for class '{class}': {reason}")]
    InvalidDefinition { class: String, reason: String },

    /// No row matched the requested id.
    #[error("no object of class '{class}' with id {id} is available")]
    ObjectNotFound { class: String, id: Value },

    /// `save` was called on an object that is already persistent.
    #[error("object of class '{class}' is already persistent")]
    ObjectAlreadyPersistent { class: String },

    /// An operation requiring a persistent object received a transient one.
    #[error("object of class '{class}' is not persistent")]
    ObjectNotPersistent { class: String },

    /// The relation between two classes could not serve the request.
    #[error("relation from '{class}' to '{related_class}' not found: {detail}")]
    RelationNotFound {
        class: String,
        related_class: String,
        detail: RelationLookup,
    },

    /// The relation side is not allowed to perform the operation.
    #[error("relation operation '{operation}' from '{class}' to '{related_class}' is not supported: {reason}")]
    RelationOperationNotSupported {
        class: String,
        related_class: String,
        operation: &'static str,
        reason: String,
    },

    /// The database rejected a statement. Carries the offending SQL.
    #[error("query failed: {message} (code {code}, query: {sql})")]
    QueryExecution {
        message: String,
        code: i32,
        sql: String,
    },

    /// A find iterator still owns the connection's read position.
    #[error("a find iterator is still open on this session; drain or flush it first")]
    CursorOutstanding,

    /// Cascading delete reached an object it is already deleting.
    #[error("cascading delete reached '{class}' with id {id} twice; the cascade graph is cyclic")]
    CascadeCycle { class: String, id: Value },

    /// No identifier could be generated or read back for a new object.
    #[error("could not generate an identifier for class '{class}': {reason}")]
    IdentifierGeneration { class: String, reason: String },

    /// A value could not be converted into the property's Rust type.
    #[error("property '{class}.{property}' expects {expected}, found {found}")]
    PropertyConversion {
        class: String,
        property: String,
        expected: &'static str,
        found: &'static str,
    },

    /// `state()` returned keys the definition does not know.
    #[error("state of class '{class}' contains unmapped property '{property}'")]
    InvalidObjectState { class: String, property: String },

    /// A nested scope failed, so the outermost transaction was rolled back.
    #[error("transaction rolled back because a nested operation failed")]
    TransactionAborted,
}

impl Error {
    /// Shorthand for [`Error::DefinitionNotFound`].
    pub fn definition_not_found(class: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::DefinitionNotFound {
            class: class.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::InvalidDefinition`].
    pub fn invalid_definition(class: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidDefinition {
            class: class.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::RelationNotFound`].
    pub fn relation_not_found(
        class: impl Into<String>,
        related_class: impl Into<String>,
        detail: RelationLookup,
    ) -> Self {
        Error::RelationNotFound {
            class: class.into(),
            related_class: related_class.into(),
            detail,
        }
    }

    /// Whether this error was produced by the database rather than by the runtime.
    pub fn is_query_error(&self) -> bool {
        matches!(self, Error::QueryExecution { .. })
    }
}
