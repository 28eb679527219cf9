//! Error types for upsert planning, dialect selection and binding.

use std::fmt;

/// The primary error type for all upsertql operations.
#[derive(Debug)]
pub enum Error {
    /// Plan or metadata validation failed
    Validation(ValidationError),
    /// Configuration errors (bad operation name, missing converter, ...)
    Config(ConfigError),
    /// The connected database product has no upsert dialect
    UnsupportedDatabase(UnsupportedDatabaseError),
    /// Type conversion errors
    Type(TypeError),
    /// A value could not be converted into its bindable form
    Conversion(ConversionError),
    /// Parameter binding errors
    Bind(BindError),
    /// Error reported by the data-access layer
    Execution(Box<dyn std::error::Error + Send + Sync>),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

/// The type of plan invariant that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A requested ON column does not exist on the entity
    UnknownOnColumn,
    /// An ON column is neither an id column nor a unique column
    NonUniqueOnColumn,
    /// A requested value column does not exist on the entity
    UnknownValueColumn,
    /// A requested update (or ignored) column does not exist on the entity
    UnknownUpdateColumn,
    /// An update column is also an ON column
    OnColumnUpdated,
    /// The conditional predicate references an unknown field
    UnknownPredicateField,
    /// No ON columns could be determined
    MissingOnColumns,
    /// The entity declares no unique constraint
    NoUniqueConstraint,
    /// Entity metadata references a column outside its column set
    InvalidMetadata,
    /// A `When` clause carries no recognizable operator
    UnrecognizedCondition,
}

impl ValidationErrorKind {
    /// Short label used in error messages.
    pub const fn label(self) -> &'static str {
        match self {
            ValidationErrorKind::UnknownOnColumn => "unknown ON column",
            ValidationErrorKind::NonUniqueOnColumn => "ON column is not unique",
            ValidationErrorKind::UnknownValueColumn => "unknown value column",
            ValidationErrorKind::UnknownUpdateColumn => "unknown update column",
            ValidationErrorKind::OnColumnUpdated => "ON column in update set",
            ValidationErrorKind::UnknownPredicateField => "unknown predicate field",
            ValidationErrorKind::MissingOnColumns => "missing ON columns",
            ValidationErrorKind::NoUniqueConstraint => "no unique constraint",
            ValidationErrorKind::InvalidMetadata => "invalid entity metadata",
            ValidationErrorKind::UnrecognizedCondition => "unrecognized condition",
        }
    }
}

/// A single violated invariant together with the columns that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnViolation {
    /// The invariant that failed
    pub kind: ValidationErrorKind,
    /// Offending column or field names
    pub columns: Vec<String>,
    /// Human-readable error message
    pub message: String,
}

/// Validation error collecting every violated invariant of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Table the plan was built for
    pub table: String,
    /// All violations, in the order they were detected
    pub violations: Vec<ColumnViolation>,
}

impl ValidationError {
    /// Create a new empty validation error container for a table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            violations: Vec::new(),
        }
    }

    /// Check if there are any violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Add a violation naming the offending columns.
    pub fn add<I, S>(&mut self, kind: ValidationErrorKind, columns: I, message: impl Into<String>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.violations.push(ColumnViolation {
            kind,
            columns: columns.into_iter().map(Into::into).collect(),
            message: message.into(),
        });
    }

    /// Returns true if a violation of the given kind was recorded.
    pub fn has(&self, kind: ValidationErrorKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }

    /// Columns reported for the given kind.
    pub fn columns_for(&self, kind: ValidationErrorKind) -> Vec<&str> {
        self.violations
            .iter()
            .filter(|v| v.kind == kind)
            .flat_map(|v| v.columns.iter().map(String::as_str))
            .collect()
    }

    /// Convert to Result, returning Ok(()) if no violations, Err(self) otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedDatabaseError {
    /// Product name as reported by the driver
    pub product_name: String,
    /// Version string as reported by the driver
    pub version: String,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub field: Option<String>,
}

#[derive(Debug)]
pub struct ConversionError {
    /// Field being converted
    pub field: String,
    /// Mapper or converter that failed
    pub mapper: String,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindError {
    /// Parameter or field name involved
    pub name: String,
    pub message: String,
}

impl Error {
    /// Is this a user-correctable configuration problem (bad method name,
    /// entity annotations, unsupported database)?
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Config(_) | Error::UnsupportedDatabase(_)
        )
    }

    /// Get the validation details if this is a validation error.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::UnsupportedDatabase(e) => write!(f, "Unsupported database: {}", e),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Conversion(e) => write!(f, "Conversion error: {}", e),
            Error::Bind(e) => write!(f, "Bind error: {}", e),
            Error::Execution(e) => write!(f, "Execution error: {}", e),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Conversion(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Execution(e) => Some(e.as_ref()),
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.violations.is_empty() {
            write!(f, "plan for '{}' is valid", self.table)
        } else if self.violations.len() == 1 {
            let v = &self.violations[0];
            write!(
                f,
                "{} on '{}' [{}]: {}",
                v.kind.label(),
                self.table,
                v.columns.join(", "),
                v.message
            )
        } else {
            writeln!(f, "invalid upsert plan for '{}':", self.table)?;
            for v in &self.violations {
                writeln!(
                    f,
                    "  - {} [{}]: {}",
                    v.kind.label(),
                    v.columns.join(", "),
                    v.message
                )?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for UnsupportedDatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no upsert dialect for product '{}' (version '{}')",
            self.product_name, self.version
        )
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(
                f,
                "expected {} for field '{}', found {}",
                self.expected, field, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed to convert field '{}': {}",
            self.mapper, self.field, self.message
        )
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.name, self.message)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<UnsupportedDatabaseError> for Error {
    fn from(err: UnsupportedDatabaseError) -> Self {
        Error::UnsupportedDatabase(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ConversionError> for Error {
    fn from(err: ConversionError) -> Self {
        Error::Conversion(err)
    }
}

impl From<BindError> for Error {
    fn from(err: BindError) -> Self {
        Error::Bind(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for upsertql operations.
pub type Result<T> = std::result::Result<T, Error>;
