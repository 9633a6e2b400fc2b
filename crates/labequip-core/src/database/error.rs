//! Error types for loading and querying equipment databases

use thiserror::Error;

/// Category of a [`DatabaseError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The configuration or database source could not be read
    Io,
    /// A record field name is not recognised, or a key is not unique
    Attribute,
    /// A field value is malformed, or a record has conflicting aliases
    Value,
    /// A query used a filter name that is not a record attribute
    Name,
}

/// Errors that can occur while loading or querying equipment records
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("No <path></path> tag in the configuration file '{0}'")]
    MissingPath(String),

    #[error("Cannot find the database file '{0}'")]
    SourceNotFound(String),

    #[error("Unsupported equipment-database file type '{0}'")]
    UnsupportedSource(String),

    #[error("Sheet error in '{path}': {message}")]
    Sheet { path: String, message: String },

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Spreadsheet error in '{path}': {message}")]
    Spreadsheet { path: String, message: String },

    #[error("'{name}' is not one of the {record} attributes")]
    UnknownAttribute { record: &'static str, name: String },

    #[error("The {what} is not unique: {key}")]
    NotUnique { what: &'static str, key: String },

    #[error("No equipment record matches {0}")]
    NoMatch(String),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("The equipment record '{key}' has multiple aliases: '{first}' and '{second}'")]
    ConflictingAliases {
        key: String,
        first: String,
        second: String,
    },

    #[error("Invalid regular expression for '{field}': {message}")]
    InvalidPattern { field: String, message: String },

    #[error("'{name}' is not a valid {record} filter name")]
    UnknownFilter { record: &'static str, name: String },

    #[error("{path}: {source}")]
    InSource {
        path: String,
        #[source]
        source: Box<DatabaseError>,
    },
}

impl DatabaseError {
    /// The category of this error, independent of its message
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatabaseError::Io(_)
            | DatabaseError::MissingPath(_)
            | DatabaseError::SourceNotFound(_)
            | DatabaseError::UnsupportedSource(_)
            | DatabaseError::Sheet { .. }
            | DatabaseError::Xml(_)
            | DatabaseError::Spreadsheet { .. } => ErrorKind::Io,
            DatabaseError::UnknownAttribute { .. }
            | DatabaseError::NotUnique { .. }
            | DatabaseError::NoMatch(_) => ErrorKind::Attribute,
            DatabaseError::InvalidValue { .. }
            | DatabaseError::ConflictingAliases { .. }
            | DatabaseError::InvalidPattern { .. } => ErrorKind::Value,
            DatabaseError::UnknownFilter { .. } => ErrorKind::Name,
            DatabaseError::InSource { source, .. } => source.kind(),
        }
    }

    /// Attach the file the error was raised for
    pub(crate) fn in_source(self, path: impl Into<String>) -> Self {
        match self {
            DatabaseError::InSource { .. } => self,
            other => DatabaseError::InSource {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn invalid_value(field: impl Into<String>, message: impl ToString) -> Self {
        DatabaseError::InvalidValue {
            field: field.into(),
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for DatabaseError {
    fn from(e: std::io::Error) -> Self {
        DatabaseError::Io(e.to_string())
    }
}

impl From<quick_xml::Error> for DatabaseError {
    fn from(e: quick_xml::Error) -> Self {
        DatabaseError::Xml(e.to_string())
    }
}
