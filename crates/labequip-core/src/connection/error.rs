//! Connection errors

use crate::constants::{Backend, Interface};
use thiserror::Error;

/// Errors that can occur while opening or using a connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("{0} has no connection record")]
    NoConnection(String),

    #[error("Cannot connect to {record}: the {backend} backend is not supported")]
    UnsupportedBackend { backend: Backend, record: String },

    #[error("Cannot connect to {record}: the {interface} interface is not supported")]
    UnsupportedInterface { interface: Interface, record: String },

    #[error("Invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    #[error("Invalid '{name}' property: {message}")]
    InvalidProperty { name: String, message: String },

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Cannot find the SDK library '{0}'")]
    LibraryNotFound(String),

    #[error("{class} does not support {operation}")]
    Unsupported {
        class: String,
        operation: &'static str,
    },

    #[error("Timeout waiting for a reply")]
    Timeout,

    #[error("The connection is closed")]
    Closed,

    #[error("Maximum read size of {0} bytes exceeded")]
    MaxReadSize(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    pub(crate) fn invalid_property(name: &str, message: impl ToString) -> Self {
        ConnectionError::InvalidProperty {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<serialport::Error> for ConnectionError {
    fn from(e: serialport::Error) -> Self {
        ConnectionError::Serial(e.to_string())
    }
}
