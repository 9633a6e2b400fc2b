//! Connections to equipment
//!
//! [`connect`] turns an [`EquipmentRecord`] into a live [`Resource`]:
//! - in demo mode every record gets a [`DemoResource`]
//! - records using the MSL backend get their registered resource class, or a
//!   plain serial/socket transport chosen from the interface
//! - any other backend is rejected

mod demo;
mod error;
mod sdk;
mod serial;
mod socket;

pub use demo::DemoResource;
pub use error::ConnectionError;
pub use sdk::SdkResource;
pub use serial::{port_name, SerialResource};
pub use socket::{socket_address, SocketResource};

use crate::constants::{Backend, Interface, CR, LF};
use crate::record::{ConnectionRecord, EquipmentRecord, Properties, PropertyValue};
use crate::resources::find_resource_class;
use std::fmt;
use std::io::{self, Read};
use std::time::Duration;
use tracing::{debug, info};

/// Largest reply accepted by default
pub const DEFAULT_MAX_READ_SIZE: usize = 1 << 20;

/// A connected piece of equipment
pub trait Resource: Send + fmt::Debug {
    /// The record this resource was opened for
    fn record(&self) -> &EquipmentRecord;

    /// Name of the resource class handling the equipment
    fn class_name(&self) -> &str;

    /// Send a message; the write termination is appended. Returns bytes written.
    fn write(&mut self, message: &str) -> Result<usize, ConnectionError>;

    /// Read one reply, without its read termination
    fn read(&mut self) -> Result<String, ConnectionError>;

    /// Write a message then read the reply
    fn query(&mut self, message: &str) -> Result<String, ConnectionError> {
        self.write(message)?;
        self.read()
    }

    /// Release the underlying transport. Further I/O fails with
    /// [`ConnectionError::Closed`].
    fn disconnect(&mut self) -> Result<(), ConnectionError>;
}

/// Open a connection to the equipment a record describes
pub fn connect(record: &EquipmentRecord, demo: bool) -> Result<Box<dyn Resource>, ConnectionError> {
    let connection = record
        .connection()
        .ok_or_else(|| ConnectionError::NoConnection(record.to_string()))?;

    if demo {
        let class = find_resource_class(connection);
        let name = class.map_or("Demo", |c| c.name);
        info!("Connecting to {} in demo mode as {}", record, name);
        return Ok(Box::new(DemoResource::new(record.clone(), name)));
    }

    if connection.backend() != Backend::Msl {
        return Err(ConnectionError::UnsupportedBackend {
            backend: connection.backend(),
            record: record.to_string(),
        });
    }

    if let Some(class) = find_resource_class(connection) {
        debug!("Resolved {} to resource class {}", record, class.name);
        return class.connect(record);
    }

    match connection.interface() {
        Interface::Serial => open_transport(record, Interface::Serial, "Serial"),
        Interface::Tcpip => open_transport(record, Interface::Tcpip, "Socket"),
        interface => Err(ConnectionError::UnsupportedInterface {
            interface,
            record: record.to_string(),
        }),
    }
}

/// Open the transport for `interface`, reporting `class` as its class name
pub(crate) fn open_transport(
    record: &EquipmentRecord,
    interface: Interface,
    class: &str,
) -> Result<Box<dyn Resource>, ConnectionError> {
    info!("Connecting to {} over {}", record, interface);
    match interface {
        Interface::Serial => Ok(Box::new(SerialResource::open(record, class)?)),
        Interface::Tcpip => Ok(Box::new(SocketResource::open(record, class)?)),
        Interface::Sdk => Ok(Box::new(SdkResource::open(record, class)?)),
        other => Err(ConnectionError::UnsupportedInterface {
            interface: other,
            record: record.to_string(),
        }),
    }
}

pub(crate) fn connection_of(record: &EquipmentRecord) -> Result<&ConnectionRecord, ConnectionError> {
    record
        .connection()
        .ok_or_else(|| ConnectionError::NoConnection(record.to_string()))
}

/// Message framing and timeout shared by the byte-stream transports
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    /// Bytes that end a reply; stripped from what `read` returns
    pub read_termination: Vec<u8>,
    /// Bytes appended to every message
    pub write_termination: Vec<u8>,
    /// Read/write timeout; `None` blocks
    pub timeout: Option<Duration>,
    /// Largest reply accepted, in bytes
    pub max_read_size: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            read_termination: LF.to_vec(),
            write_termination: [CR, LF].concat(),
            timeout: None,
            max_read_size: DEFAULT_MAX_READ_SIZE,
        }
    }
}

impl TransportSettings {
    /// Read the settings from connection properties.
    ///
    /// `termination` sets both terminations; `read_termination` and
    /// `write_termination` override it. `timeout` is in seconds.
    pub fn from_properties(properties: &Properties) -> Result<Self, ConnectionError> {
        let mut settings = TransportSettings::default();

        if let Some(value) = properties.get("termination") {
            let bytes = termination("termination", value)?;
            settings.read_termination = bytes.clone();
            settings.write_termination = bytes;
        }
        if let Some(value) = properties.get("read_termination") {
            settings.read_termination = termination("read_termination", value)?;
        }
        if let Some(value) = properties.get("write_termination") {
            settings.write_termination = termination("write_termination", value)?;
        }
        if let Some(value) = properties.get("timeout") {
            settings.timeout = match value {
                PropertyValue::Null => None,
                other => {
                    let seconds = other.as_f64().ok_or_else(|| {
                        ConnectionError::invalid_property("timeout", "expected seconds")
                    })?;
                    let timeout = Duration::try_from_secs_f64(seconds)
                        .map_err(|e| ConnectionError::invalid_property("timeout", e))?;
                    Some(timeout)
                }
            };
        }
        if let Some(value) = properties.get("max_read_size") {
            settings.max_read_size = value
                .as_i64()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConnectionError::invalid_property("max_read_size", "expected a positive integer")
                })?;
        }
        Ok(settings)
    }
}

fn termination(name: &str, value: &PropertyValue) -> Result<Vec<u8>, ConnectionError> {
    match value {
        PropertyValue::Null => Ok(Vec::new()),
        other => other
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ConnectionError::invalid_property(name, format!("{other} is not a termination"))),
    }
}

/// Read up to the next `termination` from `reader`.
///
/// Bytes past the termination stay in `pending` for the next call. With an
/// empty termination whatever the first successful read returns is the reply.
pub(crate) fn read_message<R: Read + ?Sized>(
    reader: &mut R,
    pending: &mut Vec<u8>,
    termination: &[u8],
    max_size: usize,
) -> Result<Vec<u8>, ConnectionError> {
    let mut chunk = [0u8; 256];
    loop {
        if termination.is_empty() {
            if !pending.is_empty() {
                return Ok(std::mem::take(pending));
            }
        } else if let Some(pos) = pending
            .windows(termination.len())
            .position(|w| w == termination)
        {
            let mut message: Vec<u8> = pending.drain(..pos + termination.len()).collect();
            message.truncate(pos);
            return Ok(message);
        }

        if pending.len() > max_size {
            pending.clear();
            return Err(ConnectionError::MaxReadSize(max_size));
        }

        match reader.read(&mut chunk) {
            Ok(0) if pending.is_empty() => return Err(ConnectionError::Closed),
            Ok(0) => return Ok(std::mem::take(pending)),
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                return Err(ConnectionError::Timeout)
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Append the write termination unless the message already ends with it
pub(crate) fn frame_message(message: &str, termination: &[u8]) -> Vec<u8> {
    let mut bytes = message.as_bytes().to_vec();
    if !termination.is_empty() && !bytes.ends_with(termination) {
        bytes.extend_from_slice(termination);
    }
    bytes
}
