//! TCP socket transport

use super::{
    connection_of, frame_message, read_message, ConnectionError, Resource, TransportSettings,
};
use crate::record::EquipmentRecord;
use std::fmt;
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, warn};

/// Connect timeout used when the properties do not give a timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Host and port of a socket address such as `TCPIP::192.168.1.100::5025`.
///
/// A trailing `::SOCKET` (VISA style) is accepted.
pub fn socket_address(address: &str) -> Result<(String, u16), ConnectionError> {
    let invalid = |message: &str| ConnectionError::InvalidAddress {
        address: address.to_string(),
        message: message.to_string(),
    };

    let mut parts: Vec<&str> = address.trim().split("::").collect();
    if parts.last().is_some_and(|p| p.eq_ignore_ascii_case("SOCKET")) {
        parts.pop();
    }
    match parts.as_slice() {
        [_, host, port] if !host.is_empty() => {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| invalid("the port is not a number from 0 to 65535"))?;
            Ok((host.trim().to_string(), port))
        }
        _ => Err(invalid("expected TCPIP::<host>::<port>")),
    }
}

/// Equipment connected through a TCP socket
pub struct SocketResource {
    record: EquipmentRecord,
    class: String,
    peer: SocketAddr,
    stream: Option<TcpStream>,
    settings: TransportSettings,
    pending: Vec<u8>,
}

impl SocketResource {
    /// Connect to the host and port named by the record's connection
    pub fn open(record: &EquipmentRecord, class: &str) -> Result<Self, ConnectionError> {
        let connection = connection_of(record)?;
        let settings = TransportSettings::from_properties(connection.properties())?;
        let (host, port) = socket_address(connection.address())?;

        let peer = (host.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ConnectionError::InvalidAddress {
                address: connection.address().to_string(),
                message: format!("cannot resolve '{host}'"),
            })?;

        debug!("Connecting to {} for {}", peer, record);
        let stream = TcpStream::connect_timeout(
            &peer,
            settings.timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        )?;
        stream.set_read_timeout(settings.timeout)?;
        stream.set_write_timeout(settings.timeout)?;

        Ok(Self {
            record: record.clone(),
            class: class.to_string(),
            peer,
            stream: Some(stream),
            settings,
            pending: Vec::new(),
        })
    }

    /// Address the socket is connected to
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl fmt::Debug for SocketResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketResource")
            .field("record", &self.record.to_string())
            .field("class", &self.class)
            .field("peer", &self.peer)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl Resource for SocketResource {
    fn record(&self) -> &EquipmentRecord {
        &self.record
    }

    fn class_name(&self) -> &str {
        &self.class
    }

    fn write(&mut self, message: &str) -> Result<usize, ConnectionError> {
        let bytes = frame_message(message, &self.settings.write_termination);
        debug!("{} <- {:?}", self.peer, message);
        let stream = self.stream.as_mut().ok_or(ConnectionError::Closed)?;
        stream.write_all(&bytes)?;
        Ok(bytes.len())
    }

    fn read(&mut self) -> Result<String, ConnectionError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::Closed)?;
        let message = read_message(
            stream,
            &mut self.pending,
            &self.settings.read_termination,
            self.settings.max_read_size,
        )?;
        let reply = String::from_utf8_lossy(&message).into_owned();
        debug!("{} -> {:?}", self.peer, reply);
        Ok(reply)
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                warn!("Error closing the socket to {}: {}", self.peer, e);
            }
            debug!("Closed {}", self.peer);
        }
        Ok(())
    }
}
