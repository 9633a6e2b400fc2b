//! Serial port transport
//!
//! Port settings come from the connection properties: `baud_rate` (default
//! 9600), `data_bits`, `parity`, `stop_bits`, `rtscts`, `xonxoff` and an
//! optional `port` that overrides the port named by the address.

use super::{
    connection_of, frame_message, read_message, ConnectionError, Resource, TransportSettings,
};
use crate::constants::{DataBits, Parity, StopBits};
use crate::record::{EquipmentRecord, Properties, PropertyValue};
use serialport::{FlowControl, SerialPort};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Baud rate used when the properties do not give one
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Read timeout used when the properties do not give one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const SERIAL_PREFIXES: &[&str] = &["ASRL", "SERIAL", "COM", "RS"];

/// The operating-system port name for a serial address.
///
/// `COM4`, `ASRL4` and `ASRL::COM4` name `COM4`; `ASRL/dev/ttyUSB0` and
/// `SERIAL::/dev/ttyS1` name the device path.
pub fn port_name(address: &str) -> Result<String, ConnectionError> {
    let invalid = |message: &str| ConnectionError::InvalidAddress {
        address: address.to_string(),
        message: message.to_string(),
    };

    let trimmed = address.trim();
    let upper = trimmed.to_ascii_uppercase();
    let upper = upper.strip_suffix("::INSTR").unwrap_or(&upper);
    let rest_len = upper.len();

    let prefix = SERIAL_PREFIXES
        .iter()
        .find(|p| upper.starts_with(*p))
        .ok_or_else(|| invalid("not a serial address"))?;

    // Work on the original text so device paths keep their case
    let rest = &trimmed[prefix.len()..rest_len];
    let rest = rest.trim_start_matches("::");
    if rest.is_empty() {
        return Err(invalid("no port number or device"));
    }

    if *prefix == "COM" || rest.chars().all(|c| c.is_ascii_digit()) {
        if !rest.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected a port number"));
        }
        return Ok(format!("COM{rest}"));
    }
    Ok(rest.to_string())
}

/// Serial port settings read from connection properties
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl SerialSettings {
    pub fn from_properties(properties: &Properties) -> Result<Self, ConnectionError> {
        let baud_rate = match properties.get("baud_rate") {
            None | Some(PropertyValue::Null) => DEFAULT_BAUD_RATE,
            Some(value) => value
                .as_i64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| ConnectionError::invalid_property("baud_rate", value))?,
        };

        let rtscts = flag(properties, "rtscts")?;
        let xonxoff = flag(properties, "xonxoff")?;
        let flow_control = match (rtscts, xonxoff) {
            (true, _) => FlowControl::Hardware,
            (false, true) => FlowControl::Software,
            (false, false) => FlowControl::None,
        };

        Ok(Self {
            baud_rate,
            data_bits: parse_setting(properties, "data_bits")?,
            parity: parse_setting(properties, "parity")?,
            stop_bits: parse_setting(properties, "stop_bits")?,
            flow_control,
        })
    }
}

fn parse_setting<T>(properties: &Properties, name: &str) -> Result<T, ConnectionError>
where
    T: FromStr + Default,
    T::Err: fmt::Display,
{
    match properties.get(name) {
        None | Some(PropertyValue::Null) => Ok(T::default()),
        Some(value) => value
            .to_string()
            .parse()
            .map_err(|e| ConnectionError::invalid_property(name, e)),
    }
}

fn flag(properties: &Properties, name: &str) -> Result<bool, ConnectionError> {
    match properties.get(name) {
        None | Some(PropertyValue::Null) => Ok(false),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| ConnectionError::invalid_property(name, "expected true or false")),
    }
}

fn serial_data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn serial_parity(parity: Parity) -> Result<serialport::Parity, ConnectionError> {
    match parity {
        Parity::None => Ok(serialport::Parity::None),
        Parity::Odd => Ok(serialport::Parity::Odd),
        Parity::Even => Ok(serialport::Parity::Even),
        other => Err(ConnectionError::invalid_property(
            "parity",
            format!("{other:?} parity is not supported by the serial driver"),
        )),
    }
}

fn serial_stop_bits(stop_bits: StopBits) -> Result<serialport::StopBits, ConnectionError> {
    match stop_bits {
        StopBits::One => Ok(serialport::StopBits::One),
        StopBits::Two => Ok(serialport::StopBits::Two),
        StopBits::OnePointFive => Err(ConnectionError::invalid_property(
            "stop_bits",
            "1.5 stop bits are not supported by the serial driver",
        )),
    }
}

/// Equipment connected through a serial port
pub struct SerialResource {
    record: EquipmentRecord,
    class: String,
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
    settings: TransportSettings,
    pending: Vec<u8>,
}

impl SerialResource {
    /// Open and configure the serial port named by the record's connection
    pub fn open(record: &EquipmentRecord, class: &str) -> Result<Self, ConnectionError> {
        let connection = connection_of(record)?;
        let properties = connection.properties();
        let settings = TransportSettings::from_properties(properties)?;
        let serial = SerialSettings::from_properties(properties)?;

        let name = match properties.get("port").and_then(PropertyValue::as_str) {
            Some(port) => port.to_string(),
            None => port_name(connection.address())?,
        };

        debug!(
            "Opening {} at {} baud ({}{}{}) for {}",
            name,
            serial.baud_rate,
            serial.data_bits as u8,
            serial.parity.code(),
            serial.stop_bits.value(),
            record
        );
        let port = serialport::new(&name, serial.baud_rate)
            .data_bits(serial_data_bits(serial.data_bits))
            .parity(serial_parity(serial.parity)?)
            .stop_bits(serial_stop_bits(serial.stop_bits)?)
            .flow_control(serial.flow_control)
            .timeout(settings.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .open()?;

        Ok(Self {
            record: record.clone(),
            class: class.to_string(),
            port_name: name,
            port: Some(port),
            settings,
            pending: Vec::new(),
        })
    }

    /// Name of the port that was opened
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, ConnectionError> {
        self.port.as_mut().ok_or(ConnectionError::Closed)
    }
}

impl fmt::Debug for SerialResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialResource")
            .field("record", &self.record.to_string())
            .field("class", &self.class)
            .field("port_name", &self.port_name)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl Resource for SerialResource {
    fn record(&self) -> &EquipmentRecord {
        &self.record
    }

    fn class_name(&self) -> &str {
        &self.class
    }

    fn write(&mut self, message: &str) -> Result<usize, ConnectionError> {
        let bytes = frame_message(message, &self.settings.write_termination);
        debug!("{} <- {:?}", self.port_name, message);
        let port = self.port()?;
        port.write_all(&bytes)?;
        port.flush()?;
        Ok(bytes.len())
    }

    fn read(&mut self) -> Result<String, ConnectionError> {
        let termination = self.settings.read_termination.clone();
        let max = self.settings.max_read_size;
        let mut pending = std::mem::take(&mut self.pending);
        let result = match self.port.as_mut() {
            Some(port) => read_message(port.as_mut(), &mut pending, &termination, max),
            None => Err(ConnectionError::Closed),
        };
        self.pending = pending;
        let reply = String::from_utf8_lossy(&result?).into_owned();
        debug!("{} -> {:?}", self.port_name, reply);
        Ok(reply)
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        if self.port.take().is_some() {
            debug!("Closed {}", self.port_name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_port_names() {
        assert_eq!(port_name("COM4").unwrap(), "COM4");
        assert_eq!(port_name("ASRL4").unwrap(), "COM4");
        assert_eq!(port_name("ASRL::COM4::INSTR").unwrap(), "COM4");
        assert_eq!(port_name("ASRL/dev/ttyUSB0").unwrap(), "/dev/ttyUSB0");
        assert_eq!(port_name("SERIAL::/dev/ttyS1").unwrap(), "/dev/ttyS1");
        assert!(port_name("TCPIP::1.2.3.4::5025").is_err());
        assert!(port_name("COM").is_err());
        assert!(port_name("COMx").is_err());
    }

    #[test]
    fn test_serial_settings() {
        let mut properties = Properties::new();
        assert_eq!(
            SerialSettings::from_properties(&properties).unwrap(),
            SerialSettings {
                baud_rate: DEFAULT_BAUD_RATE,
                data_bits: DataBits::Eight,
                parity: Parity::None,
                stop_bits: StopBits::One,
                flow_control: FlowControl::None,
            }
        );

        for (k, v) in [
            ("baud_rate", "115200"),
            ("data_bits", "7"),
            ("parity", "E"),
            ("stop_bits", "2"),
            ("rtscts", "true"),
        ] {
            properties.insert(k.into(), PropertyValue::parse(v));
        }
        let settings = SerialSettings::from_properties(&properties).unwrap();
        assert_eq!(settings.baud_rate, 115200);
        assert_eq!(settings.data_bits, DataBits::Seven);
        assert_eq!(settings.parity, Parity::Even);
        assert_eq!(settings.stop_bits, StopBits::Two);
        assert_eq!(settings.flow_control, FlowControl::Hardware);

        properties.insert("parity".into(), PropertyValue::parse("sideways"));
        assert!(SerialSettings::from_properties(&properties).is_err());
    }

    #[test]
    fn test_unsupported_line_settings() {
        assert!(serial_parity(Parity::Mark).is_err());
        assert!(serial_stop_bits(StopBits::OnePointFive).is_err());
    }
}
