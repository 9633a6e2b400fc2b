//! Enumerations shared by the record model, the query engine and the transports.
//!
//! The serial settings are defined here with the literal values of the serial
//! standard rather than borrowed from a transport library, so records can be
//! loaded and queried without touching any port.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Line-feed termination sequence.
pub const LF: &[u8] = b"\n";

/// Carriage-return termination sequence.
pub const CR: &[u8] = b"\r";

/// Error returned when a string does not name a member of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct ParseEnumError {
    /// Name of the enumeration
    pub kind: &'static str,
    /// The rejected text
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// The software backend used to communicate with the equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Backend {
    /// No backend was specified
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown = 0,
    /// The native transports of this library
    #[serde(rename = "MSL")]
    Msl = 1,
    /// A third-party instrument-control library
    #[serde(rename = "PyVISA")]
    PyVisa = 2,
}

impl Backend {
    /// Every member, in value order
    pub const ALL: [Backend; 3] = [Backend::Unknown, Backend::Msl, Backend::PyVisa];

    /// Member name as it appears in databases
    pub fn name(self) -> &'static str {
        match self {
            Backend::Unknown => "UNKNOWN",
            Backend::Msl => "MSL",
            Backend::PyVisa => "PyVISA",
        }
    }

    /// Integer value of the member
    pub fn value(self) -> i64 {
        self as i64
    }

    /// Look up a member by its integer value
    pub fn from_value(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.value() == value)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = ParseEnumError;

    /// Accepts the member name (any case) or its integer value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Self::from_value(value).ok_or_else(|| ParseEnumError::new("Backend", s));
        }
        Self::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseEnumError::new("Backend", s))
    }
}

/// The physical or logical medium that carries a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interface {
    /// No interface
    #[default]
    #[serde(rename = "NONE")]
    None = 0,
    /// RS-232/RS-485 style serial port
    #[serde(rename = "SERIAL")]
    Serial = 1,
    /// IEEE-488 bus
    #[serde(rename = "GPIB")]
    Gpib = 2,
    /// USB device
    #[serde(rename = "USB")]
    Usb = 3,
    /// PXI chassis
    #[serde(rename = "PXI")]
    Pxi = 4,
    /// VXI chassis
    #[serde(rename = "VXI")]
    Vxi = 5,
    /// Ethernet socket
    #[serde(rename = "TCPIP")]
    Tcpip = 6,
    /// Vendor software development kit
    #[serde(rename = "SDK")]
    Sdk = 7,
    /// Serial port behind an Ethernet adaptor
    #[serde(rename = "TCPIP_SERIAL")]
    TcpipSerial = 8,
    /// GPIB bus behind an Ethernet adaptor
    #[serde(rename = "TCPIP_GPIB")]
    TcpipGpib = 9,
    /// Serial port behind a USB adaptor
    #[serde(rename = "USB_SERIAL")]
    UsbSerial = 10,
    /// GPIB bus behind a USB adaptor
    #[serde(rename = "USB_GPIB")]
    UsbGpib = 11,
    /// Prologix GPIB-Ethernet controller
    #[serde(rename = "PROLOGIX_ENET")]
    PrologixEnet = 12,
    /// Prologix GPIB-USB controller
    #[serde(rename = "PROLOGIX_USB")]
    PrologixUsb = 13,
}

/// Alternative address prefixes and the interface they stand for.
const INTERFACE_ALIASES: &[(&str, Interface)] = &[
    ("ASRL", Interface::Serial),
    ("COM", Interface::Serial),
    ("RS", Interface::Serial),
    ("LPT", Interface::Serial),
    ("ENET", Interface::Tcpip),
    ("ETHERNET", Interface::Tcpip),
    ("LAN", Interface::Tcpip),
];

impl Interface {
    /// Every member, in value order
    pub const ALL: [Interface; 14] = [
        Interface::None,
        Interface::Serial,
        Interface::Gpib,
        Interface::Usb,
        Interface::Pxi,
        Interface::Vxi,
        Interface::Tcpip,
        Interface::Sdk,
        Interface::TcpipSerial,
        Interface::TcpipGpib,
        Interface::UsbSerial,
        Interface::UsbGpib,
        Interface::PrologixEnet,
        Interface::PrologixUsb,
    ];

    /// Member name as it appears in databases
    pub fn name(self) -> &'static str {
        match self {
            Interface::None => "NONE",
            Interface::Serial => "SERIAL",
            Interface::Gpib => "GPIB",
            Interface::Usb => "USB",
            Interface::Pxi => "PXI",
            Interface::Vxi => "VXI",
            Interface::Tcpip => "TCPIP",
            Interface::Sdk => "SDK",
            Interface::TcpipSerial => "TCPIP_SERIAL",
            Interface::TcpipGpib => "TCPIP_GPIB",
            Interface::UsbSerial => "USB_SERIAL",
            Interface::UsbGpib => "USB_GPIB",
            Interface::PrologixEnet => "PROLOGIX_ENET",
            Interface::PrologixUsb => "PROLOGIX_USB",
        }
    }

    /// Integer value of the member
    pub fn value(self) -> i64 {
        self as i64
    }

    /// Look up a member by its integer value
    pub fn from_value(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.value() == value)
    }

    /// Resolve a member name or alias (any case), e.g. `COM` or `ethernet`.
    fn from_name_or_alias(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|i| i.name().eq_ignore_ascii_case(name))
            .or_else(|| {
                INTERFACE_ALIASES
                    .iter()
                    .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
                    .map(|(_, interface)| *interface)
            })
    }

    /// Derive the interface from a connection address.
    ///
    /// The leading run of letters and underscores names the interface, so
    /// `COM4`, `ASRL/dev/ttyUSB0`, `GPIB0::22::INSTR` and `TCPIP::host::5025`
    /// all resolve. An empty address is [`Interface::None`].
    pub fn from_address(address: &str) -> Result<Self, ParseEnumError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Ok(Interface::None);
        }
        let prefix: String = trimmed
            .chars()
            .take_while(|c| c.is_ascii_alphabetic() || *c == '_')
            .collect();
        Self::from_name_or_alias(&prefix).ok_or_else(|| ParseEnumError::new("Interface", address))
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interface {
    type Err = ParseEnumError;

    /// Accepts the member name, an alias (any case) or the integer value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Self::from_value(value).ok_or_else(|| ParseEnumError::new("Interface", s));
        }
        Self::from_name_or_alias(trimmed).ok_or_else(|| ParseEnumError::new("Interface", s))
    }
}

/// Parity checking for serial communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
    /// Parity bit always 1
    Mark,
    /// Parity bit always 0
    Space,
}

impl Parity {
    /// Single-letter code used by the serial standard
    pub fn code(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        }
    }
}

impl FromStr for Parity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" | "NONE" => Ok(Parity::None),
            "O" | "ODD" => Ok(Parity::Odd),
            "E" | "EVEN" => Ok(Parity::Even),
            "M" | "MARK" => Ok(Parity::Mark),
            "S" | "SPACE" => Ok(Parity::Space),
            _ => Err(ParseEnumError::new("Parity", s)),
        }
    }
}

/// Number of stop bits for serial communication.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum StopBits {
    /// 1 stop bit
    #[default]
    One,
    /// 1.5 stop bits
    OnePointFive,
    /// 2 stop bits
    Two,
}

impl StopBits {
    /// Number of stop bits
    pub fn value(self) -> f64 {
        match self {
            StopBits::One => 1.0,
            StopBits::OnePointFive => 1.5,
            StopBits::Two => 2.0,
        }
    }
}

impl FromStr for StopBits {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "ONE" => return Ok(StopBits::One),
            "ONE_POINT_FIVE" => return Ok(StopBits::OnePointFive),
            "TWO" => return Ok(StopBits::Two),
            _ => {}
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v == 1.0 => Ok(StopBits::One),
            Ok(v) if v == 1.5 => Ok(StopBits::OnePointFive),
            Ok(v) if v == 2.0 => Ok(StopBits::Two),
            _ => Err(ParseEnumError::new("StopBits", s)),
        }
    }
}

/// Number of data bits for serial communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataBits {
    /// 5 data bits
    Five = 5,
    /// 6 data bits
    Six = 6,
    /// 7 data bits
    Seven = 7,
    /// 8 data bits
    #[default]
    Eight = 8,
}

impl FromStr for DataBits {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "5" | "FIVE" => Ok(DataBits::Five),
            "6" | "SIX" => Ok(DataBits::Six),
            "7" | "SEVEN" => Ok(DataBits::Seven),
            "8" | "EIGHT" => Ok(DataBits::Eight),
            _ => Err(ParseEnumError::new("DataBits", s)),
        }
    }
}
