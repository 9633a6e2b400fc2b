//! Connection records

use super::property::{parse_properties_text, Properties, PropertyValue};
use crate::constants::{Backend, Interface};
use crate::database::DatabaseError;
use crate::xml::XmlElement;
use serde_json::{Map, Value};
use std::fmt;

/// The attributes a [`ConnectionRecord`] is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionField {
    /// `address`
    Address,
    /// `backend`
    Backend,
    /// `interface`
    Interface,
    /// `manufacturer`
    Manufacturer,
    /// `model`
    Model,
    /// `properties`
    Properties,
    /// `serial`
    Serial,
}

impl ConnectionField {
    /// Every field, in serialization order
    pub const ALL: [ConnectionField; 7] = [
        ConnectionField::Address,
        ConnectionField::Backend,
        ConnectionField::Interface,
        ConnectionField::Manufacturer,
        ConnectionField::Model,
        ConnectionField::Properties,
        ConnectionField::Serial,
    ];

    /// Attribute name as used in sources and filters
    pub fn name(self) -> &'static str {
        match self {
            ConnectionField::Address => "address",
            ConnectionField::Backend => "backend",
            ConnectionField::Interface => "interface",
            ConnectionField::Manufacturer => "manufacturer",
            ConnectionField::Model => "model",
            ConnectionField::Properties => "properties",
            ConnectionField::Serial => "serial",
        }
    }

    /// Field for an attribute name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// How to connect to one piece of equipment.
///
/// Built by the database loader and not changed afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionRecord {
    address: String,
    backend: Backend,
    interface: Interface,
    manufacturer: String,
    model: String,
    properties: Properties,
    serial: String,
}

impl ConnectionRecord {
    pub(crate) const KIND: &'static str = "ConnectionRecord";

    /// Build a record from named text fields.
    ///
    /// `properties` is given as `key=value; key=value` text. When no
    /// `interface` is given it is derived from the address for the MSL backend.
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self, DatabaseError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut record = ConnectionRecord::default();
        let mut interface: Option<Interface> = None;

        for (key, value) in fields {
            let (key, value) = (key.as_ref(), value.as_ref());
            let field = ConnectionField::from_name(key).ok_or_else(|| {
                DatabaseError::UnknownAttribute {
                    record: Self::KIND,
                    name: key.to_string(),
                }
            })?;
            match field {
                ConnectionField::Address => record.address = value.trim().to_string(),
                ConnectionField::Backend => record.backend = parse_backend(value)?,
                ConnectionField::Interface => interface = parse_interface(value)?,
                ConnectionField::Manufacturer => record.manufacturer = value.trim().to_string(),
                ConnectionField::Model => record.model = value.trim().to_string(),
                ConnectionField::Properties => {
                    record.properties.extend(parse_properties_text(value)?)
                }
                ConnectionField::Serial => record.serial = value.trim().to_string(),
            }
        }

        record.resolve_interface(interface)?;
        Ok(record)
    }

    /// Rebuild a record from the mapping produced by [`ConnectionRecord::to_dict`]
    pub fn from_dict(map: &Map<String, Value>) -> Result<Self, DatabaseError> {
        let mut fields: Vec<(String, String)> = Vec::new();
        let mut properties = Properties::new();

        for (key, value) in map {
            match ConnectionField::from_name(key) {
                Some(ConnectionField::Properties) => {
                    let object = value.as_object().ok_or_else(|| {
                        DatabaseError::invalid_value("properties", "expected a mapping")
                    })?;
                    for (k, v) in object {
                        properties.insert(k.clone(), PropertyValue::from_json(v));
                    }
                }
                Some(_) => fields.push((key.clone(), json_text(value))),
                None => {
                    return Err(DatabaseError::UnknownAttribute {
                        record: Self::KIND,
                        name: key.clone(),
                    })
                }
            }
        }

        let mut record = Self::from_fields(fields)?;
        record.properties = properties;
        Ok(record)
    }

    /// Build a record from a `<connection>` element.
    ///
    /// Fields may be child elements or attributes; `<properties>` holds
    /// `<property name="...">` children, or `key=value` text.
    pub(crate) fn from_element(element: &XmlElement) -> Result<Self, DatabaseError> {
        let mut fields: Vec<(String, String)> = element.attributes.clone();
        let mut properties = Properties::new();

        for child in &element.children {
            if child.name == ConnectionField::Properties.name() {
                if child.children.is_empty() {
                    properties.extend(parse_properties_text(child.text())?);
                }
                for prop in &child.children {
                    properties.insert(
                        entry_name(prop).to_string(),
                        PropertyValue::parse(prop.text()),
                    );
                }
            } else if !child.children.is_empty() {
                return Err(DatabaseError::invalid_value(
                    child.name.as_str(),
                    "expected text, found nested elements",
                ));
            } else {
                fields.push((child.name.clone(), child.text().to_string()));
            }
        }

        let mut record = Self::from_fields(fields)?;
        record.properties.extend(properties);
        Ok(record)
    }

    fn resolve_interface(&mut self, explicit: Option<Interface>) -> Result<(), DatabaseError> {
        self.interface = match explicit {
            Some(interface) => interface,
            None if self.backend == Backend::Msl => Interface::from_address(&self.address)
                .map_err(|e| DatabaseError::invalid_value("address", e))?,
            None => Interface::None,
        };
        Ok(())
    }

    /// Fill manufacturer, model and serial from the owning equipment when unset
    pub(crate) fn inherit(&mut self, manufacturer: &str, model: &str, serial: &str) {
        if self.manufacturer.is_empty() {
            self.manufacturer = manufacturer.to_string();
        }
        if self.model.is_empty() {
            self.model = model.to_string();
        }
        if self.serial.is_empty() {
            self.serial = serial.to_string();
        }
    }

    /// Transport address, e.g. `COM3` or `TCPIP::host::port`
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Software layer used to talk to the device
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Explicit interface, or the one derived from the address
    pub fn interface(&self) -> Interface {
        self.interface
    }

    /// Manufacturer name
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    /// Model number
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Typed transport properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Serial number
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// All attributes as a JSON mapping
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("address".into(), Value::String(self.address.clone()));
        map.insert("backend".into(), Value::String(self.backend.name().into()));
        map.insert(
            "interface".into(),
            Value::String(self.interface.name().into()),
        );
        map.insert(
            "manufacturer".into(),
            Value::String(self.manufacturer.clone()),
        );
        map.insert("model".into(), Value::String(self.model.clone()));
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        map.insert("properties".into(), Value::Object(properties));
        map.insert("serial".into(), Value::String(self.serial.clone()));
        map
    }

    pub(crate) fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::new("connection");
        for (name, text) in [
            ("address", self.address.as_str()),
            ("backend", self.backend.name()),
            ("interface", self.interface.name()),
            ("manufacturer", self.manufacturer.as_str()),
            ("model", self.model.as_str()),
        ] {
            element.children.push(text_element(name, text));
        }
        let mut properties = XmlElement::new("properties");
        for (key, value) in &self.properties {
            properties
                .children
                .push(named_element("property", key, &value.to_source_text()));
        }
        element.children.push(properties);
        element.children.push(text_element("serial", &self.serial));
        element
    }

    /// Canonical `<connection>` serialization
    pub fn to_xml(&self) -> Result<String, DatabaseError> {
        crate::xml::write_element(&self.to_element())
    }
}

impl fmt::Display for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConnectionRecord<{}|{}|{}>",
            self.manufacturer, self.model, self.serial
        )
    }
}

pub(crate) fn text_element(name: &str, text: &str) -> XmlElement {
    let mut element = XmlElement::new(name);
    element.text = text.to_string();
    element
}

/// `<tag name="...">text</tag>`, for keys that need not be valid XML names
pub(crate) fn named_element(tag: &str, name: &str, text: &str) -> XmlElement {
    let mut element = text_element(tag, text);
    element.attributes.push(("name".to_string(), name.to_string()));
    element
}

/// Key of a mapping entry: its `name` attribute, else its tag
pub(crate) fn entry_name(element: &XmlElement) -> &str {
    element.attribute("name").unwrap_or(element.name.as_str())
}

pub(crate) fn json_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_backend(value: &str) -> Result<Backend, DatabaseError> {
    if value.trim().is_empty() {
        return Ok(Backend::Unknown);
    }
    value
        .parse::<Backend>()
        .map_err(|e| DatabaseError::invalid_value("backend", e))
}

fn parse_interface(value: &str) -> Result<Option<Interface>, DatabaseError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    value
        .parse::<Interface>()
        .map(Some)
        .map_err(|e| DatabaseError::invalid_value("interface", e))
}
