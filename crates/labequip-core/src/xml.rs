//! Minimal XML element tree shared by the configuration file, XML databases
//! and record serialization.

use crate::database::DatabaseError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Write;

/// One parsed XML element with its attributes, text and children.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// First child with the given tag
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given tag
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> &str {
        self.text.trim()
    }
}

/// Parse a document into its root element.
pub(crate) fn parse_document(xml: &str) -> Result<XmlElement, DatabaseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                stack.push(element_from_start(e)?);
            }
            Ok(Event::Empty(ref e)) => {
                let element = element_from_start(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DatabaseError::Xml("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| DatabaseError::Xml(err.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DatabaseError::from(e)),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(DatabaseError::Xml(format!(
            "unclosed element <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }
    root.ok_or_else(|| DatabaseError::Xml("document has no root element".to_string()))
}

fn element_from_start(e: &BytesStart) -> Result<XmlElement, DatabaseError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(e.name().as_ref()).to_string());
    for attr in e.attributes() {
        let attr = attr.map_err(|err| DatabaseError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| DatabaseError::Xml(err.to_string()))?
            .to_string();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), DatabaseError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(DatabaseError::Xml(format!(
            "multiple root elements, found <{}>",
            element.name
        ))),
    }
}

/// Serialize an element tree (without an XML declaration).
pub(crate) fn write_element(element: &XmlElement) -> Result<String, DatabaseError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_node(&mut writer, element)?;
    let result = writer.into_inner();
    Ok(String::from_utf8_lossy(&result).to_string())
}

fn write_node<W: Write>(writer: &mut Writer<W>, element: &XmlElement) -> Result<(), DatabaseError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if !element.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&element.text)))?;
    }
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
