//! Configuration file
//!
//! The configuration is an XML document naming the database sources to load
//! and the equipment records to expose in the keyed view:
//!
//! ```xml
//! <msl>
//!   <path>data/equipment.xml</path>
//!   <path sheet="Equipment">data/register.xlsx</path>
//!   <equipment alias="dmm" manufacturer="Keysight">34465A</equipment>
//!   <user_defined>range</user_defined>
//!   <demo_mode>false</demo_mode>
//! </msl>
//! ```

use crate::database::{Database, DatabaseError, Selection, SourceSpec};
use crate::xml::{self, XmlElement};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable that overrides `<demo_mode>`
pub const DEMO_MODE_ENV: &str = "LABEQUIP_DEMO_MODE";

/// A parsed configuration file
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    root: XmlElement,
}

impl Config {
    /// Read and parse a configuration file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let path_text = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| {
            DatabaseError::Io(format!("Cannot open the configuration file '{path_text}': {e}"))
        })?;
        let (text, encoding) = crate::database::decode(&bytes);
        debug!("Reading configuration {} ({:?})", path_text, encoding);

        let root = xml::parse_document(&text).map_err(|e| e.in_source(path_text))?;
        Ok(Config {
            path: path.to_path_buf(),
            root,
        })
    }

    /// Path of the configuration file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Text of the first top-level element named `tag`
    pub fn value(&self, tag: &str) -> Option<&str> {
        self.root.child(tag).map(XmlElement::text)
    }

    /// Attribute-style names accepted into each record's user-defined mapping
    pub fn user_defined(&self) -> Vec<String> {
        self.root
            .children_named("user_defined")
            .map(|e| e.text().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Whether connections should be simulated.
    ///
    /// [`DEMO_MODE_ENV`] takes precedence over the `<demo_mode>` element.
    pub fn demo_mode(&self) -> bool {
        if let Ok(value) = std::env::var(DEMO_MODE_ENV) {
            match parse_bool(&value) {
                Some(demo) => return demo,
                None => warn!("Ignoring {}={:?}, expected a boolean", DEMO_MODE_ENV, value),
            }
        }
        self.value("demo_mode").and_then(parse_bool).unwrap_or(false)
    }

    /// The database sources, resolved against the configuration's directory
    pub fn sources(&self) -> Result<Vec<SourceSpec>, DatabaseError> {
        let base = self.path.parent().unwrap_or_else(|| Path::new(""));
        let sources: Vec<SourceSpec> = self
            .root
            .children_named("path")
            .filter(|e| !e.text().is_empty())
            .map(|e| SourceSpec {
                path: base.join(e.text()),
                sheet: e.attribute("sheet").map(str::to_string),
            })
            .collect();
        if sources.is_empty() {
            return Err(DatabaseError::MissingPath(self.path.display().to_string()));
        }
        Ok(sources)
    }

    /// The `<equipment>` selections, in document order
    pub fn selections(&self) -> Vec<Selection> {
        self.root
            .children_named("equipment")
            .map(|e| {
                let mut filters: Vec<(String, String)> = e
                    .attributes
                    .iter()
                    .filter(|(k, _)| k != "alias")
                    .cloned()
                    .collect();
                if !e.text().is_empty() && !filters.iter().any(|(k, _)| k == "model") {
                    filters.push(("model".to_string(), e.text().to_string()));
                }
                Selection {
                    alias: e.attribute("alias").map(str::to_string),
                    filters,
                }
            })
            .collect()
    }

    /// Load the equipment database this configuration describes
    pub fn database(&self) -> Result<Database, DatabaseError> {
        let sources = self.sources()?;
        Database::build(
            &self.path,
            &sources,
            &self.selections(),
            &self.user_defined(),
        )
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
