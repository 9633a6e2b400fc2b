//! # LabEquip Core Library
//!
//! Equipment registry and connection layer for laboratory instruments.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Equipment databases loaded from XML, CSV/TSV and spreadsheet files
//! - Typed equipment and connection records with dict/XML round-trips
//! - Attribute-filtered queries over records and their connections
//! - Resolution of a record's manufacturer/model to a resource class
//! - Serial, TCP socket, vendor-SDK and demo connections
//!
//! ## Example
//!
//! ```rust,ignore
//! use labequip_core::prelude::*;
//!
//! let db = Config::new("config.xml")?.database()?;
//!
//! // Every Keysight record that has a connection
//! let found = db.records(
//!     &Filters::new()
//!         .with("manufacturer", "Keysight")
//!         .with("connection", true),
//! )?;
//!
//! // A record selected by the configuration
//! let dmm = db.equipment().get("dmm").unwrap();
//! let mut resource = dmm.connect(false)?;
//! println!("{}", resource.query("*IDN?")?);
//! resource.disconnect()?;
//! ```

/// XML configuration entry point
pub mod config;
/// Resources and the connection factory
pub mod connection;
/// Backend, interface and serial-line enumerations
pub mod constants;
/// Equipment databases and their errors
pub mod database;
/// Attribute filters
pub mod query;
/// Equipment and connection records
pub mod record;
/// Manufacturer/model to resource class resolution
pub mod resources;

mod xml;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::connection::{connect, ConnectionError, Resource};
    pub use crate::constants::{Backend, DataBits, Interface, Parity, StopBits};
    pub use crate::database::{Database, DatabaseError, EquipmentView, ErrorKind};
    pub use crate::query::{Criterion, FieldRef, Filters};
    pub use crate::record::{ConnectionRecord, EquipmentRecord, Properties, PropertyValue};
    pub use crate::resources::{find_resource_class, ResourceClass, ResourceTable};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
