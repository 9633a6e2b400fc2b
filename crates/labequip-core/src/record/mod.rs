//! Equipment and connection records
//!
//! Value types built by the database loader. Each record type has a fixed set
//! of attribute names; constructing a record from an unknown name is an
//! attribute error that names the offending attribute.

mod connection;
mod equipment;
mod property;

pub use connection::{ConnectionField, ConnectionRecord};
pub use equipment::{EquipmentField, EquipmentRecord};
pub use property::{Properties, PropertyValue};
