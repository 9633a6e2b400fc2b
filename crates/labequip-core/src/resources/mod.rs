//! Resource class resolution
//!
//! Maps a connection record's manufacturer and model to the resource class that
//! drives it. Entries are checked in order and the first whose manufacturer and
//! model patterns both match wins. Patterns are case-insensitive and anchored by
//! the entry itself, so legal-suffix variants such as "Thorlabs Inc." are
//! covered by a `^Thorlabs` manufacturer pattern.
//!
//! ```rust,ignore
//! use labequip_core::prelude::*;
//!
//! let record = ConnectionRecord::from_fields([
//!     ("manufacturer", "Thorlabs Inc."),
//!     ("model", "FW212CNEB"),
//!     ("backend", "MSL"),
//!     ("address", "SDK::FilterWheel102.dll"),
//! ])?;
//! let class = find_resource_class(&record).unwrap();
//! assert_eq!(class.name, "FilterWheelXX2C");
//! ```

use crate::connection::{open_transport, ConnectionError, Resource};
use crate::constants::{Backend, Interface};
use crate::record::{ConnectionRecord, EquipmentRecord};
use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// A resource class: the driver for a family of equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceClass {
    /// Class name, e.g. `PicoScope5000A`
    pub name: &'static str,
    /// Vendor module the class belongs to, e.g. `picotech.picoscope`
    pub module: &'static str,
    /// Transport the class talks through
    pub interface: Interface,
}

impl ResourceClass {
    /// Describe a class
    pub const fn new(name: &'static str, module: &'static str, interface: Interface) -> Self {
        Self {
            name,
            module,
            interface,
        }
    }

    /// Open the class's transport for a record
    pub fn connect(&self, record: &EquipmentRecord) -> Result<Box<dyn Resource>, ConnectionError> {
        open_transport(record, self.interface, self.name)
    }
}

/// One row of a [`ResourceTable`]
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    manufacturer: Regex,
    model: Regex,
    class: ResourceClass,
}

impl ResourceEntry {
    /// Compile an entry; both patterns are case-insensitive
    pub fn new(manufacturer: &str, model: &str, class: ResourceClass) -> Result<Self, regex::Error> {
        Ok(Self {
            manufacturer: compile(manufacturer)?,
            model: compile(model)?,
            class,
        })
    }

    /// Whether both patterns match the (trimmed) strings
    pub fn matches(&self, manufacturer: &str, model: &str) -> bool {
        self.manufacturer.is_match(manufacturer.trim()) && self.model.is_match(model.trim())
    }

    /// Class this entry resolves to
    pub fn class(&self) -> ResourceClass {
        self.class
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Ordered manufacturer/model patterns mapped to resource classes
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    entries: Vec<ResourceEntry>,
}

impl ResourceTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; it is checked after every existing entry
    pub fn push(
        &mut self,
        manufacturer: &str,
        model: &str,
        class: ResourceClass,
    ) -> Result<(), regex::Error> {
        self.entries
            .push(ResourceEntry::new(manufacturer, model, class)?);
        Ok(())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in match order
    pub fn entries(&self) -> &[ResourceEntry] {
        &self.entries
    }

    /// First class matching the record's manufacturer and model.
    ///
    /// Only records using the MSL backend resolve to a class.
    pub fn find(&self, record: &ConnectionRecord) -> Option<ResourceClass> {
        if record.backend() != Backend::Msl {
            return None;
        }
        self.find_by_name(record.manufacturer(), record.model())
    }

    /// First class matching a manufacturer and model, ignoring the backend
    pub fn find_by_name(&self, manufacturer: &str, model: &str) -> Option<ResourceClass> {
        self.entries
            .iter()
            .find(|entry| entry.matches(manufacturer, model))
            .map(ResourceEntry::class)
    }
}

const PICO_MANUFACTURER: &str = r"^Pico\s*Tech";
const THORLABS_MANUFACTURER: &str = r"^Thorlabs";

const BUILTIN: &[(&str, &str, ResourceClass)] = &[
    (
        r"^Bentham",
        r"^D?TMc300$",
        ResourceClass::new("Bentham", "bentham.benhw64", Interface::Sdk),
    ),
    (
        r"^(CMI|Czech\s+Metrology\s+Institute)$",
        r"^SIA3$",
        ResourceClass::new("SIA3", "cmi.sia3", Interface::Sdk),
    ),
    (
        r"^OMEGA",
        r"^iTHX-(W3|D3|SD|M|W|2)$",
        ResourceClass::new("iTHX", "omega.ithx", Interface::Tcpip),
    ),
    (
        PICO_MANUFACTURER,
        r"^(PicoScope\s*)?(2104|2105|2202|2203|2204A?|2205A?)$",
        ResourceClass::new("PicoScope2000", "picotech.picoscope.ps2000", Interface::Sdk),
    ),
    (
        PICO_MANUFACTURER,
        r"^(PicoScope\s*)?(2205A?\s*MSO|220[678][AB]?(\s*MSO)?|2405A|240[678]B)$",
        ResourceClass::new("PicoScope2000A", "picotech.picoscope.ps2000a", Interface::Sdk),
    ),
    (
        PICO_MANUFACTURER,
        r"^(PicoScope\s*)?(320[456]|3224|342[45])$",
        ResourceClass::new("PicoScope3000", "picotech.picoscope.ps3000", Interface::Sdk),
    ),
    (
        PICO_MANUFACTURER,
        r"^(PicoScope\s*)?(320[3-6]D(\s*MSO)?|340[3-6]D(\s*MSO)?|320[4-7][AB]|320[4-6]\s*MSO|340[4-6][AB])$",
        ResourceClass::new("PicoScope3000A", "picotech.picoscope.ps3000a", Interface::Sdk),
    ),
    (
        PICO_MANUFACTURER,
        r"^(PicoScope\s*)?(4224(\s*IEPE)?|4262|4424)$",
        ResourceClass::new("PicoScope4000", "picotech.picoscope.ps4000", Interface::Sdk),
    ),
    (
        PICO_MANUFACTURER,
        r"^(PicoScope\s*)?(4444|4824)$",
        ResourceClass::new("PicoScope4000A", "picotech.picoscope.ps4000a", Interface::Sdk),
    ),
    (
        PICO_MANUFACTURER,
        r"^(PicoScope\s*)?(5000|520[34])$",
        ResourceClass::new("PicoScope5000", "picotech.picoscope.ps5000", Interface::Sdk),
    ),
    (
        PICO_MANUFACTURER,
        r"^(PicoScope\s*)?(524[2-4]|544[2-4])[AB]$",
        ResourceClass::new("PicoScope5000A", "picotech.picoscope.ps5000a", Interface::Sdk),
    ),
    (
        PICO_MANUFACTURER,
        r"^(PicoScope\s*)?(6407|640[2-4][CD])$",
        ResourceClass::new("PicoScope6000", "picotech.picoscope.ps6000", Interface::Sdk),
    ),
    (
        THORLABS_MANUFACTURER,
        r"^(FW102C|FW212C)(NEB)?$",
        ResourceClass::new("FilterWheelXX2C", "thorlabs.fwxx2c", Interface::Sdk),
    ),
    (
        THORLABS_MANUFACTURER,
        r"^BSC(10[123]|20[123])$",
        ResourceClass::new(
            "BenchtopStepperMotor",
            "thorlabs.kinesis.benchtop_stepper_motor",
            Interface::Sdk,
        ),
    ),
    (
        THORLABS_MANUFACTURER,
        r"^MFF10[12](/M)?$",
        ResourceClass::new("FilterFlipper", "thorlabs.kinesis.filter_flipper", Interface::Sdk),
    ),
    (
        THORLABS_MANUFACTURER,
        r"^(LTS(150|300)|MLJ(050|150)|K10CR1)(/M)?$",
        ResourceClass::new(
            "IntegratedStepperMotors",
            "thorlabs.kinesis.integrated_stepper_motors",
            Interface::Sdk,
        ),
    ),
    (
        THORLABS_MANUFACTURER,
        r"^KDC101$",
        ResourceClass::new("KCubeDCServo", "thorlabs.kinesis.kcube_dc_servo", Interface::Sdk),
    ),
    (
        THORLABS_MANUFACTURER,
        r"^KSC101$",
        ResourceClass::new("KCubeSolenoid", "thorlabs.kinesis.kcube_solenoid", Interface::Sdk),
    ),
    (
        THORLABS_MANUFACTURER,
        r"^KST101$",
        ResourceClass::new(
            "KCubeStepperMotor",
            "thorlabs.kinesis.kcube_stepper_motor",
            Interface::Sdk,
        ),
    ),
    (
        r"^(Opto\s*Sigma|Sigma\s*Koki)",
        r"^SHOT-?702$",
        ResourceClass::new("SHOT702", "optosigma.shot702", Interface::Serial),
    ),
];

/// The built-in table, compiled on first use
pub fn builtin() -> &'static ResourceTable {
    static TABLE: OnceLock<ResourceTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = ResourceTable::new();
        for (manufacturer, model, class) in BUILTIN {
            if let Err(e) = table.push(manufacturer, model, *class) {
                warn!("Skipping resource class {}: {}", class.name, e);
            }
        }
        debug!("Registered {} resource classes", table.len());
        table
    })
}

/// Resolve a connection record against the built-in table.
///
/// `None` is a normal outcome: the record uses another backend, or no class is
/// registered for its manufacturer and model.
pub fn find_resource_class(record: &ConnectionRecord) -> Option<ResourceClass> {
    builtin().find(record)
}
