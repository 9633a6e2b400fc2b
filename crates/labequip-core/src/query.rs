//! Attribute filters over equipment and connection records.
//!
//! A [`Filters`] set names record attributes and gives each a [`Criterion`].
//! All filters must hold for a record to be selected. Matching rules:
//!
//! | Criterion | Text attribute | Enum attribute | `connection` | Date / number |
//! |-----------|----------------|----------------|--------------|---------------|
//! | pattern   | regex search   | regex search on the member name, any case | non-empty pattern = has connection | regex search on the text form |
//! | bool/int  | int: substring; bool: non-empty | int: member value; bool: nonzero value | truthiness = has connection | presence |
//! | enum      | never          | same member    | never        | never         |
//! | predicate | called with the native value, everywhere |||
//!
//! Filter names that are not attributes of the record type fail with a
//! name error, except the pass-through names in [`PASS_THROUGH_FILTERS`].

use crate::constants::{Backend, Interface};
use crate::database::DatabaseError;
use crate::record::{
    ConnectionField, ConnectionRecord, EquipmentField, EquipmentRecord, Properties,
};
use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Filter names accepted by every query without matching any attribute
pub const PASS_THROUGH_FILTERS: &[&str] = &["flags"];

/// Borrowed view of one record attribute, as handed to predicates
#[derive(Debug, Clone, Copy)]
pub enum FieldRef<'a> {
    /// A text attribute
    Text(&'a str),
    /// `date_calibrated`
    Date(Option<NaiveDate>),
    /// `calibration_cycle`
    Number(Option<f64>),
    /// Backend of the connection
    Backend(Backend),
    /// Interface of the connection
    Interface(Interface),
    /// The connection, if any
    Connection(Option<&'a ConnectionRecord>),
    /// Connection properties
    Properties(&'a Properties),
    /// User-defined fields
    UserDefined(&'a BTreeMap<String, String>),
}

type Predicate = Arc<dyn Fn(&FieldRef<'_>) -> bool + Send + Sync>;

/// What a single filter requires of an attribute
#[derive(Clone)]
pub enum Criterion {
    /// Regular expression, matched with search semantics
    Pattern(String),
    /// Truth value
    Bool(bool),
    /// Integer; nonzero is true where a truth value is expected
    Int(i64),
    /// Backend of the connection
    Backend(Backend),
    /// Interface of the connection
    Interface(Interface),
    /// Arbitrary test of the native attribute value
    Predicate(Predicate),
}

impl Criterion {
    /// A test of the native attribute value
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&FieldRef<'_>) -> bool + Send + Sync + 'static,
    {
        Criterion::Predicate(Arc::new(f))
    }

    /// A test of a date attribute; records without a date never match
    pub fn date<F>(f: F) -> Self
    where
        F: Fn(NaiveDate) -> bool + Send + Sync + 'static,
    {
        Self::predicate(move |value| matches!(value, FieldRef::Date(Some(d)) if f(*d)))
    }
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Pattern(p) => f.debug_tuple("Pattern").field(p).finish(),
            Criterion::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Criterion::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Criterion::Backend(b) => f.debug_tuple("Backend").field(b).finish(),
            Criterion::Interface(i) => f.debug_tuple("Interface").field(i).finish(),
            Criterion::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Criterion {
    fn from(s: &str) -> Self {
        Criterion::Pattern(s.to_string())
    }
}

impl From<String> for Criterion {
    fn from(s: String) -> Self {
        Criterion::Pattern(s)
    }
}

impl From<bool> for Criterion {
    fn from(b: bool) -> Self {
        Criterion::Bool(b)
    }
}

impl From<i64> for Criterion {
    fn from(i: i64) -> Self {
        Criterion::Int(i)
    }
}

impl From<i32> for Criterion {
    fn from(i: i32) -> Self {
        Criterion::Int(i64::from(i))
    }
}

impl From<Backend> for Criterion {
    fn from(b: Backend) -> Self {
        Criterion::Backend(b)
    }
}

impl From<Interface> for Criterion {
    fn from(i: Interface) -> Self {
        Criterion::Interface(i)
    }
}

/// A conjunction of named filters
#[derive(Debug, Clone, Default)]
pub struct Filters {
    entries: Vec<(String, Criterion)>,
}

impl Filters {
    /// No filters; selects everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter on the attribute `name`
    pub fn with(mut self, name: impl Into<String>, criterion: impl Into<Criterion>) -> Self {
        self.entries.push((name.into(), criterion.into()));
        self
    }

    /// Whether no filter was added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of filters
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A record type the query engine can filter
pub(crate) trait Queryable {
    const KIND: &'static str;

    fn has_field(name: &str) -> bool;

    /// Attributes matched case-insensitively against an enum member name
    fn is_enum_field(_name: &str) -> bool {
        false
    }

    /// Attributes whose pattern criterion tests presence instead of text
    fn is_presence_field(_name: &str) -> bool {
        false
    }

    fn field(&self, name: &str) -> Option<FieldRef<'_>>;
}

impl Queryable for EquipmentRecord {
    const KIND: &'static str = EquipmentRecord::KIND;

    fn has_field(name: &str) -> bool {
        EquipmentField::from_name(name).is_some()
    }

    fn is_presence_field(name: &str) -> bool {
        name == EquipmentField::Connection.name()
    }

    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        let field = EquipmentField::from_name(name)?;
        Some(match field {
            EquipmentField::Connection => FieldRef::Connection(self.connection()),
            EquipmentField::CalibrationCycle => FieldRef::Number(self.calibration_cycle()),
            EquipmentField::DateCalibrated => FieldRef::Date(self.date_calibrated()),
            EquipmentField::UserDefined => FieldRef::UserDefined(self.user_defined()),
            text => FieldRef::Text(self.text_field(text)?),
        })
    }
}

impl Queryable for ConnectionRecord {
    const KIND: &'static str = ConnectionRecord::KIND;

    fn has_field(name: &str) -> bool {
        ConnectionField::from_name(name).is_some()
    }

    fn is_enum_field(name: &str) -> bool {
        name == ConnectionField::Backend.name() || name == ConnectionField::Interface.name()
    }

    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        Some(match ConnectionField::from_name(name)? {
            ConnectionField::Address => FieldRef::Text(self.address()),
            ConnectionField::Backend => FieldRef::Backend(self.backend()),
            ConnectionField::Interface => FieldRef::Interface(self.interface()),
            ConnectionField::Manufacturer => FieldRef::Text(self.manufacturer()),
            ConnectionField::Model => FieldRef::Text(self.model()),
            ConnectionField::Properties => FieldRef::Properties(self.properties()),
            ConnectionField::Serial => FieldRef::Text(self.serial()),
        })
    }
}

enum Test {
    Pattern(Regex),
    Truth { value: bool, int: Option<i64> },
    /// Backend of the connection
    Backend(Backend),
    /// Interface of the connection
    Interface(Interface),
    Predicate(Predicate),
}

struct CompiledFilter {
    name: String,
    test: Test,
}

fn compile<T: Queryable>(filters: &Filters) -> Result<Vec<CompiledFilter>, DatabaseError> {
    let mut compiled = Vec::with_capacity(filters.len());
    for (name, criterion) in &filters.entries {
        if PASS_THROUGH_FILTERS.contains(&name.as_str()) {
            continue;
        }
        if !T::has_field(name) {
            return Err(DatabaseError::UnknownFilter {
                record: T::KIND,
                name: name.clone(),
            });
        }
        let test = match criterion {
            Criterion::Pattern(p) if T::is_presence_field(name) => Test::Truth {
                value: !p.is_empty(),
                int: None,
            },
            Criterion::Pattern(p) => Test::Pattern(
                RegexBuilder::new(p)
                    .case_insensitive(T::is_enum_field(name))
                    .build()
                    .map_err(|e| DatabaseError::InvalidPattern {
                        field: name.clone(),
                        message: e.to_string(),
                    })?,
            ),
            Criterion::Bool(b) => Test::Truth {
                value: *b,
                int: None,
            },
            Criterion::Int(i) => Test::Truth {
                value: *i != 0,
                int: Some(*i),
            },
            Criterion::Backend(b) => Test::Backend(*b),
            Criterion::Interface(i) => Test::Interface(*i),
            Criterion::Predicate(f) => Test::Predicate(Arc::clone(f)),
        };
        compiled.push(CompiledFilter {
            name: name.clone(),
            test,
        });
    }
    Ok(compiled)
}

fn matches(value: &FieldRef<'_>, test: &Test) -> bool {
    match (value, test) {
        (_, Test::Predicate(f)) => f(value),

        (FieldRef::Text(s), Test::Pattern(re)) => re.is_match(s),
        (FieldRef::Text(s), Test::Truth { int: Some(i), .. }) => s.contains(&i.to_string()),
        (FieldRef::Text(s), Test::Truth { value, int: None }) => !s.is_empty() == *value,

        (FieldRef::Date(d), Test::Pattern(re)) => d.is_some_and(|d| re.is_match(&d.to_string())),
        (FieldRef::Date(d), Test::Truth { value, .. }) => d.is_some() == *value,

        (FieldRef::Number(n), Test::Pattern(re)) => n.is_some_and(|n| re.is_match(&n.to_string())),
        (FieldRef::Number(n), Test::Truth { int: Some(i), .. }) => *n == Some(*i as f64),
        (FieldRef::Number(n), Test::Truth { value, int: None }) => n.is_some() == *value,

        (FieldRef::Backend(b), Test::Pattern(re)) => re.is_match(b.name()),
        (FieldRef::Backend(b), Test::Truth { int: Some(i), .. }) => b.value() == *i,
        (FieldRef::Backend(b), Test::Truth { value, int: None }) => (b.value() != 0) == *value,
        (FieldRef::Backend(b), Test::Backend(c)) => b == c,

        (FieldRef::Interface(v), Test::Pattern(re)) => re.is_match(v.name()),
        (FieldRef::Interface(v), Test::Truth { int: Some(i), .. }) => v.value() == *i,
        (FieldRef::Interface(v), Test::Truth { value, int: None }) => (v.value() != 0) == *value,
        (FieldRef::Interface(v), Test::Interface(c)) => v == c,

        (FieldRef::Connection(c), Test::Truth { value, .. }) => c.is_some() == *value,

        (FieldRef::Properties(p), Test::Pattern(re)) => p
            .iter()
            .any(|(k, v)| re.is_match(&format!("{k}={v}"))),
        (FieldRef::Properties(p), Test::Truth { value, .. }) => !p.is_empty() == *value,

        (FieldRef::UserDefined(u), Test::Pattern(re)) => u
            .iter()
            .any(|(k, v)| re.is_match(&format!("{k}={v}"))),
        (FieldRef::UserDefined(u), Test::Truth { value, .. }) => !u.is_empty() == *value,

        _ => false,
    }
}

/// Select the items that satisfy every filter, preserving order
pub(crate) fn select<'a, T, I>(items: I, filters: &Filters) -> Result<Vec<&'a T>, DatabaseError>
where
    T: Queryable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let compiled = compile::<T>(filters)?;
    Ok(items
        .into_iter()
        .filter(|item| {
            compiled.iter().all(|filter| {
                item.field(&filter.name)
                    .is_some_and(|value| matches(&value, &filter.test))
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ErrorKind;
    use chrono::Datelike;

    fn records() -> Vec<EquipmentRecord> {
        let connected = |man: &str, model: &str, backend: &str, address: &str| {
            EquipmentRecord::from_fields([("manufacturer", man), ("model", model)])
                .unwrap()
                .with_connection(
                    ConnectionRecord::from_fields([("backend", backend), ("address", address)])
                        .unwrap(),
                )
        };
        vec![
            connected("Agilent", "34465A", "MSL", "COM3"),
            connected("Hewlett Packard", "3458A", "PyVISA", "GPIB0::22::INSTR"),
            connected("Thorlabs", "FW212C", "MSL", "SDK::fw.dll"),
            EquipmentRecord::from_fields([
                ("manufacturer", "Agilent"),
                ("model", "83640L"),
                ("date_calibrated", "2010-05-01"),
            ])
            .unwrap(),
            EquipmentRecord::from_fields([("manufacturer", "Fluke"), ("model", "712ae")]).unwrap(),
        ]
    }

    fn count(records: &[EquipmentRecord], filters: Filters) -> usize {
        select(records.iter(), &filters).unwrap().len()
    }

    #[test]
    fn test_pattern_uses_search_semantics() {
        let records = records();
        assert_eq!(count(&records, Filters::new()), 5);
        assert_eq!(count(&records, Filters::new().with("manufacturer", "^Ag")), 2);
        assert_eq!(count(&records, Filters::new().with("manufacturer", "ent")), 2);
        assert_eq!(count(&records, Filters::new().with("manufacturer", "agilent")), 0);
        assert_eq!(
            count(&records, Filters::new().with("manufacturer", "H.*P|^Ag")),
            3
        );
        assert_eq!(
            count(
                &records,
                Filters::new().with("manufacturer", "Agilent").with("model", "83640L")
            ),
            1
        );
    }

    #[test]
    fn test_connection_truth_encodings_agree() {
        let records = records();
        let with = [
            Criterion::Bool(true),
            Criterion::Int(1),
            Criterion::from("anything"),
        ];
        let without = [Criterion::Bool(false), Criterion::Int(0), Criterion::from("")];
        for c in with {
            assert_eq!(count(&records, Filters::new().with("connection", c)), 3);
        }
        for c in without {
            assert_eq!(count(&records, Filters::new().with("connection", c)), 2);
        }
    }

    #[test]
    fn test_date_predicate() {
        let records = records();
        let filters = Filters::new().with("date_calibrated", Criterion::date(|d| d.year() == 2010));
        assert_eq!(count(&records, filters), 1);
    }

    #[test]
    fn test_enum_filters_on_connections() {
        let records = records();
        let connections: Vec<&ConnectionRecord> =
            records.iter().filter_map(|r| r.connection()).collect();
        let run = |filters: Filters| select(connections.iter().copied(), &filters).unwrap().len();

        assert_eq!(run(Filters::new().with("backend", "MSL")), 2);
        assert_eq!(run(Filters::new().with("backend", Backend::Msl)), 2);
        assert_eq!(run(Filters::new().with("backend", "pyvisa")), 1);
        assert_eq!(run(Filters::new().with("backend", "PyVISA|MSL")), 3);
        assert_eq!(run(Filters::new().with("backend", "XXXXX")), 0);
        assert_eq!(run(Filters::new().with("interface", "SERIAL")), 1);
        assert_eq!(run(Filters::new().with("interface", Interface::Sdk)), 1);
        assert_eq!(run(Filters::new().with("interface", "SERIAL|SDK")), 2);
    }

    #[test]
    fn test_unknown_filter_name() {
        let records = records();
        let err = select(records.iter(), &Filters::new().with("unknown_name", "")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Name);
        assert!(select(records.iter(), &Filters::new().with("flags", 1)).is_ok());
    }

    #[test]
    fn test_invalid_regex_is_value_error() {
        let records = records();
        let err = select(records.iter(), &Filters::new().with("model", "(")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }
}
