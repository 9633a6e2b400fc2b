//! Equipment Database
//!
//! Loads equipment records from the sources named by a configuration file and
//! answers queries over them. A database is read-only once loaded, so it may be
//! shared between threads and queried concurrently.

mod encoding;
mod error;
mod source;

pub use encoding::{decode, SourceEncoding};
pub use error::{DatabaseError, ErrorKind};
pub use source::{read_source, SourceSpec};

use crate::query::{self, Criterion, Filters};
use crate::record::{ConnectionRecord, EquipmentField, EquipmentRecord};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;

/// A configuration `<equipment>` entry selecting one record into the keyed view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Alias to expose the record under
    pub alias: Option<String>,
    /// Record attribute name and regex pattern pairs
    pub filters: Vec<(String, String)>,
}

impl Selection {
    fn describe(&self) -> String {
        let parts: Vec<String> = self
            .filters
            .iter()
            .map(|(k, v)| format!("{k}='{v}'"))
            .collect();
        format!("<equipment {}>", parts.join(" "))
    }
}

/// Equipment records loaded from one or more sources
#[derive(Debug, Clone, Default)]
pub struct Database {
    path: PathBuf,
    sources: Vec<PathBuf>,
    records: Vec<EquipmentRecord>,
    /// Keyed view: alias (or model) -> record index
    equipment: BTreeMap<String, usize>,
    /// Model numbers of aliased selections -> record index
    models: BTreeMap<String, usize>,
}

impl Database {
    /// Load the database described by a configuration file
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self, DatabaseError> {
        crate::config::Config::new(config_path)?.database()
    }

    /// Load a single database source without a configuration file
    pub fn from_source<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let spec = SourceSpec::new(path.as_ref());
        Self::build(path.as_ref(), &[spec], &[], &[])
    }

    /// Read every source, check record uniqueness, then apply the selections.
    ///
    /// No partially loaded database is ever returned.
    pub fn build(
        path: &Path,
        sources: &[SourceSpec],
        selections: &[Selection],
        user_defined: &[String],
    ) -> Result<Self, DatabaseError> {
        let path_text = path.display().to_string();
        let mut records = Vec::new();
        for spec in sources {
            records.extend(read_source(spec, user_defined)?);
        }
        check_unique(&records).map_err(|e| e.in_source(path_text.clone()))?;

        let mut db = Database {
            path: path.to_path_buf(),
            sources: sources.iter().map(|s| s.path.clone()).collect(),
            records,
            equipment: BTreeMap::new(),
            models: BTreeMap::new(),
        };
        db.apply_selections(selections)
            .map_err(|e| e.in_source(path_text.clone()))?;

        info!(
            "Loaded {} equipment records ({} selected) for {}",
            db.records.len(),
            db.equipment.len(),
            path_text
        );
        Ok(db)
    }

    fn apply_selections(&mut self, selections: &[Selection]) -> Result<(), DatabaseError> {
        let mut key_of: HashMap<usize, String> = HashMap::new();

        for selection in selections {
            let mut filters = Filters::new();
            for (name, pattern) in &selection.filters {
                if EquipmentField::from_name(name).is_none() {
                    return Err(DatabaseError::UnknownAttribute {
                        record: EquipmentRecord::KIND,
                        name: name.clone(),
                    });
                }
                filters = filters.with(name.as_str(), Criterion::Pattern(pattern.clone()));
            }

            let index = {
                let matched = query::select(self.records.iter(), &filters)?;
                match matched.as_slice() {
                    [] => return Err(DatabaseError::NoMatch(selection.describe())),
                    [one] => self
                        .records
                        .iter()
                        .position(|r| std::ptr::eq(r, *one))
                        .ok_or_else(|| DatabaseError::NoMatch(selection.describe()))?,
                    many => {
                        return Err(DatabaseError::NotUnique {
                            what: "equipment selection",
                            key: format!("{} matches {} records", selection.describe(), many.len()),
                        })
                    }
                }
            };

            let record = &self.records[index];
            let existing = record.alias();
            let alias = match selection.alias.as_deref().map(str::trim) {
                Some(a) if !a.is_empty() => {
                    if !existing.is_empty() && existing != a {
                        return Err(DatabaseError::ConflictingAliases {
                            key: record.model().to_string(),
                            first: existing.to_string(),
                            second: a.to_string(),
                        });
                    }
                    a.to_string()
                }
                _ => existing.to_string(),
            };
            let key = if alias.is_empty() {
                record.model().to_string()
            } else {
                alias.clone()
            };

            if let Some(previous) = key_of.get(&index) {
                if *previous != key {
                    return Err(DatabaseError::ConflictingAliases {
                        key: record.model().to_string(),
                        first: previous.clone(),
                        second: key,
                    });
                }
            }
            if self.equipment.contains_key(&key) {
                return Err(DatabaseError::NotUnique {
                    what: "equipment key",
                    key,
                });
            }

            let model = record.model().to_string();
            if !alias.is_empty() {
                self.records[index].set_alias(&alias);
                self.models.entry(model).or_insert(index);
            }
            key_of.insert(index, key.clone());
            self.equipment.insert(key, index);
        }
        Ok(())
    }

    /// The configuration file (or single source) this database was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The database files that were read
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is in the collection
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in source order
    pub fn iter(&self) -> impl Iterator<Item = &EquipmentRecord> {
        self.records.iter()
    }

    /// Records satisfying every filter
    pub fn records(&self, filters: &Filters) -> Result<Vec<&EquipmentRecord>, DatabaseError> {
        query::select(self.records.iter(), filters)
    }

    /// Connection records satisfying every filter
    pub fn connections(&self, filters: &Filters) -> Result<Vec<&ConnectionRecord>, DatabaseError> {
        query::select(self.records.iter().filter_map(|r| r.connection()), filters)
    }

    /// Records selected by the configuration, keyed by alias or model
    pub fn equipment(&self) -> EquipmentView<'_> {
        EquipmentView { db: self }
    }
}

/// Keyed view over the selected records.
///
/// Each record is keyed by its alias, or by its model when it has none. An
/// aliased record can also be looked up by its model.
#[derive(Debug, Clone, Copy)]
pub struct EquipmentView<'a> {
    db: &'a Database,
}

impl<'a> EquipmentView<'a> {
    /// Number of primary keys
    pub fn len(&self) -> usize {
        self.db.equipment.len()
    }

    /// Whether nothing is in the collection
    pub fn is_empty(&self) -> bool {
        self.db.equipment.is_empty()
    }

    /// Record selected under `key`, an alias or a model number
    pub fn get(&self, key: &str) -> Option<&'a EquipmentRecord> {
        self.db
            .equipment
            .get(key)
            .or_else(|| self.db.models.get(key))
            .map(|&i| &self.db.records[i])
    }

    /// Whether [`EquipmentView::get`] finds `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Primary keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.db.equipment.keys().map(String::as_str)
    }

    /// Primary keys with their records
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a EquipmentRecord)> {
        let records = &self.db.records;
        self.db
            .equipment
            .iter()
            .map(move |(k, &i)| (k.as_str(), &records[i]))
    }
}

/// Aliases, and manufacturer/model/serial triples with a serial, must be unique
fn check_unique(records: &[EquipmentRecord]) -> Result<(), DatabaseError> {
    let mut identities: HashMap<(&str, &str, &str), usize> = HashMap::new();
    let mut aliases: HashMap<&str, usize> = HashMap::new();

    for (i, record) in records.iter().enumerate() {
        if !record.serial().is_empty() {
            let identity = (record.manufacturer(), record.model(), record.serial());
            if identities.insert(identity, i).is_some() {
                return Err(DatabaseError::NotUnique {
                    what: "equipment record",
                    key: format!(
                        "{}|{}|{} appears more than once",
                        record.manufacturer(),
                        record.model(),
                        record.serial()
                    ),
                });
            }
        }
        if !record.alias().is_empty() && aliases.insert(record.alias(), i).is_some() {
            return Err(DatabaseError::NotUnique {
                what: "equipment alias",
                key: record.alias().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, &str)]) -> EquipmentRecord {
        EquipmentRecord::from_fields(fields.iter().copied()).unwrap()
    }

    fn database() -> Database {
        Database {
            records: vec![
                record(&[("manufacturer", "Fluke"), ("model", "712ae"), ("serial", "1")]),
                record(&[("manufacturer", "Agilent"), ("model", "34465A"), ("serial", "2")]),
                record(&[("manufacturer", "Agilent"), ("model", "3458A"), ("serial", "3")]),
            ],
            ..Default::default()
        }
    }

    fn select(alias: Option<&str>, filters: &[(&str, &str)]) -> Selection {
        Selection {
            alias: alias.map(str::to_string),
            filters: filters
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_keyed_by_model_and_alias() {
        let mut db = database();
        db.apply_selections(&[
            select(None, &[("model", "712ae")]),
            select(Some("dvm"), &[("model", "34465A")]),
        ])
        .unwrap();
        let equipment = db.equipment();
        assert_eq!(equipment.len(), 2);
        assert!(equipment.contains_key("712ae"));
        assert!(equipment.contains_key("dvm"));
        assert!(std::ptr::eq(
            equipment.get("dvm").unwrap(),
            equipment.get("34465A").unwrap()
        ));
        assert_eq!(equipment.get("dvm").unwrap().alias(), "dvm");
    }

    #[test]
    fn test_selection_errors() {
        let mut db = database();
        let err = db
            .apply_selections(&[select(None, &[("colour", "red")])])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Attribute);
        assert!(err.to_string().contains("attributes"));

        let err = db
            .apply_selections(&[select(None, &[("manufacturer", "Agilent")])])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Attribute);
        assert!(err.to_string().contains("unique"));

        let mut db = database();
        let err = db
            .apply_selections(&[
                select(Some("a"), &[("model", "712ae")]),
                select(Some("b"), &[("model", "712ae")]),
            ])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert!(err.to_string().contains("aliases"));
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let records = vec![
            record(&[("manufacturer", "Fluke"), ("model", "712ae"), ("serial", "1")]),
            record(&[("manufacturer", "Fluke"), ("model", "712ae"), ("serial", "1")]),
        ];
        let err = check_unique(&records).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Attribute);
        assert!(err.to_string().contains("unique"));
    }
}
