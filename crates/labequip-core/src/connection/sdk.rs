//! Vendor SDK resources
//!
//! An SDK address names the vendor library, `SDK::<path>`. Opening the resource
//! only checks that the library can be found; the vendor calls themselves are
//! made by the equipment-specific driver, so message I/O is not supported here.

use super::{connection_of, ConnectionError, Resource};
use crate::record::EquipmentRecord;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(windows)]
const SEARCH_PATH_VARS: &[&str] = &["PATH"];
#[cfg(target_os = "macos")]
const SEARCH_PATH_VARS: &[&str] = &["DYLD_LIBRARY_PATH", "PATH"];
#[cfg(all(unix, not(target_os = "macos")))]
const SEARCH_PATH_VARS: &[&str] = &["LD_LIBRARY_PATH", "PATH"];

#[cfg(unix)]
const SYSTEM_LIBRARY_DIRS: &[&str] = &["/usr/local/lib", "/usr/lib", "/lib"];
#[cfg(not(unix))]
const SYSTEM_LIBRARY_DIRS: &[&str] = &[];

/// The library named by an `SDK::<path>` address
pub fn library_name(address: &str) -> Result<&str, ConnectionError> {
    let trimmed = address.trim();
    let (prefix, rest) = trimmed
        .split_once("::")
        .ok_or_else(|| ConnectionError::InvalidAddress {
            address: address.to_string(),
            message: "expected SDK::<library>".to_string(),
        })?;
    if !prefix.eq_ignore_ascii_case("SDK") || rest.trim().is_empty() {
        return Err(ConnectionError::InvalidAddress {
            address: address.to_string(),
            message: "expected SDK::<library>".to_string(),
        });
    }
    Ok(rest.trim())
}

/// Locate an SDK library file.
///
/// A name with a directory part must exist as given. A bare file name is
/// searched for in the library search path and the system library directories.
pub fn find_library(name: &str) -> Result<PathBuf, ConnectionError> {
    let path = Path::new(name);
    let has_dir = path
        .parent()
        .is_some_and(|p| !p.as_os_str().is_empty());

    if has_dir || path.is_file() {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ConnectionError::LibraryNotFound(name.to_string()))
        };
    }

    let env_dirs = SEARCH_PATH_VARS
        .iter()
        .filter_map(|var| env::var_os(var))
        .flat_map(|value| env::split_paths(&value).collect::<Vec<_>>());
    let system_dirs = SYSTEM_LIBRARY_DIRS.iter().map(PathBuf::from);

    env_dirs
        .chain(system_dirs)
        .map(|dir| dir.join(path))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConnectionError::LibraryNotFound(name.to_string()))
}

/// Equipment controlled through a vendor SDK library
#[derive(Debug)]
pub struct SdkResource {
    record: EquipmentRecord,
    class: String,
    library: PathBuf,
    connected: bool,
}

impl SdkResource {
    /// Locate the library named by the record's `SDK::` address
    pub fn open(record: &EquipmentRecord, class: &str) -> Result<Self, ConnectionError> {
        let connection = connection_of(record)?;
        let library = find_library(library_name(connection.address())?)?;
        debug!("Using SDK library {} for {}", library.display(), record);
        Ok(Self {
            record: record.clone(),
            class: class.to_string(),
            library,
            connected: true,
        })
    }

    /// Path of the vendor library
    pub fn library(&self) -> &Path {
        &self.library
    }

    fn unsupported(&self, operation: &'static str) -> ConnectionError {
        if !self.connected {
            return ConnectionError::Closed;
        }
        ConnectionError::Unsupported {
            class: self.class.clone(),
            operation,
        }
    }
}

impl Resource for SdkResource {
    fn record(&self) -> &EquipmentRecord {
        &self.record
    }

    fn class_name(&self) -> &str {
        &self.class
    }

    fn write(&mut self, _message: &str) -> Result<usize, ConnectionError> {
        Err(self.unsupported("write"))
    }

    fn read(&mut self) -> Result<String, ConnectionError> {
        Err(self.unsupported("read"))
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        if self.connected {
            debug!("Released {} ({})", self.class, self.library.display());
            self.connected = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ConnectionRecord;

    fn record(address: &str) -> EquipmentRecord {
        let connection =
            ConnectionRecord::from_fields([("address", address), ("backend", "MSL")]).unwrap();
        EquipmentRecord::from_fields([("manufacturer", "Thorlabs"), ("model", "FW212C")])
            .unwrap()
            .with_connection(connection)
    }

    #[test]
    fn test_library_name() {
        assert_eq!(library_name("SDK::FilterWheel102.dll").unwrap(), "FilterWheel102.dll");
        assert_eq!(library_name("sdk::/opt/lib/ps5000.so").unwrap(), "/opt/lib/ps5000.so");
        assert!(library_name("SDK::").is_err());
        assert!(library_name("COM4").is_err());
    }

    #[test]
    fn test_missing_library() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.so");
        let err = SdkResource::open(&record(&format!("SDK::{}", missing.display())), "X")
            .unwrap_err();
        assert!(matches!(err, ConnectionError::LibraryNotFound(_)));
    }

    #[test]
    fn test_existing_library() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("fw.so");
        std::fs::write(&lib, b"").unwrap();
        let mut resource =
            SdkResource::open(&record(&format!("SDK::{}", lib.display())), "FilterWheelXX2C")
                .unwrap();
        assert_eq!(resource.library(), lib.as_path());
        assert!(matches!(
            resource.write("x"),
            Err(ConnectionError::Unsupported { operation: "write", .. })
        ));
        resource.disconnect().unwrap();
        assert!(matches!(resource.read(), Err(ConnectionError::Closed)));
    }
}
