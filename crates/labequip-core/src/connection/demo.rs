//! Demo Mode - simulated equipment for running without hardware
//!
//! A [`DemoResource`] accepts every write and logs it. Messages ending in `?`
//! queue a reply: `*IDN?` answers with the record's identity, anything else
//! with [`DEMO_REPLY`].

use super::{ConnectionError, Resource};
use crate::record::EquipmentRecord;
use std::collections::VecDeque;
use tracing::info;

/// Reply to any query other than `*IDN?`
pub const DEMO_REPLY: &str = "0";

/// Simulated connection to a piece of equipment
#[derive(Debug, Clone)]
pub struct DemoResource {
    record: EquipmentRecord,
    class: String,
    written: Vec<String>,
    replies: VecDeque<String>,
    connected: bool,
}

impl DemoResource {
    /// Simulate `record`, reporting `class` as the class name
    pub fn new(record: EquipmentRecord, class: &str) -> Self {
        Self {
            record,
            class: class.to_string(),
            written: Vec::new(),
            replies: VecDeque::new(),
            connected: true,
        }
    }

    /// Messages written so far, oldest first
    pub fn written(&self) -> &[String] {
        &self.written
    }

    fn identity(&self) -> String {
        format!(
            "{},{},{},demo",
            self.record.manufacturer(),
            self.record.model(),
            self.record.serial()
        )
    }
}

impl Resource for DemoResource {
    fn record(&self) -> &EquipmentRecord {
        &self.record
    }

    fn class_name(&self) -> &str {
        &self.class
    }

    fn write(&mut self, message: &str) -> Result<usize, ConnectionError> {
        if !self.connected {
            return Err(ConnectionError::Closed);
        }
        info!("[demo] {}.write({:?})", self.class, message);
        let trimmed = message.trim_end();
        if trimmed.ends_with('?') {
            let reply = if trimmed.eq_ignore_ascii_case("*IDN?") {
                self.identity()
            } else {
                DEMO_REPLY.to_string()
            };
            self.replies.push_back(reply);
        }
        self.written.push(message.to_string());
        Ok(message.len())
    }

    fn read(&mut self) -> Result<String, ConnectionError> {
        if !self.connected {
            return Err(ConnectionError::Closed);
        }
        let reply = self.replies.pop_front().ok_or(ConnectionError::Timeout)?;
        info!("[demo] {}.read() -> {:?}", self.class, reply);
        Ok(reply)
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        if self.connected {
            info!("[demo] {}.disconnect()", self.class);
            self.connected = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resource() -> DemoResource {
        let record = EquipmentRecord::from_fields([
            ("manufacturer", "Keysight"),
            ("model", "34465A"),
            ("serial", "MY5"),
        ])
        .unwrap();
        DemoResource::new(record, "Demo")
    }

    #[test]
    fn test_queries_are_answered() {
        let mut demo = resource();
        assert_eq!(demo.query("*IDN?").unwrap(), "Keysight,34465A,MY5,demo");
        assert_eq!(demo.query("MEAS:VOLT:DC?").unwrap(), DEMO_REPLY);
        demo.write("*RST").unwrap();
        assert!(matches!(demo.read(), Err(ConnectionError::Timeout)));
        assert_eq!(demo.written(), ["*IDN?", "MEAS:VOLT:DC?", "*RST"]);
    }

    #[test]
    fn test_closed_after_disconnect() {
        let mut demo = resource();
        demo.disconnect().unwrap();
        assert!(matches!(demo.write("*RST"), Err(ConnectionError::Closed)));
    }
}
