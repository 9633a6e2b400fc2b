//! End-to-end tests: configuration -> database -> resource class -> connection.

use labequip_core::config::Config;
use labequip_core::connection::{connect, ConnectionError};
use labequip_core::constants::Interface;
use labequip_core::database::Database;
use labequip_core::query::Filters;
use labequip_core::resources::find_resource_class;
use pretty_assertions::assert_eq;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;

fn write_database(dir: &Path, equipment: &str) -> Database {
    fs::write(dir.join("equipment.xml"), equipment).unwrap();
    let config = dir.join("config.xml");
    fs::write(
        &config,
        "<labequip><path>equipment.xml</path><demo_mode>false</demo_mode></labequip>",
    )
    .unwrap();
    Database::load(&config).unwrap()
}

#[test]
fn test_filter_wheel_resolves_and_opens() {
    let dir = tempfile::tempdir().unwrap();
    let library = dir.path().join("FilterWheel102_win64.dll");
    fs::write(&library, b"").unwrap();

    let db = write_database(
        dir.path(),
        &format!(
            r#"<equipment>
                 <manufacturer>Thorlabs Inc.</manufacturer>
                 <model>FW212CNEB</model>
                 <serial>TP1</serial>
                 <connection>
                   <address>SDK::{}</address>
                   <backend>MSL</backend>
                 </connection>
               </equipment>"#,
            library.display()
        ),
    );
    assert_eq!(db.len(), 1);

    let record = db.iter().next().unwrap();
    let connection = record.connection().unwrap();
    assert_eq!(connection.interface(), Interface::Sdk);
    assert_eq!(
        find_resource_class(connection).map(|c| c.name),
        Some("FilterWheelXX2C")
    );

    let mut resource = record.connect(false).unwrap();
    assert_eq!(resource.class_name(), "FilterWheelXX2C");
    assert_eq!(resource.record().serial(), "TP1");
    assert!(matches!(
        resource.write("pos=1"),
        Err(ConnectionError::Unsupported { .. })
    ));
    resource.disconnect().unwrap();
}

#[test]
fn test_sdk_library_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("lib").join("ps5000a.so");
    let db = write_database(
        dir.path(),
        &format!(
            r#"<equipment>
                 <manufacturer>Pico Technology</manufacturer>
                 <model>5244B</model>
                 <connection>
                   <address>SDK::{}</address>
                   <backend>MSL</backend>
                 </connection>
               </equipment>"#,
            missing.display()
        ),
    );
    let record = db.iter().next().unwrap();
    let err = record.connect(false).unwrap_err();
    assert!(matches!(err, ConnectionError::LibraryNotFound(_)), "{err}");
}

#[test]
fn test_generic_socket_transport() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut writer = stream.try_clone().unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        reader.read_until(b'\r', &mut line).unwrap();
        assert_eq!(line, b"*IDN?\r");
        writer.write_all(b"ACME,DMM-1,42,1.0\r").unwrap();
    });

    let dir = tempfile::tempdir().unwrap();
    let db = write_database(
        dir.path(),
        &format!(
            r#"<equipment_database>
                 <equipment>
                   <manufacturer>ACME</manufacturer>
                   <model>DMM-1</model>
                   <serial>42</serial>
                   <connection>
                     <address>TCPIP::127.0.0.1::{port}</address>
                     <backend>MSL</backend>
                     <properties>termination=CR; timeout=5</properties>
                   </connection>
                 </equipment>
               </equipment_database>"#
        ),
    );

    let records = db.records(&Filters::new().with("model", "DMM-1")).unwrap();
    let mut resource = connect(records[0], false).unwrap();
    assert_eq!(resource.class_name(), "Socket");
    assert_eq!(resource.query("*IDN?").unwrap(), "ACME,DMM-1,42,1.0");
    resource.disconnect().unwrap();
    server.join().unwrap();
}

#[test]
fn test_demo_mode_from_config() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("equipment.xml"),
        r#"<equipment>
             <manufacturer>OMEGA</manufacturer>
             <model>iTHX-W3</model>
             <serial>OM01</serial>
             <connection>
               <address>TCPIP::192.0.2.1::2000</address>
               <backend>MSL</backend>
             </connection>
           </equipment>"#,
    )
    .unwrap();
    let path = dir.path().join("config.xml");
    fs::write(
        &path,
        r#"<labequip>
             <path>equipment.xml</path>
             <equipment alias="ithx">iTHX</equipment>
             <demo_mode>true</demo_mode>
           </labequip>"#,
    )
    .unwrap();

    let config = Config::new(&path).unwrap();
    let db = config.database().unwrap();
    let ithx = db.equipment().get("ithx").unwrap();

    let mut resource = ithx.connect(config.demo_mode()).unwrap();
    assert_eq!(resource.class_name(), "iTHX");
    assert_eq!(resource.query("*IDN?").unwrap(), "OMEGA,iTHX-W3,OM01,demo");
}

#[test]
fn test_unsupported_backend_and_interface() {
    let dir = tempfile::tempdir().unwrap();
    let db = write_database(
        dir.path(),
        r#"<equipment_database>
             <equipment>
               <manufacturer>Keithley</manufacturer>
               <model>2002</model>
               <connection>
                 <address>GPIB::16</address>
                 <backend>PyVISA</backend>
               </connection>
             </equipment>
             <equipment>
               <manufacturer>Keithley</manufacturer>
               <model>6221</model>
               <connection>
                 <address>GPIB::12</address>
                 <backend>MSL</backend>
               </connection>
             </equipment>
             <equipment>
               <manufacturer>Keithley</manufacturer>
               <model>2400</model>
             </equipment>
           </equipment_database>"#,
    );
    let get = |model: &str| {
        db.records(&Filters::new().with("model", format!("^{model}$")))
            .unwrap()[0]
            .clone()
    };

    assert!(matches!(
        get("2002").connect(false),
        Err(ConnectionError::UnsupportedBackend { .. })
    ));
    assert!(matches!(
        get("6221").connect(false),
        Err(ConnectionError::UnsupportedInterface { interface: Interface::Gpib, .. })
    ));
    assert!(matches!(
        get("2400").connect(false),
        Err(ConnectionError::NoConnection(_))
    ));
}
