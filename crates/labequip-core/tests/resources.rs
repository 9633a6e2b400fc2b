//! Tests for resolving connection records to resource classes.

use labequip_core::constants::{Backend, Interface};
use labequip_core::record::ConnectionRecord;
use labequip_core::resources::{builtin, find_resource_class, ResourceClass, ResourceTable};

fn record(manufacturer: &str, model: &str) -> ConnectionRecord {
    ConnectionRecord::from_fields([
        ("manufacturer", manufacturer),
        ("model", model),
        ("backend", "MSL"),
    ])
    .unwrap()
}

fn class_name(manufacturer: &str, model: &str) -> Option<&'static str> {
    find_resource_class(&record(manufacturer, model)).map(|c| c.name)
}

fn assert_resolves(manufacturers: &[&str], models: &[&str], expected: &str) {
    for man in manufacturers {
        for model in models {
            assert_eq!(
                class_name(man, model),
                Some(expected),
                "manufacturer={man:?} model={model:?}"
            );
        }
    }
}

#[test]
fn test_unregistered_is_none() {
    assert_eq!(class_name("XXX", "yyy"), None);
    assert_eq!(class_name("Thorlabs", "yyy"), None);
    assert_eq!(class_name("XXX", "FW212C"), None);
}

#[test]
fn test_bentham_cmi_omega() {
    assert_resolves(
        &["Bentham", "Bentham Instruments Limited", "Bentham Instruments Ltd."],
        &["TMc300", "dtmc300"],
        "Bentham",
    );
    assert_resolves(&["CMI", "Czech Metrology Institute"], &["sia3"], "SIA3");
    let ithx: Vec<String> = ["w3", "d3", "sd", "m", "w", "2"]
        .iter()
        .map(|s| format!("ithx-{s}"))
        .collect();
    let ithx: Vec<&str> = ithx.iter().map(String::as_str).collect();
    assert_resolves(&["OMEGA", "omega"], &ithx, "iTHX");
}

#[test]
fn test_picoscope_series() {
    let pico = ["picotech", "Pico Tech", "Pico Technologies", "Pico Technology"];
    assert_resolves(
        &pico,
        &["PicoScope 2104", "2104", "2105", "2202", "2203", "2204", "2205", "2204A", "2205A"],
        "PicoScope2000",
    );
    assert_resolves(
        &pico,
        &[
            "PicoScope 2205A MSO", "2205A MSO", "2205 MSO", "2206", "2206A", "2206B",
            "2206B MSO", "2207", "2207A", "2207B", "2207B MSO", "2208", "2208A", "2208B",
            "2208B MSO", "2405A", "2406B", "2407B", "2408B",
        ],
        "PicoScope2000A",
    );
    assert_resolves(
        &pico,
        &["PicoScope 3204", "3204", "3205", "3206", "3224", "3424", "3425"],
        "PicoScope3000",
    );
    assert_resolves(
        &pico,
        &[
            "PicoScope 3203D", "3203D", "3204D", "3205D", "3206D", "3403D", "3404D", "3405D",
            "3406D", "3203D MSO", "3204D MSO", "3205D MSO", "3206D MSO", "3403D MSO",
            "3404D MSO", "3405D MSO", "3406D MSO", "3204A", "3205A", "3206A", "3207A",
            "3204B", "3205B", "3206B", "3207B", "3204 MSO", "3205 MSO", "3206 MSO", "3404A",
            "3405A", "3406A", "3404B", "3405B", "3406B",
        ],
        "PicoScope3000A",
    );
    assert_resolves(
        &pico,
        &["PicoScope 4224", "4224", "4224 IEPE", "4262", "4424"],
        "PicoScope4000",
    );
    assert_resolves(&pico, &["PicoScope 4444", "4444", "4824"], "PicoScope4000A");
    assert_resolves(&pico, &["PicoScope 5000", "5000"], "PicoScope5000");
    assert_resolves(
        &pico,
        &[
            "PicoScope 5242A", "5242A", "5243A", "5244A", "5442A", "5443A", "5444A", "5242B",
            "5243B", "5244B", "5442B", "5443B", "5444B",
        ],
        "PicoScope5000A",
    );
    assert_resolves(
        &pico,
        &["PicoScope 6407", "6407", "6402C", "6402D", "6403C", "6403D", "6404C", "6404D"],
        "PicoScope6000",
    );
}

#[test]
fn test_thorlabs() {
    let thorlabs = ["Thorlabs", "Thorlabs Inc."];
    assert_resolves(
        &thorlabs,
        &["FW102C", "FW102CNEB", "FW212C", "FW212CNEB"],
        "FilterWheelXX2C",
    );
    assert_resolves(
        &thorlabs,
        &["BSC101", "BSC102", "BSC103", "BSC201", "BSC202", "BSC203"],
        "BenchtopStepperMotor",
    );
    assert_resolves(
        &thorlabs,
        &["MFF101", "MFF102", "MFF101/M", "MFF102/M"],
        "FilterFlipper",
    );
    assert_resolves(
        &thorlabs,
        &[
            "LTS150", "LTS150/M", "LTS300", "LTS300/M", "MLJ050/M", "MLJ150", "MLJ150/M",
            "K10CR1", "K10CR1/M",
        ],
        "IntegratedStepperMotors",
    );
    assert_resolves(&thorlabs, &["KDC101"], "KCubeDCServo");
    assert_resolves(&thorlabs, &["KSC101"], "KCubeSolenoid");
    assert_resolves(&thorlabs, &["KST101"], "KCubeStepperMotor");
}

#[test]
fn test_optosigma() {
    assert_resolves(
        &["OptoSigma", "Opto Sigma", "SigmaKoki", "Sigma Koki Co. LTD"],
        &["SHOT-702", "SHOT702"],
        "SHOT702",
    );
}

#[test]
fn test_resolution_is_stable() {
    let record = record("Thorlabs Inc.", "FW212CNEB");
    let first = find_resource_class(&record).unwrap();
    assert_eq!(find_resource_class(&record), Some(first));
    assert_eq!(first.interface, Interface::Sdk);
    assert_eq!(first.module, "thorlabs.fwxx2c");
}

#[test]
fn test_backend_must_be_msl() {
    let pyvisa = ConnectionRecord::from_fields([
        ("manufacturer", "Thorlabs"),
        ("model", "FW212C"),
        ("backend", "PyVISA"),
    ])
    .unwrap();
    assert_eq!(pyvisa.backend(), Backend::PyVisa);
    assert_eq!(find_resource_class(&pyvisa), None);
    assert_eq!(
        builtin()
            .find_by_name(pyvisa.manufacturer(), pyvisa.model())
            .map(|c| c.name),
        Some("FilterWheelXX2C")
    );
}

#[test]
fn test_custom_table() {
    const LOCKIN: ResourceClass = ResourceClass::new("LockIn", "custom.sr830", Interface::Serial);
    let mut table = ResourceTable::new();
    table
        .push(r"^Stanford\s+Research", r"^SR8[36]0$", LOCKIN)
        .unwrap();

    assert_eq!(
        table.find(&record("Stanford Research Systems", "SR830")),
        Some(LOCKIN)
    );
    assert_eq!(table.find(&record("Stanford Research Systems", "SR850")), None);
    assert!(builtin()
        .find(&record("Stanford Research Systems", "SR830"))
        .is_none());
}
