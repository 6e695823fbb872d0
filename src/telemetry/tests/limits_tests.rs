//! Tests for monitoring checks

use super::{build, pcf_record, pcf_with, type_of};
use crate::fixtures::MibFixture;
use crate::model::{Alarm, AlarmLevel, AlarmRange};
use crate::telemetry::records::pcf;

fn fixture() -> crate::fixtures::MibDir {
    MibFixture::new()
        .row("txf", &["TXT1", "modes", "U"])
        .row("txp", &["TXT1", "0", "0", "OFF"])
        .row("txp", &["TXT1", "1", "1", "ON"])
        .record("pcf", &pcf_record("T1", "3", "12"))
        .record("pcf", &pcf_record("T2", "3", "12"))
        .record("pcf", &pcf_record("MODE", "3", "4"))
        .record("pcf", &pcf_with("E1", "3", "4", &[(pcf::CATEG, "S"), (pcf::CURTX, "TXT1")]))
        .record("pcf", &pcf_record("B1", "1", "0"))
        .record("pcf", &pcf_with("U1", "3", "12", &[(pcf::USCON, "Y")]))
        .row("ocp", &["T1", "2", "H", "-20", "20"])
        .row("ocp", &["T1", "1", "S", "-10", "10"])
        .row("ocp", &["T1", "3", "S", "0", "5", "MODE", "2"])
        .row("ocp", &["T1", "4", "D", "1", "2"])
        .row("ocp", &["E1", "1", "H", "1"])
        .row("ocp", &["E1", "2", "S", "7"])
        .row("ocp", &["B1", "1", "H", "0", "1"])
        .row("ocp", &["U1", "1", "H", "0", "1"])
        .row("ocf", &["T1", "3", "4", "U", "R"])
        .row("ocf", &["E1", "1", "2", "U", "R"])
        .row("ocf", &["B1", "1", "1", "U", "R"])
        .row("ocf", &["U1", "1", "1", "U", "R"])
        .row("ocf", &["MODE", "1", "1", "U", "R"])
        .write()
}

#[test]
fn test_numeric_limits_on_parameter_specific_type() {
    let dir = fixture();
    let (_, session) = build(&dir);
    let db = &session.db;

    let t1 = type_of(db, "T1");
    let t2 = type_of(db, "T2");
    assert_eq!(t1.name, "ptcpfc_3_12_N___1_1");
    assert_eq!(t2.name, "ptcpfc_3_12_N___1");
    assert!(t2.alarm.is_none());

    let Some(Alarm::Numeric(alarms)) = &t1.alarm else {
        panic!("Expected numeric alarm, got {:?}", t1.alarm);
    };
    assert_eq!(alarms.len(), 2);

    let default = &alarms[0];
    assert!(default.context.is_none());
    assert_eq!(default.min_violations, 3);
    assert_eq!(
        default.ranges,
        vec![
            AlarmRange {
                low: Some(-10.0),
                high: Some(10.0),
                level: AlarmLevel::Warning
            },
            AlarmRange {
                low: Some(-20.0),
                high: Some(20.0),
                level: AlarmLevel::Critical
            },
        ]
    );

    let contextual = &alarms[1];
    let context = contextual.context.as_ref().unwrap();
    assert_eq!(context.parameter, db.parameter_by_name("MODE").unwrap());
    assert_eq!(context.value, "2");
    assert_eq!(contextual.ranges.len(), 1);
}

#[test]
fn test_raw_limits_of_enumeration_map_to_labels() {
    let dir = fixture();
    let (_, session) = build(&dir);

    let e1 = type_of(&session.db, "E1");
    match &e1.alarm {
        Some(Alarm::Enumeration(items)) => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].label, "ON");
            assert_eq!(items[0].level, AlarmLevel::Critical);
        }
        other => panic!("Expected enumeration alarm, got {:?}", other),
    }
}

#[test]
fn test_unsupported_checks_are_limitations() {
    let dir = fixture();
    let (_, session) = build(&dir);

    let warnings = session.warnings();
    assert_eq!(warnings.len(), 3);
    assert!(warnings[0].contains("limit check type 'D'"));
    assert!(warnings[1].contains("boolean"));
    assert!(warnings[2].contains("status consistency"));
    assert!(type_of(&session.db, "B1").alarm.is_none());
    assert!(type_of(&session.db, "U1").alarm.is_none());

    // MODE has an OCF record but no OCP checks
    assert_eq!(session.errors().len(), 1);
    assert_eq!(session.errors()[0].line(), Some(5));
}
