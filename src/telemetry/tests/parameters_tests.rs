//! Tests for parameter declaration, type sharing and calibrations

use super::{build, pcf_record, pcf_with, type_of};
use crate::config::TimeEpoch;
use crate::constants::{PARA_CCSDS_APID, PARA_CCSDS_SEQCOUNT, PARA_PUS_SUBTYPE, PARA_PUS_TYPE};
use crate::encoding::EncodingDescriptor;
use crate::error::MibError;
use crate::fixtures::MibFixture;
use crate::model::{DataSource, EngType};
use crate::session::Session;
use crate::synthetic::{
    CompiledFormula, Evaluator, FormulaCompiler, FormulaError, FormulaInput, ParameterTypeLookup,
    Value,
};
use crate::telemetry::TelemetryBuilder;
use crate::telemetry::records::pcf;
use std::sync::Arc;

const HEADER_PARAMETERS: [&str; 4] = [
    PARA_CCSDS_APID,
    PARA_CCSDS_SEQCOUNT,
    PARA_PUS_TYPE,
    PARA_PUS_SUBTYPE,
];

#[test]
fn test_identical_declarations_share_one_type() {
    let fixture = MibFixture::new()
        .record("pcf", &pcf_record("P1", "3", "12"))
        .record("pcf", &pcf_record("P2", "3", "12"))
        .record("pcf", &pcf_with("P3", "3", "12", &[(pcf::UNIT, "m/s")]))
        .record("pcf", &pcf_with("C1", "3", "12", &[(pcf::NATUR, "C"), (pcf::PARVAL, "5")]))
        .record("pcf", &pcf_with("C2", "3", "12", &[(pcf::NATUR, "C"), (pcf::PARVAL, "6")]))
        .write();
    let (_, session) = build(&fixture);
    let db = &session.db;
    assert!(session.errors().is_empty());

    let p1 = db.parameter(db.parameter_by_name("P1").unwrap());
    let p2 = db.parameter(db.parameter_by_name("P2").unwrap());
    assert_eq!(p1.type_id, p2.type_id);
    assert_eq!(type_of(db, "P1").name, "ptcpfc_3_12_N___1");
    assert_eq!(type_of(db, "P3").name, "ptcpfc_3_12_N___1_ms");
    assert_eq!(type_of(db, "P3").unit.as_deref(), Some("m/s"));

    assert_eq!(type_of(db, "C1").initial_value.as_deref(), Some("5"));
    assert_eq!(type_of(db, "C2").initial_value.as_deref(), Some("6"));
    let c1 = db.parameter(db.parameter_by_name("C1").unwrap());
    assert_eq!(c1.data_source, DataSource::Constant);
    assert_eq!(
        type_of(db, "P1").eng,
        EngType::Integer {
            signed: false,
            size_in_bits: 32
        }
    );
}

#[test]
fn test_numeric_calibrations_select_engineering_type() {
    let fixture = MibFixture::new()
        .row("caf", &["CAL1", "curve", "I", "U", "D", "", "2", "F"])
        .row("cap", &["CAL1", "0", "-10"])
        .row("cap", &["CAL1", "100", "10"])
        .row("mcf", &["POLY1", "poly", "0", "2"])
        .record("pcf", &pcf_with("P1", "3", "12", &[(pcf::CURTX, "CAL1")]))
        .record("pcf", &pcf_with("P2", "3", "12", &[(pcf::CURTX, "POLY1")]))
        .record("pcf", &pcf_with("B1", "1", "0", &[(pcf::CURTX, "POLY1")]))
        .record("pcf", &pcf_with("P3", "3", "12", &[(pcf::CURTX, "NOPE")]))
        .write();
    let (_, session) = build(&fixture);
    let db = &session.db;

    let p1 = type_of(db, "P1");
    assert_eq!(
        p1.eng,
        EngType::Integer {
            signed: true,
            size_in_bits: 64
        }
    );
    assert_eq!(p1.calibrator.as_ref().unwrap().calibrate(50.0), Some(0.0));

    let p2 = type_of(db, "P2");
    assert_eq!(p2.eng, EngType::Float { size_in_bits: 64 });
    assert_eq!(p2.calibrator.as_ref().unwrap().calibrate(3.0), Some(6.0));

    assert!(db.parameter_by_name("B1").is_none());
    assert!(db.parameter_by_name("P3").is_none());
    let lines: Vec<_> = session.errors().iter().map(|e| e.line()).collect();
    assert_eq!(lines, vec![Some(3), Some(4)]);
    assert!(matches!(session.errors()[1], MibError::Reference { .. }));
}

#[test]
fn test_textual_and_string_parameters() {
    let fixture = MibFixture::new()
        .row("txf", &["TXT1", "modes", "U"])
        .row("txp", &["TXT1", "0", "0", "OFF"])
        .row("txp", &["TXT1", "1", "1", "ON"])
        .record("pcf", &pcf_with("S1", "3", "4", &[(pcf::CATEG, "S"), (pcf::CURTX, "TXT1")]))
        .record("pcf", &pcf_with("S2", "3", "4", &[(pcf::CATEG, "S")]))
        .record("pcf", &pcf_with("S3", "3", "4", &[(pcf::CATEG, "S"), (pcf::CURTX, "NOPE")]))
        .record("pcf", &pcf_with("T1", "8", "0", &[(pcf::CATEG, "T"), (pcf::PARVAL, "hello")]))
        .record("pcf", &pcf_with("T2", "3", "4", &[(pcf::CATEG, "T")]))
        .write();
    let (_, session) = build(&fixture);
    let db = &session.db;

    let modes = type_of(db, "S1").eng.enumeration().unwrap();
    assert_eq!(modes.label_for(1.0), Some("ON"));
    assert_eq!(modes.label_for(0.0), Some("OFF"));

    // Errors are recorded but the parameters still get an integer type
    for name in ["S2", "S3"] {
        assert_eq!(
            type_of(db, name).eng,
            EngType::Integer {
                signed: false,
                size_in_bits: 32
            }
        );
    }

    let text = type_of(db, "T1");
    assert_eq!(text.eng, EngType::String);
    assert_eq!(text.initial_value.as_deref(), Some("hello"));
    assert_eq!(
        text.encoding,
        Some(EncodingDescriptor::LeadingSizeString { size_tag_bits: 8 })
    );
    assert!(db.parameter_by_name("T2").is_none());
    assert_eq!(session.errors().len(), 3);
}

#[test]
fn test_textual_context_calibration_is_a_limitation() {
    let fixture = MibFixture::new()
        .row("mcf", &["POLY1", "poly", "0", "2"])
        .record("pcf", &pcf_record("MODE", "3", "4"))
        .record("pcf", &pcf_with("S1", "3", "4", &[(pcf::CATEG, "S")]))
        .row("cur", &["S1", "1", "MODE", "0", "POLY1"])
        .write();
    let (_, session) = build(&fixture);

    assert!(session.errors().is_empty());
    assert_eq!(session.warnings().len(), 1);
    assert!(type_of(&session.db, "S1").context_calibrators.is_empty());
}

#[test]
fn test_onboard_id_alias_last_declaration_wins() {
    let fixture = MibFixture::new()
        .record("pcf", &pcf_with("P1", "3", "12", &[(pcf::PID, "42")]))
        .record("pcf", &pcf_with("P2", "3", "12", &[(pcf::PID, "42")]))
        .record("pcf", &pcf_with("P3", "3", "12", &[(pcf::PID, "43")]))
        .write();
    let (_, session) = build(&fixture);
    let db = &session.db;

    assert_eq!(db.parameter_by_alias("OB:PID", "42"), db.parameter_by_name("P2"));
    assert_eq!(db.parameter_by_alias("OB:PID", "43"), db.parameter_by_name("P3"));
}

#[test]
fn test_context_calibrated_parameter_gets_own_type() {
    let fixture = MibFixture::new()
        .row("mcf", &["POLY1", "poly", "0", "1"])
        .row("mcf", &["POLY2", "poly", "0", "2"])
        .record("pcf", &pcf_record("MODE", "3", "4"))
        .record("pcf", &pcf_record("P1", "3", "12"))
        .record("pcf", &pcf_record("P2", "3", "12"))
        .row("cur", &["P1", "2", "MODE", "1", "POLY2"])
        .row("cur", &["P1", "1", "MODE", "0", "POLY1"])
        .write();
    let (_, session) = build(&fixture);
    let db = &session.db;
    assert!(session.errors().is_empty());

    let p1 = type_of(db, "P1");
    assert_eq!(p1.name, "ptcpfc_3_12_N___1_1");
    assert_eq!(p1.eng, EngType::Float { size_in_bits: 64 });
    assert_eq!(p1.context_calibrators.len(), 2);
    assert_eq!(p1.context_calibrators[0].context.value, "0");
    assert_eq!(p1.context_calibrators[0].context.parameter, db.parameter_by_name("MODE").unwrap());
    assert_eq!(p1.context_calibrators[1].calibrator.calibrate(1.0), Some(2.0));

    let p2 = type_of(db, "P2");
    assert_eq!(p2.name, "ptcpfc_3_12_N___1");
    assert!(p2.context_calibrators.is_empty());
}

#[test]
fn test_deduced_and_saved_synthetic_parameters() {
    let fixture = MibFixture::new()
        .record("pcf", &pcf_record("PID_HOLDER", "3", "12"))
        .record("pcf", &pcf_with("D1", "11", "0", &[(pcf::RELATED, "PID_HOLDER")]))
        .record("pcf", &pcf_record("D2", "11", "0"))
        .record("pcf", &pcf_record("SAVED", "13", "0"))
        .record("pcf", &pcf_record("BAD-NAME", "3", "12"))
        .record("pcf", &pcf_record("PID_HOLDER", "3", "4"))
        .write();
    let (builder, session) = build(&fixture);

    assert!(builder.deduced.contains_key("D1"));
    assert!(builder.saved_synthetic.contains("SAVED"));
    assert!(session.db.parameter_by_name("D1").is_none());
    assert!(session.db.parameter_by_name("SAVED").is_none());
    let declared: Vec<_> = session
        .db
        .parameters()
        .iter()
        .map(|p| p.name.as_str())
        .filter(|name| !HEADER_PARAMETERS.contains(name))
        .collect();
    assert_eq!(declared, vec!["PID_HOLDER"]);

    let lines: Vec<_> = session.errors().iter().map(|e| e.line()).collect();
    assert_eq!(lines, vec![Some(3), Some(5), Some(6)]);
}

#[test]
fn test_strict_mode_stops_at_first_bad_parameter() {
    let fixture = MibFixture::new()
        .record("pcf", &pcf_record("P1", "3", "99"))
        .record("pcf", &pcf_record("P2", "3", "98"))
        .write();
    let mut session = fixture.strict_session();

    let result = TelemetryBuilder::new().build(&mut session);
    match result.unwrap_err() {
        MibError::Type { location, .. } => assert_eq!(location.line, 1),
        other => panic!("Expected Type error, got {:?}", other),
    }
}

#[test]
fn test_absolute_time_aligned_on_correlated_clock() {
    let fixture = MibFixture::new()
        .record("pcf", &pcf_record("OBT", "9", "17"))
        .write();
    let mut session = Session::new(fixture.config().with_tco("TCO1", Some(3))).unwrap();
    TelemetryBuilder::new().build(&mut session).unwrap();

    let obt = type_of(&session.db, "OBT");
    match &obt.eng {
        EngType::AbsoluteTime { epoch, scale } => {
            assert!(matches!(epoch, TimeEpoch::Correlated { .. }));
            assert_eq!(*scale, 0.001);
        }
        other => panic!("Expected absolute time, got {:?}", other),
    }
    match obt.encoding {
        Some(EncodingDescriptor::AbsoluteTime { shift_bits, .. }) => assert_eq!(shift_bits, 8),
        other => panic!("Expected absolute time encoding, got {:?}", other),
    }
}

#[derive(Debug)]
struct Sum;

impl Evaluator for Sum {
    fn evaluate(&self, inputs: &[Value]) -> Option<Value> {
        let mut total = 0;
        for input in inputs {
            match input {
                Value::Unsigned(v) => total += *v,
                _ => return None,
            }
        }
        Some(Value::Unsigned(total))
    }
}

/// Formula compiler reading one input parameter name per line
struct OneInputPerLine;

impl FormulaCompiler for OneInputPerLine {
    fn compile(
        &self,
        _parameter: &str,
        source: &str,
        types: &dyn ParameterTypeLookup,
    ) -> Result<CompiledFormula, FormulaError> {
        let inputs = source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|name| match types.parameter_type(name) {
                Some(_) => Ok(FormulaInput {
                    parameter: name.to_string(),
                    trigger: name != "B",
                }),
                None => Err(FormulaError::from(format!("unknown input '{}'", name))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledFormula {
            inputs,
            evaluator: Arc::new(Sum),
        })
    }
}

#[test]
fn test_synthetic_parameters_become_algorithms() {
    let fixture = MibFixture::new()
        .record("pcf", &pcf_record("A", "3", "12"))
        .record("pcf", &pcf_record("B", "3", "12"))
        .record("pcf", &pcf_with("SYN", "3", "12", &[(pcf::NATUR, "D")]))
        .record("pcf", &pcf_with("SYN_BAD", "3", "12", &[(pcf::NATUR, "D")]))
        .record("pcf", &pcf_with("SYN_MISSING", "3", "12", &[(pcf::NATUR, "D")]))
        .file("synthetic/SYN", "A\nB\n")
        .file("synthetic/SYN_BAD", "A\nNOPE\n")
        .write();
    let mut session = fixture.session();
    let mut builder = TelemetryBuilder::new().with_formula_compiler(Some(Arc::new(OneInputPerLine)));
    builder.build(&mut session).unwrap();
    let db = &session.db;

    let algorithm = db.algorithm(db.algorithm_by_name("SYN").unwrap());
    assert_eq!(algorithm.inputs.len(), 2);
    assert_eq!(algorithm.triggers, vec![db.parameter_by_name("A").unwrap()]);
    assert_eq!(algorithm.outputs, vec![db.parameter_by_name("SYN").unwrap()]);
    assert_eq!(algorithm.source.as_deref(), Some("A\nB\n"));
    let evaluator = algorithm.evaluator.as_ref().unwrap();
    assert_eq!(
        evaluator.evaluate(&[Value::Unsigned(2), Value::Unsigned(3)]),
        Some(Value::Unsigned(5))
    );

    let syn = db.parameter(db.parameter_by_name("SYN").unwrap());
    assert_eq!(syn.data_source, DataSource::Derived);

    assert!(db.algorithm_by_name("SYN_BAD").is_none());
    assert_eq!(session.errors().len(), 2);
    assert!(matches!(session.errors()[0], MibError::Synthetic { .. }));
    assert!(matches!(session.errors()[1], MibError::Reference { .. }));
}

#[test]
fn test_synthetic_parameters_without_compiler() {
    let fixture = MibFixture::new()
        .record("pcf", &pcf_with("SYN", "3", "12", &[(pcf::NATUR, "D")]))
        .write();
    let (_, session) = build(&fixture);

    assert!(session.db.algorithms().is_empty());
    assert!(session.errors().is_empty());
    assert!(session.warnings()[0].contains("no formula compiler"));
}
