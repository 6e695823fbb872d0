//! Tests for packet header templates

use super::{build, command, with_header};
use crate::encoding::EncodingDescriptor;
use crate::error::MibError;
use crate::fixtures::MibFixture;
use crate::model::{CommandEntryItem, EngType, EntryLocation};

#[test]
fn test_header_template_becomes_abstract_command() {
    let dir = with_header(MibFixture::new()).write();
    let (builder, session) = build(&dir);
    let db = &session.db;
    assert!(session.errors().is_empty());

    let header = command(db, "TCHDR");
    assert!(header.is_abstract);
    assert_eq!(header.container.entries.len(), 11);
    let names: Vec<_> = header.arguments.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["APID", "ACK", "TYPE", "STYPE"]);
    assert_eq!(
        header.argument("APID").unwrap().description.as_deref(),
        Some("Application id")
    );

    let first = &header.container.entries[0];
    assert_eq!(first.location, EntryLocation::ContainerStart(0));
    assert_eq!(
        first.item,
        CommandEntryItem::FixedValue {
            name: Some("version".to_string()),
            value: vec![0],
            size_in_bits: 3,
        }
    );
    let apid = &header.container.entries[3];
    assert_eq!(apid.location, EntryLocation::ContainerStart(5));
    assert_eq!(apid.item, CommandEntryItem::Argument("APID".to_string()));
    match &header.container.entries[6].item {
        CommandEntryItem::FixedValue { value, size_in_bits, .. } => {
            assert_eq!(value, &vec![0, 0]);
            assert_eq!(*size_in_bits, 16);
        }
        other => panic!("Expected padding, got {:?}", other),
    }

    let apid_type = db.argument_type(header.argument("APID").unwrap().type_id);
    assert_eq!(
        apid_type.encoding,
        Some(EncodingDescriptor::UnsignedInteger { size_in_bits: 11 })
    );
    assert_eq!(
        apid_type.eng,
        EngType::Integer {
            signed: false,
            size_in_bits: 32
        }
    );

    let template = &builder.headers["TCHDR"];
    assert_eq!(template.apid.as_deref(), Some("APID"));
    assert_eq!(template.packet_type.as_deref(), Some("TYPE"));
    assert_eq!(template.subtype.as_deref(), Some("STYPE"));
    assert_eq!(template.ack.as_deref(), Some("ACK"));
}

#[test]
fn test_header_argument_keeps_one_width() {
    let dir = with_header(MibFixture::new())
        .row("tcp", &["TCHDR2"])
        .row("pcdf", &["TCHDR2", "apid", "A", "8", "5", "APID"])
        .row("pcdf", &["TCHDR2", "type", "T", "8", "56", "TYPE"])
        .row("pcdf", &["TCHDR2", "spare", "X", "8", "64"])
        .row("pcdf", &["NOSUCH", "type", "T", "8", "56", "TYPE"])
        .row("pcdf", &["TCHDR2", "subtype", "S", "8", "64", "UNDECLARED"])
        .write();
    let (builder, session) = build(&dir);

    let lines: Vec<_> = session.errors().iter().map(|e| e.line()).collect();
    assert_eq!(lines, vec![Some(12), Some(14), Some(15), Some(16)]);
    assert!(matches!(session.errors()[0], MibError::Data { .. }));
    assert!(session.errors()[0].to_string().contains("11"));
    assert!(matches!(session.errors()[2], MibError::Reference { .. }));
    assert!(matches!(session.errors()[3], MibError::Reference { .. }));

    // The type argument is shared with the first header
    let second = command(&session.db, "TCHDR2");
    assert_eq!(second.arguments.len(), 1);
    assert_eq!(
        second.argument("TYPE").unwrap().type_id,
        command(&session.db, "TCHDR").argument("TYPE").unwrap().type_id
    );
    assert_eq!(builder.headers["TCHDR2"].apid, None);
}

#[test]
fn test_invalid_header_declarations() {
    let dir = MibFixture::new()
        .row("tcp", &["H1"])
        .row("tcp", &["H1"])
        .row("pcpc", &["A1", "first", "X"])
        .row("pcpc", &["A2", "second", "I"])
        .row("pcdf", &["H1", "value", "F", "8", "0", "", "ZZ"])
        .row("pcdf", &["H1", "signed", "A", "16", "8", "A2"])
        .write();
    let (builder, session) = build(&dir);

    let files: Vec<_> = session
        .errors()
        .iter()
        .map(|e| e.location().map(|l| (l.file.clone(), l.line)))
        .collect();
    assert_eq!(
        files,
        vec![
            Some(("tcp.dat".to_string(), 2)),
            Some(("pcpc.dat".to_string(), 1)),
            Some(("pcdf.dat".to_string(), 1)),
        ]
    );
    assert!(!builder.header_arguments.contains_key("A1"));

    let header = command(&session.db, "H1");
    let signed = session.db.argument_type(header.argument("A2").unwrap().type_id);
    assert_eq!(
        signed.encoding,
        Some(EncodingDescriptor::SignedInteger { size_in_bits: 16 })
    );
}
