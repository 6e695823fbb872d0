//! Parameter and argument types

use super::{ArgumentTypeId, Comparison};
use crate::calibration::{
    CalibrationDefinition, ContextCalibrator, NumericCalibrator, TextCalibration, ValueRange,
};
use crate::config::TimeEpoch;
use crate::encoding::EncodingDescriptor;
use serde::Serialize;

/// Engineering (calibrated) type of a value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EngType {
    Boolean,
    Integer {
        signed: bool,
        size_in_bits: u32,
    },
    Float {
        size_in_bits: u32,
    },
    Enumerated(TextCalibration),
    String,
    Binary,
    AbsoluteTime {
        epoch: TimeEpoch,
        scale: f64,
    },
    RelativeTime {
        scale: f64,
    },
    /// Embedded packet header
    Aggregate {
        members: Vec<AggregateMember>,
    },
    /// Argument repeated a number of times given by another argument
    Array {
        element: ArgumentTypeId,
        count_argument: String,
    },
    /// Group of arguments repeated together
    Record {
        members: Vec<RecordMember>,
    },
}

impl EngType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer { .. } | Self::Float { .. })
    }

    pub fn is_enumerated(&self) -> bool {
        matches!(self, Self::Enumerated(_))
    }

    pub fn enumeration(&self) -> Option<&TextCalibration> {
        match self {
            Self::Enumerated(text) => Some(text),
            _ => None,
        }
    }

    /// Natural engineering type of a raw encoding
    pub fn natural(encoding: &EncodingDescriptor) -> Option<Self> {
        match encoding {
            EncodingDescriptor::UnsignedInteger { size_in_bits } => Some(Self::Integer {
                signed: false,
                size_in_bits: if *size_in_bits > 32 { 64 } else { 32 },
            }),
            EncodingDescriptor::SignedInteger { size_in_bits } => Some(Self::Integer {
                signed: true,
                size_in_bits: if *size_in_bits > 32 { 64 } else { 32 },
            }),
            EncodingDescriptor::Float { size_in_bits, .. } => Some(Self::Float {
                size_in_bits: if *size_in_bits > 32 { 64 } else { 32 },
            }),
            EncodingDescriptor::FixedBinary { .. } | EncodingDescriptor::LeadingSizeBinary { .. } => {
                Some(Self::Binary)
            }
            EncodingDescriptor::FixedString { .. } | EncodingDescriptor::LeadingSizeString { .. } => {
                Some(Self::String)
            }
            _ => None,
        }
    }
}

/// Member of an embedded packet header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateMember {
    pub name: String,
    pub type_name: String,
    pub size_in_bits: u32,
}

impl AggregateMember {
    fn uint(name: &str, size_in_bits: u32) -> Self {
        Self {
            name: name.to_string(),
            type_name: format!("mib-ptype-uint{}", size_in_bits),
            size_in_bits,
        }
    }

    /// Members of an embedded packet header: TM for PFC 0, TC for PFC 1
    pub fn packet_header(pfc: i32) -> Option<Vec<Self>> {
        let mut members = vec![
            Self::uint("ccsds_version", 3),
            Self::uint("ccsds_packettype", 1),
            Self::uint("ccsds_shflag", 1),
            Self::uint("ccsds_apid", 11),
            Self::uint("ccsds_seqcount", 16),
            Self::uint("ccsds_length", 16),
        ];
        let secondary: &[(&str, u32)] = match pfc {
            0 => &[
                ("pus_version", 4),
                ("pus_time_ref", 4),
                ("pus_type", 8),
                ("pus_stype", 8),
                ("pus_counter", 16),
                ("pus_destination_id", 16),
                ("pus_time", 64),
            ],
            1 => &[
                ("pus_version", 4),
                ("pus_ackflags", 4),
                ("pus_type", 8),
                ("pus_stype", 8),
                ("pus_source_id", 16),
            ],
            _ => return None,
        };
        members.extend(secondary.iter().map(|&(name, bits)| Self::uint(name, bits)));
        Some(members)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordMember {
    pub name: String,
    pub type_id: ArgumentTypeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlarmLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumerationAlarmItem {
    pub context: Option<Comparison>,
    pub label: String,
    pub level: AlarmLevel,
}

/// Raw or engineering interval outside which the alarm triggers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmRange {
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub level: AlarmLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericAlarm {
    pub context: Option<Comparison>,
    /// Consecutive violations required before raising the alarm
    pub min_violations: u32,
    pub ranges: Vec<AlarmRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Alarm {
    Enumeration(Vec<EnumerationAlarmItem>),
    Numeric(Vec<NumericAlarm>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterType {
    pub name: String,
    pub eng: EngType,
    pub encoding: Option<EncodingDescriptor>,
    pub calibrator: Option<NumericCalibrator>,
    pub context_calibrators: Vec<ContextCalibrator>,
    pub unit: Option<String>,
    pub initial_value: Option<String>,
    pub alarm: Option<Alarm>,
}

impl ParameterType {
    pub fn new(name: impl Into<String>, eng: EngType) -> Self {
        Self {
            name: name.into(),
            eng,
            encoding: None,
            calibrator: None,
            context_calibrators: Vec::new(),
            unit: None,
            initial_value: None,
            alarm: None,
        }
    }

    pub fn with_encoding(mut self, encoding: EncodingDescriptor) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Attach a calibration to the type
    ///
    /// Numeric calibrations become the default calibrator, textual ones
    /// replace the engineering type by an enumeration.
    pub fn apply_calibration(&mut self, definition: CalibrationDefinition) {
        match definition {
            CalibrationDefinition::Spline(c)
            | CalibrationDefinition::Polynomial(c)
            | CalibrationDefinition::Logarithmic(c) => self.calibrator = Some(c),
            CalibrationDefinition::TextEnumeration(text) => self.eng = EngType::Enumerated(text),
            CalibrationDefinition::ContextSelected(list) => self.context_calibrators = list,
        }
    }

    /// Numeric alarm matching `context`, created if needed
    pub fn numeric_alarm_mut(&mut self, context: Option<&Comparison>) -> Option<&mut NumericAlarm> {
        if self.alarm.is_none() {
            self.alarm = Some(Alarm::Numeric(Vec::new()));
        }
        let Some(Alarm::Numeric(alarms)) = &mut self.alarm else {
            return None;
        };
        let position = match alarms.iter().position(|a| a.context.as_ref() == context) {
            Some(position) => position,
            None => {
                alarms.push(NumericAlarm {
                    context: context.cloned(),
                    min_violations: 1,
                    ranges: Vec::new(),
                });
                alarms.len() - 1
            }
        };
        alarms.get_mut(position)
    }

    pub fn add_enumeration_alarm(&mut self, item: EnumerationAlarmItem) -> bool {
        if self.alarm.is_none() {
            self.alarm = Some(Alarm::Enumeration(Vec::new()));
        }
        match &mut self.alarm {
            Some(Alarm::Enumeration(items)) => {
                items.push(item);
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgumentType {
    pub name: String,
    pub eng: EngType,
    pub encoding: Option<EncodingDescriptor>,
    /// Engineering-to-raw curve
    pub decalibrator: Option<NumericCalibrator>,
    pub unit: Option<String>,
    pub valid_ranges: Vec<ValueRange>,
    pub ranges_calibrated: bool,
}

impl ArgumentType {
    pub fn new(name: impl Into<String>, eng: EngType) -> Self {
        Self {
            name: name.into(),
            eng,
            encoding: None,
            decalibrator: None,
            unit: None,
            valid_ranges: Vec::new(),
            ranges_calibrated: false,
        }
    }

    pub fn with_encoding(mut self, encoding: EncodingDescriptor) -> Self {
        self.encoding = Some(encoding);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComparisonOperator, ParameterId};

    #[test]
    fn test_natural_type_widths() {
        let encoding = EncodingDescriptor::UnsignedInteger { size_in_bits: 40 };
        assert_eq!(
            EngType::natural(&encoding),
            Some(EngType::Integer {
                signed: false,
                size_in_bits: 64
            })
        );
        assert_eq!(EngType::natural(&EncodingDescriptor::Deduced), None);
    }

    #[test]
    fn test_packet_header_members() {
        let tm = AggregateMember::packet_header(0).unwrap();
        let tc = AggregateMember::packet_header(1).unwrap();

        assert_eq!(tm.iter().map(|m| m.size_in_bits).sum::<u32>(), 48 + 120);
        assert_eq!(tc.iter().map(|m| m.size_in_bits).sum::<u32>(), 48 + 40);
        assert_eq!(tc.last().unwrap().type_name, "mib-ptype-uint16");
        assert!(AggregateMember::packet_header(2).is_none());
    }

    #[test]
    fn test_numeric_alarms_grouped_by_context() {
        let mut ptype = ParameterType::new(
            "t",
            EngType::Float { size_in_bits: 32 },
        );
        let context = Comparison {
            parameter: ParameterId(3),
            operator: ComparisonOperator::Equality,
            value: "1".to_string(),
            use_calibrated: false,
        };

        ptype.numeric_alarm_mut(None).unwrap().min_violations = 2;
        ptype.numeric_alarm_mut(Some(&context)).unwrap();
        ptype.numeric_alarm_mut(None).unwrap();

        match ptype.alarm {
            Some(Alarm::Numeric(alarms)) => {
                assert_eq!(alarms.len(), 2);
                assert_eq!(alarms[0].min_violations, 2);
            }
            other => panic!("Expected numeric alarm, got {:?}", other),
        }
    }
}
