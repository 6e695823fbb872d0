//! Encoding resolver
//!
//! Maps the SCOS-2000 (type code, format code, size-tag width) triple of a
//! parameter or argument to the bit-level layout of its raw value.

use crate::constants::TIME_PFC_64;
use crate::error::TypeError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FloatRepresentation {
    Ieee754,
    MilStd1750a,
}

/// On-board time formats of PTC 9 (absolute) and PTC 10 (relative) values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeFormat {
    /// CUC preceded by its own P-field; width known only from the data
    CucExplicit,
    /// CCSDS day segmented, with or without the microsecond field
    Cds { microseconds: bool },
    Cuc { coarse_bytes: u8, fine_bytes: u8 },
    /// 64-bit time (PFC 30)
    Extended64,
}

impl TimeFormat {
    fn from_pfc(pfc: i32) -> Option<Self> {
        match pfc {
            0 => Some(Self::CucExplicit),
            1 => Some(Self::Cds {
                microseconds: false,
            }),
            2 => Some(Self::Cds { microseconds: true }),
            3..=18 => Some(Self::Cuc {
                coarse_bytes: ((pfc - 3) / 4 + 1) as u8,
                fine_bytes: ((pfc - 3) % 4) as u8,
            }),
            TIME_PFC_64 => Some(Self::Extended64),
            _ => None,
        }
    }

    pub fn size_in_bits(&self) -> Option<u32> {
        match self {
            Self::CucExplicit => None,
            Self::Cds { microseconds } => Some(if *microseconds { 64 } else { 48 }),
            Self::Cuc {
                coarse_bytes,
                fine_bytes,
            } => Some(8 * (*coarse_bytes as u32 + *fine_bytes as u32)),
            Self::Extended64 => Some(64),
        }
    }

    pub fn fine_bytes(&self) -> Option<u8> {
        match self {
            Self::Cuc { fine_bytes, .. } => Some(*fine_bytes),
            _ => None,
        }
    }
}

/// Bit layout of a raw value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EncodingDescriptor {
    UnsignedInteger {
        size_in_bits: u32,
    },
    /// Two's complement
    SignedInteger {
        size_in_bits: u32,
    },
    Float {
        size_in_bits: u32,
        representation: FloatRepresentation,
    },
    FixedBinary {
        size_in_bits: u32,
    },
    LeadingSizeBinary {
        size_tag_bits: u32,
    },
    FixedString {
        size_in_bits: u32,
    },
    LeadingSizeString {
        size_tag_bits: u32,
    },
    AbsoluteTime {
        format: TimeFormat,
        /// Left shift aligning the value on the reference clock's fine part
        shift_bits: u32,
    },
    RelativeTime {
        format: TimeFormat,
    },
    /// Embedded packet header (PTC 12); members are resolved by the builders
    Aggregate,
    /// Value whose type depends on another parameter (PTC 11)
    Deduced,
}

impl EncodingDescriptor {
    /// Fixed width of the value, `None` for variable widths and sentinels
    pub fn size_in_bits(&self) -> Option<u32> {
        match self {
            Self::UnsignedInteger { size_in_bits }
            | Self::SignedInteger { size_in_bits }
            | Self::Float { size_in_bits, .. }
            | Self::FixedBinary { size_in_bits }
            | Self::FixedString { size_in_bits } => Some(*size_in_bits),
            Self::AbsoluteTime { format, .. } | Self::RelativeTime { format } => {
                format.size_in_bits()
            }
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::UnsignedInteger { .. } | Self::SignedInteger { .. }
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float { .. })
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }
}

/// Resolve the raw encoding of a (ptc, pfc) pair
///
/// `vplb` is the width in bytes of the size tag preceding variable length
/// binary and string values (PTC 7/8 with PFC 0).
pub fn resolve(ptc: i32, pfc: i32, vplb: i32) -> Result<EncodingDescriptor, TypeError> {
    let unknown = || TypeError::UnknownType { ptc, pfc };

    let encoding = match ptc {
        1 if pfc == 0 => EncodingDescriptor::UnsignedInteger { size_in_bits: 1 },
        2 if (1..=32).contains(&pfc) => EncodingDescriptor::UnsignedInteger {
            size_in_bits: pfc as u32,
        },
        3 | 4 => {
            let size_in_bits = match pfc {
                0..=12 => pfc as u32 + 4,
                13 => 24,
                14 => 32,
                15 => 48,
                16 => 64,
                _ => return Err(unknown()),
            };
            if ptc == 3 {
                EncodingDescriptor::UnsignedInteger { size_in_bits }
            } else {
                EncodingDescriptor::SignedInteger { size_in_bits }
            }
        }
        5 => {
            let (size_in_bits, representation) = match pfc {
                1 => (32, FloatRepresentation::Ieee754),
                2 => (64, FloatRepresentation::Ieee754),
                3 => (32, FloatRepresentation::MilStd1750a),
                4 => (48, FloatRepresentation::MilStd1750a),
                _ => return Err(unknown()),
            };
            EncodingDescriptor::Float {
                size_in_bits,
                representation,
            }
        }
        6 if (1..=64).contains(&pfc) => EncodingDescriptor::UnsignedInteger {
            size_in_bits: pfc as u32,
        },
        7 | 8 => {
            let binary = ptc == 7;
            if pfc == 0 {
                if vplb < 0 {
                    return Err(TypeError::InvalidSizeTag { vplb });
                }
                let size_tag_bits = 8 * vplb as u32;
                if binary {
                    EncodingDescriptor::LeadingSizeBinary { size_tag_bits }
                } else {
                    EncodingDescriptor::LeadingSizeString { size_tag_bits }
                }
            } else if pfc > 0 {
                let size_in_bits = 8 * pfc as u32;
                if binary {
                    EncodingDescriptor::FixedBinary { size_in_bits }
                } else {
                    EncodingDescriptor::FixedString { size_in_bits }
                }
            } else {
                return Err(unknown());
            }
        }
        9 => EncodingDescriptor::AbsoluteTime {
            format: TimeFormat::from_pfc(pfc).ok_or_else(unknown)?,
            shift_bits: 0,
        },
        10 if (3..=18).contains(&pfc) => EncodingDescriptor::RelativeTime {
            format: TimeFormat::from_pfc(pfc).ok_or_else(unknown)?,
        },
        11 => EncodingDescriptor::Deduced,
        12 => EncodingDescriptor::Aggregate,
        _ => return Err(unknown()),
    };
    Ok(encoding)
}

/// Align CUC absolute times on a reference clock with more fine bytes
pub fn with_reference_clock(
    encoding: EncodingDescriptor,
    reference_fine_bytes: Option<u8>,
) -> EncodingDescriptor {
    match (encoding, reference_fine_bytes) {
        (EncodingDescriptor::AbsoluteTime { format, .. }, Some(reference)) => {
            let shift_bits = match format.fine_bytes() {
                Some(own) if own < reference => 8 * (reference - own) as u32,
                _ => 0,
            };
            EncodingDescriptor::AbsoluteTime { format, shift_bits }
        }
        (other, _) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TIME_SIZE_IN_BITS;

    /// Width in bits of a time value from the per-format table
    fn time_size_in_bits(pfc: i32) -> Option<u32> {
        if pfc == TIME_PFC_64 {
            return Some(64);
        }
        usize::try_from(pfc)
            .ok()
            .and_then(|i| TIME_SIZE_IN_BITS.get(i))
            .and_then(|&size| u32::try_from(size).ok())
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(
            resolve(3, 0, 1).unwrap(),
            EncodingDescriptor::UnsignedInteger { size_in_bits: 4 }
        );
        assert_eq!(
            resolve(3, 12, 1).unwrap(),
            EncodingDescriptor::UnsignedInteger { size_in_bits: 16 }
        );
        assert_eq!(
            resolve(4, 14, 1).unwrap(),
            EncodingDescriptor::SignedInteger { size_in_bits: 32 }
        );
        assert_eq!(
            resolve(4, 16, 1).unwrap(),
            EncodingDescriptor::SignedInteger { size_in_bits: 64 }
        );
        assert_eq!(
            resolve(1, 0, 1).unwrap(),
            EncodingDescriptor::UnsignedInteger { size_in_bits: 1 }
        );
        assert_eq!(resolve(6, 64, 1).unwrap().size_in_bits(), Some(64));
    }

    #[test]
    fn test_float_representations() {
        let mil = resolve(5, 4, 1).unwrap();
        assert_eq!(
            mil,
            EncodingDescriptor::Float {
                size_in_bits: 48,
                representation: FloatRepresentation::MilStd1750a
            }
        );
        assert!(mil.is_float());
        assert!(resolve(5, 5, 1).is_err());
    }

    #[test]
    fn test_variable_length_size_tag() {
        assert_eq!(
            resolve(7, 0, 2).unwrap(),
            EncodingDescriptor::LeadingSizeBinary { size_tag_bits: 16 }
        );
        assert_eq!(
            resolve(8, 0, 0).unwrap(),
            EncodingDescriptor::LeadingSizeString { size_tag_bits: 0 }
        );
        assert_eq!(
            resolve(8, 3, 1).unwrap(),
            EncodingDescriptor::FixedString { size_in_bits: 24 }
        );
        assert_eq!(
            resolve(7, 0, -1).unwrap_err(),
            TypeError::InvalidSizeTag { vplb: -1 }
        );
    }

    #[test]
    fn test_time_formats_follow_size_table() {
        for pfc in 1..=18 {
            let encoding = resolve(9, pfc, 1).unwrap();
            assert_eq!(encoding.size_in_bits(), time_size_in_bits(pfc));
        }
        for pfc in 3..=18 {
            let encoding = resolve(10, pfc, 1).unwrap();
            assert_eq!(encoding.size_in_bits(), time_size_in_bits(pfc));
        }
        assert_eq!(resolve(9, 30, 1).unwrap().size_in_bits(), Some(64));
        assert_eq!(resolve(9, 0, 1).unwrap().size_in_bits(), None);
        assert!(resolve(9, 19, 1).is_err());
        assert!(resolve(10, 2, 1).is_err());
    }

    #[test]
    fn test_sentinels_accept_any_format() {
        assert_eq!(resolve(11, 99, 1).unwrap(), EncodingDescriptor::Deduced);
        assert_eq!(resolve(12, 0, 1).unwrap(), EncodingDescriptor::Aggregate);
    }

    #[test]
    fn test_resolver_is_total() {
        let valid = |ptc: i32, pfc: i32| match ptc {
            1 => pfc == 0,
            2 => (1..=32).contains(&pfc),
            3 | 4 => (0..=16).contains(&pfc),
            5 => (1..=4).contains(&pfc),
            6 => (1..=64).contains(&pfc),
            7 | 8 => pfc >= 0,
            9 => (0..=18).contains(&pfc) || pfc == 30,
            10 => (3..=18).contains(&pfc),
            11 | 12 => true,
            _ => false,
        };

        for ptc in -1..=14 {
            for pfc in -2..=70 {
                let result = resolve(ptc, pfc, 1);
                if valid(ptc, pfc) {
                    assert!(result.is_ok(), "({},{}) should resolve", ptc, pfc);
                } else {
                    assert_eq!(result.unwrap_err(), TypeError::UnknownType { ptc, pfc });
                }
            }
        }
    }

    #[test]
    fn test_reference_clock_shift() {
        // CUC 4 coarse + 2 fine bytes against a 3 fine byte reference
        let encoding = resolve(9, 17, 1).unwrap();
        match with_reference_clock(encoding, Some(3)) {
            EncodingDescriptor::AbsoluteTime { shift_bits, .. } => assert_eq!(shift_bits, 8),
            other => panic!("Expected absolute time, got {:?}", other),
        }

        let cds = resolve(9, 1, 1).unwrap();
        assert_eq!(with_reference_clock(cds, Some(3)), cds);
    }
}
