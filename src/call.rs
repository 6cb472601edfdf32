//! Copy-number call classification from log2 ratios

use crate::{CnvError, CnvResult};
use std::fmt;

/// Upper bound (inclusive) of the homozygous deletion bucket
pub const HOM_DEL_MAX_LOG2: f64 = -1.1;
/// Upper bound (inclusive) of the heterozygous deletion bucket
pub const HET_DEL_MAX_LOG2: f64 = -0.4;
/// Upper bound (inclusive) of the wild type bucket
pub const WILD_TYPE_MAX_LOG2: f64 = 0.3;

/// Categorical copy-number state, encoded 0..=3 in tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallClass {
    HomDeletion = 0,
    HetDeletion = 1,
    WildType = 2,
    Duplication = 3,
}

impl CallClass {
    pub const ALL: [CallClass; 4] = [
        CallClass::HomDeletion,
        CallClass::HetDeletion,
        CallClass::WildType,
        CallClass::Duplication,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CallClass::HomDeletion),
            1 => Some(CallClass::HetDeletion),
            2 => Some(CallClass::WildType),
            3 => Some(CallClass::Duplication),
            _ => None,
        }
    }

    pub fn is_deletion(self) -> bool {
        matches!(self, CallClass::HomDeletion | CallClass::HetDeletion)
    }
}

impl fmt::Display for CallClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Classify a log2 ratio. Buckets are closed on their upper side.
pub fn classify(log2: f64) -> CnvResult<CallClass> {
    if log2.is_nan() {
        return Err(CnvError::InvalidSignal {
            value: log2.to_string(),
            locus: "classification".to_string(),
        });
    }

    let call = if log2 <= HOM_DEL_MAX_LOG2 {
        CallClass::HomDeletion
    } else if log2 <= HET_DEL_MAX_LOG2 {
        CallClass::HetDeletion
    } else if log2 <= WILD_TYPE_MAX_LOG2 {
        CallClass::WildType
    } else {
        CallClass::Duplication
    };

    Ok(call)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(-1.1).unwrap(), CallClass::HomDeletion);
        assert_eq!(classify(-1.0999).unwrap(), CallClass::HetDeletion);
        assert_eq!(classify(-0.4).unwrap(), CallClass::HetDeletion);
        assert_eq!(classify(-0.3999).unwrap(), CallClass::WildType);
        assert_eq!(classify(0.3).unwrap(), CallClass::WildType);
        assert_eq!(classify(0.3001).unwrap(), CallClass::Duplication);
    }

    #[test]
    fn test_classify_extremes() {
        assert_eq!(classify(f64::NEG_INFINITY).unwrap(), CallClass::HomDeletion);
        assert_eq!(classify(f64::INFINITY).unwrap(), CallClass::Duplication);
        assert_eq!(classify(0.0).unwrap(), CallClass::WildType);
    }

    #[test]
    fn test_classify_nan() {
        assert!(matches!(classify(f64::NAN), Err(CnvError::InvalidSignal { .. })));
    }

    #[test]
    fn test_codes() {
        for call in CallClass::ALL {
            assert_eq!(CallClass::from_code(call.code()), Some(call));
        }
        assert_eq!(CallClass::from_code(4), None);
        assert!(CallClass::HetDeletion.is_deletion());
        assert!(!CallClass::Duplication.is_deletion());
    }
}
