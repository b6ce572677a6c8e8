//! The fixed, ordered set of verification steps.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// One named unit of the verification pipeline.
///
/// Steps always run in the order of [`StepName::ALL`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepName {
    OcrVerification,
    DatabaseValidation,
    KeywordScanning,
    TextAlignmentCheck,
    WatermarkFontCheck,
}

impl StepName {
    /// Every step, in execution order.
    pub const ALL: [StepName; 5] = [
        StepName::OcrVerification,
        StepName::DatabaseValidation,
        StepName::KeywordScanning,
        StepName::TextAlignmentCheck,
        StepName::WatermarkFontCheck,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OcrVerification => "ocrVerification",
            Self::DatabaseValidation => "databaseValidation",
            Self::KeywordScanning => "keywordScanning",
            Self::TextAlignmentCheck => "textAlignmentCheck",
            Self::WatermarkFontCheck => "watermarkFontCheck",
        }
    }

    /// Position of this step in the pipeline.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| TypesError::UnknownStep(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_matches_declared_order() {
        for (i, step) in StepName::ALL.iter().enumerate() {
            assert_eq!(step.index(), i);
        }
    }

    #[test]
    fn parse_round_trips_names() {
        for step in StepName::ALL {
            assert_eq!(step.as_str().parse::<StepName>().unwrap(), step);
        }
        assert!("upload".parse::<StepName>().is_err());
    }

    #[test]
    fn serde_name_matches_as_str() {
        for step in StepName::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{}\"", step.as_str()));
        }
    }
}
