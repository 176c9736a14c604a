//! Association Number.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Association Number: the 2-bit index selecting one of up to four secure
/// associations within a secure channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AssocNum(u8);

impl AssocNum {
    /// Number of associations per channel.
    pub const COUNT: usize = 4;

    pub const AN0: AssocNum = AssocNum(0);
    pub const AN1: AssocNum = AssocNum(1);
    pub const AN2: AssocNum = AssocNum(2);
    pub const AN3: AssocNum = AssocNum(3);

    pub const ALL: [AssocNum; 4] = [Self::AN0, Self::AN1, Self::AN2, Self::AN3];

    pub const fn new(an: u8) -> Result<Self, ParseError> {
        if an < 4 {
            Ok(AssocNum(an))
        } else {
            Err(ParseError::InvalidAssocNum(an))
        }
    }

    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AssocNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for AssocNum {
    type Error = ParseError;

    fn try_from(an: u8) -> Result<Self, Self::Error> {
        AssocNum::new(an)
    }
}

impl From<AssocNum> for u8 {
    fn from(an: AssocNum) -> u8 {
        an.0
    }
}
