use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

/// Opaque sync checkpoint: the highest stream position a client has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SyncCursor(pub u64);

impl SyncCursor {
    pub fn position(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SyncCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl FromStr for SyncCursor {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('s')
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
            .map(SyncCursor)
            .ok_or_else(|| ApiError::invalid_param(format!("Invalid sync token: {s}")))
    }
}
