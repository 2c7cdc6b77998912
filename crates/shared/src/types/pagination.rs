//! Page size clamping for list operations.

use serde::{Deserialize, Serialize};

/// Default number of items returned when the caller does not ask for a size.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Hard upper bound on the number of items a single list call returns.
pub const MAX_PAGE_SIZE: u64 = 200;

/// A bounded page size.
///
/// Requested sizes are clamped into `1..=max`, so a caller can never pull an
/// unbounded result set through a list operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLimit(u64);

impl PageLimit {
    /// Clamps `requested` against `max`, falling back to `default` when absent.
    #[must_use]
    pub fn clamp(requested: Option<u64>, default: u64, max: u64) -> Self {
        let max = max.max(1);
        let limit = requested.unwrap_or(default).clamp(1, max);
        Self(limit)
    }

    /// Clamps `requested` using the built-in defaults.
    #[must_use]
    pub fn from_request(requested: Option<u64>) -> Self {
        Self::clamp(requested, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// Returns the limit for database queries.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Default for PageLimit {
    fn default() -> Self {
        Self(DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, 50)]
    #[case(Some(10), 10)]
    #[case(Some(0), 1)]
    #[case(Some(10_000), 200)]
    fn test_from_request(#[case] requested: Option<u64>, #[case] expected: u64) {
        assert_eq!(PageLimit::from_request(requested).get(), expected);
    }

    #[test]
    fn test_clamp_with_custom_bounds() {
        assert_eq!(PageLimit::clamp(Some(30), 5, 20).get(), 20);
        assert_eq!(PageLimit::clamp(None, 5, 20).get(), 5);
        assert_eq!(PageLimit::clamp(None, 5, 0).get(), 1);
    }
}
