//! Validated pagination arguments and the page wrapper.

use serde::{Deserialize, Serialize};

use crate::common::errors::{AppError, AppResult};

const MAX_LIMIT: i64 = 100;
const DEFAULT_LIMIT: i64 = 20;

/// Limit/offset pagination, validated at construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageArgs {
    limit: i64,
    offset: i64,
}

impl PageArgs {
    /// Build validated args. Limit must be 1–100, offset non-negative.
    pub fn new(limit: i64, offset: i64) -> AppResult<Self> {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        if offset < 0 {
            return Err(AppError::InvalidInput("offset must be non-negative".into()));
        }
        Ok(Self { limit, offset })
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

impl Default for PageArgs {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// One page of results with the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_args_pass() {
        let args = PageArgs::new(50, 10).unwrap();
        assert_eq!(args.limit(), 50);
        assert_eq!(args.offset(), 10);
    }

    #[test]
    fn out_of_range_limit_rejected() {
        assert!(PageArgs::new(0, 0).is_err());
        assert!(PageArgs::new(101, 0).is_err());
        assert!(PageArgs::new(-5, 0).is_err());
    }

    #[test]
    fn negative_offset_rejected() {
        assert!(PageArgs::new(10, -1).is_err());
    }
}
