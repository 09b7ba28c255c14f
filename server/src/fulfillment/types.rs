//! Fulfillment Types

use std::fmt;
use std::num::{IntErrorKind, ParseIntError};

use thiserror::Error;

/// A validated, strictly positive quantity of Stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StarsAmount(u64);

/// Why user input could not become a [`StarsAmount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("not a whole number")]
    NotANumber,
    #[error("must be greater than zero")]
    NotPositive,
    #[error("must be at most {}", u64::MAX)]
    TooLarge,
}

impl StarsAmount {
    /// Create from a raw count; `None` for zero.
    pub const fn new(count: u64) -> Option<Self> {
        if count == 0 {
            None
        } else {
            Some(Self(count))
        }
    }

    /// Parse user input. Surrounding whitespace and a leading sign are accepted.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let value: i128 = input.trim().parse().map_err(|e: ParseIntError| match e.kind() {
            IntErrorKind::PosOverflow => AmountError::TooLarge,
            IntErrorKind::NegOverflow => AmountError::NotPositive,
            _ => AmountError::NotANumber,
        })?;
        if value <= 0 {
            return Err(AmountError::NotPositive);
        }
        u64::try_from(value)
            .map(Self)
            .map_err(|_| AmountError::TooLarge)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StarsAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What gets handed to the external automation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentRequest {
    pub stars_amount: StarsAmount,
    pub recipient: String,
}

/// Fulfillment errors.
#[derive(Error, Debug)]
pub enum FulfillmentError {
    #[error("Fulfillment queue is full")]
    QueueFull,
    #[error("Fulfillment pool is shut down")]
    PoolClosed,
    #[error("Failed to launch automation: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Automation error: {0}")]
    Automation(String),
}
