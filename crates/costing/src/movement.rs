//! Stock movement types and direction derivation.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use yaadbooks_core::DomainError;

/// Direction of a movement relative to on-hand stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Stock increases (receipt into inventory).
    Incoming,
    /// Stock decreases (issue out of inventory).
    Outgoing,
}

/// Stock movement type.
///
/// Serialized (and persisted) as `SCREAMING_SNAKE_CASE`, matching the
/// movement ledger's stored representation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Purchase,
    Sale,
    Return,
    Adjustment,
    TransferIn,
    TransferOut,
}

impl MovementType {
    /// The direction fixed by the movement type.
    ///
    /// Returns `None` for [`MovementType::Adjustment`], whose direction is
    /// decided by the sign of the caller-supplied quantity.
    pub fn fixed_direction(self) -> Option<Direction> {
        match self {
            MovementType::Purchase | MovementType::Return | MovementType::TransferIn => {
                Some(Direction::Incoming)
            }
            MovementType::Sale | MovementType::TransferOut => Some(Direction::Outgoing),
            MovementType::Adjustment => None,
        }
    }

    /// Stored/wire form of the movement type.
    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::Purchase => "PURCHASE",
            MovementType::Sale => "SALE",
            MovementType::Return => "RETURN",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::TransferIn => "TRANSFER_IN",
            MovementType::TransferOut => "TRANSFER_OUT",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PURCHASE" => Ok(MovementType::Purchase),
            "SALE" => Ok(MovementType::Sale),
            "RETURN" => Ok(MovementType::Return),
            "ADJUSTMENT" => Ok(MovementType::Adjustment),
            "TRANSFER_IN" => Ok(MovementType::TransferIn),
            "TRANSFER_OUT" => Ok(MovementType::TransferOut),
            other => Err(DomainError::invalid_input(format!(
                "unknown movement type: {other}"
            ))),
        }
    }
}
