// Copyright 2025 IsoTailor Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Concurrency-control strategies the advisor decides between.
//!
//! The numeric indices and the canonical ordering are part of the wire
//! contract: predictions are returned as the index, and label vectors are
//! stored in `ALL` order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of candidate strategies.
pub const STRATEGY_COUNT: usize = 3;

/// A concurrency-control isolation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// Full serializability.
    Serializable,
    /// Snapshot isolation with tailored validation.
    SiTailor,
    /// Read committed with tailored validation.
    RcTailor,
}

/// A strategy name that is not one of the canonical three.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown isolation strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl IsolationLevel {
    /// Canonical ordering used for label vectors and prediction indices.
    pub const ALL: [IsolationLevel; STRATEGY_COUNT] = [
        IsolationLevel::Serializable,
        IsolationLevel::SiTailor,
        IsolationLevel::RcTailor,
    ];

    /// Position in the canonical ordering (0, 1 or 2).
    pub fn index(self) -> usize {
        match self {
            IsolationLevel::Serializable => 0,
            IsolationLevel::SiTailor => 1,
            IsolationLevel::RcTailor => 2,
        }
    }

    /// Inverse of [`IsolationLevel::index`].
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Canonical name as it appears in benchmark summary records.
    pub fn name(self) -> &'static str {
        match self {
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::SiTailor => "SI_TAILOR",
            IsolationLevel::RcTailor => "RC_TAILOR",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IsolationLevel {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            "SI_TAILOR" => Ok(IsolationLevel::SiTailor),
            "RC_TAILOR" => Ok(IsolationLevel::RcTailor),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_matches_indices() {
        for (i, level) in IsolationLevel::ALL.iter().enumerate() {
            assert_eq!(level.index(), i);
            assert_eq!(IsolationLevel::from_index(i), Some(*level));
        }
        assert_eq!(IsolationLevel::from_index(STRATEGY_COUNT), None);
    }

    #[test]
    fn name_round_trip() {
        for level in IsolationLevel::ALL {
            assert_eq!(level.name().parse::<IsolationLevel>(), Ok(level));
        }
        assert!("REPEATABLE_READ".parse::<IsolationLevel>().is_err());
    }
}
