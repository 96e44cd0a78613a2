//! Elysium properties: identity, type and Sigma configuration

use crate::error::{ElysiumError, Result};
use serde::{Deserialize, Serialize};

pub type PropertyId = u32;

/// First id handed out in the main ecosystem; 1 and 2 are reserved
pub const MAIN_ECOSYSTEM_FIRST_ID: PropertyId = 3;

/// First id handed out in the test ecosystem
pub const TEST_ECOSYSTEM_FIRST_ID: PropertyId = 0x8000_0003;

/// Maximum denominations per property
pub const MAX_DENOMINATIONS: usize = 255;

/// Base units per token of a divisible property
pub const DIVISIBLE_UNIT: u64 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ecosystem {
    Main = 1,
    Test = 2,
}

impl Ecosystem {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Ecosystem::Main),
            2 => Ok(Ecosystem::Test),
            other => Err(ElysiumError::Packet(format!("unknown ecosystem {}", other))),
        }
    }

    pub fn first_id(&self) -> PropertyId {
        match self {
            Ecosystem::Main => MAIN_ECOSYSTEM_FIRST_ID,
            Ecosystem::Test => TEST_ECOSYSTEM_FIRST_ID,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Indivisible = 1,
    Divisible = 2,
}

impl PropertyType {
    pub fn from_u16(value: u16) -> Result<Self> {
        match value {
            1 => Ok(PropertyType::Indivisible),
            2 => Ok(PropertyType::Divisible),
            other => Err(ElysiumError::Packet(format!("unknown property type {}", other))),
        }
    }

    pub fn is_divisible(&self) -> bool {
        matches!(self, PropertyType::Divisible)
    }

    /// Parse a user amount string ("100", "1.5") into base units
    pub fn parse_amount(&self, input: &str) -> Result<u64> {
        let invalid = || ElysiumError::InvalidAmount(input.to_string());
        let input = input.trim();
        let (whole, fraction) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
        match self {
            PropertyType::Indivisible => {
                if fraction.trim_end_matches('0').is_empty() {
                    Ok(whole)
                } else {
                    Err(invalid())
                }
            }
            PropertyType::Divisible => {
                if fraction.len() > 8 {
                    return Err(invalid());
                }
                let padded = format!("{:0<8}", fraction);
                let fraction: u64 = padded.parse().map_err(|_| invalid())?;
                whole
                    .checked_mul(DIVISIBLE_UNIT)
                    .and_then(|w| w.checked_add(fraction))
                    .ok_or_else(invalid)
            }
        }
    }

    /// Render base units the way RPC returns them
    pub fn format_amount(&self, amount: u64) -> String {
        match self {
            PropertyType::Indivisible => amount.to_string(),
            PropertyType::Divisible => format!("{}.{:08}", amount / DIVISIBLE_UNIT, amount % DIVISIBLE_UNIT),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SigmaStatus {
    #[default]
    SoftDisabled = 0,
    SoftEnabled = 1,
    HardDisabled = 2,
    HardEnabled = 3,
}

impl SigmaStatus {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SigmaStatus::SoftDisabled),
            1 => Ok(SigmaStatus::SoftEnabled),
            2 => Ok(SigmaStatus::HardDisabled),
            3 => Ok(SigmaStatus::HardEnabled),
            other => Err(ElysiumError::Packet(format!("unknown sigma status {}", other))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, SigmaStatus::SoftEnabled | SigmaStatus::HardEnabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denomination {
    pub id: u8,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub ecosystem: Ecosystem,
    pub property_type: PropertyType,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub url: String,
    pub data: String,
    pub issuer: String,
    pub total_supply: u64,
    pub creation_txid: String,
    pub creation_block: u64,
    pub sigma_status: SigmaStatus,
    /// Denomination amounts; the index is the denomination id
    pub denominations: Vec<u64>,
}

impl Property {
    pub fn sigma_enabled(&self) -> bool {
        self.sigma_status.is_enabled()
    }

    /// Minting needs Sigma enabled and at least one denomination
    pub fn accepts_mints(&self) -> bool {
        self.sigma_enabled() && !self.denominations.is_empty()
    }

    pub fn denomination(&self, id: u8) -> Option<u64> {
        self.denominations.get(id as usize).copied()
    }

    pub fn denomination_list(&self) -> Vec<Denomination> {
        self.denominations
            .iter()
            .enumerate()
            .map(|(id, amount)| Denomination { id: id as u8, amount: *amount })
            .collect()
    }

    pub fn format_amount(&self, amount: u64) -> String {
        self.property_type.format_amount(amount)
    }
}
