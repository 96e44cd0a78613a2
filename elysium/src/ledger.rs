//! Elysium property ledger: issuance, denominations and balances
//!
//! Balances are confirmed amounts. Funds reserved by pending Sigma mints
//! stay in the confirmed balance until the mint confirms, but are not
//! spendable; [`PropertyLedger::balance_of`] reports what is spendable.

use crate::error::{ElysiumError, Result};
use crate::property::{
    Denomination, Ecosystem, Property, PropertyId, PropertyType, SigmaStatus, MAX_DENOMINATIONS,
    TEST_ECOSYSTEM_FIRST_ID,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type BalanceKey = (String, PropertyId);

/// Fields of a fixed-supply issuance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuance {
    pub issuer: String,
    pub ecosystem: Ecosystem,
    pub property_type: PropertyType,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub url: String,
    pub data: String,
    pub amount: u64,
    pub sigma_status: SigmaStatus,
}

#[derive(Debug, Clone, Default)]
pub struct PropertyLedger {
    properties: BTreeMap<PropertyId, Property>,
    balances: BTreeMap<BalanceKey, u64>,
    reserved: BTreeMap<BalanceKey, u64>,
}

impl PropertyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id the ecosystem would assign
    pub fn next_property_id(&self, ecosystem: Ecosystem) -> PropertyId {
        let last = match ecosystem {
            Ecosystem::Main => self.properties.range(..TEST_ECOSYSTEM_FIRST_ID).next_back(),
            Ecosystem::Test => self.properties.range(TEST_ECOSYSTEM_FIRST_ID..).next_back(),
        };
        last.map(|(id, _)| id + 1).unwrap_or_else(|| ecosystem.first_id())
    }

    /// Create a property and credit its whole supply to the issuer
    pub fn issue(&mut self, issuance: Issuance, txid: &str, block: u64) -> Result<PropertyId> {
        if self.properties.values().any(|p| p.creation_txid == txid) {
            return Err(ElysiumError::DuplicateIssuance(txid.to_string()));
        }
        if issuance.amount == 0 {
            return Err(ElysiumError::InvalidAmount("issuance amount must be positive".into()));
        }
        if issuance.name.is_empty() {
            return Err(ElysiumError::Packet("property name must not be empty".into()));
        }

        let id = self.next_property_id(issuance.ecosystem);
        let property = Property {
            id,
            ecosystem: issuance.ecosystem,
            property_type: issuance.property_type,
            name: issuance.name,
            category: issuance.category,
            subcategory: issuance.subcategory,
            url: issuance.url,
            data: issuance.data,
            issuer: issuance.issuer.clone(),
            total_supply: issuance.amount,
            creation_txid: txid.to_string(),
            creation_block: block,
            sigma_status: issuance.sigma_status,
            denominations: Vec::new(),
        };
        log::info!("🪙 Property {} \"{}\" issued by {} ({})", id, property.name, property.issuer, txid);
        self.properties.insert(id, property);
        self.credit(&issuance.issuer, id, issuance.amount);
        Ok(id)
    }

    /// Drop a property created by [`PropertyLedger::issue`], with its issuer credit
    pub(crate) fn remove_property(&mut self, id: PropertyId) {
        if let Some(property) = self.properties.remove(&id) {
            self.sub_confirmed(&property.issuer, id, property.total_supply);
        }
    }

    pub fn property(&self, id: PropertyId) -> Result<&Property> {
        self.properties.get(&id).ok_or(ElysiumError::PropertyNotFound(id))
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    fn property_mut(&mut self, id: PropertyId) -> Result<&mut Property> {
        self.properties.get_mut(&id).ok_or(ElysiumError::PropertyNotFound(id))
    }

    /// Enable Sigma and add `denominations`; re-adding an identical pair is a no-op.
    ///
    /// Returns the status before the call.
    pub fn enable_sigma(&mut self, id: PropertyId, denominations: &[Denomination]) -> Result<SigmaStatus> {
        let property = self.property_mut(id)?;
        let previous = property.sigma_status;
        if previous == SigmaStatus::HardDisabled {
            return Err(ElysiumError::SigmaNotEnabled);
        }

        let mut merged = property.denominations.clone();
        for denomination in denominations {
            match merged.get(denomination.id as usize) {
                Some(&existing) if existing == denomination.amount => continue,
                Some(_) => {
                    return Err(ElysiumError::SigmaAlreadyEnabledConflict {
                        existing_id: denomination.id,
                        amount: denomination.amount,
                    })
                }
                None => {}
            }
            if let Some(existing_id) = merged.iter().position(|&a| a == denomination.amount) {
                return Err(ElysiumError::SigmaAlreadyEnabledConflict {
                    existing_id: existing_id as u8,
                    amount: denomination.amount,
                });
            }
            if denomination.id as usize != merged.len() {
                return Err(ElysiumError::InvalidDenomination(denomination.id));
            }
            if merged.len() >= MAX_DENOMINATIONS {
                return Err(ElysiumError::TooManyDenominations(id));
            }
            merged.push(denomination.amount);
        }

        property.denominations = merged;
        if previous == SigmaStatus::SoftDisabled {
            property.sigma_status = SigmaStatus::SoftEnabled;
        }
        Ok(previous)
    }

    /// Denomination that `sender` would create on `id`
    pub fn check_new_denomination(&self, sender: &str, id: PropertyId, amount: u64) -> Result<Denomination> {
        let property = self.property(id)?;
        if !property.sigma_enabled() {
            return Err(ElysiumError::SigmaNotEnabled);
        }
        if property.issuer != sender {
            return Err(ElysiumError::NotIssuer(id));
        }
        if amount == 0 {
            return Err(ElysiumError::InvalidAmount("denomination must be positive".into()));
        }
        if property.denominations.len() >= MAX_DENOMINATIONS {
            return Err(ElysiumError::TooManyDenominations(id));
        }
        if let Some(existing_id) = property.denominations.iter().position(|&a| a == amount) {
            return Err(ElysiumError::SigmaAlreadyEnabledConflict {
                existing_id: existing_id as u8,
                amount,
            });
        }

        Ok(Denomination {
            id: property.denominations.len() as u8,
            amount,
        })
    }

    /// Issuer-only addition of the next denomination of an enabled property
    pub fn create_denomination(&mut self, sender: &str, id: PropertyId, amount: u64) -> Result<u8> {
        let denomination = self.check_new_denomination(sender, id, amount)?;
        self.enable_sigma(id, &[denomination])?;
        log::info!("Property {} denomination {} = {}", id, denomination.id, amount);
        Ok(denomination.id)
    }

    pub(crate) fn pop_denomination(&mut self, id: PropertyId) {
        if let Ok(property) = self.property_mut(id) {
            property.denominations.pop();
        }
    }

    pub(crate) fn set_sigma_status(&mut self, id: PropertyId, status: SigmaStatus) {
        if let Ok(property) = self.property_mut(id) {
            property.sigma_status = status;
        }
    }

    /// Spendable balance: confirmed minus reserved
    pub fn balance_of(&self, address: &str, id: PropertyId) -> u64 {
        self.confirmed_balance(address, id)
            .saturating_sub(self.reserved_of(address, id))
    }

    pub fn confirmed_balance(&self, address: &str, id: PropertyId) -> u64 {
        self.balances.get(&(address.to_string(), id)).copied().unwrap_or(0)
    }

    pub fn reserved_of(&self, address: &str, id: PropertyId) -> u64 {
        self.reserved.get(&(address.to_string(), id)).copied().unwrap_or(0)
    }

    /// Sum of confirmed balances of `id`
    pub fn total_balance(&self, id: PropertyId) -> u64 {
        self.balances
            .iter()
            .filter(|((_, pid), _)| *pid == id)
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Sum of reservations held against `id`
    pub fn total_reserved(&self, id: PropertyId) -> u64 {
        self.reserved
            .iter()
            .filter(|((_, pid), _)| *pid == id)
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Atomic debit and credit of spendable funds
    pub fn transfer(&mut self, from: &str, to: &str, id: PropertyId, amount: u64) -> Result<()> {
        self.check_transfer(id, amount, self.balance_of(from, id))?;
        self.sub_confirmed(from, id, amount);
        self.credit(to, id, amount);
        Ok(())
    }

    /// Transfer checked against confirmed funds only, as a block applies it.
    ///
    /// Reservations are left in place; the caller re-validates them.
    pub fn transfer_confirmed(&mut self, from: &str, to: &str, id: PropertyId, amount: u64) -> Result<()> {
        self.check_transfer(id, amount, self.confirmed_balance(from, id))?;
        self.sub_confirmed(from, id, amount);
        self.credit(to, id, amount);
        Ok(())
    }

    fn check_transfer(&self, id: PropertyId, amount: u64, available: u64) -> Result<()> {
        self.property(id)?;
        if amount == 0 {
            return Err(ElysiumError::InvalidAmount("amount must be positive".into()));
        }
        if available < amount {
            return Err(ElysiumError::InsufficientBalance);
        }
        Ok(())
    }

    pub(crate) fn credit(&mut self, address: &str, id: PropertyId, amount: u64) {
        *self.balances.entry((address.to_string(), id)).or_insert(0) += amount;
    }

    pub(crate) fn sub_confirmed(&mut self, address: &str, id: PropertyId, amount: u64) {
        let key = (address.to_string(), id);
        if let Some(balance) = self.balances.get_mut(&key) {
            *balance = balance.saturating_sub(amount);
            if *balance == 0 {
                self.balances.remove(&key);
            }
        }
    }

    /// Hold `amount` of spendable funds for a pending mint
    pub fn reserve(&mut self, address: &str, id: PropertyId, amount: u64) -> Result<()> {
        if self.balance_of(address, id) < amount {
            return Err(ElysiumError::InsufficientBalance);
        }
        *self.reserved.entry((address.to_string(), id)).or_insert(0) += amount;
        Ok(())
    }

    pub fn release(&mut self, address: &str, id: PropertyId, amount: u64) {
        let key = (address.to_string(), id);
        if let Some(reserved) = self.reserved.get_mut(&key) {
            *reserved = reserved.saturating_sub(amount);
            if *reserved == 0 {
                self.reserved.remove(&key);
            }
        }
    }

    pub(crate) fn clear_reservations(&mut self) {
        self.reserved.clear();
    }
}
