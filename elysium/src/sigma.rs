//! Sigma mint pipeline
//!
//! A mint request reserves funds and creates one [`PendingMint`] per unit.
//! The block carrying the mint transaction promotes them to
//! [`ConfirmedMint`]s placed in per-denomination anonymity groups. Spending
//! reveals the serial behind a confirmed commitment.

use crate::error::{ElysiumError, Result};
use crate::property::PropertyId;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Maximum mints per anonymity group
pub const SIGMA_MAX_GROUP_SIZE: u32 = 16384;

const SERIAL_DOMAIN: &[u8] = b"sigma-serial";

/// Wallet secret that serials are derived from
#[derive(Clone, PartialEq, Eq)]
pub struct SerialSeed([u8; 32]);

impl fmt::Debug for SerialSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SerialSeed(..)")
    }
}

impl SerialSeed {
    pub fn random() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self(seed)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Serial of unit `index`, hex encoded
    pub fn serial(&self, index: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(SERIAL_DOMAIN);
        hasher.update(self.0);
        hasher.update(index.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Public commitment to a hex serial
pub fn commitment_of(serial: &str) -> Result<String> {
    let bytes = hex::decode(serial).map_err(|_| ElysiumError::Packet("serial is not hex".into()))?;
    if bytes.len() != 32 {
        return Err(ElysiumError::Packet("serial must be 32 bytes".into()));
    }
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MintStatus {
    Pending,
    Confirmed,
    Spent,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMint {
    pub txid: String,
    pub address: String,
    pub property: PropertyId,
    pub denomination: u8,
    pub amount: u64,
    pub commitment: String,
    /// Chain tip when the mint was requested
    pub created_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedMint {
    pub txid: String,
    pub address: String,
    pub property: PropertyId,
    pub denomination: u8,
    pub amount: u64,
    pub commitment: String,
    pub block: u64,
    pub group: u32,
    pub index: u32,
}

/// Fill level of the open group of one (property, denomination)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCursor {
    pub group: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SigmaPool {
    pending: Vec<PendingMint>,
    confirmed: Vec<ConfirmedMint>,
    groups: BTreeMap<(PropertyId, u8), GroupCursor>,
    used_serials: BTreeMap<String, String>,
    spent: BTreeSet<String>,
    rolled_back: BTreeSet<String>,
}

impl SigmaPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[PendingMint] {
        &self.pending
    }

    pub fn confirmed(&self) -> &[ConfirmedMint] {
        &self.confirmed
    }

    pub fn has_pending(&self, txid: &str) -> bool {
        self.pending.iter().any(|m| m.txid == txid)
    }

    pub(crate) fn add_pending(&mut self, mints: Vec<PendingMint>) {
        if let Some(first) = mints.first() {
            self.rolled_back.remove(&first.txid);
        }
        self.pending.extend(mints);
    }

    /// Remove and return the pending mints of `txid`
    pub(crate) fn take_pending(&mut self, txid: &str) -> Vec<PendingMint> {
        let (taken, kept) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|m| m.txid == txid);
        self.pending = kept;
        taken
    }

    pub(crate) fn restore_pending_front(&mut self, mint: PendingMint) {
        self.pending.insert(0, mint);
    }

    /// Pending txids in request order
    pub fn pending_txids(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.pending
            .iter()
            .filter(|m| seen.insert(m.txid.clone()))
            .map(|m| m.txid.clone())
            .collect()
    }

    pub(crate) fn mark_rolled_back(&mut self, txid: &str) {
        self.rolled_back.insert(txid.to_string());
    }

    pub fn is_rolled_back(&self, txid: &str) -> bool {
        self.rolled_back.contains(txid)
    }

    pub fn group_cursor(&self, property: PropertyId, denomination: u8) -> GroupCursor {
        self.groups.get(&(property, denomination)).copied().unwrap_or_default()
    }

    /// Place `mint` in its anonymity group; returns the cursor before placement
    pub(crate) fn confirm(&mut self, mint: PendingMint, block: u64) -> GroupCursor {
        let key = (mint.property, mint.denomination);
        let previous = self.group_cursor(mint.property, mint.denomination);
        let mut cursor = previous;
        if cursor.size >= SIGMA_MAX_GROUP_SIZE {
            cursor = GroupCursor {
                group: cursor.group + 1,
                size: 0,
            };
        }

        let confirmed = ConfirmedMint {
            txid: mint.txid,
            address: mint.address,
            property: mint.property,
            denomination: mint.denomination,
            amount: mint.amount,
            commitment: mint.commitment,
            block,
            group: cursor.group,
            index: cursor.size,
        };
        cursor.size += 1;
        self.groups.insert(key, cursor);
        self.confirmed.push(confirmed);
        previous
    }

    /// Undo the latest confirmation of `commitment`
    pub(crate) fn unconfirm(&mut self, commitment: &str, previous: GroupCursor) -> Option<PendingMint> {
        let pos = self.confirmed.iter().rposition(|m| m.commitment == commitment)?;
        let mint = self.confirmed.remove(pos);
        self.groups.insert((mint.property, mint.denomination), previous);
        Some(PendingMint {
            txid: mint.txid,
            address: mint.address,
            property: mint.property,
            denomination: mint.denomination,
            amount: mint.amount,
            commitment: mint.commitment,
            created_block: mint.block.saturating_sub(1),
        })
    }

    /// Mints of one group, in confirmation order
    pub fn group_members(&self, property: PropertyId, denomination: u8, group: u32) -> Vec<&ConfirmedMint> {
        self.confirmed
            .iter()
            .filter(|m| m.property == property && m.denomination == denomination && m.group == group)
            .collect()
    }

    pub fn is_serial_used(&self, serial: &str) -> bool {
        self.used_serials.contains_key(serial)
    }

    pub fn is_spent(&self, commitment: &str) -> bool {
        self.spent.contains(commitment)
    }

    /// Check that `serial` opens an unspent confirmed mint of (property, denomination)
    pub fn check_spend(&self, property: PropertyId, denomination: u8, serial: &str) -> Result<&ConfirmedMint> {
        if self.is_serial_used(serial) {
            return Err(ElysiumError::SerialAlreadyUsed);
        }
        let commitment = commitment_of(serial)?;
        self.confirmed
            .iter()
            .find(|m| m.commitment == commitment && m.property == property && m.denomination == denomination)
            .ok_or(ElysiumError::MintNotFound)
    }

    pub(crate) fn use_serial(&mut self, serial: &str, commitment: &str) {
        self.used_serials.insert(serial.to_string(), commitment.to_string());
        self.spent.insert(commitment.to_string());
    }

    pub(crate) fn unuse_serial(&mut self, serial: &str) {
        if let Some(commitment) = self.used_serials.remove(serial) {
            self.spent.remove(&commitment);
        }
    }

    pub fn status(&self, commitment: &str) -> Option<MintStatus> {
        if self.spent.contains(commitment) {
            return Some(MintStatus::Spent);
        }
        if self.confirmed.iter().any(|m| m.commitment == commitment) {
            return Some(MintStatus::Confirmed);
        }
        self.pending
            .iter()
            .any(|m| m.commitment == commitment)
            .then_some(MintStatus::Pending)
    }

    /// Status of a mint transaction as a whole
    pub fn tx_status(&self, txid: &str) -> Option<MintStatus> {
        if self.has_pending(txid) {
            Some(MintStatus::Pending)
        } else if self.confirmed.iter().any(|m| m.txid == txid) {
            Some(MintStatus::Confirmed)
        } else if self.is_rolled_back(txid) {
            Some(MintStatus::RolledBack)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(txid: &str, seed: &SerialSeed, index: u32) -> PendingMint {
        PendingMint {
            txid: txid.to_string(),
            address: "alice".to_string(),
            property: 3,
            denomination: 0,
            amount: 1,
            commitment: commitment_of(&seed.serial(index)).unwrap(),
            created_block: 10,
        }
    }

    #[test]
    fn test_serials_are_seeded() {
        let a = SerialSeed::from_bytes([1; 32]);
        let b = SerialSeed::from_bytes([2; 32]);

        assert_eq!(a.serial(0), a.serial(0));
        assert_ne!(a.serial(0), a.serial(1));
        assert_ne!(a.serial(0), b.serial(0));
        assert_ne!(SerialSeed::random(), SerialSeed::random());
        assert!(commitment_of("zz").is_err());
    }

    #[test]
    fn test_confirm_and_unconfirm() {
        let seed = SerialSeed::from_bytes([7; 32]);
        let mut pool = SigmaPool::new();
        pool.add_pending(vec![pending("tx1", &seed, 0)]);
        assert_eq!(pool.tx_status("tx1"), Some(MintStatus::Pending));

        let mint = pool.take_pending("tx1").remove(0);
        let commitment = mint.commitment.clone();
        let previous = pool.confirm(mint, 11);
        assert!(pool.pending().is_empty());
        assert_eq!(pool.confirmed().len(), 1);
        assert_eq!(pool.status(&commitment), Some(MintStatus::Confirmed));
        assert_eq!(pool.group_cursor(3, 0), GroupCursor { group: 0, size: 1 });

        let back = pool.unconfirm(&commitment, previous).unwrap();
        assert_eq!(back.commitment, commitment);
        assert!(pool.confirmed().is_empty());
        assert_eq!(pool.group_cursor(3, 0), GroupCursor::default());
    }

    #[test]
    fn test_group_rolls_over_when_full() {
        let seed = SerialSeed::from_bytes([9; 32]);
        let mut pool = SigmaPool::new();
        pool.groups.insert(
            (3, 0),
            GroupCursor {
                group: 0,
                size: SIGMA_MAX_GROUP_SIZE,
            },
        );

        pool.confirm(pending("tx1", &seed, 0), 5);
        let mint = &pool.confirmed()[0];
        assert_eq!((mint.group, mint.index), (1, 0));
        assert_eq!(pool.group_members(3, 0, 1).len(), 1);
    }

    #[test]
    fn test_spend_marks_serial_used() {
        let seed = SerialSeed::from_bytes([3; 32]);
        let serial = seed.serial(0);
        let mut pool = SigmaPool::new();
        pool.confirm(pending("tx1", &seed, 0), 5);

        assert!(matches!(pool.check_spend(3, 1, &serial), Err(ElysiumError::MintNotFound)));
        let commitment = pool.check_spend(3, 0, &serial).unwrap().commitment.clone();
        pool.use_serial(&serial, &commitment);

        assert_eq!(pool.status(&commitment), Some(MintStatus::Spent));
        assert!(matches!(pool.check_spend(3, 0, &serial), Err(ElysiumError::SerialAlreadyUsed)));

        pool.unuse_serial(&serial);
        assert!(pool.check_spend(3, 0, &serial).is_ok());
    }

    #[test]
    fn test_pending_txids_in_request_order() {
        let seed = SerialSeed::from_bytes([4; 32]);
        let mut pool = SigmaPool::new();
        pool.add_pending(vec![pending("b", &seed, 0), pending("b", &seed, 1)]);
        pool.add_pending(vec![pending("a", &seed, 2)]);

        assert_eq!(pool.pending_txids(), vec!["b".to_string(), "a".to_string()]);
    }
}
