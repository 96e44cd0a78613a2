//! Elysium block driver
//!
//! [`ElysiumState`] applies the Elysium packets of each connected block to
//! the property ledger and the Sigma pool, and records an undo log so a
//! disconnected block can be reverted exactly.

use crate::error::{ElysiumError, Result};
use crate::ledger::{Issuance, PropertyLedger};
use crate::packet::{ElysiumPacket, ElysiumTx, SigmaMintEntry};
use crate::property::{Property, PropertyId, SigmaStatus};
use crate::sigma::{ConfirmedMint, GroupCursor, MintStatus, PendingMint, SigmaPool};
use std::collections::BTreeSet;
use tecra_core::{Block, Transaction};

/// Upper bound on the units one mint transaction may request
pub const MAX_MINTS_PER_TX: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum UndoOp {
    Credited {
        address: String,
        property: PropertyId,
        amount: u64,
    },
    Debited {
        address: String,
        property: PropertyId,
        amount: u64,
    },
    PropertyCreated(PropertyId),
    DenominationAdded {
        property: PropertyId,
        previous_status: SigmaStatus,
    },
    MintConfirmed {
        commitment: String,
        previous: GroupCursor,
    },
    SerialUsed(String),
}

/// Everything needed to revert one connected block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElysiumUndo {
    pub height: u64,
    previous_tip: u64,
    ops: Vec<UndoOp>,
    /// Pending mints this block left unaffordable
    pub rolled_back: Vec<String>,
}

impl ElysiumUndo {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ElysiumState {
    sigma_start_height: u64,
    tip_height: u64,
    ledger: PropertyLedger,
    sigma: SigmaPool,
}

impl ElysiumState {
    pub fn new(sigma_start_height: u64) -> Self {
        Self {
            sigma_start_height,
            tip_height: 0,
            ledger: PropertyLedger::new(),
            sigma: SigmaPool::new(),
        }
    }

    pub fn tip_height(&self) -> u64 {
        self.tip_height
    }

    pub fn ledger(&self) -> &PropertyLedger {
        &self.ledger
    }

    pub fn sigma(&self) -> &SigmaPool {
        &self.sigma
    }

    pub fn property(&self, id: PropertyId) -> Result<&Property> {
        self.ledger.property(id)
    }

    pub fn properties(&self) -> Vec<&Property> {
        self.ledger.properties().collect()
    }

    /// Spendable balance; funds held by pending mints are excluded
    pub fn balance_of(&self, address: &str, property: PropertyId) -> u64 {
        self.ledger.balance_of(address, property)
    }

    pub fn reserved_of(&self, address: &str, property: PropertyId) -> u64 {
        self.ledger.reserved_of(address, property)
    }

    pub fn list_pending(&self) -> &[PendingMint] {
        self.sigma.pending()
    }

    pub fn list_confirmed(&self) -> &[ConfirmedMint] {
        self.sigma.confirmed()
    }

    fn sigma_active(&self, height: u64) -> Result<()> {
        if height < self.sigma_start_height {
            return Err(ElysiumError::SigmaInactive {
                height,
                start: self.sigma_start_height,
            });
        }
        Ok(())
    }

    /// Amount locked by `mints`; balances are not consulted.
    ///
    /// Commitments still pending on this node only count as duplicates for
    /// local requests, so block validation never depends on the mempool.
    fn mint_total(&self, property: PropertyId, mints: &[SigmaMintEntry], local: bool) -> Result<u64> {
        let prop = self.ledger.property(property)?;
        if !prop.accepts_mints() {
            return Err(ElysiumError::SigmaNotEnabled);
        }
        if mints.is_empty() {
            return Err(ElysiumError::InvalidAmount("no mints requested".into()));
        }
        if mints.len() > MAX_MINTS_PER_TX {
            return Err(ElysiumError::InvalidAmount(format!(
                "at most {} mints per transaction",
                MAX_MINTS_PER_TX
            )));
        }

        let mut total: u64 = 0;
        let mut commitments = BTreeSet::new();
        for mint in mints {
            let amount = prop
                .denomination(mint.denomination)
                .ok_or(ElysiumError::InvalidDenomination(mint.denomination))?;
            let known = match self.sigma.status(&mint.commitment) {
                Some(MintStatus::Pending) => local,
                Some(_) => true,
                None => false,
            };
            if known || !commitments.insert(mint.commitment.as_str()) {
                return Err(ElysiumError::Packet(format!("duplicate commitment {}", mint.commitment)));
            }
            total = total
                .checked_add(amount)
                .ok_or_else(|| ElysiumError::InvalidAmount("mint total overflows".into()))?;
        }
        Ok(total)
    }

    /// Validate a local mint request by `sender` at `height`; returns the total amount
    fn check_mint(&self, sender: &str, property: PropertyId, mints: &[SigmaMintEntry], height: u64) -> Result<u64> {
        let total = self.mint_total(property, mints, true)?;
        if self.ledger.balance_of(sender, property) < total {
            return Err(ElysiumError::InsufficientBalance);
        }
        self.sigma_active(height)?;
        Ok(total)
    }

    /// Validate a mint carried by a block; only confirmed funds count
    fn check_block_mint(
        &self,
        sender: &str,
        property: PropertyId,
        mints: &[SigmaMintEntry],
        height: u64,
    ) -> Result<u64> {
        let total = self.mint_total(property, mints, false)?;
        if self.ledger.confirmed_balance(sender, property) < total {
            return Err(ElysiumError::InsufficientBalance);
        }
        self.sigma_active(height)?;
        Ok(total)
    }

    /// Pre-check a mint of `units` units of `denominations` before commitments exist.
    ///
    /// `denominations` holds one id per unit.
    pub fn check_mint_request(&self, sender: &str, property: PropertyId, denominations: &[u8]) -> Result<()> {
        let prop = self.ledger.property(property)?;
        if !prop.accepts_mints() {
            return Err(ElysiumError::SigmaNotEnabled);
        }
        if denominations.is_empty() {
            return Err(ElysiumError::InvalidAmount("no mints requested".into()));
        }
        if denominations.len() > MAX_MINTS_PER_TX {
            return Err(ElysiumError::InvalidAmount(format!(
                "at most {} mints per transaction",
                MAX_MINTS_PER_TX
            )));
        }
        let mut total: u64 = 0;
        for id in denominations {
            let amount = prop.denomination(*id).ok_or(ElysiumError::InvalidDenomination(*id))?;
            total = total
                .checked_add(amount)
                .ok_or_else(|| ElysiumError::InvalidAmount("mint total overflows".into()))?;
        }
        if self.ledger.balance_of(sender, property) < total {
            return Err(ElysiumError::InsufficientBalance);
        }
        self.sigma_active(self.tip_height + 1)
    }

    /// Reserve funds for a mint transaction and record its units as pending
    pub fn request_mint(
        &mut self,
        txid: &str,
        sender: &str,
        property: PropertyId,
        mints: &[SigmaMintEntry],
    ) -> Result<Vec<PendingMint>> {
        let total = self.check_mint(sender, property, mints, self.tip_height + 1)?;
        let prop = self.ledger.property(property)?;
        let pending: Vec<PendingMint> = mints
            .iter()
            .map(|mint| PendingMint {
                txid: txid.to_string(),
                address: sender.to_string(),
                property,
                denomination: mint.denomination,
                amount: prop.denomination(mint.denomination).unwrap_or(0),
                commitment: mint.commitment.clone(),
                created_block: self.tip_height,
            })
            .collect();

        self.ledger.reserve(sender, property, total)?;
        self.sigma.add_pending(pending.clone());
        log::info!(
            "🔒 Sigma mint {} requested: {} unit(s) of property {} ({} reserved)",
            txid,
            pending.len(),
            property,
            total
        );
        Ok(pending)
    }

    /// Drop the pending mints of `txid` and release their funds.
    ///
    /// Returns false when nothing was pending.
    pub fn rollback(&mut self, txid: &str) -> bool {
        let mints = self.sigma.take_pending(txid);
        if mints.is_empty() {
            return false;
        }
        for mint in &mints {
            self.ledger.release(&mint.address, mint.property, mint.amount);
        }
        self.sigma.mark_rolled_back(txid);
        log::info!("↩️  Sigma mint {} rolled back", txid);
        true
    }

    /// Check a packet against the current tip before it enters the mempool
    pub fn check_transaction(&self, tx: &ElysiumTx) -> Result<()> {
        let height = self.tip_height + 1;
        match tx {
            ElysiumTx::SimpleSend {
                from, property, amount, ..
            } => {
                self.ledger.property(*property)?;
                if *amount == 0 {
                    return Err(ElysiumError::InvalidAmount("amount must be positive".into()));
                }
                if self.ledger.balance_of(from, *property) < *amount {
                    return Err(ElysiumError::InsufficientBalance);
                }
                Ok(())
            }
            ElysiumTx::IssuanceFixed {
                previous_id, amount, name, ..
            } => {
                if *previous_id != 0 {
                    return Err(ElysiumError::Packet("previous property id must be 0".into()));
                }
                if *amount == 0 {
                    return Err(ElysiumError::InvalidAmount("issuance amount must be positive".into()));
                }
                if name.is_empty() {
                    return Err(ElysiumError::Packet("property name must not be empty".into()));
                }
                Ok(())
            }
            ElysiumTx::CreateDenomination {
                sender, property, amount,
            } => self.ledger.check_new_denomination(sender, *property, *amount).map(|_| ()),
            ElysiumTx::SigmaMint {
                sender, property, mints,
            } => self.check_mint(sender, *property, mints, height).map(|_| ()),
            ElysiumTx::SigmaSpend {
                property,
                denomination,
                serial,
                ..
            } => self.check_spend(*property, *denomination, serial, height).map(|_| ()),
        }
    }

    fn check_spend(&self, property: PropertyId, denomination: u8, serial: &str, height: u64) -> Result<(String, u64)> {
        let prop = self.ledger.property(property)?;
        if !prop.sigma_enabled() {
            return Err(ElysiumError::SigmaNotEnabled);
        }
        let amount = prop
            .denomination(denomination)
            .ok_or(ElysiumError::InvalidDenomination(denomination))?;
        self.sigma_active(height)?;
        let mint = self.sigma.check_spend(property, denomination, serial)?;
        Ok((mint.commitment.clone(), amount))
    }

    /// Apply every Elysium packet in `block`; invalid ones are skipped
    pub fn connect_block(&mut self, block: &Block) -> ElysiumUndo {
        let height = block.height();
        let mut undo = ElysiumUndo {
            height,
            previous_tip: self.tip_height,
            ops: Vec::new(),
            rolled_back: Vec::new(),
        };

        for tx in block.regular_transactions() {
            let packet = match ElysiumPacket::from_transaction(tx) {
                None => continue,
                Some(Ok(packet)) => packet,
                Some(Err(e)) => {
                    log::warn!("Skipping malformed Elysium packet in {}: {}", tx.txid, e);
                    continue;
                }
            };
            let kind = packet.tx.kind();
            if let Err(e) = self.apply(tx, packet.tx, height, &mut undo.ops) {
                log::warn!("Skipping invalid Elysium {} {}: {}", kind, tx.txid, e);
                if self.rollback(&tx.txid) {
                    log::warn!("Pending mint {} dropped after failing in block {}", tx.txid, height);
                }
            }
        }

        self.tip_height = height;
        undo.rolled_back = self.rebuild_reservations();
        log::debug!("Elysium state at block {} ({} change(s))", height, undo.ops.len());
        undo
    }

    fn apply(&mut self, tx: &Transaction, etx: ElysiumTx, height: u64, ops: &mut Vec<UndoOp>) -> Result<()> {
        match etx {
            ElysiumTx::SimpleSend {
                from,
                to,
                property,
                amount,
            } => {
                self.ledger.transfer_confirmed(&from, &to, property, amount)?;
                ops.push(UndoOp::Debited {
                    address: from,
                    property,
                    amount,
                });
                ops.push(UndoOp::Credited {
                    address: to,
                    property,
                    amount,
                });
            }
            ElysiumTx::IssuanceFixed {
                issuer,
                ecosystem,
                property_type,
                previous_id,
                category,
                subcategory,
                name,
                url,
                data,
                amount,
                sigma_status,
            } => {
                if previous_id != 0 {
                    return Err(ElysiumError::Packet("previous property id must be 0".into()));
                }
                let issuance = Issuance {
                    issuer,
                    ecosystem,
                    property_type,
                    name,
                    category,
                    subcategory,
                    url,
                    data,
                    amount,
                    sigma_status,
                };
                let id = self.ledger.issue(issuance, &tx.txid, height)?;
                ops.push(UndoOp::PropertyCreated(id));
            }
            ElysiumTx::CreateDenomination {
                sender,
                property,
                amount,
            } => {
                let previous_status = self.ledger.property(property)?.sigma_status;
                self.ledger.create_denomination(&sender, property, amount)?;
                ops.push(UndoOp::DenominationAdded {
                    property,
                    previous_status,
                });
            }
            ElysiumTx::SigmaMint {
                sender,
                property,
                mints,
            } => self.confirm_mint(tx, sender, property, mints, height, ops)?,
            ElysiumTx::SigmaSpend {
                property,
                denomination,
                serial,
                recipient,
            } => {
                let (commitment, amount) = self.check_spend(property, denomination, &serial, height)?;
                self.sigma.use_serial(&serial, &commitment);
                self.ledger.credit(&recipient, property, amount);
                ops.push(UndoOp::SerialUsed(serial));
                ops.push(UndoOp::Credited {
                    address: recipient.clone(),
                    property,
                    amount,
                });
                log::info!("Sigma spend of {} credited {} to {}", commitment, amount, recipient);
            }
        }
        Ok(())
    }

    fn confirm_mint(
        &mut self,
        tx: &Transaction,
        sender: String,
        property: PropertyId,
        mints: Vec<SigmaMintEntry>,
        height: u64,
        ops: &mut Vec<UndoOp>,
    ) -> Result<()> {
        let pending = self.sigma.take_pending(&tx.txid);
        for mint in &pending {
            self.ledger.release(&mint.address, mint.property, mint.amount);
        }
        if let Err(e) = self.check_block_mint(&sender, property, &mints, height) {
            if !pending.is_empty() {
                self.sigma.mark_rolled_back(&tx.txid);
            }
            return Err(e);
        }

        let prop = self.ledger.property(property)?;
        let pending: Vec<PendingMint> = mints
            .iter()
            .map(|mint| PendingMint {
                txid: tx.txid.clone(),
                address: sender.clone(),
                property,
                denomination: mint.denomination,
                amount: prop.denomination(mint.denomination).unwrap_or(0),
                commitment: mint.commitment.clone(),
                created_block: height.saturating_sub(1),
            })
            .collect();

        let count = pending.len();
        for mint in pending {
            self.ledger.sub_confirmed(&mint.address, mint.property, mint.amount);
            ops.push(UndoOp::Debited {
                address: mint.address.clone(),
                property: mint.property,
                amount: mint.amount,
            });
            let commitment = mint.commitment.clone();
            let previous = self.sigma.confirm(mint, height);
            ops.push(UndoOp::MintConfirmed { commitment, previous });
        }
        log::info!("✅ Sigma mint {} confirmed at block {}: {} unit(s)", tx.txid, height, count);
        Ok(())
    }

    /// Revert a block applied by [`ElysiumState::connect_block`].
    ///
    /// Mints it confirmed return to pending. Reservations are then rebuilt in
    /// request order; mints that can no longer be afforded are rolled back and
    /// their txids returned.
    pub fn disconnect_block(&mut self, undo: ElysiumUndo) -> Vec<String> {
        for op in undo.ops.into_iter().rev() {
            match op {
                UndoOp::Credited {
                    address,
                    property,
                    amount,
                } => self.ledger.sub_confirmed(&address, property, amount),
                UndoOp::Debited {
                    address,
                    property,
                    amount,
                } => self.ledger.credit(&address, property, amount),
                UndoOp::PropertyCreated(id) => self.ledger.remove_property(id),
                UndoOp::DenominationAdded {
                    property,
                    previous_status,
                } => {
                    self.ledger.pop_denomination(property);
                    self.ledger.set_sigma_status(property, previous_status);
                }
                UndoOp::MintConfirmed { commitment, previous } => {
                    if let Some(mint) = self.sigma.unconfirm(&commitment, previous) {
                        self.sigma.restore_pending_front(mint);
                    }
                }
                UndoOp::SerialUsed(serial) => self.sigma.unuse_serial(&serial),
            }
        }
        self.tip_height = undo.previous_tip;
        log::info!("Elysium block {} disconnected", undo.height);
        self.rebuild_reservations()
    }

    fn rebuild_reservations(&mut self) -> Vec<String> {
        self.ledger.clear_reservations();
        let mut dropped = Vec::new();

        for txid in self.sigma.pending_txids() {
            let mints: Vec<(String, PropertyId, u64)> = self
                .sigma
                .pending()
                .iter()
                .filter(|m| m.txid == txid)
                .map(|m| (m.address.clone(), m.property, m.amount))
                .collect();
            let Some((address, property, _)) = mints.first().cloned() else {
                continue;
            };
            let total: u64 = mints.iter().map(|(_, _, amount)| amount).sum();

            if self.ledger.property(property).is_err() || self.ledger.reserve(&address, property, total).is_err() {
                self.sigma.take_pending(&txid);
                self.sigma.mark_rolled_back(&txid);
                log::warn!("↩️  Sigma mint {} rolled back: funds no longer available", txid);
                dropped.push(txid);
            }
        }
        dropped
    }
}
