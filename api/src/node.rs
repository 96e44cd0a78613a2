//! In-process Tecra node
//!
//! Owns the active chain and every layer that follows it: UTXO set, tnode
//! manager, Elysium state, mempool and wallet. Connecting a block is atomic
//! across the layers; disconnecting replays the per-block undo records.

use crate::error::{ApiError, ApiResult};
use crate::wallet::Wallet;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tecra_core::{
    Block, Coin, ConsensusParams, CoreError, OutPoint, TnodeMessage, Transaction, TransactionPool, TxOutput,
    UtxoSet, UtxoUndo, UtxoView,
};
use tecra_elysium::{
    ConfirmedMint, Ecosystem, ElysiumError, ElysiumPacket, ElysiumState, ElysiumTx, ElysiumUndo, PendingMint,
    Property, PropertyId, PropertyType, SigmaMintEntry, SigmaStatus, MAX_MINTS_PER_TX,
};
use tecra_tnode::{
    generate_privkey, ActiveTnode, TnodeConfig, TnodeConfigEntry, TnodeConfigError, TnodeManager, TnodeStatus,
    TnodeUndo,
};

/// Undo records of the three layers for one block
#[derive(Debug, Clone)]
struct BlockUndo {
    utxo: UtxoUndo,
    tnode: TnodeUndo,
    elysium: ElysiumUndo,
}

/// Arguments of `elysium_sendissuancefixed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceRequest {
    pub from: String,
    pub ecosystem: u8,
    pub property_type: u16,
    pub previous_id: PropertyId,
    pub category: String,
    pub subcategory: String,
    pub name: String,
    pub url: String,
    pub data: String,
    pub amount: String,
    pub sigma: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    pub coin: Coin,
    pub confirmations: u64,
    pub locked: bool,
}

pub struct Node {
    params: ConsensusParams,
    chain: Vec<Block>,
    undos: Vec<BlockUndo>,
    utxo: UtxoSet,
    tnodes: TnodeManager,
    elysium: ElysiumState,
    mempool: TransactionPool,
    pending_messages: Vec<TnodeMessage>,
    wallet: Wallet,
    tnode_config: TnodeConfig,
    tnode_config_path: Option<PathBuf>,
    started: BTreeMap<String, ActiveTnode>,
    next_nonce: u64,
}

impl Node {
    pub fn new(params: ConsensusParams) -> Self {
        let genesis = Block::genesis("genesis".to_string());
        log::info!("🌱 Node started on {} (genesis {})", params.network, genesis.hash);

        Self {
            utxo: UtxoSet::new(params.coinbase_maturity),
            tnodes: TnodeManager::new(params.clone()),
            elysium: ElysiumState::new(params.sigma_start_height),
            params,
            chain: vec![genesis],
            undos: Vec::new(),
            mempool: TransactionPool::new(),
            pending_messages: Vec::new(),
            wallet: Wallet::new(),
            tnode_config: TnodeConfig::new(),
            tnode_config_path: None,
            started: BTreeMap::new(),
            next_nonce: 0,
        }
    }

    /// Load tnode.conf from `path` and lock every configured collateral
    pub fn load_tnode_config(&mut self, path: impl AsRef<Path>) -> ApiResult<usize> {
        let path = path.as_ref();
        let config = TnodeConfig::load_from_file(path)?;
        for entry in config.entries() {
            self.wallet.lock(entry.collateral());
        }
        let count = config.count();
        self.tnode_config = config;
        self.tnode_config_path = Some(path.to_path_buf());
        log::info!("Loaded {} tnode(s) from {}", count, path.display());
        Ok(count)
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn tip(&self) -> &Block {
        // The genesis block is never disconnected
        &self.chain[self.chain.len() - 1]
    }

    pub fn height(&self) -> u64 {
        self.tip().height()
    }

    pub fn best_hash(&self) -> &str {
        &self.tip().hash
    }

    pub fn utxo(&self) -> &UtxoSet {
        &self.utxo
    }

    pub fn tnodes(&self) -> &TnodeManager {
        &self.tnodes
    }

    pub fn elysium(&self) -> &ElysiumState {
        &self.elysium
    }

    pub fn mempool(&self) -> &TransactionPool {
        &self.mempool
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    fn next_nonce(&mut self) -> u64 {
        self.next_nonce += 1;
        self.next_nonce
    }

    // ------------------------------------------------------------------
    // Chain
    // ------------------------------------------------------------------

    pub fn generate(&mut self, count: u64) -> ApiResult<Vec<String>> {
        let address = self.wallet.default_address().to_string();
        self.generate_to_address(count, &address)
    }

    pub fn generate_to_address(&mut self, count: u64, address: &str) -> ApiResult<Vec<String>> {
        if address.is_empty() {
            return Err(ApiError::InvalidAddress(address.to_string()));
        }
        (0..count).map(|_| self.mine_block(address)).collect()
    }

    /// Build a block on the tip paying `address`, and connect it
    fn mine_block(&mut self, address: &str) -> ApiResult<String> {
        let height = self.height() + 1;
        let distribution = self.tnodes.expected_distribution(height, self.params.block_subsidy);
        let mut outputs = vec![TxOutput::new(address, distribution.miner_share)];
        if let Some(payee) = &distribution.payee {
            outputs.push(TxOutput::new(payee.address.clone(), distribution.tnode_share));
        }

        let mut block = Block::new(
            height,
            self.best_hash().to_string(),
            address.to_string(),
            self.params.target_spacing,
            outputs,
        );
        for tx in self.block_candidates() {
            block.add_transaction(tx);
        }
        for message in self.pending_messages.clone() {
            block.add_tnode_message(message);
        }
        for message in self.due_pings(height) {
            block.add_tnode_message(message);
        }

        let hash = block.hash.clone();
        self.connect_block(block)?;
        Ok(hash)
    }

    /// Mempool transactions whose inputs are all spendable at the tip
    fn block_candidates(&mut self) -> Vec<Transaction> {
        let mut candidates = Vec::new();
        let mut stale = Vec::new();

        for tx in self.mempool.transactions() {
            let mut input_total = 0u64;
            let mut spendable = true;
            for input in &tx.inputs {
                match self.utxo.coin(input) {
                    Some(coin) if self.utxo.is_mature(coin) => input_total += coin.output.amount,
                    Some(_) => spendable = false,
                    None => {
                        spendable = false;
                        stale.push(tx.txid.clone());
                    }
                }
            }
            if spendable && tx.output_total() <= input_total {
                candidates.push(tx);
            }
        }

        for txid in stale {
            log::debug!("Evicting {} from mempool: input no longer available", txid);
            self.mempool.remove(&txid);
        }
        candidates
    }

    /// Pings of started tnodes that are registered and still alive
    fn due_pings(&mut self, height: u64) -> Vec<TnodeMessage> {
        let interval = self.params.tnode_ping_interval;
        let registry = self.tnodes.registry();
        self.started
            .values_mut()
            .filter(|active| {
                registry
                    .get(&active.collateral)
                    .map(|entry| !entry.status.accepts_restart() && !entry.status.is_terminal())
                    .unwrap_or(false)
            })
            .filter(|active| active.ping_due(height, interval))
            .map(|active| TnodeMessage::Ping(active.ping(height)))
            .collect()
    }

    /// Validate and connect `block` on top of the tip.
    ///
    /// A failure in any layer leaves every layer as it was.
    pub fn connect_block(&mut self, block: Block) -> ApiResult<()> {
        block.validate_structure()?;
        let height = block.height();
        if height != self.height() + 1 || block.header.previous_hash != self.best_hash() {
            return Err(CoreError::PrevHashMismatch {
                height,
                tip: self.best_hash().to_string(),
            }
            .into());
        }
        let minted = block.coinbase().map(Transaction::output_total).unwrap_or(0);
        if minted > self.params.block_subsidy {
            return Err(CoreError::InvalidCoinbase(format!(
                "coinbase pays {} above subsidy {}",
                minted, self.params.block_subsidy
            ))
            .into());
        }

        let utxo_undo = self.utxo.apply_block(&block)?;
        let outcome = match self.tnodes.connect_block(&block, &self.utxo, self.params.block_subsidy) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.utxo.undo_block(utxo_undo);
                log::warn!("Rejected block {} ({}): {}", height, block.hash, e);
                return Err(e.into());
            }
        };
        let elysium_undo = self.elysium.connect_block(&block);

        self.mempool.remove_confirmed(&block);
        for txid in &elysium_undo.rolled_back {
            self.mempool.remove(txid);
        }
        self.pending_messages.retain(|m| !block.tnode_messages.contains(m));
        for change in &outcome.changes {
            log::info!("Tnode {} {} -> {}", change.id, change.from, change.to);
        }
        if let Some(payee) = &outcome.distribution.payee {
            log::info!("💰 Block {} pays tnode {} ({})", height, payee.id, payee.address);
        }

        log::info!("⛓️  Block {} connected: {} ({} tx)", height, block.hash, block.transactions.len());
        self.undos.push(BlockUndo {
            utxo: utxo_undo,
            tnode: outcome.undo,
            elysium: elysium_undo,
        });
        self.chain.push(block);
        Ok(())
    }

    /// Disconnect the tip; returns its hash, or `None` at genesis
    pub fn invalidate_tip(&mut self) -> ApiResult<Option<String>> {
        if self.chain.len() <= 1 {
            return Ok(None);
        }
        let (Some(block), Some(undo)) = (self.chain.pop(), self.undos.pop()) else {
            return Ok(None);
        };
        let height = block.height();

        let dropped = self.elysium.disconnect_block(undo.elysium);
        self.tnodes.disconnect_block(undo.tnode);
        self.utxo.undo_block(undo.utxo);

        for tx in block.regular_transactions() {
            if dropped.contains(&tx.txid) {
                continue;
            }
            if let Err(e) = self.mempool.add(tx.clone()) {
                log::debug!("Not returning {} to mempool: {}", tx.txid, e);
            }
        }
        for txid in &dropped {
            self.mempool.remove(txid);
        }

        for message in block.tnode_messages {
            if matches!(message, TnodeMessage::Broadcast(_)) && !self.pending_messages.contains(&message) {
                self.pending_messages.push(message);
            }
        }
        for active in self.started.values_mut() {
            if active.last_ping_height >= Some(height) {
                active.last_ping_height = None;
            }
        }

        log::info!("⏪ Block {} disconnected: {}", height, block.hash);
        Ok(Some(block.hash))
    }

    /// Disconnect blocks down to and including `hash`; returns how many
    pub fn invalidate_block(&mut self, hash: &str) -> ApiResult<u64> {
        let height = self
            .chain
            .iter()
            .position(|b| b.hash == hash)
            .ok_or_else(|| ApiError::BlockNotFound(hash.to_string()))? as u64;
        if height == 0 {
            return Err(ApiError::InvalidParams("genesis block cannot be invalidated".into()));
        }

        let mut count = 0;
        while self.height() >= height {
            if self.invalidate_tip()?.is_none() {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Wallet
    // ------------------------------------------------------------------

    pub fn get_new_address(&mut self) -> String {
        self.wallet.new_address()
    }

    pub fn get_balance(&self) -> u64 {
        self.wallet.balance(&self.utxo)
    }

    pub fn send_to_address(&mut self, address: &str, amount: u64) -> ApiResult<String> {
        let tx = self.wallet.create_transaction(&self.utxo, &self.mempool, address, amount)?;
        let txid = tx.txid.clone();
        self.mempool.add(tx)?;
        log::info!("Sent {} to {} in {}", amount, address, txid);
        Ok(txid)
    }

    pub fn list_unspent(&self) -> Vec<UnspentOutput> {
        let tip = self.height();
        self.wallet
            .unspent(&self.utxo)
            .into_iter()
            .map(|(outpoint, coin)| UnspentOutput {
                confirmations: coin.confirmations(tip),
                locked: self.wallet.is_locked(&outpoint),
                outpoint,
                coin,
            })
            .collect()
    }

    /// Lock (`unlock == false`) or unlock outpoints; an empty unlock list unlocks all
    pub fn lock_unspent(&mut self, unlock: bool, outpoints: Vec<OutPoint>) -> ApiResult<bool> {
        if unlock && outpoints.is_empty() {
            for outpoint in self.wallet.locked_outpoints() {
                self.wallet.unlock(&outpoint);
            }
            return Ok(true);
        }
        for outpoint in outpoints {
            if unlock {
                self.wallet.unlock(&outpoint);
            } else {
                if self.utxo.coin(&outpoint).is_none() {
                    return Err(ApiError::InvalidParams(format!("unknown or spent output {}", outpoint)));
                }
                self.wallet.lock(outpoint);
            }
        }
        Ok(true)
    }

    pub fn list_lock_unspent(&self) -> Vec<OutPoint> {
        self.wallet.locked_outpoints()
    }

    // ------------------------------------------------------------------
    // Elysium
    // ------------------------------------------------------------------

    fn require_owned(&self, address: &str) -> ApiResult<()> {
        if !self.wallet.is_mine(address) {
            return Err(ApiError::InvalidAddress(format!("{} is not owned by this wallet", address)));
        }
        Ok(())
    }

    fn submit_elysium(&mut self, etx: ElysiumTx) -> ApiResult<String> {
        self.elysium.check_transaction(&etx)?;
        let kind = etx.kind();
        let nonce = self.next_nonce();
        let tx = ElysiumPacket::new(etx).into_transaction(nonce)?;
        let txid = tx.txid.clone();
        self.mempool.add(tx)?;
        log::info!("Elysium {} submitted: {}", kind, txid);
        Ok(txid)
    }

    pub fn elysium_send_issuance_fixed(&mut self, request: IssuanceRequest) -> ApiResult<String> {
        self.require_owned(&request.from)?;
        let ecosystem = Ecosystem::from_u8(request.ecosystem)?;
        let property_type = PropertyType::from_u16(request.property_type)?;
        let sigma_status = match request.sigma {
            Some(status) => SigmaStatus::from_u8(status)?,
            None => SigmaStatus::default(),
        };
        let amount = property_type.parse_amount(&request.amount)?;

        self.submit_elysium(ElysiumTx::IssuanceFixed {
            issuer: request.from,
            ecosystem,
            property_type,
            previous_id: request.previous_id,
            category: request.category,
            subcategory: request.subcategory,
            name: request.name,
            url: request.url,
            data: request.data,
            amount,
            sigma_status,
        })
    }

    pub fn elysium_send_create_denomination(
        &mut self,
        from: &str,
        property: PropertyId,
        value: &str,
    ) -> ApiResult<String> {
        self.require_owned(from)?;
        let amount = self.elysium.property(property)?.property_type.parse_amount(value)?;
        self.submit_elysium(ElysiumTx::CreateDenomination {
            sender: from.to_string(),
            property,
            amount,
        })
    }

    pub fn elysium_send(&mut self, from: &str, to: &str, property: PropertyId, amount: &str) -> ApiResult<String> {
        self.require_owned(from)?;
        if to.is_empty() {
            return Err(ApiError::InvalidAddress(to.to_string()));
        }
        let amount = self.elysium.property(property)?.property_type.parse_amount(amount)?;
        self.submit_elysium(ElysiumTx::SimpleSend {
            from: from.to_string(),
            to: to.to_string(),
            property,
            amount,
        })
    }

    /// Request mints of `counts` (denomination id to number of units)
    pub fn elysium_send_mint(
        &mut self,
        from: &str,
        property: PropertyId,
        counts: &BTreeMap<u8, u32>,
    ) -> ApiResult<String> {
        self.require_owned(from)?;
        let requested: u64 = counts.values().map(|&count| u64::from(count)).sum();
        if requested > MAX_MINTS_PER_TX as u64 {
            return Err(ApiError::InvalidParams(format!(
                "at most {} mints per transaction",
                MAX_MINTS_PER_TX
            )));
        }
        let denominations: Vec<u8> = counts
            .iter()
            .flat_map(|(&denomination, &count)| std::iter::repeat(denomination).take(count as usize))
            .collect();
        self.elysium.check_mint_request(from, property, &denominations)?;

        let mut mints = Vec::with_capacity(denominations.len());
        for denomination in denominations {
            mints.push(SigmaMintEntry {
                denomination,
                commitment: self.wallet.next_mint()?,
            });
        }

        let result = self.submit_mint(from, property, &mints);
        if result.is_err() {
            self.wallet.forget_mints(mints.iter().map(|m| m.commitment.as_str()));
        }
        result
    }

    fn submit_mint(&mut self, from: &str, property: PropertyId, mints: &[SigmaMintEntry]) -> ApiResult<String> {
        let nonce = self.next_nonce();
        let tx = ElysiumPacket::new(ElysiumTx::SigmaMint {
            sender: from.to_string(),
            property,
            mints: mints.to_vec(),
        })
        .into_transaction(nonce)?;
        let txid = tx.txid.clone();

        self.elysium.request_mint(&txid, from, property, mints)?;
        if let Err(e) = self.mempool.add(tx) {
            self.elysium.rollback(&txid);
            return Err(e.into());
        }
        Ok(txid)
    }

    /// Spend one wallet mint of `denomination` to `recipient`
    pub fn elysium_send_spend(&mut self, recipient: &str, property: PropertyId, denomination: u8) -> ApiResult<String> {
        if recipient.is_empty() {
            return Err(ApiError::InvalidAddress(recipient.to_string()));
        }
        let in_flight = self.mempool_spend_serials();
        let serial = self
            .elysium
            .list_confirmed()
            .iter()
            .filter(|m| m.property == property && m.denomination == denomination)
            .filter(|m| !self.elysium.sigma().is_spent(&m.commitment))
            .filter_map(|m| self.wallet.serial_for(&m.commitment))
            .find(|serial| !in_flight.contains(*serial))
            .map(str::to_string)
            .ok_or(ElysiumError::MintNotFound)?;

        self.submit_elysium(ElysiumTx::SigmaSpend {
            property,
            denomination,
            serial,
            recipient: recipient.to_string(),
        })
    }

    fn mempool_spend_serials(&self) -> BTreeSet<String> {
        self.mempool
            .transactions()
            .iter()
            .filter_map(|tx| ElysiumPacket::from_transaction(tx)?.ok())
            .filter_map(|packet| match packet.tx {
                ElysiumTx::SigmaSpend { serial, .. } => Some(serial),
                _ => None,
            })
            .collect()
    }

    /// Spendable and reserved balance, formatted for the property type
    pub fn elysium_get_balance(&self, address: &str, property: PropertyId) -> ApiResult<(String, String)> {
        let prop = self.elysium.property(property)?;
        Ok((
            prop.format_amount(self.elysium.balance_of(address, property)),
            prop.format_amount(self.elysium.reserved_of(address, property)),
        ))
    }

    pub fn elysium_property(&self, property: PropertyId) -> ApiResult<&Property> {
        Ok(self.elysium.property(property)?)
    }

    pub fn elysium_properties(&self) -> Vec<&Property> {
        self.elysium.properties()
    }

    pub fn elysium_list_pending_mints(&self) -> Vec<PendingMint> {
        self.elysium.list_pending().to_vec()
    }

    /// Unspent confirmed mints this wallet can spend
    pub fn elysium_list_mints(&self) -> Vec<ConfirmedMint> {
        self.elysium
            .list_confirmed()
            .iter()
            .filter(|m| self.wallet.serial_for(&m.commitment).is_some())
            .filter(|m| !self.elysium.sigma().is_spent(&m.commitment))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Tnodes
    // ------------------------------------------------------------------

    pub fn tnode_genkey(&self) -> String {
        generate_privkey()
    }

    /// Add a tnode.conf line and lock its collateral
    pub fn tnode_add_conf(&mut self, entry: TnodeConfigEntry) -> ApiResult<()> {
        let collateral = entry.collateral();
        self.tnode_config.add_entry(entry)?;
        self.wallet.lock(collateral);
        if let Some(path) = &self.tnode_config_path {
            self.tnode_config.save_to_file(path)?;
        }
        Ok(())
    }

    pub fn tnode_list_conf(&self) -> Vec<(TnodeConfigEntry, Option<TnodeStatus>)> {
        self.tnode_config
            .entries()
            .iter()
            .map(|entry| (entry.clone(), self.tnodes.status(&entry.collateral()).ok()))
            .collect()
    }

    /// Announce the tnode configured under `alias`; it registers in the next block
    pub fn tnode_start_alias(&mut self, alias: &str) -> ApiResult<()> {
        let entry = self
            .tnode_config
            .get_entry(alias)
            .cloned()
            .ok_or_else(|| TnodeConfigError::UnknownAlias(alias.to_string()))?;
        let (active, broadcast) = ActiveTnode::start(&entry, &self.utxo, &self.params, self.height())?;

        self.wallet.lock(active.collateral.clone());
        self.pending_messages
            .retain(|m| !(matches!(m, TnodeMessage::Broadcast(_)) && m.collateral() == &active.collateral));
        self.pending_messages.push(TnodeMessage::Broadcast(broadcast));
        self.started.insert(alias.to_string(), active);
        Ok(())
    }

    /// Stop pinging for `alias`
    pub fn tnode_stop_alias(&mut self, alias: &str) -> ApiResult<()> {
        self.started
            .remove(alias)
            .map(|active| log::info!("Stopped tnode {} ({})", alias, active.collateral))
            .ok_or_else(|| ApiError::InvalidParams(format!("tnode {} is not started", alias)))
    }

    pub fn tnode_list(&self) -> Vec<(String, TnodeStatus)> {
        self.tnodes.list()
    }

    /// (registered, enabled)
    pub fn tnode_count(&self) -> (usize, usize) {
        let registry = self.tnodes.registry();
        (registry.count(), registry.enabled_count())
    }

    /// Next scheduled payee: (height, id, payout address)
    pub fn tnode_winner(&self) -> Option<(u64, String, String)> {
        self.tnodes
            .winner(self.height())
            .map(|(height, entry)| (height, entry.id().to_string(), entry.payout_address().to_string()))
    }
}
