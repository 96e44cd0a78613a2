//! Tnode collateral verification against the UTXO set

use crate::error::{Result, TnodeError};
use serde::{Deserialize, Serialize};
use tecra_core::{ConsensusParams, OutPoint, UtxoView};

/// Collateral output backing one tnode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collateral {
    pub outpoint: OutPoint,
    pub amount: u64,
    /// Owner of the output, also the payout address
    pub address: String,
}

impl Collateral {
    /// Look up `outpoint` and check amount and confirmations at the view's tip
    pub fn verify(outpoint: &OutPoint, view: &impl UtxoView, params: &ConsensusParams) -> Result<Self> {
        let invalid = |reason: String| TnodeError::InvalidCollateral {
            outpoint: outpoint.clone(),
            reason,
        };

        let coin = view
            .coin(outpoint)
            .ok_or_else(|| invalid("output is missing or spent".into()))?;

        if coin.output.amount < params.tnode_collateral {
            return Err(invalid(format!(
                "amount {} below required {}",
                coin.output.amount, params.tnode_collateral
            )));
        }

        let confirmations = coin.confirmations(view.tip_height());
        if confirmations < params.tnode_min_confirmations {
            return Err(invalid(format!(
                "{} confirmations, need {}",
                confirmations, params.tnode_min_confirmations
            )));
        }

        Ok(Self {
            outpoint: outpoint.clone(),
            amount: coin.output.amount,
            address: coin.output.address.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tecra_core::constants::NULL_HASH;
    use tecra_core::{Block, Transaction, TxOutput, UtxoSet, COIN};

    fn setup(amount: u64) -> (UtxoSet, OutPoint) {
        let mut utxo = UtxoSet::new(0);
        let b1 = Block::new(1, NULL_HASH.into(), "miner".into(), 150, vec![TxOutput::new("miner", 2000 * COIN)]);
        utxo.apply_block(&b1).unwrap();

        let mut b2 = Block::new(2, b1.hash.clone(), "miner".into(), 150, Vec::new());
        let tx = Transaction::new(
            vec![b1.transactions[0].outpoint(0)],
            vec![TxOutput::new("owner", amount)],
            None,
            0,
        );
        let outpoint = tx.outpoint(0);
        b2.add_transaction(tx);
        utxo.apply_block(&b2).unwrap();
        (utxo, outpoint)
    }

    #[test]
    fn test_valid_collateral() {
        let (utxo, outpoint) = setup(1000 * COIN);
        let collateral = Collateral::verify(&outpoint, &utxo, &ConsensusParams::regtest()).unwrap();

        assert_eq!(collateral.address, "owner");
        assert_eq!(collateral.amount, 1000 * COIN);
    }

    #[test]
    fn test_collateral_too_small() {
        let (utxo, outpoint) = setup(999 * COIN);
        let result = Collateral::verify(&outpoint, &utxo, &ConsensusParams::regtest());

        assert!(matches!(result, Err(TnodeError::InvalidCollateral { .. })));
    }

    #[test]
    fn test_collateral_needs_confirmations() {
        let (utxo, outpoint) = setup(1000 * COIN);
        let result = Collateral::verify(&outpoint, &utxo, &ConsensusParams::mainnet());

        assert!(matches!(result, Err(TnodeError::InvalidCollateral { .. })));
    }

    #[test]
    fn test_missing_collateral() {
        let (utxo, _) = setup(1000 * COIN);
        let result = Collateral::verify(&OutPoint::new("ff", 0), &utxo, &ConsensusParams::regtest());

        assert!(matches!(result, Err(TnodeError::InvalidCollateral { .. })));
    }
}
