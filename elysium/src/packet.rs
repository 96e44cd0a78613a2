//! Elysium packet codec
//!
//! Packets ride in transaction payloads: the `elysium` marker followed by a
//! bincode encoded [`ElysiumPacket`].

use crate::error::{ElysiumError, Result};
use crate::property::{Ecosystem, PropertyId, PropertyType, SigmaStatus};
use serde::{Deserialize, Serialize};
use tecra_core::Transaction;

pub const PACKET_MARKER: &[u8] = b"elysium";
pub const PACKET_VERSION: u16 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigmaMintEntry {
    pub denomination: u8,
    pub commitment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElysiumTx {
    SimpleSend {
        from: String,
        to: String,
        property: PropertyId,
        amount: u64,
    },
    IssuanceFixed {
        issuer: String,
        ecosystem: Ecosystem,
        property_type: PropertyType,
        previous_id: PropertyId,
        category: String,
        subcategory: String,
        name: String,
        url: String,
        data: String,
        amount: u64,
        sigma_status: SigmaStatus,
    },
    CreateDenomination {
        sender: String,
        property: PropertyId,
        amount: u64,
    },
    SigmaMint {
        sender: String,
        property: PropertyId,
        mints: Vec<SigmaMintEntry>,
    },
    SigmaSpend {
        property: PropertyId,
        denomination: u8,
        serial: String,
        recipient: String,
    },
}

impl ElysiumTx {
    pub fn kind(&self) -> &'static str {
        match self {
            ElysiumTx::SimpleSend { .. } => "Simple Send",
            ElysiumTx::IssuanceFixed { .. } => "Create Property - Fixed",
            ElysiumTx::CreateDenomination { .. } => "Create Denomination",
            ElysiumTx::SigmaMint { .. } => "Sigma Mint",
            ElysiumTx::SigmaSpend { .. } => "Sigma Spend",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElysiumPacket {
    pub version: u16,
    pub tx: ElysiumTx,
}

impl ElysiumPacket {
    pub fn new(tx: ElysiumTx) -> Self {
        Self {
            version: PACKET_VERSION,
            tx,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self).map_err(|e| ElysiumError::Packet(e.to_string()))?;
        let mut bytes = Vec::with_capacity(PACKET_MARKER.len() + body.len());
        bytes.extend_from_slice(PACKET_MARKER);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let body = bytes
            .strip_prefix(PACKET_MARKER)
            .ok_or_else(|| ElysiumError::Packet("missing elysium marker".into()))?;
        let packet: Self = bincode::deserialize(body).map_err(|e| ElysiumError::Packet(e.to_string()))?;
        if packet.version != PACKET_VERSION {
            return Err(ElysiumError::Packet(format!("unsupported version {}", packet.version)));
        }
        Ok(packet)
    }

    /// Packet carried by `tx`, if its payload is one
    pub fn from_transaction(tx: &Transaction) -> Option<Result<Self>> {
        let payload = tx.payload.as_ref()?;
        payload.starts_with(PACKET_MARKER).then(|| Self::decode(payload))
    }

    /// Data-only transaction carrying this packet
    pub fn into_transaction(self, nonce: u64) -> Result<Transaction> {
        Ok(Transaction::data(self.encode()?, nonce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_in_transaction() {
        let packet = ElysiumPacket::new(ElysiumTx::SigmaMint {
            sender: "alice".into(),
            property: 3,
            mints: vec![SigmaMintEntry {
                denomination: 0,
                commitment: "ab".repeat(32),
            }],
        });

        let tx = packet.clone().into_transaction(7).unwrap();
        assert!(tx.is_data_only());
        assert_eq!(ElysiumPacket::from_transaction(&tx).unwrap().unwrap(), packet);
    }

    #[test]
    fn test_foreign_payload_ignored() {
        let tx = Transaction::data(b"hello".to_vec(), 1);
        assert!(ElysiumPacket::from_transaction(&tx).is_none());

        let coinbase = Transaction::coinbase(1, Vec::new());
        assert!(ElysiumPacket::from_transaction(&coinbase).is_none());
    }

    #[test]
    fn test_corrupt_packet() {
        let mut bytes = PACKET_MARKER.to_vec();
        bytes.extend_from_slice(&[0xff, 0xff]);
        assert!(matches!(ElysiumPacket::decode(&bytes), Err(ElysiumError::Packet(_))));

        let mut packet = ElysiumPacket::new(ElysiumTx::SimpleSend {
            from: "a".into(),
            to: "b".into(),
            property: 3,
            amount: 1,
        });
        packet.version = 9;
        let encoded = packet.encode().unwrap();
        assert!(ElysiumPacket::decode(&encoded).is_err());
    }
}
