//! Tecra JSON-RPC methods
//!
//! Bitcoin-style positional parameters. Every method runs against the
//! in-process [`Node`]; the HTTP layer only decodes requests and encodes
//! results.

use crate::error::{ApiError, ApiResult};
use crate::node::{IssuanceRequest, Node, UnspentOutput};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tecra_core::{OutPoint, COIN};
use tecra_elysium::{ConfirmedMint, PendingMint, Property, PropertyId, PropertyType, SigmaStatus};
use tecra_tnode::TnodeConfigEntry;

/// JSON-RPC 1.0 request body
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub result: Value,
    pub error: Value,
    pub id: Value,
}

impl RpcResponse {
    pub fn from_result(result: ApiResult<Value>, id: Value) -> Self {
        match result {
            Ok(result) => Self {
                result,
                error: Value::Null,
                id,
            },
            Err(e) => Self {
                result: Value::Null,
                error: e.to_json(),
                id,
            },
        }
    }
}

/// Run `method` with positional `params`
pub fn dispatch(node: &mut Node, method: &str, params: &[Value]) -> ApiResult<Value> {
    let p = Params(params);
    match method {
        // chain
        "getblockcount" => Ok(json!(node.height())),
        "getbestblockhash" => Ok(json!(node.best_hash())),
        "generate" => Ok(json!(node.generate(p.u64(0, "nblocks")?)?)),
        "generatetoaddress" => {
            let count = p.u64(0, "nblocks")?;
            Ok(json!(node.generate_to_address(count, &p.string(1, "address")?)?))
        }
        "invalidateblock" => match p.opt_string(0)? {
            Some(hash) => {
                node.invalidate_block(&hash)?;
                Ok(Value::Null)
            }
            None => {
                node.invalidate_tip()?;
                Ok(Value::Null)
            }
        },

        // wallet
        "getnewaddress" => Ok(json!(node.get_new_address())),
        "getbalance" => Ok(coins(node.get_balance())),
        "sendtoaddress" => {
            let address = p.string(0, "address")?;
            let amount = parse_coins(p.get(1, "amount")?)?;
            Ok(json!(node.send_to_address(&address, amount)?))
        }
        "listunspent" => Ok(json!(node.list_unspent().iter().map(unspent_json).collect::<Vec<_>>())),
        "lockunspent" => {
            let unlock = p.bool(0, "unlock")?;
            let outpoints = match p.0.get(1) {
                Some(Value::Null) | None => Vec::new(),
                Some(value) => outpoint_list(value)?,
            };
            Ok(json!(node.lock_unspent(unlock, outpoints)?))
        }
        "listlockunspent" => Ok(json!(node
            .list_lock_unspent()
            .iter()
            .map(|o| json!({ "txid": o.txid, "vout": o.vout }))
            .collect::<Vec<_>>())),

        // elysium
        "elysium_sendissuancefixed" => {
            let request = IssuanceRequest {
                from: p.string(0, "fromaddress")?,
                ecosystem: p.u8(1, "ecosystem")?,
                property_type: p.u64(2, "type")? as u16,
                previous_id: p.property(3)?,
                category: p.string(4, "category")?,
                subcategory: p.string(5, "subcategory")?,
                name: p.string(6, "name")?,
                url: p.string(7, "url")?,
                data: p.string(8, "data")?,
                amount: p.amount(9)?,
                sigma: p.opt_u64(10)?.map(|s| s as u8),
            };
            Ok(json!(node.elysium_send_issuance_fixed(request)?))
        }
        "elysium_sendcreatedenomination" => {
            let from = p.string(0, "fromaddress")?;
            let property = p.property(1)?;
            Ok(json!(node.elysium_send_create_denomination(&from, property, &p.amount(2)?)?))
        }
        "elysium_send" => {
            let from = p.string(0, "fromaddress")?;
            let to = p.string(1, "toaddress")?;
            let property = p.property(2)?;
            Ok(json!(node.elysium_send(&from, &to, property, &p.amount(3)?)?))
        }
        "elysium_getbalance" => {
            let (balance, reserved) = node.elysium_get_balance(&p.string(0, "address")?, p.property(1)?)?;
            Ok(json!({ "balance": balance, "reserved": reserved }))
        }
        "elysium_sendmint" => {
            let from = p.string(0, "fromaddress")?;
            let property = p.property(1)?;
            let counts = mint_counts(p.get(2, "denominations")?)?;
            Ok(json!(node.elysium_send_mint(&from, property, &counts)?))
        }
        "elysium_sendspend" => {
            let recipient = p.string(0, "toaddress")?;
            let property = p.property(1)?;
            Ok(json!(node.elysium_send_spend(&recipient, property, p.u8(2, "denomination")?)?))
        }
        "elysium_listpendingmints" => Ok(json!(node
            .elysium_list_pending_mints()
            .iter()
            .map(pending_mint_json)
            .collect::<Vec<_>>())),
        "elysium_listmints" => Ok(json!(node
            .elysium_list_mints()
            .iter()
            .map(confirmed_mint_json)
            .collect::<Vec<_>>())),
        "elysium_getproperty" => Ok(property_json(node.elysium_property(p.property(0)?)?)),
        "elysium_listproperties" => Ok(json!(node
            .elysium_properties()
            .into_iter()
            .map(property_json)
            .collect::<Vec<_>>())),

        // tnodes
        "tnode" => tnode_command(node, &p),
        "tnodelist" => {
            let list: BTreeMap<String, &'static str> = node
                .tnode_list()
                .into_iter()
                .map(|(id, status)| (id, status.as_str()))
                .collect();
            Ok(json!(list))
        }

        other => Err(ApiError::MethodNotFound(other.to_string())),
    }
}

// ============================================================================
// TNODE SUBCOMMANDS
// ============================================================================

fn tnode_command(node: &mut Node, p: &Params) -> ApiResult<Value> {
    let command = p.string(0, "command")?;
    match command.as_str() {
        "genkey" => Ok(json!(node.tnode_genkey())),
        "start-alias" => {
            let alias = p.string(1, "alias")?;
            node.tnode_start_alias(&alias)?;
            Ok(json!({ "alias": alias, "result": "successful" }))
        }
        "stop-alias" => {
            let alias = p.string(1, "alias")?;
            node.tnode_stop_alias(&alias)?;
            Ok(json!({ "alias": alias, "result": "stopped" }))
        }
        "add-conf" => {
            let entry = TnodeConfigEntry {
                alias: p.string(1, "alias")?,
                ip_port: p.string(2, "address")?,
                tnode_privkey: p.string(3, "tnodeprivkey")?,
                collateral_txid: p.string(4, "txid")?,
                collateral_output_index: p.u64(5, "vout")? as u32,
            };
            node.tnode_add_conf(entry)?;
            Ok(Value::Null)
        }
        "list-conf" => Ok(json!(node
            .tnode_list_conf()
            .into_iter()
            .map(|(entry, status)| json!({
                "alias": entry.alias,
                "address": entry.ip_port,
                "privateKey": entry.tnode_privkey,
                "txHash": entry.collateral_txid,
                "outputIndex": entry.collateral_output_index,
                "status": status.map(|s| s.as_str()).unwrap_or("MISSING"),
            }))
            .collect::<Vec<_>>())),
        "count" => {
            let (total, enabled) = node.tnode_count();
            Ok(json!({ "total": total, "enabled": enabled }))
        }
        "winner" => Ok(match node.tnode_winner() {
            Some((height, id, payee)) => json!({ "height": height, "outpoint": id, "payee": payee }),
            None => Value::Null,
        }),
        other => Err(ApiError::InvalidParams(format!("unknown tnode command: {}", other))),
    }
}

// ============================================================================
// PARAMETER DECODING
// ============================================================================

struct Params<'a>(&'a [Value]);

impl Params<'_> {
    fn get(&self, index: usize, name: &str) -> ApiResult<&Value> {
        self.0
            .get(index)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ApiError::InvalidParams(format!("missing parameter {}", name)))
    }

    fn string(&self, index: usize, name: &str) -> ApiResult<String> {
        self.get(index, name)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidParams(format!("{} must be a string", name)))
    }

    fn opt_string(&self, index: usize) -> ApiResult<Option<String>> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ApiError::InvalidParams(format!("parameter {} must be a string", index))),
        }
    }

    fn u64(&self, index: usize, name: &str) -> ApiResult<u64> {
        as_u64(self.get(index, name)?)
            .ok_or_else(|| ApiError::InvalidParams(format!("{} must be a non-negative integer", name)))
    }

    fn opt_u64(&self, index: usize) -> ApiResult<Option<u64>> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => as_u64(value)
                .map(Some)
                .ok_or_else(|| ApiError::InvalidParams(format!("parameter {} must be a non-negative integer", index))),
        }
    }

    fn u8(&self, index: usize, name: &str) -> ApiResult<u8> {
        u8::try_from(self.u64(index, name)?).map_err(|_| ApiError::InvalidParams(format!("{} out of range", name)))
    }

    fn bool(&self, index: usize, name: &str) -> ApiResult<bool> {
        self.get(index, name)?
            .as_bool()
            .ok_or_else(|| ApiError::InvalidParams(format!("{} must be a boolean", name)))
    }

    fn property(&self, index: usize) -> ApiResult<PropertyId> {
        let id = self.u64(index, "propertyid")?;
        PropertyId::try_from(id).map_err(|_| ApiError::InvalidParams(format!("property id {} out of range", id)))
    }

    /// Amounts are passed as strings; plain numbers are accepted too
    fn amount(&self, index: usize) -> ApiResult<String> {
        match self.get(index, "amount")? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(ApiError::InvalidParams("amount must be a string".into())),
        }
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Coin amount ("10", 10, 0.5) to base units
fn parse_coins(value: &Value) -> ApiResult<u64> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return Err(ApiError::InvalidParams("amount must be a number".into())),
    };
    // Coin amounts share the eight decimal places of divisible tokens
    let amount = PropertyType::Divisible
        .parse_amount(&text)
        .map_err(|_| ApiError::InvalidParams(format!("invalid amount {}", text)))?;
    if amount == 0 {
        return Err(ApiError::InvalidParams("amount must be positive".into()));
    }
    Ok(amount)
}

fn coins(amount: u64) -> Value {
    json!(amount as f64 / COIN as f64)
}

fn outpoint_list(value: &Value) -> ApiResult<Vec<OutPoint>> {
    let items = value
        .as_array()
        .ok_or_else(|| ApiError::InvalidParams("outputs must be an array".into()))?;
    items
        .iter()
        .map(|item| {
            let txid = item.get("txid").and_then(Value::as_str);
            let vout = item.get("vout").and_then(as_u64).and_then(|v| u32::try_from(v).ok());
            match (txid, vout) {
                (Some(txid), Some(vout)) => Ok(OutPoint::new(txid, vout)),
                _ => Err(ApiError::InvalidParams("expected {\"txid\", \"vout\"}".into())),
            }
        })
        .collect()
}

/// `{"0": 2, "1": 1}` denomination id to count
fn mint_counts(value: &Value) -> ApiResult<BTreeMap<u8, u32>> {
    let object = value
        .as_object()
        .ok_or_else(|| ApiError::InvalidParams("denominations must be an object".into()))?;
    let mut counts = BTreeMap::new();
    for (key, count) in object {
        let denomination: u8 = key
            .parse()
            .map_err(|_| ApiError::InvalidParams(format!("invalid denomination {}", key)))?;
        let count = as_u64(count)
            .and_then(|c| u32::try_from(c).ok())
            .ok_or_else(|| ApiError::InvalidParams(format!("invalid count for denomination {}", key)))?;
        if count > 0 {
            counts.insert(denomination, count);
        }
    }
    if counts.is_empty() {
        return Err(ApiError::InvalidParams("no mints requested".into()));
    }
    Ok(counts)
}

// ============================================================================
// RESULT ENCODING
// ============================================================================

fn unspent_json(unspent: &UnspentOutput) -> Value {
    json!({
        "txid": unspent.outpoint.txid,
        "vout": unspent.outpoint.vout,
        "address": unspent.coin.output.address,
        "amount": coins(unspent.coin.output.amount),
        "confirmations": unspent.confirmations,
        "locked": unspent.locked,
    })
}

fn sigma_status_name(status: SigmaStatus) -> &'static str {
    match status {
        SigmaStatus::SoftDisabled => "SoftDisabled",
        SigmaStatus::SoftEnabled => "SoftEnabled",
        SigmaStatus::HardDisabled => "HardDisabled",
        SigmaStatus::HardEnabled => "HardEnabled",
    }
}

fn property_json(property: &Property) -> Value {
    json!({
        "propertyid": property.id,
        "name": property.name,
        "category": property.category,
        "subcategory": property.subcategory,
        "data": property.data,
        "url": property.url,
        "divisible": property.property_type.is_divisible(),
        "issuer": property.issuer,
        "creationtxid": property.creation_txid,
        "totaltokens": property.format_amount(property.total_supply),
        "sigmastatus": sigma_status_name(property.sigma_status),
        "denominations": property
            .denomination_list()
            .iter()
            .map(|d| json!({ "id": d.id, "value": property.format_amount(d.amount) }))
            .collect::<Vec<_>>(),
    })
}

fn pending_mint_json(mint: &PendingMint) -> Value {
    json!({
        "txid": mint.txid,
        "address": mint.address,
        "propertyid": mint.property,
        "denomination": mint.denomination,
        "value": mint.amount,
        "commitment": mint.commitment,
    })
}

fn confirmed_mint_json(mint: &ConfirmedMint) -> Value {
    json!({
        "txid": mint.txid,
        "address": mint.address,
        "propertyid": mint.property,
        "denomination": mint.denomination,
        "value": mint.amount,
        "commitment": mint.commitment,
        "block": mint.block,
        "group": mint.group,
        "index": mint.index,
    })
}
