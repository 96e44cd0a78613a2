#![allow(dead_code)]

use serde_json::{json, Value};
use tecra_api::{dispatch, ApiResult, Node};
use tecra_core::{ConsensusParams, OutPoint, COIN};
use tecra_tnode::TnodeStatus;

pub fn regtest() -> Node {
    Node::new(ConsensusParams::regtest())
}

pub fn rpc(node: &mut Node, method: &str, params: Value) -> ApiResult<Value> {
    let params = params.as_array().cloned().unwrap_or_default();
    dispatch(node, method, &params)
}

pub fn call(node: &mut Node, method: &str, params: Value) -> Value {
    match rpc(node, method, params) {
        Ok(value) => value,
        Err(e) => panic!("{} failed: {}", method, e),
    }
}

pub fn generate(node: &mut Node, blocks: u64) {
    call(node, "generate", json!([blocks]));
}

pub struct FundedTnode {
    pub alias: String,
    pub address: String,
    pub collateral: OutPoint,
}

/// Send `n` collaterals to fresh wallet addresses and confirm them
pub fn fund_tnodes(node: &mut Node, n: usize) -> Vec<FundedTnode> {
    generate(node, 100 + 20 * n as u64 + 10);

    let tnodes: Vec<FundedTnode> = (0..n)
        .map(|i| {
            let address = call(node, "getnewaddress", json!([])).as_str().unwrap().to_string();
            let txid = call(node, "sendtoaddress", json!([address, 1000]));
            FundedTnode {
                alias: format!("tn{}", i),
                address,
                collateral: OutPoint::new(txid.as_str().unwrap(), 0),
            }
        })
        .collect();
    generate(node, 1);

    for (i, tnode) in tnodes.iter().enumerate() {
        assert_eq!(node.utxo().balance(&tnode.address), 1000 * COIN);
        let key = call(node, "tnode", json!(["genkey"]));
        call(
            node,
            "tnode",
            json!([
                "add-conf",
                tnode.alias,
                format!("127.0.0.{}:18168", i + 1),
                key,
                tnode.collateral.txid,
                tnode.collateral.vout
            ]),
        );
    }
    tnodes
}

pub fn start(node: &mut Node, tnode: &FundedTnode) {
    call(node, "tnode", json!(["start-alias", tnode.alias]));
}

pub fn status(node: &Node, tnode: &FundedTnode) -> Option<TnodeStatus> {
    node.tnodes().status(&tnode.collateral).ok()
}

/// `tnodelist` entry for `tnode`
pub fn listed_status(node: &mut Node, tnode: &FundedTnode) -> Option<String> {
    let list = call(node, "tnodelist", json!([]));
    list.get(tnode.collateral.to_string())
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Mine until all of `tnodes` are enabled; returns that height
pub fn mine_until_enabled(node: &mut Node, tnodes: &[FundedTnode]) -> u64 {
    for _ in 0..10 {
        if tnodes.iter().all(|t| status(node, t) == Some(TnodeStatus::Enabled)) {
            return node.height();
        }
        generate(node, 1);
    }
    panic!("tnodes never enabled");
}

pub fn paid(node: &Node, tnode: &FundedTnode) -> u64 {
    node.tnodes()
        .distributor()
        .totals()
        .get(&tnode.collateral)
        .copied()
        .unwrap_or(0)
}

/// Unlock a collateral and spend it
pub fn spend_collateral(node: &mut Node, tnode: &FundedTnode) {
    call(
        node,
        "lockunspent",
        json!([true, [{ "txid": tnode.collateral.txid, "vout": tnode.collateral.vout }]]),
    );
    let sink = call(node, "getnewaddress", json!([]));
    call(node, "sendtoaddress", json!([sink, 1500]));
}
