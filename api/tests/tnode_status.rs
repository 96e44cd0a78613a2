//! Tnode lifecycle as seen through `tnodelist`

mod common;

use common::*;
use serde_json::json;
use tecra_tnode::TnodeStatus;

#[test]
fn test_tnode_check_status() {
    let mut node = regtest();
    let tnodes = fund_tnodes(&mut node, 2);
    for tnode in &tnodes {
        start(&mut node, tnode);
    }

    generate(&mut node, 1);
    assert_eq!(listed_status(&mut node, &tnodes[0]).as_deref(), Some("NEW"));
    mine_until_enabled(&mut node, &tnodes);
    for tnode in &tnodes {
        assert_eq!(listed_status(&mut node, tnode).as_deref(), Some("ENABLED"));
    }

    let locked = call(&mut node, "listlockunspent", json!([]));
    assert_eq!(locked.as_array().map(Vec::len), Some(2));

    // Spending the collateral ends the tnode for good
    spend_collateral(&mut node, &tnodes[1]);
    generate(&mut node, 1);
    assert_eq!(listed_status(&mut node, &tnodes[1]).as_deref(), Some("OUTPOINT_SPENT"));
    generate(&mut node, 50);
    assert_eq!(listed_status(&mut node, &tnodes[1]).as_deref(), Some("OUTPOINT_SPENT"));
    assert_eq!(listed_status(&mut node, &tnodes[0]).as_deref(), Some("ENABLED"));

    // A stopped daemon stops pinging
    call(&mut node, "tnode", json!(["stop-alias", "tn0"]));
    let mut seen = vec![TnodeStatus::Enabled];
    for _ in 0..40 {
        generate(&mut node, 1);
        let current = status(&node, &tnodes[0]).unwrap();
        if seen.last() != Some(&current) {
            seen.push(current);
        }
    }
    assert_eq!(
        seen,
        vec![TnodeStatus::Enabled, TnodeStatus::Expired, TnodeStatus::NewStartRequired]
    );
    assert_eq!(listed_status(&mut node, &tnodes[0]).as_deref(), Some("NEW_START_REQUIRED"));

    // and needs a fresh start
    start(&mut node, &tnodes[0]);
    generate(&mut node, 1);
    assert_eq!(status(&node, &tnodes[0]), Some(TnodeStatus::New));
    generate(&mut node, 1);
    assert_eq!(status(&node, &tnodes[0]), Some(TnodeStatus::Enabled));
}

#[test]
fn test_start_requires_known_alias() {
    let mut node = regtest();
    let err = rpc(&mut node, "tnode", json!(["start-alias", "missing"])).unwrap_err();
    assert!(err.to_string().contains("Unknown tnode alias"));

    let err = rpc(&mut node, "tnode", json!(["stop-alias", "missing"])).unwrap_err();
    assert_eq!(err.code(), -8);
}

#[test]
fn test_collateral_is_locked_from_sends() {
    let mut node = regtest();
    let tnodes = fund_tnodes(&mut node, 1);

    let conf = call(&mut node, "tnode", json!(["list-conf"]));
    assert_eq!(conf[0]["alias"], "tn0");
    assert_eq!(conf[0]["status"], "MISSING");

    let unspent = call(&mut node, "listunspent", json!([]));
    let collateral = unspent
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["txid"] == tnodes[0].collateral.txid.as_str())
        .unwrap();
    assert_eq!(collateral["locked"], true);
    assert_eq!(collateral["amount"], json!(1000.0));

    // Largest-first selection would pick the collateral if it were not locked
    let dest = call(&mut node, "getnewaddress", json!([]));
    let txid = call(&mut node, "sendtoaddress", json!([dest, 500]));
    let tx = node.mempool().get(txid.as_str().unwrap()).unwrap().clone();
    assert!(!tx.inputs.contains(&tnodes[0].collateral));

    start(&mut node, &tnodes[0]);
    generate(&mut node, 1);
    let count = call(&mut node, "tnode", json!(["count"]));
    assert_eq!(count, json!({ "total": 1, "enabled": 0 }));
    assert_eq!(node.utxo().balance(&tnodes[0].address), 1000 * tecra_core::COIN);
}
