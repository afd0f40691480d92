//! Per-path rules for the state categories that aren't the contract
//! decomposition: balances, broca, dex order books, OHLC buckets, feeds,
//! chain stats, services, and validators (§4.7). Each dispatches on
//! `path[1..]` to build one upserted (or deleted) entity.

use honeygraph::types::{BlockInfo, OperationKind};
use honeygraph_store::EntityKind;
use serde_json::Value;

use crate::accumulator::{Accumulator, Identity};

/// `balances/<username>` → Account.balance
pub fn transform_balance(
    path: &[String],
    data: &Value,
    kind: OperationKind,
    block: BlockInfo,
    acc: &mut Accumulator,
) {
    let Some(username) = path.get(1) else { return };
    let identity = Identity::Account(username.clone());

    if matches!(kind, OperationKind::Del) {
        acc.delete(EntityKind::Account, identity);
        return;
    }

    acc.upsert(
        EntityKind::Account,
        identity,
        serde_json::json!({
            "username": username,
            "balance": data,
            "last_block": block.block_num,
        }),
    );
}

/// `broca/<username>` → Account.broca (a secondary, decaying resource
/// balance in the same global Account entity).
pub fn transform_broca(
    path: &[String],
    data: &Value,
    kind: OperationKind,
    block: BlockInfo,
    acc: &mut Accumulator,
) {
    let Some(username) = path.get(1) else { return };
    let identity = Identity::Account(username.clone());

    if matches!(kind, OperationKind::Del) {
        acc.delete(EntityKind::Account, identity);
        return;
    }

    acc.upsert(
        EntityKind::Account,
        identity,
        serde_json::json!({
            "username": username,
            "broca": data,
            "last_block": block.block_num,
        }),
    );
}

/// `dex/<token>/<orderType>/<orderId>` → DexOrder, namespaced per network.
pub fn transform_dex(
    path: &[String],
    data: &Value,
    kind: OperationKind,
    block: BlockInfo,
    acc: &mut Accumulator,
) {
    let key = path[1..].join(":");
    if key.is_empty() {
        return;
    }
    let identity = Identity::Contract(format!("dex:{}", key));

    if matches!(kind, OperationKind::Del) {
        acc.delete(EntityKind::DexOrder, identity);
        return;
    }

    acc.upsert(
        EntityKind::DexOrder,
        identity,
        serde_json::json!({
            "key": key,
            "order": data,
            "last_block": block.block_num,
        }),
    );
}

/// `dex/<token>/ohlc/<bucket>` → OhlcBucket.
pub fn transform_ohlc(
    path: &[String],
    data: &Value,
    kind: OperationKind,
    block: BlockInfo,
    acc: &mut Accumulator,
) {
    let key = path[1..].join(":");
    if key.is_empty() {
        return;
    }
    let identity = Identity::Contract(format!("ohlc:{}", key));

    if matches!(kind, OperationKind::Del) {
        acc.delete(EntityKind::OhlcBucket, identity);
        return;
    }

    acc.upsert(
        EntityKind::OhlcBucket,
        identity,
        serde_json::json!({
            "key": key,
            "bucket": data,
            "last_block": block.block_num,
        }),
    );
}

/// `feed/<symbol>` → Feed (price oracle feeds).
pub fn transform_feed(
    path: &[String],
    data: &Value,
    kind: OperationKind,
    block: BlockInfo,
    acc: &mut Accumulator,
) {
    let Some(symbol) = path.get(1) else { return };
    let identity = Identity::Contract(format!("feed:{}", symbol));

    if matches!(kind, OperationKind::Del) {
        acc.delete(EntityKind::Feed, identity);
        return;
    }

    acc.upsert(
        EntityKind::Feed,
        identity,
        serde_json::json!({
            "symbol": symbol,
            "value": data,
            "last_block": block.block_num,
        }),
    );
}

/// `chain/stats/<name>` → ChainStat.
pub fn transform_chain_stat(
    path: &[String],
    data: &Value,
    kind: OperationKind,
    block: BlockInfo,
    acc: &mut Accumulator,
) {
    let key = path[1..].join(":");
    if key.is_empty() {
        return;
    }
    let identity = Identity::Contract(format!("chainstat:{}", key));

    if matches!(kind, OperationKind::Del) {
        acc.delete(EntityKind::ChainStat, identity);
        return;
    }

    acc.upsert(
        EntityKind::ChainStat,
        identity,
        serde_json::json!({
            "key": key,
            "value": data,
            "last_block": block.block_num,
        }),
    );
}

/// `services/<account>/<serviceId>` → Service.
pub fn transform_service(
    path: &[String],
    data: &Value,
    kind: OperationKind,
    block: BlockInfo,
    acc: &mut Accumulator,
) {
    let key = path[1..].join(":");
    if key.is_empty() {
        return;
    }
    let identity = Identity::Contract(format!("service:{}", key));

    if matches!(kind, OperationKind::Del) {
        acc.delete(EntityKind::Service, identity);
        return;
    }

    acc.upsert(
        EntityKind::Service,
        identity,
        serde_json::json!({
            "key": key,
            "config": data,
            "last_block": block.block_num,
        }),
    );
}

/// `validators/<account>` → Validator.
pub fn transform_validator(
    path: &[String],
    data: &Value,
    kind: OperationKind,
    block: BlockInfo,
    acc: &mut Accumulator,
) {
    let Some(account) = path.get(1) else { return };
    let identity = Identity::Contract(format!("validator:{}", account));

    if matches!(kind, OperationKind::Del) {
        acc.delete(EntityKind::Validator, identity);
        return;
    }

    acc.upsert(
        EntityKind::Validator,
        identity,
        serde_json::json!({
            "account": account,
            "info": data,
            "last_block": block.block_num,
        }),
    );
}
