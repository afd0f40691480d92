//! Top-level dispatch: the transformer picks a per-category rule based on
//! `path[0]` (§4.7, §9's "dynamic JSON everywhere" note — tagged variants
//! instead of stringly-typed branching deep in the pipeline).

use honeygraph::metrics::IngestMetrics;
use honeygraph::types::{BlockInfo, OperationKind};
use slog::{debug, Logger};

use crate::accumulator::Accumulator;
use crate::contract;
use crate::simple;

/// Applies one `(path, data, kind)` operation to `acc`, dropping and
/// counting operations whose `path[0]` has no transform rule.
pub fn dispatch_operation(
    path: &[String],
    data: &serde_json::Value,
    kind: OperationKind,
    block: BlockInfo,
    acc: &mut Accumulator,
    metrics: &IngestMetrics,
    logger: &Logger,
) {
    let Some(tag) = path.first() else {
        metrics
            .unknown_path_dropped
            .with_label_values(&[acc.prefix().as_str()])
            .inc();
        return;
    };

    match tag.as_str() {
        "balances" => simple::transform_balance(path, data, kind, block, acc),
        "broca" => simple::transform_broca(path, data, kind, block, acc),
        "contract" => contract::transform_contract(path, data, kind, block, acc),
        "dex" => {
            if path.get(2).map(String::as_str) == Some("ohlc") {
                simple::transform_ohlc(path, data, kind, block, acc);
            } else {
                simple::transform_dex(path, data, kind, block, acc);
            }
        }
        "feed" => simple::transform_feed(path, data, kind, block, acc),
        "chain" => simple::transform_chain_stat(path, data, kind, block, acc),
        "services" => simple::transform_service(path, data, kind, block, acc),
        "validators" => simple::transform_validator(path, data, kind, block, acc),
        other => {
            debug!(logger, "dropping operation with unknown path tag"; "tag" => other);
            metrics
                .unknown_path_dropped
                .with_label_values(&[acc.prefix().as_str()])
                .inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use honeygraph::log::discard_logger;
    use honeygraph::types::NetworkPrefix;
    use prometheus::Registry;

    use crate::accumulator::Identity;

    use super::*;

    fn fixture() -> (Accumulator, IngestMetrics, Logger) {
        let prefix = NetworkPrefix::try_from("spkccT_").unwrap();
        let registry = Registry::new();
        let metrics = IngestMetrics::new(&registry).unwrap();
        (Accumulator::new(prefix), metrics, discard_logger())
    }

    #[test]
    fn routes_balances_path_to_account() {
        let (mut acc, metrics, logger) = fixture();
        let block = BlockInfo {
            block_num: 1,
            timestamp: 0,
        };
        dispatch_operation(
            &["balances".to_owned(), "alice".to_owned()],
            &serde_json::json!(1000),
            OperationKind::Put,
            block,
            &mut acc,
            &metrics,
            &logger,
        );
        let (mutations, _) = acc.drain();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].identity, "alice");
    }

    #[test]
    fn unknown_tag_is_dropped_and_counted() {
        let (mut acc, metrics, logger) = fixture();
        let block = BlockInfo {
            block_num: 1,
            timestamp: 0,
        };
        dispatch_operation(
            &["nonsense".to_owned()],
            &serde_json::json!(null),
            OperationKind::Put,
            block,
            &mut acc,
            &metrics,
            &logger,
        );
        let (mutations, _) = acc.drain();
        assert!(mutations.is_empty());
        assert_eq!(
            metrics
                .unknown_path_dropped
                .with_label_values(&["spkccT_"])
                .get(),
            1
        );
    }

    #[test]
    fn dex_ohlc_subpath_routes_separately_from_orders() {
        let (mut acc, metrics, logger) = fixture();
        let block = BlockInfo {
            block_num: 1,
            timestamp: 0,
        };
        dispatch_operation(
            &["dex".to_owned(), "LARYNX".to_owned(), "ohlc".to_owned(), "1h".to_owned()],
            &serde_json::json!({"open": 1}),
            OperationKind::Put,
            block,
            &mut acc,
            &metrics,
            &logger,
        );
        acc.upsert(
            honeygraph_store::EntityKind::Account,
            Identity::Account("placeholder".to_owned()),
            serde_json::json!({}),
        );
        let (mutations, _) = acc.drain();
        assert!(mutations
            .iter()
            .any(|m| m.entity == honeygraph_store::EntityKind::OhlcBucket));
    }
}
