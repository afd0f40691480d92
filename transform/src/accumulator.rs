//! The batch-scoped accumulator (§4.7, §9): maps a stable entity identity
//! to a temporary id so that multiple operations referencing the same
//! entity within one batch resolve to the same node instead of
//! duplicating it. Scoped to a single batch; never shared across tasks.

use std::collections::HashMap;

use honeygraph::types::{BlockNumber, NetworkPrefix};
use honeygraph_store::{namespaced, EntityKind, EntityScope, Mutation, MutationOp};
use serde_json::Value;

/// Stable identity an entity is keyed by within one batch. Mirrors the
/// identity kinds named in §9: account-by-username, path-by-full-path,
/// contract-by-id, file-by-cid.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Identity {
    Account(String),
    Path(String),
    Contract(String),
    /// `(contractId, cid)` — ContractFiles are contract-specific (§4.7.8).
    ContractFile(String, String),
}

struct PendingEntity {
    entity: EntityKind,
    identity: String,
    temp_id: String,
    data: Value,
}

/// Tracks, per CID, which folder path currently claims it and at what
/// block number — used to implement §4.7.8: when multiple contracts
/// reference the same CID, the newest block number wins the file's path
/// membership even though each contract gets its own ContractFile row.
#[derive(Default)]
struct CidPathClaim {
    full_path: String,
    block_num: BlockNumber,
}

pub struct Accumulator {
    prefix: NetworkPrefix,
    entities: HashMap<Identity, PendingEntity>,
    order: Vec<Identity>,
    cid_path_claims: HashMap<String, CidPathClaim>,
}

impl Accumulator {
    pub fn new(prefix: NetworkPrefix) -> Self {
        Accumulator {
            prefix,
            entities: HashMap::new(),
            order: Vec::new(),
            cid_path_claims: HashMap::new(),
        }
    }

    pub fn prefix(&self) -> &NetworkPrefix {
        &self.prefix
    }

    /// Inserts or replaces an entity's pending mutation data. Later calls
    /// for the same identity within a batch win (normal upsert semantics),
    /// except for Path, whose `data` is recomputed at drain time from the
    /// accumulated file counts rather than from any single call's payload.
    pub fn upsert(&mut self, entity: EntityKind, identity: Identity, data: Value) -> String {
        let temp_id = identity_key(&identity);
        if !self.entities.contains_key(&identity) {
            self.order.push(identity.clone());
        }
        self.entities.insert(
            identity.clone(),
            PendingEntity {
                entity,
                identity: identity_string(&identity),
                temp_id: temp_id.clone(),
                data,
            },
        );
        temp_id
    }

    /// Marks `identity` for deletion rather than upsert. Used for `del`
    /// operations on the simpler per-path state categories (§4.7).
    pub fn delete(&mut self, entity: EntityKind, identity: Identity) -> String {
        self.upsert(entity, identity, Value::Null)
    }

    /// A fully namespaced reference to `identity`'s temp id, suitable for
    /// embedding as a nested edge target (§4.1: a temp id is prefixed iff
    /// its target entity is non-global).
    pub fn link(&self, entity: EntityKind, identity: &Identity) -> String {
        namespaced(&self.prefix, entity.scope(), &identity_key(identity))
    }

    pub fn uid_ref(&self, entity: EntityKind, identity: &Identity) -> Value {
        serde_json::json!({ "uid": format!("_:{}", self.link(entity, identity)) })
    }

    /// Records that `cid`'s folder membership is claimed by `full_path` as
    /// of `block_num`. Only the highest block number wins (§4.7.8).
    /// Returns true if this call's path is (now) the winner.
    pub fn claim_cid_path(&mut self, cid: &str, full_path: &str, block_num: BlockNumber) -> bool {
        let entry = self.cid_path_claims.entry(cid.to_owned()).or_default();
        if full_path.is_empty() {
            return false;
        }
        if entry.full_path.is_empty() || block_num >= entry.block_num {
            entry.full_path = full_path.to_owned();
            entry.block_num = block_num;
            true
        } else {
            false
        }
    }

    pub fn winning_path_for_cid(&self, cid: &str) -> Option<&str> {
        self.cid_path_claims
            .get(cid)
            .map(|c| c.full_path.as_str())
            .filter(|p| !p.is_empty())
    }

    /// Every distinct CID that currently claims `full_path`, used to
    /// compute a Path's `itemCount` (files directly under it) at drain
    /// time.
    pub fn files_under(&self, full_path: &str) -> usize {
        self.cid_path_claims
            .values()
            .filter(|c| c.full_path == full_path)
            .count()
    }

    pub fn ensure_path_chain(&mut self, full_path: &str) {
        let mut acc = String::new();
        for (i, segment) in full_path.split('/').filter(|s| !s.is_empty()).enumerate() {
            if i > 0 {
                acc.push('/');
            }
            acc.push_str(segment);
            let identity = Identity::Path(acc.clone());
            if !self.entities.contains_key(&identity) {
                self.order.push(identity.clone());
                self.entities.insert(
                    identity,
                    PendingEntity {
                        entity: EntityKind::Path,
                        identity: acc.clone(),
                        temp_id: format!("Path:{}", acc),
                        data: Value::Null,
                    },
                );
            }
        }
    }

    /// Drains the accumulator into the final mutation list, recomputing
    /// every Path's `itemCount` from the CID claims observed across the
    /// whole batch.
    pub fn drain(mut self) -> (Vec<Mutation>, HashMap<String, usize>) {
        let mut path_counts = HashMap::new();
        for identity in &self.order {
            if let Identity::Path(p) = identity {
                path_counts.insert(p.clone(), self.files_under(p));
            }
        }

        let mut out = Vec::with_capacity(self.order.len());
        for identity in self.order.drain(..) {
            let pending = self.entities.remove(&identity).expect("tracked in order");
            let data = if let Identity::Path(p) = &identity {
                serde_json::json!({
                    "full_path": p,
                    "item_count": path_counts.get(p).copied().unwrap_or(0),
                })
            } else {
                pending.data
            };

            let op = if data.is_null() {
                MutationOp::Delete(Value::Null)
            } else {
                MutationOp::Set(data)
            };

            out.push(Mutation {
                entity: pending.entity,
                identity: pending.identity,
                temp_id: pending.temp_id,
                op,
            });
        }

        (out, path_counts)
    }
}

fn identity_key(identity: &Identity) -> String {
    match identity {
        Identity::Account(u) => format!("Account:{}", u),
        Identity::Path(p) => format!("Path:{}", p),
        Identity::Contract(c) => format!("Contract:{}", c),
        Identity::ContractFile(c, cid) => format!("ContractFile:{}:{}", c, cid),
    }
}

fn identity_string(identity: &Identity) -> String {
    match identity {
        Identity::Account(u) => u.clone(),
        Identity::Path(p) => p.clone(),
        Identity::Contract(c) => c.clone(),
        Identity::ContractFile(c, cid) => format!("{}:{}", c, cid),
    }
}
