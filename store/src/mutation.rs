//! The mutation shape the Data Transformer produces and the Graph Client
//! Adapter commits. One `Mutation` is one upserted or deleted node; a
//! batch's worth of them forms a single atomic `write()` call.

use serde_json::Value;

use crate::namespace::EntityScope;

/// Entity classes the transformer can emit. Only `Account` and `Path` are
/// global (§3, §4.1); everything else is namespaced under the owning
/// network's prefix.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EntityKind {
    Account,
    Path,
    Contract,
    ContractFile,
    Balance,
    Broca,
    DexOrder,
    OhlcBucket,
    Feed,
    ChainStat,
    Service,
    Validator,
}

impl EntityKind {
    pub fn scope(&self) -> EntityScope {
        match self {
            EntityKind::Account | EntityKind::Path => EntityScope::Global,
            _ => EntityScope::Namespaced,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Account => "Account",
            EntityKind::Path => "Path",
            EntityKind::Contract => "Contract",
            EntityKind::ContractFile => "ContractFile",
            EntityKind::Balance => "Balance",
            EntityKind::Broca => "Broca",
            EntityKind::DexOrder => "DexOrder",
            EntityKind::OhlcBucket => "OhlcBucket",
            EntityKind::Feed => "Feed",
            EntityKind::ChainStat => "ChainStat",
            EntityKind::Service => "Service",
            EntityKind::Validator => "Validator",
        }
    }
}

#[derive(Clone, Debug)]
pub enum MutationOp {
    Set(Value),
    Delete(Value),
}

/// One upsert or delete, keyed by a stable identity that has not yet been
/// namespaced. `temp_id` is the accumulator's blank-node handle used to
/// link this entity to others within the same batch (§4.7, §9).
#[derive(Clone, Debug)]
pub struct Mutation {
    pub entity: EntityKind,
    pub identity: String,
    pub temp_id: String,
    pub op: MutationOp,
}

impl Mutation {
    pub fn set(entity: EntityKind, identity: impl Into<String>, temp_id: impl Into<String>, data: Value) -> Self {
        Mutation {
            entity,
            identity: identity.into(),
            temp_id: temp_id.into(),
            op: MutationOp::Set(data),
        }
    }
}
