//! Contract decomposition (§4.7, items 1-8) — the single most intricate
//! transformation, retained because its shape determines the surrounding
//! pipeline. A contract value bundles a storage deal's metadata (the file
//! map, expiry, purchaser, …) plus a compact per-file metadata string that
//! must be parsed out into folders, names, and flags.

use std::collections::HashMap;

use honeygraph::types::{BlockInfo, BlockNumber, OperationKind};
use honeygraph_store::EntityKind;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::accumulator::{Accumulator, Identity};

/// Bit set in a file record's flag nibble when the file is a thumbnail
/// derived from another file in the same contract (§4.7 item 7). Such
/// files are ContractFile entities but never get their own Path node.
const FLAG_THUMBNAIL: u32 = 1 << 2;

/// The wire shape of a `contract/<contractId>` value. Field names follow
/// the source protocol's compact encoding.
#[derive(Debug, Deserialize)]
struct ContractRecord {
    /// Total data size across all files, in bytes.
    #[serde(default)]
    t: u64,
    /// Storage-node account that hosts the data.
    #[serde(default)]
    s: String,
    /// Purchasing account.
    #[serde(default)]
    p: String,
    /// Current consensus count (number of nodes that have attested storage).
    #[serde(default)]
    c: u32,
    /// `cid -> size` file map, order-preserving so display order matches
    /// the order the purchaser uploaded files in.
    #[serde(default)]
    df: IndexMap<String, u64>,
    /// Expiry block height.
    #[serde(default)]
    e: BlockNumber,
    /// Extension request block height, if any (0 = none requested).
    #[serde(default)]
    extend: BlockNumber,
    /// The compact per-file metadata string (parsed by [`parse_metadata`]).
    #[serde(default)]
    m: String,
    /// Account the contract's resulting assets should accrue to, if it
    /// differs from the purchaser (e.g. a delegated upload).
    #[serde(default)]
    f: String,
    /// Refund amount credited back to the purchaser on early fill.
    #[serde(default)]
    r: u64,
    /// Space actually utilized by the contract, in bytes; may differ from
    /// `t` once storage nodes report real usage.
    #[serde(default)]
    u: u64,
    /// Node broca payment shares, by storage-node account.
    #[serde(default)]
    nodes: HashMap<String, u64>,
    /// Power delegation factor.
    #[serde(default)]
    pow: u32,
}

/// One file's parsed attributes, bound to a folder index (§4.7 item 4).
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileRecord {
    cid: String,
    folder_idx: i32,
    name: String,
    ext: String,
    mime: String,
    license: String,
    labels: String,
    flags: u32,
}

impl FileRecord {
    fn is_thumbnail(&self) -> bool {
        self.flags & FLAG_THUMBNAIL != 0
    }
}

/// The result of parsing a contract's compact metadata string: a version,
/// the encryption key list, the folder-index → path map, and one
/// [`FileRecord`] per comma-group, bound to `df`'s cids in order.
#[derive(Debug, Default)]
struct ParsedMetadata {
    version: String,
    enc_keys: Vec<String>,
    folders: HashMap<i32, String>,
    files: Vec<FileRecord>,
}

/// Parses the compact metadata grammar:
///
/// ```text
/// "<version>|<encKeysCsv>|<folderMapCsv>|<group>,<group>,..."
/// ```
///
/// where each folder entry in `<folderMapCsv>` is `<idx>:<name>` and each
/// `<group>` is `<folderIdx>:<name>:<ext>:<mime>:<license>:<labels>.<flags>`,
/// `<flags>` a decimal bit field (bit 2 = thumbnail). Groups are bound
/// positionally to `df`'s cids in iteration order. Malformed groups are
/// skipped rather than failing the whole contract; a contract with
/// unparseable metadata still gets its file map committed with blank
/// file attributes.
fn parse_metadata(m: &str, cids_in_order: &[String]) -> ParsedMetadata {
    let mut parts = m.splitn(4, '|');
    let version = parts.next().unwrap_or_default().to_owned();
    let enc_keys = parts
        .next()
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();

    let mut folders = HashMap::new();
    for entry in parts.next().unwrap_or_default().split(',') {
        if entry.is_empty() {
            continue;
        }
        if let Some((idx, name)) = entry.split_once(':') {
            if let Ok(idx) = idx.parse::<i32>() {
                folders.insert(idx, name.to_owned());
            }
        }
    }

    let groups_csv = parts.next().unwrap_or_default();
    let mut files = Vec::new();
    for (group, cid) in groups_csv.split(',').zip(cids_in_order.iter()) {
        if group.is_empty() {
            continue;
        }
        let (body, flags_str) = group.rsplit_once('.').unwrap_or((group, "0"));
        let fields: Vec<&str> = body.splitn(6, ':').collect();
        let folder_idx = fields.first().and_then(|s| s.parse::<i32>().ok()).unwrap_or(-1);
        let flags = flags_str.parse::<u32>().unwrap_or(0);

        files.push(FileRecord {
            cid: cid.clone(),
            folder_idx,
            name: fields.get(1).copied().unwrap_or_default().to_owned(),
            ext: fields.get(2).copied().unwrap_or_default().to_owned(),
            mime: fields.get(3).copied().unwrap_or_default().to_owned(),
            license: fields.get(4).copied().unwrap_or_default().to_owned(),
            labels: fields.get(5).copied().unwrap_or_default().to_owned(),
            flags,
        });
    }

    ParsedMetadata {
        version,
        enc_keys,
        folders,
        files,
    }
}

/// Resolves a folder index to its full path under `owner`. The folder
/// map's values are already slash-joined relative paths (e.g.
/// `"Documents/2024"`), so ancestor creation (§4.7 item 5) falls out of
/// `Accumulator::ensure_path_chain` walking that joined string one
/// segment at a time. An absent or negative index resolves to the
/// owner's root.
fn resolve_folder_path(owner: &str, folder_idx: i32, folders: &HashMap<i32, String>) -> String {
    match folders.get(&folder_idx) {
        Some(rel) if !rel.is_empty() => format!("{}/{}", owner, rel),
        _ => owner.to_owned(),
    }
}

/// `contract/<contractId>` → Contract, ContractFile×N, Path×N (§4.7).
pub fn transform_contract(
    path: &[String],
    data: &Value,
    kind: OperationKind,
    block: BlockInfo,
    acc: &mut Accumulator,
) {
    let Some(contract_id) = path.get(1) else { return };

    if matches!(kind, OperationKind::Del) {
        acc.delete(EntityKind::Contract, Identity::Contract(contract_id.clone()));
        return;
    }

    let record: ContractRecord = match serde_json::from_value(data.clone()) {
        Ok(r) => r,
        Err(_) => return,
    };

    if !record.s.is_empty() {
        acc.upsert(
            EntityKind::Account,
            Identity::Account(record.s.clone()),
            serde_json::json!({ "username": record.s }),
        );
    }
    if !record.p.is_empty() {
        acc.upsert(
            EntityKind::Account,
            Identity::Account(record.p.clone()),
            serde_json::json!({ "username": record.p }),
        );
    }
    let owner = if !record.f.is_empty() { &record.f } else { &record.p };
    if !owner.is_empty() {
        acc.upsert(
            EntityKind::Account,
            Identity::Account(owner.clone()),
            serde_json::json!({ "username": owner }),
        );
    }

    let cids: Vec<String> = record.df.keys().cloned().collect();
    let parsed = parse_metadata(&record.m, &cids);
    let file_by_cid: HashMap<&str, &FileRecord> =
        parsed.files.iter().map(|f| (f.cid.as_str(), f)).collect();

    let contract_identity = Identity::Contract(contract_id.clone());
    acc.upsert(
        EntityKind::Contract,
        contract_identity.clone(),
        serde_json::json!({
            "contract_id": contract_id,
            "storage_node": acc.uid_ref(EntityKind::Account, &Identity::Account(record.s.clone())),
            "purchaser": acc.uid_ref(EntityKind::Account, &Identity::Account(record.p.clone())),
            "total_size": record.t,
            "utilized_size": record.u,
            "consensus_count": record.c,
            "expiry_block": record.e,
            "extend_block": record.extend,
            "refund": record.r,
            "power": record.pow,
            "metadata_version": parsed.version,
            "encryption_keys": parsed.enc_keys,
            "node_shares": record.nodes,
            "last_block": block.block_num,
        }),
    );

    for (cid, size) in &record.df {
        let file_identity = Identity::ContractFile(contract_id.clone(), cid.clone());
        let empty = FileRecord {
            cid: cid.clone(),
            folder_idx: -1,
            name: String::new(),
            ext: String::new(),
            mime: String::new(),
            license: String::new(),
            labels: String::new(),
            flags: 0,
        };
        let file = file_by_cid.get(cid.as_str()).copied().unwrap_or(&empty);

        let full_path = if file.is_thumbnail() {
            None
        } else {
            Some(resolve_folder_path(owner, file.folder_idx, &parsed.folders))
        };

        if let Some(full_path) = &full_path {
            acc.ensure_path_chain(full_path);
            acc.claim_cid_path(cid, full_path, block.block_num);
        }

        let mut file_data = serde_json::json!({
            "cid": cid,
            "size": size,
            "name": file.name,
            "extension": file.ext,
            "mime": file.mime,
            "license": file.license,
            "labels": file.labels,
            "thumbnail": file.is_thumbnail(),
            "flags": file.flags,
            "contract": acc.uid_ref(EntityKind::Contract, &contract_identity),
        });

        if let Some(winning_path) = acc.winning_path_for_cid(cid) {
            file_data["parent_path"] =
                acc.uid_ref(EntityKind::Path, &Identity::Path(winning_path.to_owned()));
        }

        acc.upsert(EntityKind::ContractFile, file_identity, file_data);
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use honeygraph::types::NetworkPrefix;

    use super::*;

    #[test]
    fn parses_metadata_into_folders_and_files() {
        let m = "1|enckeyA|0:Documents,1:Documents/2024|0:report:pdf:application-pdf:CC0:work.0,1:photo:jpg:image-jpeg::vacation.0";
        let cids = vec!["cid1".to_owned(), "cid2".to_owned()];
        let parsed = parse_metadata(m, &cids);

        assert_eq!(parsed.version, "1");
        assert_eq!(parsed.enc_keys, vec!["enckeyA".to_owned()]);
        assert_eq!(parsed.folders.get(&0).unwrap(), "Documents");
        assert_eq!(parsed.folders.get(&1).unwrap(), "Documents/2024");
        assert_eq!(parsed.files.len(), 2);
        assert_eq!(parsed.files[0].name, "report");
        assert_eq!(parsed.files[0].folder_idx, 0);
        assert!(!parsed.files[0].is_thumbnail());
    }

    #[test]
    fn thumbnail_flag_bit_is_detected() {
        let m = "1||0:Documents|0:thumb:jpg:image-jpeg::.4";
        let cids = vec!["cid1".to_owned()];
        let parsed = parse_metadata(m, &cids);
        assert!(parsed.files[0].is_thumbnail());
    }

    #[test]
    fn transform_contract_upserts_contract_files_and_paths() {
        let prefix = NetworkPrefix::try_from("spkccT_").unwrap();
        let mut acc = Accumulator::new(prefix);
        let block = BlockInfo {
            block_num: 100,
            timestamp: 0,
        };

        let data = serde_json::json!({
            "t": 2048,
            "s": "node1",
            "p": "alice",
            "c": 3,
            "df": { "cid1": 1024, "cid2": 1024 },
            "e": 200,
            "m": "1||0:Documents|0:report:pdf:application-pdf:CC0:.0,0:thumb:jpg:image-jpeg::.4",
        });

        transform_contract(
            &["contract".to_owned(), "C1".to_owned()],
            &data,
            OperationKind::Put,
            block,
            &mut acc,
        );

        assert_eq!(acc.files_under("alice/Documents"), 1);
        assert_eq!(acc.winning_path_for_cid("cid1"), Some("alice/Documents"));
        assert_eq!(acc.winning_path_for_cid("cid2"), None);

        let (mutations, _) = acc.drain();
        let contract_mutation = mutations
            .iter()
            .find(|m| m.identity == "C1")
            .expect("contract mutation present");
        assert_eq!(contract_mutation.entity, EntityKind::Contract);
    }
}
