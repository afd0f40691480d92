//! The namespacing rule from §4.1: non-global identifiers are prefixed
//! with the owning network's prefix; accounts (by username) and paths (by
//! full-path string) are global and are never prefixed.

use honeygraph::types::NetworkPrefix;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityScope {
    Global,
    Namespaced,
}

pub fn namespaced(prefix: &NetworkPrefix, scope: EntityScope, id: &str) -> String {
    match scope {
        EntityScope::Global => id.to_owned(),
        EntityScope::Namespaced => format!("{}{}", prefix.as_str(), id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryFrom;

    #[test]
    fn global_identifiers_pass_through_unprefixed() {
        let prefix = NetworkPrefix::try_from("spkccT_").unwrap();
        assert_eq!(namespaced(&prefix, EntityScope::Global, "alice"), "alice");
    }

    #[test]
    fn namespaced_identifiers_are_prefixed() {
        let prefix = NetworkPrefix::try_from("spkccT_").unwrap();
        assert_eq!(
            namespaced(&prefix, EntityScope::Namespaced, "contract-1"),
            "spkccT_contract-1"
        );
    }
}
