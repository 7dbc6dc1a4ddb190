use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a node (belt, loader, unloader, router, junction) in the
    /// network.
    pub struct NodeId;

    /// Identifies a transport line in the line registry.
    pub struct LineId;
}

/// Identifies an item kind. Cheap to copy and compare; the meaning of each
/// id belongs to the embedding game, not the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_id_equality() {
        let a = ItemTypeId(0);
        let b = ItemTypeId(0);
        let c = ItemTypeId(1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ItemTypeId(0), "plate");
        map.insert(ItemTypeId(1), "gear");
        assert_eq!(map[&ItemTypeId(1)], "gear");
    }
}
