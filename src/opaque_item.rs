//! Optional add-in item provider (spec Design Notes: trait-based optional
//! provider replacing a plugin-registry lookup).
//!
//! Loot entries may reference items the core doesn't know the shape of
//! (third-party add-ins). The loot table only needs to know whether such an
//! item is currently available; resolving it to something placeable in a
//! container is the provider's job, kept behind this trait so the core
//! never depends on plugin-loading machinery.

/// Implemented by whatever add-in registry the host wires in. A host with no
/// add-ins at all can use [`NoOpaqueItems`].
pub trait OpaqueItemProvider: Send + Sync {
    fn is_available(&self, name: &str) -> bool;
}

/// Default provider for hosts that never register opaque items — every
/// opaque loot entry is silently dropped at load time.
pub struct NoOpaqueItems;

impl OpaqueItemProvider for NoOpaqueItems {
    fn is_available(&self, _name: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_opaque_items_rejects_everything() {
        assert!(!NoOpaqueItems.is_available("anything"));
    }
}
