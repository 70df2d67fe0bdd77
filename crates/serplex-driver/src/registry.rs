use std::collections::HashSet;

use parking_lot::RwLock;
use serplex_frame::{StreamId, STDERR};
use tracing::debug;

/// Streams that reach the wire no matter what the registry says.
pub const GUARANTEED_DELIVERY: &[StreamId] = &[STDERR];

/// Tracks which streams may reach the wire.
///
/// Guaranteed-delivery streams are always active and never stored in the
/// mutable set; enabling or disabling them is silently ignored. Lookups and
/// mutations go through a read/write lock, so a caller only ever observes
/// the set as it was before or after a concurrent change.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    enabled: RwLock<HashSet<StreamId>>,
}

impl StreamRegistry {
    /// Create a registry with `streams` enabled.
    pub fn new(streams: impl IntoIterator<Item = StreamId>) -> Self {
        let enabled = streams
            .into_iter()
            .filter(|id| !Self::is_guaranteed(*id))
            .collect();
        Self {
            enabled: RwLock::new(enabled),
        }
    }

    /// True if `id` belongs to the fixed guaranteed-delivery set.
    pub fn is_guaranteed(id: StreamId) -> bool {
        GUARANTEED_DELIVERY.contains(&id)
    }

    /// True if writes to `id` reach the wire.
    pub fn is_active(&self, id: StreamId) -> bool {
        Self::is_guaranteed(id) || self.enabled.read().contains(&id)
    }

    /// Let `id` reach the wire. Returns whether membership changed.
    pub fn enable(&self, id: StreamId) -> bool {
        if Self::is_guaranteed(id) {
            return false;
        }
        let added = self.enabled.write().insert(id);
        if added {
            debug!(stream = %id, "stream enabled");
        }
        added
    }

    /// Stop `id` from reaching the wire. Returns whether membership changed.
    pub fn disable(&self, id: StreamId) -> bool {
        if Self::is_guaranteed(id) {
            return false;
        }
        let removed = self.enabled.write().remove(&id);
        if removed {
            debug!(stream = %id, "stream disabled");
        }
        removed
    }

    /// Snapshot of the explicitly enabled streams, sorted.
    pub fn enabled(&self) -> Vec<StreamId> {
        let mut streams: Vec<StreamId> = self.enabled.read().iter().copied().collect();
        streams.sort();
        streams
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serplex_frame::{KDBG, STDOUT};

    use super::*;

    #[test]
    fn defaults_are_active() {
        let registry = StreamRegistry::new([STDOUT]);
        assert!(registry.is_active(STDOUT));
        assert!(registry.is_active(STDERR));
        assert!(!registry.is_active(KDBG));
    }

    #[test]
    fn guaranteed_streams_ignore_disable() {
        let registry = StreamRegistry::new([STDOUT]);
        assert!(!registry.disable(STDERR));
        assert!(registry.is_active(STDERR));
        assert!(!registry.enable(STDERR));
        assert_eq!(registry.enabled(), vec![STDOUT]);
    }

    #[test]
    fn guaranteed_streams_are_never_stored() {
        let registry = StreamRegistry::new([STDOUT, STDERR]);
        assert_eq!(registry.enabled(), vec![STDOUT]);
    }

    #[test]
    fn enable_then_disable_restores_state() {
        let registry = StreamRegistry::new([STDOUT]);
        let jinx = StreamId::from_name("jinx").unwrap();

        let before = registry.is_active(jinx);
        assert!(registry.enable(jinx));
        assert!(registry.is_active(jinx));
        assert!(registry.disable(jinx));
        assert_eq!(registry.is_active(jinx), before);
    }

    #[test]
    fn repeated_enable_is_idempotent() {
        let registry = StreamRegistry::default();
        assert!(registry.enable(KDBG));
        assert!(!registry.enable(KDBG));
        assert!(registry.disable(KDBG));
        assert!(!registry.disable(KDBG));
    }

    #[test]
    fn concurrent_toggle_and_lookup() {
        let registry = Arc::new(StreamRegistry::new([STDOUT]));

        let toggler = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    registry.enable(KDBG);
                    registry.disable(KDBG);
                }
            })
        };

        for _ in 0..1000 {
            assert!(registry.is_active(STDOUT));
            assert!(registry.is_active(STDERR));
            let _ = registry.is_active(KDBG);
        }

        toggler.join().unwrap();
        assert!(!registry.is_active(KDBG));
    }
}
