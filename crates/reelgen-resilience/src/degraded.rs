//! Degraded-service bookkeeping and the read-only signal handed to callers.

use std::collections::{BTreeSet, HashMap};
use tokio::sync::watch;

/// Set of degraded services plus per-service error counters.
///
/// Owned by the monitor. Every change is published to [`DegradedSignal`]
/// subscribers.
#[derive(Debug)]
pub struct DegradedServiceSet {
    services: BTreeSet<String>,
    attempts: HashMap<String, u32>,
    tx: watch::Sender<BTreeSet<String>>,
}

impl Default for DegradedServiceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl DegradedServiceSet {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(BTreeSet::new());
        Self {
            services: BTreeSet::new(),
            attempts: HashMap::new(),
            tx,
        }
    }

    /// Mark `service` degraded. Returns true if it was not already.
    pub fn insert(&mut self, service: &str) -> bool {
        let added = self.services.insert(service.to_string());
        if added {
            self.publish();
        }
        added
    }

    /// Clear `service` and its counter. Returns true if it was degraded.
    pub fn remove(&mut self, service: &str) -> bool {
        self.attempts.remove(service);
        let removed = self.services.remove(service);
        if removed {
            self.publish();
        }
        removed
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.contains(service)
    }

    pub fn is_system_degraded(&self) -> bool {
        !self.services.is_empty()
    }

    pub fn services(&self) -> Vec<String> {
        self.services.iter().cloned().collect()
    }

    /// Increment and return the error counter for `service`.
    pub fn bump_attempts(&mut self, service: &str) -> u32 {
        let count = self.attempts.entry(service.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn attempts(&self, service: &str) -> u32 {
        self.attempts.get(service).copied().unwrap_or(0)
    }

    pub fn signal(&self) -> DegradedSignal {
        DegradedSignal {
            rx: self.tx.subscribe(),
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.services.clone());
    }
}

/// Cloneable read-only view of the degraded set.
#[derive(Debug, Clone)]
pub struct DegradedSignal {
    rx: watch::Receiver<BTreeSet<String>>,
}

impl DegradedSignal {
    /// A signal that never reports anything degraded.
    pub fn healthy() -> Self {
        let (_tx, rx) = watch::channel(BTreeSet::new());
        Self { rx }
    }

    pub fn is_degraded(&self, service: &str) -> bool {
        self.rx.borrow().contains(service)
    }

    pub fn is_system_degraded(&self) -> bool {
        !self.rx.borrow().is_empty()
    }

    pub fn services(&self) -> Vec<String> {
        self.rx.borrow().iter().cloned().collect()
    }

    /// Wait for the next change. Returns false once the monitor is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

impl Default for DegradedSignal {
    fn default() -> Self {
        Self::healthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove_publish() {
        let mut set = DegradedServiceSet::new();
        let signal = set.signal();

        assert!(set.insert("pexels"));
        assert!(!set.insert("pexels"));
        assert!(signal.is_degraded("pexels"));
        assert!(signal.is_system_degraded());

        set.bump_attempts("pexels");
        assert!(set.remove("pexels"));
        assert_eq!(set.attempts("pexels"), 0);
        assert!(!signal.is_system_degraded());
    }

    #[test]
    fn test_healthy_signal_survives_sender_drop() {
        let signal = DegradedSignal::healthy();
        assert!(!signal.is_degraded("elevenlabs"));
        assert!(signal.services().is_empty());
    }
}
