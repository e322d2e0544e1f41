//! Internal → external port mapping for local processes.

use std::collections::HashMap;

/// Ports a local process is reachable on, keyed by the port the caller
/// refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortMap {
    mapping: HashMap<u16, u16>,
}

impl PortMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every port maps to itself.
    pub fn identity(ports: &[u16]) -> Self {
        ports.iter().fold(Self::new(), |map, port| map.with(*port, *port))
    }

    #[must_use]
    pub fn with(mut self, internal: u16, external: u16) -> Self {
        self.mapping.insert(internal, external);
        self
    }

    pub fn get(&self, internal: u16) -> Option<u16> {
        self.mapping.get(&internal).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_and_explicit_mapping() {
        let map = PortMap::identity(&[8080]).with(80, 32768);
        assert_eq!(map.get(8080), Some(8080));
        assert_eq!(map.get(80), Some(32768));
        assert_eq!(map.get(443), None);
        assert!(PortMap::new().is_empty());
    }
}
