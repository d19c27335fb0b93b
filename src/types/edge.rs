//! Edge types for the review graph.

use serde::{Deserialize, Serialize};
use super::contributor::ContributorId;

/// Ordered (approver, author) pair identifying an edge.
///
/// Implements `Ord` for deterministic table iteration: (approver, author).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    /// Contributor who approved (source).
    pub approver: ContributorId,
    /// Contributor who authored the change (target).
    pub author: ContributorId,
}

impl EdgeKey {
    /// Create a new edge key.
    pub fn new(approver: ContributorId, author: ContributorId) -> Self {
        Self { approver, author }
    }

    /// Whether a contributor approved their own change.
    pub fn is_self_loop(&self) -> bool {
        self.approver == self.author
    }
}

/// Directed approver → author edge with its approval multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewEdge {
    /// Contributor who approved (source).
    pub approver: ContributorId,
    /// Contributor who authored the change (target).
    pub author: ContributorId,
    /// Qualifying approvals from approver on author's changes.
    pub count: u32,
}

impl ReviewEdge {
    /// Create a new edge.
    pub fn new(approver: ContributorId, author: ContributorId, count: u32) -> Self {
        Self {
            approver,
            author,
            count,
        }
    }

    /// Key of this edge.
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.approver, self.author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_key_ordering() {
        let id1 = ContributorId::new(1);
        let id2 = ContributorId::new(2);
        let id3 = ContributorId::new(3);

        let e1 = EdgeKey::new(id1, id2);
        let e2 = EdgeKey::new(id1, id3);
        let e3 = EdgeKey::new(id2, id1);

        // Same approver, different author
        assert!(e1 < e2);
        // Different approver
        assert!(e2 < e3);
    }

    #[test]
    fn test_direction_matters() {
        let id1 = ContributorId::new(1);
        let id2 = ContributorId::new(2);

        assert_ne!(EdgeKey::new(id1, id2), EdgeKey::new(id2, id1));
        assert!(EdgeKey::new(id1, id1).is_self_loop());
        assert!(!ReviewEdge::new(id1, id2, 4).key().is_self_loop());
    }
}
