//! Cluster membership lookup.
//!
//! A configuration only reports on pods from the clusters it is connected
//! to. The registry answers whether a cluster name belongs to them.

use async_trait::async_trait;
use std::collections::BTreeSet;

#[async_trait]
pub trait ClusterRegistry: Send + Sync {
    /// Returns true if pods from `cluster` should be reported on.
    async fn contains(&self, cluster: &str) -> bool;
}

/// A fixed list of cluster names, matched exactly.
#[derive(Debug, Clone, Default)]
pub struct StaticClusters {
    names: BTreeSet<String>,
}

impl StaticClusters {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[async_trait]
impl ClusterRegistry for StaticClusters {
    async fn contains(&self, cluster: &str) -> bool {
        self.names.contains(cluster)
    }
}

/// Accepts every cluster.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllClusters;

#[async_trait]
impl ClusterRegistry for AllClusters {
    async fn contains(&self, _cluster: &str) -> bool {
        true
    }
}
