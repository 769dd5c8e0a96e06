//! Keyed persistence consumed by the engine.
//!
//! The engine is agnostic to where nodes and caches live; it only requires
//! the [`Storage`] contract. The shipped implementation, [`MemoryStorage`],
//! keeps everything in hash maps and can round-trip through a lossless
//! binary snapshot, so callers that want durability can write the bytes
//! wherever they like.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cache::NodeCache;
use crate::error::{Error, Result};
use crate::node::Node;

// ============================================================================
// Storage contract
// ============================================================================

/// Keyed persistence of nodes and reachability caches.
///
/// `save_caches` must be all-or-nothing from the caller's perspective: the
/// build clears the to-be-cached list only after a successful batch save.
pub trait Storage {
    /// Next dense node ID; the first call returns 1.
    fn allocate_id(&mut self) -> Result<u32>;

    fn save_node(&mut self, node: &Node) -> Result<()>;

    fn get_node(&self, id: u32) -> Result<Node>;

    /// Batch load. Every requested ID must exist.
    fn get_nodes(&self, ids: &[u32]) -> Result<HashMap<u32, Node>>;

    /// All ingested node IDs.
    fn get_all_keys(&self) -> Result<Vec<u32>>;

    /// Batch persist of cache records, overwriting any prior records.
    fn save_caches(&mut self, caches: &[NodeCache]) -> Result<()>;

    fn get_cache(&self, id: u32) -> Result<Option<NodeCache>>;

    /// IDs ingested since the last completed cache build.
    fn to_be_cached(&self) -> Result<Vec<u32>>;

    fn push_to_cache_stack(&mut self, id: u32) -> Result<()>;

    fn clear_cache_stack(&mut self) -> Result<()>;

    /// Auxiliary name lookups; not used by the core engine.
    fn id_to_name(&self, id: u32) -> Result<String>;

    fn name_to_id(&self, name: &str) -> Result<u32>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

const SNAPSHOT_MAGIC: &[u8; 4] = b"SBGR";
const SNAPSHOT_VERSION: u32 = 1;

/// Hash-map backed storage. Serves as the reference backend and as the test
/// double; everything the engine persists round-trips through its snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStorage {
    nodes: HashMap<u32, Node>,
    caches: HashMap<u32, NodeCache>,
    names: HashMap<String, u32>,
    to_be_cached: Vec<u32>,
    next_id: u32,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize to the binary snapshot format: 4-byte magic, little-endian
    /// version word, bincode payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(self).map_err(|err| Error::Snapshot(err.to_string()))?;
        let mut out = Vec::with_capacity(payload.len() + 8);
        out.extend_from_slice(SNAPSHOT_MAGIC);
        out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 || &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(Error::Snapshot("not a graph snapshot".to_string()));
        }
        let version = u32::from_le_bytes(
            bytes[4..8]
                .try_into()
                .map_err(|_| Error::Snapshot("truncated header".to_string()))?,
        );
        if version != SNAPSHOT_VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported snapshot version {version}"
            )));
        }
        bincode::deserialize(&bytes[8..]).map_err(|err| Error::Snapshot(err.to_string()))
    }
}

impl Storage for MemoryStorage {
    fn allocate_id(&mut self) -> Result<u32> {
        self.next_id += 1;
        Ok(self.next_id)
    }

    fn save_node(&mut self, node: &Node) -> Result<()> {
        self.names.insert(node.name.clone(), node.id);
        self.nodes.insert(node.id, node.clone());
        Ok(())
    }

    fn get_node(&self, id: u32) -> Result<Node> {
        self.nodes.get(&id).cloned().ok_or(Error::NodeNotFound(id))
    }

    fn get_nodes(&self, ids: &[u32]) -> Result<HashMap<u32, Node>> {
        let mut out = HashMap::with_capacity(ids.len());
        for &id in ids {
            out.insert(id, self.get_node(id)?);
        }
        Ok(out)
    }

    fn get_all_keys(&self) -> Result<Vec<u32>> {
        let mut keys: Vec<u32> = self.nodes.keys().copied().collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn save_caches(&mut self, caches: &[NodeCache]) -> Result<()> {
        for record in caches {
            self.caches.insert(record.node_id, record.clone());
        }
        Ok(())
    }

    fn get_cache(&self, id: u32) -> Result<Option<NodeCache>> {
        Ok(self.caches.get(&id).cloned())
    }

    fn to_be_cached(&self) -> Result<Vec<u32>> {
        Ok(self.to_be_cached.clone())
    }

    fn push_to_cache_stack(&mut self, id: u32) -> Result<()> {
        self.to_be_cached.push(id);
        Ok(())
    }

    fn clear_cache_stack(&mut self) -> Result<()> {
        self.to_be_cached.clear();
        Ok(())
    }

    fn id_to_name(&self, id: u32) -> Result<String> {
        Ok(self.get_node(id)?.name)
    }

    fn name_to_id(&self, name: &str) -> Result<u32> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| Error::NameNotFound(name.to_string()))
    }
}
