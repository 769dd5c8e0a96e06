//! Graph model: nodes, edges, and the per-node query surface.

use std::fmt;
use std::str::FromStr;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::Storage;

/// Traversal selector: `Children` follows dependency edges (descendants),
/// `Parents` follows dependent edges (ancestors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Children,
    Parents,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Children => "children",
            Direction::Parents => "parents",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Children => Direction::Parents,
            Direction::Parents => Direction::Children,
        }
    }

    /// The adjacency set this direction traverses.
    pub(crate) fn edges(self, node: &Node) -> &RoaringBitmap {
        match self {
            Direction::Children => &node.children,
            Direction::Parents => &node.parents,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "children" => Ok(Direction::Children),
            "parents" => Ok(Direction::Parents),
            other => Err(Error::UnknownDirection(other.to_string())),
        }
    }
}

/// One vertex of the dependency graph.
///
/// IDs are dense and assigned monotonically from 1 by the storage allocator.
/// `kind`, `name` and `metadata` are opaque to the engine. The adjacency
/// bitmaps are kept mirror-consistent by the edge API:
/// `b ∈ a.children ⇔ a ∈ b.parents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub metadata: String,
    pub children: RoaringBitmap,
    pub parents: RoaringBitmap,
}

/// Create a node, persist it, and mark it for the next cache build.
pub fn add_node<S: Storage>(
    storage: &mut S,
    kind: &str,
    metadata: &str,
    name: &str,
) -> Result<Node> {
    let id = storage.allocate_id()?;
    let node = Node {
        id,
        kind: kind.to_string(),
        name: name.to_string(),
        metadata: metadata.to_string(),
        children: RoaringBitmap::new(),
        parents: RoaringBitmap::new(),
    };
    storage.save_node(&node)?;
    storage.push_to_cache_stack(id)?;
    Ok(node)
}

impl Node {
    /// Declare `dependency` a direct child of `self`, updating both adjacency
    /// bitmaps and persisting both nodes. Self-edges are ignored. The edge
    /// makes `self`'s closure stale, so its ID is re-queued for caching.
    pub fn set_dependency<S: Storage>(
        &mut self,
        storage: &mut S,
        dependency: &mut Node,
    ) -> Result<()> {
        if self.id == dependency.id {
            return Ok(());
        }
        self.children.insert(dependency.id);
        dependency.parents.insert(self.id);
        storage.save_node(self)?;
        storage.save_node(dependency)?;
        storage.push_to_cache_stack(self.id)
    }

    /// Mirror convenience: declare `dependent` a direct parent of `self`.
    pub fn set_dependent<S: Storage>(
        &mut self,
        storage: &mut S,
        dependent: &mut Node,
    ) -> Result<()> {
        dependent.set_dependency(storage, self)
    }

    /// All transitively reachable descendants, from the precomputed cache.
    /// A node that has never been through a cache build reads as empty.
    pub fn query_dependencies<S: Storage>(&self, storage: &S) -> Result<RoaringBitmap> {
        Ok(storage
            .get_cache(self.id)?
            .map(|cache| cache.all_children)
            .unwrap_or_default())
    }

    /// All transitively reachable ancestors, from the precomputed cache.
    pub fn query_dependents<S: Storage>(&self, storage: &S) -> Result<RoaringBitmap> {
        Ok(storage
            .get_cache(self.id)?
            .map(|cache| cache.all_parents)
            .unwrap_or_default())
    }

    /// Descendants by live traversal of the raw adjacency. Correctness oracle
    /// for [`query_dependencies`](Self::query_dependencies); not meant for
    /// production queries.
    pub fn query_dependencies_no_cache<S: Storage>(&self, storage: &S) -> Result<RoaringBitmap> {
        traverse(storage, self.id, Direction::Children)
    }

    /// Ancestors by live traversal of the raw adjacency.
    pub fn query_dependents_no_cache<S: Storage>(&self, storage: &S) -> Result<RoaringBitmap> {
        traverse(storage, self.id, Direction::Parents)
    }
}

/// Full reachability from `start`, excluding `start` itself (even when a
/// cycle leads back to it).
fn traverse<S: Storage>(storage: &S, start: u32, direction: Direction) -> Result<RoaringBitmap> {
    let mut reached = RoaringBitmap::new();
    let mut visited = RoaringBitmap::new();
    visited.insert(start);

    let mut frontier = vec![start];
    while let Some(id) = frontier.pop() {
        let node = storage.get_node(id)?;
        for next in direction.edges(&node).iter() {
            if visited.insert(next) {
                reached.insert(next);
                frontier.push(next);
            }
        }
    }

    Ok(reached)
}
