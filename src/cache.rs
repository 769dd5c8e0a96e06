//! Reachability cache construction.
//!
//! One build turns the raw adjacency graph into a pair of closure bitmaps per
//! node: every transitively reachable descendant and every transitively
//! reachable ancestor. Cycles are handled by collapsing each strongly
//! connected component into a single [`BindMap`] slot, seeded with the
//! component's member set, so a cycle contributes its peers exactly once and
//! the remaining traversal runs over a DAG.
//!
//! Pipeline, per direction:
//!
//! 1. [`find_cycles`] partitions the nodes into components.
//! 2. Seeding binds each component's keys in two maps — the accumulating
//!    reachability `cache` and the component-collapsed `adjacency` — storing
//!    the member self-set in the former and the members' external edges
//!    (intra-component edges subtracted) in the latter.
//! 3. A topological union DFS over every node folds each finished
//!    neighbour's cache slot into the current node's slot.
//!
//! The two directions are then zipped into [`NodeCache`] records, each with
//! the node's own ID stripped: a node is never listed as its own descendant
//! or ancestor, even inside a cycle.
//!
//! Storage is touched only here in the driver; the SCC finder and the
//! per-direction builders are pure over the in-memory node map. The build is
//! idempotent for a stable graph: it reads no prior cache state.

use std::collections::{BTreeMap, HashMap};

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bind::BindMap;
use crate::error::{Error, Result};
use crate::node::{Direction, Node};
use crate::scc::find_cycles;
use crate::storage::Storage;

/// Precomputed reachability for one node. Both bitmaps exclude the node
/// itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCache {
    pub node_id: u32,
    pub all_parents: RoaringBitmap,
    pub all_children: RoaringBitmap,
}

impl NodeCache {
    pub fn new(node_id: u32, all_parents: RoaringBitmap, all_children: RoaringBitmap) -> Self {
        Self {
            node_id,
            all_parents,
            all_children,
        }
    }
}

/// Rebuild the reachability caches for the whole graph.
///
/// No-op when nothing was ingested since the last completed build. On
/// success the to-be-cached list is cleared; a failed batch save leaves it
/// intact so the next call re-attempts.
pub fn cache<S: Storage>(storage: &mut S) -> Result<()> {
    let uncached = storage.to_be_cached()?;
    if uncached.is_empty() {
        return Ok(());
    }

    let keys = storage.get_all_keys()?;
    let all_nodes = storage.get_nodes(&keys)?;
    let node_count = keys.len() as u32;
    debug!(
        nodes = keys.len(),
        uncached = uncached.len(),
        "rebuilding reachability caches"
    );

    let child_scc = find_cycles(Direction::Children, &all_nodes, node_count)?;
    let cached_children = build_cache(Direction::Children, &child_scc, &all_nodes, node_count)?;

    let parent_scc = find_cycles(Direction::Parents, &all_nodes, node_count)?;
    let cached_parents = build_cache(Direction::Parents, &parent_scc, &all_nodes, node_count)?;

    let (cache_keys, cache_values) = cached_children.keys_and_values();
    let mut caches = Vec::with_capacity(cache_keys.len());
    for (key, value) in cache_keys.iter().zip(cache_values) {
        let id: u32 = key.parse().map_err(|source| Error::KeyParse {
            key: key.clone(),
            source,
        })?;

        let mut all_children = value;
        all_children.remove(id);

        let mut all_parents = cached_parents.get_checked(key)?;
        all_parents.remove(id);

        caches.push(NodeCache::new(id, all_parents, all_children));
    }

    storage.save_caches(&caches)?;
    storage.clear_cache_stack()
}

/// Build the accumulated reachability map for one direction. Pure over the
/// node snapshot.
fn build_cache(
    direction: Direction,
    scc: &HashMap<u32, u32>,
    nodes: &HashMap<u32, Node>,
    node_count: u32,
) -> Result<BindMap> {
    let mut cache = BindMap::new();
    let mut adjacency = BindMap::new();
    seed_components(direction, scc, nodes, &mut cache, &mut adjacency)?;

    // Representatives whose slot already holds its full closure.
    let mut done = RoaringBitmap::new();
    for id in 1..=node_count {
        cache_dfs(id, scc, &mut done, &mut cache, &adjacency)?;
    }

    Ok(cache)
}

/// Bind every SCC's keys in both maps and seed the slots: the member self-set
/// into `cache`, the members' external edges into `adjacency`.
///
/// Subtracting the member set from the edge union is what keeps the collapsed
/// graph acyclic and prevents cycle peers from being double-counted in the
/// DFS unions.
fn seed_components(
    direction: Direction,
    scc: &HashMap<u32, u32>,
    nodes: &HashMap<u32, Node>,
    cache: &mut BindMap,
    adjacency: &mut BindMap,
) -> Result<()> {
    let mut groups: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (&id, &representative) in scc {
        groups.entry(representative).or_default().push(id);
    }

    for members in groups.values_mut() {
        members.sort_unstable();
        let keys: Vec<String> = members.iter().map(|id| id.to_string()).collect();
        cache.bind(&keys)?;
        adjacency.bind(&keys)?;

        let mut member_set = RoaringBitmap::new();
        let mut edges = RoaringBitmap::new();
        for &id in members.iter() {
            let node = nodes.get(&id).ok_or(Error::NodeNotFound(id))?;
            edges |= direction.edges(node);
            member_set.insert(id);
        }
        edges -= &member_set;

        cache.set(&keys[0], member_set);
        adjacency.set(&keys[0], edges);
    }

    Ok(())
}

/// Iterative post-order walk of the collapsed adjacency starting at `start`,
/// unioning every completed neighbour's cache slot into its parent's slot.
///
/// The collapsed graph is the condensation DAG, so a component can never
/// re-enter the frame stack while one of its members is already on it.
fn cache_dfs(
    start: u32,
    scc: &HashMap<u32, u32>,
    done: &mut RoaringBitmap,
    cache: &mut BindMap,
    adjacency: &BindMap,
) -> Result<()> {
    struct Frame {
        node: u32,
        representative: u32,
        todo: Vec<u32>,
        next: usize,
    }

    let frame = |id: u32| -> Result<Frame> {
        Ok(Frame {
            node: id,
            representative: component(scc, id)?,
            todo: adjacency.get(&id.to_string()).iter().collect(),
            next: 0,
        })
    };

    if done.contains(component(scc, start)?) {
        return Ok(());
    }

    let mut frames = vec![frame(start)?];
    while let Some(top) = frames.last_mut() {
        if top.next < top.todo.len() {
            let next = top.todo[top.next];
            top.next += 1;

            if done.contains(component(scc, next)?) {
                add_to_cache(cache, top.node, next);
            } else {
                let child = frame(next)?;
                frames.push(child);
            }
        } else {
            done.insert(top.representative);
            let id = top.node;
            frames.pop();
            if let Some(parent) = frames.last() {
                add_to_cache(cache, parent.node, id);
            }
        }
    }

    Ok(())
}

/// Union `source`'s accumulated reachability into `target`'s slot. The
/// source slot already contains `source` itself via its seeded self-set.
fn add_to_cache(cache: &mut BindMap, target: u32, source: u32) {
    let addition = cache.get(&source.to_string());
    let target_key = target.to_string();
    let mut accumulated = cache.get(&target_key);
    accumulated |= addition;
    cache.set(&target_key, accumulated);
}

fn component(scc: &HashMap<u32, u32>, id: u32) -> Result<u32> {
    scc.get(&id).copied().ok_or(Error::NodeNotFound(id))
}
