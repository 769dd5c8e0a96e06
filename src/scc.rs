//! Strongly connected components via Tarjan's algorithm.
//!
//! Runs over the in-memory node map in either direction and returns
//! `node ID -> representative ID`. At component-pop time every member's
//! low-link is overwritten with the root's discovery index, so two nodes
//! share a component iff they map to the same value.
//!
//! The traversal uses an explicit frame stack instead of recursion: a
//! dependency chain as deep as the node count must not exhaust the thread
//! stack.

use std::collections::HashMap;

use roaring::RoaringBitmap;

use crate::error::{Error, Result};
use crate::node::{Direction, Node};

struct Frame {
    node: u32,
    edges: Vec<u32>,
    next: usize,
}

/// Compute the SCC representative map for all nodes `1..=node_count`.
///
/// IDs are dense and monotonically assigned by ingestion; a gap means the
/// node map is corrupt and surfaces as [`Error::NodeNotFound`].
pub fn find_cycles(
    direction: Direction,
    nodes: &HashMap<u32, Node>,
    node_count: u32,
) -> Result<HashMap<u32, u32>> {
    let mut counter: u32 = 0;
    let mut index_of: HashMap<u32, u32> = HashMap::new();
    let mut low_link: HashMap<u32, u32> = HashMap::new();
    let mut open: Vec<u32> = Vec::new();
    let mut on_stack = RoaringBitmap::new();

    let mut frames: Vec<Frame> = Vec::new();

    let visit = |id: u32,
                 counter: &mut u32,
                 index_of: &mut HashMap<u32, u32>,
                 low_link: &mut HashMap<u32, u32>,
                 open: &mut Vec<u32>,
                 on_stack: &mut RoaringBitmap|
     -> Result<Frame> {
        let node = nodes.get(&id).ok_or(Error::NodeNotFound(id))?;
        *counter += 1;
        index_of.insert(id, *counter);
        low_link.insert(id, *counter);
        open.push(id);
        on_stack.insert(id);
        Ok(Frame {
            node: id,
            edges: direction.edges(node).iter().collect(),
            next: 0,
        })
    };

    for root in 1..=node_count {
        if index_of.contains_key(&root) {
            continue;
        }
        frames.push(visit(
            root,
            &mut counter,
            &mut index_of,
            &mut low_link,
            &mut open,
            &mut on_stack,
        )?);

        while let Some(frame) = frames.last_mut() {
            if frame.next < frame.edges.len() {
                let next = frame.edges[frame.next];
                frame.next += 1;

                if let Some(&next_index) = index_of.get(&next) {
                    if on_stack.contains(next) {
                        // Back edge: minimize against the discovery index.
                        let updated = low_link[&frame.node].min(next_index);
                        low_link.insert(frame.node, updated);
                    }
                } else {
                    let child = visit(
                        next,
                        &mut counter,
                        &mut index_of,
                        &mut low_link,
                        &mut open,
                        &mut on_stack,
                    )?;
                    frames.push(child);
                }
            } else {
                let id = frame.node;
                frames.pop();

                if index_of[&id] == low_link[&id] {
                    // Component root: pop members and equalize their low-links
                    // to the root's index, which becomes the SCC ID.
                    let root_index = index_of[&id];
                    while let Some(member) = open.pop() {
                        on_stack.remove(member);
                        low_link.insert(member, root_index);
                        if member == id {
                            break;
                        }
                    }
                }

                if let Some(parent) = frames.last() {
                    // Tree edge: minimize the parent against the finished child.
                    let updated = low_link[&parent.node].min(low_link[&id]);
                    low_link.insert(parent.node, updated);
                }
            }
        }
    }

    Ok(low_link)
}
