//! sbomgraph: transitive-dependency queries over SBOM graphs.
//!
//! Software bills of materials form a directed graph: packages depend on
//! packages, which depend on further packages, with the occasional cycle.
//! This crate answers "what does X pull in?" and "what pulls in X?" in
//! near-constant time by precomputing, for every node, its full forward and
//! backward reachability closures as roaring bitmaps.
//!
//! Key design points:
//!
//! 1. **Bitmap sets throughout**: adjacency and closures are
//!    `RoaringBitmap`s over dense u32 node IDs.
//! 2. **Sound cycle handling**: Tarjan's algorithm partitions the graph into
//!    strongly connected components; each component is collapsed into one
//!    shared bitmap slot via [`BindMap`] key aliasing, so cyclic graphs
//!    answer as equivalence classes.
//! 3. **Batch builds**: [`cache`] rebuilds every closure from the current
//!    graph snapshot in one single-threaded pass and persists the results
//!    through the [`Storage`] contract.
//! 4. **Oracle queries**: every cached answer has a live-traversal
//!    counterpart for validation.
//!
//! ## Module organization
//!
//! - `node`: the graph model, ingestion API, and per-node query surface
//! - `bind`: the group-bitmap map with its `bind` aliasing primitive
//! - `scc`: the direction-parameterized Tarjan component finder
//! - `cache`: cache records and the build pipeline
//! - `storage`: the persistence contract and the in-memory backend

pub mod bind;
pub mod cache;
pub mod error;
pub mod node;
pub mod scc;
pub mod storage;

pub use bind::BindMap;
pub use cache::{cache, NodeCache};
pub use error::{Error, Result};
pub use node::{add_node, Direction, Node};
pub use scc::find_cycles;
pub use storage::{MemoryStorage, Storage};
