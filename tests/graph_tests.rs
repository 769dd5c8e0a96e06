//! End-to-end scenario tests for the reachability cache.
//!
//! Every scenario builds a graph through the public ingestion API, runs a
//! cache build, and checks the precomputed closures — against exact expected
//! sets for the small shapes, and against the live-traversal oracle for the
//! large generated graphs.

use roaring::RoaringBitmap;
use sbomgraph::{add_node, cache, MemoryStorage, Storage};

fn setup(count: u32) -> MemoryStorage {
    let mut storage = MemoryStorage::new();
    for i in 0..count {
        add_node(&mut storage, "package", "", &format!("pkg:demo/n{}", i + 1)).unwrap();
    }
    storage
}

fn connect(storage: &mut MemoryStorage, from: u32, to: u32) {
    let mut a = storage.get_node(from).unwrap();
    let mut b = storage.get_node(to).unwrap();
    a.set_dependency(storage, &mut b).unwrap();
}

fn bitmap(ids: &[u32]) -> RoaringBitmap {
    ids.iter().copied().collect()
}

fn dependencies(storage: &MemoryStorage, id: u32) -> RoaringBitmap {
    storage
        .get_node(id)
        .unwrap()
        .query_dependencies(storage)
        .unwrap()
}

fn dependents(storage: &MemoryStorage, id: u32) -> RoaringBitmap {
    storage
        .get_node(id)
        .unwrap()
        .query_dependents(storage)
        .unwrap()
}

/// Check, for every node: cached answers equal the live-traversal oracle,
/// no node lists itself, membership is symmetric across directions, and
/// mutually reachable pairs see each other in both closures.
fn verify_closures(storage: &MemoryStorage) {
    let keys = storage.get_all_keys().unwrap();
    let mut all_children = Vec::with_capacity(keys.len());
    let mut all_parents = Vec::with_capacity(keys.len());

    for &id in &keys {
        let node = storage.get_node(id).unwrap();

        let children = node.query_dependencies(storage).unwrap();
        let children_oracle = node.query_dependencies_no_cache(storage).unwrap();
        assert_eq!(children, children_oracle, "dependencies of node {id}");

        let parents = node.query_dependents(storage).unwrap();
        let parents_oracle = node.query_dependents_no_cache(storage).unwrap();
        assert_eq!(parents, parents_oracle, "dependents of node {id}");

        assert!(!children.contains(id), "node {id} lists itself as descendant");
        assert!(!parents.contains(id), "node {id} lists itself as ancestor");

        all_children.push(children);
        all_parents.push(parents);
    }

    for (ai, &a) in keys.iter().enumerate() {
        for b in all_children[ai].iter() {
            let bi = keys.binary_search(&b).unwrap();
            assert!(
                all_parents[bi].contains(a),
                "{b} is a descendant of {a} but {a} is not an ancestor of {b}"
            );
            if all_children[bi].contains(a) {
                // Same component: membership must be mutual in both directions.
                assert!(all_parents[ai].contains(b));
                assert!(all_parents[bi].contains(a));
            }
        }
        for b in all_parents[ai].iter() {
            let bi = keys.binary_search(&b).unwrap();
            assert!(
                all_children[bi].contains(a),
                "{b} is an ancestor of {a} but {a} is not a descendant of {b}"
            );
        }
    }
}

#[test]
fn linear_chain() {
    let mut storage = setup(3);
    connect(&mut storage, 1, 2);
    connect(&mut storage, 2, 3);
    cache(&mut storage).unwrap();

    assert_eq!(dependencies(&storage, 1), bitmap(&[2, 3]));
    assert_eq!(dependencies(&storage, 2), bitmap(&[3]));
    assert_eq!(dependencies(&storage, 3), bitmap(&[]));
    assert_eq!(dependents(&storage, 1), bitmap(&[]));
    assert_eq!(dependents(&storage, 3), bitmap(&[1, 2]));
    verify_closures(&storage);
}

#[test]
fn simple_three_cycle() {
    let mut storage = setup(3);
    connect(&mut storage, 1, 2);
    connect(&mut storage, 2, 3);
    connect(&mut storage, 3, 1);
    cache(&mut storage).unwrap();

    assert_eq!(dependencies(&storage, 1), bitmap(&[2, 3]));
    assert_eq!(dependencies(&storage, 2), bitmap(&[1, 3]));
    assert_eq!(dependencies(&storage, 3), bitmap(&[1, 2]));
    assert_eq!(dependents(&storage, 1), bitmap(&[2, 3]));
    assert_eq!(dependents(&storage, 2), bitmap(&[1, 3]));
    assert_eq!(dependents(&storage, 3), bitmap(&[1, 2]));
    verify_closures(&storage);
}

#[test]
fn two_cycles_linked_by_one_edge() {
    let mut storage = setup(6);
    // Cycle 1: 1 -> 2 -> 3 -> 1
    connect(&mut storage, 1, 2);
    connect(&mut storage, 2, 3);
    connect(&mut storage, 3, 1);
    // Cycle 2: 4 -> 5 -> 6 -> 4
    connect(&mut storage, 4, 5);
    connect(&mut storage, 5, 6);
    connect(&mut storage, 6, 4);
    // Bridge
    connect(&mut storage, 3, 4);
    cache(&mut storage).unwrap();

    assert_eq!(dependencies(&storage, 1), bitmap(&[2, 3, 4, 5, 6]));
    assert_eq!(dependencies(&storage, 4), bitmap(&[5, 6]));
    assert_eq!(dependents(&storage, 6), bitmap(&[1, 2, 3, 4, 5]));
    verify_closures(&storage);
}

#[test]
fn figure_eight_merges_into_one_component() {
    let mut storage = setup(7);
    // Cycle 1: 1 -> 2 -> 3 -> 1
    connect(&mut storage, 1, 2);
    connect(&mut storage, 2, 3);
    connect(&mut storage, 3, 1);
    // Cycle 2: 4 -> 5 -> 6 -> 7 -> 4
    connect(&mut storage, 4, 5);
    connect(&mut storage, 5, 6);
    connect(&mut storage, 6, 7);
    connect(&mut storage, 7, 4);
    // Cross links merge both cycles: 3 -> 4 and 7 -> 2.
    connect(&mut storage, 3, 4);
    connect(&mut storage, 7, 2);
    cache(&mut storage).unwrap();

    for id in 1..=7u32 {
        let everyone_else: RoaringBitmap = (1..=7).filter(|&other| other != id).collect();
        assert_eq!(dependencies(&storage, id), everyone_else, "node {id}");
        assert_eq!(dependents(&storage, id), everyone_else, "node {id}");
    }
    verify_closures(&storage);
}

#[test]
fn isolated_cycles_stay_isolated() {
    let mut storage = setup(12);
    connect(&mut storage, 1, 2);
    connect(&mut storage, 2, 3);
    connect(&mut storage, 3, 1);
    connect(&mut storage, 10, 11);
    connect(&mut storage, 11, 12);
    connect(&mut storage, 12, 10);
    cache(&mut storage).unwrap();

    assert_eq!(dependencies(&storage, 1), bitmap(&[2, 3]));
    assert_eq!(dependencies(&storage, 11), bitmap(&[10, 12]));
    assert_eq!(dependents(&storage, 12), bitmap(&[10, 11]));
    for id in 4..=9u32 {
        assert!(dependencies(&storage, id).is_empty());
        assert!(dependents(&storage, id).is_empty());
    }
    verify_closures(&storage);
}

#[test]
fn chained_figure_eights() {
    // Three cycles linked pairwise into figure eights, plus one independent
    // cycle off to the side.
    let mut storage = setup(13);
    for (from, to) in [
        (1, 2),
        (2, 3),
        (3, 1),
        (4, 5),
        (5, 6),
        (6, 4),
        (3, 4),
        (7, 8),
        (8, 9),
        (9, 10),
        (10, 7),
        (10, 2),
        (11, 12),
        (12, 13),
        (13, 11),
    ] {
        connect(&mut storage, from, to);
    }
    cache(&mut storage).unwrap();
    verify_closures(&storage);
}

#[test]
fn random_dag() {
    let n: u32 = 1000;
    let mut storage = setup(n);

    // Deterministic pseudo-random forward edges, fan-out at most 15.
    for i in 0..n {
        let span = n - i - 1;
        if span == 0 {
            continue;
        }
        for j in 0..15u32 {
            let offset = ((u64::from(i) * 1_000_003 + u64::from(j) * 97) % u64::from(span)) as u32;
            connect(&mut storage, i + 1, i + 2 + offset);
        }
    }

    cache(&mut storage).unwrap();
    verify_closures(&storage);
}

#[test]
fn random_graph_with_occasional_cycles() {
    let n: u32 = 1000;
    let mut storage = setup(n);

    for i in 0..n {
        for j in 0..15u32 {
            let roll = (u64::from(i) * 7919 + u64::from(j) * 104_729) % 100;
            if roll == 0 && i > 0 {
                // ~1% of edges point backwards and may close a cycle.
                let back = ((u64::from(i) * 31 + u64::from(j) * 17) % u64::from(i)) as u32;
                connect(&mut storage, i + 1, back + 1);
            } else if i + 1 < n {
                let span = n - i - 1;
                let offset =
                    ((u64::from(i) * 1_000_003 + u64::from(j) * 97) % u64::from(span)) as u32;
                connect(&mut storage, i + 1, i + 2 + offset);
            }
        }
    }

    cache(&mut storage).unwrap();
    verify_closures(&storage);
}

#[test]
fn adding_an_edge_never_shrinks_closures() {
    let mut storage = setup(5);
    connect(&mut storage, 1, 2);
    connect(&mut storage, 2, 3);
    connect(&mut storage, 4, 5);
    cache(&mut storage).unwrap();

    let keys = storage.get_all_keys().unwrap();
    let before: Vec<(RoaringBitmap, RoaringBitmap)> = keys
        .iter()
        .map(|&id| (dependencies(&storage, id), dependents(&storage, id)))
        .collect();

    connect(&mut storage, 3, 4);
    cache(&mut storage).unwrap();

    for (i, &id) in keys.iter().enumerate() {
        let children = dependencies(&storage, id);
        let parents = dependents(&storage, id);
        assert!(
            before[i].0.is_subset(&children),
            "dependencies of {id} shrank"
        );
        assert!(before[i].1.is_subset(&parents), "dependents of {id} shrank");
    }
    verify_closures(&storage);
}

#[test]
fn rebuilds_are_idempotent() {
    let serialized = |storage: &MemoryStorage| -> Vec<u8> {
        let mut out = Vec::new();
        for id in storage.get_all_keys().unwrap() {
            let record = storage.get_cache(id).unwrap().unwrap();
            out.extend(bincode::serialize(&record).unwrap());
        }
        out
    };

    let mut storage = setup(6);
    connect(&mut storage, 1, 2);
    connect(&mut storage, 2, 3);
    connect(&mut storage, 3, 1);
    connect(&mut storage, 3, 4);
    connect(&mut storage, 5, 6);
    cache(&mut storage).unwrap();
    let first = serialized(&storage);

    // A second build with nothing ingested is a no-op.
    cache(&mut storage).unwrap();
    assert_eq!(first, serialized(&storage));

    // A forced full rebuild reproduces byte-identical records.
    for id in storage.get_all_keys().unwrap() {
        storage.push_to_cache_stack(id).unwrap();
    }
    cache(&mut storage).unwrap();
    assert_eq!(first, serialized(&storage));
}
