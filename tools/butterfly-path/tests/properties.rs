//! Randomised cross-checks of the path searches against a brute-force
//! shortest-path reference

mod common;

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use butterfly_path::builder::{EdgeHandle, EdgeSpec, GraphBuilder, NodeHandle};
use butterfly_path::geo::haversine_distance;
use butterfly_path::search::{
    create_algorithm, Algorithm, Direction, EventKind, ExpansionEvent, FrontierKind, PathAlgorithm, PathLocation,
    SearchOptions,
};
use butterfly_path::{GraphId, GraphReader, MemoryTileStore, RouteError, TileHierarchy};

use common::LengthCost;

struct Road {
    handle: EdgeHandle,
    from: usize,
    to: usize,
    length: f32,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    id: GraphId,
    from: usize,
    to: usize,
    length: f32,
}

/// Random street network; every edge is at least as long as the straight
/// line between its junctions, so a distance heuristic stays admissible
#[derive(Default)]
struct Net {
    builder: GraphBuilder,
    nodes: Vec<NodeHandle>,
    coords: Vec<(f64, f64)>,
    roads: Vec<Road>,
    /// Level transitions between junction indices, both ways
    links: Vec<(usize, usize)>,
}

/// Built network plus what the reference search needs to know about it
struct Built {
    store: MemoryTileStore,
    edges: Vec<Edge>,
    links: Vec<(usize, usize)>,
    nodes: usize,
}

impl Net {
    fn add_road(&mut self, rng: &mut StdRng, a: usize, b: usize) {
        let (pa, pb) = (self.coords[a], self.coords[b]);
        let length = (haversine_distance(pa.0, pa.1, pb.0, pb.1) * rng.random_range(1.05..2.0)) as f32;
        let mut spec = EdgeSpec::default().with_length(length);
        let oneway = rng.random_bool(0.2);
        if oneway {
            spec = spec.oneway();
        }
        let (fwd, back) = self.builder.add_road(self.nodes[a], self.nodes[b], spec);
        self.roads.push(Road {
            handle: fwd,
            from: a,
            to: b,
            length,
        });
        if !oneway {
            self.roads.push(Road {
                handle: back,
                from: b,
                to: a,
                length,
            });
        }
    }

    fn add_node(&mut self, level: u8, lat: f64, lon: f64) -> usize {
        self.nodes.push(self.builder.add_node(level, lat, lon));
        self.coords.push((lat, lon));
        self.nodes.len() - 1
    }

    /// `n` junctions around `center`, tied together by a random spanning
    /// tree plus `extra` roads. Returns the junction index range.
    fn add_cluster(&mut self, rng: &mut StdRng, n: usize, extra: usize, center: (f64, f64)) -> std::ops::Range<usize> {
        let first = self.nodes.len();
        for _ in 0..n {
            let lat = center.0 + rng.random_range(-0.04..0.04);
            let lon = center.1 + rng.random_range(-0.04..0.04);
            self.add_node(TileHierarchy::LOCAL, lat, lon);
        }
        self.connect(rng, first..first + n, extra);
        first..first + n
    }

    /// Lifts `n` random junctions of `local` onto the arterial level and
    /// joins the lifted copies with their own roads
    fn add_arterials(&mut self, rng: &mut StdRng, local: std::ops::Range<usize>, n: usize, extra: usize) {
        let first = self.nodes.len();
        let mut lifted = Vec::with_capacity(n);
        while lifted.len() < n {
            let below = rng.random_range(local.clone());
            if lifted.contains(&below) {
                continue;
            }
            lifted.push(below);
            let (lat, lon) = self.coords[below];
            let above = self.add_node(TileHierarchy::ARTERIAL, lat, lon);
            self.builder.add_transition(self.nodes[below], self.nodes[above]);
            self.links.push((below, above));
        }
        self.connect(rng, first..first + n, extra);
    }

    fn connect(&mut self, rng: &mut StdRng, range: std::ops::Range<usize>, extra: usize) {
        for i in range.start + 1..range.end {
            let j = rng.random_range(range.start..i);
            self.add_road(rng, j, i);
        }
        for _ in 0..extra {
            let a = rng.random_range(range.clone());
            let b = rng.random_range(range.clone());
            if a != b {
                self.add_road(rng, a, b);
            }
        }
    }

    /// Traversable directed edges with their final ids
    fn finish(self) -> Built {
        let store = self.builder.build_memory().unwrap();
        let edges = self
            .roads
            .iter()
            .map(|r| Edge {
                id: self.builder.edge_id(r.handle),
                from: r.from,
                to: r.to,
                length: r.length,
            })
            .collect();
        Built {
            store,
            edges,
            links: self.links,
            nodes: self.nodes.len(),
        }
    }
}

fn random_net(seed: u64) -> Built {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut net = Net::default();
    net.add_cluster(&mut rng, 25, 20, (50.10, 4.10));
    net.finish()
}

/// Local cluster with a sparser arterial network above part of it
fn two_level_net(seed: u64) -> Built {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut net = Net::default();
    let local = net.add_cluster(&mut rng, 25, 10, (50.10, 4.10));
    net.add_arterials(&mut rng, local, 7, 4);
    net.finish()
}

/// Node-to-node costs from `source` by Bellman-Ford; each level link costs
/// `level_change` in either direction
fn bellman_ford(net: &Built, level_change: f64, source: usize) -> Vec<f64> {
    let arcs: Vec<(usize, usize, f64)> = net
        .edges
        .iter()
        .map(|e| (e.from, e.to, e.length as f64))
        .chain(
            net.links
                .iter()
                .flat_map(|&(a, b)| [(a, b, level_change), (b, a, level_change)]),
        )
        .collect();
    let mut dist = vec![f64::INFINITY; net.nodes];
    dist[source] = 0.0;
    for _ in 1..net.nodes {
        let mut changed = false;
        for &(from, to, cost) in &arcs {
            let candidate = dist[from] + cost;
            if candidate < dist[to] {
                dist[to] = candidate;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    dist
}

/// Cheapest cost from `pct_o` along `o` to `pct_d` along `d`, if any
fn reference_cost(net: &Built, level_change: f64, o: Edge, pct_o: f32, d: Edge, pct_d: f32) -> Option<f64> {
    let mut best = f64::INFINITY;
    if o.id == d.id && pct_d >= pct_o {
        best = o.length as f64 * (pct_d - pct_o) as f64;
    }
    let dist = bellman_ford(net, level_change, o.to);
    let through =
        o.length as f64 * (1.0 - pct_o) as f64 + dist[d.from] + d.length as f64 * pct_d as f64;
    best = best.min(through);
    best.is_finite().then_some(best)
}

const PCTS: [f32; 5] = [0.0, 0.25, 0.5, 0.9, 1.0];

fn query(rng: &mut StdRng, edges: &[Edge]) -> (Edge, f32, Edge, f32) {
    let o = edges[rng.random_range(0..edges.len())];
    let d = edges[rng.random_range(0..edges.len())];
    (o, PCTS[rng.random_range(0..PCTS.len())], d, PCTS[rng.random_range(0..PCTS.len())])
}

fn locations(store: &MemoryTileStore, o: Edge, pct_o: f32, d: Edge, pct_d: f32) -> (PathLocation, PathLocation) {
    let mut reader = GraphReader::new(store);
    (
        PathLocation::on_edge(&mut reader, o.id, pct_o).unwrap(),
        PathLocation::on_edge(&mut reader, d.id, pct_d).unwrap(),
    )
}

fn check_close(actual: f32, expected: f64, context: &str) {
    let tolerance = 1e-3 * expected.max(1.0);
    assert!(
        (actual as f64 - expected).abs() <= tolerance,
        "{context}: expected {expected}, got {actual}"
    );
}

#[test]
fn test_dijkstra_matches_bellman_ford() {
    let costing = LengthCost::new();
    for seed in 0..20 {
        let net = random_net(seed);
        let mut rng = StdRng::seed_from_u64(1000 + seed);
        let mut dijkstra = create_algorithm(Algorithm::Dijkstra, SearchOptions::default());
        for q in 0..10 {
            let (o, pct_o, d, pct_d) = query(&mut rng, &net.edges);
            let (origin, destination) = locations(&net.store, o, pct_o, d, pct_d);
            let mut reader = GraphReader::new(&net.store);
            let result = dijkstra.get_best_path(&origin, &destination, &mut reader, &costing);
            let context = format!("seed {seed} query {q}");
            match (reference_cost(&net, 0.0, o, pct_o, d, pct_d), result) {
                (Some(expected), Ok(path)) => {
                    check_close(path.cost.cost, expected, &context);
                    assert_eq!(path.segments.first().unwrap().edge_id, o.id, "{context}");
                    assert_eq!(path.segments.last().unwrap().edge_id, d.id, "{context}");
                }
                (None, Err(RouteError::NoPath)) => {}
                (expected, got) => panic!("{context}: expected {expected:?}, got {got:?}"),
            }
        }
    }
}

/// Every algorithm on both frontiers against the reference, `queries` random
/// queries on `net`
fn check_agreement(net: &Built, costing: &LengthCost, seed: u64, queries: usize) {
    let mut rng = StdRng::seed_from_u64(2000 + seed);
    for q in 0..queries {
        let (o, pct_o, d, pct_d) = query(&mut rng, &net.edges);
        let (origin, destination) = locations(&net.store, o, pct_o, d, pct_d);
        let expected = reference_cost(net, costing.level_change as f64, o, pct_o, d, pct_d);
        for frontier in [FrontierKind::Bucket, FrontierKind::Heap] {
            for alg in [Algorithm::Dijkstra, Algorithm::AStar, Algorithm::Bidirectional] {
                let mut search = create_algorithm(alg, SearchOptions::default().with_frontier(frontier));
                let mut reader = GraphReader::new(&net.store);
                let result = search.get_best_path(&origin, &destination, &mut reader, costing);
                let context = format!("seed {seed} query {q} {alg} {frontier:?}");
                match (expected, result) {
                    (Some(expected), Ok(path)) => check_close(path.cost.cost, expected, &context),
                    (None, Err(RouteError::NoPath)) => {}
                    (expected, got) => panic!("{context}: expected {expected:?}, got {got:?}"),
                }
            }
        }
    }
}

#[test]
fn test_all_algorithms_and_frontiers_agree() {
    // straight-line distance is a lower bound on every edge length here
    let costing = LengthCost::new().with_heuristic(1.0);
    for seed in 20..35 {
        check_agreement(&random_net(seed), &costing, seed, 8);
    }

    // queries may start or end on either level; changing level costs 40
    let costing = costing.with_level_change(40.0);
    for seed in 50..62 {
        let net = two_level_net(seed);
        assert!(!net.links.is_empty());
        check_agreement(&net, &costing, seed, 8);
    }
}

#[test]
fn test_settlement_is_monotonic_and_final() {
    let costing = LengthCost::new();
    for seed in 40..45 {
        let net = random_net(seed);
        let mut rng = StdRng::seed_from_u64(3000 + seed);
        let (o, pct_o, d, pct_d) = query(&mut rng, &net.edges);
        let (origin, destination) = locations(&net.store, o, pct_o, d, pct_d);

        let events: Arc<Mutex<Vec<ExpansionEvent>>> = Arc::default();
        let sink = Arc::clone(&events);
        let mut dijkstra = create_algorithm(Algorithm::Dijkstra, SearchOptions::default());
        dijkstra.set_observer(Box::new(move |event| sink.lock().unwrap().push(*event)));
        let mut reader = GraphReader::new(&net.store);
        let _ = dijkstra.get_best_path(&origin, &destination, &mut reader, &costing);

        let events = events.lock().unwrap();
        assert!(events.iter().all(|e| e.direction == Direction::Forward));
        let mut last = f32::NEG_INFINITY;
        let mut settled: Vec<GraphId> = Vec::new();
        for event in events.iter() {
            match event.kind {
                EventKind::Settled => {
                    assert!(event.cost.cost >= last, "seed {seed}: settled {} after {last}", event.cost.cost);
                    last = event.cost.cost;
                    if !event.seed && !event.transition {
                        assert!(!settled.contains(&event.id), "seed {seed}: {} settled twice", event.id);
                        settled.push(event.id);
                    }
                }
                EventKind::Reached | EventKind::Relaxed => {
                    if !event.seed && !event.transition {
                        assert!(
                            !settled.contains(&event.id),
                            "seed {seed}: {} changed after settling",
                            event.id
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn test_no_path_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(77);
    let mut net = Net::default();
    let west = net.add_cluster(&mut rng, 12, 8, (50.08, 4.06));
    let east = net.add_cluster(&mut rng, 12, 8, (50.18, 4.18));
    let Built { store, edges, .. } = net.finish();
    let o = *edges.iter().find(|e| west.contains(&e.from)).unwrap();
    let d = *edges.iter().find(|e| east.contains(&e.from)).unwrap();
    let (origin, destination) = locations(&store, o, 0.5, d, 0.5);
    let (_, reachable) = locations(&store, o, 0.5, o, 0.9);
    let costing = LengthCost::new();

    for frontier in [FrontierKind::Bucket, FrontierKind::Heap] {
        for alg in [Algorithm::Dijkstra, Algorithm::AStar, Algorithm::Bidirectional] {
            let mut search = create_algorithm(alg, SearchOptions::default().with_frontier(frontier));
            for _ in 0..2 {
                let mut reader = GraphReader::new(&store);
                let result = search.get_best_path(&origin, &destination, &mut reader, &costing);
                assert!(matches!(result, Err(RouteError::NoPath)), "{alg} {frontier:?}: {result:?}");
            }
            // state left behind by a failed search does not leak into the next
            let mut reader = GraphReader::new(&store);
            let path = search.get_best_path(&origin, &reachable, &mut reader, &costing);
            assert!(path.is_ok(), "{alg} {frontier:?}: {path:?}");
        }
    }
}
