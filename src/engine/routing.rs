//! Routing deciders for the geometric engine.
//!
//! At each tick, for every born non-finalised bundle, a decider produces
//! the new holder set from the current holder set and the tick's
//! connectivity. Traversal is deterministic: the holder list as it stood
//! when the bundle's routing step began, neighbours in ascending node
//! index. Membership checks observe additions made for this bundle during
//! the tick, so a node is never added twice in one step.

use crate::engine::adjacency::TickGeometry;
use crate::model::bundle::{Bundle, RoutingMode};

/// One custody replication: `from` handed a copy to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardEvent {
    pub from: usize,
    pub to: usize,
}

/// Advance one bundle's holder set for this tick; returns the forwards
/// performed, in decision order.
pub fn advance(bundle: &mut Bundle, geom: &TickGeometry) -> Vec<ForwardEvent> {
    match bundle.routing {
        RoutingMode::Epidemic => epidemic(bundle, geom),
        RoutingMode::ProphetLike => prophet_like(bundle, geom),
        // Documented fallback: an unlimited copy budget is a flood.
        RoutingMode::SprayAndWait if bundle.max_copies == 0 => epidemic(bundle, geom),
        RoutingMode::SprayAndWait => spray_and_wait(bundle, geom),
    }
}

/// Replicate to every connected neighbour that lacks the bundle. Hops are
/// counted once per new `(holder, neighbour)` addition.
fn epidemic(bundle: &mut Bundle, geom: &TickGeometry) -> Vec<ForwardEvent> {
    let mut events = Vec::new();
    let generation = bundle.holders.len();
    for i in 0..generation {
        let holder = bundle.holders.at(i);
        for neighbor in geom.neighbors(holder) {
            if bundle.holders.insert(neighbor) {
                bundle.hops += 1;
                events.push(ForwardEvent {
                    from: holder,
                    to: neighbor,
                });
            }
        }
    }
    events
}

/// Greedy-towards-destination stand-in for PRoPHET: each holder forwards
/// to at most the one connected non-holder strictly closer to the
/// destination, preferring the smallest distance, ties to the lowest node
/// index.
fn prophet_like(bundle: &mut Bundle, geom: &TickGeometry) -> Vec<ForwardEvent> {
    let dist_to_dst = geom.distances_to(bundle.destination);
    let mut events = Vec::new();
    let generation = bundle.holders.len();
    for i in 0..generation {
        let holder = bundle.holders.at(i);
        if let Some(next) = select_closer_neighbor(bundle, geom, &dist_to_dst, holder) {
            bundle.holders.insert(next);
            bundle.hops += 1;
            events.push(ForwardEvent {
                from: holder,
                to: next,
            });
        }
    }
    events
}

/// L-copies Spray-and-Wait: the PRoPHET-like selection gated by the copy
/// budget. The source counted as one used copy at birth; the holder loop
/// breaks as soon as the budget is spent.
fn spray_and_wait(bundle: &mut Bundle, geom: &TickGeometry) -> Vec<ForwardEvent> {
    let dist_to_dst = geom.distances_to(bundle.destination);
    let mut events = Vec::new();
    let generation = bundle.holders.len();
    for i in 0..generation {
        if bundle.copies_used >= bundle.max_copies {
            break;
        }
        let holder = bundle.holders.at(i);
        if let Some(next) = select_closer_neighbor(bundle, geom, &dist_to_dst, holder) {
            bundle.holders.insert(next);
            bundle.hops += 1;
            bundle.copies_used += 1;
            events.push(ForwardEvent {
                from: holder,
                to: next,
            });
        }
    }
    events
}

/// The shared greedy selection: connected, not yet a holder, strictly
/// closer to the destination than `holder`; smallest distance wins and
/// ascending-index iteration resolves ties to the lowest index.
fn select_closer_neighbor(
    bundle: &Bundle,
    geom: &TickGeometry,
    dist_to_dst: &[f64],
    holder: usize,
) -> Option<usize> {
    let mut best: Option<usize> = None;
    for neighbor in geom.neighbors(holder) {
        if bundle.holders.contains(neighbor) {
            continue;
        }
        if dist_to_dst[neighbor] >= dist_to_dst[holder] {
            continue;
        }
        if best.is_none_or(|b| dist_to_dst[neighbor] < dist_to_dst[b]) {
            best = Some(neighbor);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::model::node::{FnOracle, NodeKind, NodeSet};

    /// Nodes on a line, 100 km apart, everything within range of
    /// everything (no Earth in the way at z = 8000 km).
    fn line_world(count: usize, range_km: f64) -> (NodeSet, TickGeometry) {
        let mut nodes = NodeSet::new();
        for i in 0..count {
            nodes.add(&format!("N{i}"), NodeKind::Satellite).unwrap();
        }
        let oracle = FnOracle(move |name: &str, _| {
            let idx: f64 = name.strip_prefix('N').unwrap().parse().unwrap();
            Ok(Vec3::new(idx * 100.0, 8000.0, 0.0))
        });
        let geom = TickGeometry::evaluate(&oracle, &nodes, 0.0, range_km, 6350.0).unwrap();
        (nodes, geom)
    }

    fn bundle_with(routing: RoutingMode, src: usize, dst: usize, max_copies: u32, n: usize) -> Bundle {
        let mut b = Bundle::new(
            1,
            src,
            dst,
            format!("N{src}"),
            format!("N{dst}"),
            1024,
            0.0,
            0,
            max_copies,
            routing,
            n,
        );
        b.birth();
        b
    }

    #[test]
    fn epidemic_replicates_to_every_connected_neighbour() {
        // Range 150 km: only adjacent line neighbours connect.
        let (_, geom) = line_world(5, 150.0);
        let mut b = bundle_with(RoutingMode::Epidemic, 2, 4, 0, 5);

        let events = advance(&mut b, &geom);
        assert_eq!(
            events,
            vec![
                ForwardEvent { from: 2, to: 1 },
                ForwardEvent { from: 2, to: 3 }
            ]
        );
        assert_eq!(b.hops, 2);
        assert_eq!(b.holders.iter().collect::<Vec<_>>(), vec![2, 1, 3]);

        // Next tick the frontier advances one more ring.
        let events = advance(&mut b, &geom);
        assert_eq!(
            events,
            vec![
                ForwardEvent { from: 1, to: 0 },
                ForwardEvent { from: 3, to: 4 }
            ]
        );
        assert_eq!(b.hops, 4);
        assert_eq!(b.holders.len(), 5);
    }

    #[test]
    fn prophet_forwards_to_single_closest_neighbour() {
        // Full connectivity: holder 0 sees 1..4 and the destination
        // itself has the smallest distance-to-destination (zero).
        let (_, geom) = line_world(5, 1000.0);
        let mut b = bundle_with(RoutingMode::ProphetLike, 0, 4, 0, 5);

        let events = advance(&mut b, &geom);
        assert_eq!(events, vec![ForwardEvent { from: 0, to: 4 }]);
        assert_eq!(b.hops, 1);
    }

    #[test]
    fn prophet_never_forwards_away_from_destination() {
        // Adjacent-only connectivity with the source mid-line: each tick
        // moves one step towards the destination, never backwards.
        let (_, geom) = line_world(5, 150.0);
        let mut b = bundle_with(RoutingMode::ProphetLike, 2, 4, 0, 5);

        let events = advance(&mut b, &geom);
        assert_eq!(events, vec![ForwardEvent { from: 2, to: 3 }]);
        let events = advance(&mut b, &geom);
        assert_eq!(events, vec![ForwardEvent { from: 3, to: 4 }]);
        // Holders 0 and 1 never got a copy.
        assert!(!b.holders.contains(0));
        assert!(!b.holders.contains(1));
    }

    #[test]
    fn prophet_ties_break_to_lowest_index() {
        // Symmetric world: two candidates equidistant from the
        // destination. Node layout: dst at origin-height, candidates
        // mirrored on x.
        let mut nodes = NodeSet::new();
        for name in ["SRC", "LEFT", "RIGHT", "DST"] {
            nodes.add(name, NodeKind::Satellite).unwrap();
        }
        let oracle = FnOracle(|name: &str, _| {
            Ok(match name {
                "SRC" => Vec3::new(0.0, 8000.0, 0.0),
                "LEFT" => Vec3::new(-100.0, 8100.0, 0.0),
                "RIGHT" => Vec3::new(100.0, 8100.0, 0.0),
                _ => Vec3::new(0.0, 8200.0, 0.0),
            })
        });
        let geom = TickGeometry::evaluate(&oracle, &nodes, 0.0, 180.0, 6350.0).unwrap();
        // SRC connects LEFT and RIGHT (√(100²+100²) ≈ 141 km) but not DST
        // (200 km); LEFT and RIGHT are equally close to DST.
        let mut b = bundle_with(RoutingMode::ProphetLike, 0, 3, 0, 4);
        let events = advance(&mut b, &geom);
        assert_eq!(events, vec![ForwardEvent { from: 0, to: 1 }]);
    }

    #[test]
    fn spray_respects_the_copy_budget() {
        let (_, geom) = line_world(6, 1000.0);
        let mut b = bundle_with(RoutingMode::SprayAndWait, 0, 5, 3, 6);
        assert_eq!(b.copies_used, 1);

        let events = advance(&mut b, &geom);
        // Budget 3, source used 1: at most 2 forwards ever.
        assert!(events.len() <= 2);
        let _ = advance(&mut b, &geom);
        let _ = advance(&mut b, &geom);
        assert!(b.copies_used <= 3);
        assert!(b.holders.len() <= 3);
    }

    #[test]
    fn spray_with_single_copy_never_forwards() {
        let (_, geom) = line_world(4, 1000.0);
        let mut b = bundle_with(RoutingMode::SprayAndWait, 0, 3, 1, 4);
        let events = advance(&mut b, &geom);
        assert!(events.is_empty());
        assert_eq!(b.holders.len(), 1);
    }

    #[test]
    fn spray_with_zero_budget_behaves_like_epidemic() {
        let (_, geom) = line_world(4, 150.0);
        let mut spray = bundle_with(RoutingMode::SprayAndWait, 0, 3, 0, 4);
        let mut epi = bundle_with(RoutingMode::Epidemic, 0, 3, 0, 4);
        assert_eq!(advance(&mut spray, &geom), advance(&mut epi, &geom));
    }
}
