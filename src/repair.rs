//! Non-manifold repair.
//!
//! After welding, a merged vertex may be shared by several surface sheets
//! that only touch in that vertex (e.g. two cones meeting at their tips), or
//! a merged edge may have more than two members (a fin). Such a vertex is
//! *offending*: it touches more than two border edges, or one of its merged
//! edges has more than two members.
//!
//! An offending vertex is split up. Merged edges with more than two members
//! around it are dissolved, keeping only pairs of edges that chose each other
//! during adjacency resolution. Then the corners are regrouped: the corners
//! of one polygon form a *wedge*, wedges are linked through the remaining
//! two-member edges, and every chain or ring of linked wedges becomes one
//! new merged vertex. Each of those touches at most two border edges.

use std::mem;

use log::{debug, warn};
use smallvec::SmallVec;

use crate::{
    adjacency::Adjacency,
    boundary::Boundaries,
    handle::{CornerHandle, EdgeHandle, PolygonHandle},
    map::FxHashSet,
    store::GeometryStore,
    weld::Topology,
};


/// After this many rounds of splitting, remaining offending vertices are
/// dissolved completely.
const MAX_ROUNDS: u32 = 8;

/// Returns `true` if the merged vertex containing `c` is offending.
pub fn is_offending(topology: &Topology, c: CornerHandle) -> bool {
    let mut borders = SmallVec::<[EdgeHandle; 4]>::new();
    for &m in topology.merged_vertex_members(c) {
        for &e in topology.edges_at(m) {
            match topology.edges.class_len(e) {
                1 => borders.push(e),
                2 => {}
                _ => return true,
            }
        }
    }

    borders.sort();
    borders.dedup();
    borders.len() > 2
}

/// Finds all offending merged vertices, by root, in order of increasing
/// root.
pub fn find_offending(topology: &Topology) -> Vec<CornerHandle> {
    topology.merged_vertices().filter(|&v| is_offending(topology, v)).collect()
}

/// Collects offending vertices polygon by polygon, then splits them a few at
/// a time.
///
/// Splitting happens in rounds. The first round works on the vertices found
/// by `scan_polygon`. Every split records the corners around it whose merged
/// vertex may have changed, and only those are checked again in the next
/// round. After `MAX_ROUNDS` rounds, whatever is still offending is unwelded.
#[derive(Debug, Clone, Default)]
pub struct RepairPass {
    checked: FxHashSet<CornerHandle>,
    /// Vertices to check in the current round.
    queue: Vec<CornerHandle>,
    cursor: usize,
    /// Corners to check in the next round.
    suspects: Vec<CornerHandle>,
    /// Merged vertices already handled in the current round.
    handled: FxHashSet<CornerHandle>,
    round: u32,
    found: usize,
    repairs: u32,
}

impl RepairPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the merged vertices of all corners of `p` that were not
    /// checked before.
    pub fn scan_polygon(
        &mut self,
        store: &GeometryStore,
        boundaries: &Boundaries,
        topology: &Topology,
        p: PolygonHandle,
    ) {
        if !boundaries.is_well_formed(p) {
            return;
        }

        for c in store.corners_of(p) {
            let root = topology.merged_vertex_of(c);
            if self.checked.insert(root) && is_offending(topology, root) {
                self.queue.push(root);
                self.found += 1;
            }
        }
    }

    /// Number of offending vertices found by `scan_polygon`.
    pub fn num_offending(&self) -> usize {
        self.found
    }

    /// Returns `true` if nothing is left to check.
    pub fn is_done(&self) -> bool {
        self.cursor == self.queue.len() && self.suspects.is_empty()
    }

    /// Upper bound of the number of vertices still to check.
    pub fn pending(&self) -> usize {
        self.queue.len() - self.cursor + self.suspects.len()
    }

    /// Number of merged vertices split (or unwelded) so far.
    pub fn repairs(&self) -> u32 {
        self.repairs
    }

    /// Checks up to `max` queued vertices and splits the ones that are
    /// offending. Starts the next round when the current one is exhausted.
    pub fn split_batch(
        &mut self,
        store: &GeometryStore,
        boundaries: &Boundaries,
        adjacency: &Adjacency,
        topology: &mut Topology,
        max: usize,
    ) {
        let mut checked = 0;
        while checked < max && !self.is_done() {
            if self.cursor == self.queue.len() {
                self.next_round();
                continue;
            }

            let c = self.queue[self.cursor];
            self.cursor += 1;
            checked += 1;

            let v = topology.merged_vertex_of(c);
            if !self.handled.insert(v) || !is_offending(topology, v) {
                continue;
            }

            if self.round < MAX_ROUNDS {
                debug!("splitting non-manifold vertex {:?} (round {})", v, self.round + 1);
                split_vertex(store, boundaries, adjacency, topology, v, &mut self.suspects);
            } else {
                unweld(topology, v);
            }
            self.repairs += 1;
        }
    }

    fn next_round(&mut self) {
        self.round += 1;
        self.cursor = 0;
        self.handled.clear();
        self.queue = mem::take(&mut self.suspects);
        self.queue.sort();
        self.queue.dedup();

        if self.round == MAX_ROUNDS {
            warn!(
                "vertices are still non-manifold after {} rounds of splitting, unwelding them",
                MAX_ROUNDS,
            );
        }
    }

    /// Splits all offending vertices in one go and returns the number of
    /// repairs.
    pub fn finish(
        mut self,
        store: &GeometryStore,
        boundaries: &Boundaries,
        adjacency: &Adjacency,
        topology: &mut Topology,
    ) -> u32 {
        while !self.is_done() {
            self.split_batch(store, boundaries, adjacency, topology, usize::MAX);
        }
        self.repairs
    }
}

/// Dissolves the merged edge containing `e` and re-pairs members that chose
/// each other.
fn dissolve_edge(adjacency: &Adjacency, topology: &mut Topology, e: EdgeHandle) {
    let old = topology.edges.isolate(e);
    for &x in &old {
        if let Some(y) = adjacency.accepted(x) {
            if x < y && old.contains(&y) && adjacency.is_mutual(x, y) {
                topology.edges.union(x, y);
            }
        }
    }
}

/// The corners of one polygon within a merged vertex.
#[derive(Debug)]
struct Wedge {
    corners: SmallVec<[CornerHandle; 2]>,
    /// The boundary edge ending at this wedge and the one starting at it.
    incoming: Option<EdgeHandle>,
    outgoing: Option<EdgeHandle>,
}

/// Connection of a wedge to a neighboring wedge over the merged edge
/// `{own, partner}`.
#[derive(Debug, Clone, Copy)]
struct Link {
    wedge: usize,
    own: EdgeHandle,
    partner: EdgeHandle,
}

fn split_vertex(
    store: &GeometryStore,
    boundaries: &Boundaries,
    adjacency: &Adjacency,
    topology: &mut Topology,
    v: CornerHandle,
    suspects: &mut Vec<CornerHandle>,
) {
    let mut members = topology.vertices.class_of(v).to_vec();
    members.sort();

    let around = members.iter()
        .flat_map(|&m| topology.edges_at(m).iter().copied())
        .collect::<SmallVec<[EdgeHandle; 8]>>();

    // Every merged edge touched below ends in this vertex or in one of its
    // neighbors. Those are the only vertices that can change.
    for &e in &around {
        for &x in topology.edges.class_of(e) {
            let edge = boundaries.edge(x);
            suspects.push(edge.start);
            suspects.push(edge.end);
        }
    }

    // Dissolve all overfull merged edges around this vertex.
    for &e in &around {
        if topology.edges.class_len(e) > 2 {
            dissolve_edge(adjacency, topology, e);
        }
    }

    topology.vertices.isolate(v);

    // Group corners into wedges, keeping the order of the smallest corner
    // handle.
    let mut wedges: Vec<Wedge> = Vec::new();
    let mut wedge_polygons: SmallVec<[PolygonHandle; 8]> = SmallVec::new();
    for &c in &members {
        let p = store.polygon_of(c);
        let idx = match wedge_polygons.iter().position(|&q| q == p) {
            Some(idx) => idx,
            None => {
                wedge_polygons.push(p);
                wedges.push(Wedge { corners: SmallVec::new(), incoming: None, outgoing: None });
                wedges.len() - 1
            }
        };

        let wedge = &mut wedges[idx];
        wedge.corners.push(c);
        for &e in topology.edges_at(c) {
            let edge = boundaries.edge(e);
            if edge.end == c {
                wedge.incoming = Some(e);
            }
            if edge.start == c {
                wedge.outgoing = Some(e);
            }
        }
    }

    let wedge_of = |c: CornerHandle| -> Option<usize> {
        if members.binary_search(&c).is_err() {
            return None;
        }
        let p = store.polygon_of(c);
        wedge_polygons.iter().position(|&q| q == p)
    };

    // Link wedges through the two-member merged edges. `links[w]` holds the
    // neighbor over the incoming and over the outgoing edge of wedge `w`.
    let mut links = vec![[None::<Link>; 2]; wedges.len()];
    for (w, wedge) in wedges.iter().enumerate() {
        for (side, edge) in [wedge.incoming, wedge.outgoing].iter().enumerate() {
            let own = match *edge {
                Some(e) => e,
                None => continue,
            };
            let partner = match topology.partner(own) {
                Some(f) => f,
                None => continue,
            };

            // The partner of an edge ending here starts here and vice versa.
            let partner_corner = if side == 0 {
                boundaries.edge(partner).start
            } else {
                boundaries.edge(partner).end
            };
            match wedge_of(partner_corner) {
                Some(other) if other != w => {
                    links[w][side] = Some(Link { wedge: other, own, partner });
                }
                _ => {
                    debug!("merged edge {:?} does not pass through {:?}, dissolving it", own, v);
                    topology.edges.isolate(own);
                }
            }
        }
    }

    // Walk chains first (starting at wedges with a free side), then rings.
    // Every walk becomes one merged vertex.
    let mut visited = vec![false; wedges.len()];
    let chain_ends = (0..wedges.len()).filter(|&w| links[w].iter().any(|l| l.is_none()));
    let order = chain_ends.chain(0..wedges.len()).collect::<Vec<_>>();
    for start in order {
        if visited[start] {
            continue;
        }

        let anchor = wedges[start].corners[0];
        let mut current = start;
        let mut arrived_over = None;
        loop {
            visited[current] = true;
            for &c in &wedges[current].corners {
                topology.vertices.union(anchor, c);
            }

            let next = links[current].iter()
                .flatten()
                .find(|l| Some(l.own) != arrived_over)
                .copied();
            match next {
                Some(l) if !visited[l.wedge] => {
                    arrived_over = Some(l.partner);
                    current = l.wedge;
                }
                _ => break,
            }
        }
    }
}

/// Fallback: makes every corner of the merged vertex containing `v` a
/// vertex of its own and turns all its edges into borders.
fn unweld(topology: &mut Topology, v: CornerHandle) {
    let members = topology.vertices.isolate(v);
    for &c in &members {
        let edges = topology.edges_at(c).iter().copied().collect::<SmallVec<[_; 2]>>();
        for e in edges {
            topology.edges.isolate(e);
        }
    }
}


#[cfg(test)]
mod tests {
    use crate::{
        store::GeometryStore,
        test_utils::{corner, fin, grid},
    };
    use super::*;

    struct Welded {
        store: GeometryStore,
        boundaries: Boundaries,
        adjacency: Adjacency,
        topology: Topology,
    }

    fn weld(store: GeometryStore) -> Welded {
        let boundaries = Boundaries::build(&store);
        let adjacency = Adjacency::build(&boundaries, true);
        let topology = Topology::build(&store, &boundaries, &adjacency);
        Welded { store, boundaries, adjacency, topology }
    }

    fn repair(w: &mut Welded) -> u32 {
        let mut pass = RepairPass::new();
        for p in w.store.polygons() {
            pass.scan_polygon(&w.store, &w.boundaries, &w.topology, p);
        }
        pass.finish(&w.store, &w.boundaries, &w.adjacency, &mut w.topology)
    }

    fn assert_manifold(topology: &Topology) {
        for v in topology.merged_vertices() {
            let borders = topology.border_edges_touching(v).len();
            assert!(borders == 0 || borders == 2, "vertex {:?} touches {} borders", v, borders);
        }
        for e in topology.merged_edges() {
            assert!(topology.merged_edge_members(e).len() <= 2, "edge {:?}", e);
        }
    }

    #[test]
    fn manifold_input_is_untouched() {
        let mut store = GeometryStore::new();
        grid(&mut store, 3, 3);
        let mut w = weld(store);
        let before = w.topology.num_merged_vertices();

        assert!(find_offending(&w.topology).is_empty());
        assert_eq!(repair(&mut w), 0);
        assert_eq!(w.topology.num_merged_vertices(), before);
    }

    #[test]
    fn fin_is_split_off() {
        let mut store = GeometryStore::new();
        let [left, right, up] = fin(&mut store);
        let mut w = weld(store);

        // Before the repair, the shared edge has three members.
        let offending = find_offending(&w.topology);
        assert_eq!(offending.len(), 2);

        assert_eq!(repair(&mut w), 2);
        assert_manifold(&w.topology);
        assert!(find_offending(&w.topology).is_empty());

        // The flat strip stays connected, the fin is cut loose.
        let b = &w.boundaries;
        let inner = |p, q| {
            b.edges_of(p).iter().any(|&e| {
                w.topology.partner(e).map(|f| b.edge(f).polygon) == Some(q)
            })
        };
        assert!(inner(left, right));
        assert!(!inner(left, up));
        assert!(!inner(right, up));
        // Both ends of the fin edge are split in two.
        assert_eq!(w.topology.num_merged_vertices(), 8 + 2);
    }

    #[test]
    fn touching_tips_are_separated() {
        // Two triangles that share a single point. Welded at that point, it
        // touches four border edges.
        let mut store = GeometryStore::new();
        store.add_polygon(vec![[
            corner(0.0, 0.0, 0.0), corner(1.0, 0.0, 0.0), corner(0.0, 1.0, 0.0),
        ]]);
        store.add_polygon(vec![[
            corner(0.0, 0.0, 0.0), corner(-1.0, 0.0, 0.0), corner(0.0, -1.0, 0.0),
        ]]);
        let mut w = weld(store);

        // Without any accepted edge, the two tips are separate already.
        assert!(find_offending(&w.topology).is_empty());

        // Weld the tips by hand to produce a bowtie vertex.
        let tip_a = w.store.corners_of(w.store.nth_polygon(0)).next().expect("corner");
        let tip_b = w.store.corners_of(w.store.nth_polygon(1)).next().expect("corner");
        w.topology.vertices.union(tip_a, tip_b);
        assert!(is_offending(&w.topology, tip_a));

        let mut pass = RepairPass::new();
        for p in w.store.polygons() {
            pass.scan_polygon(&w.store, &w.boundaries, &w.topology, p);
        }
        assert_eq!(pass.num_offending(), 1);
        let repairs = pass.finish(&w.store, &w.boundaries, &w.adjacency, &mut w.topology);
        assert_eq!(repairs, 1);
        assert!(!w.topology.vertices.same_class(tip_a, tip_b));
        assert_manifold(&w.topology);
    }
}
