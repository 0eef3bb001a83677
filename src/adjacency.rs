//! Adjacency resolution: decides which boundary edges of different polygons
//! are two sides of the same mesh edge.
//!
//! Two boundary edges are candidates for each other if one runs from `a` to
//! `b` and the other from `b` to `a` (consistent winding) and they belong to
//! different polygons. If an edge has more than one candidate, the candidate
//! whose polygon shares the most edges with the edge's polygon is kept.
//! Choices are made per edge and in input order; they are not forced to be
//! mutual. An edge that is chosen by several others ends up in a merged edge
//! with more than two members, which the non-manifold repair takes care of.

use log::{debug, trace};
use optional::Optioned;
use smallvec::SmallVec;

use crate::{
    boundary::Boundaries,
    handle::{EdgeHandle, Handle, PolygonHandle},
    map::{DenseMap, FxHashMap},
    math::PosKey,
};


/// Record of an edge that had more than one neighbor candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousEdge {
    /// The polygon owning `edge`.
    pub polygon: PolygonHandle,
    pub edge: EdgeHandle,
    /// All candidates in the order they were found.
    pub candidates: SmallVec<[EdgeHandle; 2]>,
    /// The candidate that was kept.
    pub kept: EdgeHandle,
}

/// Neighbor candidates and chosen partners of all boundary edges.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    /// Boundary edges of well-formed polygons by (start, end) position.
    index: FxHashMap<(PosKey, PosKey), SmallVec<[EdgeHandle; 2]>>,
    candidates: DenseMap<EdgeHandle, SmallVec<[EdgeHandle; 2]>>,
    /// Number of candidate edge pairs between two polygons. Stored for both
    /// orders of the pair.
    shared: FxHashMap<(PolygonHandle, PolygonHandle), u32>,
    accepted: DenseMap<EdgeHandle, Optioned<EdgeHandle>>,
    neighbors: DenseMap<PolygonHandle, SmallVec<[PolygonHandle; 4]>>,

    double_sided_test: bool,
    rejected_double_sided: u32,
    ambiguous: Vec<AmbiguousEdge>,
}

impl Adjacency {
    pub fn new(double_sided_test: bool) -> Self {
        Self {
            double_sided_test,
            ..Self::default()
        }
    }

    /// Runs all adjacency steps over all polygons in one go.
    pub fn build(boundaries: &Boundaries, double_sided_test: bool) -> Self {
        let polygons = || (0..boundaries.num_polygons()).map(PolygonHandle::new);

        let mut out = Self::new(double_sided_test);
        for p in polygons() {
            out.register_polygon(boundaries, p);
        }
        out.prepare(boundaries);
        for p in polygons() {
            out.collect_candidates(boundaries, p);
        }
        for p in polygons() {
            out.resolve_polygon(boundaries, p);
        }
        out
    }

    /// Adds the boundary edges of `p` to the global position index. Edges of
    /// malformed polygons are never registered, so they never get a partner.
    pub fn register_polygon(&mut self, boundaries: &Boundaries, p: PolygonHandle) {
        if !boundaries.is_well_formed(p) {
            return;
        }

        for &e in boundaries.edges_of(p) {
            self.index.entry(boundaries.positions(e)).or_default().push(e);
        }
    }

    /// Allocates the per-edge and per-polygon storage. Has to be called after
    /// all boundaries are built and before the first `collect_candidates`.
    pub fn prepare(&mut self, boundaries: &Boundaries) {
        let num_edges = boundaries.num_edges() as usize;
        let num_polygons = boundaries.num_polygons() as usize;
        self.candidates = DenseMap::from_elem(SmallVec::new(), num_edges);
        self.accepted = DenseMap::from_elem(Optioned::none(), num_edges);
        self.neighbors = DenseMap::from_elem(SmallVec::new(), num_polygons);
    }

    /// Finds the neighbor candidates of all boundary edges of `p` and counts
    /// how many candidate pairs `p` has with each other polygon.
    pub fn collect_candidates(&mut self, boundaries: &Boundaries, p: PolygonHandle) {
        if !boundaries.is_well_formed(p) {
            return;
        }

        for &e in boundaries.edges_of(p) {
            let (from, to) = boundaries.positions(e);
            let reversed = match self.index.get(&(to, from)) {
                Some(edges) => edges,
                None => continue,
            };

            for &f in reversed {
                let q = boundaries.edge(f).polygon;
                if q == p {
                    continue;
                }

                if self.double_sided_test && is_mirrored(boundaries, e, f) {
                    trace!("{:?} and {:?} are two sides of one surface, not neighbors", e, f);
                    self.rejected_double_sided += 1;
                    continue;
                }

                self.candidates[e].push(f);
                *self.shared.entry((p, q)).or_insert(0) += 1;
            }
        }
    }

    /// Chooses the partner of every boundary edge of `p` that has at least
    /// one candidate.
    pub fn resolve_polygon(&mut self, boundaries: &Boundaries, p: PolygonHandle) {
        for &e in boundaries.edges_of(p) {
            let candidates = self.candidates[e].clone();
            let kept = match candidates.len() {
                0 => continue,
                1 => candidates[0],
                _ => self.break_tie(boundaries, p, e, candidates),
            };

            self.accepted[e] = Optioned::some(kept);

            // The pair counts once both edges are resolved and chose each
            // other.
            if self.accepted(kept) != Some(e) {
                continue;
            }
            let q = boundaries.edge(kept).polygon;
            if !self.neighbors[p].contains(&q) {
                self.neighbors[p].push(q);
            }
            if !self.neighbors[q].contains(&p) {
                self.neighbors[q].push(p);
            }
        }
    }

    fn break_tie(
        &mut self,
        boundaries: &Boundaries,
        p: PolygonHandle,
        e: EdgeHandle,
        candidates: SmallVec<[EdgeHandle; 2]>,
    ) -> EdgeHandle {
        let polygon_of = |f: EdgeHandle| boundaries.edge(f).polygon;

        // Ties go to the candidate found first.
        let mut kept = candidates[0];
        let mut best = self.shared_edges(p, polygon_of(kept));
        for &f in &candidates[1..] {
            let count = self.shared_edges(p, polygon_of(f));
            if count > best {
                kept = f;
                best = count;
            }
        }

        for &f in candidates.iter().filter(|&&f| f != kept) {
            let q = polygon_of(f);
            for key in &[(p, q), (q, p)] {
                if let Some(count) = self.shared.get_mut(key) {
                    *count = count.saturating_sub(1);
                }
            }
        }

        debug!(
            "edge {:?} of polygon {:?} has {} neighbor candidates {:?}, keeping {:?}",
            e,
            p,
            candidates.len(),
            candidates,
            kept,
        );
        self.ambiguous.push(AmbiguousEdge { polygon: p, edge: e, candidates, kept });

        kept
    }

    /// The partner chosen for `e`, if any.
    pub fn accepted(&self, e: EdgeHandle) -> Option<EdgeHandle> {
        self.accepted.get(e).and_then(|o| o.into_option())
    }

    /// Returns `true` if `e` and `f` chose each other.
    pub fn is_mutual(&self, e: EdgeHandle, f: EdgeHandle) -> bool {
        self.accepted(e) == Some(f) && self.accepted(f) == Some(e)
    }

    /// All neighbor candidates of `e` that survived the double-sided test.
    pub fn candidates(&self, e: EdgeHandle) -> &[EdgeHandle] {
        self.candidates.get(e).map(|c| &c[..]).unwrap_or(&[])
    }

    /// Number of candidate edge pairs between `p` and `q`, minus the ones
    /// dropped while resolving ambiguous edges so far.
    pub fn shared_edges(&self, p: PolygonHandle, q: PolygonHandle) -> u32 {
        self.shared.get(&(p, q)).copied().unwrap_or(0)
    }

    /// All polygons that `p` shares at least one pair of edges with that
    /// chose each other, in the order those pairs were completed. One-sided
    /// choices are left out: they are dropped by the non-manifold repair.
    pub fn neighbors(&self, p: PolygonHandle) -> &[PolygonHandle] {
        self.neighbors.get(p).map(|n| &n[..]).unwrap_or(&[])
    }

    pub fn ambiguous_edges(&self) -> &[AmbiguousEdge] {
        &self.ambiguous
    }

    /// Number of candidate pairs (counted once per direction) rejected by the
    /// double-sided test.
    pub fn rejected_double_sided(&self) -> u32 {
        self.rejected_double_sided
    }

    pub(crate) fn take_ambiguous_edges(&mut self) -> Vec<AmbiguousEdge> {
        std::mem::take(&mut self.ambiguous)
    }
}

/// Returns `true` if the polygons of `e` and `f` sit on top of each other
/// with opposite winding, i.e. are the two faces of one double-sided
/// surface.
///
/// The quick check looks at the positions flanking both edges: a mirror
/// image has the position before `e` right after `f` and vice versa. Only
/// if that matches, the complete cycles are compared. Polygons that share
/// a run of edges around a vertex of valence two pass the quick check but
/// differ somewhere else on their boundary.
fn is_mirrored(boundaries: &Boundaries, e: EdgeHandle, f: EdgeHandle) -> bool {
    let (e_before, e_after) = boundaries.flanking_positions(e);
    let (f_before, f_after) = boundaries.flanking_positions(f);
    if e_before != f_after || e_after != f_before {
        return false;
    }

    let len = boundaries.edges_of(boundaries.edge(e).polygon).len();
    if len != boundaries.edges_of(boundaries.edge(f).polygon).len() {
        return false;
    }

    // Walk forward around `e`'s polygon and backward around `f`'s.
    let (mut a, mut b) = (e, f);
    for _ in 0..len {
        if boundaries.positions(a).0 != boundaries.positions(b).1 {
            return false;
        }
        a = boundaries.next_in_cycle(a);
        b = boundaries.prev_in_cycle(b);
    }

    true
}

#[cfg(test)]
mod tests {
    use crate::{
        store::GeometryStore,
        test_utils::{corner, fin, grid, quad_triangles},
    };
    use super::*;

    fn two_quads() -> (GeometryStore, PolygonHandle, PolygonHandle) {
        let mut store = GeometryStore::new();
        let polygons = grid(&mut store, 2, 1);
        (store, polygons[0], polygons[1])
    }

    #[test]
    fn shared_edge_is_accepted_both_ways() {
        let (store, p, q) = two_quads();
        let b = Boundaries::build(&store);
        let adj = Adjacency::build(&b, true);

        let accepted = b.edges_of(p).iter()
            .filter_map(|&e| adj.accepted(e).map(|f| (e, f)))
            .collect::<Vec<_>>();
        assert_eq!(accepted.len(), 1);

        let (e, f) = accepted[0];
        assert_eq!(b.edge(f).polygon, q);
        assert!(adj.is_mutual(e, f));
        let (from, to) = b.positions(e);
        assert_eq!(b.positions(f), (to, from));

        assert_eq!(adj.neighbors(p), &[q]);
        assert_eq!(adj.neighbors(q), &[p]);
        assert_eq!(adj.shared_edges(p, q), 1);
        assert!(adj.ambiguous_edges().is_empty());
    }

    #[test]
    fn same_direction_is_not_a_candidate() {
        // The second quad is wound the other way round.
        let mut store = GeometryStore::new();
        let p = store.add_polygon(quad_triangles([
            [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
        ]));
        let q = store.add_polygon(quad_triangles([
            [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [2.0, 1.0, 0.0], [2.0, 0.0, 0.0],
        ]));

        let b = Boundaries::build(&store);
        let adj = Adjacency::build(&b, true);
        assert!(adj.neighbors(p).is_empty());
        assert!(adj.neighbors(q).is_empty());
        assert!(b.edges().all(|(e, _)| adj.accepted(e).is_none()));
    }

    #[test]
    fn double_sided_quads_are_rejected() {
        let mut store = GeometryStore::new();
        let front = store.add_polygon(quad_triangles([
            [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
        ]));
        let back = store.add_polygon(quad_triangles([
            [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0],
        ]));
        let b = Boundaries::build(&store);

        let adj = Adjacency::build(&b, true);
        assert!(adj.neighbors(front).is_empty());
        assert!(adj.neighbors(back).is_empty());
        assert_eq!(adj.rejected_double_sided(), 8);

        // Without the test, the two faces are glued together.
        let adj = Adjacency::build(&b, false);
        assert_eq!(adj.neighbors(front), &[back]);
        assert_eq!(adj.shared_edges(front, back), 4);
        assert_eq!(adj.rejected_double_sided(), 0);
    }

    #[test]
    fn malformed_polygons_get_no_partner() {
        let mut store = GeometryStore::new();
        let good = store.add_polygon(quad_triangles([
            [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
        ]));
        // Two separate loops, one of them touching the quad's right edge with
        // matching winding.
        let bad = store.add_polygon(vec![
            [corner(1.0, 1.0, 0.0), corner(1.0, 0.0, 0.0), corner(2.0, 0.5, 0.0)],
            [corner(5.0, 0.0, 0.0), corner(6.0, 0.0, 0.0), corner(5.0, 1.0, 0.0)],
        ]);

        let b = Boundaries::build(&store);
        assert!(!b.is_well_formed(bad));

        let adj = Adjacency::build(&b, true);
        assert!(adj.neighbors(good).is_empty());
        assert!(b.edges_of(bad).iter().all(|&e| adj.candidates(e).is_empty()));
    }

    #[test]
    fn fin_is_ambiguous() {
        let mut store = GeometryStore::new();
        let [left, right, up] = fin(&mut store);
        let b = Boundaries::build(&store);
        let adj = Adjacency::build(&b, true);

        assert_eq!(adj.ambiguous_edges().len(), 1);
        let amb = &adj.ambiguous_edges()[0];
        assert_eq!(amb.polygon, right);
        assert_eq!(amb.candidates.len(), 2);

        // Tie: the candidate found first (the one of `left`) wins.
        assert_eq!(b.edge(amb.kept).polygon, left);
        assert!(adj.is_mutual(amb.edge, amb.kept));
        assert_eq!(adj.shared_edges(right, up), 0);

        // `up` still chose `right`, without being chosen back.
        let (e, f) = b.edges_of(up).iter()
            .find_map(|&e| adj.accepted(e).map(|f| (e, f)))
            .expect("fin edge has a partner");
        assert_eq!(f, amb.edge);
        assert!(!adj.is_mutual(e, f));

        assert_eq!(adj.neighbors(right), &[left]);
        assert_eq!(adj.neighbors(left), &[right]);
        assert!(adj.neighbors(up).is_empty());
    }

    #[test]
    fn shared_valence_two_vertex_is_not_mirrored() {
        // Both quads run through (1, -0.5), which has no other polygon
        // around it. They share two consecutive edges.
        let mut store = GeometryStore::new();
        let a = store.add_polygon(quad_triangles([
            [0.0, 0.0, 0.0], [1.0, -0.5, 0.0], [2.0, 0.0, 0.0], [1.0, 1.0, 0.0],
        ]));
        let b = store.add_polygon(quad_triangles([
            [2.0, 0.0, 0.0], [1.0, -0.5, 0.0], [0.0, 0.0, 0.0], [1.0, -2.0, 0.0],
        ]));

        let boundaries = Boundaries::build(&store);
        let adj = Adjacency::build(&boundaries, true);
        assert_eq!(adj.rejected_double_sided(), 0);
        assert_eq!(adj.neighbors(a), &[b]);
        assert_eq!(adj.neighbors(b), &[a]);
        assert_eq!(adj.shared_edges(a, b), 2);

        let mutual = boundaries.edges_of(a).iter()
            .filter(|&&e| adj.accepted(e).map_or(false, |f| adj.is_mutual(e, f)))
            .count();
        assert_eq!(mutual, 2);
    }

    #[test]
    fn mirrored_triangles_are_rejected() {
        let mut store = GeometryStore::new();
        store.add_polygon(vec![[corner(0.0, 0.0, 0.0), corner(1.0, 0.0, 0.0), corner(0.0, 1.0, 0.0)]]);
        store.add_polygon(vec![[corner(0.0, 0.0, 0.0), corner(0.0, 1.0, 0.0), corner(1.0, 0.0, 0.0)]]);

        let b = Boundaries::build(&store);
        let adj = Adjacency::build(&b, true);
        assert_eq!(adj.rejected_double_sided(), 6);
        assert!(b.edges().all(|(e, _)| adj.accepted(e).is_none()));
    }
}
