//! Vertex and edge welding.
//!
//! Welding merges corners into *merged vertices* and boundary edges into
//! *merged edges*. Both are classes of a [`UnionFind`]; a class is named by
//! its root, the member with the smallest handle. Corners of one well-formed
//! polygon at the same position are always one vertex. For every accepted
//! edge pair `e`, `f` the start of `e` is welded to the end of `f` and vice
//! versa. Corners of malformed polygons are never welded.

use smallvec::SmallVec;

use crate::{
    adjacency::Adjacency,
    boundary::Boundaries,
    handle::{hsize, CornerHandle, EdgeHandle, PolygonHandle},
    map::{DenseMap, FxHashMap, UnionFind},
    math::PosKey,
    store::GeometryStore,
};


/// Merged vertices and merged edges.
#[derive(Debug, Clone)]
pub struct Topology {
    pub(crate) vertices: UnionFind<CornerHandle>,
    pub(crate) edges: UnionFind<EdgeHandle>,
    /// The boundary edges starting or ending at each corner.
    incident: DenseMap<CornerHandle, SmallVec<[EdgeHandle; 2]>>,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            vertices: UnionFind::singletons(0),
            edges: UnionFind::singletons(0),
            incident: DenseMap::new(),
        }
    }
}

impl Topology {
    /// Creates a topology where every corner and every boundary edge is on
    /// its own.
    pub fn new(store: &GeometryStore, boundaries: &Boundaries) -> Self {
        let num_corners = store.num_corners() as usize;
        let mut incident = DenseMap::from_elem(SmallVec::new(), num_corners);
        for (e, edge) in boundaries.edges() {
            incident[edge.start].push(e);
            incident[edge.end].push(e);
        }

        Self {
            vertices: UnionFind::singletons(num_corners),
            edges: UnionFind::singletons(boundaries.num_edges() as usize),
            incident,
        }
    }

    /// Welds all corners and edges in one go.
    pub fn build(store: &GeometryStore, boundaries: &Boundaries, adjacency: &Adjacency) -> Self {
        let mut out = Self::new(store, boundaries);
        for p in store.polygons() {
            out.weld_polygon(store, boundaries, adjacency, p);
        }
        out
    }

    /// Welds the corners of `p` among each other and along every accepted
    /// edge of `p`. Does nothing for malformed polygons.
    pub fn weld_polygon(
        &mut self,
        store: &GeometryStore,
        boundaries: &Boundaries,
        adjacency: &Adjacency,
        p: PolygonHandle,
    ) {
        if !boundaries.is_well_formed(p) {
            return;
        }

        self.weld_within_polygon(store, p);
        for &e in boundaries.edges_of(p) {
            if let Some(f) = adjacency.accepted(e) {
                self.weld_pair(boundaries, e, f);
            }
        }
    }

    /// Unites all corners of `p` that share a position.
    pub(crate) fn weld_within_polygon(&mut self, store: &GeometryStore, p: PolygonHandle) {
        let mut first_at = FxHashMap::<PosKey, CornerHandle>::default();
        for c in store.corners_of(p) {
            let first = *first_at.entry(PosKey::from(store.position(c))).or_insert(c);
            self.vertices.union(first, c);
        }
    }

    /// Unites the edges `e` and `f` and the corners at their ends. `f` is
    /// expected to run in the opposite direction of `e`.
    pub(crate) fn weld_pair(&mut self, boundaries: &Boundaries, e: EdgeHandle, f: EdgeHandle) {
        let (e_edge, f_edge) = (boundaries.edge(e), boundaries.edge(f));
        self.edges.union(e, f);
        self.vertices.union(e_edge.start, f_edge.end);
        self.vertices.union(e_edge.end, f_edge.start);
    }

    /// The merged vertex `c` belongs to, named by its root corner.
    pub fn merged_vertex_of(&self, c: CornerHandle) -> CornerHandle {
        self.vertices.root_of(c)
    }

    /// All corners of the merged vertex containing `c`.
    pub fn merged_vertex_members(&self, c: CornerHandle) -> &[CornerHandle] {
        self.vertices.class_of(c)
    }

    /// Iterates over the roots of all merged vertices.
    pub fn merged_vertices(&self) -> impl Iterator<Item = CornerHandle> + '_ {
        self.vertices.roots()
    }

    pub fn num_merged_vertices(&self) -> hsize {
        self.vertices.num_classes()
    }

    /// The merged edge `e` belongs to, named by its root edge.
    pub fn merged_edge_of(&self, e: EdgeHandle) -> EdgeHandle {
        self.edges.root_of(e)
    }

    /// All boundary edges of the merged edge containing `e`.
    pub fn merged_edge_members(&self, e: EdgeHandle) -> &[EdgeHandle] {
        self.edges.class_of(e)
    }

    /// Iterates over the roots of all merged edges.
    pub fn merged_edges(&self) -> impl Iterator<Item = EdgeHandle> + '_ {
        self.edges.roots()
    }

    pub fn num_merged_edges(&self) -> hsize {
        self.edges.num_classes()
    }

    /// A border edge is a merged edge with a single member.
    pub fn is_border(&self, e: EdgeHandle) -> bool {
        self.edges.class_len(e) == 1
    }

    /// The other side of `e`, if `e` is part of a merged edge with exactly two
    /// members.
    pub fn partner(&self, e: EdgeHandle) -> Option<EdgeHandle> {
        match self.edges.class_of(e) {
            &[a, b] if a == e => Some(b),
            &[a, b] if b == e => Some(a),
            _ => None,
        }
    }

    /// The boundary edges starting or ending at corner `c`.
    pub fn edges_at(&self, c: CornerHandle) -> &[EdgeHandle] {
        &self.incident[c]
    }

    /// All border edges starting or ending at the merged vertex containing
    /// `c`, sorted and without duplicates.
    pub fn border_edges_touching(&self, c: CornerHandle) -> SmallVec<[EdgeHandle; 4]> {
        let mut out = self.merged_vertex_members(c).iter()
            .flat_map(|&m| self.edges_at(m).iter().copied())
            .filter(|&e| self.is_border(e))
            .collect::<SmallVec<[_; 4]>>();
        out.sort();
        out.dedup();
        out
    }
}


#[cfg(test)]
mod tests {
    use crate::test_utils::{cube, grid};
    use super::*;

    fn weld(store: &GeometryStore) -> (Boundaries, Topology) {
        let b = Boundaries::build(store);
        let adj = Adjacency::build(&b, true);
        let topo = Topology::build(store, &b, &adj);
        (b, topo)
    }

    #[test]
    fn single_quad() {
        let mut store = GeometryStore::new();
        let p = grid(&mut store, 1, 1)[0];
        let (b, topo) = weld(&store);

        // Six corners, four positions.
        assert_eq!(topo.num_merged_vertices(), 4);
        assert_eq!(topo.num_merged_edges(), 4);
        for &e in b.edges_of(p) {
            assert!(topo.is_border(e));
            assert_eq!(topo.partner(e), None);
        }

        // Corners at one position are one vertex, corners at different
        // positions are not.
        for c in store.corners_of(p) {
            for d in store.corners_of(p) {
                let same_pos = store.position(c) == store.position(d);
                assert_eq!(topo.merged_vertex_of(c) == topo.merged_vertex_of(d), same_pos);
            }
            assert_eq!(topo.border_edges_touching(c).len(), 2);
        }
    }

    #[test]
    fn two_quads() {
        let mut store = GeometryStore::new();
        let polygons = grid(&mut store, 2, 1);
        let (b, topo) = weld(&store);

        assert_eq!(topo.num_merged_vertices(), 6);
        assert_eq!(topo.num_merged_edges(), 7);

        let shared = b.edges_of(polygons[0]).iter()
            .copied()
            .find(|&e| !topo.is_border(e))
            .expect("one inner edge");
        let partner = topo.partner(shared).expect("inner edge has a partner");
        assert_eq!(b.edge(partner).polygon, polygons[1]);
        assert_eq!(topo.merged_edge_of(shared), topo.merged_edge_of(partner));
        assert_eq!(topo.merged_edge_members(shared).len(), 2);

        let (s, p) = (b.edge(shared), b.edge(partner));
        assert_eq!(topo.merged_vertex_of(s.start), topo.merged_vertex_of(p.end));
        assert_eq!(topo.merged_vertex_of(s.end), topo.merged_vertex_of(p.start));
        assert_eq!(topo.border_edges_touching(s.start).len(), 2);
    }

    #[test]
    fn closed_cube() {
        let mut store = GeometryStore::new();
        cube(&mut store);
        let (b, topo) = weld(&store);

        assert_eq!(topo.num_merged_vertices(), 8);
        assert_eq!(topo.num_merged_edges(), 12);
        assert!(b.edges().all(|(e, _)| topo.partner(e).is_some()));
        assert!(topo.merged_vertices().all(|v| topo.border_edges_touching(v).is_empty()));
    }
}
