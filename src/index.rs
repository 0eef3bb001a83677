//! Index assignment and the final reconstruction result.
//!
//! Every merged vertex gets a position index, in order of first encounter
//! while walking polygons, triangles and corners in input order. Every
//! distinct (merged vertex, UV values) combination gets a UV index, so a
//! position sitting on a UV seam gets one UV entry per side of the seam.

use cgmath::Point3;
use optional::Optioned;
use smallvec::SmallVec;

use crate::{
    boundary::Boundaries,
    handle::{CornerHandle, Handle, PolygonHandle, TriangleHandle},
    map::{DenseMap, FxHashMap},
    math::UvKey,
    pipeline::Diagnostics,
    store::{GeometryStore, UvMap, UvSet},
    weld::Topology,
};


/// The position index and UV index of one corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CornerIndices {
    pub position: u32,
    pub uv: u32,
}

/// One distinct UV entry: a position plus the UV values used at it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedUv {
    /// Index into [`Reconstructed::positions`].
    pub position: u32,
    pub uvs: UvMap,
}

type UvEntryKey = (CornerHandle, SmallVec<[(UvSet, UvKey); 1]>);

/// Hands out position and UV indices polygon by polygon.
#[derive(Debug, Clone, Default)]
pub(crate) struct IndexAssigner {
    /// Position index per merged vertex root.
    position_of: DenseMap<CornerHandle, Optioned<u32>>,
    uv_of: FxHashMap<UvEntryKey, u32>,

    positions: Vec<Point3<f64>>,
    uvs: Vec<MergedUv>,
    corner_indices: DenseMap<CornerHandle, CornerIndices>,
    windings: DenseMap<PolygonHandle, Vec<u32>>,
    adjacency: DenseMap<PolygonHandle, Vec<Option<PolygonHandle>>>,
}

impl IndexAssigner {
    pub(crate) fn new(store: &GeometryStore) -> Self {
        let num_corners = store.num_corners() as usize;
        Self {
            position_of: DenseMap::from_elem(Optioned::none(), num_corners),
            corner_indices: DenseMap::from_elem(CornerIndices::default(), num_corners),
            windings: DenseMap::with_capacity(store.num_polygons() as usize),
            adjacency: DenseMap::with_capacity(store.num_polygons() as usize),
            ..Self::default()
        }
    }

    /// Assigns indices to all corners of `p`. Polygons have to be passed in
    /// input order.
    pub(crate) fn assign_polygon(
        &mut self,
        store: &GeometryStore,
        boundaries: &Boundaries,
        topology: &Topology,
        p: PolygonHandle,
    ) {
        assert_eq!(
            self.windings.next_push_handle(),
            p,
            "bug: polygons have to be indexed in input order",
        );

        let uvs = &mut self.uvs;
        for c in store.corners_of(p) {
            let root = topology.merged_vertex_of(c);
            let position = match self.position_of[root].into_option() {
                Some(idx) => idx,
                None => {
                    let idx = self.positions.len() as u32;
                    self.positions.push(store.position(c));
                    self.position_of[root] = Optioned::some(idx);
                    idx
                }
            };

            let corner_uvs = &store.corner(c).uvs;
            let uv = *self.uv_of.entry((root, corner_uvs.key())).or_insert_with(|| {
                uvs.push(MergedUv { position, uvs: corner_uvs.clone() });
                uvs.len() as u32 - 1
            });

            self.corner_indices[c] = CornerIndices { position, uv };
        }

        let corner_indices = &self.corner_indices;
        let winding = boundaries.edges_of(p).iter()
            .map(|&e| corner_indices[boundaries.edge(e).start].position)
            .collect();
        self.windings.push(winding);

        let neighbors = boundaries.edges_of(p).iter()
            .map(|&e| topology.partner(e).map(|f| boundaries.edge(f).polygon))
            .collect();
        self.adjacency.push(neighbors);
    }

    pub(crate) fn finish(
        self,
        diagnostics: Diagnostics,
        boundaries: Boundaries,
        topology: Topology,
    ) -> Reconstructed {
        Reconstructed {
            positions: self.positions,
            uvs: self.uvs,
            corner_indices: self.corner_indices,
            windings: self.windings,
            adjacency: self.adjacency,
            diagnostics,
            boundaries,
            topology,
        }
    }
}

/// The editable mesh rebuilt from a triangle soup.
#[derive(Debug, Clone)]
pub struct Reconstructed {
    /// One entry per merged vertex, in order of first encounter.
    pub positions: Vec<Point3<f64>>,

    /// One entry per distinct (position, UV values) combination.
    pub uvs: Vec<MergedUv>,

    pub corner_indices: DenseMap<CornerHandle, CornerIndices>,

    /// Position indices around each polygon in winding order. Empty for
    /// polygons without a boundary; for malformed polygons the order is
    /// meaningless.
    pub windings: DenseMap<PolygonHandle, Vec<u32>>,

    /// For each boundary edge of each polygon (in the order of `windings`),
    /// the polygon on the other side, or `None` for border edges.
    pub adjacency: DenseMap<PolygonHandle, Vec<Option<PolygonHandle>>>,

    pub diagnostics: Diagnostics,

    pub boundaries: Boundaries,
    pub topology: Topology,
}

impl Reconstructed {
    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }

    /// The position indices of all triangles, three per triangle, in input
    /// order.
    pub fn triangle_indices(&self, store: &GeometryStore) -> Vec<u32> {
        store.triangles()
            .flat_map(|(_, t)| t.corners.iter().map(|&c| self.corner_indices[c].position))
            .collect()
    }

    /// Resolves the corners of `t` through the index tables: position and UV
    /// values of each corner.
    pub fn expand_triangle(
        &self,
        store: &GeometryStore,
        t: TriangleHandle,
    ) -> [(Point3<f64>, &UvMap); 3] {
        let corners = store.triangle(t).corners;
        let expand = |c: CornerHandle| {
            let idx = self.corner_indices[c];
            (self.positions[idx.position as usize], &self.uvs[idx.uv as usize].uvs)
        };
        [expand(corners[0]), expand(corners[1]), expand(corners[2])]
    }

    /// All distinct polygons sharing an edge with `p`, in winding order of
    /// the shared edges.
    pub fn neighbors_of(&self, p: PolygonHandle) -> impl Iterator<Item = PolygonHandle> + '_ {
        let mut seen = SmallVec::<[PolygonHandle; 8]>::new();
        self.adjacency[p].iter().flatten().copied().filter(move |&q| {
            if seen.contains(&q) {
                false
            } else {
                seen.push(q);
                true
            }
        })
    }

    /// Number of boundary edges without a partner.
    pub fn num_border_edges(&self) -> usize {
        self.adjacency.values().flatten().filter(|n| n.is_none()).count()
    }

    /// Iterates over all polygons in input order.
    pub fn polygons(&self) -> impl Iterator<Item = PolygonHandle> + '_ {
        (0..self.windings.num_elements()).map(PolygonHandle::new)
    }
}


#[cfg(test)]
mod tests {
    use cgmath::Point2;

    use crate::{
        pipeline::{reconstruct, Options},
        test_utils::{grid, uv_corner},
    };
    use super::*;

    #[test]
    fn positions_in_order_of_first_encounter() {
        let mut store = GeometryStore::new();
        let polygons = grid(&mut store, 2, 1);
        let out = reconstruct(&store, Options::default());

        assert_eq!(out.positions, vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        ]);
        assert_eq!(out.triangle_indices(&store), vec![0, 1, 2, 0, 2, 3, 1, 4, 5, 1, 5, 2]);

        assert_rotated_eq!(out.windings[polygons[0]].clone(), vec![0, 1, 2, 3]);
        assert_rotated_eq!(out.windings[polygons[1]].clone(), vec![1, 4, 5, 2]);
        assert_eq!(out.neighbors_of(polygons[0]).collect::<Vec<_>>(), [polygons[1]]);
        assert_eq!(out.num_border_edges(), 6);
    }

    #[test]
    fn uv_seam_splits_uvs_but_not_positions() {
        // Two quads sharing an edge, but with different UVs along it.
        let mut store = GeometryStore::new();
        let quad = |x: f64, u0: f64| {
            let c = |dx: f64, y: f64, du: f64| uv_corner(x + dx, y, 0.0, u0 + du, y);
            vec![
                [c(0.0, 0.0, 0.0), c(1.0, 0.0, 0.5), c(1.0, 1.0, 0.5)],
                [c(0.0, 0.0, 0.0), c(1.0, 1.0, 0.5), c(0.0, 1.0, 0.0)],
            ]
        };
        store.add_polygon(quad(0.0, 0.0));
        store.add_polygon(quad(1.0, 0.0));
        let out = reconstruct(&store, Options::default());

        // (1, 0) and (1, 1) carry u = 0.5 on the left and u = 0.0 on the
        // right side.
        assert_eq!(out.num_positions(), 6);
        assert_eq!(out.uvs.len(), 8);

        for (t, _) in store.triangles() {
            for (&c, (pos, uvs)) in store.triangle(t).corners.iter().zip(&out.expand_triangle(&store, t)) {
                assert_eq!(*pos, store.position(c));
                assert_eq!(**uvs, store.corner(c).uvs);
            }
        }

        for uv in &out.uvs {
            assert!(uv.uvs.get(UvSet(0)).is_some());
            assert!((uv.position as usize) < out.num_positions());
        }
        assert_eq!(out.uvs[0].uvs.get(UvSet(0)), Some(Point2::new(0.0, 0.0)));
    }
}
