//! Edge/boundary builder: derives the ordered boundary cycle of every
//! polygon from its triangles.
//!
//! Inside one polygon, an edge whose reverse was already seen is an internal
//! diagonal of the triangulation; both directions cancel out. Whatever is
//! left is the boundary, which is then stitched into one cycle by following
//! "the edge that starts where the previous one ended". Matching inside a
//! polygon is done by position: the triangles of a triangle soup never share
//! corners, not even within one polygon.

use failure::Fail;
use log::warn;
use smallvec::SmallVec;

use crate::{
    handle::{hsize, CornerHandle, EdgeHandle, PolygonHandle, TriangleHandle},
    map::{DenseMap, FxHashMap},
    math::{is_finite, PosKey},
    store::GeometryStore,
};


/// One directed boundary traversal step of a polygon.
///
/// `start` and `end` are corners of the same triangle. Edges are never
/// compared by their corners across polygons, only by their positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub polygon: PolygonHandle,
    pub start: CornerHandle,
    pub end: CornerHandle,
}

/// Reasons why the triangles of a polygon do not reduce to one closed
/// boundary cycle.
///
/// A malformed polygon is not welded to anything; all its boundary edges
/// stay borders.
#[derive(Debug, Clone, PartialEq, Eq, Fail)]
pub enum MalformedPolygon {
    #[fail(display = "polygon has no triangles or all its edges cancel out")]
    Empty,

    #[fail(display = "corner {:?} has a non-finite position", _0)]
    NonFinitePosition(CornerHandle),

    #[fail(display = "triangle {:?} has a zero-length edge", _0)]
    DegenerateTriangle(TriangleHandle),

    #[fail(display = "edge {:?} -> {:?} appears twice in the same direction", from, to)]
    DuplicateEdge { from: PosKey, to: PosKey },

    #[fail(display = "two boundary edges start at {:?}", _0)]
    BranchingBoundary(PosKey),

    #[fail(display = "two boundary edges end at {:?}", _0)]
    MergingBoundary(PosKey),

    #[fail(display = "boundary is not closed: no edge continues at {:?}", _0)]
    OpenBoundary(PosKey),

    #[fail(display = "boundary consists of {} separate loops", loops)]
    MultipleLoops { loops: usize },
}

/// The boundary of one polygon.
#[derive(Debug, Clone, Default)]
struct PolygonBoundary {
    /// In winding order if the polygon is well formed, in discovery order
    /// otherwise.
    edges: SmallVec<[EdgeHandle; 4]>,
    by_start: FxHashMap<PosKey, EdgeHandle>,
    malformed: Option<MalformedPolygon>,
}

/// Boundary edges of all polygons.
#[derive(Debug, Clone, Default)]
pub struct Boundaries {
    edges: DenseMap<EdgeHandle, Edge>,
    keys: DenseMap<EdgeHandle, (PosKey, PosKey)>,
    slots: DenseMap<EdgeHandle, u32>,
    polygons: DenseMap<PolygonHandle, PolygonBoundary>,
}

/// A boundary edge candidate that survived diagonal cancellation.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    from: PosKey,
    to: PosKey,
    start: CornerHandle,
    end: CornerHandle,
}

impl Boundaries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the boundaries of all polygons of `store` in one go.
    pub fn build(store: &GeometryStore) -> Self {
        let mut out = Self::new();
        for p in store.polygons() {
            // Malformed polygons are recorded inside `out`.
            let _ = out.add_polygon(store, p);
        }
        out
    }

    /// Derives the boundary of polygon `p`. Polygons have to be added in
    /// input order.
    ///
    /// If the polygon is malformed, the error is returned and also stored.
    /// Its boundary edges are then still recorded (in discovery order) if
    /// diagonal cancellation succeeded.
    pub fn add_polygon(
        &mut self,
        store: &GeometryStore,
        p: PolygonHandle,
    ) -> Result<(), MalformedPolygon> {
        assert_eq!(
            self.polygons.next_push_handle(),
            p,
            "bug: polygons have to be added in input order",
        );

        let mut boundary = PolygonBoundary::default();
        let result = boundary_candidates(store, p).and_then(|candidates| {
            match stitch(&candidates) {
                Ok(order) => {
                    for (slot, &i) in order.iter().enumerate() {
                        let e = self.push_edge(p, &candidates[i], slot);
                        boundary.edges.push(e);
                        boundary.by_start.insert(candidates[i].from, e);
                    }
                    Ok(())
                }
                Err(err) => {
                    for (slot, c) in candidates.iter().enumerate() {
                        boundary.edges.push(self.push_edge(p, c, slot));
                    }
                    Err(err)
                }
            }
        });

        if let Err(err) = &result {
            warn!("polygon {:?} is malformed and will not be welded: {}", p, err);
            boundary.malformed = Some(err.clone());
        }
        self.polygons.push(boundary);

        result
    }

    fn push_edge(&mut self, polygon: PolygonHandle, c: &Candidate, slot: usize) -> EdgeHandle {
        self.keys.push((c.from, c.to));
        self.slots.push(slot as u32);
        self.edges.push(Edge {
            polygon,
            start: c.start,
            end: c.end,
        })
    }

    pub fn num_edges(&self) -> hsize {
        self.edges.num_elements()
    }

    pub fn num_polygons(&self) -> hsize {
        self.polygons.num_elements()
    }

    pub fn edge(&self, e: EdgeHandle) -> &Edge {
        &self.edges[e]
    }

    /// Iterates over all edges, polygon by polygon, each polygon in winding
    /// order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeHandle, &Edge)> + '_ {
        self.edges.iter()
    }

    /// The start and end position of `e`.
    pub fn positions(&self, e: EdgeHandle) -> (PosKey, PosKey) {
        self.keys[e]
    }

    /// The boundary edges of `p`, in winding order if `p` is well formed.
    pub fn edges_of(&self, p: PolygonHandle) -> &[EdgeHandle] {
        &self.polygons[p].edges
    }

    pub fn is_well_formed(&self, p: PolygonHandle) -> bool {
        self.polygons[p].malformed.is_none()
    }

    pub fn malformed(&self, p: PolygonHandle) -> Option<&MalformedPolygon> {
        self.polygons[p].malformed.as_ref()
    }

    /// Returns the boundary edge of `p` that starts at `pos`, if any. Always
    /// `None` for malformed polygons.
    pub fn edge_starting_at(&self, p: PolygonHandle, pos: PosKey) -> Option<EdgeHandle> {
        self.polygons[p].by_start.get(&pos).copied()
    }

    /// The edge before `e` in the boundary cycle of its polygon.
    pub fn prev_in_cycle(&self, e: EdgeHandle) -> EdgeHandle {
        let edges = self.edges_of(self.edges[e].polygon);
        let slot = self.slots[e] as usize;
        edges[(slot + edges.len() - 1) % edges.len()]
    }

    /// The edge after `e` in the boundary cycle of its polygon.
    pub fn next_in_cycle(&self, e: EdgeHandle) -> EdgeHandle {
        let edges = self.edges_of(self.edges[e].polygon);
        let slot = self.slots[e] as usize;
        edges[(slot + 1) % edges.len()]
    }

    /// The positions right before and right after `e` in the winding order
    /// of its polygon: the start of the previous edge and the end of the
    /// next edge.
    pub fn flanking_positions(&self, e: EdgeHandle) -> (PosKey, PosKey) {
        let (before, _) = self.keys[self.prev_in_cycle(e)];
        let (_, after) = self.keys[self.next_in_cycle(e)];
        (before, after)
    }
}

/// Cancels all internal diagonals of `p` and returns the remaining edges in
/// discovery order.
fn boundary_candidates(
    store: &GeometryStore,
    p: PolygonHandle,
) -> Result<Vec<Candidate>, MalformedPolygon> {
    let triangles = store.triangles_of(p);
    if triangles.is_empty() {
        return Err(MalformedPolygon::Empty);
    }

    // Cancelled entries are set to `None` to keep the indices in `lookup`
    // valid.
    let mut open: Vec<Option<Candidate>> = Vec::with_capacity(triangles.len() * 3);
    let mut lookup: FxHashMap<(PosKey, PosKey), usize> = FxHashMap::default();

    for &t in triangles {
        let corners = store.triangle(t).corners;
        if let Some(&c) = corners.iter().find(|&&c| !is_finite(store.position(c))) {
            return Err(MalformedPolygon::NonFinitePosition(c));
        }

        for i in 0..3 {
            let start = corners[i];
            let end = corners[(i + 1) % 3];
            let from = PosKey::from(store.position(start));
            let to = PosKey::from(store.position(end));

            if from == to {
                return Err(MalformedPolygon::DegenerateTriangle(t));
            }

            if let Some(idx) = lookup.remove(&(to, from)) {
                // Diagonal: the reverse edge belongs to another triangle of
                // this polygon.
                open[idx] = None;
            } else if lookup.contains_key(&(from, to)) {
                return Err(MalformedPolygon::DuplicateEdge { from, to });
            } else {
                lookup.insert((from, to), open.len());
                open.push(Some(Candidate { from, to, start, end }));
            }
        }
    }

    Ok(open.into_iter().flatten().collect())
}

/// Orders the boundary candidates into one closed cycle. Returns indices
/// into `candidates`.
fn stitch(candidates: &[Candidate]) -> Result<Vec<usize>, MalformedPolygon> {
    if candidates.is_empty() {
        return Err(MalformedPolygon::Empty);
    }

    let mut by_start = FxHashMap::default();
    for (i, c) in candidates.iter().enumerate() {
        if by_start.insert(c.from, i).is_some() {
            return Err(MalformedPolygon::BranchingBoundary(c.from));
        }
    }

    let mut order = Vec::with_capacity(candidates.len());
    let mut visited = vec![false; candidates.len()];
    let mut loops = 0;
    for first in 0..candidates.len() {
        if visited[first] {
            continue;
        }

        loops += 1;
        let mut current = first;
        loop {
            visited[current] = true;
            if loops == 1 {
                order.push(current);
            }

            let to = candidates[current].to;
            let next = match by_start.get(&to) {
                Some(&next) => next,
                None => return Err(MalformedPolygon::OpenBoundary(to)),
            };
            if next == first {
                break;
            }
            if visited[next] {
                return Err(MalformedPolygon::MergingBoundary(to));
            }
            current = next;
        }
    }

    if loops > 1 {
        Err(MalformedPolygon::MultipleLoops { loops })
    } else {
        Ok(order)
    }
}
