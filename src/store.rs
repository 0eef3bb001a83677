//! The geometry record store: triangle soup organized as polygons.
//!
//! This is the input of the reconstruction. Every polygon owns its
//! triangles, every triangle owns three corners, and no data is shared
//! between triangles, not even between two triangles of the same polygon.
//! All iteration happens in insertion order, which is the traversal order
//! used by the whole pipeline.

use std::{fmt, iter::FromIterator};

use cgmath::{Point2, Point3, Vector3, Vector4};
use derive_more::{Display, From, Into};
use smallvec::SmallVec;

use crate::{
    handle::{hsize, CornerHandle, Handle, PolygonHandle, TriangleHandle},
    map::DenseMap,
    math::{uv_key, UvKey},
};


/// The index of one UV set ("texture coordinate channel").
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct UvSet(pub u32);

/// A small map from UV set to UV coordinates, sorted by UV set.
///
/// Most corners have zero or one UV set, so the entries are stored inline.
#[derive(Clone, Default, PartialEq)]
pub struct UvMap(SmallVec<[(UvSet, Point2<f64>); 1]>);

impl UvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the coordinates for `set`, returning the old ones if there were
    /// any.
    pub fn insert(&mut self, set: UvSet, uv: Point2<f64>) -> Option<Point2<f64>> {
        match self.0.binary_search_by_key(&set, |&(s, _)| s) {
            Ok(pos) => Some(std::mem::replace(&mut self.0[pos].1, uv)),
            Err(pos) => {
                self.0.insert(pos, (set, uv));
                None
            }
        }
    }

    pub fn get(&self, set: UvSet) -> Option<Point2<f64>> {
        self.0.binary_search_by_key(&set, |&(s, _)| s)
            .ok()
            .map(|pos| self.0[pos].1)
    }

    /// Iterates over all entries in order of increasing UV set.
    pub fn iter(&self) -> impl Iterator<Item = (UvSet, Point2<f64>)> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an exact, hashable representation of all entries.
    pub(crate) fn key(&self) -> SmallVec<[(UvSet, UvKey); 1]> {
        self.iter().map(|(set, uv)| (set, uv_key(uv))).collect()
    }
}

impl FromIterator<(UvSet, Point2<f64>)> for UvMap {
    fn from_iter<I: IntoIterator<Item = (UvSet, Point2<f64>)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (set, uv) in iter {
            out.insert(set, uv);
        }
        out
    }
}

impl fmt::Debug for UvMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(set, uv)| (set.0, (uv.x, uv.y))))
            .finish()
    }
}

/// One triangle-vertex instance with all its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Corner {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
    pub color: Vector4<f64>,
    pub uvs: UvMap,
}

impl Corner {
    /// A corner at `position` with a zero normal, opaque white color and no
    /// UVs.
    pub fn at(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: Vector3::new(0.0, 0.0, 0.0),
            color: Vector4::new(1.0, 1.0, 1.0, 1.0),
            uvs: UvMap::new(),
        }
    }

    pub fn with_normal(mut self, normal: Vector3<f64>) -> Self {
        self.normal = normal;
        self
    }

    pub fn with_color(mut self, color: Vector4<f64>) -> Self {
        self.color = color;
        self
    }

    pub fn with_uv(mut self, set: impl Into<UvSet>, uv: Point2<f64>) -> Self {
        self.uvs.insert(set.into(), uv);
        self
    }
}

/// An ordered triple of corners, owned by exactly one polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub polygon: PolygonHandle,
    pub corners: [CornerHandle; 3],
}

/// An n-gon face made of triangles.
#[derive(Debug, Clone, Default)]
pub struct Polygon {
    triangles: SmallVec<[TriangleHandle; 2]>,
}

impl Polygon {
    pub fn triangles(&self) -> &[TriangleHandle] {
        &self.triangles
    }
}

/// Triangle soup, organized as polygons → triangles → corners.
///
/// The store is append-only. The reconstruction only ever borrows it
/// immutably, so an abandoned reconstruction leaves it untouched.
#[derive(Debug, Clone, Default)]
pub struct GeometryStore {
    polygons: DenseMap<PolygonHandle, Polygon>,
    triangles: DenseMap<TriangleHandle, Triangle>,
    corners: DenseMap<CornerHandle, Corner>,
    corner_owner: DenseMap<CornerHandle, TriangleHandle>,
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a polygon made of the given triangles. Every corner passed in
    /// becomes a new, distinct corner, even if it equals another one.
    pub fn add_polygon<I>(&mut self, triangles: I) -> PolygonHandle
    where
        I: IntoIterator<Item = [Corner; 3]>,
    {
        let polygon = self.polygons.next_push_handle();
        let mut out = Polygon::default();

        for [a, b, c] in triangles {
            let triangle = self.triangles.next_push_handle();
            let corners = [
                self.push_corner(a, triangle),
                self.push_corner(b, triangle),
                self.push_corner(c, triangle),
            ];
            self.triangles.push(Triangle { polygon, corners });
            out.triangles.push(triangle);
        }

        self.polygons.push(out)
    }

    /// Adds a polygon given by its boundary corners in winding order,
    /// triangulated as a fan around the first corner. Each triangle gets
    /// its own copy of the corner data, like any triangle soup.
    ///
    /// Fewer than three corners result in a polygon without triangles.
    pub fn add_polygon_from_fan(&mut self, corners: &[Corner]) -> PolygonHandle {
        let triangles = (1..corners.len().saturating_sub(1)).map(|i| [
            corners[0].clone(),
            corners[i].clone(),
            corners[i + 1].clone(),
        ]);
        self.add_polygon(triangles)
    }

    fn push_corner(&mut self, corner: Corner, owner: TriangleHandle) -> CornerHandle {
        self.corner_owner.push(owner);
        self.corners.push(corner)
    }

    pub fn num_polygons(&self) -> hsize {
        self.polygons.num_elements()
    }

    pub fn num_triangles(&self) -> hsize {
        self.triangles.num_elements()
    }

    pub fn num_corners(&self) -> hsize {
        self.corners.num_elements()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Iterates over all polygon handles in input order.
    pub fn polygons(&self) -> impl Iterator<Item = PolygonHandle> + '_ {
        self.polygons.handles()
    }

    /// The `n`-th polygon in input order.
    pub fn nth_polygon(&self, n: usize) -> PolygonHandle {
        PolygonHandle::from_usize(n)
    }

    pub fn polygon(&self, p: PolygonHandle) -> &Polygon {
        &self.polygons[p]
    }

    pub fn triangle(&self, t: TriangleHandle) -> &Triangle {
        &self.triangles[t]
    }

    pub fn corner(&self, c: CornerHandle) -> &Corner {
        &self.corners[c]
    }

    pub fn position(&self, c: CornerHandle) -> Point3<f64> {
        self.corners[c].position
    }

    pub fn triangles_of(&self, p: PolygonHandle) -> &[TriangleHandle] {
        self.polygons[p].triangles()
    }

    /// Iterates over all corners of `p` in (triangle, winding) order.
    pub fn corners_of(&self, p: PolygonHandle) -> impl Iterator<Item = CornerHandle> + '_ {
        self.triangles_of(p).iter().flat_map(move |&t| self.triangles[t].corners.iter().copied())
    }

    pub fn triangle_of(&self, c: CornerHandle) -> TriangleHandle {
        self.corner_owner[c]
    }

    pub fn polygon_of(&self, c: CornerHandle) -> PolygonHandle {
        self.triangles[self.corner_owner[c]].polygon
    }

    /// Iterates over all triangles in input order.
    pub fn triangles(&self) -> impl Iterator<Item = (TriangleHandle, &Triangle)> + '_ {
        self.triangles.iter()
    }

    /// Iterates over all corners in input order.
    pub fn corners(&self) -> impl Iterator<Item = (CornerHandle, &Corner)> + '_ {
        self.corners.iter()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Corner {
        Corner::at(Point3::new(x, y, 0.0))
    }

    #[test]
    fn add_polygon() {
        let mut store = GeometryStore::new();
        let quad = store.add_polygon(vec![
            [p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)],
            [p(0.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)],
        ]);
        let tri = store.add_polygon(vec![[p(1.0, 0.0), p(2.0, 0.0), p(1.0, 1.0)]]);

        assert_eq!(store.num_polygons(), 2);
        assert_eq!(store.num_triangles(), 3);
        assert_eq!(store.num_corners(), 9);
        assert_eq!(store.polygons().collect::<Vec<_>>(), [quad, tri]);
        assert_eq!(store.nth_polygon(1), tri);

        // Corners are never shared, even at equal positions.
        let corners = store.corners_of(quad).collect::<Vec<_>>();
        assert_eq!(corners.len(), 6);
        assert_ne!(corners[0], corners[3]);
        assert_eq!(store.position(corners[0]), store.position(corners[3]));

        for &c in &corners {
            assert_eq!(store.polygon_of(c), quad);
        }
        assert_eq!(store.triangle(store.triangle_of(corners[4])).corners[1], corners[4]);
    }

    #[test]
    fn fan() {
        let mut store = GeometryStore::new();
        let pentagon = store.add_polygon_from_fan(&[
            p(0.0, 0.0), p(1.0, 0.0), p(1.5, 1.0), p(0.5, 1.5), p(-0.5, 1.0),
        ]);
        assert_eq!(store.triangles_of(pentagon).len(), 3);

        let degenerate = store.add_polygon_from_fan(&[p(0.0, 0.0), p(1.0, 0.0)]);
        assert!(store.triangles_of(degenerate).is_empty());
    }

    #[test]
    fn uv_map() {
        let mut uvs = UvMap::new();
        assert!(uvs.is_empty());
        assert_eq!(uvs.insert(UvSet(2), Point2::new(0.5, 0.5)), None);
        assert_eq!(uvs.insert(UvSet(0), Point2::new(0.0, 1.0)), None);
        assert_eq!(
            uvs.insert(UvSet(2), Point2::new(0.25, 0.5)),
            Some(Point2::new(0.5, 0.5)),
        );

        assert_eq!(uvs.len(), 2);
        assert_eq!(uvs.get(UvSet(2)), Some(Point2::new(0.25, 0.5)));
        assert_eq!(uvs.get(UvSet(1)), None);
        assert_eq!(
            uvs.iter().map(|(set, _)| set).collect::<Vec<_>>(),
            [UvSet(0), UvSet(2)],
        );

        let same: UvMap = vec![
            (UvSet(2), Point2::new(0.25, 0.5)),
            (UvSet(0), Point2::new(0.0, 1.0)),
        ].into_iter().collect();
        assert_eq!(uvs, same);
        assert_eq!(uvs.key(), same.key());
    }
}
