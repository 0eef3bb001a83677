//! Rebuilds connectivity from triangle soup.
//!
//! Many export paths "lock" a mesh: every triangle is stored on its own and
//! all connectivity is gone. This crate takes such a soup, organized as
//! polygons made of triangles (a [`GeometryStore`]), and finds out which
//! corners are really the same vertex and which polygons share an edge. The
//! result ([`Reconstructed`]) is an indexed polygon mesh: one position per
//! merged vertex, per-polygon windings and per-edge neighbors.
//!
//! ```
//! use cgmath::Point3;
//! use thaw::{reconstruct, Corner, GeometryStore, Options};
//!
//! let c = |x, y| Corner::at(Point3::new(x, y, 0.0));
//! let mut store = GeometryStore::new();
//! store.add_polygon_from_fan(&[c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0), c(0.0, 1.0)]);
//! store.add_polygon_from_fan(&[c(1.0, 0.0), c(2.0, 0.0), c(2.0, 1.0), c(1.0, 1.0)]);
//!
//! let mesh = reconstruct(&store, Options::default());
//! assert_eq!(mesh.positions.len(), 6);
//! assert_eq!(mesh.num_border_edges(), 6);
//! ```
//!
//! For large inputs, [`Reconstruction`] runs the same work in bounded
//! batches with progress reports and cancellation.

#[cfg(test)]
#[macro_use]
mod test_utils;

pub mod adjacency;
pub mod boundary;
pub mod handle;
pub mod index;
pub mod map;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod repair;
pub mod store;
pub mod weld;

#[cfg(feature = "io")]
pub mod io;

pub use self::{
    handle::{hsize, CornerHandle, EdgeHandle, Handle, PolygonHandle, TriangleHandle},
    index::{CornerIndices, MergedUv, Reconstructed},
    pipeline::{
        reconstruct, CancelFlag, Diagnostics, Error, NoProgress, Options, Progress,
        ProgressSink, Reconstruction, Stage,
    },
    store::{Corner, GeometryStore, UvMap, UvSet},
};
