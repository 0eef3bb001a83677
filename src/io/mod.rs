//! Reading triangle soup from files.
//!
//! Currently only STL is supported: it is the prototypical "locked" format
//! that stores nothing but unconnected triangles.

pub mod stl;
