//! Maps and sets keyed by handles or by exact position keys.
//!
//! The welding code never keys anything by a geometric value unless it
//! explicitly wants position matching. Everything identity-related goes
//! through [`DenseMap`] (handle → value) and [`UnionFind`] (handle →
//! class).

mod dense;
mod union_find;

pub use fxhash::{FxHashMap, FxHashSet};

pub use self::{
    dense::DenseMap,
    union_find::{Members, UnionFind},
};
