//! Exact position keys.
//!
//! Floating point numbers are neither `Eq` nor `Hash`. Where positions have
//! to be matched (diagonal cancellation inside a polygon, edge matching
//! across polygons) they are converted into a [`PosKey`] first. Matching is
//! exact: two positions are equal if all components compare equal, with
//! `-0.0 == 0.0`.

use std::fmt;

use cgmath::{Point2, Point3};
use ordered_float::OrderedFloat;


/// A hashable key representing one exact 3D position.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PosKey([OrderedFloat<f64>; 3]);

impl PosKey {
    pub fn to_point3(self) -> Point3<f64> {
        let [x, y, z] = self.0;
        Point3::new(x.0, y.0, z.0)
    }
}

impl From<Point3<f64>> for PosKey {
    fn from(p: Point3<f64>) -> Self {
        PosKey([OrderedFloat(p.x), OrderedFloat(p.y), OrderedFloat(p.z)])
    }
}

impl fmt::Debug for PosKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [x, y, z] = self.0;
        write!(f, "({}, {}, {})", x.0, y.0, z.0)
    }
}

/// A hashable key representing one exact UV coordinate pair.
pub type UvKey = [OrderedFloat<f64>; 2];

pub fn uv_key(uv: Point2<f64>) -> UvKey {
    [OrderedFloat(uv.x), OrderedFloat(uv.y)]
}

/// Returns `true` if all components of `p` are finite.
pub fn is_finite(p: Point3<f64>) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matching() {
        let a = PosKey::from(Point3::new(1.0, 2.0, 3.0));
        let b = PosKey::from(Point3::new(1.0, 2.0, 3.0));
        let c = PosKey::from(Point3::new(1.0, 2.0, 3.000_000_1));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_point3(), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn signed_zero() {
        let a = PosKey::from(Point3::new(0.0, 0.0, 0.0));
        let b = PosKey::from(Point3::new(-0.0, 0.0, -0.0));
        assert_eq!(a, b);

        let mut set = fxhash::FxHashSet::default();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn finite() {
        assert!(is_finite(Point3::new(1.0, -4.0, 0.0)));
        assert!(!is_finite(Point3::new(1.0, std::f64::NAN, 0.0)));
        assert!(!is_finite(Point3::new(std::f64::INFINITY, 0.0, 0.0)));
    }
}
