use std::mem;

use smallvec::SmallVec;

use crate::handle::{hsize, Handle};
use super::DenseMap;


/// Member list of one class. Most classes (vertices with a small valence,
/// edges with two sides) fit inline.
pub type Members<H> = SmallVec<[H; 4]>;

/// A union-find (disjoint set) structure over handles that also knows the
/// members of every class.
///
/// Plain union-find can only answer "which class is this element in?". The
/// welding code also needs to iterate over all members of a class and to
/// split classes again, so every class additionally owns the list of its
/// members.
///
/// Every element points directly to the representative of its class, which
/// owns the member list. On a merge, the members of the smaller class are
/// repointed, so each element is moved at most `log n` times.
///
/// Determinism: the *root* of a class, which is what the public methods
/// hand out, is always its member with the smallest handle index, no matter
/// which element represents the class internally. Member lists start with
/// the members of the larger class of a merge.
#[derive(Clone, Debug)]
pub struct UnionFind<H: Handle> {
    representative: DenseMap<H, H>,
    /// Only meaningful for representatives.
    members: DenseMap<H, Members<H>>,
    /// Only meaningful for representatives.
    smallest: DenseMap<H, H>,
    num_classes: hsize,
}

impl<H: Handle> UnionFind<H> {
    /// Creates a structure with the elements `0..count`, each in its own
    /// class.
    pub fn singletons(count: usize) -> Self {
        let mut representative = DenseMap::with_capacity(count);
        let mut members = DenseMap::with_capacity(count);
        for i in 0..count {
            let h = H::from_usize(i);
            representative.push(h);
            members.push(std::iter::once(h).collect());
        }

        Self {
            smallest: representative.clone(),
            representative,
            members,
            num_classes: count as hsize,
        }
    }

    /// Number of elements (not classes).
    pub fn num_elements(&self) -> hsize {
        self.representative.num_elements()
    }

    pub fn num_classes(&self) -> hsize {
        self.num_classes
    }

    /// Returns the root (smallest member) of the class containing `h`.
    pub fn root_of(&self, h: H) -> H {
        self.smallest[self.representative[h]]
    }

    /// Returns `true` if `a` and `b` are in the same class.
    pub fn same_class(&self, a: H, b: H) -> bool {
        self.representative[a] == self.representative[b]
    }

    /// Merges the classes of `a` and `b`. Returns `false` if they already
    /// were in the same class.
    pub fn union(&mut self, a: H, b: H) -> bool {
        let ra = self.representative[a];
        let rb = self.representative[b];
        if ra == rb {
            return false;
        }

        let (len_a, len_b) = (self.members[ra].len(), self.members[rb].len());
        let a_absorbs = len_a > len_b || (len_a == len_b && self.smallest[ra] < self.smallest[rb]);
        let (big, small) = if a_absorbs { (ra, rb) } else { (rb, ra) };

        let absorbed = mem::take(&mut self.members[small]);
        for &m in &absorbed {
            self.representative[m] = big;
        }
        self.members[big].extend(absorbed);
        if self.smallest[small] < self.smallest[big] {
            self.smallest[big] = self.smallest[small];
        }
        self.num_classes -= 1;

        true
    }

    /// Returns the members of the class with the given root.
    ///
    /// Panics in debug mode if `root` is not a root.
    pub fn members(&self, root: H) -> &[H] {
        debug_assert!(self.is_root(root), "bug: {:?} is not a root", root);
        self.class_of(root)
    }

    /// Returns the members of the class containing `h`.
    pub fn class_of(&self, h: H) -> &[H] {
        &self.members[self.representative[h]]
    }

    /// Number of members of the class containing `h`.
    pub fn class_len(&self, h: H) -> usize {
        self.class_of(h).len()
    }

    pub fn is_root(&self, h: H) -> bool {
        self.root_of(h) == h
    }

    /// Iterates over all roots in order of increasing index.
    pub fn roots(&self) -> impl Iterator<Item = H> + '_ {
        self.representative.handles().filter(move |&h| self.is_root(h))
    }

    /// Dissolves the class containing `h`: every former member becomes a
    /// class of its own. Returns the former members.
    pub fn isolate(&mut self, h: H) -> Members<H> {
        let old = mem::take(&mut self.members[self.representative[h]]);
        for &m in &old {
            self.representative[m] = m;
            self.members[m] = std::iter::once(m).collect();
            self.smallest[m] = m;
        }
        self.num_classes += old.len() as hsize - 1;

        old
    }
}
