use std::fmt;
use std::ops::Deref;
use std::slice::Iter;

/// A sparse set used for representing ordered NFA states.
///
/// This supports constant time addition and membership testing. Clearing an
/// entire set can also be done in constant time. Iteration yields elements
/// in the order in which they were inserted, which is the thread priority.
///
/// The data structure is based on: https://research.swtch.com/sparse
#[derive(Clone)]
pub struct SparseSet {
    /// Values in the order in which they were inserted.
    dense: Vec<usize>,
    /// `value` is in the set iff `sparse[value] < dense.len()` and
    /// `dense[sparse[value]] == value`.
    sparse: Box<[usize]>,
}

impl SparseSet {
    pub fn new(size: usize) -> Self {
        SparseSet {
            dense: Vec::with_capacity(size),
            sparse: vec![0usize; size].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.sparse.len()
    }

    /// Insert `value`; false if it was already present.
    pub fn insert(&mut self, value: usize) -> bool {
        if self.contains(value) {
            return false;
        }
        self.sparse[value] = self.dense.len();
        self.dense.push(value);
        true
    }

    pub fn contains(&self, value: usize) -> bool {
        let i = self.sparse[value];
        self.dense.get(i) == Some(&value)
    }

    pub fn clear(&mut self) {
        self.dense.clear();
    }
}

impl fmt::Debug for SparseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SparseSet({:?})", self.dense)
    }
}

impl Deref for SparseSet {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        &self.dense
    }
}

impl<'a> IntoIterator for &'a SparseSet {
    type Item = &'a usize;
    type IntoIter = Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.dense.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut set = SparseSet::new(10);
        assert!(set.insert(7));
        assert!(set.insert(2));
        assert!(!set.insert(7));
        assert_eq!(&*set, &[7, 2]);
        assert!(set.contains(2) && !set.contains(3));
    }

    #[test]
    fn clear_is_constant_time_reset() {
        let mut set = SparseSet::new(4);
        set.insert(3);
        set.clear();
        assert!(set.is_empty());
        assert!(!set.contains(3));
        assert!(set.insert(3));
    }
}
