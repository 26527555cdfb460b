/// An indexable sequence of UTF-16 code units.
///
/// Every engine reads its input through this trait, so matching works the
/// same on slices, vectors and [`Utf16Str`].
pub trait CharSequence {
    fn len(&self) -> usize;

    /// The code unit at `index`. Callers guarantee `index < self.len()`.
    fn char_at(&self, index: usize) -> u16;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CharSequence for [u16] {
    fn len(&self) -> usize {
        <[u16]>::len(self)
    }

    fn char_at(&self, index: usize) -> u16 {
        self[index]
    }
}

impl CharSequence for Vec<u16> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn char_at(&self, index: usize) -> u16 {
        self[index]
    }
}

impl<T: CharSequence + ?Sized> CharSequence for &T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn char_at(&self, index: usize) -> u16 {
        (**self).char_at(index)
    }
}

/// A string re-encoded as UTF-16, so offsets agree with JavaScript's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utf16Str {
    units: Vec<u16>,
}

impl Utf16Str {
    pub fn new(text: &str) -> Self {
        Self {
            units: text.encode_utf16().collect(),
        }
    }

    pub fn units(&self) -> &[u16] {
        &self.units
    }

    /// Decode `start..end` back into a `String`, replacing lone surrogates.
    pub fn slice(&self, start: usize, end: usize) -> String {
        String::from_utf16_lossy(&self.units[start..end])
    }
}

impl From<&str> for Utf16Str {
    fn from(text: &str) -> Self {
        Utf16Str::new(text)
    }
}

impl CharSequence for Utf16Str {
    fn len(&self) -> usize {
        self.units.len()
    }

    fn char_at(&self, index: usize) -> u16 {
        self.units[index]
    }
}

/// Sized view of any sequence, for handing unsized inputs to trait objects.
pub(crate) struct DynSequence<'a, S: ?Sized>(pub &'a S);

impl<S: CharSequence + ?Sized> CharSequence for DynSequence<'_, S> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn char_at(&self, index: usize) -> u16 {
        self.0.char_at(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_offsets() {
        let s = Utf16Str::new("a😀b");
        assert_eq!(s.len(), 4);
        assert_eq!(s.char_at(3), u16::from(b'b'));
        assert_eq!(s.slice(1, 3), "😀");
    }

    #[test]
    fn slices_and_vectors_agree() {
        let v: Vec<u16> = "xyz".encode_utf16().collect();
        let slice: &[u16] = &v;
        assert_eq!(CharSequence::len(slice), CharSequence::len(&v));
        assert_eq!(slice.char_at(1), v.char_at(1));
        assert!(!CharSequence::is_empty(&v));
    }
}
