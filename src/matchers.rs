//! Compact predicates over code units, one per DFA transition.
//!
//! A matcher is built once from a `CharSet` and then only ever asked
//! `matches(c)`. Every variant answers in constant time, except `Composite`,
//! which is linear in the number of its parts (never in the size of the set).

use std::fmt;

use crate::charset::{CharSet, Interval};

#[derive(Clone, PartialEq, Eq)]
pub enum MatcherKind {
    Single(u16),
    Range(Interval),
    /// Code units `high_byte << 8 | b` for every bit `b` set in `bits`.
    BitSet { high_byte: u8, bits: [u64; 4] },
    /// `BitSet` with a zero high byte: only the bounds check remains.
    NullHighByteBitSet { bits: [u64; 4] },
    /// Disjoint parts, first match wins.
    Composite(Vec<CharMatcher>),
}

#[derive(Clone, PartialEq, Eq)]
pub struct CharMatcher {
    invert: bool,
    kind: MatcherKind,
}

fn bit_test(bits: &[u64; 4], low: u8) -> bool {
    bits[usize::from(low >> 6)] & (1u64 << (low & 63)) != 0
}

impl MatcherKind {
    fn matches(&self, c: u16) -> bool {
        match self {
            MatcherKind::Single(x) => c == *x,
            MatcherKind::Range(r) => r.contains(c),
            MatcherKind::BitSet { high_byte, bits } => (c >> 8) as u8 == *high_byte && bit_test(bits, c as u8),
            MatcherKind::NullHighByteBitSet { bits } => c < 256 && bit_test(bits, c as u8),
            MatcherKind::Composite(parts) => parts.iter().any(|m| m.matches(c)),
        }
    }

    /// Rough number of comparisons per test.
    fn cost(&self) -> usize {
        match self {
            MatcherKind::Single(_) | MatcherKind::NullHighByteBitSet { .. } => 1,
            MatcherKind::Range(_) | MatcherKind::BitSet { .. } => 2,
            MatcherKind::Composite(parts) => 1 + parts.iter().map(CharMatcher::cost).sum::<usize>(),
        }
    }
}

impl CharMatcher {
    /// Build the cheapest matcher for `set`, possibly as the inversion of a
    /// matcher for its complement.
    pub fn build(set: &CharSet) -> CharMatcher {
        let direct = CharMatcher {
            invert: false,
            kind: build_kind(set.intervals()),
        };
        let complement = set.complement();
        let inverted = CharMatcher {
            invert: true,
            kind: build_kind(complement.intervals()),
        };
        if inverted.cost() < direct.cost() {
            inverted
        } else {
            direct
        }
    }

    pub fn matches(&self, c: u16) -> bool {
        self.kind.matches(c) != self.invert
    }

    pub fn cost(&self) -> usize {
        self.kind.cost() + usize::from(self.invert)
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    pub fn kind(&self) -> &MatcherKind {
        &self.kind
    }

    /// The one code unit this matcher accepts, if that is all it accepts.
    pub fn single_char(&self) -> Option<u16> {
        match self.kind {
            MatcherKind::Single(c) if !self.invert => Some(c),
            _ => None,
        }
    }
}

/// Split intervals into runs: a run of intervals confined to one high byte
/// becomes a bitset, anything spanning high bytes stays a range.
fn build_kind(intervals: &[Interval]) -> MatcherKind {
    match intervals {
        [] => return MatcherKind::Composite(Vec::new()),
        [r] if r.is_single() => return MatcherKind::Single(r.lo),
        [r] => return MatcherKind::Range(*r),
        _ => {}
    }
    let mut parts: Vec<MatcherKind> = Vec::new();
    let mut run: Vec<Interval> = Vec::new();
    let flush = |run: &[Interval], parts: &mut Vec<MatcherKind>| match run {
        [] => {}
        [r] if r.is_single() => parts.push(MatcherKind::Single(r.lo)),
        [r] => parts.push(MatcherKind::Range(*r)),
        _ => {
            let high_byte = (run[0].lo >> 8) as u8;
            let mut bits = [0u64; 4];
            for r in run.iter() {
                for c in r.lo..=r.hi {
                    let low = c as u8;
                    bits[usize::from(low >> 6)] |= 1u64 << (low & 63);
                }
            }
            parts.push(if high_byte == 0 {
                MatcherKind::NullHighByteBitSet { bits }
            } else {
                MatcherKind::BitSet { high_byte, bits }
            });
        }
    };
    for &r in intervals {
        let confined = r.lo >> 8 == r.hi >> 8;
        let joins = confined && run.first().is_some_and(|first| first.lo >> 8 == r.lo >> 8);
        if !joins {
            flush(&run, &mut parts);
            run.clear();
        }
        if confined {
            run.push(r);
        } else {
            parts.push(if r.is_single() { MatcherKind::Single(r.lo) } else { MatcherKind::Range(r) });
        }
    }
    flush(&run, &mut parts);
    match parts.len() {
        1 => parts.remove(0),
        _ => MatcherKind::Composite(
            parts
                .into_iter()
                .map(|kind| CharMatcher { invert: false, kind })
                .collect(),
        ),
    }
}

impl fmt::Debug for CharMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invert {
            write!(f, "!")?;
        }
        match &self.kind {
            MatcherKind::Single(c) => write!(f, "{c:#06x}"),
            MatcherKind::Range(r) => write!(f, "{:#06x}-{:#06x}", r.lo, r.hi),
            MatcherKind::BitSet { high_byte, .. } => write!(f, "bitset({high_byte:#04x})"),
            MatcherKind::NullHighByteBitSet { .. } => write!(f, "bitset(0x00)"),
            MatcherKind::Composite(parts) => f.debug_list().entries(parts).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset;
    use quickcheck::quickcheck;

    fn naive(intervals: &[(u16, u16)], c: u16) -> bool {
        intervals.iter().any(|&(a, b)| a.min(b) <= c && c <= a.max(b))
    }

    fn set_of(intervals: &[(u16, u16)]) -> CharSet {
        CharSet::from_intervals(intervals.iter().map(|&(a, b)| Interval::new(a, b)).collect())
    }

    fn assert_exhaustive(set: &CharSet) {
        let m = CharMatcher::build(set);
        for c in 0..=u16::MAX {
            assert_eq!(m.matches(c), set.contains(c), "{m:?} disagrees on {c:#06x}");
        }
    }

    #[test]
    fn chooses_cheap_representations() {
        assert_eq!(CharMatcher::build(&CharSet::single(b'a'.into())).single_char(), Some(u16::from(b'a')));
        assert!(matches!(
            CharMatcher::build(&CharSet::range(0x100, 0x2FF)).kind(),
            MatcherKind::Range(_)
        ));
        let vowels = set_of(&[(0x61, 0x61), (0x65, 0x65), (0x69, 0x69), (0x6F, 0x6F), (0x75, 0x75)]);
        assert!(matches!(
            CharMatcher::build(&vowels).kind(),
            MatcherKind::NullHighByteBitSet { .. }
        ));
        let greek = set_of(&[(0x391, 0x391), (0x3A3, 0x3A3), (0x3B1, 0x3B1)]);
        assert!(matches!(
            CharMatcher::build(&greek).kind(),
            MatcherKind::BitSet { high_byte: 3, .. }
        ));
        let not_newline = CharSet::single(0x0A).complement();
        let m = CharMatcher::build(&not_newline);
        assert!(m.is_inverted());
        assert!(!m.matches(0x0A) && m.matches(0x0B));
    }

    #[test]
    fn exhaustive_over_the_alphabet() {
        let sets = [
            CharSet::empty(),
            CharSet::full(),
            charset::digits(),
            charset::word_chars(),
            charset::word_chars().complement(),
            charset::white_space(),
            charset::line_terminators().complement(),
            CharSet::range(u16::from(b'a'), u16::from(b'z')).case_fold(false),
            set_of(&[(0xFF, 0x101), (0x1FF, 0x1FF), (0xFFFE, 0xFFFF)]),
        ];
        for set in &sets {
            assert_exhaustive(set);
        }
    }

    quickcheck! {
        fn agrees_with_interval_membership(intervals: Vec<(u16, u16)>, units: Vec<u16>) -> bool {
            let m = CharMatcher::build(&set_of(&intervals));
            units.iter().all(|&c| m.matches(c) == naive(&intervals, c))
        }

        fn agrees_near_boundaries(intervals: Vec<(u16, u16)>) -> bool {
            let m = CharMatcher::build(&set_of(&intervals));
            intervals.iter().all(|&(a, b)| {
                [a, b, a.wrapping_sub(1), b.wrapping_add(1)]
                    .iter()
                    .all(|&c| m.matches(c) == naive(&intervals, c))
            })
        }
    }
}
