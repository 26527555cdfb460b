//! Sets of UTF-16 code units.
//!
//! A `CharSet` is a sequence of non-overlapping, non-adjacent, sorted
//! intervals. Every constructor normalizes, so callers never observe a
//! non-canonical set and two sets are equal iff they contain the same
//! code units.

use std::cmp::{max, min};
use std::fmt;

use once_cell::sync::Lazy;

/// Largest code unit of the alphabet.
pub const MAX_CODE_UNIT: u16 = u16::MAX;

/// A closed interval `[lo, hi]` of code units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub lo: u16,
    pub hi: u16,
}

impl Interval {
    pub fn new(a: u16, b: u16) -> Self {
        if a <= b {
            Interval { lo: a, hi: b }
        } else {
            Interval { lo: b, hi: a }
        }
    }

    pub fn single(c: u16) -> Self {
        Interval { lo: c, hi: c }
    }

    /// Intersect this interval with another; `None` if they are disjoint.
    pub fn and(self, other: Self) -> Option<Self> {
        let (lo, hi) = (max(self.lo, other.lo), min(self.hi, other.hi));
        (lo <= hi).then_some(Interval { lo, hi })
    }

    /// Union two overlapping or adjacent intervals; `None` if there is a gap.
    pub fn or(self, other: Self) -> Option<Self> {
        let (lo, hi) = (max(self.lo, other.lo), min(self.hi, other.hi));
        if u32::from(lo) <= u32::from(hi) + 1 {
            Some(Interval {
                lo: min(self.lo, other.lo),
                hi: max(self.hi, other.hi),
            })
        } else {
            None
        }
    }

    pub fn contains(&self, c: u16) -> bool {
        self.lo <= c && c <= self.hi
    }

    pub fn len(&self) -> usize {
        usize::from(self.hi - self.lo) + 1
    }

    pub fn is_single(&self) -> bool {
        self.lo == self.hi
    }
}

/// A canonical set of code units.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharSet {
    ranges: Vec<Interval>,
}

impl CharSet {
    pub fn empty() -> Self {
        CharSet { ranges: Vec::new() }
    }

    pub fn full() -> Self {
        CharSet {
            ranges: vec![Interval::new(0, MAX_CODE_UNIT)],
        }
    }

    pub fn single(c: u16) -> Self {
        CharSet {
            ranges: vec![Interval::single(c)],
        }
    }

    pub fn range(lo: u16, hi: u16) -> Self {
        CharSet {
            ranges: vec![Interval::new(lo, hi)],
        }
    }

    pub fn from_intervals(mut ranges: Vec<Interval>) -> Self {
        ranges.sort_unstable();
        let mut canonical: Vec<Interval> = Vec::with_capacity(ranges.len());
        for r in ranges {
            match canonical.last_mut() {
                Some(last) => match last.or(r) {
                    Some(merged) => *last = merged,
                    None => canonical.push(r),
                },
                None => canonical.push(r),
            }
        }
        CharSet { ranges: canonical }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0] == Interval::new(0, MAX_CODE_UNIT)
    }

    /// The only member of a one-element set.
    pub fn single_char(&self) -> Option<u16> {
        match self.ranges.as_slice() {
            [r] if r.is_single() => Some(r.lo),
            _ => None,
        }
    }

    /// Number of code units in the set.
    pub fn size(&self) -> usize {
        self.ranges.iter().map(Interval::len).sum()
    }

    pub fn contains(&self, c: u16) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if r.hi < c {
                    std::cmp::Ordering::Less
                } else if r.lo > c {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn union(&self, other: &CharSet) -> CharSet {
        let mut all = self.ranges.clone();
        all.extend_from_slice(&other.ranges);
        CharSet::from_intervals(all)
    }

    pub fn intersect(&self, other: &CharSet) -> CharSet {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a, b) = (self.ranges[i], other.ranges[j]);
            if let Some(r) = a.and(b) {
                out.push(r);
            }
            if a.hi < b.hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        CharSet { ranges: out }
    }

    pub fn complement(&self) -> CharSet {
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        let mut next: u32 = 0;
        for r in &self.ranges {
            if u32::from(r.lo) > next {
                out.push(Interval::new(next as u16, r.lo - 1));
            }
            next = u32::from(r.hi) + 1;
        }
        if next <= u32::from(MAX_CODE_UNIT) {
            out.push(Interval::new(next as u16, MAX_CODE_UNIT));
        }
        CharSet { ranges: out }
    }

    pub fn subtract(&self, other: &CharSet) -> CharSet {
        self.intersect(&other.complement())
    }

    /// Close the set under case equivalence: every code unit whose
    /// canonical form equals the canonical form of a member is added. With
    /// `unicode` the canonical form is the simple case folding, otherwise the
    /// legacy upper-case mapping.
    pub fn case_fold(&self, unicode: bool) -> CharSet {
        let table = if unicode { &*UNICODE_CASE_TABLE } else { &*CASE_TABLE };
        let mut extra = Vec::new();
        for r in &self.ranges {
            let first = table.foldable.partition_point(|&c| c < r.lo);
            for &c in table.foldable[first..].iter().take_while(|&&c| c <= r.hi) {
                for &eq in table.equivalents(c) {
                    extra.push(Interval::single(eq));
                }
            }
        }
        if extra.is_empty() {
            return self.clone();
        }
        extra.extend_from_slice(&self.ranges);
        CharSet::from_intervals(extra)
    }
}

impl fmt::Debug for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for r in &self.ranges {
            if r.is_single() {
                write!(f, "{}", DisplayUnit(r.lo))?;
            } else {
                write!(f, "{}-{}", DisplayUnit(r.lo), DisplayUnit(r.hi))?;
            }
        }
        write!(f, "]")
    }
}

struct DisplayUnit(u16);

impl fmt::Display for DisplayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match char::from_u32(u32::from(self.0)) {
            Some(c) if c.is_ascii_graphic() => write!(f, "{c}"),
            _ => write!(f, "\\u{:04x}", self.0),
        }
    }
}

/// Canonical form used to compare code units case-insensitively.
pub fn canonicalize(c: u16, unicode: bool) -> u16 {
    if unicode {
        simple_fold(c)
    } else {
        upper_case(c)
    }
}

/// JavaScript's non-unicode `Canonicalize`: upper-case the code unit, unless
/// that yields several units or maps a non-ASCII unit onto ASCII.
fn upper_case(c: u16) -> u16 {
    let Some(ch) = char::from_u32(u32::from(c)) else {
        return c;
    };
    match single(ch.to_uppercase()) {
        Some(u) => {
            let u = u32::from(u);
            if u > 0xFFFF || (c >= 128 && u < 128) {
                c
            } else {
                u as u16
            }
        }
        None => c,
    }
}

/// Simple case folding of a BMP code unit: the lower case of its upper case,
/// so that every member of a case class lands on the same unit. Dotted and
/// dotless i only fold under Turkic rules and stay apart.
fn simple_fold(c: u16) -> u16 {
    if matches!(c, 0x0130 | 0x0131) {
        return c;
    }
    let Some(ch) = char::from_u32(u32::from(c)) else {
        return c;
    };
    let up = single(ch.to_uppercase()).unwrap_or(ch);
    match single(up.to_lowercase()) {
        Some(l) if u32::from(l) <= 0xFFFF => l as u16,
        _ => c,
    }
}

fn single(mut mapped: impl Iterator<Item = char>) -> Option<char> {
    match (mapped.next(), mapped.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

struct CaseTable {
    /// Code units that have at least one case equivalent, sorted.
    foldable: Vec<u16>,
    /// For each entry of `foldable`, the range of `members` holding its
    /// equivalence class.
    class_of: Vec<(u32, u32)>,
    members: Vec<u16>,
}

impl CaseTable {
    fn build(unicode: bool) -> Self {
        let mut by_canon: Vec<(u16, u16)> = (0..=MAX_CODE_UNIT).map(|c| (canonicalize(c, unicode), c)).collect();
        by_canon.sort_unstable();
        let mut members = Vec::new();
        let mut entries: Vec<(u16, (u32, u32))> = Vec::new();
        let mut i = 0;
        while i < by_canon.len() {
            let canon = by_canon[i].0;
            let mut j = i;
            while j < by_canon.len() && by_canon[j].0 == canon {
                j += 1;
            }
            if j - i > 1 {
                let start = members.len() as u32;
                members.extend(by_canon[i..j].iter().map(|&(_, c)| c));
                let span = (start, members.len() as u32);
                entries.extend(by_canon[i..j].iter().map(|&(_, c)| (c, span)));
            }
            i = j;
        }
        entries.sort_unstable();
        CaseTable {
            foldable: entries.iter().map(|&(c, _)| c).collect(),
            class_of: entries.iter().map(|&(_, span)| span).collect(),
            members,
        }
    }

    fn equivalents(&self, c: u16) -> &[u16] {
        match self.foldable.binary_search(&c) {
            Ok(idx) => {
                let (from, to) = self.class_of[idx];
                &self.members[from as usize..to as usize]
            }
            Err(_) => &[],
        }
    }
}

static CASE_TABLE: Lazy<CaseTable> = Lazy::new(|| CaseTable::build(false));
static UNICODE_CASE_TABLE: Lazy<CaseTable> = Lazy::new(|| CaseTable::build(true));

/// `\d`
pub fn digits() -> CharSet {
    CharSet::range(u16::from(b'0'), u16::from(b'9'))
}

/// `\w`
pub fn word_chars() -> CharSet {
    CharSet::from_intervals(vec![
        Interval::new(u16::from(b'0'), u16::from(b'9')),
        Interval::new(u16::from(b'A'), u16::from(b'Z')),
        Interval::single(u16::from(b'_')),
        Interval::new(u16::from(b'a'), u16::from(b'z')),
    ])
}

/// `\s`: white space and line terminators.
pub fn white_space() -> CharSet {
    CharSet::from_intervals(vec![
        Interval::new(0x09, 0x0D),
        Interval::single(0x20),
        Interval::single(0xA0),
        Interval::single(0x1680),
        Interval::new(0x2000, 0x200A),
        Interval::new(0x2028, 0x2029),
        Interval::single(0x202F),
        Interval::single(0x205F),
        Interval::single(0x3000),
        Interval::single(0xFEFF),
    ])
}

/// Line terminators: LF, CR, LINE SEPARATOR and PARAGRAPH SEPARATOR.
pub fn line_terminators() -> CharSet {
    CharSet::from_intervals(vec![
        Interval::single(0x0A),
        Interval::single(0x0D),
        Interval::new(0x2028, 0x2029),
    ])
}

pub fn is_line_terminator(c: u16) -> bool {
    matches!(c, 0x0A | 0x0D | 0x2028 | 0x2029)
}

pub fn is_word_char(c: u16) -> bool {
    matches!(c, 0x30..=0x39 | 0x41..=0x5A | 0x5F | 0x61..=0x7A)
}
