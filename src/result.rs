use std::fmt;

/// Outcome of one `execute` call.
///
/// Offsets are UTF-16 code unit indices. Group 0 is the whole match, a group
/// that did not participate reports `-1` for both bounds.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MatchResult {
    starts: Vec<i32>,
    ends: Vec<i32>,
}

impl MatchResult {
    pub const NO_MATCH: MatchResult = MatchResult {
        starts: Vec::new(),
        ends: Vec::new(),
    };

    /// Build from interleaved `[start0, end0, start1, end1, ...]` slots.
    pub fn from_slots(slots: &[i32]) -> Self {
        let starts = slots.iter().step_by(2).copied().collect();
        let ends = slots.iter().skip(1).step_by(2).copied().collect();
        MatchResult { starts, ends }
    }

    /// A match of `group_count` groups where only group 0 is known.
    pub fn whole(start: usize, end: usize, group_count: usize) -> Self {
        let mut slots = vec![-1; 2 * group_count.max(1)];
        slots[0] = start as i32;
        slots[1] = end as i32;
        Self::from_slots(&slots)
    }

    pub fn is_match(&self) -> bool {
        !self.starts.is_empty()
    }

    /// Number of groups including group 0; 0 if there is no match.
    pub fn group_count(&self) -> usize {
        self.starts.len()
    }

    pub fn start(&self, group: usize) -> i32 {
        self.starts.get(group).copied().unwrap_or(-1)
    }

    pub fn end(&self, group: usize) -> i32 {
        self.ends.get(group).copied().unwrap_or(-1)
    }

    /// `start..end` of a participating group.
    pub fn group(&self, group: usize) -> Option<(usize, usize)> {
        let (s, e) = (self.start(group), self.end(group));
        (s >= 0 && e >= 0).then_some((s as usize, e as usize))
    }
}

impl fmt::Debug for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_match() {
            return write!(f, "NoMatch");
        }
        let mut list = f.debug_list();
        for (s, e) in self.starts.iter().zip(&self.ends) {
            list.entry(&format_args!("[{s}, {e})"));
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_is_empty() {
        assert!(!MatchResult::NO_MATCH.is_match());
        assert_eq!(MatchResult::NO_MATCH.group_count(), 0);
        assert_eq!(MatchResult::NO_MATCH.start(0), -1);
    }

    #[test]
    fn slots_are_interleaved() {
        let r = MatchResult::from_slots(&[1, 3, 1, 2, -1, -1]);
        assert_eq!(r.group_count(), 3);
        assert_eq!(r.group(1), Some((1, 2)));
        assert_eq!(r.group(2), None);
        assert_eq!(format!("{r:?}"), "[[1, 3), [1, 2), [-1, -1)]");
    }
}
