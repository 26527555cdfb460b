//! Capture offsets by table lookup.
//!
//! When the pattern has a small, fixed set of accepting paths, every path's
//! capture offsets are known at compile time relative to the match bounds.
//! A backward DFA over the reversed paths then only has to tell *which* path
//! produced a match.

use log::debug;

use crate::charset::CharSet;
use crate::config::EngineConfig;
use crate::determinize::{determinize, PowersetView};
use crate::dfa::{Dfa, StateFlags};
use crate::error::{CompileError, CompileResult};
use crate::input::CharSequence;
use crate::nfa::{Guard, Nfa, NfaState};
use crate::result::MatchResult;

pub const NO_PRE_CALC_RESULT: u8 = 0xFF;

/// Results a DFA state can report, split by whether they need the match to
/// start at input position 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrecalcIndex {
    unanchored: u8,
    anchored: u8,
}

impl Default for PrecalcIndex {
    fn default() -> Self {
        Self::NONE
    }
}

impl PrecalcIndex {
    pub const NONE: PrecalcIndex = PrecalcIndex {
        unanchored: NO_PRE_CALC_RESULT,
        anchored: NO_PRE_CALC_RESULT,
    };

    /// Keep the smallest id of each kind.
    pub fn store_result(&mut self, id: u8, anchored: bool) {
        let slot = if anchored { &mut self.anchored } else { &mut self.unanchored };
        *slot = (*slot).min(id);
    }

    pub fn unanchored(&self) -> Option<u8> {
        (self.unanchored != NO_PRE_CALC_RESULT).then_some(self.unanchored)
    }

    pub fn anchored(&self) -> Option<u8> {
        (self.anchored != NO_PRE_CALC_RESULT).then_some(self.anchored)
    }

    /// The result to report at this position. Anchored results only count at
    /// input position 0, and lose to an unanchored one only if its id is
    /// strictly smaller.
    pub fn select(&self, at_start: bool) -> Option<u8> {
        match (self.unanchored(), self.anchored().filter(|_| at_start)) {
            (Some(u), Some(a)) => Some(if u < a { u } else { a }),
            (u, a) => u.or(a),
        }
    }
}

/// Capture offsets of one accepting path, relative to the start of the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreCalculatedResult {
    /// `2 * group_count` offsets; `-1` for groups the path does not set.
    indices: Vec<i32>,
    length: usize,
}

impl PreCalculatedResult {
    pub fn new(group_count: usize) -> Self {
        Self {
            indices: vec![-1; 2 * group_count],
            length: 0,
        }
    }

    pub fn group_count(&self) -> usize {
        self.indices.len() / 2
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn get_start(&self, group: usize) -> i32 {
        self.indices[2 * group]
    }

    pub fn get_end(&self, group: usize) -> i32 {
        self.indices[2 * group + 1]
    }

    pub fn set_start(&mut self, group: usize, offset: i32) {
        self.indices[2 * group] = offset;
    }

    pub fn set_end(&mut self, group: usize, offset: i32) {
        self.indices[2 * group + 1] = offset;
    }

    /// Take every set slot of `slots`; `length` is the number of characters
    /// the path consumes.
    pub fn update_indices(&mut self, slots: &[i32], length: usize) {
        for (dst, &src) in self.indices.iter_mut().zip(slots) {
            if src >= 0 {
                *dst = src;
            }
        }
        self.length = length;
    }

    pub fn create_from_start(&self, start: usize) -> MatchResult {
        self.shifted(start as i32)
    }

    pub fn create_from_end(&self, end: usize) -> MatchResult {
        self.shifted(end as i32 - self.length as i32)
    }

    fn shifted(&self, offset: i32) -> MatchResult {
        let slots: Vec<i32> = self
            .indices
            .iter()
            .map(|&i| if i < 0 { -1 } else { i + offset })
            .collect();
        MatchResult::from_slots(&slots)
    }
}

/// One accepting path through an acyclic automaton.
#[derive(Debug, Clone)]
struct Path {
    classes: Vec<CharSet>,
    slots: Vec<i32>,
    /// The path starts with `^`.
    anchored: bool,
    state: usize,
}

/// Every accepting path from the pattern start, highest priority first, or
/// `None` if the pattern is not eligible.
fn accepting_paths(nfa: &Nfa, limit: usize) -> Option<Vec<Path>> {
    if !nfa.trackers().is_empty() || !nfa.is_acyclic_from(nfa.start()) {
        return None;
    }
    let mut budget = limit.saturating_add(1).saturating_mul(nfa.len() + 1);
    let mut paths = Vec::new();
    let mut stack = vec![Path {
        classes: Vec::new(),
        slots: vec![-1; 2 * nfa.group_count()],
        anchored: false,
        state: nfa.start(),
    }];
    while let Some(mut path) = stack.pop() {
        budget = budget.checked_sub(1)?;
        match nfa.state(path.state) {
            NfaState::Char { set, next } => {
                path.classes.push(set.clone());
                path.state = *next;
            }
            NfaState::Split { targets } => {
                for &t in targets.iter().rev() {
                    stack.push(Path { state: t, ..path.clone() });
                }
                continue;
            }
            NfaState::Assert {
                guard: Guard::Caret,
                next,
            } => {
                // `^` after a character can never match.
                if !path.classes.is_empty() {
                    continue;
                }
                path.anchored = true;
                path.state = *next;
            }
            NfaState::Assert { .. }
            | NfaState::CountInit { .. }
            | NfaState::CountLoop { .. }
            | NfaState::CountIncr { .. } => return None,
            NfaState::Save { slot, next } => {
                path.slots[*slot] = path.classes.len() as i32;
                path.state = *next;
            }
            NfaState::ClearGroups { lo, hi, next } => {
                path.slots[2 * *lo..2 * *hi].fill(-1);
                path.state = *next;
            }
            NfaState::Match => {
                if paths.len() == limit {
                    return None;
                }
                paths.push(path);
                continue;
            }
        }
        stack.push(path);
    }
    Some(paths)
}

/// Reversed accepting paths read in lockstep: `(path, characters read)`.
type TraceKey = Vec<(u8, u16)>;

struct TraceView<'a> {
    paths: &'a [Path],
}

impl TraceView<'_> {
    /// The `j`-th class of `path` counted from its end.
    fn class(&self, path: u8, j: u16) -> Option<&CharSet> {
        let classes = &self.paths[usize::from(path)].classes;
        classes.len().checked_sub(usize::from(j) + 1).map(|i| &classes[i])
    }

    fn is_complete(&self, (path, j): (u8, u16)) -> bool {
        self.paths[usize::from(path)].classes.len() == usize::from(j)
    }
}

impl PowersetView for TraceView<'_> {
    type Key = TraceKey;

    fn classes(&self, key: &TraceKey, out: &mut Vec<CharSet>) {
        out.extend(key.iter().filter_map(|&(p, j)| self.class(p, j)).cloned());
    }

    fn step(&self, key: &TraceKey, c: u16) -> TraceKey {
        key.iter()
            .filter(|&&(p, j)| self.class(p, j).is_some_and(|set| set.contains(c)))
            .map(|&(p, j)| (p, j + 1))
            .collect()
    }

    fn is_dead(&self, key: &TraceKey) -> bool {
        key.is_empty()
    }

    fn flags(&self, key: &TraceKey) -> StateFlags {
        let mut flags = StateFlags::default();
        for &entry in key.iter().filter(|&&e| self.is_complete(e)) {
            if self.paths[usize::from(entry.0)].anchored {
                flags.anchored_final = true;
            } else {
                flags.final_state = true;
            }
        }
        flags
    }

    fn precalc(&self, key: &TraceKey) -> PrecalcIndex {
        let mut index = PrecalcIndex::NONE;
        for &(p, _) in key.iter().filter(|&&e| self.is_complete(e)) {
            index.store_result(p, self.paths[usize::from(p)].anchored);
        }
        index
    }
}

/// Backward DFA plus the result table it indexes.
#[derive(Debug, Clone)]
pub struct TraceFinder {
    /// `None` when there is a single path and nothing to choose between.
    dfa: Option<Dfa>,
    results: Vec<PreCalculatedResult>,
}

impl TraceFinder {
    /// Build a trace-finder for a forward NFA, or `None` if the pattern does
    /// not qualify.
    pub fn build(nfa: &Nfa, config: &EngineConfig) -> CompileResult<Option<TraceFinder>> {
        let Some(paths) = accepting_paths(nfa, config.trace_finder_path_limit()) else {
            return Ok(None);
        };
        if paths.is_empty() {
            return Ok(None);
        }
        let results: Vec<PreCalculatedResult> = paths
            .iter()
            .map(|path| {
                let mut result = PreCalculatedResult::new(nfa.group_count());
                result.update_indices(&path.slots, path.classes.len());
                result
            })
            .collect();
        if paths.len() == 1 {
            return Ok(Some(TraceFinder { dfa: None, results }));
        }
        let view = TraceView { paths: &paths };
        let initial: TraceKey = (0..paths.len()).map(|p| (p as u8, 0)).collect();
        match determinize(&view, vec![initial], config.dfa_state_limit()) {
            Ok(dfa) => Ok(Some(TraceFinder { dfa: Some(dfa), results })),
            Err(CompileError::StateExplosion { states, .. }) => {
                debug!("trace-finder DFA abandoned at {states} states");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn results(&self) -> &[PreCalculatedResult] {
        &self.results
    }

    pub fn dfa(&self) -> Option<&Dfa> {
        self.dfa.as_ref()
    }

    /// Capture offsets of the match ending at `end`, the leftmost one
    /// starting at or after `from`.
    pub fn resolve<S: CharSequence + ?Sized>(&self, input: &S, end: usize, from: usize) -> Option<MatchResult> {
        match &self.dfa {
            None => {
                let result = self.results.first()?;
                let start = end.checked_sub(result.length())?;
                Some(result.create_from_start(start))
            }
            Some(dfa) => {
                let (_, id) = dfa.find_result(input, dfa.entry(0), end, from)?;
                Some(self.results[usize::from(id)].create_from_end(end))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::index_nodes;
    use crate::nfa::{self, Direction};
    use crate::parser::parse;
    use crate::source::RegexSource;

    fn forward_nfa(pattern: &str, flags: &str) -> Nfa {
        let mut ast = parse(&RegexSource::from_parts(pattern, flags).unwrap()).unwrap();
        let reserved = index_nodes(&mut ast).unwrap();
        nfa::build(&ast, &reserved, &EngineConfig::default(), Direction::Forward).unwrap()
    }

    fn trace_finder(pattern: &str, flags: &str) -> Option<TraceFinder> {
        TraceFinder::build(&forward_nfa(pattern, flags), &EngineConfig::default()).unwrap()
    }

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn anchored_result_needs_a_smaller_id_to_lose() {
        let mut index = PrecalcIndex::NONE;
        assert_eq!(index.select(true), None);
        index.store_result(3, false);
        index.store_result(1, true);
        assert_eq!(index.select(false), Some(3));
        assert_eq!(index.select(true), Some(1));
        index.store_result(0, false);
        assert_eq!(index.select(true), Some(0));

        let mut tie = PrecalcIndex::NONE;
        tie.store_result(2, false);
        tie.store_result(2, true);
        assert_eq!(tie.select(true), Some(2));
        assert_eq!(tie.anchored(), Some(2));
    }

    #[test]
    fn results_translate_relative_offsets() {
        let mut result = PreCalculatedResult::new(3);
        result.update_indices(&[0, 2, 0, 1, -1, -1], 2);
        assert_eq!(result.get_end(1), 1);
        assert_eq!(result.get_start(2), -1);
        let from_start = result.create_from_start(1);
        let from_end = result.create_from_end(3);
        assert_eq!(from_start, from_end);
        assert_eq!(from_start.group(0), Some((1, 3)));
        assert_eq!(from_start.group(1), Some((1, 2)));
        assert_eq!(from_start.start(2), -1);

        result.set_start(2, 1);
        result.set_end(2, 2);
        assert_eq!(result.create_from_end(5).group(2), Some((4, 5)));
    }

    #[test]
    fn eligibility() {
        assert!(trace_finder("(a|(b))c", "i").is_some());
        assert!(trace_finder("^(a)b?", "").is_some());
        assert!(trace_finder("(a)+", "").is_none());
        assert!(trace_finder("(a)$", "").is_none());
        assert!(trace_finder("(?<=x)(a)", "").is_none());
        assert!(trace_finder("(a)(?=b)", "").is_none());
        // 2^8 paths
        assert!(trace_finder("(a|b)(a|b)(a|b)(a|b)(a|b)(a|b)(a|b)(a|b)", "").is_none());
    }

    #[test]
    fn paths_in_priority_order() {
        let tf = trace_finder("(a|(b))c", "i").unwrap();
        assert_eq!(tf.results().len(), 2);
        assert_eq!(tf.results()[0].get_start(2), -1);
        assert_eq!(tf.results()[1].get_start(2), 0);
    }

    #[test]
    fn resolves_groups_by_lookup() {
        let tf = trace_finder("(a|(b))c", "i").unwrap();
        let input = units("xacy");
        let r = tf.resolve(&input[..], 3, 0).unwrap();
        assert_eq!(r.group(0), Some((1, 3)));
        assert_eq!(r.group(1), Some((1, 2)));
        assert_eq!(r.group(2), None);

        let input = units("xBCy");
        let r = tf.resolve(&input[..], 3, 0).unwrap();
        assert_eq!(r.group(2), Some((1, 2)));
    }

    #[test]
    fn single_path_skips_the_dfa() {
        let tf = trace_finder("a(b)c", "").unwrap();
        assert!(tf.dfa().is_none());
        let input = units("zzabc");
        let r = tf.resolve(&input[..], 5, 0).unwrap();
        assert_eq!(r.group(0), Some((2, 5)));
        assert_eq!(r.group(1), Some((3, 4)));
    }

    #[test]
    fn optional_group_that_can_match_empty() {
        // The empty alternative may not end an optional pass, so the path
        // through `a` outranks skipping the group.
        let tf = trace_finder("(|a)?", "").unwrap();
        assert_eq!(tf.results().len(), 2);
        let input = units("a");
        let r = tf.resolve(&input[..], 1, 0).unwrap();
        assert_eq!(r.group(0), Some((0, 1)));
        assert_eq!(r.group(1), Some((0, 1)));
        let r = tf.resolve(&input[..], 0, 0).unwrap();
        assert_eq!(r.group(0), Some((0, 0)));
        assert_eq!(r.group(1), None);
    }

    #[test]
    fn priority_decides_between_paths_of_equal_span() {
        // Both alternatives match "ab"; the first one wins.
        let tf = trace_finder("(ab)|(a)(b)", "").unwrap();
        let input = units("ab");
        let r = tf.resolve(&input[..], 2, 0).unwrap();
        assert_eq!(r.group(1), Some((0, 2)));
        assert_eq!(r.group(2), None);
    }
}
