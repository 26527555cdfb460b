//! Deterministic automata and the loops that run them.

use crate::charset::Interval;
use crate::input::CharSequence;
use crate::matchers::CharMatcher;
use crate::tracefinder::PrecalcIndex;

/// DFA states are numbered densely from 0; the count never exceeds `i16::MAX`.
pub type StateId = i16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StateFlags {
    /// Accepting at any position.
    pub final_state: bool,
    /// Accepting only at the input boundary the automaton walks towards
    /// (end of input forward, position 0 backward).
    pub anchored_final: bool,
    /// How far behind the current position the match of `final_state` ended.
    /// Only look-aheads delay a match.
    pub delay: u16,
    /// The same for `anchored_final`.
    pub anchored_delay: u16,
}

#[derive(Debug, Clone)]
pub struct DfaState {
    pub id: StateId,
    /// Disjoint predicates; `successors[i]` is taken when `matchers[i]` hits.
    /// A character no matcher accepts leads nowhere.
    pub matchers: Vec<CharMatcher>,
    pub successors: Vec<StateId>,
    /// A contiguous range on which the state loops to itself.
    pub loop_to_self: Option<Interval>,
    /// The only character the state accepts, with its successor.
    pub single_char: Option<(u16, StateId)>,
    pub flags: StateFlags,
    pub precalc: PrecalcIndex,
}

impl DfaState {
    pub fn is_final(&self) -> bool {
        self.flags.final_state
    }

    fn next(&self, c: u16) -> Option<StateId> {
        if let Some((only, succ)) = self.single_char {
            return (c == only).then_some(succ);
        }
        self.matchers.iter().position(|m| m.matches(c)).map(|i| self.successors[i])
    }
}

#[derive(Debug, Clone)]
pub struct Dfa {
    states: Vec<DfaState>,
    entries: Vec<StateId>,
}

impl Dfa {
    pub(crate) fn new(states: Vec<DfaState>, entries: Vec<StateId>) -> Self {
        Self { states, entries }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, id: StateId) -> &DfaState {
        &self.states[id as usize]
    }

    pub fn states(&self) -> &[DfaState] {
        &self.states
    }

    pub fn entry(&self, index: usize) -> StateId {
        self.entries[index]
    }

    pub fn entries(&self) -> &[StateId] {
        &self.entries
    }

    /// Walk forward from `cursor` and return the end of the last match
    /// accepted on the way.
    pub fn find_end<S: CharSequence + ?Sized>(&self, input: &S, entry: StateId, mut cursor: usize) -> Option<usize> {
        let len = input.len();
        let mut state = self.state(entry);
        let mut last = None;
        loop {
            let flags = state.flags;
            if cursor == len && flags.anchored_final {
                last = Some(cursor - usize::from(flags.anchored_delay));
            } else if flags.final_state {
                last = Some(cursor - usize::from(flags.delay));
            }
            if cursor == len {
                break;
            }
            if let Some(range) = state.loop_to_self {
                let before = cursor;
                while cursor < len && range.contains(input.char_at(cursor)) {
                    cursor += 1;
                }
                if cursor != before {
                    continue;
                }
            }
            match state.next(input.char_at(cursor)) {
                Some(next) => {
                    state = self.state(next);
                    cursor += 1;
                }
                None => break,
            }
        }
        last
    }

    /// Walk backward from `end` down to `floor` and return the smallest
    /// accepting position seen.
    pub fn find_start<S: CharSequence + ?Sized>(&self, input: &S, entry: StateId, end: usize, floor: usize) -> Option<usize> {
        self.walk_backward(input, entry, end, floor, |state, cursor| {
            (state.flags.final_state || (cursor == 0 && state.flags.anchored_final)).then_some(())
        })
        .map(|(start, ())| start)
    }

    /// Like `find_start`, but also report the precalculated result selected
    /// at the smallest accepting position.
    pub fn find_result<S: CharSequence + ?Sized>(
        &self,
        input: &S,
        entry: StateId,
        end: usize,
        floor: usize,
    ) -> Option<(usize, u8)> {
        self.walk_backward(input, entry, end, floor, |state, cursor| state.precalc.select(cursor == 0))
    }

    fn walk_backward<S, T>(
        &self,
        input: &S,
        entry: StateId,
        end: usize,
        floor: usize,
        accept: impl Fn(&DfaState, usize) -> Option<T>,
    ) -> Option<(usize, T)>
    where
        S: CharSequence + ?Sized,
    {
        let mut state = self.state(entry);
        let mut cursor = end;
        let mut best = None;
        loop {
            if let Some(found) = accept(state, cursor) {
                best = Some((cursor, found));
            }
            if cursor == floor {
                break;
            }
            if let Some(range) = state.loop_to_self {
                let before = cursor;
                while cursor > floor && range.contains(input.char_at(cursor - 1)) {
                    cursor -= 1;
                }
                if cursor != before {
                    continue;
                }
            }
            match state.next(input.char_at(cursor - 1)) {
                Some(next) => {
                    state = self.state(next);
                    cursor -= 1;
                }
                None => break,
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::CharSet;

    /// `ab*` as a hand-built forward DFA: 0 -a-> 1, 1 -b-> 1 (final).
    fn ab_star() -> Dfa {
        let s0 = DfaState {
            id: 0,
            matchers: vec![CharMatcher::build(&CharSet::single(u16::from(b'a')))],
            successors: vec![1],
            loop_to_self: None,
            single_char: Some((u16::from(b'a'), 1)),
            flags: StateFlags::default(),
            precalc: PrecalcIndex::NONE,
        };
        let s1 = DfaState {
            id: 1,
            matchers: vec![CharMatcher::build(&CharSet::single(u16::from(b'b')))],
            successors: vec![1],
            loop_to_self: Some(Interval::single(u16::from(b'b'))),
            single_char: Some((u16::from(b'b'), 1)),
            flags: StateFlags {
                final_state: true,
                ..StateFlags::default()
            },
            precalc: PrecalcIndex::NONE,
        };
        Dfa::new(vec![s0, s1], vec![0])
    }

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn forward_walk_takes_last_final() {
        let dfa = ab_star();
        assert_eq!(dfa.find_end(&units("abbbc")[..], 0, 0), Some(4));
        assert_eq!(dfa.find_end(&units("xab")[..], 0, 1), Some(3));
        assert_eq!(dfa.find_end(&units("b")[..], 0, 0), None);
    }

    #[test]
    fn delayed_matches_end_behind_the_cursor() {
        // `a` followed by a look-ahead for `b`: the match is confirmed one
        // character after it ended.
        let mut dfa = ab_star();
        dfa.states[1].flags = StateFlags {
            final_state: true,
            delay: 1,
            ..StateFlags::default()
        };
        assert_eq!(dfa.find_end(&units("abbx")[..], 0, 0), Some(2));
        dfa.states[0].flags = StateFlags {
            anchored_final: true,
            anchored_delay: 0,
            ..StateFlags::default()
        };
        assert_eq!(dfa.find_end(&units("")[..], 0, 0), Some(0));
        assert_eq!(dfa.find_end(&units("x")[..], 0, 0), None);
    }

    #[test]
    fn backward_walk_takes_smallest_final() {
        // Read right to left, `ab*` recognizes `b*a`.
        let rev = ab_star();
        let input = units("xbbba");
        assert_eq!(rev.find_start(&input[..], 0, 5, 0), Some(1));
        assert_eq!(rev.find_start(&input[..], 0, 5, 3), Some(3));
    }
}
