// Capture recovery by NFA simulation.
//
// The DFAs only report where a match starts and ends. When a pattern has
// capture groups and no precalculated results, the Pike VM re-runs the
// forward NFA over the match with one capture buffer per thread. Threads are
// kept in priority order and a thread reaching `Match` cuts off every thread
// behind it, which gives the same leftmost-first answer as a backtracker in
// time linear in the input.

use std::mem;

use rustc_hash::FxHashSet;

use crate::input::CharSequence;
use crate::nfa::{loop_choices, Guard, Nfa, NfaState, StateId};
use crate::sparse::SparseSet;

/// Threads waiting on a character (or at `Match`), in priority order, each
/// with its own captures and loop counters.
#[derive(Clone, Debug)]
struct Threads {
    /// States already reached at this position, when there are no counters.
    visited: SparseSet,
    /// The same, keyed by state and counters, when there are.
    visited_counted: FxHashSet<(StateId, Vec<u32>)>,
    states: Vec<StateId>,
    caps: Vec<i32>,
    counts: Vec<u32>,
    slots_per_thread: usize,
    counters_per_thread: usize,
}

impl Threads {
    fn new(num_states: usize, num_slots: usize, num_counters: usize) -> Self {
        Threads {
            visited: SparseSet::new(num_states),
            visited_counted: FxHashSet::default(),
            states: Vec::new(),
            caps: Vec::new(),
            counts: Vec::new(),
            slots_per_thread: num_slots,
            counters_per_thread: num_counters,
        }
    }

    fn len(&self) -> usize {
        self.states.len()
    }

    fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn clear(&mut self) {
        self.visited.clear();
        self.visited_counted.clear();
        self.states.clear();
        self.caps.clear();
        self.counts.clear();
    }

    /// Mark `(sid, counts)` as reached; false if it already was.
    fn visit(&mut self, sid: StateId, counts: &[u32]) -> bool {
        if self.counters_per_thread == 0 {
            self.visited.insert(sid)
        } else {
            self.visited_counted.insert((sid, counts.to_vec()))
        }
    }

    fn push(&mut self, sid: StateId, caps: &[i32], counts: &[u32]) {
        self.states.push(sid);
        self.caps.extend_from_slice(caps);
        self.counts.extend_from_slice(counts);
    }

    fn caps(&self, i: usize) -> &[i32] {
        &self.caps[i * self.slots_per_thread..(i + 1) * self.slots_per_thread]
    }

    fn counts(&self, i: usize) -> &[u32] {
        &self.counts[i * self.counters_per_thread..(i + 1) * self.counters_per_thread]
    }
}

/// A frame of the explicit stack used when following epsilon transitions.
#[derive(Clone, Debug)]
enum FollowEpsilon {
    State(StateId),
    /// Restore a capture slot once the branch that set it is explored.
    Capture { slot: usize, pos: i32 },
    /// Set a loop counter, either to restore it or on the way out of a loop.
    Counter { counter: usize, value: u32 },
}

struct Fsm<'r, S: ?Sized> {
    nfa: &'r Nfa,
    input: &'r S,
    stack: Vec<FollowEpsilon>,
}

/// Run the forward NFA from `start` and return the capture slots of the
/// leftmost-first match, consuming no character at or beyond `end_limit`.
/// Look-aheads still read past it.
///
/// With `anchored` set only a match starting exactly at `start` counts.
pub fn exec<S: CharSequence + ?Sized>(
    nfa: &Nfa,
    input: &S,
    start: usize,
    anchored: bool,
    end_limit: usize,
) -> Option<Vec<i32>> {
    let num_slots = 2 * nfa.group_count();
    let mut clist = Threads::new(nfa.len(), num_slots, nfa.counter_count());
    let mut nlist = Threads::new(nfa.len(), num_slots, nfa.counter_count());
    let mut fsm = Fsm {
        nfa,
        input,
        stack: Vec::new(),
    };
    fsm.exec_(&mut clist, &mut nlist, start, anchored, end_limit.min(input.len()))
}

impl<'r, S: CharSequence + ?Sized> Fsm<'r, S> {
    fn exec_<'t>(
        &mut self,
        mut clist: &'t mut Threads,
        mut nlist: &'t mut Threads,
        start: usize,
        anchored: bool,
        end_limit: usize,
    ) -> Option<Vec<i32>> {
        let nfa = self.nfa;
        let mut matched: Option<Vec<i32>> = None;
        let mut thread_caps = vec![-1; clist.slots_per_thread];
        let mut thread_counts = vec![0; clist.counters_per_thread];
        let mut at = start;
        loop {
            if clist.is_empty() && (matched.is_some() || (anchored && at > start)) {
                break;
            }
            // A new attempt at this position, behind every older thread.
            if matched.is_none() && (!anchored || at == start) {
                thread_caps.fill(-1);
                thread_counts.fill(0);
                self.add(clist, &mut thread_caps, &mut thread_counts, nfa.start(), at);
            }
            for i in 0..clist.len() {
                match nfa.state(clist.states[i]) {
                    NfaState::Match => {
                        // Leftmost-first: everything after this thread loses.
                        matched = Some(clist.caps(i).to_vec());
                        break;
                    }
                    NfaState::Char { set, next } => {
                        if at < end_limit && set.contains(self.input.char_at(at)) {
                            thread_caps.copy_from_slice(clist.caps(i));
                            thread_counts.copy_from_slice(clist.counts(i));
                            self.add(nlist, &mut thread_caps, &mut thread_counts, *next, at + 1);
                        }
                    }
                    _ => {}
                }
            }
            if at >= end_limit {
                break;
            }
            at += 1;
            mem::swap(&mut clist, &mut nlist);
            nlist.clear();
        }
        matched
    }

    /// Follows epsilon transitions from `sid` and adds the reached threads
    /// to `nlist`, each with its own copy of the captures and counters.
    fn add(&mut self, nlist: &mut Threads, thread_caps: &mut [i32], thread_counts: &mut [u32], sid: StateId, at: usize) {
        self.stack.push(FollowEpsilon::State(sid));
        while let Some(frame) = self.stack.pop() {
            match frame {
                FollowEpsilon::State(sid) => self.add_step(nlist, thread_caps, thread_counts, sid, at),
                FollowEpsilon::Capture { slot, pos } => thread_caps[slot] = pos,
                FollowEpsilon::Counter { counter, value } => thread_counts[counter] = value,
            }
        }
    }

    fn add_step(
        &mut self,
        nlist: &mut Threads,
        thread_caps: &mut [i32],
        thread_counts: &mut [u32],
        mut sid: StateId,
        at: usize,
    ) {
        let nfa = self.nfa;
        loop {
            if !nlist.visit(sid, thread_counts) {
                return;
            }
            match nfa.state(sid) {
                NfaState::Char { .. } | NfaState::Match => {
                    nlist.push(sid, thread_caps, thread_counts);
                    return;
                }
                NfaState::Split { targets } => {
                    let Some((&first, rest)) = targets.split_first() else {
                        return;
                    };
                    self.stack.extend(rest.iter().rev().map(|&t| FollowEpsilon::State(t)));
                    sid = first;
                }
                NfaState::Assert { guard, next } => {
                    if !self.holds(*guard, at) {
                        return;
                    }
                    sid = *next;
                }
                NfaState::Save { slot, next } => {
                    self.stack.push(FollowEpsilon::Capture {
                        slot: *slot,
                        pos: thread_caps[*slot],
                    });
                    thread_caps[*slot] = at as i32;
                    sid = *next;
                }
                NfaState::ClearGroups { lo, hi, next } => {
                    for slot in 2 * *lo..2 * *hi {
                        self.stack.push(FollowEpsilon::Capture {
                            slot,
                            pos: thread_caps[slot],
                        });
                        thread_caps[slot] = -1;
                    }
                    sid = *next;
                }
                NfaState::CountInit { counter, next } => {
                    self.set_counter(thread_counts, *counter, 0);
                    sid = *next;
                }
                NfaState::CountIncr { counter, limit, next } => {
                    let value = (thread_counts[*counter] + 1).min(*limit);
                    self.set_counter(thread_counts, *counter, value);
                    sid = *next;
                }
                NfaState::CountLoop {
                    counter,
                    min,
                    max,
                    greedy,
                    body,
                    exit,
                } => {
                    let current = thread_counts[*counter];
                    let choices: Vec<_> = loop_choices(*min, *max, *greedy, *body, *exit, current).collect();
                    let Some((&(first, value), rest)) = choices.split_first() else {
                        return;
                    };
                    // Lower-priority choices run after this one, each with the
                    // counter it expects.
                    for &(t, v) in rest.iter().rev() {
                        self.stack.push(FollowEpsilon::Counter {
                            counter: *counter,
                            value: current,
                        });
                        self.stack.push(FollowEpsilon::State(t));
                        self.stack.push(FollowEpsilon::Counter { counter: *counter, value: v });
                    }
                    self.set_counter(thread_counts, *counter, value);
                    sid = first;
                }
            }
        }
    }

    fn set_counter(&mut self, thread_counts: &mut [u32], counter: usize, value: u32) {
        self.stack.push(FollowEpsilon::Counter {
            counter,
            value: thread_counts[counter],
        });
        thread_counts[counter] = value;
    }

    fn holds(&self, guard: Guard, at: usize) -> bool {
        match guard {
            Guard::Caret => at == 0,
            Guard::Dollar => at == self.input.len(),
            Guard::LookBehind { tracker, negated } => {
                let body = &self.nfa.trackers()[tracker];
                let behind = at >= body.len()
                    && body
                        .iter()
                        .enumerate()
                        .all(|(j, set)| set.contains(self.input.char_at(at - body.len() + j)));
                behind != negated
            }
            Guard::LookAhead { body, negated } => {
                let ahead = self.nfa.look_aheads()[body].iter().any(|alt| {
                    at + alt.len() <= self.input.len()
                        && alt.iter().enumerate().all(|(j, set)| set.contains(self.input.char_at(at + j)))
                });
                ahead != negated
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::indexer::index_nodes;
    use crate::nfa::{self, Direction};
    use crate::parser::parse;
    use crate::source::RegexSource;

    fn run(pattern: &str, flags: &str, text: &str, from: usize) -> Option<Vec<i32>> {
        let mut ast = parse(&RegexSource::from_parts(pattern, flags).unwrap()).unwrap();
        let reserved = index_nodes(&mut ast).unwrap();
        let nfa = nfa::build(&ast, &reserved, &EngineConfig::default(), Direction::Forward).unwrap();
        let input: Vec<u16> = text.encode_utf16().collect();
        exec(&nfa, &input[..], from, ast.flags().sticky, input.len())
    }

    #[test]
    fn captures() {
        assert_eq!(run("(a|(b))c", "i", "xacy", 0), Some(vec![1, 3, 1, 2, -1, -1]));
        assert_eq!(run("(a|(b))c", "i", "xBCy", 0), Some(vec![1, 3, 1, 2, 1, 2]));
        assert_eq!(run("(a|(b))c", "i", "xxx", 0), None);
        assert_eq!(run("(\\d+)-(\\d+)", "", "tel 12-345", 0), Some(vec![4, 10, 4, 6, 7, 10]));
    }

    #[test]
    fn priority() {
        assert_eq!(run("(a+)(a*)", "", "aaa", 0), Some(vec![0, 3, 0, 3, 3, 3]));
        assert_eq!(run("(a+?)(a*)", "", "aaa", 0), Some(vec![0, 3, 0, 1, 1, 3]));
        assert_eq!(run("(a|ab)(c|bcd)", "", "abcd", 0), Some(vec![0, 4, 0, 1, 1, 4]));
    }

    #[test]
    fn loop_iterations_reset_captures() {
        assert_eq!(run("(?:(a)|b)+", "", "ab", 0), Some(vec![0, 2, -1, -1]));
        assert_eq!(run("(?:(a)|(b)){2}", "", "ab", 0), Some(vec![0, 2, -1, -1, 1, 2]));
    }

    #[test]
    fn assertions_read_the_input() {
        assert_eq!(run("(?<=\\$)(\\d+)", "", "cost $42", 0), Some(vec![6, 8, 6, 8]));
        assert_eq!(run("(?<!\\$)(\\d+)", "", "$42 7", 0), Some(vec![2, 3, 2, 3]));
        assert_eq!(run("^(b)", "m", "a\nb", 0), Some(vec![2, 3, 2, 3]));
        assert_eq!(run("(a)$", "", "aa", 0), Some(vec![1, 2, 1, 2]));
    }

    #[test]
    fn look_aheads_read_past_the_match() {
        assert_eq!(run("(a)(?=b|cd)", "", "ac acd ab", 0), Some(vec![3, 4, 3, 4]));
        assert_eq!(run("(a)(?!b)", "", "ab ac", 0), Some(vec![3, 4, 3, 4]));
        assert_eq!(run("(a)(?!b)", "", "ab a", 0), Some(vec![3, 4, 3, 4]));
    }

    #[test]
    fn counted_loops() {
        let config = EngineConfig::default().max_quantifier_unroll(2);
        let run = |pattern: &str, text: &str| {
            let mut ast = parse(&RegexSource::from_parts(pattern, "").unwrap()).unwrap();
            let reserved = index_nodes(&mut ast).unwrap();
            let nfa = nfa::build(&ast, &reserved, &config, Direction::Forward).unwrap();
            assert!(nfa.counter_count() > 0, "{pattern}");
            let input: Vec<u16> = text.encode_utf16().collect();
            exec(&nfa, &input[..], 0, false, input.len())
        };
        assert_eq!(run("(a){2,5}", "baaaaaaa"), Some(vec![1, 6, 5, 6]));
        assert_eq!(run("(a){2,5}?", "baaaaaaa"), Some(vec![1, 3, 2, 3]));
        assert_eq!(run("(a){4}b", "aaab aaaab"), Some(vec![5, 10, 8, 9]));
        assert_eq!(run("(?:(a)|(b)){3,}c", "abbac"), Some(vec![0, 5, 3, 4, -1, -1]));
        assert_eq!(run("a{3}", "aa"), None);
    }

    #[test]
    fn optional_passes_must_consume() {
        assert_eq!(run("(|a)?", "", "a", 0), Some(vec![0, 1, 0, 1]));
        assert_eq!(run("(a?)?b", "", "b", 0), Some(vec![0, 1, -1, -1]));
        assert_eq!(run("(x?)+y", "", "xxy", 0), Some(vec![0, 3, 1, 2]));
        assert_eq!(run("(x?)+y", "", "y", 0), Some(vec![0, 1, 0, 0]));
    }

    #[test]
    fn sticky_only_tries_the_start() {
        assert_eq!(run("(b)", "y", "ab", 0), None);
        assert_eq!(run("(b)", "y", "ab", 1), Some(vec![1, 2, 1, 2]));
    }
}
