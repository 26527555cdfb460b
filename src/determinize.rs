//! Subset construction.
//!
//! The construction itself is generic over a [`PowersetView`]: something
//! that can describe a set of automaton positions as a hashable key, list the
//! character classes leaving it and step it over one character. Forward and
//! backward NFA views live here; the trace-finder brings its own.

use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::charset::{CharSet, Interval};
use crate::dfa::{Dfa, DfaState, StateFlags, StateId};
use crate::error::{CompileError, CompileResult};
use crate::matchers::CharMatcher;
use crate::nfa::{loop_choices, Guard, Nfa, NfaState};
use crate::tracefinder::PrecalcIndex;

pub(crate) trait PowersetView {
    type Key: Clone + Eq + Hash;

    /// Character classes on which `key` may leave. Characters outside all of
    /// them must step to a dead key.
    fn classes(&self, key: &Self::Key, out: &mut Vec<CharSet>);

    fn step(&self, key: &Self::Key, c: u16) -> Self::Key;

    fn is_dead(&self, key: &Self::Key) -> bool;

    fn flags(&self, key: &Self::Key) -> StateFlags;

    fn precalc(&self, _key: &Self::Key) -> PrecalcIndex {
        PrecalcIndex::NONE
    }
}

struct Interner<K> {
    ids: FxHashMap<K, StateId>,
    keys: Vec<K>,
    max: usize,
}

impl<K: Clone + Eq + Hash> Interner<K> {
    fn intern(&mut self, key: K) -> CompileResult<StateId> {
        if let Some(&id) = self.ids.get(&key) {
            return Ok(id);
        }
        if self.keys.len() >= self.max {
            return Err(CompileError::StateExplosion {
                states: self.keys.len() + 1,
                max: self.max,
            });
        }
        let id = self.keys.len() as StateId;
        self.ids.insert(key.clone(), id);
        self.keys.push(key);
        Ok(id)
    }
}

/// Boundaries of the elementary intervals induced by `classes`: every class
/// is a union of consecutive `[cuts[i], cuts[i + 1])`.
fn cut_points(classes: &[CharSet]) -> Vec<u32> {
    let mut cuts = vec![0, u32::from(u16::MAX) + 1];
    for set in classes {
        for r in set.intervals() {
            cuts.push(u32::from(r.lo));
            cuts.push(u32::from(r.hi) + 1);
        }
    }
    cuts.sort_unstable();
    cuts.dedup();
    cuts
}

/// Build the DFA reachable from `initial`. Entry `i` of the result is the
/// state of `initial[i]`.
pub(crate) fn determinize<V: PowersetView>(view: &V, initial: Vec<V::Key>, max_states: usize) -> CompileResult<Dfa> {
    let mut interner = Interner {
        ids: FxHashMap::default(),
        keys: Vec::new(),
        max: max_states.min(i16::MAX as usize),
    };
    let mut entries = Vec::with_capacity(initial.len());
    for key in initial {
        entries.push(interner.intern(key)?);
    }

    let mut states = Vec::new();
    let mut classes = Vec::new();
    while states.len() < interner.keys.len() {
        let id = states.len() as StateId;
        let key = interner.keys[states.len()].clone();
        classes.clear();
        view.classes(&key, &mut classes);

        // Successors in order of first appearance, with the intervals leading
        // to each.
        let mut groups: Vec<(StateId, Vec<Interval>)> = Vec::new();
        for w in cut_points(&classes).windows(2) {
            let interval = Interval::new(w[0] as u16, (w[1] - 1) as u16);
            let next = view.step(&key, interval.lo);
            if view.is_dead(&next) {
                continue;
            }
            let succ = interner.intern(next)?;
            match groups.iter_mut().find(|(s, _)| *s == succ) {
                Some((_, intervals)) => intervals.push(interval),
                None => groups.push((succ, vec![interval])),
            }
        }

        let mut matchers = Vec::with_capacity(groups.len());
        let mut successors = Vec::with_capacity(groups.len());
        let mut loop_to_self = None;
        for (succ, intervals) in groups {
            let set = CharSet::from_intervals(intervals);
            if let [only] = set.intervals() {
                if succ == id {
                    loop_to_self = Some(*only);
                }
            }
            matchers.push(CharMatcher::build(&set));
            successors.push(succ);
        }
        let single_char = match (matchers.as_slice(), successors.as_slice()) {
            ([m], [succ]) => m.single_char().map(|c| (c, *succ)),
            _ => None,
        };
        states.push(DfaState {
            id,
            matchers,
            successors,
            loop_to_self,
            single_char,
            flags: view.flags(&key),
            precalc: view.precalc(&key),
        });
    }
    Ok(Dfa::new(states, entries))
}

/// A look-ahead a thread has passed but not yet seen through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Peek {
    body: u16,
    negated: bool,
    /// Characters read since the look-ahead was entered.
    read: u16,
    /// Alternatives of the body still matching, one bit each.
    alive: u32,
}

enum PeekStep {
    Holds,
    Fails,
    Waiting(Peek),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Entry {
    /// A thread waiting on a character state, with its loop counters and
    /// open look-aheads.
    Thread {
        state: u32,
        counts: Vec<u32>,
        peeks: Vec<Peek>,
    },
    /// A match `delay` characters back whose look-aheads are still open.
    Pending { delay: u16, peeks: Vec<Peek> },
    /// A match here that only counts at the end of the input.
    AtEnd,
}

/// Live threads and unconfirmed matches, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ForwardKey {
    entries: Vec<Entry>,
    /// `(tracker, progress)`: the last `progress` characters matched the
    /// first `progress` classes of the tracker's look-behind body.
    trackers: Vec<(u16, u16)>,
    /// Delay of the match confirmed on entering this key. Every entry
    /// outranks it; everything it outranked is gone.
    accepted: Option<u16>,
}

/// A position in the epsilon closure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Visit {
    state: usize,
    /// Crossed a `$`: nothing more can be read.
    dollar: bool,
    counts: Vec<u32>,
    peeks: Vec<Peek>,
}

struct Closure {
    key: ForwardKey,
    seen: FxHashSet<Visit>,
}

impl Closure {
    fn new(trackers: Vec<(u16, u16)>) -> Self {
        Self {
            key: ForwardKey {
                entries: Vec::new(),
                trackers,
                accepted: None,
            },
            seen: FxHashSet::default(),
        }
    }

    fn push_unique(&mut self, entry: Entry) {
        if !self.key.entries.contains(&entry) {
            self.key.entries.push(entry);
        }
    }
}

pub(crate) struct ForwardView<'a> {
    nfa: &'a Nfa,
}

impl<'a> ForwardView<'a> {
    pub(crate) fn new(nfa: &'a Nfa) -> Self {
        Self { nfa }
    }

    /// Initial keys, `prefix_bound + 2` per mode: one per skipped prefix
    /// length, then one for a search starting at input position 0. Anchored
    /// entries come first.
    pub(crate) fn initial_keys(&self) -> Vec<ForwardKey> {
        let k = self.nfa.prefix_bound();
        let mut keys = Vec::with_capacity(2 * (k + 2));
        for anchored in [true, false] {
            let entry = |i| {
                if anchored {
                    self.nfa.anchored_initial(i)
                } else {
                    self.nfa.unanchored_initial(i)
                }
            };
            for i in 0..=k {
                keys.push(self.start_key(entry(i), false));
            }
            keys.push(self.start_key(entry(0), true));
        }
        keys
    }

    fn start_key(&self, state: usize, caret_ok: bool) -> ForwardKey {
        let mut closure = Closure::new(Vec::new());
        let seed = Visit {
            state,
            dollar: false,
            counts: vec![0; self.nfa.counter_count()],
            peeks: Vec::new(),
        };
        self.expand(&mut closure, seed, caret_ok);
        closure.key
    }

    /// Priority-ordered epsilon closure of `seed`, appended to `closure`.
    /// Reaching `Match` with nothing left to check cuts off every
    /// lower-priority thread.
    fn expand(&self, closure: &mut Closure, seed: Visit, caret_ok: bool) {
        let mut stack = vec![seed];
        while let Some(mut v) = stack.pop() {
            if !closure.seen.insert(v.clone()) {
                continue;
            }
            match self.nfa.state(v.state) {
                NfaState::Char { .. } => {
                    if !v.dollar {
                        closure.key.entries.push(Entry::Thread {
                            state: v.state as u32,
                            counts: v.counts,
                            peeks: v.peeks,
                        });
                    }
                }
                NfaState::Match if v.dollar => closure.push_unique(Entry::AtEnd),
                NfaState::Match if v.peeks.is_empty() => {
                    closure.key.accepted = Some(0);
                    return;
                }
                NfaState::Match => closure.push_unique(Entry::Pending { delay: 0, peeks: v.peeks }),
                NfaState::Split { targets } => {
                    for &t in targets.iter().rev() {
                        stack.push(Visit { state: t, ..v.clone() });
                    }
                }
                NfaState::Assert { guard, next } => {
                    let pass = match *guard {
                        Guard::Caret => caret_ok,
                        // Past the end only negative look-aheads can hold.
                        Guard::Dollar if v.peeks.iter().any(|p| !p.negated) => false,
                        Guard::Dollar => {
                            v.peeks.clear();
                            v.dollar = true;
                            true
                        }
                        Guard::LookBehind { tracker, negated } => {
                            self.look_behind_holds(&closure.key.trackers, tracker) != negated
                        }
                        Guard::LookAhead { body, negated } => match self.enter_peek(body, negated, v.dollar) {
                            PeekStep::Holds => true,
                            PeekStep::Fails => false,
                            PeekStep::Waiting(peek) => {
                                v.peeks.push(peek);
                                v.peeks.sort_unstable();
                                v.peeks.dedup();
                                true
                            }
                        },
                    };
                    if pass {
                        v.state = *next;
                        stack.push(v);
                    }
                }
                NfaState::Save { next, .. } | NfaState::ClearGroups { next, .. } => {
                    v.state = *next;
                    stack.push(v);
                }
                NfaState::CountInit { counter, next } => {
                    v.counts[*counter] = 0;
                    v.state = *next;
                    stack.push(v);
                }
                NfaState::CountIncr { counter, limit, next } => {
                    v.counts[*counter] = (v.counts[*counter] + 1).min(*limit);
                    v.state = *next;
                    stack.push(v);
                }
                NfaState::CountLoop {
                    counter,
                    min,
                    max,
                    greedy,
                    body,
                    exit,
                } => {
                    let choices: Vec<_> = loop_choices(*min, *max, *greedy, *body, *exit, v.counts[*counter]).collect();
                    for (t, count) in choices.into_iter().rev() {
                        let mut w = Visit { state: t, ..v.clone() };
                        w.counts[*counter] = count;
                        stack.push(w);
                    }
                }
            }
        }
    }

    fn enter_peek(&self, body: usize, negated: bool, at_end: bool) -> PeekStep {
        let alternatives = &self.nfa.look_aheads()[body];
        let verdict = |found: bool| if found != negated { PeekStep::Holds } else { PeekStep::Fails };
        if alternatives.iter().any(Vec::is_empty) {
            return verdict(true);
        }
        if at_end {
            return verdict(false);
        }
        PeekStep::Waiting(Peek {
            body: body as u16,
            negated,
            read: 0,
            alive: (0..alternatives.len()).fold(0, |mask, a| mask | 1 << a),
        })
    }

    fn advance_peek(&self, peek: Peek, c: u16) -> PeekStep {
        let alternatives = &self.nfa.look_aheads()[usize::from(peek.body)];
        let at = usize::from(peek.read);
        let mut alive = 0u32;
        let mut complete = false;
        for (a, alt) in alternatives.iter().enumerate() {
            if peek.alive & (1 << a) != 0 && alt[at].contains(c) {
                if alt.len() == at + 1 {
                    complete = true;
                } else {
                    alive |= 1 << a;
                }
            }
        }
        if complete || alive == 0 {
            return if complete != peek.negated { PeekStep::Holds } else { PeekStep::Fails };
        }
        PeekStep::Waiting(Peek {
            read: peek.read + 1,
            alive,
            ..peek
        })
    }

    /// The look-aheads still open after reading `c`, or `None` if one failed.
    fn advance_peeks(&self, peeks: &[Peek], c: u16) -> Option<Vec<Peek>> {
        let mut open = Vec::with_capacity(peeks.len());
        for &peek in peeks {
            match self.advance_peek(peek, c) {
                PeekStep::Holds => {}
                PeekStep::Fails => return None,
                PeekStep::Waiting(next) => open.push(next),
            }
        }
        open.sort_unstable();
        open.dedup();
        Some(open)
    }

    fn peek_classes(&self, peeks: &[Peek], out: &mut Vec<CharSet>) {
        for peek in peeks {
            let alternatives = &self.nfa.look_aheads()[usize::from(peek.body)];
            for (a, alt) in alternatives.iter().enumerate() {
                if peek.alive & (1 << a) != 0 {
                    out.push(alt[usize::from(peek.read)].clone());
                }
            }
        }
    }

    fn look_behind_holds(&self, progress: &[(u16, u16)], tracker: usize) -> bool {
        let len = self.nfa.trackers()[tracker].len();
        len == 0 || progress.binary_search(&(tracker as u16, len as u16)).is_ok()
    }

    fn advance_trackers(&self, progress: &[(u16, u16)], c: u16) -> Vec<(u16, u16)> {
        let mut next = Vec::new();
        for (t, body) in self.nfa.trackers().iter().enumerate() {
            let t = t as u16;
            let matched = progress.iter().filter(|(pt, _)| *pt == t).map(|&(_, p)| usize::from(p));
            for p in std::iter::once(0).chain(matched) {
                if p < body.len() && body[p].contains(c) {
                    next.push((t, (p + 1) as u16));
                }
            }
        }
        next.sort_unstable();
        next.dedup();
        next
    }
}

fn has_threads(entries: &[Entry]) -> bool {
    entries.iter().any(|e| matches!(e, Entry::Thread { .. }))
}

impl PowersetView for ForwardView<'_> {
    type Key = ForwardKey;

    fn classes(&self, key: &ForwardKey, out: &mut Vec<CharSet>) {
        for entry in &key.entries {
            match entry {
                Entry::Thread { state, peeks, .. } => {
                    if let NfaState::Char { set, .. } = self.nfa.state(*state as usize) {
                        out.push(set.clone());
                    }
                    self.peek_classes(peeks, out);
                }
                Entry::Pending { peeks, .. } => self.peek_classes(peeks, out),
                Entry::AtEnd => {}
            }
        }
        if has_threads(&key.entries) {
            out.extend(self.nfa.trackers().iter().flatten().cloned());
        }
    }

    fn step(&self, key: &ForwardKey, c: u16) -> ForwardKey {
        let mut closure = Closure::new(self.advance_trackers(&key.trackers, c));
        for entry in &key.entries {
            match entry {
                Entry::Thread { state, counts, peeks } => {
                    let NfaState::Char { set, next } = self.nfa.state(*state as usize) else {
                        continue;
                    };
                    if !set.contains(c) {
                        continue;
                    }
                    let Some(peeks) = self.advance_peeks(peeks, c) else {
                        continue;
                    };
                    let seed = Visit {
                        state: *next,
                        dollar: false,
                        counts: counts.clone(),
                        peeks,
                    };
                    self.expand(&mut closure, seed, false);
                }
                Entry::Pending { delay, peeks } => {
                    let Some(peeks) = self.advance_peeks(peeks, c) else {
                        continue;
                    };
                    if peeks.is_empty() {
                        closure.key.accepted = Some(delay + 1);
                    } else {
                        closure.push_unique(Entry::Pending { delay: delay + 1, peeks });
                    }
                }
                Entry::AtEnd => {}
            }
            if closure.key.accepted.is_some() {
                break;
            }
        }
        if !has_threads(&closure.key.entries) {
            closure.key.trackers.clear();
        }
        closure.key
    }

    fn is_dead(&self, key: &ForwardKey) -> bool {
        key.entries.is_empty() && key.accepted.is_none()
    }

    fn flags(&self, key: &ForwardKey) -> StateFlags {
        // At the end of the input, open positive look-aheads fail and open
        // negative ones hold.
        let at_end = key.entries.iter().find_map(|e| match e {
            Entry::AtEnd => Some(0),
            Entry::Pending { delay, peeks } if peeks.iter().all(|p| p.negated) => Some(*delay),
            _ => None,
        });
        StateFlags {
            final_state: key.accepted.is_some(),
            anchored_final: at_end.is_some(),
            delay: key.accepted.unwrap_or(0),
            anchored_delay: at_end.unwrap_or(0),
        }
    }
}

/// Index into the forward DFA's entries for a search starting at `from`.
pub(crate) fn forward_entry(prefix_bound: usize, anchored: bool, from: usize) -> usize {
    let base = if anchored { 0 } else { prefix_bound + 2 };
    base + if from == 0 { prefix_bound + 1 } else { from.min(prefix_bound) }
}

/// Unordered set of threads of the reversed automaton, each with its loop
/// counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct BackwardKey {
    threads: Vec<(u32, Vec<u32>)>,
    final_state: bool,
    anchored_final: bool,
}

pub(crate) struct BackwardView<'a> {
    nfa: &'a Nfa,
}

impl<'a> BackwardView<'a> {
    pub(crate) fn new(nfa: &'a Nfa) -> Self {
        Self { nfa }
    }

    /// `[end inside the input, end of input]`.
    pub(crate) fn initial_keys(&self) -> Vec<BackwardKey> {
        let seed = (self.nfa.start(), vec![0; self.nfa.counter_count()]);
        vec![
            self.closure(vec![seed.clone()], false),
            self.closure(vec![seed], true),
        ]
    }

    fn closure(&self, seeds: Vec<(usize, Vec<u32>)>, dollar_ok: bool) -> BackwardKey {
        let mut key = BackwardKey {
            threads: Vec::new(),
            final_state: false,
            anchored_final: false,
        };
        // `(state, crossed ^, counters)`: nothing can be read once the walk
        // is pinned to position 0.
        let mut seen: FxHashSet<(usize, bool, Vec<u32>)> = FxHashSet::default();
        let mut stack: Vec<(usize, bool, Vec<u32>)> = seeds.into_iter().map(|(s, counts)| (s, false, counts)).collect();
        while let Some((s, caret, mut counts)) = stack.pop() {
            if !seen.insert((s, caret, counts.clone())) {
                continue;
            }
            match self.nfa.state(s) {
                NfaState::Char { .. } => {
                    if !caret {
                        key.threads.push((s as u32, counts));
                    }
                }
                NfaState::Match if caret => key.anchored_final = true,
                NfaState::Match => key.final_state = true,
                NfaState::Split { targets } => stack.extend(targets.iter().map(|&t| (t, caret, counts.clone()))),
                NfaState::Assert { guard, next } => match guard {
                    Guard::Caret => stack.push((*next, true, counts)),
                    Guard::Dollar if dollar_ok => stack.push((*next, caret, counts)),
                    Guard::Dollar | Guard::LookBehind { .. } | Guard::LookAhead { .. } => {}
                },
                NfaState::Save { next, .. } | NfaState::ClearGroups { next, .. } => stack.push((*next, caret, counts)),
                NfaState::CountInit { counter, next } => {
                    counts[*counter] = 0;
                    stack.push((*next, caret, counts));
                }
                NfaState::CountIncr { counter, limit, next } => {
                    counts[*counter] = (counts[*counter] + 1).min(*limit);
                    stack.push((*next, caret, counts));
                }
                NfaState::CountLoop {
                    counter,
                    min,
                    max,
                    greedy,
                    body,
                    exit,
                } => {
                    for (t, count) in loop_choices(*min, *max, *greedy, *body, *exit, counts[*counter]) {
                        let mut counts = counts.clone();
                        counts[*counter] = count;
                        stack.push((t, caret, counts));
                    }
                }
            }
        }
        key.threads.sort_unstable();
        key.threads.dedup();
        key
    }
}

impl PowersetView for BackwardView<'_> {
    type Key = BackwardKey;

    fn classes(&self, key: &BackwardKey, out: &mut Vec<CharSet>) {
        for (s, _) in &key.threads {
            if let NfaState::Char { set, .. } = self.nfa.state(*s as usize) {
                out.push(set.clone());
            }
        }
    }

    fn step(&self, key: &BackwardKey, c: u16) -> BackwardKey {
        let seeds: Vec<(usize, Vec<u32>)> = key
            .threads
            .iter()
            .filter_map(|(s, counts)| match self.nfa.state(*s as usize) {
                NfaState::Char { set, next } if set.contains(c) => Some((*next, counts.clone())),
                _ => None,
            })
            .collect();
        self.closure(seeds, false)
    }

    fn is_dead(&self, key: &BackwardKey) -> bool {
        key.threads.is_empty() && !key.final_state && !key.anchored_final
    }

    fn flags(&self, key: &BackwardKey) -> StateFlags {
        StateFlags {
            final_state: key.final_state,
            anchored_final: key.anchored_final,
            ..StateFlags::default()
        }
    }
}

/// Index into the backward DFA's entries for a walk starting at `end`.
pub(crate) fn backward_entry(end: usize, len: usize) -> usize {
    usize::from(end == len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::indexer::index_nodes;
    use crate::nfa::{self, Direction};
    use crate::parser::parse;
    use crate::source::RegexSource;

    fn nfa(pattern: &str, flags: &str, direction: Direction) -> Nfa {
        let mut ast = parse(&RegexSource::from_parts(pattern, flags).unwrap()).unwrap();
        let reserved = index_nodes(&mut ast).unwrap();
        nfa::build(&ast, &reserved, &EngineConfig::default(), direction).unwrap()
    }

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    /// End of the leftmost-first match, searching from `from`.
    fn find_end(pattern: &str, flags: &str, text: &str, from: usize) -> Option<usize> {
        let nfa = nfa(pattern, flags, Direction::Forward);
        let view = ForwardView::new(&nfa);
        let dfa = determinize(&view, view.initial_keys(), 2400).unwrap();
        let k = nfa.prefix_bound();
        let input = units(text);
        let entry = dfa.entry(forward_entry(k, false, from));
        dfa.find_end(&input[..], entry, from - from.min(k))
    }

    fn find_start(pattern: &str, text: &str, end: usize, from: usize) -> Option<usize> {
        let nfa = nfa(pattern, "", Direction::Backward);
        let view = BackwardView::new(&nfa);
        let dfa = determinize(&view, view.initial_keys(), 2400).unwrap();
        let input = units(text);
        let entry = dfa.entry(backward_entry(end, input.len()));
        dfa.find_start(&input[..], entry, end, from)
    }

    #[test]
    fn cut_points_cover_the_alphabet() {
        let cuts = cut_points(&[CharSet::range(10, 20), CharSet::range(15, 30)]);
        assert_eq!(cuts, vec![0, 10, 15, 21, 31, 0x10000]);
    }

    #[test]
    fn leftmost_first_ends() {
        assert_eq!(find_end("\\d+", "", "ab123cd", 0), Some(5));
        assert_eq!(find_end("a|ab", "", "xab", 0), Some(2));
        assert_eq!(find_end("ab|a", "", "xab", 0), Some(3));
        assert_eq!(find_end("a+?", "", "aaa", 0), Some(1));
        assert_eq!(find_end("a*", "", "bbb", 0), Some(0));
        assert_eq!(find_end("abc", "", "ababc", 1), Some(5));
        assert_eq!(find_end("abc", "", "abab", 0), None);
    }

    #[test]
    fn anchors() {
        assert_eq!(find_end("^a", "", "aa", 0), Some(1));
        assert_eq!(find_end("^a", "", "aa", 1), None);
        assert_eq!(find_end("a$", "", "aab", 0), None);
        assert_eq!(find_end("a$|b", "", "ab", 0), Some(2));
        assert_eq!(find_end("a$", "", "baa", 0), Some(3));
        assert_eq!(find_end("^b", "m", "a\nb", 1), Some(3));
        assert_eq!(find_end("^b", "m", "ab", 0), None);
    }

    #[test]
    fn look_behind_context_before_from() {
        assert_eq!(find_end("(?<=ab)c", "", "abc", 2), Some(3));
        assert_eq!(find_end("(?<=ab)c", "", "xbc", 2), None);
        assert_eq!(find_end("(?<!a)b", "", "abcb", 0), Some(4));
        assert_eq!(find_end("(?<=a)b", "", "xxab", 3), Some(4));
    }

    #[test]
    fn backward_starts() {
        assert_eq!(find_start("\\d+", "ab123cd", 5, 0), Some(2));
        assert_eq!(find_start("\\d+", "ab123cd", 5, 3), Some(3));
        assert_eq!(find_start("^a+", "aab", 2, 0), Some(0));
        assert_eq!(find_start("^a+", "aab", 2, 1), None);
        assert_eq!(find_start("b$", "ab", 2, 0), Some(1));
        assert_eq!(find_start("b$", "abb", 2, 0), None);
    }

    #[test]
    fn look_aheads_end_behind_the_cursor() {
        assert_eq!(find_end("a(?=b)", "", "acab", 0), Some(3));
        assert_eq!(find_end("a(?=bc|d)", "", "abxad", 0), Some(4));
        assert_eq!(find_end("a(?!b)", "", "ab", 0), None);
        assert_eq!(find_end("a(?!b)", "", "ab a", 0), Some(4));
        assert_eq!(find_end("a(?!bc)", "", "abcab", 0), Some(4));
        assert_eq!(find_end("a(?=b)$", "", "ab", 0), None);
        assert_eq!(find_end("a(?!b)$", "", "a", 0), Some(1));
        assert_eq!(find_end("a(?!b)$", "", "ac", 0), None);
        // The look-ahead of the preferred alternative wins over a longer one.
        assert_eq!(find_end("a(?=b)|ab", "", "ab", 0), Some(1));
        assert_eq!(find_end("a(?=c)|ab", "", "ab", 0), Some(2));
    }

    #[test]
    fn counted_loops() {
        let text = "a".repeat(75);
        assert_eq!(find_end("a{70}", "", &text, 0), Some(70));
        assert_eq!(find_end("a{70}", "", &text[..69], 0), None);
        assert_eq!(find_end("a{70,}", "", &text, 0), Some(75));
        assert_eq!(find_end("(?:ab){66,}?", "", &"ab".repeat(70), 0), Some(132));
        assert_eq!(find_start("a{70}", &text, 75, 0), Some(5));
    }

    #[test]
    fn ceiling_is_enforced() {
        let nfa = nfa("(a|b)*a(a|b){6}", "", Direction::Forward);
        let view = ForwardView::new(&nfa);
        let err = determinize(&view, view.initial_keys(), 16).unwrap_err();
        assert!(matches!(err, CompileError::StateExplosion { max: 16, .. }));
    }

    #[test]
    fn self_loops_and_single_chars() {
        let nfa = nfa("xa*", "y", Direction::Forward);
        let view = ForwardView::new(&nfa);
        let dfa = determinize(&view, view.initial_keys(), 2400).unwrap();
        let entry = dfa.state(dfa.entry(forward_entry(0, false, 1)));
        let Some((c, after_x)) = entry.single_char else {
            panic!("expected a single-char state, got {entry:?}");
        };
        assert_eq!(c, u16::from(b'x'));
        assert!(dfa.state(after_x).is_final());
        let looping = dfa.states().iter().find(|s| s.loop_to_self.is_some());
        assert_eq!(
            looping.and_then(|s| s.loop_to_self),
            Some(Interval::single(u16::from(b'a')))
        );
    }
}
