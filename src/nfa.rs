//! Thompson construction from the indexed AST.
//!
//! The automaton is built back to front: every term is compiled against the
//! state that follows it, so no fragment ever needs patching except loops.
//! Alternatives of a split are ordered by priority, which is what lets the
//! determinizer and the PikeVM reproduce leftmost-first semantics.

use crate::ast::{NodeId, NodeKind, NodeRef, PositionKind, Quantifier, RegexAst};
use crate::charset::{self, CharSet};
use crate::config::EngineConfig;
use crate::error::{internal, unsupported, CompileResult};
use crate::indexer::ReservedIds;

pub type StateId = usize;

/// A zero-width condition on the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Guard {
    /// Position 0.
    Caret,
    /// End of input.
    Dollar,
    /// The characters before the position match look-behind body `tracker`.
    LookBehind { tracker: usize, negated: bool },
    /// The characters from the position on match one alternative of
    /// look-ahead body `body`.
    LookAhead { body: usize, negated: bool },
}

/// Most alternatives a tracked look-ahead body may have.
pub const MAX_LOOK_AHEAD_ALTERNATIVES: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum NfaState {
    Char { set: CharSet, next: StateId },
    /// Epsilon fork, highest priority first.
    Split { targets: Vec<StateId> },
    Assert { guard: Guard, next: StateId },
    Save { slot: usize, next: StateId },
    /// Reset capture groups `lo..hi` at the start of a loop iteration.
    ClearGroups { lo: usize, hi: usize, next: StateId },
    /// Set `counter` to zero in front of a counted loop.
    CountInit { counter: usize, next: StateId },
    /// Head of a counted loop. Another pass through `body` is possible while
    /// the counter is below `max`, leaving through `exit` once it reached
    /// `min`. Leaving resets the counter.
    CountLoop {
        counter: usize,
        min: u32,
        max: Option<u32>,
        greedy: bool,
        body: StateId,
        exit: StateId,
    },
    /// Count a finished pass. The counter never goes past `limit`.
    CountIncr { counter: usize, limit: u32, next: StateId },
    Match,
}

impl NfaState {
    /// The same state with every epsilon target passed through `f`.
    /// Character transitions keep their target.
    fn with_epsilon_targets(&self, f: impl Fn(StateId) -> StateId) -> NfaState {
        match self.clone() {
            NfaState::Split { targets } => NfaState::Split {
                targets: targets.into_iter().map(f).collect(),
            },
            NfaState::Assert { guard, next } => NfaState::Assert { guard, next: f(next) },
            NfaState::Save { slot, next } => NfaState::Save { slot, next: f(next) },
            NfaState::ClearGroups { lo, hi, next } => NfaState::ClearGroups { lo, hi, next: f(next) },
            NfaState::CountInit { counter, next } => NfaState::CountInit { counter, next: f(next) },
            NfaState::CountLoop {
                counter,
                min,
                max,
                greedy,
                body,
                exit,
            } => NfaState::CountLoop {
                counter,
                min,
                max,
                greedy,
                body: f(body),
                exit: f(exit),
            },
            NfaState::CountIncr { counter, limit, next } => NfaState::CountIncr {
                counter,
                limit,
                next: f(next),
            },
            state @ (NfaState::Char { .. } | NfaState::Match) => state,
        }
    }
}

/// Ways on from a counted loop head whose counter reads `count`, highest
/// priority first, each with the counter value it continues with.
pub fn loop_choices(
    min: u32,
    max: Option<u32>,
    greedy: bool,
    body: StateId,
    exit: StateId,
    count: u32,
) -> impl Iterator<Item = (StateId, u32)> {
    let again = max.map_or(true, |max| count < max).then_some((body, count));
    let leave = (count >= min).then_some((exit, 0));
    let (first, second) = if greedy { (again, leave) } else { (leave, again) };
    first.into_iter().chain(second)
}

#[derive(Debug, Clone)]
pub struct NfaNode {
    pub state: NfaState,
    /// Id of the AST node (or reserved slot) the state was built from.
    pub origin: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    /// Sequences reversed, no capture states. Used to find match starts.
    Backward,
}

#[derive(Debug, Clone)]
pub struct Nfa {
    states: Vec<NfaNode>,
    start: StateId,
    anchored_initial: Vec<StateId>,
    unanchored_initial: Vec<StateId>,
    trackers: Vec<Vec<CharSet>>,
    look_aheads: Vec<Vec<Vec<CharSet>>>,
    counters: usize,
    group_count: usize,
    direction: Direction,
}

impl Nfa {
    pub fn state(&self, id: StateId) -> &NfaState {
        &self.states[id].state
    }

    pub fn origin(&self, id: StateId) -> NodeId {
        self.states[id].origin
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// First state of the pattern proper, without any prefix.
    pub fn start(&self) -> StateId {
        self.start
    }

    /// Entry that first skips `offset` prefix characters, then must match.
    pub fn anchored_initial(&self, offset: usize) -> StateId {
        self.anchored_initial[offset]
    }

    /// Entry that skips `offset` prefix characters, then searches.
    pub fn unanchored_initial(&self, offset: usize) -> StateId {
        self.unanchored_initial[offset]
    }

    pub fn prefix_bound(&self) -> usize {
        self.anchored_initial.len() - 1
    }

    /// Bodies of the tracked look-behinds, indexed by `Guard::LookBehind::tracker`.
    pub fn trackers(&self) -> &[Vec<CharSet>] {
        &self.trackers
    }

    /// Alternatives of the tracked look-ahead bodies, indexed by
    /// `Guard::LookAhead::body`.
    pub fn look_aheads(&self) -> &[Vec<Vec<CharSet>>] {
        &self.look_aheads
    }

    /// Number of loop counters a thread carries.
    pub fn counter_count(&self) -> usize {
        self.counters
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// True if any reachable state satisfies `pred`.
    pub fn any_state(&self, pred: impl Fn(&NfaState) -> bool) -> bool {
        self.states.iter().any(|n| pred(&n.state))
    }

    /// Successors of a state, in priority order.
    pub fn successors(&self, id: StateId) -> Vec<StateId> {
        match self.state(id) {
            NfaState::Char { next, .. }
            | NfaState::Assert { next, .. }
            | NfaState::Save { next, .. }
            | NfaState::ClearGroups { next, .. }
            | NfaState::CountInit { next, .. }
            | NfaState::CountIncr { next, .. } => vec![*next],
            NfaState::CountLoop { body, exit, .. } => vec![*body, *exit],
            NfaState::Split { targets } => targets.clone(),
            NfaState::Match => Vec::new(),
        }
    }

    /// True if no cycle is reachable from `from`.
    pub fn is_acyclic_from(&self, from: StateId) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Open,
            Done,
        }
        let mut marks = vec![Mark::New; self.states.len()];
        // (state, successors expanded)
        let mut stack = vec![(from, false)];
        while let Some((s, expanded)) = stack.pop() {
            if expanded {
                marks[s] = Mark::Done;
                continue;
            }
            match marks[s] {
                Mark::Done => continue,
                Mark::Open => return false,
                Mark::New => {}
            }
            marks[s] = Mark::Open;
            stack.push((s, true));
            for next in self.successors(s) {
                match marks[next] {
                    Mark::Open => return false,
                    Mark::New => stack.push((next, false)),
                    Mark::Done => {}
                }
            }
        }
        true
    }
}

struct Builder<'a> {
    ast: &'a RegexAst,
    config: &'a EngineConfig,
    direction: Direction,
    captures: bool,
    states: Vec<NfaNode>,
    trackers: Vec<Vec<CharSet>>,
    look_aheads: Vec<Vec<Vec<CharSet>>>,
    counters: usize,
}

/// Build the automaton for an indexed AST.
///
/// Back-references anywhere make the whole pattern unsupported; so do word
/// boundaries, multiline `$`, look-arounds that are not plain character
/// sequences and counted loops over a body that can match empty.
pub fn build(ast: &RegexAst, reserved: &ReservedIds, config: &EngineConfig, direction: Direction) -> CompileResult<Nfa> {
    if !ast.is_indexed() {
        return internal("NFA requested for an AST that was never indexed");
    }
    if ast.has_back_references() {
        return unsupported("back-reference");
    }
    let k = reserved.prefix_bound();
    if k > config.max_lookbehind_length {
        return unsupported(format!("look-behind context of {k} characters"));
    }
    if direction == Direction::Backward && k > 0 {
        return unsupported("look-behind in a backward automaton");
    }

    let mut b = Builder {
        ast,
        config,
        direction,
        captures: direction == Direction::Forward,
        states: Vec::new(),
        trackers: Vec::new(),
        look_aheads: Vec::new(),
        counters: 0,
    };
    let NodeKind::RootParent { match_found, .. } = ast.kind(ast.root_parent()) else {
        return internal("root parent missing");
    };
    let accept = b.add(NfaState::Match, b.origin(*match_found)?)?;
    let start = b.compile(ast.root(), accept)?;

    let (anchored_initial, unanchored_initial) = match direction {
        Direction::Backward => (vec![start], vec![start]),
        Direction::Forward => {
            let spawn = if ast.flags().sticky {
                start
            } else {
                // Lazy `.*?` in front of the pattern: trying the pattern at
                // the current position always outranks skipping a character.
                let loop_split = b.add(NfaState::Split { targets: Vec::new() }, reserved.loop_back())?;
                let skip = b.add(
                    NfaState::Char {
                        set: CharSet::full(),
                        next: loop_split,
                    },
                    reserved.loop_back(),
                )?;
                b.patch(loop_split, vec![start, skip]);
                loop_split
            };
            // Entry `i` skips one character, then continues as entry `i - 1`.
            let mut anchored = Vec::with_capacity(k + 1);
            let mut unanchored = Vec::with_capacity(k + 1);
            anchored.push(start);
            unanchored.push(spawn);
            for i in 1..=k {
                let skip = b.add(
                    NfaState::Char {
                        set: CharSet::full(),
                        next: anchored[i - 1],
                    },
                    reserved.anchored_initial(i),
                )?;
                anchored.push(skip);
                let skip = b.add(
                    NfaState::Char {
                        set: CharSet::full(),
                        next: unanchored[i - 1],
                    },
                    reserved.unanchored_initial(i),
                )?;
                unanchored.push(skip);
            }
            (anchored, unanchored)
        }
    };

    Ok(Nfa {
        states: b.states,
        start,
        anchored_initial,
        unanchored_initial,
        trackers: b.trackers,
        look_aheads: b.look_aheads,
        counters: b.counters,
        group_count: ast.group_count(),
        direction,
    })
}

impl<'a> Builder<'a> {
    fn add(&mut self, state: NfaState, origin: NodeId) -> CompileResult<StateId> {
        if self.states.len() >= self.config.max_nfa_states {
            return unsupported(format!("NFA exceeds {} states", self.config.max_nfa_states));
        }
        self.states.push(NfaNode { state, origin });
        Ok(self.states.len() - 1)
    }

    fn patch(&mut self, split: StateId, new_targets: Vec<StateId>) {
        if let NfaState::Split { targets } = &mut self.states[split].state {
            *targets = new_targets;
        }
    }

    fn origin(&self, node: NodeRef) -> CompileResult<NodeId> {
        match self.ast.id_of(node) {
            Some(id) => Ok(id),
            None => internal(format!("node {node} has no id")),
        }
    }

    fn tracker(&mut self, body: Vec<CharSet>) -> usize {
        match self.trackers.iter().position(|t| *t == body) {
            Some(i) => i,
            None => {
                self.trackers.push(body);
                self.trackers.len() - 1
            }
        }
    }

    fn look_ahead(&mut self, body: Vec<Vec<CharSet>>) -> usize {
        match self.look_aheads.iter().position(|l| *l == body) {
            Some(i) => i,
            None => {
                self.look_aheads.push(body);
                self.look_aheads.len() - 1
            }
        }
    }

    fn compile(&mut self, node: NodeRef, next: StateId) -> CompileResult<StateId> {
        let ast = self.ast;
        let origin = self.origin(node)?;
        match ast.kind(node) {
            NodeKind::Sequence { terms } => {
                let mut t = next;
                match self.direction {
                    Direction::Forward => {
                        for &term in terms.iter().rev() {
                            t = self.compile(term, t)?;
                        }
                    }
                    Direction::Backward => {
                        for &term in terms {
                            t = self.compile(term, t)?;
                        }
                    }
                }
                Ok(t)
            }
            NodeKind::Group { quantifier: None, .. } => self.group_body(node, next),
            NodeKind::Group {
                quantifier: Some(q), ..
            } => self.quantified(node, *q, next),
            NodeKind::CharacterClass { set } => self.add(NfaState::Char { set: set.clone(), next }, origin),
            NodeKind::PositionAssertion(kind) => self.position(*kind, next, origin),
            NodeKind::LookBehindAssertion { negated, .. } => {
                if self.direction == Direction::Backward {
                    return unsupported("look-behind in a backward automaton");
                }
                let Some(body) = ast.plain_look_behind_body(node) else {
                    return unsupported("look-behind that is not a plain character sequence");
                };
                if body.len() > self.config.max_lookbehind_length {
                    return unsupported(format!("look-behind of length {}", body.len()));
                }
                let tracker = self.tracker(body);
                self.add(
                    NfaState::Assert {
                        guard: Guard::LookBehind {
                            tracker,
                            negated: *negated,
                        },
                        next,
                    },
                    origin,
                )
            }
            NodeKind::LookAheadAssertion { negated, .. } => {
                if self.direction == Direction::Backward {
                    return unsupported("look-ahead in a backward automaton");
                }
                let Some(body) = ast.plain_look_ahead_body(node) else {
                    return unsupported("look-ahead that is not made of plain character sequences");
                };
                if body.len() > MAX_LOOK_AHEAD_ALTERNATIVES {
                    return unsupported(format!("look-ahead with {} alternatives", body.len()));
                }
                if let Some(long) = body.iter().find(|alt| alt.len() > self.config.max_lookahead_length) {
                    return unsupported(format!("look-ahead of length {}", long.len()));
                }
                let body = self.look_ahead(body);
                self.add(
                    NfaState::Assert {
                        guard: Guard::LookAhead {
                            body,
                            negated: *negated,
                        },
                        next,
                    },
                    origin,
                )
            }
            NodeKind::BackReference { .. } => unsupported("back-reference"),
            NodeKind::RootParent { .. } | NodeKind::MatchFound => {
                internal(format!("node {node} cannot be compiled as a term"))
            }
        }
    }

    fn group_body(&mut self, node: NodeRef, next: StateId) -> CompileResult<StateId> {
        let ast = self.ast;
        let origin = self.origin(node)?;
        let NodeKind::Group {
            alternatives, capture, ..
        } = ast.kind(node)
        else {
            return internal(format!("node {node} is not a group"));
        };
        let capture = capture.filter(|_| self.captures);
        let exit = match capture {
            Some(g) => self.add(NfaState::Save { slot: 2 * g + 1, next }, origin)?,
            None => next,
        };
        let mut entries = Vec::with_capacity(alternatives.len());
        for &alt in alternatives {
            entries.push(self.compile(alt, exit)?);
        }
        let entry = match entries.as_slice() {
            [single] => *single,
            _ => self.add(NfaState::Split { targets: entries }, origin)?,
        };
        match capture {
            Some(g) => self.add(NfaState::Save { slot: 2 * g, next: entry }, origin),
            None => Ok(entry),
        }
    }

    /// One loop iteration: clear nested captures, then the group body.
    fn iteration(&mut self, node: NodeRef, clear: Option<(usize, usize)>, next: StateId) -> CompileResult<StateId> {
        let entry = self.group_body(node, next)?;
        match clear {
            Some((lo, hi)) => self.add(NfaState::ClearGroups { lo, hi, next: entry }, self.origin(node)?),
            None => Ok(entry),
        }
    }

    /// A pass past the minimum, which JavaScript rejects when it consumes
    /// nothing. A body that can match empty is compiled twice: once as usual,
    /// and once as a copy for "nothing consumed yet" whose exit is dead and
    /// whose characters lead into the ordinary compilation.
    fn optional_iteration(
        &mut self,
        node: NodeRef,
        clear: Option<(usize, usize)>,
        next: StateId,
    ) -> CompileResult<StateId> {
        let first = self.states.len();
        let entry = self.iteration(node, clear, next)?;
        if !self.ast.body_is_nullable(node) {
            return Ok(entry);
        }
        let last = self.states.len();
        let dead = self.add(NfaState::Split { targets: Vec::new() }, self.origin(node)?)?;
        let base = self.states.len();
        let moved = |s: StateId| {
            if (first..last).contains(&s) {
                s - first + base
            } else if s == next {
                dead
            } else {
                s
            }
        };
        for s in first..last {
            let copied = &self.states[s];
            let (state, origin) = (copied.state.with_epsilon_targets(moved), copied.origin);
            self.add(state, origin)?;
        }
        Ok(moved(entry))
    }

    /// Unroll `{min,max}`: `min` mandatory copies followed either by a loop
    /// (`max` unbounded) or by `max - min` nested optional copies. Bounds
    /// above the unroll limit get a counted loop instead.
    fn quantified(&mut self, node: NodeRef, q: Quantifier, next: StateId) -> CompileResult<StateId> {
        let limit = self.config.max_quantifier_unroll;
        if q.min > limit || q.max.is_some_and(|max| max - q.min > limit) {
            return self.counted(node, q, next);
        }
        let origin = self.origin(node)?;
        let clear = if self.captures { self.ast.capture_range(node) } else { None };
        let ordered = |body: StateId, exit: StateId| if q.greedy { vec![body, exit] } else { vec![exit, body] };

        let mut t = next;
        match q.max {
            None => {
                let head = self.add(NfaState::Split { targets: Vec::new() }, origin)?;
                let body = self.optional_iteration(node, clear, head)?;
                self.patch(head, ordered(body, next));
                t = head;
            }
            Some(max) => {
                for _ in q.min..max {
                    let body = self.optional_iteration(node, clear, t)?;
                    t = self.add(
                        NfaState::Split {
                            targets: ordered(body, next),
                        },
                        origin,
                    )?;
                }
            }
        }
        for _ in 0..q.min {
            t = self.iteration(node, clear, t)?;
        }
        Ok(t)
    }

    /// One copy of the body behind a counter.
    fn counted(&mut self, node: NodeRef, q: Quantifier, next: StateId) -> CompileResult<StateId> {
        if self.ast.body_is_nullable(node) {
            return unsupported(format!(
                "counted quantifier {{{},{:?}}} over a group that can match empty",
                q.min, q.max
            ));
        }
        let origin = self.origin(node)?;
        let clear = if self.captures { self.ast.capture_range(node) } else { None };
        let counter = self.counters;
        self.counters += 1;
        let head = self.add(
            NfaState::CountLoop {
                counter,
                min: q.min,
                max: q.max,
                greedy: q.greedy,
                body: next,
                exit: next,
            },
            origin,
        )?;
        let incr = self.add(
            NfaState::CountIncr {
                counter,
                limit: q.max.unwrap_or(q.min),
                next: head,
            },
            origin,
        )?;
        let entry = self.iteration(node, clear, incr)?;
        if let NfaState::CountLoop { body, .. } = &mut self.states[head].state {
            *body = entry;
        }
        self.add(NfaState::CountInit { counter, next: head }, origin)
    }

    fn position(&mut self, kind: PositionKind, next: StateId, origin: NodeId) -> CompileResult<StateId> {
        let multiline = self.ast.flags().multiline;
        let guard = match kind {
            PositionKind::Caret if multiline => {
                if self.direction == Direction::Backward {
                    return unsupported("multiline ^ in a backward automaton");
                }
                // Start of input, or right after a line terminator.
                let not_terminator = charset::line_terminators().complement();
                Guard::LookBehind {
                    tracker: self.tracker(vec![not_terminator]),
                    negated: true,
                }
            }
            PositionKind::Caret => Guard::Caret,
            PositionKind::Dollar if multiline => return unsupported("multiline $"),
            PositionKind::Dollar => Guard::Dollar,
            PositionKind::WordBoundary | PositionKind::NonWordBoundary => return unsupported("word boundary"),
        };
        self.add(NfaState::Assert { guard, next }, origin)
    }
}
