use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::ast::RegexAst;
use crate::backtrack::FallbackMatcher;
use crate::config::EngineConfig;
use crate::determinize::{backward_entry, determinize, forward_entry, BackwardView, ForwardView};
use crate::dfa::Dfa;
use crate::error::CompileResult;
use crate::indexer::index_nodes;
use crate::input::{CharSequence, DynSequence, Utf16Str};
use crate::nfa::{self, Direction, Nfa};
use crate::pikevm;
use crate::result::MatchResult;
use crate::source::RegexSource;
use crate::tracefinder::TraceFinder;

/// Everything the deterministic engine needs to run one pattern.
#[derive(Debug)]
pub(crate) struct DfaProgram {
    nfa: Nfa,
    forward: Dfa,
    /// Finds match starts; absent when look-arounds are tracked.
    backward: Option<Dfa>,
    trace_finder: Option<TraceFinder>,
    sticky: bool,
}

/// Build the automata for a parsed pattern.
pub(crate) fn build_dfa_program(ast: &mut RegexAst, config: &EngineConfig) -> CompileResult<DfaProgram> {
    let reserved = index_nodes(ast)?;
    let nfa = nfa::build(ast, &reserved, config, Direction::Forward)?;
    let view = ForwardView::new(&nfa);
    let forward = determinize(&view, view.initial_keys(), config.dfa_state_limit())?;
    debug!("forward DFA: {} states from {} NFA states", forward.len(), nfa.len());

    let trace_finder = if ast.group_count() > 1 {
        TraceFinder::build(&nfa, config)?
    } else {
        None
    };
    if let Some(tf) = &trace_finder {
        debug!("trace-finder with {} precalculated results", tf.results().len());
    }

    let backward = if trace_finder.is_none() && nfa.trackers().is_empty() && nfa.look_aheads().is_empty() {
        let reversed = nfa::build(ast, &reserved, config, Direction::Backward)?;
        let view = BackwardView::new(&reversed);
        let dfa = determinize(&view, view.initial_keys(), config.dfa_state_limit())?;
        debug!("backward DFA: {} states", dfa.len());
        Some(dfa)
    } else {
        None
    };

    Ok(DfaProgram {
        nfa,
        forward,
        backward,
        trace_finder,
        sticky: ast.flags().sticky,
    })
}

impl DfaProgram {
    fn execute<S: CharSequence + ?Sized>(&self, input: &S, from: usize, group_count: usize) -> MatchResult {
        let k = self.nfa.prefix_bound();
        let entry = self.forward.entry(forward_entry(k, self.sticky, from));
        let Some(end) = self.forward.find_end(input, entry, from - from.min(k)) else {
            return MatchResult::NO_MATCH;
        };

        if let Some(result) = self.trace_finder.as_ref().and_then(|tf| tf.resolve(input, end, from)) {
            return result;
        }

        let start = if self.sticky {
            Some(from)
        } else {
            self.backward
                .as_ref()
                .and_then(|dfa| dfa.find_start(input, dfa.entry(backward_entry(end, input.len())), end, from))
        };
        if let (Some(start), true) = (start, group_count <= 1) {
            return MatchResult::whole(start, end, group_count);
        }

        let slots = match start {
            Some(start) => pikevm::exec(&self.nfa, input, start, true, end),
            None => pikevm::exec(&self.nfa, input, from, false, end),
        };
        match slots {
            Some(slots) => MatchResult::from_slots(&slots),
            None => MatchResult::NO_MATCH,
        }
    }
}

#[derive(Debug)]
enum Engine {
    Automaton(Box<DfaProgram>),
    Fallback(Arc<dyn FallbackMatcher>),
}

/// A compiled pattern. Immutable, and shared between all callers that
/// compiled the same source.
pub struct CompiledRegex {
    source: RegexSource,
    group_count: usize,
    engine: Engine,
}

impl CompiledRegex {
    pub(crate) fn automaton(source: RegexSource, group_count: usize, program: DfaProgram) -> Self {
        Self {
            source,
            group_count,
            engine: Engine::Automaton(Box::new(program)),
        }
    }

    pub(crate) fn fallback(source: RegexSource, group_count: usize, matcher: Arc<dyn FallbackMatcher>) -> Self {
        Self {
            source,
            group_count,
            engine: Engine::Fallback(matcher),
        }
    }

    /// Leftmost match starting at or after `from`.
    ///
    /// `from` beyond the end of the input is never a match.
    pub fn execute<S: CharSequence + ?Sized>(&self, input: &S, from: usize) -> MatchResult {
        if from > input.len() {
            return MatchResult::NO_MATCH;
        }
        match &self.engine {
            Engine::Automaton(program) => program.execute(input, from, self.group_count),
            Engine::Fallback(matcher) => matcher.execute(&DynSequence(input), from),
        }
    }

    /// `execute` on a Rust string; offsets are in UTF-16 code units.
    pub fn execute_str(&self, text: &str, from: usize) -> MatchResult {
        self.execute(&Utf16Str::new(text), from)
    }

    pub fn source(&self) -> &RegexSource {
        &self.source
    }

    /// Number of capture groups, group 0 included.
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn used_fallback(&self) -> bool {
        matches!(self.engine, Engine::Fallback(_))
    }

    pub fn uses_trace_finder(&self) -> bool {
        matches!(&self.engine, Engine::Automaton(p) if p.trace_finder.is_some())
    }
}

impl fmt::Debug for CompiledRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRegex")
            .field("source", &self.source.to_string())
            .field("group_count", &self.group_count)
            .field("used_fallback", &self.used_fallback())
            .finish()
    }
}
