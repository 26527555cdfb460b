/// Tuning knobs of a [`RegexEngine`](crate::RegexEngine).
///
/// Every limit only decides *which* engine runs a pattern: exceeding one makes
/// the pattern fall back to the backtracking matcher, never fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of compiled patterns (and cached syntax errors) kept per engine.
    pub cache_capacity: usize,
    /// Ceiling on the number of states of one DFA. DFA state ids are `i16`,
    /// so anything above `i16::MAX` is clamped.
    pub max_dfa_states: usize,
    /// Ceiling on the number of NFA states.
    pub max_nfa_states: usize,
    /// Largest repetition count a bounded quantifier is unrolled to.
    pub max_quantifier_unroll: u32,
    /// Longest look-behind body the automaton tracks. This is also the bound
    /// of the unanchored prefix.
    pub max_lookbehind_length: usize,
    /// Longest alternative of a look-ahead body the automaton tracks.
    pub max_lookahead_length: usize,
    /// Largest number of accepting paths for which capture offsets are
    /// precalculated. Result ids are bytes with `0xFF` reserved, so anything
    /// above 254 is clamped.
    pub max_trace_finder_paths: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 64,
            max_dfa_states: 2400,
            max_nfa_states: 10_000,
            max_quantifier_unroll: 64,
            max_lookbehind_length: 8,
            max_lookahead_length: 8,
            max_trace_finder_paths: 64,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn max_dfa_states(mut self, states: usize) -> Self {
        self.max_dfa_states = states;
        self
    }

    pub fn max_nfa_states(mut self, states: usize) -> Self {
        self.max_nfa_states = states;
        self
    }

    pub fn max_quantifier_unroll(mut self, count: u32) -> Self {
        self.max_quantifier_unroll = count;
        self
    }

    pub fn max_lookbehind_length(mut self, len: usize) -> Self {
        self.max_lookbehind_length = len;
        self
    }

    pub fn max_lookahead_length(mut self, len: usize) -> Self {
        self.max_lookahead_length = len;
        self
    }

    pub fn max_trace_finder_paths(mut self, paths: usize) -> Self {
        self.max_trace_finder_paths = paths;
        self
    }

    pub(crate) fn dfa_state_limit(&self) -> usize {
        self.max_dfa_states.min(i16::MAX as usize)
    }

    pub(crate) fn trace_finder_path_limit(&self) -> usize {
        self.max_trace_finder_paths.min(254)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_capacity, 64);
        assert_eq!(config.max_dfa_states, 2400);
        assert_eq!(config.max_lookbehind_length, 8);
        assert_eq!(config.max_lookahead_length, 8);
    }

    #[test]
    fn limits_are_clamped() {
        let config = EngineConfig::new().max_dfa_states(100_000).max_trace_finder_paths(1000);
        assert_eq!(config.dfa_state_limit(), i16::MAX as usize);
        assert_eq!(config.trace_finder_path_limit(), 254);
    }
}
