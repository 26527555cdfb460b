use std::sync::Arc;

use log::{debug, warn};

use crate::backtrack::{BacktrackCompiler, FallbackCompiler};
use crate::cache::{CacheStats, PatternCache};
use crate::compiled::{build_dfa_program, CompiledRegex};
use crate::config::EngineConfig;
use crate::error::{CompileError, RegexSyntaxError};
use crate::parser::parse;
use crate::source::RegexSource;

/// Compiles patterns and caches the results.
///
/// Each engine owns its cache; two engines never share compiled patterns.
/// `compile` may be called from many threads at once. Two threads compiling
/// the same new source both do the work and the later result is kept.
#[derive(Debug)]
pub struct RegexEngine {
    config: EngineConfig,
    cache: PatternCache,
    fallback: Arc<dyn FallbackCompiler>,
}

impl Default for RegexEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl RegexEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_fallback(config, Arc::new(BacktrackCompiler))
    }

    /// An engine that hands unsupported patterns to `fallback`.
    pub fn with_fallback(config: EngineConfig, fallback: Arc<dyn FallbackCompiler>) -> Self {
        Self {
            cache: PatternCache::new(config.cache_capacity),
            config,
            fallback,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compile `source`, or return the cached result of an earlier call.
    ///
    /// The only error is a syntax error. Patterns the automata cannot
    /// represent compile through the fallback instead.
    pub fn compile(&self, source: &RegexSource) -> Result<Arc<CompiledRegex>, RegexSyntaxError> {
        if let Some(entry) = self.cache.get(source) {
            return entry;
        }
        let entry = self.compile_uncached(source).map(Arc::new);
        self.cache.insert(source.clone(), entry.clone());
        entry
    }

    /// Compile the literal form `[options]/pattern/flags`.
    pub fn compile_literal(&self, literal: &str) -> Result<Arc<CompiledRegex>, RegexSyntaxError> {
        self.compile(&RegexSource::parse_literal(literal)?)
    }

    /// Check the syntax of `source` without compiling or caching anything.
    pub fn validate(&self, source: &RegexSource) -> Result<(), RegexSyntaxError> {
        parse(source).map(|_| ())
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn compile_uncached(&self, source: &RegexSource) -> Result<CompiledRegex, RegexSyntaxError> {
        self.cache.record_compilation();
        let mut ast = parse(source)?;
        let group_count = ast.group_count();
        if source.options().force_fallback {
            debug!("{source}: fallback forced by options");
            return self.compile_fallback(source, group_count);
        }
        match build_dfa_program(&mut ast, &self.config) {
            Ok(program) => Ok(CompiledRegex::automaton(source.clone(), group_count, program)),
            Err(CompileError::Syntax(e)) => Err(e),
            Err(e @ (CompileError::Unsupported(_) | CompileError::StateExplosion { .. })) => {
                debug!("{source}: {e}, using the fallback");
                self.compile_fallback(source, group_count)
            }
            Err(e @ CompileError::Internal(_)) => {
                warn!("{source}: {e}, using the fallback");
                self.compile_fallback(source, group_count)
            }
        }
    }

    fn compile_fallback(&self, source: &RegexSource, group_count: usize) -> Result<CompiledRegex, RegexSyntaxError> {
        let matcher = self.fallback.compile(source)?;
        Ok(CompiledRegex::fallback(source.clone(), group_count, matcher))
    }
}
