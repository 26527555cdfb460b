pub mod ast;
pub mod backtrack;
pub mod cache;
pub mod charset;
pub mod compiled;
pub mod config;
mod determinize;
pub mod dfa;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod input;
pub mod matchers;
pub mod nfa;
pub mod parser;
mod pikevm;
pub mod result;
pub mod source;
mod sparse;
pub mod tracefinder;

pub use backtrack::{BacktrackCompiler, FallbackCompiler, FallbackMatcher};
pub use cache::CacheStats;
pub use compiled::CompiledRegex;
pub use config::EngineConfig;
pub use engine::RegexEngine;
pub use error::RegexSyntaxError;
pub use input::{CharSequence, Utf16Str};
pub use result::MatchResult;
pub use source::{RegexFlags, RegexOptions, RegexSource};
