use std::sync::Arc;
use std::thread;

use dfagrep::{EngineConfig, MatchResult, RegexEngine, RegexSource, Utf16Str};

fn groups(r: &MatchResult) -> Vec<(i32, i32)> {
    (0..r.group_count()).map(|g| (r.start(g), r.end(g))).collect()
}

#[test]
fn case_insensitive_groups_from_precalculated_results() {
    let engine = RegexEngine::default();
    let re = engine.compile_literal("/(a|(b))c/i").unwrap();
    assert!(!re.used_fallback());
    let r = re.execute_str("xacy", 0);
    assert!(r.is_match());
    assert_eq!(r.group_count(), 3);
    assert_eq!(groups(&r), vec![(1, 3), (1, 2), (-1, -1)]);
}

#[test]
fn no_match_has_no_groups() {
    let engine = RegexEngine::default();
    let re = engine.compile_literal("/(a|(b))c/i").unwrap();
    let r = re.execute_str("xxx", 0);
    assert!(!r.is_match());
    assert_eq!(r.group_count(), 0);
}

#[test]
fn unanchored_digits() {
    let engine = RegexEngine::default();
    let re = engine.compile(&RegexSource::from_parts("\\d+", "").unwrap()).unwrap();
    let r = re.execute_str("ab123cd", 0);
    assert_eq!(groups(&r), vec![(2, 5)]);
    assert!(!re.execute_str("ab123cd", 8).is_match());
}

#[test]
fn state_explosion_falls_back() {
    let engine = RegexEngine::default();
    let re = engine.compile_literal("/(a|b)*a(a|b){12}/").unwrap();
    assert!(re.used_fallback());
    let r = re.execute_str("bbabbbbbbbbbbbb", 0);
    assert_eq!(r.group(0), Some((0, 15)));
    assert_eq!(r.group(1), Some((1, 2)));
    assert_eq!(r.group(2), Some((14, 15)));
    assert!(!re.execute_str("bbbbbbbbbbbbbbb", 0).is_match());

    let small = RegexEngine::new(EngineConfig::default().max_dfa_states(4));
    let re = small.compile_literal("/(x|y)*x(x|y){2}/").unwrap();
    assert!(re.used_fallback());
    assert_eq!(re.execute_str("yxyy", 0).group(0), Some((0, 4)));
}

#[test]
fn counted_repetition_beyond_the_unroll_limit() {
    let engine = RegexEngine::new(EngineConfig::default().max_quantifier_unroll(4));
    let re = engine.compile_literal("/a{2,9}/").unwrap();
    assert!(!re.used_fallback());
    assert_eq!(re.execute_str("baaaaaaaaaaa", 0).group(0), Some((1, 10)));
    let re = engine.compile_literal("/(\\d){6,}x/").unwrap();
    assert!(!re.used_fallback());
    assert_eq!(groups(&re.execute_str("12345x 1234567x", 0)), vec![(7, 15), (13, 14)]);
    // A counted loop over a body that can match empty needs the fallback.
    let re = engine.compile_literal("/(?:a?b?){5}c/").unwrap();
    assert!(re.used_fallback());
    assert_eq!(re.execute_str("abac", 0).group(0), Some((0, 4)));
}

#[test]
fn fallback_handles_long_inputs() {
    let engine = RegexEngine::default();
    let re = engine.compile_literal("/(a)\\1|b+/").unwrap();
    assert!(re.used_fallback());
    let text = "b".repeat(100_000);
    assert_eq!(re.execute_str(&text, 0).group(0), Some((0, 100_000)));
    let re = engine.compile_literal("/\\b(\\w+)\\b/").unwrap();
    assert!(re.used_fallback());
    let r = re.execute_str(&format!(" {}", "w".repeat(150_000)), 0);
    assert_eq!(groups(&r), vec![(1, 150_001), (1, 150_001)]);
}

#[test]
fn look_behind_captures_right_to_left() {
    let engine = RegexEngine::default();
    let re = engine.compile_literal("/(?<=(\\d+)(\\d+))$/").unwrap();
    assert!(re.used_fallback());
    assert_eq!(groups(&re.execute_str("1053", 0)), vec![(4, 4), (0, 1), (1, 4)]);
}

#[test]
fn look_aheads_stay_on_the_automaton() {
    let engine = RegexEngine::default();
    let re = engine.compile_literal("/(\\d+)(?=px|em)/").unwrap();
    assert!(!re.used_fallback());
    assert_eq!(groups(&re.execute_str("12pt 40em", 0)), vec![(5, 7), (5, 7)]);
    let re = engine.compile_literal("/q(?!u)/i").unwrap();
    assert!(!re.used_fallback());
    assert_eq!(re.execute_str("Quit Qatar", 0).group(0), Some((5, 6)));
    // Unbounded bodies still go to the fallback.
    assert!(engine.compile_literal("/a(?=b+c)/").unwrap().used_fallback());
}

#[test]
fn unicode_case_folding() {
    let engine = RegexEngine::default();
    for (literal, text) in [
        ("/\\u017f/iu", "s"),
        ("/\\u212a/iu", "k"),
        ("/\\u2126/iu", "\u{3a9}"),
        ("/\\u2126/iu", "\u{3c9}"),
        ("/S/iu", "\u{17f}"),
    ] {
        let re = engine.compile_literal(literal).unwrap();
        assert!(!re.used_fallback());
        assert!(re.execute_str(text, 0).is_match(), "{literal} on {text:?}");
    }
    // Without `u` only the upper-case mapping applies.
    let re = engine.compile_literal("/\\u017f/i").unwrap();
    assert!(!re.execute_str("s", 0).is_match());
    let re = engine.compile_literal("/\\u2126/i").unwrap();
    assert!(!re.execute_str("\u{3c9}", 0).is_match());
    assert!(re.execute_str("\u{2126}", 0).is_match());
}

#[test]
fn optional_groups_that_can_match_empty() {
    let engine = RegexEngine::default();
    let re = engine.compile_literal("/(?:|a)?/").unwrap();
    assert!(!re.used_fallback());
    assert_eq!(re.execute_str("a", 0).group(0), Some((0, 1)));
    let re = engine.compile_literal("/(a?)?b/").unwrap();
    assert!(!re.used_fallback());
    let r = re.execute_str("b", 0);
    assert_eq!(groups(&r), vec![(0, 1), (-1, -1)]);
}

#[test]
fn lru_eviction_recompiles() {
    let engine = RegexEngine::new(EngineConfig::default().cache_capacity(2));
    let a = engine.compile_literal("/a/").unwrap();
    engine.compile_literal("/b/").unwrap();
    engine.compile_literal("/a/").unwrap();
    engine.compile_literal("/c/").unwrap();
    let stats = engine.stats();
    assert_eq!(stats.compilations, 3);
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.hits, 1);

    engine.compile_literal("/b/").unwrap();
    let stats = engine.stats();
    assert_eq!(stats.misses, 4);
    assert_eq!(stats.compilations, 4);

    // An evicted pattern keeps working for whoever holds it.
    engine.compile_literal("/d/").unwrap();
    engine.compile_literal("/e/").unwrap();
    assert_eq!(a.execute_str("xa", 0).group(0), Some((1, 2)));
}

#[test]
fn syntax_errors_reach_the_caller() {
    let engine = RegexEngine::default();
    for literal in ["/(a/", "/a)/", "/[b-a]/", "/a{3,2}/", "/*/", "/(?<n>a)(?<n>b)/", "/a/gg", "a/", "/"] {
        let err = engine.compile_literal(literal).unwrap_err();
        assert!(err.to_string().starts_with("Invalid regular expression"), "{literal}: {err}");
    }
}

#[test]
fn deep_nesting_is_a_syntax_error() {
    let engine = RegexEngine::default();
    let literal = format!("/{}a{}/", "(?:".repeat(50_000), ")".repeat(50_000));
    let err = engine.compile_literal(&literal).unwrap_err();
    assert!(err.to_string().contains("too deeply nested"), "{err}");
    let literal = format!("/{}a{}/", "(?:".repeat(200), ")".repeat(200));
    let re = engine.compile_literal(&literal).unwrap();
    assert_eq!(re.execute_str("xa", 0).group(0), Some((1, 2)));
}

#[test]
fn utf16_inputs() {
    let engine = RegexEngine::default();
    let re = engine.compile_literal("/é+(x)/").unwrap();
    let units: Vec<u16> = "aééx".encode_utf16().collect();
    let r = re.execute(&units[..], 0);
    assert_eq!(groups(&r), vec![(1, 4), (3, 4)]);
    assert_eq!(groups(&re.execute(&units, 0)), groups(&r));
    let text = Utf16Str::new("😀x");
    let re = engine.compile_literal("/.x/").unwrap();
    assert_eq!(re.execute(&text, 0).group(0), Some((1, 3)));
}

#[test]
fn concurrent_compiles_and_matches() {
    let engine = Arc::new(RegexEngine::new(EngineConfig::default().cache_capacity(4)));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for n in 0..50 {
                    let literal = format!("/(\\d+)-{}/", (i + n) % 6);
                    let re = engine.compile_literal(&literal).unwrap();
                    let text = format!("id 42-{}", (i + n) % 6);
                    assert_eq!(re.execute_str(&text, 0).group(1), Some((3, 5)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let stats = engine.stats();
    assert_eq!(stats.hits + stats.misses, 400);
    assert_eq!(stats.compilations, stats.misses);
}
