use dfagrep::{EngineConfig, MatchResult, RegexEngine};

fn groups(r: &MatchResult) -> Vec<(i32, i32)> {
    (0..r.group_count()).map(|g| (r.start(g), r.end(g))).collect()
}

// Patterns the automata accept, each run against every input at every
// starting offset, both through the automata and the backtracker.
const PATTERNS: &[(&str, &str)] = &[
    ("a+b", ""),
    ("(a|ab)(c|bcd)(d*)", ""),
    ("(a|(b))c", "i"),
    ("(\\d+)-(\\d+)", ""),
    ("^(a)|(a)", ""),
    ("[a-c]+?x", ""),
    ("(?:(a)|b)+", ""),
    ("(a*)b", ""),
    ("x*", ""),
    ("(?<=\\$)\\d+", ""),
    ("(?<=\\$)(\\d)(\\d)?", ""),
    ("(?<!a)b", ""),
    ("colou?r", "i"),
    ("^$", ""),
    ("^b", "m"),
    ("a{2,3}", ""),
    ("(a|b){2}c", ""),
    (".+", ""),
    (".+", "s"),
    ("a$", ""),
    ("[^a]b", ""),
    ("(?:ab|a)(b?)", ""),
    ("b+", "y"),
    ("(a)|b", "y"),
    ("(|a)?", ""),
    ("(a?)?b", ""),
    ("(?:|a){0,2}", ""),
    ("(x?)+y", ""),
    ("(?:a|())*b", ""),
    ("a(?=b)", ""),
    ("(a)(?!b|cd)", ""),
    ("\\d+(?=-)", ""),
    ("a(?=b)|ab", ""),
    ("\\u017f", "iu"),
    ("[k-l]+", "iu"),
];

const INPUTS: &[&str] = &[
    "",
    "a",
    "ab",
    "aab",
    "abcd",
    "xacy",
    "XBCY",
    "tel 12-345",
    "$5 $42",
    "b ab bb",
    "colour COLOR",
    "a\nb\r\nb",
    "aaaax",
    "bbcx",
    "xxy y",
    "acd ab",
    "s\u{17f}S \u{212a}",
];

#[test]
fn automata_agree_with_the_backtracker() {
    let engine = RegexEngine::default();
    for &(pattern, flags) in PATTERNS {
        let fast = engine.compile_literal(&format!("/{pattern}/{flags}")).unwrap();
        let slow = engine
            .compile_literal(&format!("ForceFallback=true/{pattern}/{flags}"))
            .unwrap();
        assert!(!fast.used_fallback(), "/{pattern}/{flags} should not need the fallback");
        assert!(slow.used_fallback());
        for input in INPUTS {
            let len = input.encode_utf16().count();
            for from in 0..=len + 1 {
                let expected = slow.execute_str(input, from);
                let actual = fast.execute_str(input, from);
                assert_eq!(
                    groups(&actual),
                    groups(&expected),
                    "/{pattern}/{flags} on {input:?} from {from}"
                );
            }
        }
    }
}

#[test]
fn trace_finder_patterns_agree_with_the_backtracker() {
    let engine = RegexEngine::default();
    let eligible = [
        "(a|(b))c",
        "^(a)|(a)",
        "(a|ab)(c|bcd)",
        "(x)(y)?z",
        "(a|b)(c|d)",
        "(|a)?",
        "(a?)?b",
        "(|a)?(b?)?z",
    ];
    for pattern in eligible {
        let fast = engine.compile_literal(&format!("/{pattern}/")).unwrap();
        let slow = engine.compile_literal(&format!("ForceFallback=true/{pattern}/")).unwrap();
        assert!(fast.uses_trace_finder(), "{pattern}");
        for input in ["abcd", "bc", "aa", "xz xyz", "acbd", "zz", ""] {
            for from in 0..=input.len() {
                assert_eq!(
                    groups(&fast.execute_str(input, from)),
                    groups(&slow.execute_str(input, from)),
                    "/{pattern}/ on {input:?} from {from}"
                );
            }
        }
    }
}

#[test]
fn counted_loops_agree_with_the_backtracker() {
    let engine = RegexEngine::new(EngineConfig::default().max_quantifier_unroll(4));
    let patterns = ["a{2,9}", "(a|b){5,}c", "(?:ab){3,9}?", "(x?)+y{6}", "(?:(a)|b){5,8}?c"];
    let inputs = ["", "aaaaaaaaaaaa", "ababababababab", "abbabac", "aaabaaab baaabaaab", "xyyyyyy", "xxyyyyyyy"];
    for pattern in patterns {
        let fast = engine.compile_literal(&format!("/{pattern}/")).unwrap();
        let slow = engine.compile_literal(&format!("ForceFallback=true/{pattern}/")).unwrap();
        assert!(!fast.used_fallback(), "/{pattern}/ should not need the fallback");
        for input in inputs {
            for from in 0..=input.len() {
                assert_eq!(
                    groups(&fast.execute_str(input, from)),
                    groups(&slow.execute_str(input, from)),
                    "/{pattern}/ on {input:?} from {from}"
                );
            }
        }
    }
}
