use crate::ast::{NodeKind, NodeRef, PositionKind, Quantifier, RegexAst};
use crate::charset::{self, CharSet, Interval};
use crate::error::RegexSyntaxError;
use crate::source::{RegexFlags, RegexSource};

/// Parse a source into an AST.
pub fn parse(source: &RegexSource) -> Result<RegexAst, RegexSyntaxError> {
    Parser::new(source.pattern(), source.flags()).parse()
}

/// Deepest group nesting accepted. Every later pass walks the tree
/// recursively, so the bound keeps them within the stack.
pub const MAX_NESTING_DEPTH: usize = 256;

/// What an escape denotes: a single code unit, a predefined set, or a code
/// point outside the 16-bit alphabet.
enum ClassAtom {
    Unit(u16),
    Set(CharSet),
    Astral(u32),
}

/// Recursive descent parser for JavaScript regular expressions.
///
/// The `Parser` holds the pattern, the current position (in chars) and the
/// AST under construction. Capture groups are counted up front so that
/// `\N` can be told apart from a legacy octal escape.
pub struct Parser<'a> {
    pattern: &'a str,
    chars: Vec<char>,
    pos: usize,
    flags: RegexFlags,
    ast: RegexAst,
    next_group_id: usize,
    /// Capture groups of the whole pattern, from the pre-scan.
    total_groups: usize,
    /// Named groups of the whole pattern, from the pre-scan.
    declared_names: Vec<(String, usize)>,
    /// Names seen so far, for duplicate detection.
    group_names: Vec<(String, usize)>,
    prefix_length: usize,
    /// Groups and look-arounds currently open.
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given pattern.
    pub fn new(pattern: &'a str, flags: RegexFlags) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        let (total_groups, declared_names) = prescan_groups(&chars);
        Self {
            pattern,
            chars,
            pos: 0,
            flags,
            ast: RegexAst::new(flags),
            next_group_id: 1,
            total_groups,
            declared_names,
            group_names: Vec::new(),
            prefix_length: 0,
            depth: 0,
        }
    }

    /// Allocate the number of the next capturing group.
    fn alloc_group_id(&mut self) -> usize {
        let id = self.next_group_id;
        self.next_group_id += 1;
        id
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    /// Expect a specific character and advance if it matches.
    fn expect(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn looking_at(&self, text: &str) -> bool {
        text.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn error<T>(&self, message: &str) -> Result<T, RegexSyntaxError> {
        Err(RegexSyntaxError::new(self.pattern, message, self.pos))
    }

    /// Entry point for parsing a regex pattern.
    ///
    /// The whole pattern becomes capture group 0, wrapped in the synthetic
    /// root parent together with its `MatchFound` sentinel.
    ///
    /// Example:
    /// - Pattern: `a|b` → RootParent(Group#0[Seq[a], Seq[b]], MatchFound)
    pub fn parse(mut self) -> Result<RegexAst, RegexSyntaxError> {
        let root = self.parse_disjunction(Some(0))?;
        if self.pos < self.chars.len() {
            // parse_alternative only stops early at ')'.
            return self.error("Unmatched ')'");
        }
        let match_found = self.ast.push(NodeKind::MatchFound);
        let root_parent = self.ast.push(NodeKind::RootParent {
            group: root,
            match_found,
        });
        self.ast.link_children(root_parent);
        self.ast.set_root(root_parent, root);
        self.ast.set_group_count(self.total_groups + 1);
        self.ast.set_group_names(self.group_names);
        self.ast.set_wrapped_prefix_length(self.prefix_length);
        Ok(self.ast)
    }

    /// Parse alternation (`|`) into a group of sequences.
    ///
    /// Example:
    /// - Pattern: `a|bc` → Group[Seq[a], Seq[b, c]]
    fn parse_disjunction(&mut self, capture: Option<usize>) -> Result<NodeRef, RegexSyntaxError> {
        let mut alternatives = vec![self.parse_alternative()?];
        while self.expect('|') {
            alternatives.push(self.parse_alternative()?);
        }
        let group = self.ast.push(NodeKind::Group {
            alternatives,
            capture,
            quantifier: None,
        });
        self.ast.link_children(group);
        Ok(group)
    }

    /// Parse a sequence of terms up to `|`, `)` or the end of the pattern.
    fn parse_alternative(&mut self) -> Result<NodeRef, RegexSyntaxError> {
        let mut terms = Vec::new();
        while let Some(ch) = self.peek() {
            if ch == '|' || ch == ')' {
                break;
            }
            terms.push(self.parse_term()?);
        }
        let seq = self.ast.push(NodeKind::Sequence { terms });
        self.ast.link_children(seq);
        Ok(seq)
    }

    /// Parse an assertion, or an atom followed by an optional quantifier.
    ///
    /// Examples:
    /// - Pattern: `^`      → PositionAssertion(Caret)
    /// - Pattern: `a*?`    → Group{quantifier: {0,∞} lazy}[Seq[a]]
    /// - Pattern: `(a){2}` → Group#1{quantifier: {2,2}}[Seq[a]]
    fn parse_term(&mut self) -> Result<NodeRef, RegexSyntaxError> {
        let assertion = match self.peek() {
            Some('^') => Some(PositionKind::Caret),
            Some('$') => Some(PositionKind::Dollar),
            Some('\\') if self.peek_at(1) == Some('b') => Some(PositionKind::WordBoundary),
            Some('\\') if self.peek_at(1) == Some('B') => Some(PositionKind::NonWordBoundary),
            _ => None,
        };
        if let Some(kind) = assertion {
            self.pos += if matches!(kind, PositionKind::Caret | PositionKind::Dollar) { 1 } else { 2 };
            if kind == PositionKind::Caret && self.flags.multiline {
                self.prefix_length = self.prefix_length.max(1);
            }
            if self.at_quantifier() {
                return self.error("Nothing to repeat");
            }
            return Ok(self.ast.push(NodeKind::PositionAssertion(kind)));
        }

        let is_look_behind = self.looking_at("(?<=") || self.looking_at("(?<!");
        let atom = self.parse_atom()?;
        let Some(quantifier) = self.parse_quantifier()? else {
            return Ok(atom);
        };
        if is_look_behind || (self.flags.unicode && self.is_look_around(atom)) {
            return self.error("Nothing to repeat");
        }
        Ok(self.quantify(atom, quantifier))
    }

    fn is_look_around(&self, node: NodeRef) -> bool {
        matches!(
            self.ast.kind(node),
            NodeKind::LookAheadAssertion { .. } | NodeKind::LookBehindAssertion { .. }
        )
    }

    /// Attach a quantifier: plain groups carry it themselves, anything else is
    /// wrapped in a non-capturing group.
    fn quantify(&mut self, atom: NodeRef, q: Quantifier) -> NodeRef {
        if let NodeKind::Group { quantifier, .. } = &mut self.ast.node_mut(atom).kind {
            if quantifier.is_none() {
                *quantifier = Some(q);
                return atom;
            }
        }
        let seq = self.ast.push(NodeKind::Sequence { terms: vec![atom] });
        self.ast.link_children(seq);
        let group = self.ast.push(NodeKind::Group {
            alternatives: vec![seq],
            capture: None,
            quantifier: Some(q),
        });
        self.ast.link_children(group);
        group
    }

    fn at_quantifier(&self) -> bool {
        match self.peek() {
            Some('*' | '+' | '?') => true,
            Some('{') => self.scan_braces().is_some(),
            _ => false,
        }
    }

    /// Parse `{n}`, `{n,}` or `{n,m}` starting at the current `{` without
    /// consuming anything. Returns the bounds and the length in chars.
    fn scan_braces(&self) -> Option<(u32, Option<u32>, usize)> {
        let mut i = self.pos + 1;
        let number = |i: &mut usize| -> Option<u32> {
            let start = *i;
            let mut value: u32 = 0;
            while let Some(d) = self.chars.get(*i).and_then(|c| c.to_digit(10)) {
                value = value.saturating_mul(10).saturating_add(d);
                *i += 1;
            }
            (*i > start).then_some(value)
        };
        let min = number(&mut i)?;
        let max = if self.chars.get(i) == Some(&',') {
            i += 1;
            if self.chars.get(i) == Some(&'}') {
                None
            } else {
                Some(number(&mut i)?)
            }
        } else {
            Some(min)
        };
        (self.chars.get(i) == Some(&'}')).then_some((min, max, i + 1 - self.pos))
    }

    /// Parse a quantifier after an atom, if there is one.
    fn parse_quantifier(&mut self) -> Result<Option<Quantifier>, RegexSyntaxError> {
        let (min, max) = match self.peek() {
            Some('*') => (0, None),
            Some('+') => (1, None),
            Some('?') => (0, Some(1)),
            Some('{') => match self.scan_braces() {
                Some((min, max, len)) => {
                    if max.is_some_and(|max| max < min) {
                        return self.error("numbers out of order in {} quantifier");
                    }
                    self.pos += len - 1;
                    (min, max)
                }
                None if self.flags.unicode => return self.error("Incomplete quantifier"),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        self.pos += 1;
        let greedy = !self.expect('?');
        Ok(Some(Quantifier::new(min, max, greedy)))
    }

    /// Parse a single atom: group, lookaround, class, escape, dot or literal.
    ///
    /// Examples:
    /// - Pattern: `(?:ab)`  → Group[Seq[a, b]]
    /// - Pattern: `(?<=a)`  → LookBehind(Group[Seq[a]], MatchFound)
    /// - Pattern: `[a-c]`   → CharacterClass([a-c])
    /// - Pattern: `\1`      → BackReference(1)
    /// - Pattern: `.`       → CharacterClass(everything but line terminators)
    fn parse_atom(&mut self) -> Result<NodeRef, RegexSyntaxError> {
        match self.peek() {
            Some('(') => self.parse_group(),
            Some('[') => self.parse_char_class(),
            Some('\\') => self.parse_atom_escape(),
            Some('.') => {
                self.advance();
                let set = if self.flags.dot_all {
                    CharSet::full()
                } else {
                    charset::line_terminators().complement()
                };
                Ok(self.ast.push(NodeKind::CharacterClass { set }))
            }
            Some('*' | '+' | '?') => self.error("Nothing to repeat"),
            Some('{') if self.flags.unicode || self.scan_braces().is_some() => {
                if self.scan_braces().is_some() {
                    self.error("Nothing to repeat")
                } else {
                    self.error("Lone quantifier brackets")
                }
            }
            Some(']' | '}') if self.flags.unicode => self.error("Lone quantifier brackets"),
            Some(c) => {
                self.advance();
                Ok(self.literal(u32::from(c)))
            }
            None => self.error("Unexpected end of pattern"),
        }
    }

    fn parse_group(&mut self) -> Result<NodeRef, RegexSyntaxError> {
        if self.depth == MAX_NESTING_DEPTH {
            return self.error("Regular expression too deeply nested");
        }
        self.depth += 1;
        let node = self.parse_group_body();
        self.depth -= 1;
        node
    }

    fn parse_group_body(&mut self) -> Result<NodeRef, RegexSyntaxError> {
        let open = self.pos;
        self.advance();
        let node = if self.expect('?') {
            match self.advance() {
                Some(':') => self.parse_disjunction(None)?,
                Some(c @ ('=' | '!')) => self.parse_look_around(false, c == '!')?,
                Some('<') if matches!(self.peek(), Some('=' | '!')) => {
                    let negated = self.advance() == Some('!');
                    self.parse_look_around(true, negated)?
                }
                Some('<') => {
                    let name = self.parse_group_name()?;
                    if self.group_names.iter().any(|(n, _)| *n == name) {
                        return self.error("Duplicate capture group name");
                    }
                    let nr = self.alloc_group_id();
                    self.group_names.push((name, nr));
                    self.parse_disjunction(Some(nr))?
                }
                _ => return self.error("Invalid group"),
            }
        } else {
            let nr = self.alloc_group_id();
            self.parse_disjunction(Some(nr))?
        };
        if !self.expect(')') {
            return Err(RegexSyntaxError::new(self.pattern, "Unterminated group", open));
        }
        Ok(node)
    }

    fn parse_look_around(&mut self, behind: bool, negated: bool) -> Result<NodeRef, RegexSyntaxError> {
        let group = self.parse_disjunction(None)?;
        let match_found = self.ast.push(NodeKind::MatchFound);
        let kind = if behind {
            NodeKind::LookBehindAssertion {
                group,
                negated,
                match_found,
            }
        } else {
            NodeKind::LookAheadAssertion {
                group,
                negated,
                match_found,
            }
        };
        let node = self.ast.push(kind);
        self.ast.link_children(node);
        if behind {
            if let Some(body) = self.ast.plain_look_behind_body(node) {
                self.prefix_length = self.prefix_length.max(body.len());
            }
        }
        Ok(node)
    }

    /// `name>` after `(?<` or `\k<`.
    fn parse_group_name(&mut self) -> Result<String, RegexSyntaxError> {
        let mut name = String::new();
        loop {
            match self.advance() {
                Some('>') if !name.is_empty() => return Ok(name),
                Some(c) if c == '$' || c == '_' || c.is_alphabetic() || (!name.is_empty() && c.is_alphanumeric()) => {
                    name.push(c)
                }
                _ => return self.error("Invalid capture group name"),
            }
        }
    }

    fn parse_atom_escape(&mut self) -> Result<NodeRef, RegexSyntaxError> {
        self.advance();
        let Some(c) = self.peek() else {
            return self.error("\\ at end of pattern");
        };
        if let Some(digit) = c.to_digit(10).filter(|&d| d != 0) {
            let start = self.pos;
            let mut number: usize = 0;
            while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
                number = number.saturating_mul(10).saturating_add(d as usize);
                self.advance();
            }
            if number <= self.total_groups {
                return Ok(self.ast.push(NodeKind::BackReference { group_number: number }));
            }
            if self.flags.unicode {
                return self.error("Invalid escape");
            }
            self.pos = start;
            if digit >= 8 {
                self.advance();
                return Ok(self.literal(u32::from(c)));
            }
            let value = self.parse_legacy_octal();
            return Ok(self.literal(value));
        }
        if c == 'k' && (self.flags.unicode || !self.declared_names.is_empty()) {
            self.advance();
            if !self.expect('<') {
                return self.error("Invalid named reference");
            }
            let name = self.parse_group_name()?;
            let Some(&(_, group_number)) = self.declared_names.iter().find(|(n, _)| *n == name) else {
                return self.error("Invalid named capture referenced");
            };
            return Ok(self.ast.push(NodeKind::BackReference { group_number }));
        }
        match self.parse_character_escape(false)? {
            ClassAtom::Set(set) => Ok(self.class(set)),
            ClassAtom::Unit(u) => Ok(self.class(CharSet::single(u))),
            ClassAtom::Astral(code_point) => Ok(self.literal(code_point)),
        }
    }

    /// Shared tail of atom and class escapes; the backslash is consumed.
    ///
    /// Examples:
    /// - `\d`     → Set([0-9])
    /// - `\x41`   → Unit('A')
    /// - `\cJ`    → Unit('\n')
    fn parse_character_escape(&mut self, in_class: bool) -> Result<ClassAtom, RegexSyntaxError> {
        let Some(c) = self.advance() else {
            return self.error("\\ at end of pattern");
        };
        let unit = |c: char| Ok(ClassAtom::Unit(c as u16));
        match c {
            'd' => Ok(ClassAtom::Set(charset::digits())),
            'D' => Ok(ClassAtom::Set(charset::digits().complement())),
            'w' => Ok(ClassAtom::Set(charset::word_chars())),
            'W' => Ok(ClassAtom::Set(charset::word_chars().complement())),
            's' => Ok(ClassAtom::Set(charset::white_space())),
            'S' => Ok(ClassAtom::Set(charset::white_space().complement())),
            't' => unit('\t'),
            'n' => unit('\n'),
            'v' => unit('\u{0B}'),
            'f' => unit('\u{0C}'),
            'r' => unit('\r'),
            'b' if in_class => unit('\u{08}'),
            '-' if in_class => unit('-'),
            'c' => match self.peek() {
                Some(l) if l.is_ascii_alphabetic() => {
                    self.advance();
                    Ok(ClassAtom::Unit(l as u16 % 32))
                }
                _ if self.flags.unicode => self.error("Invalid unicode escape"),
                _ => {
                    // `\c` without a control letter stands for itself.
                    self.pos -= 1;
                    unit('\\')
                }
            },
            '0' if !self.peek().is_some_and(|d| d.is_ascii_digit()) => unit('\0'),
            '0'..='9' if !self.flags.unicode => {
                if c >= '8' {
                    return unit(c);
                }
                self.pos -= 1;
                Ok(ClassAtom::Unit(self.parse_legacy_octal() as u16))
            }
            'x' => match self.parse_hex(2) {
                Some(v) => Ok(ClassAtom::Unit(v as u16)),
                None if self.flags.unicode => self.error("Invalid escape"),
                None => unit('x'),
            },
            'u' => match self.parse_unicode_escape()? {
                Some(v) if v > 0xFFFF => Ok(ClassAtom::Astral(v)),
                Some(v) => Ok(ClassAtom::Unit(v as u16)),
                None if self.flags.unicode => self.error("Invalid unicode escape"),
                None => unit('u'),
            },
            _ if self.flags.unicode => {
                if "^$\\.*+?()[]{}|/".contains(c) {
                    unit(c)
                } else {
                    self.error("Invalid escape")
                }
            }
            _ if u32::from(c) > 0xFFFF => Ok(ClassAtom::Astral(u32::from(c))),
            _ => unit(c),
        }
    }

    /// Up to three octal digits, value at most 0o377.
    fn parse_legacy_octal(&mut self) -> u32 {
        let mut value = 0;
        for _ in 0..3 {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(d) if value * 8 + d <= 0o377 => {
                    value = value * 8 + d;
                    self.advance();
                }
                _ => break,
            }
        }
        value
    }

    /// Exactly `digits` hex digits; consumes nothing on failure.
    fn parse_hex(&mut self, digits: usize) -> Option<u32> {
        let mut value = 0;
        for i in 0..digits {
            value = value * 16 + self.peek_at(i)?.to_digit(16)?;
        }
        self.pos += digits;
        Some(value)
    }

    /// `\uHHHH`, or `\u{H...}` and surrogate pairs in unicode mode.
    fn parse_unicode_escape(&mut self) -> Result<Option<u32>, RegexSyntaxError> {
        if self.flags.unicode && self.peek() == Some('{') {
            self.advance();
            let mut value: u32 = 0;
            let mut digits = 0;
            while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                value = value.saturating_mul(16).saturating_add(d);
                digits += 1;
                self.advance();
            }
            if digits == 0 || !self.expect('}') || value > 0x10FFFF {
                return self.error("Invalid unicode escape");
            }
            return Ok(Some(value));
        }
        let Some(lead) = self.parse_hex(4) else {
            return Ok(None);
        };
        if self.flags.unicode && (0xD800..0xDC00).contains(&lead) && self.looking_at("\\u") {
            let save = self.pos;
            self.pos += 2;
            match self.parse_hex(4) {
                Some(trail) if (0xDC00..0xE000).contains(&trail) => {
                    return Ok(Some(0x10000 + ((lead - 0xD800) << 10) + (trail - 0xDC00)));
                }
                _ => self.pos = save,
            }
        }
        Ok(Some(lead))
    }

    /// Parse a character class, e.g. `[abc]`, `[^a-z]` or `[\d_]`.
    ///
    /// Examples:
    /// - Pattern: `[a-c]`  → CharacterClass([a-c])
    /// - Pattern: `[^\n]`  → CharacterClass(everything but '\n')
    fn parse_char_class(&mut self) -> Result<NodeRef, RegexSyntaxError> {
        let open = self.pos;
        self.advance();
        let negated = self.expect('^');
        let mut ranges: Vec<Interval> = Vec::new();
        loop {
            let lo = match self.peek() {
                None => return Err(RegexSyntaxError::new(self.pattern, "Unterminated character class", open)),
                Some(']') => {
                    self.advance();
                    break;
                }
                Some(_) => self.parse_class_atom()?,
            };
            let is_range = self.peek() == Some('-') && !matches!(self.peek_at(1), None | Some(']'));
            if !is_range {
                push_atom(&mut ranges, lo);
                continue;
            }
            self.advance();
            let hi = self.parse_class_atom()?;
            match (lo, hi) {
                (ClassAtom::Unit(a), ClassAtom::Unit(b)) => {
                    if a > b {
                        return self.error("Range out of order in character class");
                    }
                    ranges.push(Interval::new(a, b));
                }
                _ if self.flags.unicode => return self.error("Invalid character class"),
                (lo, hi) => {
                    push_atom(&mut ranges, lo);
                    ranges.push(Interval::single(u16::from(b'-')));
                    push_atom(&mut ranges, hi);
                }
            }
        }
        let mut set = CharSet::from_intervals(ranges);
        if self.flags.ignore_case {
            set = set.case_fold(self.flags.unicode);
        }
        if negated {
            set = set.complement();
        }
        Ok(self.ast.push(NodeKind::CharacterClass { set }))
    }

    fn parse_class_atom(&mut self) -> Result<ClassAtom, RegexSyntaxError> {
        match self.advance() {
            Some('\\') => {
                if let Some(d) = self.peek().filter(|c| c.is_ascii_digit() && *c != '0') {
                    if self.flags.unicode {
                        return self.error("Invalid class escape");
                    }
                    if d >= '8' {
                        self.advance();
                        return Ok(ClassAtom::Unit(d as u16));
                    }
                    return Ok(ClassAtom::Unit(self.parse_legacy_octal() as u16));
                }
                if self.peek() == Some('B') && self.flags.unicode {
                    return self.error("Invalid class escape");
                }
                match self.parse_character_escape(true)? {
                    ClassAtom::Astral(_) => self.error("astral code points in character classes are not supported"),
                    atom => Ok(atom),
                }
            }
            Some(c) if u32::from(c) > 0xFFFF => {
                self.pos -= 1;
                self.error("astral code points in character classes are not supported")
            }
            Some(c) => Ok(ClassAtom::Unit(c as u16)),
            None => self.error("Unterminated character class"),
        }
    }

    /// A literal code point; astral ones become a surrogate pair sequence.
    fn literal(&mut self, code_point: u32) -> NodeRef {
        if code_point <= 0xFFFF {
            return self.class(CharSet::single(code_point as u16));
        }
        let v = code_point - 0x10000;
        let lead = self.class(CharSet::single(0xD800 + (v >> 10) as u16));
        let trail = self.class(CharSet::single(0xDC00 + (v & 0x3FF) as u16));
        let seq = self.ast.push(NodeKind::Sequence {
            terms: vec![lead, trail],
        });
        self.ast.link_children(seq);
        let group = self.ast.push(NodeKind::Group {
            alternatives: vec![seq],
            capture: None,
            quantifier: None,
        });
        self.ast.link_children(group);
        group
    }

    /// A character class node, case folded under `i`.
    fn class(&mut self, set: CharSet) -> NodeRef {
        let set = if self.flags.ignore_case { set.case_fold(self.flags.unicode) } else { set };
        self.ast.push(NodeKind::CharacterClass { set })
    }
}

fn push_atom(ranges: &mut Vec<Interval>, atom: ClassAtom) {
    match atom {
        ClassAtom::Unit(u) => ranges.push(Interval::single(u)),
        ClassAtom::Set(set) => ranges.extend_from_slice(set.intervals()),
        // parse_class_atom rejects these.
        ClassAtom::Astral(_) => {}
    }
}

/// Count capture groups and collect group names ahead of parsing.
fn prescan_groups(chars: &[char]) -> (usize, Vec<(String, usize)>) {
    let mut count = 0;
    let mut names = Vec::new();
    let mut in_class = false;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '[' => in_class = true,
            ']' => in_class = false,
            '(' if !in_class => {
                if chars.get(i + 1) != Some(&'?') {
                    count += 1;
                } else if chars.get(i + 2) == Some(&'<') && !matches!(chars.get(i + 3), Some('=' | '!')) {
                    count += 1;
                    let name: String = chars[i + 3..].iter().take_while(|&&c| c != '>').collect();
                    names.push((name, count));
                }
            }
            _ => {}
        }
        i += 1;
    }
    (count, names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(pattern: &str, flags: &str) -> Result<RegexAst, RegexSyntaxError> {
        parse(&RegexSource::from_parts(pattern, flags).unwrap())
    }

    fn root_terms(ast: &RegexAst) -> Vec<NodeRef> {
        let NodeKind::Group { alternatives, .. } = ast.kind(ast.root()) else {
            panic!("root is not a group");
        };
        ast.children(alternatives[0])
    }

    #[test]
    fn alternation_and_groups() {
        let ast = parse_str("(a|(b))c", "i").unwrap();
        assert_eq!(ast.group_count(), 3);
        let terms = root_terms(&ast);
        assert_eq!(terms.len(), 2);
        assert!(matches!(ast.kind(terms[0]), NodeKind::Group { capture: Some(1), .. }));
        let NodeKind::CharacterClass { set } = ast.kind(terms[1]) else {
            panic!("expected a class");
        };
        assert!(set.contains(u16::from(b'c')) && set.contains(u16::from(b'C')));
    }

    #[test]
    fn quantifiers_wrap_atoms() {
        let ast = parse_str("a{2,3}?", "").unwrap();
        let terms = root_terms(&ast);
        let NodeKind::Group {
            capture: None,
            quantifier: Some(q),
            ..
        } = ast.kind(terms[0])
        else {
            panic!("expected a quantified group");
        };
        assert_eq!(*q, Quantifier::new(2, Some(3), false));
    }

    #[test]
    fn braces_without_quantifier_are_literal() {
        let ast = parse_str("a{,5}", "").unwrap();
        assert_eq!(root_terms(&ast).len(), 5);
        assert!(parse_str("a{,5}", "u").is_err());
    }

    #[test]
    fn backreference_versus_octal() {
        let ast = parse_str("(a)\\1", "").unwrap();
        assert!(ast.has_back_references());
        let ast = parse_str("a\\1", "").unwrap();
        assert!(!ast.has_back_references());
        let ast = parse_str("(?<x>a)\\k<x>", "").unwrap();
        assert!(ast.has_back_references());
        assert_eq!(ast.group_names(), &[("x".to_string(), 1)]);
    }

    #[test]
    fn parent_links() {
        let ast = parse_str("a(b)", "").unwrap();
        for slot in ast.node_slots() {
            for child in ast.children(slot) {
                assert_eq!(ast.node(child).parent, Some(slot));
            }
        }
        assert_eq!(ast.node(ast.root()).parent, Some(ast.root_parent()));
    }

    #[test]
    fn lookbehind_sets_prefix_length() {
        let ast = parse_str("(?<=ab)c", "").unwrap();
        assert_eq!(ast.wrapped_prefix_length(), 2);
        let ast = parse_str("^a", "m").unwrap();
        assert_eq!(ast.wrapped_prefix_length(), 1);
    }

    #[test]
    fn syntax_errors() {
        let cases = [
            ("*", "Nothing to repeat"),
            ("a{3,2}", "numbers out of order in {} quantifier"),
            ("[z-a]", "Range out of order in character class"),
            ("(a", "Unterminated group"),
            ("a)", "Unmatched ')'"),
            ("[a", "Unterminated character class"),
            ("(?<n>a)(?<n>b)", "Duplicate capture group name"),
            ("(?<=a)*", "Nothing to repeat"),
            ("^*", "Nothing to repeat"),
            ("[😀]", "astral code points in character classes are not supported"),
        ];
        for (pattern, message) in cases {
            let err = parse_str(pattern, "").unwrap_err();
            assert_eq!(err.message, message, "pattern {pattern}");
        }
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let deep = format!("{}a{}", "(?:".repeat(50_000), ")".repeat(50_000));
        let err = parse_str(&deep, "").unwrap_err();
        assert_eq!(err.message, "Regular expression too deeply nested");
        let err = parse_str(&"(?=".repeat(MAX_NESTING_DEPTH + 1), "").unwrap_err();
        assert_eq!(err.message, "Regular expression too deeply nested");

        let n = MAX_NESTING_DEPTH;
        let ast = parse_str(&format!("{}a{}", "(".repeat(n), ")".repeat(n)), "").unwrap();
        assert_eq!(ast.group_count(), n + 1);
    }

    #[test]
    fn astral_literal_becomes_surrogate_pair() {
        let ast = parse_str("😀", "").unwrap();
        let terms = root_terms(&ast);
        assert_eq!(terms.len(), 1);
        assert_eq!(ast.children(ast.children(terms[0])[0]).len(), 2);
    }

    #[test]
    fn dot_excludes_line_terminators() {
        let ast = parse_str(".", "").unwrap();
        let NodeKind::CharacterClass { set } = ast.kind(root_terms(&ast)[0]) else {
            panic!("expected a class");
        };
        assert!(!set.contains(0x0A) && set.contains(u16::from(b'x')));
        let ast = parse_str(".", "s").unwrap();
        let NodeKind::CharacterClass { set } = ast.kind(root_terms(&ast)[0]) else {
            panic!("expected a class");
        };
        assert!(set.is_full());
    }
}
