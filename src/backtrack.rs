use std::fmt;
use std::sync::Arc;

use crate::ast::{NodeKind, NodeRef, PositionKind, Quantifier, RegexAst};
use crate::charset::{canonicalize, is_line_terminator, is_word_char, CharSet};
use crate::error::RegexSyntaxError;
use crate::input::CharSequence;
use crate::parser::parse;
use crate::result::MatchResult;
use crate::source::{RegexFlags, RegexSource};

/// A compiled pattern that does not go through the automata.
pub trait FallbackMatcher: Send + Sync + fmt::Debug {
    fn execute(&self, input: &dyn CharSequence, from: usize) -> MatchResult;
}

/// Compiles the patterns the deterministic engine rejects.
pub trait FallbackCompiler: Send + Sync + fmt::Debug {
    fn compile(&self, source: &RegexSource) -> Result<Arc<dyn FallbackMatcher>, RegexSyntaxError>;
}

/// The built-in fallback: a backtracking matcher over a small compiled
/// program, run on an explicit stack so that long inputs cannot exhaust the
/// call stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktrackCompiler;

impl FallbackCompiler for BacktrackCompiler {
    fn compile(&self, source: &RegexSource) -> Result<Arc<dyn FallbackMatcher>, RegexSyntaxError> {
        let ast = parse(source)?;
        let mut builder = ProgramBuilder {
            ast: &ast,
            insts: Vec::new(),
            registers: 0,
        };
        builder.node(ast.root_parent(), false);
        Ok(Arc::new(Backtracker {
            insts: builder.insts,
            registers: builder.registers,
            slots: 2 * ast.group_count(),
            flags: ast.flags(),
        }))
    }
}

#[derive(Debug, Clone)]
enum Inst {
    /// Consume one code unit of the set, reading leftwards when `backward`.
    Char { set: CharSet, backward: bool },
    /// Try `first`, then `second`.
    Split { first: usize, second: usize },
    Jmp(usize),
    /// Remember the current position in a register.
    Mark { reg: usize },
    /// Record a group spanning from the position in `reg` to here.
    Capture { group: usize, reg: usize, backward: bool },
    ClearSlots { lo: usize, hi: usize },
    Assert(PositionKind),
    /// Run the body that follows as an atomic sub-match, then continue at
    /// `next` without moving.
    Look { negated: bool, next: usize },
    LookEnd,
    BackRef { group: usize, backward: bool },
    RepeatInit { counter: usize },
    /// Decide between another iteration (`pc + 1`) and `exit`.
    RepeatTest {
        counter: usize,
        min: u32,
        max: Option<u32>,
        greedy: bool,
        exit: usize,
    },
    /// End of an iteration started at the position in `mark`. An empty
    /// iteration past the minimum fails.
    RepeatNext {
        counter: usize,
        mark: usize,
        min: u32,
        head: usize,
    },
    Match,
}

struct ProgramBuilder<'a> {
    ast: &'a RegexAst,
    insts: Vec<Inst>,
    registers: usize,
}

impl ProgramBuilder<'_> {
    fn push(&mut self, inst: Inst) -> usize {
        self.insts.push(inst);
        self.insts.len() - 1
    }

    fn register(&mut self) -> usize {
        self.registers += 1;
        self.registers - 1
    }

    /// Emit `node`. Backward code consumes right to left, so sequences are
    /// laid out in reverse.
    fn node(&mut self, node: NodeRef, backward: bool) {
        let ast = self.ast;
        match ast.kind(node) {
            NodeKind::RootParent { group, .. } => {
                self.node(*group, backward);
                self.push(Inst::Match);
            }
            NodeKind::Group { quantifier: None, .. } => self.group(node, backward),
            NodeKind::Group {
                quantifier: Some(q), ..
            } => self.repeat(node, *q, backward),
            NodeKind::Sequence { terms } => {
                if backward {
                    terms.iter().rev().for_each(|&t| self.node(t, backward));
                } else {
                    terms.iter().for_each(|&t| self.node(t, backward));
                }
            }
            NodeKind::CharacterClass { set } => {
                self.push(Inst::Char {
                    set: set.clone(),
                    backward,
                });
            }
            NodeKind::PositionAssertion(kind) => {
                self.push(Inst::Assert(*kind));
            }
            NodeKind::LookAheadAssertion { group, negated, .. } => self.look(*group, *negated, false),
            NodeKind::LookBehindAssertion { group, negated, .. } => self.look(*group, *negated, true),
            NodeKind::BackReference { group_number } => {
                self.push(Inst::BackRef {
                    group: *group_number,
                    backward,
                });
            }
            NodeKind::MatchFound => {}
        }
    }

    fn look(&mut self, body: NodeRef, negated: bool, backward: bool) {
        let look = self.push(Inst::Look { negated, next: 0 });
        self.node(body, backward);
        self.push(Inst::LookEnd);
        let end = self.insts.len();
        if let Inst::Look { next, .. } = &mut self.insts[look] {
            *next = end;
        }
    }

    /// One pass through a group's alternatives, recording its capture once
    /// an alternative completes.
    fn group(&mut self, node: NodeRef, backward: bool) {
        let ast = self.ast;
        let NodeKind::Group {
            alternatives, capture, ..
        } = ast.kind(node)
        else {
            return;
        };
        let start = capture.map(|group| {
            let reg = self.register();
            self.push(Inst::Mark { reg });
            (group, reg)
        });
        let mut jumps = Vec::new();
        for (i, &alt) in alternatives.iter().enumerate() {
            if i + 1 == alternatives.len() {
                self.node(alt, backward);
                break;
            }
            let split = self.push(Inst::Split {
                first: self.insts.len() + 1,
                second: 0,
            });
            self.node(alt, backward);
            jumps.push(self.push(Inst::Jmp(0)));
            let second_alt = self.insts.len();
            if let Inst::Split { second, .. } = &mut self.insts[split] {
                *second = second_alt;
            }
        }
        let end = self.insts.len();
        for jump in jumps {
            self.insts[jump] = Inst::Jmp(end);
        }
        if let Some((group, reg)) = start {
            self.push(Inst::Capture { group, reg, backward });
        }
    }

    // Captures inside the group are reset before every iteration.
    fn repeat(&mut self, node: NodeRef, q: Quantifier, backward: bool) {
        let counter = self.register();
        let mark = self.register();
        self.push(Inst::RepeatInit { counter });
        let head = self.push(Inst::RepeatTest {
            counter,
            min: q.min,
            max: q.max,
            greedy: q.greedy,
            exit: 0,
        });
        self.push(Inst::Mark { reg: mark });
        if let Some((lo, hi)) = self.ast.capture_range(node) {
            self.push(Inst::ClearSlots { lo: 2 * lo, hi: 2 * hi });
        }
        self.group(node, backward);
        self.push(Inst::RepeatNext {
            counter,
            mark,
            min: q.min,
            head,
        });
        let end = self.insts.len();
        if let Inst::RepeatTest { exit, .. } = &mut self.insts[head] {
            *exit = end;
        }
    }
}

#[derive(Debug)]
pub struct Backtracker {
    insts: Vec<Inst>,
    registers: usize,
    slots: usize,
    flags: RegexFlags,
}

impl FallbackMatcher for Backtracker {
    fn execute(&self, input: &dyn CharSequence, from: usize) -> MatchResult {
        let len = input.len();
        if from > len {
            return MatchResult::NO_MATCH;
        }
        let last = if self.flags.sticky { from } else { len };
        let mut vm = Vm {
            insts: &self.insts,
            input,
            flags: self.flags,
            regs: vec![0; self.registers],
        };
        let mut caps = vec![-1; self.slots];
        for start in from..=last {
            caps.fill(-1);
            if vm.run(0, start, &mut caps).is_some() {
                return MatchResult::from_slots(&caps);
            }
        }
        MatchResult::NO_MATCH
    }
}

/// Work left on the backtracking stack.
#[derive(Clone, Copy, Debug)]
enum Job {
    Resume { pc: usize, pos: usize },
    RestoreSlot { slot: usize, value: i32 },
    RestoreReg { reg: usize, value: usize },
}

struct Vm<'a> {
    insts: &'a [Inst],
    input: &'a dyn CharSequence,
    flags: RegexFlags,
    regs: Vec<usize>,
}

impl Vm<'_> {
    fn char_at(&self, pos: usize) -> Option<u16> {
        (pos < self.input.len()).then(|| self.input.char_at(pos))
    }

    fn is_word_at(&self, pos: usize) -> bool {
        self.char_at(pos).is_some_and(is_word_char)
    }

    fn set_slot(jobs: &mut Vec<Job>, caps: &mut [i32], slot: usize, value: i32) {
        jobs.push(Job::RestoreSlot { slot, value: caps[slot] });
        caps[slot] = value;
    }

    fn set_reg(&mut self, jobs: &mut Vec<Job>, reg: usize, value: usize) {
        jobs.push(Job::RestoreReg {
            reg,
            value: self.regs[reg],
        });
        self.regs[reg] = value;
    }

    /// Run from `pc` at `pos` until `Match` or `LookEnd`, returning the
    /// position reached. On success `caps` holds the winning captures; on
    /// failure it is back to what it was.
    fn run(&mut self, pc: usize, pos: usize, caps: &mut [i32]) -> Option<usize> {
        let insts = self.insts;
        let mut jobs = vec![Job::Resume { pc, pos }];
        while let Some(job) = jobs.pop() {
            let (mut pc, mut pos) = match job {
                Job::Resume { pc, pos } => (pc, pos),
                Job::RestoreSlot { slot, value } => {
                    caps[slot] = value;
                    continue;
                }
                Job::RestoreReg { reg, value } => {
                    self.regs[reg] = value;
                    continue;
                }
            };
            loop {
                match &insts[pc] {
                    Inst::Char { set, backward } => {
                        let at = if *backward { pos.checked_sub(1) } else { Some(pos) };
                        match at.and_then(|at| self.char_at(at)) {
                            Some(c) if set.contains(c) => {
                                pos = if *backward { pos - 1 } else { pos + 1 };
                                pc += 1;
                            }
                            _ => break,
                        }
                    }
                    Inst::Split { first, second } => {
                        jobs.push(Job::Resume { pc: *second, pos });
                        pc = *first;
                    }
                    Inst::Jmp(target) => pc = *target,
                    Inst::Mark { reg } => {
                        self.set_reg(&mut jobs, *reg, pos);
                        pc += 1;
                    }
                    Inst::Capture { group, reg, backward } => {
                        let other = self.regs[*reg];
                        let (start, end) = if *backward { (pos, other) } else { (other, pos) };
                        Self::set_slot(&mut jobs, caps, 2 * group, start as i32);
                        Self::set_slot(&mut jobs, caps, 2 * group + 1, end as i32);
                        pc += 1;
                    }
                    Inst::ClearSlots { lo, hi } => {
                        for slot in *lo..*hi {
                            Self::set_slot(&mut jobs, caps, slot, -1);
                        }
                        pc += 1;
                    }
                    Inst::Assert(kind) => {
                        if !self.position_holds(*kind, pos) {
                            break;
                        }
                        pc += 1;
                    }
                    Inst::Look { negated, next } => {
                        let saved = caps.to_vec();
                        let found = self.run(pc + 1, pos, caps).is_some();
                        if found && *negated {
                            caps.copy_from_slice(&saved);
                        } else if found {
                            for (slot, &value) in saved.iter().enumerate() {
                                if caps[slot] != value {
                                    jobs.push(Job::RestoreSlot { slot, value });
                                }
                            }
                        }
                        if found == *negated {
                            break;
                        }
                        pc = *next;
                    }
                    Inst::LookEnd | Inst::Match => return Some(pos),
                    Inst::BackRef { group, backward } => match self.back_reference(caps, *group, pos, *backward) {
                        Some(next) => {
                            pos = next;
                            pc += 1;
                        }
                        None => break,
                    },
                    Inst::RepeatInit { counter } => {
                        self.set_reg(&mut jobs, *counter, 0);
                        pc += 1;
                    }
                    Inst::RepeatTest {
                        counter,
                        min,
                        max,
                        greedy,
                        exit,
                    } => {
                        let count = self.regs[*counter];
                        if count < *min as usize {
                            pc += 1;
                        } else if max.is_some_and(|max| count >= max as usize) {
                            pc = *exit;
                        } else if *greedy {
                            jobs.push(Job::Resume { pc: *exit, pos });
                            pc += 1;
                        } else {
                            jobs.push(Job::Resume { pc: pc + 1, pos });
                            pc = *exit;
                        }
                    }
                    Inst::RepeatNext {
                        counter,
                        mark,
                        min,
                        head,
                    } => {
                        let count = self.regs[*counter];
                        if count >= *min as usize && pos == self.regs[*mark] {
                            break;
                        }
                        self.set_reg(&mut jobs, *counter, count.saturating_add(1));
                        pc = *head;
                    }
                }
            }
        }
        None
    }

    fn position_holds(&self, kind: PositionKind, pos: usize) -> bool {
        let multiline = self.flags.multiline;
        match kind {
            PositionKind::Caret => pos == 0 || (multiline && self.char_at(pos - 1).is_some_and(is_line_terminator)),
            PositionKind::Dollar => {
                pos == self.input.len() || (multiline && self.char_at(pos).is_some_and(is_line_terminator))
            }
            PositionKind::WordBoundary => (pos > 0 && self.is_word_at(pos - 1)) != self.is_word_at(pos),
            PositionKind::NonWordBoundary => !self.position_holds(PositionKind::WordBoundary, pos),
        }
    }

    /// Where a back reference to `group` ends when it starts at `pos`. An
    /// unset group matches the empty string.
    fn back_reference(&self, caps: &[i32], group: usize, pos: usize, backward: bool) -> Option<usize> {
        let (s, e) = (caps[2 * group], caps[2 * group + 1]);
        if s < 0 || e < 0 {
            return Some(pos);
        }
        let (s, len) = (s as usize, (e - s) as usize);
        let at = if backward {
            pos.checked_sub(len)?
        } else if pos + len <= self.input.len() {
            pos
        } else {
            return None;
        };
        let unicode = self.flags.unicode;
        let same = |a: u16, b: u16| {
            if self.flags.ignore_case {
                canonicalize(a, unicode) == canonicalize(b, unicode)
            } else {
                a == b
            }
        };
        let equal = (0..len).all(|i| same(self.input.char_at(s + i), self.input.char_at(at + i)));
        equal.then(|| if backward { at } else { pos + len })
    }
}
