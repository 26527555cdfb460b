use crate::charset::CharSet;
use crate::source::RegexFlags;

/// Slot of a node in the AST arena. Fixed at parse time.
pub type NodeRef = usize;

/// Dense id handed out by the node indexer. Unassigned until indexing.
pub type NodeId = usize;

/// `{min,max}` bounds of a quantified group; `max == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    pub min: u32,
    pub max: Option<u32>,
    pub greedy: bool,
}

impl Quantifier {
    pub fn new(min: u32, max: Option<u32>, greedy: bool) -> Self {
        Self { min, max, greedy }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    /// `^`
    Caret,
    /// `$`
    Dollar,
    /// `\b`
    WordBoundary,
    /// `\B`
    NonWordBoundary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Synthetic parent of the root group. Always receives id 0.
    RootParent { group: NodeRef, match_found: NodeRef },
    /// Alternation of sequences, optionally capturing and/or quantified.
    /// Quantified atoms are always wrapped in a non-capturing group.
    Group {
        alternatives: Vec<NodeRef>,
        capture: Option<usize>,
        quantifier: Option<Quantifier>,
    },
    Sequence { terms: Vec<NodeRef> },
    CharacterClass { set: CharSet },
    PositionAssertion(PositionKind),
    LookAheadAssertion {
        group: NodeRef,
        negated: bool,
        match_found: NodeRef,
    },
    LookBehindAssertion {
        group: NodeRef,
        negated: bool,
        match_found: NodeRef,
    },
    /// Refers to its target by group number, never by node.
    BackReference { group_number: usize },
    MatchFound,
}

#[derive(Debug, Clone)]
pub struct RegexNode {
    pub kind: NodeKind,
    /// Non-owning back reference to the enclosing node.
    pub parent: Option<NodeRef>,
    pub id: Option<NodeId>,
}

/// Parsed pattern. Nodes live in one arena; every structural reference is
/// an arena slot.
#[derive(Debug, Clone)]
pub struct RegexAst {
    nodes: Vec<RegexNode>,
    root_parent: NodeRef,
    root: NodeRef,
    /// Number of capture groups, group 0 included.
    group_count: usize,
    group_names: Vec<(String, usize)>,
    flags: RegexFlags,
    /// Characters of look-behind context the automaton has to see before a
    /// match start.
    wrapped_prefix_length: usize,
    /// `index[id] == Some(slot)` once the indexer ran.
    index: Vec<Option<NodeRef>>,
}

impl RegexAst {
    pub(crate) fn new(flags: RegexFlags) -> Self {
        Self {
            nodes: Vec::new(),
            root_parent: 0,
            root: 0,
            group_count: 1,
            group_names: Vec::new(),
            flags,
            wrapped_prefix_length: 0,
            index: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, kind: NodeKind) -> NodeRef {
        self.nodes.push(RegexNode {
            kind,
            parent: None,
            id: None,
        });
        self.nodes.len() - 1
    }

    /// Point the parent link of every child of `parent` at it.
    pub(crate) fn link_children(&mut self, parent: NodeRef) {
        for child in self.children(parent) {
            self.nodes[child].parent = Some(parent);
        }
    }

    pub(crate) fn set_root(&mut self, root_parent: NodeRef, root: NodeRef) {
        self.root_parent = root_parent;
        self.root = root;
    }

    pub(crate) fn set_group_count(&mut self, count: usize) {
        self.group_count = count;
    }

    pub(crate) fn set_group_names(&mut self, names: Vec<(String, usize)>) {
        self.group_names = names;
    }

    pub(crate) fn set_wrapped_prefix_length(&mut self, len: usize) {
        self.wrapped_prefix_length = len;
    }

    pub(crate) fn node_mut(&mut self, node: NodeRef) -> &mut RegexNode {
        &mut self.nodes[node]
    }

    pub(crate) fn set_index(&mut self, index: Vec<Option<NodeRef>>) {
        self.index = index;
    }

    pub fn node(&self, node: NodeRef) -> &RegexNode {
        &self.nodes[node]
    }

    pub fn kind(&self, node: NodeRef) -> &NodeKind {
        &self.nodes[node].kind
    }

    pub fn root(&self) -> NodeRef {
        self.root
    }

    pub fn root_parent(&self) -> NodeRef {
        self.root_parent
    }

    pub fn flags(&self) -> RegexFlags {
        self.flags
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn group_names(&self) -> &[(String, usize)] {
        &self.group_names
    }

    pub fn wrapped_prefix_length(&self) -> usize {
        self.wrapped_prefix_length
    }

    /// Number of nodes, the synthetic root parent excluded.
    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn node_slots(&self) -> std::ops::Range<NodeRef> {
        0..self.nodes.len()
    }

    pub fn index(&self) -> &[Option<NodeRef>] {
        &self.index
    }

    pub fn is_indexed(&self) -> bool {
        !self.index.is_empty()
    }

    /// Look up a node by its assigned id.
    pub fn by_id(&self, id: NodeId) -> Option<NodeRef> {
        self.index.get(id).copied().flatten()
    }

    pub fn id_of(&self, node: NodeRef) -> Option<NodeId> {
        self.nodes[node].id
    }

    /// Children in lexical order. Sentinels of subtree roots come last.
    pub fn children(&self, node: NodeRef) -> Vec<NodeRef> {
        match &self.nodes[node].kind {
            NodeKind::RootParent { group, match_found }
            | NodeKind::LookAheadAssertion {
                group, match_found, ..
            }
            | NodeKind::LookBehindAssertion {
                group, match_found, ..
            } => vec![*group, *match_found],
            NodeKind::Group { alternatives, .. } => alternatives.clone(),
            NodeKind::Sequence { terms } => terms.clone(),
            NodeKind::CharacterClass { .. }
            | NodeKind::PositionAssertion(_)
            | NodeKind::BackReference { .. }
            | NodeKind::MatchFound => Vec::new(),
        }
    }

    /// Sentinel of the subtree rooted at `node`, if `node` is a subtree root.
    pub fn subtree_match_found(&self, node: NodeRef) -> Option<NodeRef> {
        match &self.nodes[node].kind {
            NodeKind::RootParent { match_found, .. }
            | NodeKind::LookAheadAssertion { match_found, .. }
            | NodeKind::LookBehindAssertion { match_found, .. } => Some(*match_found),
            _ => None,
        }
    }

    pub fn is_subtree_root(&self, node: NodeRef) -> bool {
        self.subtree_match_found(node).is_some()
    }

    /// Capture group numbers nested inside `node`, the node's own capture
    /// included, as a half-open range.
    pub fn capture_range(&self, node: NodeRef) -> Option<(usize, usize)> {
        let mut lo = usize::MAX;
        let mut hi = 0;
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            if let NodeKind::Group {
                capture: Some(nr), ..
            } = &self.nodes[n].kind
            {
                lo = lo.min(*nr);
                hi = hi.max(*nr + 1);
            }
            stack.extend(self.children(n));
        }
        (lo < hi).then_some((lo, hi))
    }

    /// True if any node of the tree satisfies `pred`.
    pub fn any_node(&self, pred: impl Fn(&NodeKind) -> bool) -> bool {
        self.nodes.iter().any(|n| pred(&n.kind))
    }

    pub fn has_back_references(&self) -> bool {
        self.any_node(|k| matches!(k, NodeKind::BackReference { .. }))
    }

    /// True if `node` can match without consuming input. Assertions and
    /// back-references count as empty.
    pub fn is_nullable(&self, node: NodeRef) -> bool {
        match &self.nodes[node].kind {
            NodeKind::Group {
                quantifier: Some(q), ..
            } if q.min == 0 => true,
            NodeKind::Group { .. } => self.body_is_nullable(node),
            NodeKind::Sequence { terms } => terms.iter().all(|&t| self.is_nullable(t)),
            NodeKind::CharacterClass { .. } => false,
            NodeKind::RootParent { group, .. } => self.is_nullable(*group),
            NodeKind::PositionAssertion(_)
            | NodeKind::LookAheadAssertion { .. }
            | NodeKind::LookBehindAssertion { .. }
            | NodeKind::BackReference { .. }
            | NodeKind::MatchFound => true,
        }
    }

    /// True if one pass through the alternatives of `group` can match empty,
    /// whatever its quantifier.
    pub fn body_is_nullable(&self, group: NodeRef) -> bool {
        match &self.nodes[group].kind {
            NodeKind::Group { alternatives, .. } => alternatives.iter().any(|&a| self.is_nullable(a)),
            _ => self.is_nullable(group),
        }
    }

    /// The body of a look-behind, if it is a plain sequence of character
    /// classes: exactly one alternative, no quantifiers, no captures.
    pub fn plain_look_behind_body(&self, node: NodeRef) -> Option<Vec<CharSet>> {
        let NodeKind::LookBehindAssertion { group, .. } = &self.nodes[node].kind else {
            return None;
        };
        match self.plain_alternatives(*group)?.as_mut_slice() {
            [only] => Some(std::mem::take(only)),
            _ => None,
        }
    }

    /// The alternatives of a look-ahead body, if each is a plain sequence of
    /// character classes.
    pub fn plain_look_ahead_body(&self, node: NodeRef) -> Option<Vec<Vec<CharSet>>> {
        let NodeKind::LookAheadAssertion { group, .. } = &self.nodes[node].kind else {
            return None;
        };
        self.plain_alternatives(*group)
    }

    fn plain_alternatives(&self, group: NodeRef) -> Option<Vec<Vec<CharSet>>> {
        let NodeKind::Group {
            alternatives,
            capture: None,
            quantifier: None,
        } = &self.nodes[group].kind
        else {
            return None;
        };
        alternatives.iter().map(|&alt| self.plain_sequence(alt)).collect()
    }

    /// Classes of a sequence with no quantifiers, captures or assertions.
    /// Single-alternative groups, such as surrogate pairs, are flattened.
    fn plain_sequence(&self, seq: NodeRef) -> Option<Vec<CharSet>> {
        let NodeKind::Sequence { terms } = &self.nodes[seq].kind else {
            return None;
        };
        let mut classes = Vec::with_capacity(terms.len());
        for &t in terms {
            match &self.nodes[t].kind {
                NodeKind::CharacterClass { set } => classes.push(set.clone()),
                NodeKind::Group { .. } => match self.plain_alternatives(t)?.as_mut_slice() {
                    [only] => classes.append(only),
                    _ => return None,
                },
                _ => return None,
            }
        }
        Some(classes)
    }
}
