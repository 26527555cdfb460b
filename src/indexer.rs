//! Dense id assignment for AST nodes.
//!
//! Ids below `initial_id` are reserved:
//!
//! | id                 | slot                                  |
//! |--------------------|---------------------------------------|
//! | `0`                | root parent                           |
//! | `1 ..= k + 1`      | anchored initial state for offset `i` |
//! | `k + 2 ..= 2k + 2` | unanchored initial state for `i`      |
//!
//! where `k` is the unanchored-prefix bound. The last slot of the index,
//! after every node id, belongs to the unanchored loop-back state.

use crate::ast::{NodeId, NodeKind, NodeRef, RegexAst};
use crate::error::{internal, CompileResult};

/// The reserved id layout of an indexed AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedIds {
    prefix_bound: usize,
    index_len: usize,
}

impl ReservedIds {
    pub fn new(prefix_bound: usize, number_of_nodes: usize) -> Self {
        let initial_id = 3 + 2 * prefix_bound;
        Self {
            prefix_bound,
            index_len: initial_id + number_of_nodes + 1,
        }
    }

    pub fn prefix_bound(&self) -> usize {
        self.prefix_bound
    }

    /// First id handed to a real node.
    pub fn initial_id(&self) -> NodeId {
        3 + 2 * self.prefix_bound
    }

    pub fn anchored_initial(&self, offset: usize) -> NodeId {
        1 + offset
    }

    pub fn unanchored_initial(&self, offset: usize) -> NodeId {
        2 + self.prefix_bound + offset
    }

    pub fn loop_back(&self) -> NodeId {
        self.index_len - 1
    }

    pub fn index_len(&self) -> usize {
        self.index_len
    }
}

/// Assign ids to every node reachable from the root parent, depth-first in
/// lexical order, and install the id → node index in the AST.
///
/// A `MatchFound` sentinel that already carries an id is skipped; any other
/// node seen twice is an internal error.
pub fn index_nodes(ast: &mut RegexAst) -> CompileResult<ReservedIds> {
    let reserved = ReservedIds::new(ast.wrapped_prefix_length(), ast.number_of_nodes());
    let mut index: Vec<Option<NodeRef>> = vec![None; reserved.index_len()];
    let root_parent = ast.root_parent();
    ast.node_mut(root_parent).id = Some(0);
    index[0] = Some(root_parent);

    let mut next_id = reserved.initial_id();
    let mut stack: Vec<NodeRef> = ast.children(root_parent).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        if let Some(id) = ast.id_of(node) {
            if matches!(ast.kind(node), NodeKind::MatchFound) {
                continue;
            }
            return internal(format!("node {node} already has id {id}"));
        }
        // The last slot is reserved for the loop-back state.
        if next_id >= reserved.loop_back() {
            return internal(format!("id {next_id} out of range for an index of {}", reserved.index_len()));
        }
        ast.node_mut(node).id = Some(next_id);
        index[next_id] = Some(node);
        next_id += 1;
        stack.extend(ast.children(node).into_iter().rev());
    }
    ast.set_index(index);
    Ok(reserved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;
    use crate::parser::parse;
    use crate::source::RegexSource;

    fn indexed(pattern: &str) -> (RegexAst, ReservedIds) {
        let mut ast = parse(&RegexSource::from_parts(pattern, "").unwrap()).unwrap();
        let reserved = index_nodes(&mut ast).unwrap();
        (ast, reserved)
    }

    #[test]
    fn index_round_trips() {
        for pattern in ["(a|(b))c", "x(?=y)z", "(?<=ab)c|d*", "[a-z]+?$", ""] {
            let (ast, reserved) = indexed(pattern);
            let mut seen = std::collections::HashSet::new();
            for slot in ast.node_slots() {
                let id = ast.id_of(slot).unwrap();
                assert!(seen.insert(id), "duplicate id {id} in {pattern}");
                assert_eq!(ast.by_id(id), Some(slot));
            }
            assert_eq!(ast.index().len(), reserved.index_len());
        }
    }

    #[test]
    fn reserved_layout() {
        let (ast, reserved) = indexed("(?<=ab)c");
        assert_eq!(reserved.prefix_bound(), 2);
        assert_eq!(reserved.initial_id(), 7);
        assert_eq!(ast.id_of(ast.root_parent()), Some(0));
        assert_eq!(ast.id_of(ast.root()), Some(7));
        assert_eq!(reserved.anchored_initial(2), 3);
        assert_eq!(reserved.unanchored_initial(0), 4);
        assert_eq!(reserved.loop_back(), reserved.index_len() - 1);
        for id in 1..reserved.initial_id() {
            assert_eq!(ast.by_id(id), None);
        }
    }

    #[test]
    fn ids_follow_lexical_order() {
        let (ast, _) = indexed("ab");
        let NodeKind::Group { alternatives, .. } = ast.kind(ast.root()) else {
            panic!("root is not a group");
        };
        let terms = ast.children(alternatives[0]);
        let ids: Vec<_> = terms.iter().map(|&t| ast.id_of(t).unwrap()).collect();
        assert!(ids[0] < ids[1]);
        let NodeKind::RootParent { match_found, .. } = ast.kind(ast.root_parent()) else {
            panic!("no root parent");
        };
        assert!(ast.id_of(*match_found).unwrap() > ids[1]);
    }

    #[test]
    fn shared_sentinel_gets_one_id() {
        let (mut ast, _) = indexed("a");
        let NodeKind::RootParent { match_found, .. } = ast.kind(ast.root_parent()).clone() else {
            panic!("no root parent");
        };
        let before = ast.id_of(match_found);
        // Re-running over an already indexed sentinel keeps its id.
        for slot in ast.node_slots() {
            if slot != match_found {
                ast.node_mut(slot).id = None;
            }
        }
        index_nodes(&mut ast).unwrap();
        assert_eq!(ast.id_of(match_found), before);
    }

    #[test]
    fn duplicate_assignment_is_internal_error() {
        let (mut ast, _) = indexed("ab");
        let err = index_nodes(&mut ast).unwrap_err();
        assert!(matches!(err, CompileError::Internal(_)));
    }
}
