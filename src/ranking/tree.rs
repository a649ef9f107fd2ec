//! Nested comment assembly
//!
//! Comments are stored flat with a parent-id foreign key. The nested view is
//! built on demand from an index of parent -> children positions, walking the
//! forest iteratively so reply depth is unbounded.

use serde::Serialize;
use std::collections::HashMap;

/// A record that can be placed in a reply tree
pub trait TreeItem {
    fn id(&self) -> i64;
    fn parent_id(&self) -> Option<i64>;
}

/// One node of the tree: the record itself plus its direct replies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode<T> {
    #[serde(flatten)]
    pub item: T,
    /// Always present, empty for leaf comments
    pub replies: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    /// Number of nodes in this subtree, including self
    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.replies.iter());
        }
        count
    }
}

/// Assemble a post's comments into a forest of top-level nodes.
///
/// Sibling order is the input order; nothing is re-sorted. A comment whose
/// parent is missing from `items` (or that sits on a parent cycle) is
/// promoted to top level and logged as a data-integrity warning.
pub fn build_tree<T: TreeItem>(items: Vec<T>) -> Vec<TreeNode<T>> {
    let count = items.len();
    let position: HashMap<i64, usize> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| (item.id(), idx))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut roots: Vec<usize> = Vec::new();

    for (idx, item) in items.iter().enumerate() {
        match item.parent_id() {
            None => roots.push(idx),
            Some(parent_id) => match position.get(&parent_id) {
                Some(&parent) if parent != idx => children[parent].push(idx),
                _ => {
                    tracing::warn!(
                        comment_id = item.id(),
                        parent_id,
                        "Dangling parent reference, treating comment as top-level"
                    );
                    roots.push(idx);
                }
            },
        }
    }

    // Pre-order walk from every root
    let mut visited = vec![false; count];
    let mut order: Vec<usize> = Vec::with_capacity(count);
    for &root in &roots {
        walk(root, &children, &mut visited, &mut order);
    }

    // Anything not reached sits on a parent cycle
    for idx in 0..count {
        if !visited[idx] {
            tracing::warn!(
                comment_id = items[idx].id(),
                "Comment unreachable from any top-level comment, treating as top-level"
            );
            roots.push(idx);
            walk(idx, &children, &mut visited, &mut order);
        }
    }

    // Reverse pre-order guarantees every child is built before its parent
    let mut pending: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut built: Vec<Option<TreeNode<T>>> = (0..count).map(|_| None).collect();

    for &idx in order.iter().rev() {
        let replies = children[idx]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        if let Some(item) = pending[idx].take() {
            built[idx] = Some(TreeNode { item, replies });
        }
    }

    roots
        .into_iter()
        .filter_map(|root| built[root].take())
        .collect()
}

fn walk(start: usize, children: &[Vec<usize>], visited: &mut [bool], order: &mut Vec<usize>) {
    let mut stack = vec![start];
    while let Some(idx) = stack.pop() {
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        order.push(idx);
        // Reversed so the first child is popped first
        for &child in children[idx].iter().rev() {
            if !visited[child] {
                stack.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: i64,
        parent: Option<i64>,
    }

    impl TreeItem for Item {
        fn id(&self) -> i64 {
            self.id
        }

        fn parent_id(&self) -> Option<i64> {
            self.parent
        }
    }

    fn item(id: i64, parent: Option<i64>) -> Item {
        Item { id, parent }
    }

    fn ids<T: TreeItem>(nodes: &[TreeNode<T>]) -> Vec<i64> {
        nodes.iter().map(|n| n.item.id()).collect()
    }

    #[test]
    fn test_empty_input() {
        let tree: Vec<TreeNode<Item>> = build_tree(Vec::new());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_nested_chain_and_sibling_root() {
        // A(1) <- B(2) <- C(3), D(4) top-level
        let tree = build_tree(vec![
            item(1, None),
            item(2, Some(1)),
            item(3, Some(2)),
            item(4, None),
        ]);

        assert_eq!(ids(&tree), vec![1, 4]);
        let a = &tree[0];
        assert_eq!(ids(&a.replies), vec![2]);
        let b = &a.replies[0];
        assert_eq!(ids(&b.replies), vec![3]);
        assert!(b.replies[0].replies.is_empty());
        assert!(tree[1].replies.is_empty());
    }

    #[test]
    fn test_preserves_input_order_of_siblings() {
        let tree = build_tree(vec![
            item(10, None),
            item(5, Some(10)),
            item(7, None),
            item(3, Some(10)),
            item(8, Some(10)),
        ]);

        assert_eq!(ids(&tree), vec![10, 7]);
        assert_eq!(ids(&tree[0].replies), vec![5, 3, 8]);
    }

    #[test]
    fn test_child_listed_before_parent() {
        let tree = build_tree(vec![item(2, Some(1)), item(1, None)]);
        assert_eq!(ids(&tree), vec![1]);
        assert_eq!(ids(&tree[0].replies), vec![2]);
    }

    #[test]
    fn test_dangling_parent_becomes_top_level() {
        let tree = build_tree(vec![item(1, None), item(2, Some(99)), item(3, Some(2))]);
        assert_eq!(ids(&tree), vec![1, 2]);
        assert_eq!(ids(&tree[1].replies), vec![3]);
    }

    #[test]
    fn test_self_parent_becomes_top_level() {
        let tree = build_tree(vec![item(1, Some(1))]);
        assert_eq!(ids(&tree), vec![1]);
        assert!(tree[0].replies.is_empty());
    }

    #[test]
    fn test_cycle_does_not_lose_comments() {
        let tree = build_tree(vec![item(1, None), item(2, Some(3)), item(3, Some(2))]);
        let total: usize = tree.iter().map(|n| n.subtree_size()).sum();
        assert_eq!(total, 3);
        assert_eq!(ids(&tree), vec![1, 2]);
        assert_eq!(ids(&tree[1].replies), vec![3]);
    }

    #[test]
    fn test_deep_chain() {
        let depth = 5_000;
        let mut items = vec![item(0, None)];
        items.extend((1..depth).map(|i| item(i, Some(i - 1))));

        let tree = build_tree(items);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].subtree_size(), depth as usize);
    }

    #[test]
    fn test_serializes_with_flattened_item_and_replies() {
        #[derive(Serialize)]
        struct Named {
            id: i64,
            name: &'static str,
        }

        let node = TreeNode {
            item: Named { id: 1, name: "a" },
            replies: vec![],
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "name": "a", "replies": []}));
    }
}
