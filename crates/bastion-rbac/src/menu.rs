//! Menu rule tree.
//!
//! Menu rules describe the back-office's protected endpoints. Groups sit at
//! the root (`pid == 0`) and carry no path; leaves map one-to-one onto
//! grantable `(path, method)` pairs.
use crate::types::PolicyRule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RuleNode {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub method: String,
    pub pid: u64,
}

impl RuleNode {
    pub fn new(
        id: u64,
        pid: u64,
        name: impl Into<String>,
        path: impl Into<String>,
        method: impl AsRef<str>,
    ) -> Self {
        Self {
            id,
            pid,
            name: name.into(),
            path: path.into(),
            method: method.as_ref().to_ascii_uppercase(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.pid == 0
    }

    /// Groups never become permission tuples.
    pub fn is_grantable(&self) -> bool {
        !self.is_root() && !self.path.trim().is_empty() && !self.method.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RuleTree {
    #[serde(flatten)]
    pub node: RuleNode,
    pub children: Vec<RuleTree>,
}

/// Group `nodes` under their parents.
///
/// Roots and siblings are ordered by id. Nodes whose parent is absent are
/// dropped, as are cycles that never reach a root.
pub fn build_tree(nodes: &[RuleNode]) -> Vec<RuleTree> {
    let mut by_parent: HashMap<u64, Vec<usize>> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        by_parent.entry(node.pid).or_default().push(idx);
    }
    for children in by_parent.values_mut() {
        children.sort_by_key(|&idx| nodes[idx].id);
    }

    fn assemble(
        idx: usize,
        nodes: &[RuleNode],
        by_parent: &HashMap<u64, Vec<usize>>,
        depth: usize,
    ) -> RuleTree {
        let node = nodes[idx].clone();
        let children = if depth >= nodes.len() {
            Vec::new()
        } else {
            by_parent
                .get(&node.id)
                .map(|children| {
                    children
                        .iter()
                        .filter(|&&child| nodes[child].id != node.id)
                        .map(|&child| assemble(child, nodes, by_parent, depth + 1))
                        .collect()
                })
                .unwrap_or_default()
        };
        RuleTree { node, children }
    }

    by_parent
        .get(&0)
        .map(|roots| {
            roots
                .iter()
                .map(|&idx| assemble(idx, nodes, &by_parent, 0))
                .collect()
        })
        .unwrap_or_default()
}

/// Parent chain of `id`, nearest parent first, ending at its root.
pub fn ancestors(nodes: &[RuleNode], id: u64) -> Vec<RuleNode> {
    let by_id: HashMap<u64, &RuleNode> = nodes.iter().map(|node| (node.id, node)).collect();
    let mut chain = Vec::new();
    let mut current = by_id.get(&id).map(|node| node.pid);
    while let Some(pid) = current {
        if pid == 0 || chain.len() >= nodes.len() {
            break;
        }
        match by_id.get(&pid) {
            Some(parent) => {
                chain.push((*parent).clone());
                current = Some(parent.pid);
            }
            None => break,
        }
    }
    chain
}

/// Permission tuples for `role` covering the grantable nodes in `nodes`.
pub fn grantable_rules(role: &str, nodes: &[RuleNode]) -> Vec<PolicyRule> {
    nodes
        .iter()
        .filter(|node| node.is_grantable())
        .map(|node| PolicyRule::new(role, node.path.clone(), &node.method))
        .collect()
}

/// Built-in menu rules seeded on first start.
///
/// Paths are route templates, matching what the authorization layer sees.
pub fn default_rules() -> Vec<RuleNode> {
    vec![
        RuleNode::new(1, 0, "Admin accounts", "", ""),
        RuleNode::new(2, 1, "List admins", "/admin/admin/list", "POST"),
        RuleNode::new(3, 1, "Add admin", "/admin/admin/add", "POST"),
        RuleNode::new(4, 1, "Edit admin", "/admin/admin/edit/:id", "PUT"),
        RuleNode::new(5, 1, "Delete admin", "/admin/admin/delete/:id", "DELETE"),
        RuleNode::new(6, 1, "Admin info", "/admin/admin/info/:id", "GET"),
        RuleNode::new(7, 0, "Roles", "", ""),
        RuleNode::new(8, 7, "List roles", "/admin/roles/list", "POST"),
        RuleNode::new(9, 7, "Add role", "/admin/roles/add", "POST"),
        RuleNode::new(10, 7, "Edit role", "/admin/roles/edit/:id", "PUT"),
        RuleNode::new(11, 7, "Delete role", "/admin/roles/delete/:alias", "DELETE"),
        RuleNode::new(12, 7, "Role info", "/admin/roles/info/:alias", "GET"),
        RuleNode::new(13, 7, "All roles", "/admin/roles/getAllRoles", "GET"),
        RuleNode::new(14, 0, "Menu rules", "", ""),
        RuleNode::new(15, 14, "List rules", "/admin/rules/list", "GET"),
    ]
}
