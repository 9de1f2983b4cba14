// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Arena-backed trace tree: records every path the explorer has already
//! taken through the action model so repeated generation runs keep finding
//! new paths instead of retreading old ones.
//!
//! One node per state reached; arcs are keyed by the action that was taken
//! to leave that state. A node is a leaf once `restart` is called on it
//! (end of a generated trace); it is "free" if it or any descendant still
//! has an untried arc.

use std::collections::HashMap;

use rand::seq::IteratorRandom;

/// An action plus its concrete arguments, stringified so it can key a map.
/// `("publish", "TopicA", "2")` style tuples in the original model become a
/// flat string vector here.
pub type ActionKey = Vec<String>;

#[derive(Debug)]
struct Node {
    arcs: HashMap<ActionKey, usize>,
    arcs_added: bool,
    used: bool,
    leaf: bool,
}

impl Node {
    fn new() -> Self {
        Self {
            arcs: HashMap::new(),
            arcs_added: false,
            used: false,
            leaf: false,
        }
    }
}

/// A dynamic tree of every path taken through the model so far, so the
/// generator can avoid repeating a fully-explored path.
pub struct Traces {
    nodes: Vec<Node>,
    root: usize,
    cur: usize,
}

impl Default for Traces {
    fn default() -> Self {
        Self::new()
    }
}

impl Traces {
    #[must_use]
    pub fn new() -> Self {
        let mut root = Node::new();
        root.used = true;
        Self {
            nodes: vec![root],
            root: 0,
            cur: 0,
        }
    }

    /// Marks the current node as an end of the line and rewinds to the root.
    pub fn restart(&mut self) {
        self.nodes[self.cur].leaf = true;
        self.cur = self.root;
    }

    /// Records every action reachable from the current state, the first
    /// time this state is visited. Later visits are no-ops: the arcs were
    /// already recorded.
    pub fn add_arcs(&mut self, keys: impl IntoIterator<Item = ActionKey>) {
        if self.nodes[self.cur].arcs_added {
            return;
        }
        for key in keys {
            let idx = self.nodes.len();
            self.nodes.push(Node::new());
            self.nodes[self.cur].arcs.insert(key, idx);
        }
        self.nodes[self.cur].arcs_added = true;
    }

    /// Moves to the child reached by `key`, marking it used.
    pub fn select_action(&mut self, key: &ActionKey) {
        let next = self.nodes[self.cur].arcs[key];
        self.cur = next;
        self.nodes[next].used = true;
    }

    /// A node is free if it has never been visited, or some descendant of
    /// it (reachable through its recorded arcs) has never been visited.
    /// A leaf is never free: it marks a path the explorer chose to end.
    fn is_free(&self, idx: usize) -> bool {
        let node = &self.nodes[idx];
        if node.leaf {
            return false;
        }
        if !node.used {
            return true;
        }
        node.arcs.values().any(|&child| self.is_free(child))
    }

    /// Returns one action, chosen uniformly at random from the current
    /// state's arcs that still lead somewhere unexplored, optionally
    /// narrowed first by a selection policy.
    pub fn find_next_path(
        &self,
        policy: Option<&dyn Fn(&[ActionKey]) -> Vec<ActionKey>>,
    ) -> Option<ActionKey> {
        let mut frees: Vec<ActionKey> = self.nodes[self.cur]
            .arcs
            .iter()
            .filter(|(_, &child)| self.is_free(child))
            .map(|(key, _)| key.clone())
            .collect();

        if frees.is_empty() {
            return None;
        }
        if let Some(policy) = policy {
            frees = policy(&frees);
            if frees.is_empty() {
                return None;
            }
        }
        let mut rng = rand::rng();
        frees.into_iter().choose(&mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ActionKey {
        vec![s.to_string()]
    }

    #[test]
    fn fresh_root_has_no_arcs_until_added() {
        let traces = Traces::new();
        assert!(traces.find_next_path(None).is_none());
    }

    #[test]
    fn single_arc_is_found_once_then_exhausted() {
        let mut traces = Traces::new();
        traces.add_arcs([key("a")]);
        let found = traces.find_next_path(None);
        assert_eq!(found, Some(key("a")));

        traces.select_action(&key("a"));
        traces.restart();

        // The root's only arc leads to a now-leaf, fully-used node: nothing
        // left to explore from the root.
        assert!(traces.find_next_path(None).is_none());
    }

    #[test]
    fn second_arc_still_free_after_first_explored() {
        let mut traces = Traces::new();
        traces.add_arcs([key("a"), key("b")]);
        traces.select_action(&key("a"));
        traces.restart();

        let found = traces.find_next_path(None);
        assert_eq!(found, Some(key("b")));
    }

    #[test]
    fn add_arcs_is_idempotent_per_state() {
        let mut traces = Traces::new();
        traces.add_arcs([key("a")]);
        traces.add_arcs([key("b")]); // ignored, arcs already recorded for root
        assert!(traces.find_next_path(None) == Some(key("a")));
    }

    #[test]
    fn policy_narrows_the_free_set() {
        let mut traces = Traces::new();
        traces.add_arcs([key("a"), key("b")]);
        let only_b: &dyn Fn(&[ActionKey]) -> Vec<ActionKey> =
            &|frees: &[ActionKey]| frees.iter().filter(|k| k == &&key("b")).cloned().collect();
        let found = traces.find_next_path(Some(only_b));
        assert_eq!(found, Some(key("b")));
    }

    #[test]
    fn deeper_exploration_still_reports_free_when_grandchild_unused() {
        let mut traces = Traces::new();
        traces.add_arcs([key("a")]);
        traces.select_action(&key("a"));
        traces.add_arcs([key("b")]);
        // Do not select "b": the root's "a" arc still leads somewhere free.
        traces.cur = traces.root;
        assert_eq!(traces.find_next_path(None), Some(key("a")));
    }
}
