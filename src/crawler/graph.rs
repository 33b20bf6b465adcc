//! In-memory link graph of one crawl session
//!
//! Nodes are URLs that entered the frontier, with their discovery order.
//! Edges are every outgoing hyperlink of a parsed page, including external
//! and nofollow links. An edge's target is looked up by URL when the graph
//! is read, never frozen when the link was parsed.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One outgoing hyperlink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkEdge {
    pub target_url: String,
    pub anchor_text: String,
    pub is_internal: bool,
    pub nofollow: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    orders: HashMap<String, u32>,
    edges: BTreeMap<u32, Vec<LinkEdge>>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, order: u32, url: &str) {
        self.orders.entry(url.to_string()).or_insert(order);
    }

    /// Adds an edge, ignoring a repeat link to the same target from the same page
    pub fn add_edge(&mut self, source: u32, edge: LinkEdge) {
        let edges = self.edges.entry(source).or_default();
        if edges.iter().all(|e| e.target_url != edge.target_url) {
            edges.push(edge);
        }
    }

    /// Discovery order of an edge's target, if that URL ever entered the frontier
    ///
    /// Resolved against the final node set, so a link parsed before its
    /// target was enqueued still points at it.
    pub fn target_of(&self, edge: &LinkEdge) -> Option<u32> {
        self.orders.get(&edge.target_url).copied()
    }

    pub fn outgoing(&self, source: u32) -> &[LinkEdge] {
        self.edges.get(&source).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|v| v.len()).sum()
    }

    /// Number of distinct internal pages linking to each node, self-links excluded
    pub fn internal_inlink_counts(&self) -> HashMap<u32, usize> {
        let mut sources: HashMap<u32, HashSet<u32>> = HashMap::new();
        for (&source, edges) in &self.edges {
            for edge in edges.iter().filter(|e| e.is_internal) {
                if let Some(target) = self.target_of(edge) {
                    if target != source {
                        sources.entry(target).or_default().insert(source);
                    }
                }
            }
        }
        sources
            .into_iter()
            .map(|(target, set)| (target, set.len()))
            .collect()
    }
}
