//! Post-resolution cleanup of the gene path.
//!
//! The bounded look-back window occasionally admits a marginal gene
//! that a full-width search would have skipped. This pass adds the
//! operon adjustments the path implies and then drops genes whose
//! combined score ends up negative.

use bio::bio_types::strand::Strand;

use crate::model::ScoringModel;
use crate::node::{Node, intergenic_mod};

/// Apply intergenic adjustments along the resolved path, then mark
/// negative-scoring genes as eliminated.
pub fn eliminate_negative_genes(
    nodes: &mut [Node],
    terminal: Option<usize>,
    model: &ScoringModel,
) {
    let Some(terminal) = terminal else {
        return;
    };

    let head = path_head(nodes, terminal);
    add_operon_adjustments(nodes, head, model);
    mark_negative_genes(nodes, head);
}

fn path_head(nodes: &[Node], terminal: usize) -> usize {
    let mut path = terminal;
    while let Some(previous) = nodes[path].traceback {
        path = previous;
    }
    path
}

fn add_operon_adjustments(nodes: &mut [Node], head: usize, model: &ScoringModel) {
    let mut path = head;
    while let Some(next) = nodes[path].trace_forward {
        if next >= nodes.len() {
            break;
        }
        match (nodes[path].strand, nodes[path].is_stop()) {
            (Strand::Forward, true) => {
                let adjustment = intergenic_mod(&nodes[path], &nodes[next], model);
                nodes[next].start_score += adjustment;
            }
            (Strand::Reverse, false) => {
                let adjustment = intergenic_mod(&nodes[path], &nodes[next], model);
                nodes[path].start_score += adjustment;
            }
            _ => {}
        }
        path = next;
    }
}

fn mark_negative_genes(nodes: &mut [Node], head: usize) {
    let mut path = head;
    while let Some(next) = nodes[path].trace_forward {
        if next >= nodes.len() {
            break;
        }
        match (nodes[path].strand, nodes[path].is_stop()) {
            (Strand::Forward, false) => {
                if is_negative(&nodes[path]) {
                    nodes[path].eliminated = true;
                    nodes[next].eliminated = true;
                }
            }
            (Strand::Reverse, true) => {
                if is_negative(&nodes[next]) {
                    nodes[path].eliminated = true;
                    nodes[next].eliminated = true;
                }
            }
            _ => {}
        }
        path = next;
    }
}

#[inline]
fn is_negative(node: &Node) -> bool {
    node.coding_score + node.start_score < 0.0
}
