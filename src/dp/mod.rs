//! Dynamic-programming resolution of the optimal gene set.
//!
//! The node array, sorted by position, implicitly defines a DAG: an
//! edge connects two nodes when the corresponding genes/gaps are
//! compatible under the overlap rules. The resolver computes the
//! longest (maximum-score) path with a bounded look-back window and
//! reconstructs it by backtrace.
//!
//! Determinism: equal-score alternatives resolve to the earlier
//! (leftmost) node, then to the more canonical start codon (ATG over
//! GTG over TTG). Rerunning on identical input yields the identical
//! path.

pub mod connections;
pub mod refine;

pub use refine::eliminate_negative_genes;

use bio::bio_types::strand::Strand;

use crate::constants::MAX_NODE_DISTANCE;
use crate::dp::connections::score_connection;
use crate::model::ScoringModel;
use crate::node::{Node, traceback_indices};

/// Run the resolver over scored nodes.
///
/// `final_pass == false` is the seed mode used during training, where
/// edges are weighted by GC-frame agreement alone; `true` uses the full
/// node scores. Returns the index of the best terminal node, or `None`
/// when no path exists.
pub fn resolve(nodes: &mut [Node], model: &ScoringModel, final_pass: bool) -> Option<usize> {
    if nodes.is_empty() {
        return None;
    }

    for node in nodes.iter_mut() {
        node.total_score = 0.0;
        node.traceback = None;
        node.trace_forward = None;
    }

    for i in 0..nodes.len() {
        let window_start = lookback_start(nodes, i);
        if window_start >= i {
            continue;
        }
        for j in window_start..i {
            score_connection(nodes, j, i, model, final_pass);
        }
    }

    let best = best_terminal(nodes)?;

    resolve_triple_overlaps(nodes, best);
    resolve_simple_overlaps(nodes, best);
    link_forward(nodes, best);

    Some(best)
}

/// First predecessor index considered for node `i`.
///
/// Normally `i - MAX_NODE_DISTANCE`, but when the node's own ORF began
/// before the window (a reverse start or forward stop whose bounding
/// stop lies further back), the window is extended to reach it, then
/// widened by one more window so the ORF's predecessors stay visible.
#[inline]
fn lookback_start(nodes: &[Node], i: usize) -> usize {
    let mut window_start = i.saturating_sub(MAX_NODE_DISTANCE);
    let node = &nodes[i];

    let needs_reach = (node.strand == Strand::Reverse && node.is_start())
        || (node.strand == Strand::Forward && node.is_stop());
    if needs_reach && nodes[window_start].index as isize >= node.stop_position {
        while window_start > 0 && nodes[window_start].index as isize != node.stop_position {
            window_start -= 1;
        }
    }

    window_start.saturating_sub(MAX_NODE_DISTANCE)
}

fn is_terminal(node: &Node) -> bool {
    (node.strand == Strand::Forward && node.is_stop())
        || (node.strand == Strand::Reverse && node.is_start())
}

/// Highest-scoring terminal node; on exact ties the earlier node wins,
/// then the more canonical start codon.
fn best_terminal(nodes: &[Node]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, node) in nodes.iter().enumerate() {
        if !is_terminal(node) {
            continue;
        }
        match best {
            None => best = Some(i),
            Some(b) => {
                let incumbent = &nodes[b];
                if node.total_score > incumbent.total_score
                    || (node.total_score == incumbent.total_score
                        && (node.index < incumbent.index
                            || (node.index == incumbent.index
                                && node.codon.tie_break_rank()
                                    < incumbent.codon.tie_break_rank())))
                {
                    best = Some(i);
                }
            }
        }
    }
    best
}

/// Rewire paths where a gene is sandwiched between two opposite-strand
/// genes: the skipped middle gene recorded in `overlap_frame` is
/// spliced back into the chain.
fn resolve_triple_overlaps(nodes: &mut [Node], start: usize) {
    let path: Vec<usize> = traceback_indices(nodes, start).collect();

    for window in path.windows(2) {
        let (current, next) = (window[0], window[1]);
        let needs_resolution = nodes[current].strand == Strand::Reverse
            && nodes[current].is_stop()
            && nodes[next].strand == Strand::Forward
            && nodes[next].is_stop()
            && nodes[current].overlap_frame.is_some()
            && nodes[current].index > nodes[next].index;
        if !needs_resolution {
            continue;
        }

        let Some(middle_start) =
            nodes[current].overlap_frame.and_then(|f| nodes[current].frame_starts[f])
        else {
            continue;
        };

        let mut middle_stop = middle_start;
        while middle_stop > 0
            && nodes[middle_stop].index as isize != nodes[middle_start].stop_position
        {
            middle_stop -= 1;
        }

        nodes[current].traceback = Some(middle_start);
        nodes[middle_start].traceback = Some(middle_stop);
        nodes[middle_stop].overlap_frame = None;
        nodes[middle_stop].traceback = Some(next);
    }
}

/// Insert the overlapping start a stop-to-stop (operon) or
/// stop-to-reverse-start connection implied, so the backtrace visits a
/// complete start/stop pair for every gene.
fn resolve_simple_overlaps(nodes: &mut [Node], start: usize) {
    let path: Vec<usize> = traceback_indices(nodes, start).collect();

    for window in path.windows(2) {
        let (current, next) = (window[0], window[1]);
        let current_stop = nodes[current].is_stop();
        let next_stop = nodes[next].is_stop();

        match (nodes[current].strand, current_stop, nodes[next].strand, next_stop) {
            (Strand::Reverse, false, Strand::Forward, true) => {
                if let Some(stop_index) = (0..=current)
                    .rev()
                    .find(|&k| nodes[k].index as isize == nodes[current].stop_position)
                {
                    nodes[current].traceback = Some(stop_index);
                    nodes[stop_index].traceback = Some(next);
                }
            }
            (Strand::Forward, true, Strand::Forward, true) => {
                let frame = nodes[current].frame();
                nodes[current].traceback = nodes[next].frame_starts[frame];
                if let Some(inserted) = nodes[current].traceback {
                    nodes[inserted].traceback = Some(next);
                }
            }
            (Strand::Reverse, true, Strand::Reverse, true) => {
                let frame = nodes[next].frame();
                nodes[current].traceback = nodes[current].frame_starts[frame];
                if let Some(inserted) = nodes[current].traceback {
                    nodes[inserted].traceback = Some(next);
                }
            }
            _ => {}
        }
    }
}

fn link_forward(nodes: &mut [Node], start: usize) {
    let mut path = start;
    while let Some(previous) = nodes[path].traceback {
        nodes[previous].trace_forward = Some(path);
        path = previous;
    }
}

/// Count complete, non-eliminated genes on the forward-linked path.
#[must_use]
pub fn count_path_genes(nodes: &[Node], terminal: usize) -> usize {
    let mut head = terminal;
    while let Some(previous) = nodes[head].traceback {
        head = previous;
    }

    let mut count = 0;
    let mut current = Some(head);
    while let Some(i) = current {
        let node = &nodes[i];
        if !node.eliminated
            && ((node.strand == Strand::Forward && node.is_stop())
                || (node.strand == Strand::Reverse && node.is_start()))
            && node.traceback.is_some()
        {
            count += 1;
        }
        current = node.trace_forward;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::CodonType;

    fn start(index: usize, strand: Strand, stop: isize, total: f64) -> Node {
        let mut node = Node::new(index, strand, CodonType::Atg, stop);
        node.coding_score = total;
        node
    }

    fn stop(index: usize, strand: Strand, stop: isize) -> Node {
        Node::new(index, strand, CodonType::Stop, stop)
    }

    #[test]
    fn test_resolve_empty() {
        let model = ScoringModel::default();
        let mut nodes = vec![];
        assert!(resolve(&mut nodes, &model, true).is_none());
    }

    #[test]
    fn test_resolve_single_forward_gene() {
        let model = ScoringModel::default();
        let mut nodes = vec![
            start(100, Strand::Forward, 400, 8.0),
            stop(400, Strand::Forward, -6),
        ];
        let best = resolve(&mut nodes, &model, true);
        assert_eq!(best, Some(1));
        assert_eq!(nodes[1].traceback, Some(0));
        assert_eq!(nodes[0].trace_forward, Some(1));
    }

    #[test]
    fn test_resolve_single_reverse_gene() {
        let model = ScoringModel::default();
        let mut nodes = vec![
            stop(100, Strand::Reverse, 400),
            start(400, Strand::Reverse, 100, 8.0),
        ];
        let best = resolve(&mut nodes, &model, true);
        assert_eq!(best, Some(1));
        assert_eq!(nodes[1].traceback, Some(0));
    }

    #[test]
    fn test_resolve_chains_two_genes() {
        let model = ScoringModel::default();
        let mut nodes = vec![
            start(100, Strand::Forward, 400, 8.0),
            stop(400, Strand::Forward, 900),
            start(501, Strand::Forward, 900, 8.0),
            stop(900, Strand::Forward, -6),
        ];
        let best = resolve(&mut nodes, &model, true).unwrap();
        assert_eq!(best, 3);
        let path: Vec<usize> = traceback_indices(&nodes, best).collect();
        assert_eq!(path, vec![3, 2, 1, 0]);
        assert_eq!(count_path_genes(&nodes, best), 2);
    }

    #[test]
    fn test_leftmost_start_wins_ties() {
        let model = ScoringModel::default();
        // Two starts with identical scores sharing a stop: the DP must
        // keep the earlier one.
        let mut nodes = vec![
            start(100, Strand::Forward, 400, 8.0),
            start(130, Strand::Forward, 400, 8.0),
            stop(400, Strand::Forward, -6),
        ];
        // Equal coding, equal start scores
        let best = resolve(&mut nodes, &model, true).unwrap();
        assert_eq!(best, 2);
        assert_eq!(nodes[2].traceback, Some(0));
    }

    #[test]
    fn test_count_path_genes_skips_eliminated() {
        let model = ScoringModel::default();
        let mut nodes = vec![
            start(100, Strand::Forward, 400, -20.0),
            stop(400, Strand::Forward, -6),
        ];
        let best = resolve(&mut nodes, &model, true).unwrap();
        nodes[0].eliminated = true;
        nodes[1].eliminated = true;
        assert_eq!(count_path_genes(&nodes, best), 0);
    }

    #[test]
    fn test_lookback_window_bounded() {
        let model = ScoringModel::default();
        let mut nodes = Vec::new();
        for k in 0..2000 {
            nodes.push(start(k * 10, Strand::Forward, (k * 10 + 5000) as isize, 0.1));
        }
        // No panic; distant nodes are simply out of window
        let _ = resolve(&mut nodes, &model, true);
    }
}
