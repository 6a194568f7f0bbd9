//! Connection classification and edge scoring for the resolver.

use bio::bio_types::strand::Strand;

use crate::constants::{
    MAX_OPPOSITE_OVERLAP, OVERLAP_PENALTY_FACTOR, STOP_CODON_OFFSET,
};
use crate::model::ScoringModel;
use crate::node::{Node, intergenic_mod};

/// The nine legal ways two nodes can follow each other on the path.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnectionType {
    /// Forward start to its forward stop: a gene span.
    ForwardGene,
    /// Reverse stop to a reverse start: a reverse gene span.
    ReverseGene,
    /// Forward stop to a later forward start: intergenic gap.
    ForwardIntergenic,
    /// Reverse start to a later reverse stop: intergenic gap.
    ReverseIntergenic,
    /// Forward stop to reverse stop with a gene caught between two
    /// opposite-strand genes.
    TripleOverlap,
    /// Forward stop to forward stop: same-strand operon link through an
    /// overlapping start.
    ForwardOperon,
    /// Reverse stop to reverse stop: reverse operon link.
    ReverseOperon,
    /// Forward stop to an overlapping reverse start.
    OverlappingOpposite,
    /// Reverse start to forward start: adjacent divergent genes.
    DivergentStarts,
    Invalid,
}

/// A start or stop node that nothing has connected into cannot act as a
/// path source when it would imply a gene with no beginning.
#[must_use]
pub fn is_unreachable_source(node: &Node) -> bool {
    node.traceback.is_none()
        && ((node.strand == Strand::Forward && node.is_stop())
            || (node.strand == Strand::Reverse && node.is_start()))
}

/// Classify the connection from `n1` to `n2` (`n1` earlier in position
/// order).
#[must_use]
pub fn classify(n1: &Node, n2: &Node) -> ConnectionType {
    let n1_stop = n1.is_stop();
    let n2_stop = n2.is_stop();

    // Same strand, different frame: gene spans are impossible
    if n1.strand == n2.strand && n1.frame() != n2.frame() {
        if n1.strand == Strand::Forward && !n1_stop && n2_stop {
            return ConnectionType::Invalid;
        }
        if n1.strand == Strand::Reverse && n1_stop && !n2_stop {
            return ConnectionType::Invalid;
        }
    }

    match (n1.strand, n1_stop, n2.strand, n2_stop) {
        (Strand::Forward, false, Strand::Forward, true) => ConnectionType::ForwardGene,
        (Strand::Reverse, true, Strand::Reverse, false) => ConnectionType::ReverseGene,
        (Strand::Forward, true, Strand::Forward, false) => ConnectionType::ForwardIntergenic,
        (Strand::Reverse, false, Strand::Reverse, true) => ConnectionType::ReverseIntergenic,
        (Strand::Forward, true, Strand::Reverse, true) => ConnectionType::TripleOverlap,
        (Strand::Forward, true, Strand::Forward, true) => ConnectionType::ForwardOperon,
        (Strand::Reverse, true, Strand::Reverse, true) => ConnectionType::ReverseOperon,
        (Strand::Forward, true, Strand::Reverse, false) => ConnectionType::OverlappingOpposite,
        (Strand::Reverse, false, Strand::Forward, false) => ConnectionType::DivergentStarts,
        _ => ConnectionType::Invalid,
    }
}

/// One evaluated edge.
#[derive(Debug)]
struct Link {
    left: usize,
    right: usize,
    overlap: i32,
    middle_frame: Option<usize>,
    score: f64,
    seed_modifier: f64,
}

impl Link {
    const fn new(left: usize, right: usize) -> Self {
        Self {
            left,
            right,
            overlap: 0,
            middle_frame: None,
            score: 0.0,
            seed_modifier: 0.0,
        }
    }
}

/// Evaluate the edge from `source` to `target` and update the target's
/// best-predecessor state when the edge improves it.
///
/// Equal-score edges keep the earlier predecessor: the caller iterates
/// predecessors in increasing position order and this update requires a
/// strict improvement to replace.
pub fn score_connection(
    nodes: &mut [Node],
    source: usize,
    target: usize,
    model: &ScoringModel,
    final_pass: bool,
) {
    if is_unreachable_source(&nodes[source]) {
        return;
    }

    let link = match classify(&nodes[source], &nodes[target]) {
        ConnectionType::Invalid => return,
        ConnectionType::ForwardGene => forward_gene(nodes, source, target, model, final_pass),
        ConnectionType::ReverseGene => reverse_gene(nodes, source, target, model, final_pass),
        ConnectionType::ForwardIntergenic => {
            forward_intergenic(nodes, source, target, model, final_pass)
        }
        ConnectionType::ReverseIntergenic => {
            reverse_intergenic(nodes, source, target, model, final_pass)
        }
        ConnectionType::TripleOverlap => triple_overlap(nodes, source, target, model, final_pass),
        ConnectionType::ForwardOperon => forward_operon(nodes, source, target, model, final_pass),
        ConnectionType::ReverseOperon => reverse_operon(nodes, source, target, model, final_pass),
        ConnectionType::OverlappingOpposite => {
            overlapping_opposite(nodes, source, target, model, final_pass)
        }
        ConnectionType::DivergentStarts => {
            divergent_starts(nodes, source, target, model, final_pass)
        }
    };

    let Some(mut link) = link else {
        return;
    };

    if !final_pass {
        link.score = (link.right as i32 - link.left as i32 + 1 - link.overlap * 2) as f64
            * link.seed_modifier;
    }

    let candidate = nodes[source].total_score + link.score;
    if candidate > nodes[target].total_score {
        nodes[target].total_score = candidate;
        nodes[target].traceback = Some(source);
        nodes[target].overlap_frame = link.middle_frame;
    }
}

fn gene_span_score(node: &Node) -> f64 {
    node.coding_score + node.start_score
}

fn seed_modifier(node: &Node, model: &ScoringModel) -> f64 {
    model.gc_frame_bias[0] * node.gc_frame_scores[0]
        + model.gc_frame_bias[1] * node.gc_frame_scores[1]
        + model.gc_frame_bias[2] * node.gc_frame_scores[2]
}

fn forward_gene(
    nodes: &[Node],
    source: usize,
    target: usize,
    model: &ScoringModel,
    final_pass: bool,
) -> Option<Link> {
    // The start must belong to the target stop's ORF
    if nodes[target].stop_position >= nodes[source].index as isize {
        return None;
    }
    let mut link = Link::new(nodes[source].index, nodes[target].index + STOP_CODON_OFFSET);
    if final_pass {
        link.score = gene_span_score(&nodes[source]);
    } else {
        link.seed_modifier = seed_modifier(&nodes[source], model);
    }
    Some(link)
}

fn reverse_gene(
    nodes: &[Node],
    source: usize,
    target: usize,
    model: &ScoringModel,
    final_pass: bool,
) -> Option<Link> {
    if nodes[source].stop_position <= nodes[target].index as isize {
        return None;
    }
    let mut link = Link::new(
        nodes[source].index - STOP_CODON_OFFSET,
        nodes[target].index,
    );
    if final_pass {
        link.score = gene_span_score(&nodes[target]);
    } else {
        link.seed_modifier = seed_modifier(&nodes[target], model);
    }
    Some(link)
}

fn forward_intergenic(
    nodes: &[Node],
    source: usize,
    target: usize,
    model: &ScoringModel,
    final_pass: bool,
) -> Option<Link> {
    let mut link = Link::new(nodes[source].index + 2, nodes[target].index);
    if link.left >= link.right {
        return None;
    }
    if final_pass {
        link.score = intergenic_mod(&nodes[source], &nodes[target], model);
    }
    Some(link)
}

fn reverse_intergenic(
    nodes: &[Node],
    source: usize,
    target: usize,
    model: &ScoringModel,
    final_pass: bool,
) -> Option<Link> {
    let mut link = Link::new(nodes[source].index, nodes[target].index - 2);
    if link.left >= link.right {
        return None;
    }
    if final_pass {
        link.score = intergenic_mod(&nodes[source], &nodes[target], model);
    }
    Some(link)
}

fn divergent_starts(
    nodes: &[Node],
    source: usize,
    target: usize,
    model: &ScoringModel,
    final_pass: bool,
) -> Option<Link> {
    let mut link = Link::new(nodes[source].index, nodes[target].index);
    if link.left >= link.right {
        return None;
    }
    if final_pass {
        link.score = intergenic_mod(&nodes[source], &nodes[target], model);
    }
    Some(link)
}

fn forward_operon(
    nodes: &[Node],
    source: usize,
    target: usize,
    model: &ScoringModel,
    final_pass: bool,
) -> Option<Link> {
    if nodes[target].stop_position >= nodes[source].index as isize {
        return None;
    }
    let middle = nodes[source].frame_starts[nodes[target].frame()]?;

    let mut link = Link::new(nodes[middle].index, nodes[target].index + 2);
    if final_pass {
        link.score = gene_span_score(&nodes[middle])
            + intergenic_mod(&nodes[source], &nodes[middle], model);
    } else {
        link.seed_modifier = seed_modifier(&nodes[middle], model);
    }
    Some(link)
}

fn reverse_operon(
    nodes: &[Node],
    source: usize,
    target: usize,
    model: &ScoringModel,
    final_pass: bool,
) -> Option<Link> {
    if nodes[source].stop_position <= nodes[target].index as isize {
        return None;
    }
    let middle = nodes[target].frame_starts[nodes[source].frame()]?;

    let mut link = Link::new(nodes[source].index - 2, nodes[middle].index);
    if final_pass {
        link.score = gene_span_score(&nodes[middle])
            + intergenic_mod(&nodes[middle], &nodes[target], model);
    } else {
        link.seed_modifier = seed_modifier(&nodes[middle], model);
    }
    Some(link)
}

fn triple_overlap(
    nodes: &[Node],
    source: usize,
    target: usize,
    model: &ScoringModel,
    final_pass: bool,
) -> Option<Link> {
    let mut link = Link::new(nodes[source].index + 2, nodes[target].index - 2);
    if link.left >= link.right {
        return None;
    }

    let mut best = 0.0f64;
    for frame in 0..3 {
        let Some(middle) = nodes[target].frame_starts[frame] else {
            continue;
        };

        let overlap = link.left as i32 - nodes[middle].stop_position as i32 + 3;
        if overlap <= 0 || overlap >= MAX_OPPOSITE_OVERLAP {
            continue;
        }
        if overlap >= nodes[middle].index as i32 - link.left as i32 {
            continue;
        }
        let Some(previous) = nodes[source].traceback else {
            continue;
        };
        if overlap >= nodes[middle].stop_position as i32 - nodes[previous].index as i32 - 2 {
            continue;
        }

        let value = if final_pass {
            gene_span_score(&nodes[middle]) + intergenic_mod(&nodes[middle], &nodes[target], model)
        } else {
            seed_modifier(&nodes[middle], model)
        };
        if value > best {
            link.middle_frame = Some(frame);
            link.overlap = overlap;
            best = value;
        }
    }

    if let Some(frame) = link.middle_frame {
        if let Some(middle) = nodes[target].frame_starts[frame] {
            if final_pass {
                link.score = gene_span_score(&nodes[middle])
                    + intergenic_mod(&nodes[middle], &nodes[target], model);
            } else {
                link.seed_modifier = seed_modifier(&nodes[middle], model);
            }
        }
    } else if final_pass {
        link.score = intergenic_mod(&nodes[source], &nodes[target], model);
    }
    Some(link)
}

fn overlapping_opposite(
    nodes: &[Node],
    source: usize,
    target: usize,
    model: &ScoringModel,
    final_pass: bool,
) -> Option<Link> {
    let source_end = nodes[source].index as i32 + STOP_CODON_OFFSET as i32;
    let target_stop = nodes[target].stop_position as i32 - STOP_CODON_OFFSET as i32;

    if target_stop >= source_end {
        return None;
    }
    let overlap = source_end - target_stop + 1;
    if overlap >= MAX_OPPOSITE_OVERLAP {
        return None;
    }
    if overlap >= nodes[target].index as i32 - nodes[source].index as i32 + 4 {
        return None;
    }
    let previous_bound = nodes[source]
        .traceback
        .map(|i| nodes[i].index as i32)
        .unwrap_or(0);
    if overlap >= nodes[target].stop_position as i32 - 3 - previous_bound + 1 {
        return None;
    }

    let mut link = Link::new(target_stop.max(0) as usize, nodes[target].index);
    link.overlap = overlap;
    if final_pass {
        link.score = OVERLAP_PENALTY_FACTOR.mul_add(
            -model.start_weight,
            gene_span_score(&nodes[target]),
        );
    } else {
        link.seed_modifier = seed_modifier(&nodes[target], model);
    }
    Some(link)
}
