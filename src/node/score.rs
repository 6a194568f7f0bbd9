//! Node scoring: coding potential, start-site components, penalties.
//!
//! Coding potential is a three-pass computation over the sorted node
//! array. Cumulative per-frame dicodon sums make each start's score an
//! O(1) increment over its neighbor instead of an O(ORF) rescan, which
//! is what keeps whole-genome scoring tractable.

use bio::bio_types::strand::Strand;

use crate::constants::{
    CODING_SCORE_SENTINEL, CODING_SCORE_THRESHOLD, DICODON_LENGTH, GENE_SIZE_SCALING,
    LENGTH_FACTOR_MULTIPLIER, LENGTH_FACTOR_THRESHOLD, MAX_GENE_CODONS, META_LENGTH_THRESHOLD,
    META_PENALTY, META_PENALTY_DIVISOR, MIN_GENE_CODONS, MIN_META_GENE_LENGTH,
    NEGATIVE_SCORE_PENALTY, NO_MOTIF_THRESHOLD, SHORT_GENE_THRESHOLD, UPSTREAM_COMPOSITION_WEIGHT,
    UPSTREAM_SCAN_RANGE, UPSTREAM_SKIP_END, UPSTREAM_SKIP_START,
};
use crate::model::ScoringModel;
use crate::node::motif::{find_best_upstream_motif, scan_rbs};
use crate::node::Node;
use crate::sequence::dna::DnaSequence;
use crate::sequence::{is_gc, kmer_index};

/// Score every start node against the model.
///
/// Expects nodes in sorted positional order. `is_meta` enables the
/// short-fragment penalties used when predicting with generic models.
pub fn score_nodes(
    sequence: &DnaSequence,
    nodes: &mut [Node],
    model: &ScoringModel,
    is_meta: bool,
) {
    if nodes.is_empty() {
        return;
    }

    assign_orf_gc(&sequence.forward, sequence.len(), nodes);

    let no_stop_probability = no_stop_probability(model.gc_content, model.translation_table);
    coding_scores(sequence, nodes, model, no_stop_probability);

    if model.uses_sd_motifs {
        scan_rbs(sequence, nodes, model);
    } else {
        for node in nodes.iter_mut() {
            if node.is_start() {
                find_best_upstream_motif(model, sequence, node, 2);
            }
        }
    }

    let upstream_indices = upstream_scan_indices();
    for i in 0..nodes.len() {
        if nodes[i].is_stop() {
            continue;
        }
        score_start_components(sequence, &mut nodes[i], model, &upstream_indices);
        apply_penalties(sequence, &mut nodes[i], model, is_meta);
        nodes[i].total_score = nodes[i].coding_score + nodes[i].start_score;
    }
}

/// Compute coding scores alone, without the start-site components.
///
/// The trainer needs coding potential before the start tables exist;
/// full scoring is not possible until those tables are estimated.
pub fn raw_coding_scores(sequence: &DnaSequence, nodes: &mut [Node], model: &ScoringModel) {
    let p = no_stop_probability(model.gc_content, model.translation_table);
    coding_scores(sequence, nodes, model, p);
}

/// The upstream positions sampled for composition scoring: 1, 2, then
/// everything from the skip-end out to the scan range.
fn upstream_scan_indices() -> Vec<usize> {
    (1..UPSTREAM_SCAN_RANGE)
        .filter(|&i| i <= UPSTREAM_SKIP_START || i >= UPSTREAM_SKIP_END)
        .collect()
}

fn score_start_components(
    sequence: &DnaSequence,
    node: &mut Node,
    model: &ScoringModel,
    upstream_indices: &[usize],
) {
    node.type_score = model.start_type_weights[node.codon.to_index()] * model.start_weight;

    let sd_score = model.rbs_weights[node.rbs_bins[0]]
        .max(model.rbs_weights[node.rbs_bins[1]])
        * model.start_weight;
    if model.uses_sd_motifs {
        node.rbs_score = sd_score;
    } else {
        node.rbs_score = model.start_weight * node.best_motif.score;
        if node.rbs_score < sd_score && model.no_motif_weight > NO_MOTIF_THRESHOLD {
            node.rbs_score = sd_score;
        }
    }

    let (packed, start) = match node.strand {
        Strand::Forward => (&sequence.forward, node.index),
        Strand::Reverse => (&sequence.reverse, sequence.len() - 1 - node.index),
        Strand::Unknown => unreachable!(),
    };
    node.upstream_score = 0.0;
    for (slot, &offset) in upstream_indices.iter().enumerate() {
        if start < offset {
            continue;
        }
        let base = kmer_index(1, packed, start - offset);
        node.upstream_score += UPSTREAM_COMPOSITION_WEIGHT
            * model.start_weight
            * model.upstream_composition[slot][base];
    }
}

fn apply_penalties(sequence: &DnaSequence, node: &mut Node, model: &ScoringModel, is_meta: bool) {
    let gene_length = node.gene_length();

    // Short genes have weaker evidence either way; scale their start
    // components toward zero or amplify penalties proportionally.
    if gene_length < SHORT_GENE_THRESHOLD {
        let negative_factor = SHORT_GENE_THRESHOLD as f64 / gene_length as f64;
        let positive_factor = gene_length as f64 / SHORT_GENE_THRESHOLD as f64;
        for component in [
            &mut node.rbs_score,
            &mut node.upstream_score,
            &mut node.type_score,
        ] {
            if *component < 0.0 {
                *component *= negative_factor;
            } else {
                *component *= positive_factor;
            }
        }
    }

    if is_meta
        && sequence.len() < META_LENGTH_THRESHOLD
        && (node.coding_score < CODING_SCORE_THRESHOLD || gene_length < MIN_META_GENE_LENGTH)
    {
        let penalty = META_PENALTY / META_PENALTY_DIVISOR
            * (META_LENGTH_THRESHOLD - sequence.len()) as f64;
        node.coding_score -= penalty;
    }

    node.start_score = node.type_score + node.rbs_score + node.upstream_score;

    if node.coding_score < 0.0 {
        node.start_score -= NEGATIVE_SCORE_PENALTY;
    } else if node.coding_score < CODING_SCORE_THRESHOLD
        && is_meta
        && gene_length < MIN_META_GENE_LENGTH
        && node.start_score < 0.0
    {
        node.start_score -= model.start_weight;
    }
}

// --- ORF GC content ------------------------------------------------------

/// Accumulate per-ORF GC fractions for every start node, walking each
/// strand once with running per-frame GC sums.
pub fn assign_orf_gc(forward: &[u8], sequence_length: usize, nodes: &mut [Node]) {
    if nodes.is_empty() || sequence_length == 0 {
        return;
    }

    let mut gc = [0.0f64; 3];
    let mut last = [0usize; 3];

    // Forward strand, right to left
    for i in (0..nodes.len()).rev() {
        if nodes[i].strand != Strand::Forward {
            continue;
        }
        let frame = nodes[i].frame();
        if nodes[i].is_stop() {
            last[frame] = nodes[i].index;
            gc[frame] = codon_gc(forward, sequence_length, nodes[i].index);
        } else {
            if last[frame] >= 3 {
                let mut pos = last[frame] - 3;
                while pos >= nodes[i].index {
                    gc[frame] += codon_gc(forward, sequence_length, pos);
                    if pos < 3 {
                        break;
                    }
                    pos -= 3;
                }
            }
            let orf_length = nodes[i].gene_length() + 3;
            nodes[i].gc_content = gc[frame] / orf_length as f64;
            last[frame] = nodes[i].index;
        }
    }

    gc.fill(0.0);
    last.fill(0);

    // Reverse strand, left to right: a reverse ORF's stop node carries
    // a lower index than its starts, so this walks stop-to-start too.
    // GC content is complement-invariant, so counting happens directly
    // on the forward strand.
    for i in 0..nodes.len() {
        if nodes[i].strand != Strand::Reverse {
            continue;
        }
        let frame = nodes[i].frame();
        if nodes[i].is_stop() {
            last[frame] = nodes[i].index;
            gc[frame] = codon_gc_reverse(forward, sequence_length, nodes[i].index);
        } else {
            let mut pos = last[frame] + 3;
            while pos <= nodes[i].index {
                gc[frame] += codon_gc_reverse(forward, sequence_length, pos);
                pos += 3;
            }
            let orf_length = nodes[i].gene_length() + 3;
            nodes[i].gc_content = gc[frame] / orf_length as f64;
            last[frame] = nodes[i].index;
        }
    }
}

fn codon_gc(packed: &[u8], sequence_length: usize, pos: usize) -> f64 {
    (pos..pos + 3)
        .filter(|&p| p < sequence_length && is_gc(packed, p))
        .count() as f64
}

fn codon_gc_reverse(packed: &[u8], sequence_length: usize, pos: usize) -> f64 {
    (pos.saturating_sub(2)..=pos)
        .filter(|&p| p < sequence_length && is_gc(packed, p))
        .count() as f64
}

// --- Coding potential ----------------------------------------------------

/// Probability that a random codon is not a stop, given the genome's
/// composition and genetic code. Drives the length-factor model.
fn no_stop_probability(gc_content: f64, translation_table: i32) -> f64 {
    let at = 1.0 - gc_content;
    let at_squared = at * at;

    if translation_table == 11 {
        let tag_taa = (at_squared * gc_content) / 4.0;
        let tga = (at_squared * at) / 8.0;
        1.0 - (tag_taa + tga)
    } else {
        let at_stops = (at_squared * gc_content) / 8.0;
        let mixed = (at_squared * at) / 8.0;
        1.0 - (at_stops + mixed)
    }
}

fn coding_scores(
    sequence: &DnaSequence,
    nodes: &mut [Node],
    model: &ScoringModel,
    no_stop_probability: f64,
) {
    // Pass 1: cumulative dicodon sums per frame, stop to start
    cumulative_dicodon_pass(nodes, &sequence.forward, sequence.len(), Strand::Forward, model);
    cumulative_dicodon_pass(nodes, &sequence.reverse, sequence.len(), Strand::Reverse, model);

    // Pass 2: normalize against the per-frame maximum
    normalize_pass(nodes, Strand::Forward);
    normalize_pass(nodes, Strand::Reverse);

    // Pass 3: length factors
    length_factor_pass(nodes, Strand::Forward, no_stop_probability);
    length_factor_pass(nodes, Strand::Reverse, no_stop_probability);
}

fn cumulative_dicodon_pass(
    nodes: &mut [Node],
    packed: &[u8],
    sequence_length: usize,
    strand: Strand,
    model: &ScoringModel,
) {
    let mut frame_scores = [0.0f64; 3];
    let mut last = [0usize; 3];

    if strand == Strand::Forward {
        for i in (0..nodes.len()).rev() {
            if nodes[i].strand != Strand::Forward {
                continue;
            }
            let frame = nodes[i].frame();
            if nodes[i].is_stop() {
                last[frame] = nodes[i].index;
                frame_scores[frame] = 0.0;
            } else {
                if last[frame] >= 3 {
                    let mut j = last[frame] - 3;
                    loop {
                        if j < nodes[i].index {
                            break;
                        }
                        frame_scores[frame] +=
                            model.dicodon_scores[kmer_index(DICODON_LENGTH, packed, j)];
                        if j < 3 {
                            break;
                        }
                        j -= 3;
                    }
                }
                nodes[i].coding_score = frame_scores[frame];
                last[frame] = nodes[i].index;
            }
        }
    } else {
        for node in nodes.iter_mut() {
            if node.strand != Strand::Reverse {
                continue;
            }
            let frame = node.frame();
            if node.is_stop() {
                last[frame] = node.index;
                frame_scores[frame] = 0.0;
            } else {
                let mut j = last[frame] + 3;
                while j <= node.index {
                    let mirrored = sequence_length - j - 1;
                    frame_scores[frame] +=
                        model.dicodon_scores[kmer_index(DICODON_LENGTH, packed, mirrored)];
                    j += 3;
                }
                node.coding_score = frame_scores[frame];
                last[frame] = node.index;
            }
        }
    }
}

fn normalize_pass(nodes: &mut [Node], strand: Strand) {
    let mut frame_max = [CODING_SCORE_SENTINEL; 3];

    let mut visit = |node: &mut Node| {
        if node.strand != strand {
            return;
        }
        let frame = node.frame();
        if node.is_stop() {
            frame_max[frame] = CODING_SCORE_SENTINEL;
        } else if node.coding_score > frame_max[frame] {
            frame_max[frame] = node.coding_score;
        } else {
            node.coding_score -= frame_max[frame] - node.coding_score;
        }
    };

    if strand == Strand::Forward {
        for node in nodes.iter_mut() {
            visit(node);
        }
    } else {
        for node in nodes.iter_mut().rev() {
            visit(node);
        }
    }
}

fn length_factor(gene_codons: f64, no_stop_probability: f64) -> f64 {
    let floor_term = ((1.0 - no_stop_probability.powi(MIN_GENE_CODONS))
        / no_stop_probability.powi(MIN_GENE_CODONS))
    .ln();

    if gene_codons > f64::from(MAX_GENE_CODONS) {
        let mut factor = ((1.0 - no_stop_probability.powi(MAX_GENE_CODONS))
            / no_stop_probability.powi(MAX_GENE_CODONS))
        .ln();
        factor -= floor_term;
        factor * (gene_codons - f64::from(MIN_GENE_CODONS)) / GENE_SIZE_SCALING
    } else {
        ((1.0 - no_stop_probability.powf(gene_codons)) / no_stop_probability.powf(gene_codons))
            .ln()
            - floor_term
    }
}

fn length_factor_pass(nodes: &mut [Node], strand: Strand, no_stop_probability: f64) {
    let mut frame_max = [CODING_SCORE_SENTINEL; 3];

    let mut visit = |node: &mut Node| {
        if node.strand != strand {
            return;
        }
        let frame = node.frame();
        if node.is_stop() {
            frame_max[frame] = CODING_SCORE_SENTINEL;
            return;
        }

        let gene_codons = (node.gene_length() + 3) as f64 / 3.0;
        let mut factor = length_factor(gene_codons, no_stop_probability);

        if factor > frame_max[frame] {
            frame_max[frame] = factor;
        } else {
            let excess = (frame_max[frame] - factor).min(factor).max(0.0);
            factor -= excess;
        }

        if factor > LENGTH_FACTOR_THRESHOLD
            && node.coding_score < LENGTH_FACTOR_MULTIPLIER * factor
        {
            node.coding_score = LENGTH_FACTOR_MULTIPLIER * factor;
        }
        node.coding_score += factor;
    };

    if strand == Strand::Forward {
        for node in nodes.iter_mut() {
            visit(node);
        }
    } else {
        for node in nodes.iter_mut().rev() {
            visit(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{enumerate_nodes, sort_nodes};
    use crate::sequence::dna::DnaSequence;

    fn scored_fixture(dicodon_fill: f64) -> (DnaSequence, Vec<Node>, ScoringModel) {
        let mut raw = String::from("TTAATTAATTAATTAGGAGGACAATCATG");
        for _ in 0..12 {
            raw.push_str("CTAATCAAAGATTACGCGGAACAC");
        }
        raw.push_str("TAA");
        let sequence = DnaSequence::new(raw.as_bytes()).unwrap();
        let mut model = ScoringModel::default();
        model.gc_content = sequence.gc_content;
        model.dicodon_scores.fill(dicodon_fill);
        let mut nodes = enumerate_nodes(&sequence, &model);
        sort_nodes(&mut nodes);
        (sequence, nodes, model)
    }

    #[test]
    fn test_score_nodes_produces_finite_totals() {
        let (sequence, mut nodes, model) = scored_fixture(0.5);
        score_nodes(&sequence, &mut nodes, &model, false);
        for node in nodes.iter().filter(|n| n.is_start()) {
            assert!(node.total_score.is_finite());
            assert!(node.coding_score.is_finite());
        }
    }

    #[test]
    fn test_positive_dicodons_give_positive_coding() {
        let (sequence, mut nodes, model) = scored_fixture(1.0);
        score_nodes(&sequence, &mut nodes, &model, false);
        let start = nodes.iter().find(|n| n.is_start()).unwrap();
        assert!(start.coding_score > 0.0);
    }

    #[test]
    fn test_negative_coding_penalizes_start() {
        let (sequence, mut nodes_neutral, model_neutral) = scored_fixture(0.0);
        score_nodes(&sequence, &mut nodes_neutral, &model_neutral, false);
        let neutral = nodes_neutral
            .iter()
            .find(|n| n.is_start())
            .unwrap()
            .start_score;

        let (sequence, mut nodes_bad, model_bad) = scored_fixture(-2.0);
        score_nodes(&sequence, &mut nodes_bad, &model_bad, false);
        let bad = nodes_bad.iter().find(|n| n.is_start()).unwrap().start_score;

        assert!(bad < neutral);
    }

    #[test]
    fn test_metagenomic_fragment_penalty() {
        let (sequence, mut nodes_single, model) = scored_fixture(0.0);
        score_nodes(&sequence, &mut nodes_single, &model, false);
        let single = nodes_single
            .iter()
            .find(|n| n.is_start())
            .unwrap()
            .coding_score;

        let (_, mut nodes_meta, _) = scored_fixture(0.0);
        score_nodes(&sequence, &mut nodes_meta, &model, true);
        let meta = nodes_meta
            .iter()
            .find(|n| n.is_start())
            .unwrap()
            .coding_score;

        // The fixture is a short fragment, so meta mode penalizes it
        assert!(meta < single);
    }

    #[test]
    fn test_orf_gc_assignment() {
        let (sequence, mut nodes, _) = scored_fixture(0.0);
        assign_orf_gc(&sequence.forward, sequence.len(), &mut nodes);
        let start = nodes.iter().find(|n| n.is_start()).unwrap();
        assert!(start.gc_content > 0.0 && start.gc_content < 1.0);
    }

    #[test]
    fn test_no_stop_probability_range() {
        let p = no_stop_probability(0.5, 11);
        assert!(p > 0.9 && p < 1.0);
        let p4 = no_stop_probability(0.3, 4);
        assert!(p4 > 0.9 && p4 < 1.0);
    }

    #[test]
    fn test_length_factor_monotone_in_length() {
        let p = no_stop_probability(0.5, 11);
        let short = length_factor(85.0, p);
        let long = length_factor(400.0, p);
        assert!(long > short);
    }

    #[test]
    fn test_upstream_scan_indices_shape() {
        let indices = upstream_scan_indices();
        assert_eq!(indices.len(), 32);
        assert_eq!(indices[0], 1);
        assert_eq!(indices[1], 2);
        assert_eq!(indices[2], UPSTREAM_SKIP_END);
    }
}
