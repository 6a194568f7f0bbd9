//! Start training for organisms without Shine-Dalgarno motifs.
//!
//! Instead of fixed SD bins, this learns arbitrary 3-6 bp upstream
//! motifs in three stages: an unbiased census of every upstream window,
//! a refinement pass against the current best motifs, and a final pass
//! restricted to motifs with real coverage.

use bio::bio_types::strand::Strand;

use crate::constants::{
    GENE_RATIO_THRESHOLD, INITIAL_TRAINING_THRESHOLD, MAX_NONSD_ITERATIONS, MIN_MOTIF_LENGTH,
    MOTIF_COVERAGE_THRESHOLD, MOTIF_INDEX_SPACE, NUM_BASES, NUM_MOTIF_SIZES, NUM_START_TYPES,
    THRESHOLD_DIVISOR, UPSTREAM_POSITIONS, WEIGHT_CLAMP_MAX, WEIGHT_CLAMP_MIN,
};
use crate::model::{MotifWeights, ScoringModel, boxed_motif_weights};
use crate::node::{Node, find_best_upstream_motif};
use crate::sequence::dna::DnaSequence;
use crate::sequence::kmer_index;
use crate::train::{
    count_upstream_composition, finalize_upstream_composition, normalize_log_ratios,
};

type MotifCoverage = [[[i32; MOTIF_INDEX_SPACE]; NUM_MOTIF_SIZES]; NUM_MOTIF_SIZES];

fn boxed_coverage() -> Box<MotifCoverage> {
    let vec = vec![[[0i32; MOTIF_INDEX_SPACE]; NUM_MOTIF_SIZES]; NUM_MOTIF_SIZES];
    vec.into_boxed_slice().try_into().unwrap()
}

/// Train upstream-motif weights, start-type weights and upstream
/// composition without assuming Shine-Dalgarno structure.
pub fn train_starts_nonsd(
    sequence: &DnaSequence,
    nodes: &mut [Node],
    model: &mut ScoringModel,
) {
    let weight_factor = model.start_weight;
    let mut threshold = INITIAL_TRAINING_THRESHOLD;

    model.start_type_weights = [0.0; NUM_START_TYPES];
    model.upstream_composition = Box::new([[0.0; NUM_BASES]; UPSTREAM_POSITIONS]);
    model.motif_weights = boxed_motif_weights();
    model.no_motif_weight = 0.0;

    let mut type_background = [0.0f64; NUM_START_TYPES];
    let mut total_starts = 0.0;
    for node in nodes.iter().filter(|n| n.is_start()) {
        type_background[node.codon.to_index()] += 1.0;
        total_starts += 1.0;
    }
    if total_starts > 0.0 {
        for slot in &mut type_background {
            *slot /= total_starts;
        }
    }

    let mut coverage = boxed_coverage();

    for iteration in 0..MAX_NONSD_ITERATIONS {
        let stage = match iteration {
            0..4 => 0,
            4..12 => 1,
            _ => 2,
        };

        // Background: motifs over every candidate start's window
        let mut motif_background = boxed_motif_weights();
        let mut zero_background = 0.0;
        for i in 0..nodes.len() {
            if nodes[i].is_stop() {
                continue;
            }
            find_best_upstream_motif(model, sequence, &mut nodes[i], stage);
            accumulate_motif_counts(
                &mut motif_background,
                &mut zero_background,
                sequence,
                &nodes[i],
                stage,
            );
        }

        let mut background_sum = zero_background;
        for length in motif_background.iter() {
            for spacer in length {
                background_sum += spacer.iter().sum::<f64>();
            }
        }
        if background_sum > 0.0 {
            for length in motif_background.iter_mut() {
                for spacer in length.iter_mut() {
                    for slot in spacer.iter_mut() {
                        *slot /= background_sum;
                    }
                }
            }
            zero_background /= background_sum;
        }

        for i in 0..nodes.len() {
            if nodes[i].is_start() {
                find_best_upstream_motif(model, sequence, &mut nodes[i], stage);
            }
        }

        // Real counts: the best start per frame segment
        let mut motif_real = boxed_motif_weights();
        let mut zero_real = 0.0;
        let mut type_real = [0.0f64; NUM_START_TYPES];
        let mut gene_count = 0.0;
        let record_upstream = iteration == MAX_NONSD_ITERATIONS - 1;

        for strand in [Strand::Forward, Strand::Reverse] {
            select_nonsd_starts(
                sequence,
                nodes,
                model,
                strand,
                stage,
                threshold,
                weight_factor,
                &mut motif_real,
                &mut zero_real,
                &mut type_real,
                &mut gene_count,
                record_upstream,
            );
        }

        if stage < 2 {
            build_coverage_map(&motif_real, &mut coverage, gene_count);
        }

        update_motif_weights(
            &motif_real,
            &motif_background,
            zero_real,
            zero_background,
            &coverage,
            model,
        );

        normalize_log_ratios(&mut type_real, &type_background);
        model.start_type_weights = type_real;

        if gene_count <= nodes.len() as f64 / GENE_RATIO_THRESHOLD {
            threshold /= THRESHOLD_DIVISOR;
        }
    }

    finalize_upstream_composition(model);
}

#[allow(clippy::too_many_arguments)]
fn select_nonsd_starts(
    sequence: &DnaSequence,
    nodes: &[Node],
    model: &mut ScoringModel,
    strand: Strand,
    stage: usize,
    threshold: f64,
    weight_factor: f64,
    motif_real: &mut MotifWeights,
    zero_real: &mut f64,
    type_real: &mut [f64; NUM_START_TYPES],
    gene_count: &mut f64,
    record_upstream: bool,
) {
    let mut best_score = [0.0f64; 3];
    let mut best_index: [Option<usize>; 3] = [None; 3];

    let mut visit = |node_index: usize, node: &Node, model: &mut ScoringModel| {
        let frame = node.frame();
        if node.is_stop() && node.strand == strand {
            if best_score[frame] >= threshold
                && let Some(winner) = best_index[frame]
            {
                *gene_count += 1.0;
                type_real[nodes[winner].codon.to_index()] += 1.0;
                accumulate_motif_counts(motif_real, zero_real, sequence, &nodes[winner], stage);
                if record_upstream {
                    count_upstream_composition(sequence, strand, nodes[winner].index, model);
                }
            }
            best_score[frame] = 0.0;
            best_index[frame] = None;
        } else if node.strand == strand {
            let score = node.coding_score
                + weight_factor * node.best_motif.score
                + weight_factor * model.start_type_weights[node.codon.to_index()];
            if score >= best_score[frame] {
                best_score[frame] = score;
                best_index[frame] = Some(node_index);
            }
        }
    };

    if strand == Strand::Forward {
        for (i, node) in nodes.iter().enumerate() {
            visit(i, node, model);
        }
    } else {
        for (i, node) in nodes.iter().enumerate().rev() {
            visit(i, node, model);
        }
    }
}

/// Add a node's upstream window (stage 0), its best motif and
/// submotifs (stage 1), or its best motif alone (stage 2) to a count
/// table.
fn accumulate_motif_counts(
    counts: &mut MotifWeights,
    zero_count: &mut f64,
    sequence: &DnaSequence,
    node: &Node,
    stage: usize,
) {
    if node.is_stop() {
        return;
    }
    if node.best_motif.length == 0 {
        *zero_count += 1.0;
        return;
    }

    let sequence_length = sequence.len();
    let (packed, start) = match node.strand {
        Strand::Forward => (&sequence.forward, node.index),
        Strand::Reverse => (&sequence.reverse, sequence_length - 1 - node.index),
        Strand::Unknown => unreachable!(),
    };

    match stage {
        0 => {
            for (length_index, table) in counts.iter_mut().enumerate() {
                let motif_length = length_index + MIN_MOTIF_LENGTH;
                let window_start = start as isize - 18 - length_index as isize;
                let window_end = start as isize - 6 - length_index as isize;
                for j in window_start..=window_end {
                    if j < 0 || (j as usize) + motif_length > sequence_length {
                        continue;
                    }
                    let index = kmer_index(motif_length, packed, j as usize);
                    for spacer_table in table.iter_mut() {
                        spacer_table[index] += 1.0;
                    }
                }
            }
        }
        1 => {
            let motif = &node.best_motif;
            counts[motif.length - MIN_MOTIF_LENGTH][motif.spacer_class][motif.index] += 1.0;

            for (length_index, table) in counts
                .iter_mut()
                .enumerate()
                .take(motif.length - MIN_MOTIF_LENGTH)
            {
                let sub_length = length_index + MIN_MOTIF_LENGTH;
                let window_start = start as isize - (motif.spacer + motif.length) as isize;
                let window_end = start as isize - (motif.spacer + sub_length) as isize;
                for j in window_start..=window_end {
                    if j < 0 || (j as usize) + sub_length > sequence_length {
                        continue;
                    }
                    let spacer_class = spacer_class_of(j as usize, start, length_index);
                    let index = kmer_index(sub_length, packed, j as usize);
                    table[spacer_class][index] += 1.0;
                }
            }
        }
        _ => {
            let motif = &node.best_motif;
            counts[motif.length - MIN_MOTIF_LENGTH][motif.spacer_class][motif.index] += 1.0;
        }
    }
}

const fn spacer_class_of(position: usize, start: usize, length_index: usize) -> usize {
    if position + 16 + length_index <= start {
        3
    } else if position + 14 + length_index <= start {
        2
    } else if position + 7 + length_index >= start {
        1
    } else {
        0
    }
}

/// Mark motifs with enough coverage among training genes as usable.
///
/// 3-base motifs qualify directly by coverage; longer motifs qualify
/// when their constituent shorter motifs qualify, 5/6-base motifs also
/// tolerating one interior mismatch.
fn build_coverage_map(real: &MotifWeights, coverage: &mut MotifCoverage, gene_count: f64) {
    *coverage = [[[0; MOTIF_INDEX_SPACE]; NUM_MOTIF_SIZES]; NUM_MOTIF_SIZES];
    if gene_count <= 0.0 {
        return;
    }

    for spacer in 0..NUM_MOTIF_SIZES {
        for index in 0..64 {
            if real[0][spacer][index] / gene_count >= MOTIF_COVERAGE_THRESHOLD {
                for alternative in 0..NUM_MOTIF_SIZES {
                    coverage[0][alternative][index] = 1;
                }
            }
        }
    }

    for spacer in 0..NUM_MOTIF_SIZES {
        for index in 0..256 {
            let left = (index & 252) >> 2;
            let right = index & 63;
            if coverage[0][spacer][left] != 0 && coverage[0][spacer][right] != 0 {
                coverage[1][spacer][index] = 1;
            }
        }
    }

    for spacer in 0..NUM_MOTIF_SIZES {
        for index in 0..1024 {
            let top = (index & 1008) >> 4;
            let middle = (index & 252) >> 2;
            let bottom = index & 63;
            if coverage[0][spacer][top] == 0
                || coverage[0][spacer][middle] == 0
                || coverage[0][spacer][bottom] == 0
            {
                continue;
            }
            coverage[2][spacer][index] = 1;

            let mut variant = index;
            for high in (0..=16).step_by(16) {
                variant ^= high;
                for low in (0..=32).step_by(32) {
                    variant ^= low;
                    if coverage[2][spacer][variant] == 0 {
                        coverage[2][spacer][variant] = 2;
                    }
                }
            }
        }
    }

    for spacer in 0..NUM_MOTIF_SIZES {
        for index in 0..MOTIF_INDEX_SPACE {
            let left = (index & 4092) >> 2;
            let right = index & 1023;
            if coverage[2][spacer][left] == 0 || coverage[2][spacer][right] == 0 {
                continue;
            }
            coverage[3][spacer][index] =
                if coverage[2][spacer][left] == 1 && coverage[2][spacer][right] == 1 {
                    1
                } else {
                    2
                };
        }
    }
}

/// Turn real/background motif counts into clamped log-odds weights;
/// motifs outside the coverage map fold into the no-motif mass.
fn update_motif_weights(
    real: &MotifWeights,
    background: &MotifWeights,
    zero_real: f64,
    zero_background: f64,
    coverage: &MotifCoverage,
    model: &mut ScoringModel,
) {
    let mut sum_real = zero_real;
    for length in real.iter() {
        for spacer in length {
            sum_real += spacer.iter().sum::<f64>();
        }
    }

    if sum_real == 0.0 {
        *model.motif_weights = [[[0.0; MOTIF_INDEX_SPACE]; NUM_MOTIF_SIZES]; NUM_MOTIF_SIZES];
        model.no_motif_weight = 0.0;
        return;
    }

    let mut zreal = zero_real;
    let mut zbg = zero_background;

    for length in 0..NUM_MOTIF_SIZES {
        for spacer in 0..NUM_MOTIF_SIZES {
            for index in 0..MOTIF_INDEX_SPACE {
                let r = real[length][spacer][index];
                if coverage[length][spacer][index] == 0 {
                    zreal += r;
                    zbg += r;
                    model.motif_weights[length][spacer][index] = WEIGHT_CLAMP_MIN;
                } else {
                    let frequency = r / sum_real;
                    let bg = background[length][spacer][index];
                    let weight = if bg != 0.0 { (frequency / bg).ln() } else { WEIGHT_CLAMP_MIN };
                    model.motif_weights[length][spacer][index] =
                        weight.clamp(WEIGHT_CLAMP_MIN, WEIGHT_CLAMP_MAX);
                }
            }
        }
    }

    let zreal_frequency = zreal / sum_real;
    model.no_motif_weight = if zbg != 0.0 {
        (zreal_frequency / zbg).ln()
    } else {
        WEIGHT_CLAMP_MIN
    }
    .clamp(WEIGHT_CLAMP_MIN, WEIGHT_CLAMP_MAX);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{CodonType, MotifMatch};

    #[test]
    fn test_spacer_class_of() {
        let start = 100;
        assert_eq!(spacer_class_of(83, start, 1), 3);
        assert_eq!(spacer_class_of(85, start, 1), 2);
        assert_eq!(spacer_class_of(95, start, 1), 1);
        assert_eq!(spacer_class_of(90, start, 1), 0);
    }

    #[test]
    fn test_build_coverage_map_empty_counts() {
        let real = boxed_motif_weights();
        let mut coverage = boxed_coverage();
        build_coverage_map(&real, &mut coverage, 100.0);
        let any = coverage
            .iter()
            .flat_map(|l| l.iter())
            .flat_map(|s| s.iter())
            .any(|&v| v != 0);
        assert!(!any);
    }

    #[test]
    fn test_build_coverage_map_propagates_lengths() {
        let mut real = boxed_motif_weights();
        // GGG (homopolymer 3-mer, index 21) covering 30% of genes
        real[0][0][21] = 30.0;
        let mut coverage = boxed_coverage();
        build_coverage_map(&real, &mut coverage, 100.0);
        assert_eq!(coverage[0][0][21], 1);
        assert_eq!(coverage[0][3][21], 1);
        // GGGG decomposes into two qualifying copies of GGG
        assert_eq!(coverage[1][0][85], 1);
    }

    #[test]
    fn test_update_motif_weights_zero_real() {
        let real = boxed_motif_weights();
        let background = boxed_motif_weights();
        let coverage = boxed_coverage();
        let mut model = ScoringModel::default();
        model.no_motif_weight = 2.0;
        update_motif_weights(&real, &background, 0.0, 0.0, &coverage, &mut model);
        assert_eq!(model.no_motif_weight, 0.0);
    }

    #[test]
    fn test_update_motif_weights_uncovered_motifs_fold_into_zero() {
        let mut real = boxed_motif_weights();
        real[0][0][7] = 10.0;
        let mut background = boxed_motif_weights();
        background[0][0][7] = 0.5;
        let coverage = boxed_coverage(); // nothing covered
        let mut model = ScoringModel::default();
        update_motif_weights(&real, &background, 0.0, 0.25, &coverage, &mut model);
        assert_eq!(model.motif_weights[0][0][7], WEIGHT_CLAMP_MIN);
        // the folded mass makes the no-motif weight well-defined
        assert!(model.no_motif_weight.is_finite());
    }

    #[test]
    fn test_accumulate_motif_counts_zero_motif() {
        let raw = format!(
            "TTAATTAATTAATTAGGAGGACAATCATG{}TAA",
            "CTAATCAAAGATTACGCGGAACAC".repeat(12)
        );
        let sequence = DnaSequence::new(raw.as_bytes()).unwrap();
        let mut node = Node::new(26, Strand::Forward, CodonType::Atg, 317);
        node.best_motif = MotifMatch::default();
        let mut counts = boxed_motif_weights();
        let mut zero = 0.0;
        accumulate_motif_counts(&mut counts, &mut zero, &sequence, &node, 1);
        assert_eq!(zero, 1.0);
    }

    #[test]
    fn test_accumulate_motif_counts_stage_zero_census() {
        let raw = format!(
            "TTAATTAATTAATTAGGAGGACAATCATG{}TAA",
            "CTAATCAAAGATTACGCGGAACAC".repeat(12)
        );
        let sequence = DnaSequence::new(raw.as_bytes()).unwrap();
        let mut node = Node::new(26, Strand::Forward, CodonType::Atg, 317);
        node.best_motif = MotifMatch {
            index: 1,
            length: 4,
            spacer_class: 0,
            spacer: 8,
            score: 0.5,
        };
        let mut counts = boxed_motif_weights();
        let mut zero = 0.0;
        accumulate_motif_counts(&mut counts, &mut zero, &sequence, &node, 0);
        let total: f64 = counts
            .iter()
            .flat_map(|l| l.iter())
            .flat_map(|s| s.iter())
            .sum();
        assert!(total > 0.0);
        assert_eq!(zero, 0.0);
    }
}
