//! Model training.
//!
//! Single-sequence training is an explicit state machine:
//!
//! ```text
//! Untrained --seed pass--> Iterating --convergence--> Converged
//!                              |                          |
//!                              +--budget exhausted--> TrainingFailure
//! ```
//!
//! The seed pass ranks ORFs by GC-frame agreement alone, the resulting
//! provisional genes seed the dicodon table, the start tables are
//! estimated from high-scoring starts, and the refinement loop
//! alternates full prediction with table re-estimation until the
//! accepted gene count stops changing and the path score stops
//! improving.

pub mod bank;
pub mod nonsd;

use bio::bio_types::strand::Strand;
use tracing::debug;

use crate::config::GeneFinderConfig;
use crate::constants::{
    EXTREME_AT_FREQ, EXTREME_GC_FREQ, GENE_RATIO_THRESHOLD, INITIAL_TRAINING_THRESHOLD,
    MAX_GC_CONTENT, MAX_REFINEMENT_ROUNDS, MAX_SD_ITERATIONS, MIN_GC_CONTENT, NUM_BASES,
    NUM_RBS_BINS, NUM_START_TYPES, RBS_WEIGHT_HIGH, RBS_WEIGHT_LOW, RBS_WEIGHT_STRONG,
    SCORE_IMPROVEMENT_TOLERANCE, THRESHOLD_DIVISOR, UPSTREAM_POSITIONS, UPSTREAM_SCAN_RANGE,
    UPSTREAM_SKIP_END, WEIGHT_CLAMP_MAX, WEIGHT_CLAMP_MIN,
};
use crate::dp::{count_path_genes, eliminate_negative_genes, resolve};
use crate::error::Error;
use crate::model::ScoringModel;
use crate::node::{
    Node, enumerate_nodes, estimate_dicodon_scores, raw_coding_scores, record_frame_starts,
    record_gc_bias, scan_rbs, score_nodes, sort_nodes,
};
use crate::sequence::dna::DnaSequence;
use crate::sequence::kmer_index;
use crate::sequence::profile::gc_frame_profile;
use crate::train::nonsd::train_starts_nonsd;

/// Train a scoring model on a single sequence.
///
/// # Errors
///
/// [`Error::TrainingFailure`] when the seed pass yields no gene path,
/// when refinement converges on an empty gene set, or when the
/// refinement budget is exhausted without convergence.
pub fn train_single(
    sequence: &DnaSequence,
    config: &GeneFinderConfig,
) -> Result<ScoringModel, Error> {
    let mut model = ScoringModel {
        translation_table: config.translation_table.map_or(11, i32::from),
        gc_content: sequence.gc_content,
        uses_sd_motifs: false,
        gc_frame_bias: [0.0; 3],
        ..Default::default()
    };

    let mut nodes = enumerate_nodes(sequence, &model);
    sort_nodes(&mut nodes);
    debug!(
        nodes = nodes.len(),
        gc = model.gc_content,
        "training on single sequence"
    );
    if nodes.iter().all(Node::is_stop) {
        return Err(Error::TrainingFailure(
            "sequence contains no candidate start codons".to_string(),
        ));
    }

    // Seed pass: GC-frame agreement stands in for coding potential
    let profile = gc_frame_profile(&sequence.forward, sequence.len());
    record_gc_bias(&profile, &mut nodes, &mut model);
    record_frame_starts(&mut nodes, &model, false);
    let seed_terminal = resolve(&mut nodes, &model, false).ok_or_else(|| {
        Error::TrainingFailure("seed pass produced no gene path".to_string())
    })?;
    estimate_dicodon_scores(&mut model, sequence, &nodes, seed_terminal);

    estimate_start_tables(sequence, &mut nodes, &mut model, config);

    // Refinement: predict, re-estimate, repeat until stable
    let mut previous_count = 0usize;
    let mut previous_total = f64::NEG_INFINITY;

    for round in 1..=MAX_REFINEMENT_ROUNDS {
        for node in nodes.iter_mut() {
            node.eliminated = false;
        }
        score_nodes(sequence, &mut nodes, &model, false);
        record_frame_starts(&mut nodes, &model, true);
        let terminal = resolve(&mut nodes, &model, true).ok_or_else(|| {
            Error::TrainingFailure("refinement pass produced no gene path".to_string())
        })?;
        eliminate_negative_genes(&mut nodes, Some(terminal), &model);

        let gene_count = count_path_genes(&nodes, terminal);
        let total = nodes[terminal].total_score;
        debug!(round, gene_count, total, "refinement round complete");

        if round > 1
            && gene_count == previous_count
            && total <= previous_total + SCORE_IMPROVEMENT_TOLERANCE
        {
            if gene_count == 0 {
                return Err(Error::TrainingFailure(
                    "training converged on an empty gene set".to_string(),
                ));
            }
            debug!(round, gene_count, "training converged");
            return Ok(model);
        }
        previous_count = gene_count;
        previous_total = total;

        estimate_dicodon_scores(&mut model, sequence, &nodes, terminal);
        estimate_start_tables(sequence, &mut nodes, &mut model, config);
    }

    Err(Error::TrainingFailure(format!(
        "gene set did not stabilize within {MAX_REFINEMENT_ROUNDS} refinement rounds"
    )))
}

/// Re-derive all start-site tables from the current coding scores.
fn estimate_start_tables(
    sequence: &DnaSequence,
    nodes: &mut [Node],
    model: &mut ScoringModel,
    config: &GeneFinderConfig,
) {
    raw_coding_scores(sequence, nodes, model);
    scan_rbs(sequence, nodes, model);
    train_starts_sd(sequence, nodes, model);
    model.uses_sd_motifs = should_use_sd(model) && !config.force_non_sd;
    if !model.uses_sd_motifs {
        train_starts_nonsd(sequence, nodes, model);
    }
}

/// Decide whether the trained RBS bin weights show a usable
/// Shine-Dalgarno signal.
#[must_use]
pub fn should_use_sd(model: &ScoringModel) -> bool {
    let weights = &model.rbs_weights;
    if weights[0] >= 0.0 {
        return false;
    }
    if weights[16] < RBS_WEIGHT_HIGH
        && weights[13] < RBS_WEIGHT_HIGH
        && weights[15] < RBS_WEIGHT_HIGH
        && (weights[0] >= RBS_WEIGHT_LOW
            || (weights[22] < RBS_WEIGHT_STRONG
                && weights[24] < RBS_WEIGHT_STRONG
                && weights[27] < RBS_WEIGHT_STRONG))
    {
        return false;
    }
    true
}

/// The SD bin a start is attributed to: the exact bin when it clearly
/// dominates the mismatch bin, the mismatch bin when the reverse holds,
/// otherwise the higher-numbered bin.
fn dominant_bin(node: &Node, model: &ScoringModel) -> usize {
    let weights = &model.rbs_weights;
    if weights[node.rbs_bins[0]] > weights[node.rbs_bins[1]] + RBS_WEIGHT_HIGH
        || node.rbs_bins[1] == 0
    {
        node.rbs_bins[0]
    } else if weights[node.rbs_bins[0]] < weights[node.rbs_bins[1]] - RBS_WEIGHT_HIGH
        || node.rbs_bins[0] == 0
    {
        node.rbs_bins[1]
    } else {
        node.rbs_bins[0].max(node.rbs_bins[1])
    }
}

/// Iteratively estimate Shine-Dalgarno bin weights and start-type
/// weights from the highest-scoring start per ORF.
pub fn train_starts_sd(sequence: &DnaSequence, nodes: &[Node], model: &mut ScoringModel) {
    let weight_factor = model.start_weight;
    let mut type_background = [0.0f64; NUM_START_TYPES];

    model.start_type_weights = [0.0; NUM_START_TYPES];
    model.rbs_weights = Box::new([0.0; NUM_RBS_BINS]);
    model.upstream_composition = Box::new([[0.0; NUM_BASES]; UPSTREAM_POSITIONS]);

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

    let mut threshold = INITIAL_TRAINING_THRESHOLD;

    for iteration in 0..MAX_SD_ITERATIONS {
        let mut bin_background = [0.0f64; NUM_RBS_BINS];
        let mut bin_background_sum = 0.0;
        for node in nodes.iter().filter(|n| n.is_start()) {
            bin_background[dominant_bin(node, model)] += 1.0;
            bin_background_sum += 1.0;
        }
        if bin_background_sum > 0.0 {
            for slot in &mut bin_background {
                *slot /= bin_background_sum;
            }
        }

        let mut bin_real = [0.0f64; NUM_RBS_BINS];
        let mut type_real = [0.0f64; NUM_START_TYPES];
        let is_final_iteration = iteration == MAX_SD_ITERATIONS - 1;

        select_training_starts(
            sequence,
            nodes,
            model,
            Strand::Forward,
            threshold,
            weight_factor,
            &mut bin_real,
            &mut type_real,
            is_final_iteration,
        );
        select_training_starts(
            sequence,
            nodes,
            model,
            Strand::Reverse,
            threshold,
            weight_factor,
            &mut bin_real,
            &mut type_real,
            is_final_iteration,
        );

        let selected: f64 = type_real.iter().sum();

        normalize_log_ratios(&mut bin_real, &bin_background);
        *model.rbs_weights = bin_real;

        normalize_log_ratios(&mut type_real, &type_background);
        model.start_type_weights = type_real;

        if selected <= nodes.len() as f64 / GENE_RATIO_THRESHOLD {
            threshold /= THRESHOLD_DIVISOR;
        }
    }

    finalize_upstream_composition(model);
}

/// One strand's pass over the ORF segments: within each frame segment
/// (between consecutive stops) the start maximizing coding + RBS + type
/// score is taken as the training exemplar when it clears the
/// threshold.
#[allow(clippy::too_many_arguments)]
fn select_training_starts(
    sequence: &DnaSequence,
    nodes: &[Node],
    model: &mut ScoringModel,
    strand: Strand,
    threshold: f64,
    weight_factor: f64,
    bin_real: &mut [f64; NUM_RBS_BINS],
    type_real: &mut [f64; NUM_START_TYPES],
    record_upstream: bool,
) {
    let mut best_score = [0.0f64; 3];
    let mut best_index: [Option<usize>; 3] = [None; 3];
    let mut best_bin = [0usize; 3];
    let mut best_type = [0usize; 3];

    let mut flush = |frame: usize,
                     best_score: &mut [f64; 3],
                     best_index: &mut [Option<usize>; 3],
                     best_bin: &mut [usize; 3],
                     best_type: &mut [usize; 3],
                     model: &mut ScoringModel| {
        if best_score[frame] >= threshold
            && let Some(winner) = best_index[frame]
        {
            bin_real[best_bin[frame]] += 1.0;
            type_real[best_type[frame]] += 1.0;
            if record_upstream {
                count_upstream_composition(sequence, strand, nodes[winner].index, model);
            }
        }
        best_score[frame] = 0.0;
        best_index[frame] = None;
        best_bin[frame] = 0;
        best_type[frame] = 0;
    };

    let mut visit = |node_index: usize,
                     node: &Node,
                     best_score: &mut [f64; 3],
                     best_index: &mut [Option<usize>; 3],
                     best_bin: &mut [usize; 3],
                     best_type: &mut [usize; 3],
                     model: &mut ScoringModel| {
        let frame = node.frame();
        if node.is_stop() && node.strand == strand {
            flush(frame, best_score, best_index, best_bin, best_type, model);
        } else if node.strand == strand {
            let bin = dominant_bin(node, model);
            let score = node.coding_score
                + weight_factor * model.rbs_weights[bin]
                + weight_factor * model.start_type_weights[node.codon.to_index()];
            if score >= best_score[frame] {
                best_score[frame] = score;
                best_index[frame] = Some(node_index);
                best_bin[frame] = bin;
                best_type[frame] = node.codon.to_index();
            }
        }
    };

    if strand == Strand::Forward {
        for (i, node) in nodes.iter().enumerate() {
            visit(
                i,
                node,
                &mut best_score,
                &mut best_index,
                &mut best_bin,
                &mut best_type,
                model,
            );
        }
    } else {
        for (i, node) in nodes.iter().enumerate().rev() {
            visit(
                i,
                node,
                &mut best_score,
                &mut best_index,
                &mut best_bin,
                &mut best_type,
                model,
            );
        }
    }
}

/// Accumulate raw upstream base counts for a confirmed start.
pub(crate) fn count_upstream_composition(
    sequence: &DnaSequence,
    strand: Strand,
    node_index: usize,
    model: &mut ScoringModel,
) {
    let (packed, start) = match strand {
        Strand::Forward => (&sequence.forward, node_index),
        Strand::Reverse => (&sequence.reverse, sequence.len() - 1 - node_index),
        Strand::Unknown => unreachable!(),
    };

    let mut slot = 0;
    for offset in 1..UPSTREAM_SCAN_RANGE {
        if offset > 2 && offset < UPSTREAM_SKIP_END {
            continue;
        }
        if start >= offset {
            let base = kmer_index(1, packed, start - offset);
            model.upstream_composition[slot][base] += 1.0;
        }
        slot += 1;
    }
}

/// Convert accumulated upstream counts into clamped log-odds against
/// the genome's base composition.
pub(crate) fn finalize_upstream_composition(model: &mut ScoringModel) {
    let gc = model.gc_content;
    for position in model.upstream_composition.iter_mut() {
        let sum: f64 = position.iter().sum();
        if sum == 0.0 {
            position.fill(0.0);
            continue;
        }
        for (base, value) in position.iter_mut().enumerate() {
            let frequency = *value / sum;
            let background = if gc > MIN_GC_CONTENT && gc < MAX_GC_CONTENT {
                if base == 0 || base == 3 { (1.0 - gc) / 2.0 } else { gc / 2.0 }
            } else if gc <= MIN_GC_CONTENT {
                if base == 0 || base == 3 {
                    EXTREME_AT_FREQ / 2.0
                } else {
                    EXTREME_GC_FREQ / 2.0
                }
            } else if base == 0 || base == 3 {
                EXTREME_GC_FREQ / 2.0
            } else {
                EXTREME_AT_FREQ / 2.0
            };
            *value = (frequency / background)
                .ln()
                .clamp(WEIGHT_CLAMP_MIN, WEIGHT_CLAMP_MAX);
        }
    }
}

/// Normalize `real` to frequencies and replace each entry with the
/// clamped log-ratio against `background`.
pub(crate) fn normalize_log_ratios(real: &mut [f64], background: &[f64]) {
    let total: f64 = real.iter().sum();
    if total == 0.0 {
        real.fill(0.0);
        return;
    }
    for value in real.iter_mut() {
        *value /= total;
    }
    for (value, &bg) in real.iter_mut().zip(background) {
        *value = if bg > 0.0 {
            (*value / bg).ln().clamp(WEIGHT_CLAMP_MIN, WEIGHT_CLAMP_MAX)
        } else {
            WEIGHT_CLAMP_MIN
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneFinderConfig;

    const BODY_UNIT: &str = "CTAATCAAAGATTACGCGGAACAC";

    fn tandem_orf_sequence(genes: usize) -> Vec<u8> {
        let mut raw = String::new();
        for _ in 0..genes {
            raw.push_str("TTAATTAATTAATT");
            raw.push_str("AGGAGG");
            raw.push_str("ACAATC");
            raw.push_str("ATG");
            for _ in 0..12 {
                raw.push_str(BODY_UNIT);
            }
            raw.push_str("TAA");
        }
        raw.into_bytes()
    }

    #[test]
    fn test_train_single_converges_on_clean_sequence() {
        let sequence = DnaSequence::new(&tandem_orf_sequence(3)).unwrap();
        let config = GeneFinderConfig::default();
        let model = train_single(&sequence, &config).unwrap();
        assert_eq!(model.translation_table, 11);
        assert!((model.gc_content - sequence.gc_content).abs() < 1e-12);
        // The trained dicodon table must favor the gene body
        assert!(model.dicodon_scores.iter().any(|&s| s > 0.0));
    }

    #[test]
    fn test_train_single_fails_without_genes() {
        // All-intergenic sequence: stops everywhere, no bounded ORF
        let raw = b"TTAATTAATTAATT".repeat(10);
        let sequence = DnaSequence::new(&raw).unwrap();
        let config = GeneFinderConfig::default();
        let result = train_single(&sequence, &config);
        assert!(matches!(result, Err(Error::TrainingFailure(_))));
    }

    #[test]
    fn test_force_non_sd_disables_sd() {
        let sequence = DnaSequence::new(&tandem_orf_sequence(3)).unwrap();
        let config = GeneFinderConfig {
            force_non_sd: true,
            ..Default::default()
        };
        let model = train_single(&sequence, &config).unwrap();
        assert!(!model.uses_sd_motifs);
    }

    #[test]
    fn test_should_use_sd_positive_none_bin() {
        let mut model = ScoringModel::default();
        model.rbs_weights[0] = 1.0;
        assert!(!should_use_sd(&model));
    }

    #[test]
    fn test_should_use_sd_strong_bins() {
        let mut model = ScoringModel::default();
        model.rbs_weights[0] = -1.0;
        model.rbs_weights[16] = 2.0;
        model.rbs_weights[13] = 2.0;
        model.rbs_weights[15] = 2.0;
        assert!(should_use_sd(&model));
    }

    #[test]
    fn test_should_use_sd_weak_bins() {
        let mut model = ScoringModel::default();
        model.rbs_weights[0] = -0.2;
        assert!(!should_use_sd(&model));
    }

    #[test]
    fn test_normalize_log_ratios() {
        let mut real = [10.0, 20.0, 30.0];
        let background = [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];
        normalize_log_ratios(&mut real, &background);
        assert!(real[0] < 0.0);
        assert!(real[2] > 0.0);
        for &value in &real {
            assert!((WEIGHT_CLAMP_MIN..=WEIGHT_CLAMP_MAX).contains(&value));
        }
    }

    #[test]
    fn test_normalize_log_ratios_zero_total() {
        let mut real = [0.0; 4];
        let background = [0.25; 4];
        normalize_log_ratios(&mut real, &background);
        assert_eq!(real, [0.0; 4]);
    }

    #[test]
    fn test_normalize_log_ratios_zero_background_floors() {
        let mut real = [1.0, 1.0];
        let background = [0.0, 0.5];
        normalize_log_ratios(&mut real, &background);
        assert_eq!(real[0], WEIGHT_CLAMP_MIN);
    }

    #[test]
    fn test_upstream_composition_counting() {
        let sequence = DnaSequence::new(&tandem_orf_sequence(1)).unwrap();
        let mut model = ScoringModel::default();
        count_upstream_composition(&sequence, Strand::Forward, 26, &mut model);
        let total: f64 = model
            .upstream_composition
            .iter()
            .flat_map(|row| row.iter())
            .sum();
        assert!(total > 0.0);
    }

    #[test]
    fn test_finalize_upstream_composition_clamps() {
        let mut model = ScoringModel::default();
        model.upstream_composition[0] = [10.0, 5.0, 3.0, 2.0];
        model.upstream_composition[1] = [1.0, 1.0, 1.0, 1.0];
        finalize_upstream_composition(&mut model);
        for row in model.upstream_composition.iter() {
            for &value in row {
                assert!((WEIGHT_CLAMP_MIN..=WEIGHT_CLAMP_MAX).contains(&value));
            }
        }
        // untouched rows stay zero
        assert_eq!(model.upstream_composition[5], [0.0; 4]);
    }
}
