//! RBS window scanning and upstream motif search.

use bio::bio_types::strand::Strand;
use rayon::prelude::*;

use crate::constants::{
    INITIAL_MOTIF_SCORE, MIN_MOTIF_LENGTH, MIN_MOTIF_SCORE, MOTIF_THRESHOLD_OFFSET,
    RBS_DOWNSTREAM_WINDOW, RBS_UPSTREAM_WINDOW,
};
use crate::model::ScoringModel;
use crate::node::{MotifMatch, Node};
use crate::sequence::dna::DnaSequence;
use crate::sequence::kmer_index;
use crate::sequence::profile::{SdMatch, sd_bin_exact, sd_bin_mismatch};

/// Scan the upstream window of every start node for Shine-Dalgarno
/// matches, keeping the best exact and best single-mismatch bin.
///
/// Nodes are independent, so the scan runs across the rayon pool; each
/// node's result depends only on its own window, which keeps the
/// combined output deterministic.
pub fn scan_rbs(sequence: &DnaSequence, nodes: &mut [Node], model: &ScoringModel) {
    let sequence_length = sequence.len();

    nodes
        .par_iter_mut()
        .filter(|node| node.is_start())
        .for_each(|node| {
            let mut best_exact = SdMatch::default();
            let mut best_mismatch = SdMatch::default();

            let (packed, target) = match node.strand {
                Strand::Forward => (&sequence.forward, node.index),
                Strand::Reverse => (&sequence.reverse, sequence_length - 1 - node.index),
                Strand::Unknown => unreachable!(),
            };

            let search_start = target.saturating_sub(RBS_UPSTREAM_WINDOW);
            let search_end = target.saturating_sub(RBS_DOWNSTREAM_WINDOW);

            for j in search_start..=search_end {
                let exact = sd_bin_exact(packed, j, target, &*model.rbs_weights);
                if exact.bin > best_exact.bin {
                    best_exact = exact;
                }
                let mismatch = sd_bin_mismatch(packed, j, target, &*model.rbs_weights);
                if mismatch.bin > best_mismatch.bin {
                    best_mismatch = mismatch;
                }
            }

            node.rbs_bins = [best_exact.bin, best_mismatch.bin];
            node.rbs_spacers = [best_exact.spacer, best_mismatch.spacer];
        });
}

/// Find the highest-weighted motif/spacer combination upstream of a
/// start, over motif lengths 3-6 and spacers 3-15 bp.
///
/// In the final training stage (`stage == 2`) motifs that do not clear
/// the no-motif weight by a margin are suppressed and the start keeps
/// an empty motif carrying the no-motif weight.
pub fn find_best_upstream_motif(
    model: &ScoringModel,
    sequence: &DnaSequence,
    node: &mut Node,
    stage: usize,
) {
    if node.is_stop() {
        return;
    }

    let sequence_length = sequence.len();
    let (packed, start) = match node.strand {
        Strand::Forward => (&sequence.forward, node.index),
        Strand::Reverse => (&sequence.reverse, sequence_length - 1 - node.index),
        Strand::Unknown => unreachable!(),
    };

    let mut best_score = INITIAL_MOTIF_SCORE;
    let mut best = MotifMatch::default();

    for length_index in (0..=3isize).rev() {
        let motif_length = (length_index + 3) as usize;
        let window_start = start as isize - 18 - length_index;
        let window_end = start as isize - 6 - length_index;

        for j in window_start..=window_end {
            if j < 0 {
                continue;
            }
            let j = j as usize;
            if j + motif_length > sequence_length {
                continue;
            }
            let spacer = start as isize - j as isize - length_index - 3;
            let spacer_class = if j as isize <= start as isize - 16 - length_index {
                3
            } else if j as isize <= start as isize - 14 - length_index {
                2
            } else if j as isize >= start as isize - 7 - length_index {
                1
            } else {
                0
            };

            let index = kmer_index(motif_length, packed, j);
            let score = model.motif_weights[length_index as usize][spacer_class][index];
            if score > best_score {
                best_score = score;
                best = MotifMatch {
                    index,
                    length: motif_length,
                    spacer_class,
                    spacer: spacer as usize,
                    score,
                };
            }
        }
    }

    let is_poor = best_score == MIN_MOTIF_SCORE
        || best_score < model.no_motif_weight + MOTIF_THRESHOLD_OFFSET;

    node.best_motif = if stage == 2 && is_poor {
        MotifMatch {
            score: model.no_motif_weight,
            ..MotifMatch::default()
        }
    } else {
        best
    };
}

/// Minimum length a motif table entry describes.
#[must_use]
pub const fn motif_length_for(length_index: usize) -> usize {
    length_index + MIN_MOTIF_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::CodonType;
    use crate::sequence::dna::DnaSequence;

    fn fixture() -> (DnaSequence, ScoringModel) {
        let mut raw = String::from("TTAATTAATTAATTAGGAGGACAATCATG");
        for _ in 0..12 {
            raw.push_str("CTAATCAAAGATTACGCGGAACAC");
        }
        raw.push_str("TAA");
        let sequence = DnaSequence::new(raw.as_bytes()).unwrap();
        (sequence, ScoringModel::default())
    }

    #[test]
    fn test_scan_rbs_finds_aggagg() {
        let (sequence, model) = fixture();
        let mut nodes = vec![Node::new(26, Strand::Forward, CodonType::Atg, 317)];
        scan_rbs(&sequence, &mut nodes, &model);
        // AGGAGG at distance 6 maps to the strongest exact bin
        assert_eq!(nodes[0].rbs_bins[0], 27);
        assert_eq!(nodes[0].rbs_spacers[0], 6);
    }

    #[test]
    fn test_scan_rbs_skips_stop_nodes() {
        let (sequence, model) = fixture();
        let mut nodes = vec![Node::new(317, Strand::Forward, CodonType::Stop, -6)];
        nodes[0].rbs_bins = [5, 5];
        scan_rbs(&sequence, &mut nodes, &model);
        assert_eq!(nodes[0].rbs_bins, [5, 5]);
    }

    #[test]
    fn test_scan_rbs_no_motif_without_sd() {
        let raw = format!("TTTTTTTTTTTTTTTTTTTTTTTTTTATG{}TAA", "CTAATCAAAGATTACGCGGAACAC".repeat(12));
        let sequence = DnaSequence::new(raw.as_bytes()).unwrap();
        let model = ScoringModel::default();
        let mut nodes = vec![Node::new(26, Strand::Forward, CodonType::Atg, 317)];
        scan_rbs(&sequence, &mut nodes, &model);
        assert_eq!(nodes[0].rbs_bins, [0, 0]);
    }

    #[test]
    fn test_find_best_upstream_motif_neutral_weights() {
        let (sequence, model) = fixture();
        let mut node = Node::new(26, Strand::Forward, CodonType::Atg, 317);
        find_best_upstream_motif(&model, &sequence, &mut node, 1);
        // All weights are zero, so the search keeps some window with
        // score 0 and a plausible geometry.
        assert!(node.best_motif.length >= 3 && node.best_motif.length <= 6);
        assert!(node.best_motif.spacer_class <= 3);
    }

    #[test]
    fn test_find_best_upstream_motif_stage_two_suppression() {
        let (sequence, mut model) = fixture();
        model.no_motif_weight = 3.0; // nothing can clear the margin
        let mut node = Node::new(26, Strand::Forward, CodonType::Atg, 317);
        find_best_upstream_motif(&model, &sequence, &mut node, 2);
        assert_eq!(node.best_motif.length, 0);
        assert_eq!(node.best_motif.score, 3.0);
    }

    #[test]
    fn test_motif_length_for() {
        assert_eq!(motif_length_for(0), 3);
        assert_eq!(motif_length_for(3), 6);
    }
}
