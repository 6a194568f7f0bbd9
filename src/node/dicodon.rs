//! Dicodon usage statistics over a provisional gene path.

use bio::bio_types::strand::Strand;

use crate::constants::{DICODON_LENGTH, MAX_LOG_ODDS, MIN_LOG_ODDS, NUM_DICODONS};
use crate::model::ScoringModel;
use crate::node::{Node, traceback_indices};
use crate::sequence::dna::DnaSequence;
use crate::sequence::{background_kmer_frequencies, kmer_index};

#[derive(Debug, Clone, Copy)]
enum GeneSpan {
    None,
    Forward,
    Reverse,
}

/// Re-estimate the model's dicodon log-likelihood table from the genes
/// on the traceback path rooted at `path_start`.
///
/// Frequencies inside the path's genes are compared against the
/// whole-sequence background over both strands; entries are clamped
/// log-ratios.
pub fn estimate_dicodon_scores(
    model: &mut ScoringModel,
    sequence: &DnaSequence,
    nodes: &[Node],
    path_start: usize,
) {
    let mut counts = [0u32; NUM_DICODONS];
    let mut background = [0.0f64; NUM_DICODONS];
    let mut total: u32 = 0;

    background_kmer_frequencies(
        DICODON_LENGTH,
        &sequence.forward,
        &sequence.reverse,
        sequence.len(),
        &mut background,
    );

    let sequence_length = sequence.len();
    let mut span = GeneSpan::None;
    let mut gene_begin = 0usize;
    let mut gene_end = 0usize;

    // The traceback runs right to left; forward genes surface as
    // stop-then-start, reverse genes as start-then-stop.
    for idx in traceback_indices(nodes, path_start) {
        let node = &nodes[idx];
        match (node.strand, node.is_stop()) {
            (Strand::Reverse, false) => {
                span = GeneSpan::Reverse;
                gene_begin = sequence_length - node.index - 1;
            }
            (Strand::Forward, true) => {
                span = GeneSpan::Forward;
                gene_end = node.index + 2;
            }
            _ => {}
        }

        match (span, node.strand, node.is_stop()) {
            (GeneSpan::Reverse, Strand::Reverse, true) => {
                gene_end = sequence_length - node.index + 1;
                count_gene_dicodons(
                    &sequence.reverse,
                    gene_begin,
                    gene_end,
                    &mut counts,
                    &mut total,
                );
                span = GeneSpan::None;
            }
            (GeneSpan::Forward, Strand::Forward, false) => {
                gene_begin = node.index;
                count_gene_dicodons(
                    &sequence.forward,
                    gene_begin,
                    gene_end,
                    &mut counts,
                    &mut total,
                );
                span = GeneSpan::None;
            }
            _ => {}
        }
    }

    if total == 0 {
        return;
    }

    let total = f64::from(total);
    for (slot, (&count, &bg)) in model
        .dicodon_scores
        .iter_mut()
        .zip(counts.iter().zip(background.iter()))
    {
        *slot = log_likelihood(f64::from(count) / total, bg);
    }
}

fn count_gene_dicodons(
    packed: &[u8],
    begin: usize,
    end: usize,
    counts: &mut [u32; NUM_DICODONS],
    total: &mut u32,
) {
    for pos in (begin..end).step_by(3) {
        if pos + DICODON_LENGTH > end {
            break;
        }
        counts[kmer_index(DICODON_LENGTH, packed, pos)] += 1;
        *total += 1;
    }
}

fn log_likelihood(gene_probability: f64, background_probability: f64) -> f64 {
    let score = match (gene_probability, background_probability) {
        (0.0, bg) if bg > 0.0 => MIN_LOG_ODDS,
        (_, 0.0) => 0.0,
        (gene, bg) => (gene / bg).ln(),
    };
    score.clamp(MIN_LOG_ODDS, MAX_LOG_ODDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::CodonType;
    use crate::sequence::dna::DnaSequence;

    #[test]
    fn test_log_likelihood_edge_cases() {
        assert_eq!(log_likelihood(0.0, 0.1), MIN_LOG_ODDS);
        assert_eq!(log_likelihood(0.1, 0.0), 0.0);
        assert_eq!(log_likelihood(0.0, 0.0), 0.0);
        assert!((log_likelihood(0.1, 0.05) - 2f64.ln()).abs() < 1e-9);
        assert_eq!(log_likelihood(1.0, 1e-9), MAX_LOG_ODDS);
    }

    #[test]
    fn test_gene_dicodons_enrich_table() {
        let mut raw = String::from("TTAATTAATTAATTAGGAGGACAATCATG");
        for _ in 0..12 {
            raw.push_str("CTAATCAAAGATTACGCGGAACAC");
        }
        raw.push_str("TAA");
        let sequence = DnaSequence::new(raw.as_bytes()).unwrap();

        // Hand-built path: forward stop (right) then its start (left)
        let mut nodes = vec![
            Node::new(26, Strand::Forward, CodonType::Atg, 317),
            Node::new(317, Strand::Forward, CodonType::Stop, -4),
        ];
        nodes[1].traceback = Some(0);

        let mut model = ScoringModel::default();
        estimate_dicodon_scores(&mut model, &sequence, &nodes, 1);

        // The repeated body unit's dicodons dominate the gene and must
        // score positive; 6-mers absent from the gene score the floor.
        let unit_dicodon = kmer_index(DICODON_LENGTH, &sequence.forward, 29);
        assert!(model.dicodon_scores[unit_dicodon] > 0.0);
        assert!(model.dicodon_scores.iter().any(|&s| s == MIN_LOG_ODDS));
    }

    #[test]
    fn test_empty_path_leaves_model_unchanged() {
        let raw = b"TTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATT".to_vec();
        let sequence = DnaSequence::new(&raw).unwrap();
        let nodes = vec![Node::new(10, Strand::Forward, CodonType::Stop, -6)];
        let mut model = ScoringModel::default();
        model.dicodon_scores[0] = 1.25;
        estimate_dicodon_scores(&mut model, &sequence, &nodes, 0);
        assert_eq!(model.dicodon_scores[0], 1.25);
    }
}
