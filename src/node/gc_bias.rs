//! Per-node GC-frame agreement and whole-sequence bias factors.
//!
//! The seed pass of training has no dicodon statistics yet; it ranks
//! ORFs by how consistently the GC-richest frame of the local profile
//! agrees with the ORF's own reading frame.

use bio::bio_types::strand::Strand;

use crate::model::ScoringModel;
use crate::node::Node;
use crate::sequence::profile::richest_frame;

/// Fill each start node's GC-frame agreement scores and derive the
/// model's per-frame bias factors.
pub fn record_gc_bias(profile: &[i32], nodes: &mut [Node], model: &mut ScoringModel) {
    if nodes.is_empty() || profile.is_empty() {
        return;
    }

    let mut frame_counts = [[0i32; 3]; 3];
    let mut last = [0usize; 3];

    forward_pass(profile, nodes, &mut frame_counts, &mut last);
    reverse_pass(profile, nodes, &mut frame_counts, &mut last);
    derive_bias_factors(nodes, model);
}

fn forward_pass(
    profile: &[i32],
    nodes: &mut [Node],
    frame_counts: &mut [[i32; 3]; 3],
    last: &mut [usize; 3],
) {
    for node in nodes.iter_mut().rev() {
        if node.strand != Strand::Forward {
            continue;
        }
        let frame = node.frame();
        let frame_offset = 3 - frame;

        if node.is_stop() {
            frame_counts[frame].fill(0);
            last[frame] = node.index;
            if let Some(&value) = profile.get(node.index)
                && value >= 0
            {
                frame_counts[frame][(value as usize + frame_offset) % 3] = 1;
            }
        } else {
            if last[frame] >= 3 {
                let mut pos = last[frame] - 3;
                while pos >= node.index {
                    if let Some(&value) = profile.get(pos)
                        && value >= 0
                    {
                        frame_counts[frame][(value as usize + frame_offset) % 3] += 1;
                    }
                    if pos < 3 {
                        break;
                    }
                    pos -= 3;
                }
            }
            store_frame_scores(node, &frame_counts[frame]);
            last[frame] = node.index;
        }
    }
}

fn reverse_pass(
    profile: &[i32],
    nodes: &mut [Node],
    frame_counts: &mut [[i32; 3]; 3],
    last: &mut [usize; 3],
) {
    for node in nodes.iter_mut() {
        if node.strand != Strand::Reverse {
            continue;
        }
        let frame = node.frame();

        if node.is_stop() {
            frame_counts[frame].fill(0);
            last[frame] = node.index;
            if let Some(&value) = profile.get(node.index)
                && value >= 0
            {
                frame_counts[frame][((3 - value as usize) + frame) % 3] = 1;
            }
        } else {
            let mut pos = last[frame] + 3;
            while pos <= node.index && pos < profile.len() {
                if let Some(&value) = profile.get(pos)
                    && value >= 0
                {
                    frame_counts[frame][((3 - value as usize) + frame) % 3] += 1;
                }
                pos += 3;
            }
            store_frame_scores(node, &frame_counts[frame]);
            last[frame] = node.index;
        }
    }
}

fn store_frame_scores(node: &mut Node, counts: &[i32; 3]) {
    node.preferred_gc_frame = richest_frame(counts[0], counts[1], counts[2]);

    let gene_length: isize = if node.strand == Strand::Forward {
        node.stop_position + 3 - node.index as isize
    } else {
        node.index as isize + 3 - node.stop_position
    };
    if gene_length > 0 {
        for (frame, &count) in counts.iter().enumerate() {
            node.gc_frame_scores[frame] = (3.0 * f64::from(count)) / gene_length as f64;
        }
    }
}

fn derive_bias_factors(nodes: &[Node], model: &mut ScoringModel) {
    model.gc_frame_bias.fill(0.0);

    let mut any = false;
    for node in nodes.iter().filter(|n| n.is_start()) {
        let gene_length = node.gene_length() + 1;
        let frame = node.preferred_gc_frame;
        if frame < model.gc_frame_bias.len() && gene_length > 0 {
            model.gc_frame_bias[frame] +=
                node.gc_frame_scores[frame] * gene_length as f64 / 1000.0;
            any = true;
        }
    }

    if any {
        let sum: f64 = model.gc_frame_bias.iter().sum();
        if sum > 0.0 {
            let normalizer = 3.0 / sum;
            for bias in &mut model.gc_frame_bias {
                *bias *= normalizer;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{CodonType, enumerate_nodes, sort_nodes};
    use crate::sequence::dna::DnaSequence;
    use crate::sequence::profile::gc_frame_profile;

    #[test]
    fn test_record_gc_bias_empty_inputs() {
        let mut nodes = vec![];
        let mut model = ScoringModel::default();
        record_gc_bias(&[], &mut nodes, &mut model);
        assert_eq!(model.gc_frame_bias, [1.0; 3]);
    }

    #[test]
    fn test_bias_factors_normalize_to_three() {
        let mut raw = String::from("TTAATTAATTAATTAGGAGGACAATCATG");
        for _ in 0..12 {
            raw.push_str("CTAATCAAAGATTACGCGGAACAC");
        }
        raw.push_str("TAA");
        let sequence = DnaSequence::new(raw.as_bytes()).unwrap();
        let model_for_enum = ScoringModel::default();
        let mut nodes = enumerate_nodes(&sequence, &model_for_enum);
        sort_nodes(&mut nodes);

        let profile = gc_frame_profile(&sequence.forward, sequence.len());
        let mut model = ScoringModel::default();
        record_gc_bias(&profile, &mut nodes, &mut model);

        let sum: f64 = model.gc_frame_bias.iter().sum();
        assert!((sum - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_frame_scores_bounded() {
        let mut raw = String::from("TTAATTAATTAATTAGGAGGACAATCATG");
        for _ in 0..12 {
            raw.push_str("CTAATCAAAGATTACGCGGAACAC");
        }
        raw.push_str("TAA");
        let sequence = DnaSequence::new(raw.as_bytes()).unwrap();
        let model_for_enum = ScoringModel::default();
        let mut nodes = enumerate_nodes(&sequence, &model_for_enum);
        sort_nodes(&mut nodes);

        let profile = gc_frame_profile(&sequence.forward, sequence.len());
        let mut model = ScoringModel::default();
        record_gc_bias(&profile, &mut nodes, &mut model);

        for node in nodes.iter().filter(|n| n.codon != CodonType::Stop) {
            for &score in &node.gc_frame_scores {
                assert!((0.0..=3.0).contains(&score));
            }
        }
    }
}
