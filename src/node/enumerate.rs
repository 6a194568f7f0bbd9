//! Candidate node enumeration.
//!
//! One right-to-left scan per strand. Stop codons partition each frame;
//! a start is retained only when its ORF reaches the next in-frame stop,
//! meets the minimum gene length, and crosses no masked region.
//! ORFs running open-ended off either sequence boundary produce no
//! nodes: every emitted start is bounded by a real stop.

use bio::bio_types::strand::Strand;

use crate::constants::{CODON_LENGTH, MIN_GENE_LENGTH, NODE_RESERVE, READING_FRAMES};
use crate::model::ScoringModel;
use crate::node::{CodonType, Node};
use crate::sequence::dna::{DnaSequence, MaskedRegion};
use crate::sequence::{is_atg, is_gtg, is_stop_codon, is_start_codon, is_ttg};

/// Per-frame scan state for one strand.
struct FrameScan {
    last_stop: [usize; READING_FRAMES],
    saw_start: [bool; READING_FRAMES],
}

impl FrameScan {
    fn new(sequence_length: usize) -> Self {
        let mut last_stop = [0usize; READING_FRAMES];
        // Sentinel beyond the sequence end: starts found before the
        // first stop in a frame have no bounded ORF and are skipped.
        for (frame, slot) in last_stop.iter_mut().enumerate() {
            *slot = sequence_length + frame;
        }
        Self {
            last_stop,
            saw_start: [false; READING_FRAMES],
        }
    }
}

/// Enumerate every candidate node on both strands, in scan order.
///
/// The output is deterministic: identical sequence and genetic code
/// always produce the identical node list. Callers sort the result into
/// positional order before scoring.
#[must_use]
pub fn enumerate_nodes(sequence: &DnaSequence, model: &ScoringModel) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(NODE_RESERVE.min(sequence.len() / 8 + 16));

    scan_strand(
        &sequence.forward,
        sequence.len(),
        Strand::Forward,
        &sequence.masks,
        model,
        &mut nodes,
    );
    scan_strand(
        &sequence.reverse,
        sequence.len(),
        Strand::Reverse,
        &sequence.masks,
        model,
        &mut nodes,
    );

    nodes
}

fn scan_strand(
    packed: &[u8],
    sequence_length: usize,
    strand: Strand,
    masks: &[MaskedRegion],
    model: &ScoringModel,
    nodes: &mut Vec<Node>,
) {
    let mut scan = FrameScan::new(sequence_length);
    let scan_top = sequence_length.saturating_sub(CODON_LENGTH);

    for pos in (0..=scan_top).rev() {
        let frame = pos % READING_FRAMES;

        if is_stop_codon(packed, pos, model) {
            if scan.saw_start[frame] {
                nodes.push(make_stop_node(
                    scan.last_stop[frame],
                    pos as isize,
                    strand,
                    sequence_length,
                ));
            }
            scan.last_stop[frame] = pos;
            scan.saw_start[frame] = false;
            continue;
        }

        // No bounded ORF in this frame yet
        if scan.last_stop[frame] >= sequence_length {
            continue;
        }

        if is_start_codon(packed, pos, model)
            && orf_is_acceptable(pos, scan.last_stop[frame], strand, sequence_length, masks)
        {
            let codon = start_codon_type(packed, pos);
            nodes.push(make_start_node(
                pos,
                codon,
                scan.last_stop[frame] as isize,
                strand,
                sequence_length,
            ));
            scan.saw_start[frame] = true;
        }
    }

    // Flush stop nodes for frames whose last ORF reached the scan
    // boundary; the sentinel stop_position marks them as frame heads.
    for frame in 0..READING_FRAMES {
        if scan.saw_start[frame] {
            let mut node = make_stop_node(
                scan.last_stop[frame],
                0,
                strand,
                sequence_length,
            );
            node.stop_position = frame as isize - 6;
            nodes.push(node);
        }
    }
}

fn start_codon_type(packed: &[u8], pos: usize) -> CodonType {
    if is_atg(packed, pos) {
        CodonType::Atg
    } else if is_gtg(packed, pos) {
        CodonType::Gtg
    } else {
        debug_assert!(is_ttg(packed, pos));
        CodonType::Ttg
    }
}

/// Minimum length and mask checks for an ORF from `start` to `stop`
/// (both in strand-local coordinates).
fn orf_is_acceptable(
    start: usize,
    stop: usize,
    strand: Strand,
    sequence_length: usize,
    masks: &[MaskedRegion],
) -> bool {
    if stop + CODON_LENGTH < start + MIN_GENE_LENGTH {
        return false;
    }
    if masks.is_empty() {
        return true;
    }

    // Map the span to forward-strand coordinates for the mask test
    let (span_begin, span_end) = match strand {
        Strand::Forward => (start, stop + CODON_LENGTH - 1),
        Strand::Reverse => (
            sequence_length - 1 - (stop + CODON_LENGTH - 1),
            sequence_length - 1 - start,
        ),
        Strand::Unknown => unreachable!("nodes are never enumerated on an unknown strand"),
    };
    !masks.iter().any(|m| m.intersects(span_begin, span_end))
}

fn make_start_node(
    pos: usize,
    codon: CodonType,
    stop_position: isize,
    strand: Strand,
    sequence_length: usize,
) -> Node {
    match strand {
        Strand::Forward => Node::new(pos, strand, codon, stop_position),
        Strand::Reverse => Node::new(
            sequence_length - pos - 1,
            strand,
            codon,
            sequence_length as isize - stop_position - 1,
        ),
        Strand::Unknown => unreachable!(),
    }
}

fn make_stop_node(
    pos: usize,
    next_stop: isize,
    strand: Strand,
    sequence_length: usize,
) -> Node {
    match strand {
        Strand::Forward => Node::new(pos, strand, CodonType::Stop, next_stop),
        Strand::Reverse => Node::new(
            sequence_length - pos - 1,
            strand,
            CodonType::Stop,
            sequence_length as isize - next_stop - 1,
        ),
        Strand::Unknown => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::sort_nodes;
    use crate::sequence::dna::DnaSequence;

    // An ORF body with no internal starts, no in-frame stops, and
    // reverse-strand stops in all three frames.
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
    fn test_enumerate_finds_tandem_orf_starts() {
        let seq = DnaSequence::new(&tandem_orf_sequence(3)).unwrap();
        let model = ScoringModel::default();
        let nodes = enumerate_nodes(&seq, &model);

        let starts: Vec<&Node> = nodes.iter().filter(|n| n.is_start()).collect();
        assert_eq!(starts.len(), 3);
        assert!(starts.iter().all(|n| n.codon == CodonType::Atg));
        assert!(starts.iter().all(|n| n.strand == Strand::Forward));
        // Each ORF is 294 bp: ATG + 12 body units + TAA
        for start in &starts {
            assert_eq!(start.gene_length(), 291);
        }
    }

    #[test]
    fn test_enumeration_is_deterministic() {
        let seq = DnaSequence::new(&tandem_orf_sequence(2)).unwrap();
        let model = ScoringModel::default();
        let first = enumerate_nodes(&seq, &model);
        let second = enumerate_nodes(&seq, &model);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.strand, b.strand);
            assert_eq!(a.codon, b.codon);
            assert_eq!(a.stop_position, b.stop_position);
        }
    }

    #[test]
    fn test_short_orfs_are_rejected() {
        // A 30 bp ORF is far below the minimum gene length
        let mut raw = b"TTAATTAATTAATTATGAAACGCATTAGCACCTAATTAATTAA".to_vec();
        raw.extend(b"TTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAA");
        let seq = DnaSequence::new(&raw).unwrap();
        let model = ScoringModel::default();
        let nodes = enumerate_nodes(&seq, &model);
        assert!(nodes.iter().all(|n| !n.is_start()));
    }

    #[test]
    fn test_open_ended_orfs_are_dropped() {
        // A start with no downstream in-frame stop produces nothing
        let mut raw = b"TTAATTAATTAATTAATTAATT".to_vec();
        raw.extend(b"ATG");
        raw.extend(BODY_UNIT.repeat(5).into_bytes()); // runs off the end
        let seq = DnaSequence::new(&raw).unwrap();
        let model = ScoringModel::default();
        let nodes = enumerate_nodes(&seq, &model);
        assert!(
            nodes
                .iter()
                .all(|n| !(n.is_start() && n.strand == Strand::Forward))
        );
    }

    #[test]
    fn test_masked_orfs_are_dropped() {
        let mut raw = tandem_orf_sequence(2);
        // Punch a masked gap through the middle of the second gene
        let second_gene_body = 320 + 30;
        for slot in raw.iter_mut().skip(second_gene_body + 60).take(60) {
            *slot = b'N';
        }
        let masked = DnaSequence::with_masking(&raw).unwrap();
        let model = ScoringModel::default();
        let nodes = enumerate_nodes(&masked, &model);
        let starts: Vec<&Node> = nodes.iter().filter(|n| n.is_start()).collect();
        assert_eq!(starts.len(), 1);
    }

    #[test]
    fn test_reverse_strand_coordinates_are_mirrored() {
        // Forward ATG...TAA on the reverse strand: embed the reverse
        // complement of a forward gene into the raw sequence.
        let forward_gene = {
            let mut g = String::from("ATG");
            for _ in 0..12 {
                g.push_str(BODY_UNIT);
            }
            g.push_str("TAA");
            g
        };
        let revcomp: String = forward_gene
            .bytes()
            .rev()
            .map(|b| match b {
                b'A' => 'T',
                b'T' => 'A',
                b'C' => 'G',
                b'G' => 'C',
                _ => 'N',
            })
            .collect();
        let raw = format!("TTAATTAATTAATT{revcomp}TTAATTAATTAATT");
        let seq = DnaSequence::new(raw.as_bytes()).unwrap();
        let model = ScoringModel::default();
        let mut nodes = enumerate_nodes(&seq, &model);
        sort_nodes(&mut nodes);

        let reverse_starts: Vec<&Node> = nodes
            .iter()
            .filter(|n| n.is_start() && n.strand == Strand::Reverse)
            .collect();
        assert_eq!(reverse_starts.len(), 1);
        assert_eq!(reverse_starts[0].codon, CodonType::Atg);
        assert_eq!(reverse_starts[0].gene_length(), 291);
    }
}
