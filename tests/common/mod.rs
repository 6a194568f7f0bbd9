#![allow(dead_code)]
//! Shared fixtures for integration tests.
//!
//! The synthetic gene body below is built so that it contains no
//! internal start codons, no in-frame stops, and reverse-strand stops
//! in all three frames, which keeps the candidate node set of the
//! fixtures exactly predictable.

/// One 8-codon body unit (24 bp).
pub const BODY_UNIT: &str = "CTAATCAAAGATTACGCGGAACAC";

/// Intergenic spacer with stop codons in every frame on both strands.
pub const GAP: &str = "TTAATTAATTAATT";

/// Shine-Dalgarno motif and spacer placed directly upstream of starts.
pub const RBS: &str = "AGGAGG";
pub const SPACER: &str = "ACAATC";

/// A gene: ATG + 12 body units + TAA (294 bp).
pub fn gene() -> String {
    format!("ATG{}TAA", BODY_UNIT.repeat(12))
}

/// `count` tandem genes, each preceded by a gap and an RBS.
pub fn tandem_genes(count: usize) -> Vec<u8> {
    let mut raw = String::new();
    for _ in 0..count {
        raw.push_str(GAP);
        raw.push_str(RBS);
        raw.push_str(SPACER);
        raw.push_str(&gene());
    }
    raw.into_bytes()
}

/// 1-based start coordinate of the `index`-th (0-based) gene in
/// [`tandem_genes`] output.
pub fn gene_begin(index: usize) -> usize {
    let block = GAP.len() + RBS.len() + SPACER.len() + gene().len();
    index * block + GAP.len() + RBS.len() + SPACER.len() + 1
}

/// Reverse complement of an ASCII sequence.
pub fn revcomp(raw: &str) -> String {
    raw.bytes()
        .rev()
        .map(|b| match b {
            b'A' => 'T',
            b'T' => 'A',
            b'C' => 'G',
            b'G' => 'C',
            other => other as char,
        })
        .collect()
}
