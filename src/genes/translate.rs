//! Codon-by-codon translation with the fixed genetic-code tables.

use bio::bio_types::strand::Strand;

use crate::error::Error;
use crate::sequence::dna::DnaSequence;
use crate::sequence::nucleotide_ascii;

/// Translate one codon of ASCII bases under the given genetic code.
///
/// Table 11 is the standard bacterial/archaeal code; table 4 reassigns
/// TGA to tryptophan. Other tables fall back to the standard code for
/// translation (their start/stop differences are handled during
/// enumeration).
#[must_use]
pub fn amino_acid(codon: [u8; 3], table: i32) -> u8 {
    match &codon {
        b"TTT" | b"TTC" => b'F',
        b"TTA" | b"TTG" | b"CTT" | b"CTC" | b"CTA" | b"CTG" => b'L',
        b"ATT" | b"ATC" | b"ATA" => b'I',
        b"ATG" => b'M',
        b"GTT" | b"GTC" | b"GTA" | b"GTG" => b'V',
        b"TCT" | b"TCC" | b"TCA" | b"TCG" | b"AGT" | b"AGC" => b'S',
        b"CCT" | b"CCC" | b"CCA" | b"CCG" => b'P',
        b"ACT" | b"ACC" | b"ACA" | b"ACG" => b'T',
        b"GCT" | b"GCC" | b"GCA" | b"GCG" => b'A',
        b"TAT" | b"TAC" => b'Y',
        b"TAA" | b"TAG" => b'*',
        b"CAT" | b"CAC" => b'H',
        b"CAA" | b"CAG" => b'Q',
        b"AAT" | b"AAC" => b'N',
        b"AAA" | b"AAG" => b'K',
        b"GAT" | b"GAC" => b'D',
        b"GAA" | b"GAG" => b'E',
        b"TGT" | b"TGC" => b'C',
        b"TGA" => {
            if table == 4 {
                b'W'
            } else {
                b'*'
            }
        }
        b"TGG" => b'W',
        b"CGT" | b"CGC" | b"CGA" | b"CGG" | b"AGA" | b"AGG" => b'R',
        b"GGT" | b"GGC" | b"GGA" | b"GGG" => b'G',
        _ => b'X',
    }
}

/// Translate a gene span into its amino-acid sequence.
///
/// `begin` and `end` are 1-based inclusive forward-strand coordinates
/// covering the whole gene including the stop codon; the stop codon is
/// excluded from the returned protein, and the initial codon is always
/// rendered as methionine.
///
/// # Errors
///
/// [`Error::Translation`] when the span length is not a multiple of
/// three. That can only arise from a defect in node pairing, never from
/// user input.
pub fn translate_span(
    sequence: &DnaSequence,
    begin: usize,
    end: usize,
    strand: Strand,
    table: i32,
) -> Result<String, Error> {
    let span = end - begin + 1;
    if span % 3 != 0 {
        return Err(Error::Translation(format!(
            "gene span {begin}..{end} has length {span}, not a multiple of three"
        )));
    }

    let codons = span / 3;
    if codons < 2 {
        return Err(Error::Translation(format!(
            "gene span {begin}..{end} is a lone codon"
        )));
    }

    let mut protein = String::with_capacity(codons - 1);
    for codon_index in 0..codons - 1 {
        let codon = read_codon(sequence, begin, end, strand, codon_index);
        if codon_index == 0 {
            protein.push('M');
        } else {
            protein.push(char::from(amino_acid(codon, table)));
        }
    }
    Ok(protein)
}

fn read_codon(
    sequence: &DnaSequence,
    begin: usize,
    end: usize,
    strand: Strand,
    codon_index: usize,
) -> [u8; 3] {
    match strand {
        Strand::Forward => {
            let base = begin - 1 + codon_index * 3;
            [
                nucleotide_ascii(&sequence.forward, base),
                nucleotide_ascii(&sequence.forward, base + 1),
                nucleotide_ascii(&sequence.forward, base + 2),
            ]
        }
        Strand::Reverse => {
            // The gene reads 3' to 5' on the forward strand; use the
            // packed reverse complement in its own coordinates.
            let base = sequence.len() - end + codon_index * 3;
            [
                nucleotide_ascii(&sequence.reverse, base),
                nucleotide_ascii(&sequence.reverse, base + 1),
                nucleotide_ascii(&sequence.reverse, base + 2),
            ]
        }
        Strand::Unknown => [b'N'; 3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(core: &str) -> (DnaSequence, usize, usize) {
        // Pad with neutral sequence so the construction length check
        // passes; the gene occupies the middle.
        let pad = "TTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAATTAA";
        let raw = format!("{pad}{core}{pad}");
        let begin = pad.len() + 1;
        let end = pad.len() + core.len();
        (DnaSequence::new(raw.as_bytes()).unwrap(), begin, end)
    }

    #[test]
    fn test_amino_acid_standard_code() {
        assert_eq!(amino_acid(*b"ATG", 11), b'M');
        assert_eq!(amino_acid(*b"TGG", 11), b'W');
        assert_eq!(amino_acid(*b"TAA", 11), b'*');
        assert_eq!(amino_acid(*b"TGA", 11), b'*');
        assert_eq!(amino_acid(*b"GCT", 11), b'A');
        assert_eq!(amino_acid(*b"CGA", 11), b'R');
    }

    #[test]
    fn test_amino_acid_table_four() {
        assert_eq!(amino_acid(*b"TGA", 4), b'W');
        assert_eq!(amino_acid(*b"TAA", 4), b'*');
    }

    #[test]
    fn test_translate_forward_gene() {
        let (sequence, begin, end) = padded("ATGAAACGCATTAGCTAA");
        let protein = translate_span(&sequence, begin, end, Strand::Forward, 11).unwrap();
        assert_eq!(protein, "MKRIS");
    }

    #[test]
    fn test_translate_reverse_gene() {
        // revcomp(ATGAAACGCATTAGCTAA) = TTAGCTAATGCGTTTCAT
        let (sequence, begin, end) = padded("TTAGCTAATGCGTTTCAT");
        let protein = translate_span(&sequence, begin, end, Strand::Reverse, 11).unwrap();
        assert_eq!(protein, "MKRIS");
    }

    #[test]
    fn test_translate_alternative_start_is_methionine() {
        let (sequence, begin, end) = padded("GTGAAACGCATTAGCTAA");
        let protein = translate_span(&sequence, begin, end, Strand::Forward, 11).unwrap();
        assert_eq!(protein, "MKRIS");
    }

    #[test]
    fn test_translate_rejects_partial_codon() {
        let (sequence, begin, end) = padded("ATGAAACGCATTAGCTAA");
        let result = translate_span(&sequence, begin, end - 1, Strand::Forward, 11);
        assert!(matches!(result, Err(Error::Translation(_))));
    }
}
