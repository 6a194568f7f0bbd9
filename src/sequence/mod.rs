//! Sequence encoding and nucleotide-level predicates.
//!
//! DNA is stored in a 2-bit packed representation:
//!
//! - A: 00
//! - C: 01
//! - G: 10
//! - T/U: 11
//!
//! Ambiguous bases are encoded as C and flagged in a separate one-bit-per
//! position bitmap, so downstream predicates stay branch-free while the
//! ambiguity information survives for masking and reporting.
//!
//! ## Modules
//!
//! - [`dna`]: the validated [`DnaSequence`](dna::DnaSequence) owning both
//!   strands
//! - [`profile`]: GC-frame profiling and Shine-Dalgarno window matching

pub mod dna;
pub mod profile;

use rayon::prelude::*;
use wide::{CmpEq, u8x32};

use crate::bitmap::{set_bit, test_bit, toggle_bit};
use crate::constants::{ENCODE_CHUNK_SIZE, MASK_SIZE, NUCLEOTIDE_LOOKUP};
use crate::model::ScoringModel;
use crate::sequence::dna::MaskedRegion;

/// Test if the nucleotide at `n` is adenine.
#[inline]
#[must_use]
pub fn is_a(packed: &[u8], n: usize) -> bool {
    let bit = n * 2;
    !(test_bit(packed, bit) || test_bit(packed, bit + 1))
}

/// Test if the nucleotide at `n` is cytosine.
#[inline]
#[must_use]
pub fn is_c(packed: &[u8], n: usize) -> bool {
    let bit = n * 2;
    !test_bit(packed, bit) && test_bit(packed, bit + 1)
}

/// Test if the nucleotide at `n` is guanine.
#[inline]
#[must_use]
pub fn is_g(packed: &[u8], n: usize) -> bool {
    let bit = n * 2;
    test_bit(packed, bit) && !test_bit(packed, bit + 1)
}

/// Test if the nucleotide at `n` is thymine.
#[inline]
#[must_use]
pub fn is_t(packed: &[u8], n: usize) -> bool {
    let bit = n * 2;
    test_bit(packed, bit) && test_bit(packed, bit + 1)
}

/// Test if the nucleotide at `n` is G or C.
#[inline]
#[must_use]
pub fn is_gc(packed: &[u8], n: usize) -> bool {
    let bit = n * 2;
    test_bit(packed, bit) != test_bit(packed, bit + 1)
}

/// Test if the position was an ambiguous base in the raw input.
#[must_use]
pub fn is_ambiguous(ambiguity: &[u8], n: usize) -> bool {
    if n >= ambiguity.len() * 8 {
        return false;
    }
    test_bit(ambiguity, n)
}

/// 2-bit code of the nucleotide at `n` (A=0, C=1, G=2, T=3).
#[inline]
#[must_use]
pub fn nucleotide_code(packed: &[u8], n: usize) -> usize {
    usize::from(test_bit(packed, n * 2)) << 1 | usize::from(test_bit(packed, n * 2 + 1))
}

/// ASCII base for the nucleotide at `n`.
#[must_use]
pub fn nucleotide_ascii(packed: &[u8], n: usize) -> u8 {
    NUCLEOTIDE_LOOKUP[nucleotide_code(packed, n)]
}

// --- Genetic-code-dependent codon predicates -----------------------------

const fn table_uses_only_atg(table: i32) -> bool {
    matches!(table, 6 | 10 | 14 | 15 | 16 | 22)
}

const fn table_rejects_gtg(table: i32) -> bool {
    matches!(table, 1 | 3 | 12 | 22)
}

fn table_rejects_ttg(table: i32) -> bool {
    table < 4 || table == 9 || (21..25).contains(&table)
}

const fn table_has_tag_stop(table: i32) -> bool {
    !matches!(table, 6 | 15 | 16 | 22)
}

const fn table_has_tga_stop(table: i32) -> bool {
    !matches!(table, 2..=5 | 9 | 10 | 13 | 14 | 21 | 25)
}

const fn table_has_taa_stop(table: i32) -> bool {
    !matches!(table, 6 | 14)
}

/// Test if the codon at `pos` is ATG.
pub fn is_atg(packed: &[u8], pos: usize) -> bool {
    is_a(packed, pos) && is_t(packed, pos + 1) && is_g(packed, pos + 2)
}

/// Test if the codon at `pos` is GTG.
pub fn is_gtg(packed: &[u8], pos: usize) -> bool {
    is_g(packed, pos) && is_t(packed, pos + 1) && is_g(packed, pos + 2)
}

/// Test if the codon at `pos` is TTG.
pub fn is_ttg(packed: &[u8], pos: usize) -> bool {
    is_t(packed, pos) && is_t(packed, pos + 1) && is_g(packed, pos + 2)
}

/// Test if the codon at `pos` is a valid start under the model's
/// genetic code. ATG is a start in every table.
pub fn is_start_codon(packed: &[u8], pos: usize, model: &ScoringModel) -> bool {
    if is_atg(packed, pos) {
        return true;
    }
    if table_uses_only_atg(model.translation_table) {
        return false;
    }
    if is_gtg(packed, pos) && !table_rejects_gtg(model.translation_table) {
        return true;
    }
    if is_ttg(packed, pos) && !table_rejects_ttg(model.translation_table) {
        return true;
    }
    false
}

/// Test if the codon at `pos` is a stop under the model's genetic code.
#[inline]
pub fn is_stop_codon(packed: &[u8], pos: usize, model: &ScoringModel) -> bool {
    if is_t(packed, pos) {
        if is_a(packed, pos + 1) {
            if is_g(packed, pos + 2) {
                return table_has_tag_stop(model.translation_table);
            }
            if is_a(packed, pos + 2) {
                return table_has_taa_stop(model.translation_table);
            }
        } else if is_g(packed, pos + 1) && is_a(packed, pos + 2) {
            return table_has_tga_stop(model.translation_table);
        }
    }

    match model.translation_table {
        // AGA/AGG are stops in table 2
        2 => {
            is_a(packed, pos)
                && is_g(packed, pos + 1)
                && (is_a(packed, pos + 2) || is_g(packed, pos + 2))
        }
        // TCA is a stop in table 22
        22 => is_t(packed, pos) && is_c(packed, pos + 1) && is_a(packed, pos + 2),
        // TTA is a stop in table 23
        23 => is_t(packed, pos) && is_t(packed, pos + 1) && is_a(packed, pos + 2),
        _ => false,
    }
}

// --- Composition statistics ----------------------------------------------

/// GC fraction of the inclusive range `[start, end]`.
#[must_use]
pub fn gc_fraction(packed: &[u8], start: usize, end: usize) -> f64 {
    if start > end {
        return 0.0;
    }
    let gc = (start..=end).filter(|&i| is_gc(packed, i)).count();
    gc as f64 / (end - start + 1) as f64
}

/// Numeric index of the k-mer starting at `pos`.
///
/// Bit layout follows the packed encoding: base `i` of the k-mer
/// occupies bits `2i..2i+2` of the index, so indices are stable across
/// the whole crate (dicodon tables, motif tables, background counts).
#[must_use]
pub fn kmer_index(k: usize, packed: &[u8], pos: usize) -> usize {
    let mut index = 0;
    for i in 0..(2 * k) {
        index |= usize::from(test_bit(packed, pos * 2 + i)) << i;
    }
    index
}

/// Render a k-mer index back to nucleotide text.
#[must_use]
pub fn kmer_text(k: usize, index: usize) -> String {
    if k == 0 {
        return "None".to_string();
    }
    // The packed bit order within a position is (hi, lo) reversed
    // relative to the index bits, matching kmer_index above.
    const LETTERS: [char; 4] = ['A', 'G', 'C', 'T'];
    (0..k)
        .map(|i| LETTERS[(index >> (2 * i)) & 0b11])
        .collect()
}

/// Background k-mer frequencies over both strands of a sequence.
///
/// The counting is chunked across the rayon pool and reduced into a
/// single table, so results do not depend on thread scheduling.
pub fn background_kmer_frequencies(
    k: usize,
    forward: &[u8],
    reverse: &[u8],
    sequence_length: usize,
    background: &mut [f64],
) {
    let table_size = 1usize << (2 * k);
    if sequence_length < k {
        background[..table_size].fill(0.0);
        return;
    }

    let positions = sequence_length - k + 1;
    let chunk = std::cmp::max(1000, positions / rayon::current_num_threads());
    let counts: Vec<u32> = (0..positions)
        .into_par_iter()
        .chunks(chunk)
        .map(|chunk| {
            let mut local = vec![0u32; table_size];
            for i in chunk {
                local[kmer_index(k, forward, i)] += 1;
                local[kmer_index(k, reverse, i)] += 1;
            }
            local
        })
        .reduce(
            || vec![0u32; table_size],
            |mut acc, local| {
                for (a, l) in acc.iter_mut().zip(local) {
                    *a += l;
                }
                acc
            },
        );

    let total = (positions * 2) as f64;
    for (slot, count) in background.iter_mut().zip(counts) {
        *slot = f64::from(count) / total;
    }
}

// --- Encoding ------------------------------------------------------------

/// Derive the packed reverse complement of a packed forward strand.
///
/// Ambiguous positions (encoded as C on the forward strand) are flipped
/// back to the same placeholder code on the reverse strand.
#[must_use]
pub fn reverse_complement_packed(
    forward: &[u8],
    ambiguity: &[u8],
    nucleotide_length: usize,
) -> Vec<u8> {
    let mut reverse = vec![0u8; forward.len()];
    let bit_length = nucleotide_length * 2;

    for i in 0..bit_length {
        if !test_bit(forward, i) {
            let target = if i % 2 == 0 {
                bit_length - i - 2
            } else {
                bit_length - i
            };
            if target < bit_length {
                set_bit(&mut reverse, target);
            }
        }
    }

    for i in 0..nucleotide_length {
        if test_bit(ambiguity, i) && bit_length >= 2 + i * 2 {
            toggle_bit(&mut reverse, bit_length - 1 - i * 2);
            toggle_bit(&mut reverse, bit_length - 2 - i * 2);
        }
    }
    reverse
}

/// Scalar encoder with optional masking of long ambiguous runs.
///
/// Returns the GC fraction of the recognized bases.
pub fn encode_scalar(
    raw: &[u8],
    packed: &mut [u8],
    ambiguity: &mut [u8],
    masks: &mut Vec<MaskedRegion>,
    do_mask: bool,
) -> f64 {
    let mut gc = 0u64;
    let mut total = 0u64;
    let mut mask_start: Option<usize> = None;

    for (i, &byte) in raw.iter().enumerate() {
        if i * 2 + 1 >= packed.len() * 8 {
            break;
        }

        if do_mask {
            let ambiguous = !matches!(
                byte.to_ascii_uppercase(),
                b'A' | b'C' | b'G' | b'T' | b'U'
            );
            match (mask_start, ambiguous) {
                (None, true) => mask_start = Some(i),
                (Some(start), false) => {
                    if i - start >= MASK_SIZE {
                        masks.push(MaskedRegion {
                            begin: start,
                            end: i - 1,
                        });
                    }
                    mask_start = None;
                }
                _ => {}
            }
        }

        let bit = i * 2;
        match byte.to_ascii_uppercase() {
            b'A' => {
                total += 1;
            }
            b'C' => {
                set_bit(packed, bit + 1);
                gc += 1;
                total += 1;
            }
            b'G' => {
                set_bit(packed, bit);
                gc += 1;
                total += 1;
            }
            b'T' | b'U' => {
                set_bit(packed, bit);
                set_bit(packed, bit + 1);
                total += 1;
            }
            _ => {
                set_bit(packed, bit + 1);
                set_bit(ambiguity, i);
            }
        }
    }

    if do_mask
        && let Some(start) = mask_start
        && raw.len() - start >= MASK_SIZE
    {
        masks.push(MaskedRegion {
            begin: start,
            end: raw.len() - 1,
        });
    }

    if total == 0 { 0.0 } else { gc as f64 / total as f64 }
}

/// SIMD encoder processing 32 bases per iteration, with a scalar tail.
///
/// Functionally identical to [`encode_scalar`] without masking.
pub fn encode_simd(raw: &[u8], packed: &mut [u8], ambiguity: &mut [u8]) -> f64 {
    let mut gc = 0u32;
    let mut total = 0u32;
    let chunks = raw.len() / ENCODE_CHUNK_SIZE;

    let a_upper = u8x32::splat(b'A');
    let c_upper = u8x32::splat(b'C');
    let g_upper = u8x32::splat(b'G');
    let t_upper = u8x32::splat(b'T');
    let u_upper = u8x32::splat(b'U');
    let a_lower = u8x32::splat(b'a');
    let c_lower = u8x32::splat(b'c');
    let g_lower = u8x32::splat(b'g');
    let t_lower = u8x32::splat(b't');
    let u_lower = u8x32::splat(b'u');

    for chunk_idx in 0..chunks {
        let offset = chunk_idx * ENCODE_CHUNK_SIZE;
        let mut lanes = [0u8; 32];
        lanes.copy_from_slice(&raw[offset..offset + ENCODE_CHUNK_SIZE]);
        let input = u8x32::from(lanes);

        let match_a = input.cmp_eq(a_upper) | input.cmp_eq(a_lower);
        let match_c = input.cmp_eq(c_upper) | input.cmp_eq(c_lower);
        let match_g = input.cmp_eq(g_upper) | input.cmp_eq(g_lower);
        let match_t = input.cmp_eq(t_upper)
            | input.cmp_eq(t_lower)
            | input.cmp_eq(u_upper)
            | input.cmp_eq(u_lower);

        let gc_mask = match_g | match_c;
        let valid_mask = match_a | match_c | match_g | match_t;

        gc += gc_mask.move_mask().count_ones();
        total += valid_mask.move_mask().count_ones();

        let c_bits: i32 = match_c.move_mask();
        let g_bits: i32 = match_g.move_mask();
        let t_bits: i32 = match_t.move_mask();
        let ambiguous_bits: i32 = !valid_mask.move_mask();

        for i in 0..ENCODE_CHUNK_SIZE {
            let pos = offset + i;
            if pos * 2 + 1 >= packed.len() * 8 {
                break;
            }
            let bit = pos * 2;
            let flag = 1i32 << i;

            if (c_bits & flag) != 0 {
                set_bit(packed, bit + 1);
            } else if (g_bits & flag) != 0 {
                set_bit(packed, bit);
            } else if (t_bits & flag) != 0 {
                set_bit(packed, bit);
                set_bit(packed, bit + 1);
            } else if (ambiguous_bits & flag) != 0 {
                set_bit(packed, bit + 1);
                set_bit(ambiguity, pos);
            }
        }
    }

    for (pos, &byte) in raw.iter().enumerate().skip(chunks * ENCODE_CHUNK_SIZE) {
        if pos * 2 + 1 >= packed.len() * 8 {
            break;
        }
        let bit = pos * 2;
        match byte.to_ascii_uppercase() {
            b'A' => {
                total += 1;
            }
            b'C' => {
                set_bit(packed, bit + 1);
                gc += 1;
                total += 1;
            }
            b'G' => {
                set_bit(packed, bit);
                gc += 1;
                total += 1;
            }
            b'T' | b'U' => {
                set_bit(packed, bit);
                set_bit(packed, bit + 1);
                total += 1;
            }
            _ => {
                set_bit(packed, bit + 1);
                set_bit(ambiguity, pos);
            }
        }
    }

    if total == 0 {
        0.0
    } else {
        f64::from(gc) / f64::from(total)
    }
}
