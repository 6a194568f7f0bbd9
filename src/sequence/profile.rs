//! Positional GC-frame profiling and Shine-Dalgarno window matching.

use crate::constants::{
    GC_WINDOW_SIZE, MAX_MOTIF_LENGTH, MAX_RBS_DISTANCE, MIN_MOTIF_LENGTH, MIN_RBS_DISTANCE,
    MIN_SD_SCORE, READING_FRAMES,
};
use crate::sequence::{is_a, is_g, is_gc};

/// Index (0, 1 or 2) of the largest of three frame counts. Ties go to
/// the later frame, matching the seed-pass convention.
pub const fn richest_frame(frame_0: i32, frame_1: i32, frame_2: i32) -> usize {
    if frame_0 > frame_1 {
        if frame_0 > frame_2 { 0 } else { 2 }
    } else if frame_1 > frame_2 {
        1
    } else {
        2
    }
}

/// For every position, the reading frame with the highest GC density in
/// a sliding window centered on that position. Entries are -1 where no
/// frame could be assigned (sequence shorter than a codon).
#[must_use]
pub fn gc_frame_profile(packed: &[u8], sequence_length: usize) -> Vec<i32> {
    if sequence_length < READING_FRAMES {
        return vec![-1; sequence_length];
    }

    let forward = running_gc_forward(packed, sequence_length);
    let backward = running_gc_backward(packed, sequence_length);

    let windowed: Vec<i32> = (0..sequence_length)
        .map(|pos| {
            let mut total = forward[pos] + backward[pos] - i32::from(is_gc(packed, pos));
            if pos >= GC_WINDOW_SIZE / 2 {
                total -= forward[pos - GC_WINDOW_SIZE / 2];
            }
            if pos + GC_WINDOW_SIZE / 2 < sequence_length {
                total -= backward[pos + GC_WINDOW_SIZE / 2];
            }
            total
        })
        .collect();

    let mut profile = vec![-1i32; sequence_length];
    for triplet in (0..sequence_length.saturating_sub(2)).step_by(READING_FRAMES) {
        let counts = [
            windowed[triplet],
            windowed.get(triplet + 1).copied().unwrap_or(0),
            windowed.get(triplet + 2).copied().unwrap_or(0),
        ];
        let best = richest_frame(counts[0], counts[1], counts[2]) as i32;
        for offset in 0..READING_FRAMES.min(sequence_length - triplet) {
            profile[triplet + offset] = best;
        }
    }
    profile
}

fn running_gc_forward(packed: &[u8], sequence_length: usize) -> Vec<i32> {
    let mut counts = vec![0; sequence_length];
    for frame in 0..READING_FRAMES {
        for pos in (frame..sequence_length).step_by(READING_FRAMES) {
            counts[pos] = if pos < READING_FRAMES {
                i32::from(is_gc(packed, pos))
            } else {
                counts[pos - READING_FRAMES] + i32::from(is_gc(packed, pos))
            };
        }
    }
    counts
}

fn running_gc_backward(packed: &[u8], sequence_length: usize) -> Vec<i32> {
    let mut counts = vec![0; sequence_length];
    for frame in 0..READING_FRAMES {
        for pos in (frame..sequence_length).step_by(READING_FRAMES) {
            let mirrored = sequence_length - pos - 1;
            counts[mirrored] = if pos < READING_FRAMES {
                i32::from(is_gc(packed, mirrored))
            } else {
                counts[mirrored + READING_FRAMES] + i32::from(is_gc(packed, mirrored))
            };
        }
    }
    counts
}

/// A Shine-Dalgarno window match: the bin it maps to and the distance
/// between the end of the matched window and the start codon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SdMatch {
    /// Bin index into the RBS weight table; 0 means no match.
    pub bin: usize,
    /// Spacer distance in base pairs (meaningful only when `bin > 0`).
    pub spacer: usize,
}

/// Match exact Shine-Dalgarno patterns in the window starting at
/// `search_pos` against a start codon at `start_pos`.
#[must_use]
pub fn sd_bin_exact(
    packed: &[u8],
    search_pos: usize,
    start_pos: usize,
    rbs_weights: &[f64],
) -> SdMatch {
    if start_pos <= search_pos + MIN_RBS_DISTANCE {
        return SdMatch::default();
    }

    let limit = MAX_MOTIF_LENGTH.min(start_pos - MIN_RBS_DISTANCE - search_pos);
    let base_scores: Vec<f64> = (0..limit)
        .map(|i| match i % 3 {
            0 if is_a(packed, search_pos + i) => 2.0,
            1 | 2 if is_g(packed, search_pos + i) => 3.0,
            _ => -10.0,
        })
        .collect();

    let mut best = SdMatch::default();
    for motif_length in (MIN_MOTIF_LENGTH..=limit).rev() {
        for offset in 0..=(limit - motif_length) {
            let window = &base_scores[offset..offset + motif_length];
            if window.iter().any(|&s| s < 0.0) {
                continue;
            }
            let score: f64 = window.iter().sum::<f64>() - 2.0;
            let distance = start_pos - (search_pos + offset + motif_length);
            if distance > MAX_RBS_DISTANCE || score < MIN_SD_SCORE {
                continue;
            }
            let bin = exact_bin(score as i32, exact_distance_class(distance, motif_length));
            if bin_improves(bin, best.bin, rbs_weights) {
                best = SdMatch {
                    bin,
                    spacer: distance,
                };
            }
        }
    }
    best
}

/// Match Shine-Dalgarno patterns tolerating a single interior mismatch.
#[must_use]
pub fn sd_bin_mismatch(
    packed: &[u8],
    search_pos: usize,
    start_pos: usize,
    rbs_weights: &[f64],
) -> SdMatch {
    if start_pos <= search_pos + MIN_RBS_DISTANCE {
        return SdMatch::default();
    }

    let limit = MAX_MOTIF_LENGTH.min(start_pos - MIN_RBS_DISTANCE - search_pos);
    let base_scores: Vec<f64> = (0..limit)
        .map(|i| match i % 3 {
            0 => {
                if is_a(packed, search_pos + i) {
                    2.0
                } else {
                    -3.0
                }
            }
            _ => {
                if is_g(packed, search_pos + i) {
                    3.0
                } else {
                    -2.0
                }
            }
        })
        .collect();

    let mut best = SdMatch::default();
    for motif_length in (5..=limit).rev() {
        for offset in 0..=(limit - motif_length) {
            let mut score = -2.0;
            let mut mismatches = 0;
            for (pos_in_motif, &base) in base_scores[offset..offset + motif_length]
                .iter()
                .enumerate()
            {
                score += base;
                if base < 0.0 {
                    mismatches += 1;
                    // terminal mismatches disqualify the window
                    if pos_in_motif <= 1 || pos_in_motif >= motif_length - 2 {
                        score -= 10.0;
                    }
                }
            }
            if mismatches != 1 {
                continue;
            }
            let distance = start_pos - (search_pos + offset + motif_length);
            if distance > MAX_RBS_DISTANCE || score < MIN_SD_SCORE {
                continue;
            }
            let bin = mismatch_bin(score as i32, mismatch_distance_class(distance));
            if bin_improves(bin, best.bin, rbs_weights) {
                best = SdMatch {
                    bin,
                    spacer: distance,
                };
            }
        }
    }
    best
}

const fn exact_distance_class(distance: usize, motif_length: usize) -> usize {
    match distance {
        0..=4 => {
            if motif_length < 5 {
                2
            } else {
                1
            }
        }
        5..=10 => 0,
        11..=12 => {
            if motif_length < 5 {
                1
            } else {
                2
            }
        }
        _ => 3,
    }
}

const fn mismatch_distance_class(distance: usize) -> usize {
    match distance {
        0..=4 => 1,
        5..=10 => 0,
        11..=12 => 2,
        _ => 3,
    }
}

const fn exact_bin(score: i32, distance_class: usize) -> usize {
    match (score, distance_class) {
        (6, 2) => 1,
        (6, 3) => 2,
        (8 | 9, 3) => 3,
        (6, 1) => 6,
        (11 | 12 | 14, 3) => 10,
        (8 | 9, 2) => 11,
        (8 | 9, 1) => 12,
        (6, 0) => 13,
        (8, 0) => 15,
        (9, 0) => 16,
        (11 | 12, 2) => 20,
        (11, 1) => 21,
        (11, 0) => 22,
        (12, 1) => 23,
        (12, 0) => 24,
        (14, 2) => 25,
        (14, 1) => 26,
        (14, 0) => 27,
        _ => 0,
    }
}

const fn mismatch_bin(score: i32, distance_class: usize) -> usize {
    match (score, distance_class) {
        (6 | 7, 3) => 2,
        (9, 3) => 3,
        (6, 2) => 4,
        (6, 1) => 5,
        (6, 0) => 9,
        (7, 2) => 7,
        (7, 1) => 8,
        (7, 0) => 14,
        (9, 2) => 17,
        (9, 1) => 18,
        (9, 0) => 19,
        _ => 0,
    }
}

fn bin_improves(candidate: usize, current: usize, rbs_weights: &[f64]) -> bool {
    rbs_weights[candidate] > rbs_weights[current]
        || (rbs_weights[candidate] == rbs_weights[current] && candidate > current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::encode_scalar;

    fn pack(raw: &[u8]) -> Vec<u8> {
        let mut packed = vec![0u8; (raw.len() * 2).div_ceil(8)];
        let mut ambiguity = vec![0u8; raw.len().div_ceil(8)];
        let mut masks = Vec::new();
        encode_scalar(raw, &mut packed, &mut ambiguity, &mut masks, false);
        packed
    }

    #[test]
    fn test_gc_frame_profile_shape() {
        let packed = pack(b"ATCGGCGCGCTAATCGGCGC");
        let profile = gc_frame_profile(&packed, 20);
        assert_eq!(profile.len(), 20);
        assert!(profile.iter().all(|&f| (-1..=2).contains(&f)));
    }

    #[test]
    fn test_gc_frame_profile_tiny_input() {
        let packed = pack(b"AT");
        assert_eq!(gc_frame_profile(&packed, 2), vec![-1, -1]);
    }

    #[test]
    fn test_richest_frame() {
        assert_eq!(richest_frame(10, 5, 3), 0);
        assert_eq!(richest_frame(5, 10, 3), 1);
        assert_eq!(richest_frame(5, 3, 10), 2);
        assert_eq!(richest_frame(5, 5, 3), 1);
    }

    #[test]
    fn test_sd_exact_strong_motif() {
        // AGGAGG six bases upstream of the start at 12
        let packed = pack(b"AGGAGGACAATCATGAAA");
        let weights: Vec<f64> = (0..28).map(|i| i as f64 * 0.1).collect();
        let hit = sd_bin_exact(&packed, 0, 12, &weights);
        assert_eq!(hit.bin, 27);
        assert_eq!(hit.spacer, 6);
    }

    #[test]
    fn test_sd_exact_no_motif() {
        let packed = pack(b"TTTTTTTTTTTTATGAAA");
        let weights = vec![0.0; 28];
        let hit = sd_bin_exact(&packed, 0, 12, &weights);
        assert_eq!(hit.bin, 0);
    }

    #[test]
    fn test_sd_exact_too_close() {
        let packed = pack(b"AGGAGGATG");
        let weights = vec![0.0; 28];
        // a search window butted against the start is rejected
        let hit = sd_bin_exact(&packed, 5, 6, &weights);
        assert_eq!(hit.bin, 0);
    }

    #[test]
    fn test_sd_mismatch_single_substitution() {
        // AGGcGG: one interior mismatch against the canonical pattern
        let packed = pack(b"AGGCGGACAATCATGAAA");
        let weights: Vec<f64> = (0..28).map(|i| i as f64 * 0.1).collect();
        let hit = sd_bin_mismatch(&packed, 0, 12, &weights);
        assert!(hit.bin > 0);
    }

    #[test]
    fn test_distance_classes() {
        assert_eq!(exact_distance_class(3, 6), 1);
        assert_eq!(exact_distance_class(3, 4), 2);
        assert_eq!(exact_distance_class(7, 6), 0);
        assert_eq!(exact_distance_class(12, 6), 2);
        assert_eq!(exact_distance_class(14, 6), 3);
        assert_eq!(mismatch_distance_class(7), 0);
        assert_eq!(mismatch_distance_class(14), 3);
    }
}
