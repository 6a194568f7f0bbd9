//! The trained statistical model driving node scoring.

use crate::constants::{
    DEFAULT_START_WEIGHT, MOTIF_INDEX_SPACE, NUM_BASES, NUM_DICODONS, NUM_MOTIF_SIZES,
    NUM_RBS_BINS, NUM_START_TYPES, UPSTREAM_POSITIONS,
};

/// Start codon type weights, indexed ATG / GTG / TTG.
pub type StartTypeWeights = [f64; NUM_START_TYPES];

/// Shine-Dalgarno bin weights.
pub type RbsBinWeights = [f64; NUM_RBS_BINS];

/// Upstream nucleotide composition log-odds, \[position\]\[base\].
pub type UpstreamComposition = [[f64; NUM_BASES]; UPSTREAM_POSITIONS];

/// Non-SD motif weights, \[length − 3\]\[spacer class\]\[motif index\].
pub type MotifWeights = [[[f64; MOTIF_INDEX_SPACE]; NUM_MOTIF_SIZES]; NUM_MOTIF_SIZES];

/// Dicodon log-likelihood table, one entry per 6-mer.
pub type DicodonTable = [f64; NUM_DICODONS];

/// The complete set of trained tables used to score candidate genes.
///
/// Produced once by the trainer (or taken from the metagenomic bank)
/// and read-only thereafter; a single model may be shared across any
/// number of prediction runs.
#[derive(Debug, Clone)]
pub struct ScoringModel {
    /// GC fraction of the training sequence (or the bank bin).
    pub gc_content: f64,
    /// NCBI genetic code table id.
    pub translation_table: i32,
    /// Whether start scoring uses Shine-Dalgarno bins (true) or the
    /// trained upstream-motif tables (false).
    pub uses_sd_motifs: bool,
    /// Log-odds of observing each start codon type at real starts.
    pub start_type_weights: StartTypeWeights,
    /// Log-odds per Shine-Dalgarno bin.
    pub rbs_weights: Box<RbsBinWeights>,
    /// Upstream composition log-odds.
    pub upstream_composition: Box<UpstreamComposition>,
    /// Non-SD motif log-odds.
    pub motif_weights: Box<MotifWeights>,
    /// Log-odds for starts with no recognizable motif.
    pub no_motif_weight: f64,
    /// Multiplier applied to all start-site score components.
    pub start_weight: f64,
    /// Per-frame GC bias factors from the seed pass.
    pub gc_frame_bias: [f64; 3],
    /// Coding log-likelihood per dicodon.
    pub dicodon_scores: Box<DicodonTable>,
}

impl Default for ScoringModel {
    fn default() -> Self {
        Self {
            gc_content: 0.5,
            translation_table: 11,
            uses_sd_motifs: true,
            start_type_weights: [0.0; NUM_START_TYPES],
            rbs_weights: Box::new([0.0; NUM_RBS_BINS]),
            upstream_composition: Box::new([[0.0; NUM_BASES]; UPSTREAM_POSITIONS]),
            motif_weights: boxed_motif_weights(),
            no_motif_weight: 0.0,
            start_weight: DEFAULT_START_WEIGHT,
            gc_frame_bias: [1.0; 3],
            dicodon_scores: Box::new([0.0; NUM_DICODONS]),
        }
    }
}

/// Allocate the zeroed motif table directly on the heap; the array is
/// too large to build on the stack first.
pub(crate) fn boxed_motif_weights() -> Box<MotifWeights> {
    let vec = vec![[[0.0; MOTIF_INDEX_SPACE]; NUM_MOTIF_SIZES]; NUM_MOTIF_SIZES];
    vec.into_boxed_slice().try_into().unwrap()
}
