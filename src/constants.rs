//! Tunable numeric constants for the gene-finding engine.
//!
//! The defaults follow the values the algorithm was originally calibrated
//! with; changing them shifts the balance between sensitivity and
//! specificity and invalidates any previously trained model.

// --- Sequence handling ---------------------------------------------------

/// Minimum sequence length accepted for any prediction or training run.
pub const MIN_SEQUENCE_LENGTH: usize = 96;

/// Number of reading frames per strand.
pub const READING_FRAMES: usize = 3;

/// Length of a codon in base pairs.
pub const CODON_LENGTH: usize = 3;

/// Sliding window size for the GC-frame profile.
pub const GC_WINDOW_SIZE: usize = 120;

/// SIMD chunk size for sequence encoding (u8x32 lanes).
pub const ENCODE_CHUNK_SIZE: usize = 32;

/// Minimum run of ambiguous bases that becomes a masked region.
pub const MASK_SIZE: usize = 50;

// --- Gene geometry -------------------------------------------------------

/// Minimum gene length in base pairs.
pub const MIN_GENE_LENGTH: usize = 90;

/// Maximum allowed overlap between genes on the same strand.
pub const MAX_SAME_OVERLAP: usize = 60;

/// Maximum allowed overlap between genes on opposite strands.
pub const MAX_OPPOSITE_OVERLAP: i32 = 200;

/// Width of a stop codon minus one; used when extending spans to the
/// final stop base.
pub const STOP_CODON_OFFSET: usize = 2;

/// Penalty factor applied to overlapping or distant gene connections.
pub const OVERLAP_PENALTY_FACTOR: f64 = 0.15;

/// Distance threshold for operon-proximity bonuses.
pub const OPERON_DISTANCE: f64 = 60.0;

// --- Node bookkeeping ----------------------------------------------------

/// Initial capacity reserved for the node arena.
pub const NODE_RESERVE: usize = 100_000;

/// Maximum number of genes reported for a single sequence.
pub const MAX_GENES: usize = 30_000;

/// Bounded look-back window (in node indices) for the dynamic
/// programming predecessor search.
pub const MAX_NODE_DISTANCE: usize = 500;

/// Window (in node indices) searched for alternative starts sharing a
/// stop during final start tweaking.
pub const START_SEARCH_WINDOW: usize = 100;

// --- Dicodon statistics --------------------------------------------------

/// Length of a dicodon (two codons) in base pairs.
pub const DICODON_LENGTH: usize = 6;

/// Number of distinct dicodons (4^6).
pub const NUM_DICODONS: usize = 4096;

// --- RBS / motif search --------------------------------------------------

/// Minimum motif length considered in the upstream search.
pub const MIN_MOTIF_LENGTH: usize = 3;

/// Maximum motif length considered in the upstream search.
pub const MAX_MOTIF_LENGTH: usize = 6;

/// Minimum distance between a motif and the start codon.
pub const MIN_RBS_DISTANCE: usize = 4;

/// Maximum distance between a motif and the start codon.
pub const MAX_RBS_DISTANCE: usize = 15;

/// How far upstream of a start the RBS window scan begins.
pub const RBS_UPSTREAM_WINDOW: usize = 20;

/// How far upstream of a start the RBS window scan ends.
pub const RBS_DOWNSTREAM_WINDOW: usize = 6;

/// Number of Shine-Dalgarno bins.
pub const NUM_RBS_BINS: usize = 28;

/// Number of motif length categories (lengths 3 through 6).
pub const NUM_MOTIF_SIZES: usize = 4;

/// Size of the motif index space (4^6).
pub const MOTIF_INDEX_SPACE: usize = 4096;

/// Minimum cumulative match score for a Shine-Dalgarno window.
pub const MIN_SD_SCORE: f64 = 6.0;

/// Floor for motif weights.
pub const MIN_MOTIF_SCORE: f64 = -4.0;

/// Sentinel starting value for the best-motif search.
pub const INITIAL_MOTIF_SCORE: f64 = -100.0;

/// Margin a motif must clear above the no-motif weight to be reported.
pub const MOTIF_THRESHOLD_OFFSET: f64 = 0.69;

/// No-motif weight below which motif hits are preferred over SD bins.
pub const NO_MOTIF_THRESHOLD: f64 = -0.5;

// --- Score shaping -------------------------------------------------------

/// Clamp bounds for log-likelihood scores.
pub const MIN_LOG_ODDS: f64 = -5.0;
pub const MAX_LOG_ODDS: f64 = 5.0;

/// Sentinel used while normalizing per-frame coding scores.
pub const CODING_SCORE_SENTINEL: f64 = -10_000.0;

/// Coding score below which metagenomic short-fragment penalties apply.
pub const CODING_SCORE_THRESHOLD: f64 = 5.0;

/// Genes shorter than this have their start-score components rescaled.
pub const SHORT_GENE_THRESHOLD: usize = 250;

/// Penalty applied to starts of ORFs with negative coding potential.
pub const NEGATIVE_SCORE_PENALTY: f64 = 0.5;

/// Length-factor threshold and multiplier for coding-score flooring.
pub const LENGTH_FACTOR_THRESHOLD: f64 = 3.0;
pub const LENGTH_FACTOR_MULTIPLIER: f64 = 0.5;

/// Gene size bounds (in codons) for the length-factor model.
pub const MIN_GENE_CODONS: i32 = 80;
pub const MAX_GENE_CODONS: i32 = 1000;
pub const GENE_SIZE_SCALING: f64 = 920.0;

/// Default weight multiplier for start-site score components.
pub const DEFAULT_START_WEIGHT: f64 = 4.35;

/// Maximum confidence percentage reported for a gene.
pub const MAX_CONFIDENCE: f64 = 99.99;

// --- Metagenomic mode ----------------------------------------------------

/// Sequences shorter than this receive fragment penalties in
/// metagenomic mode.
pub const META_LENGTH_THRESHOLD: usize = 3000;

/// Minimum robust gene length on short metagenomic fragments.
pub const MIN_META_GENE_LENGTH: usize = 120;

/// Penalty coefficient for short metagenomic fragments.
pub const META_PENALTY: f64 = 7.5;
pub const META_PENALTY_DIVISOR: f64 = 2700.0;

/// Candidate bank models within this many GC percentage points of the
/// nearest bin are also evaluated.
pub const GC_NEIGHBOR_WINDOW: f64 = 3.0;

// --- Upstream composition ------------------------------------------------

/// Range scanned upstream of a start for composition statistics.
pub const UPSTREAM_SCAN_RANGE: usize = 45;

/// Positions (2, skip-end) are excluded from the upstream scan.
pub const UPSTREAM_SKIP_START: usize = 2;
pub const UPSTREAM_SKIP_END: usize = 15;

/// Number of retained upstream positions.
pub const UPSTREAM_POSITIONS: usize = 32;

/// Weight of the upstream composition component.
pub const UPSTREAM_COMPOSITION_WEIGHT: f64 = 0.4;

// --- Training ------------------------------------------------------------

/// Inner iteration budget for Shine-Dalgarno weight training.
pub const MAX_SD_ITERATIONS: usize = 10;

/// Inner iteration budget for non-SD motif training.
pub const MAX_NONSD_ITERATIONS: usize = 20;

/// Outer refinement rounds before training is declared non-convergent.
pub const MAX_REFINEMENT_ROUNDS: usize = 10;

/// Total-score improvement below which refinement has converged.
pub const SCORE_IMPROVEMENT_TOLERANCE: f64 = 1.0;

/// Starting score threshold for selecting training starts.
pub const INITIAL_TRAINING_THRESHOLD: f64 = 35.0;

/// Divisor applied to the threshold when too few starts qualify.
pub const THRESHOLD_DIVISOR: f64 = 2.0;

/// Node-to-gene ratio below which the threshold is relaxed.
pub const GENE_RATIO_THRESHOLD: f64 = 2000.0;

/// Fraction of training genes a 3-base motif must cover to seed the
/// non-SD coverage map.
pub const MOTIF_COVERAGE_THRESHOLD: f64 = 0.2;

/// GC bounds beyond which fixed background frequencies are used.
pub const MIN_GC_CONTENT: f64 = 0.1;
pub const MAX_GC_CONTENT: f64 = 0.9;

/// Fixed background frequencies for extreme-GC genomes.
pub const EXTREME_AT_FREQ: f64 = 0.90;
pub const EXTREME_GC_FREQ: f64 = 0.10;

/// Clamp bounds for trained weights.
pub const WEIGHT_CLAMP_MIN: f64 = -4.0;
pub const WEIGHT_CLAMP_MAX: f64 = 4.0;

/// Thresholds on RBS bin weights used by the SD-usage decision.
pub const RBS_WEIGHT_HIGH: f64 = 1.0;
pub const RBS_WEIGHT_LOW: f64 = -0.5;
pub const RBS_WEIGHT_STRONG: f64 = 2.0;

/// Number of recognized start codon types (ATG, GTG, TTG).
pub const NUM_START_TYPES: usize = 3;

/// Number of nucleotide bases.
pub const NUM_BASES: usize = 4;

// --- Annotation ----------------------------------------------------------

/// ASCII lookup for the 2-bit nucleotide codes.
pub const NUCLEOTIDE_LOOKUP: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Shine-Dalgarno bin descriptions: (motif label, spacer range label).
pub const RBS_DESCRIPTIONS: [(&str, &str); NUM_RBS_BINS] = [
    ("None", "None"),
    ("GGA/GAG/AGG", "3-4bp"),
    ("3Base/5BMM", "13-15bp"),
    ("4Base/6BMM", "13-15bp"),
    ("AGxAG", "11-12bp"),
    ("AGxAG", "3-4bp"),
    ("GGA/GAG/AGG", "11-12bp"),
    ("GGxGG", "11-12bp"),
    ("GGxGG", "3-4bp"),
    ("AGxAG", "5-10bp"),
    ("AGGAG(G)/GGAGG", "13-15bp"),
    ("AGGA/GGAG/GAGG", "3-4bp"),
    ("AGGA/GGAG/GAGG", "11-12bp"),
    ("GGA/GAG/AGG", "5-10bp"),
    ("GGxGG", "5-10bp"),
    ("AGGA", "5-10bp"),
    ("GGAG/GAGG", "5-10bp"),
    ("AGxAGG/AGGxGG", "11-12bp"),
    ("AGxAGG/AGGxGG", "3-4bp"),
    ("AGxAGG/AGGxGG", "5-10bp"),
    ("AGGAG/GGAGG", "11-12bp"),
    ("AGGAG", "3-4bp"),
    ("AGGAG", "5-10bp"),
    ("GGAGG", "3-4bp"),
    ("GGAGG", "5-10bp"),
    ("AGGAGG", "11-12bp"),
    ("AGGAGG", "3-4bp"),
    ("AGGAGG", "5-10bp"),
];
