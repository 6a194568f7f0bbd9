//! # Genoscan
//!
//! A gene-finding engine for prokaryotic and metagenomic DNA. Genoscan
//! enumerates every candidate start/stop codon pair, scores candidates
//! against trained statistical models of coding potential, and selects
//! a globally consistent, non-overlapping gene set by dynamic
//! programming.
//!
//! ## Modes
//!
//! - **Single-sequence mode**: iterative self-training on the input
//!   genome, then prediction with the converged model. Best for
//!   complete or near-complete genomes.
//! - **Metagenomic mode**: model selection from a precomputed bank of
//!   generic models by GC content. Robust on short, anonymous
//!   fragments where self-training would overfit.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use genoscan::config::GeneFinderConfig;
//! use genoscan::engine::{GeneFinder, PredictionMode};
//! use genoscan::sequence::dna::DnaSequence;
//!
//! let finder = GeneFinder::new(GeneFinderConfig::default())?;
//! let sequence = DnaSequence::new(b"ATGAAACGCATTAGCACC...")?;
//!
//! let model = finder.train(&sequence)?;
//! let genes = finder.find_genes(&sequence, PredictionMode::Single(&model))?;
//!
//! for gene in &genes {
//!     println!(
//!         "{}..{} ({}) {} conf={:.2}",
//!         gene.begin,
//!         gene.end,
//!         gene.strand_int(),
//!         gene.start_type,
//!         gene.confidence,
//!     );
//! }
//! # Ok::<(), genoscan::error::Error>(())
//! ```
//!
//! ## Module organization
//!
//! - [`sequence`]: validated 2-bit sequence representation, codon
//!   predicates, GC statistics
//! - [`node`]: candidate enumeration and scoring
//! - [`model`]: the trained statistical tables
//! - [`train`]: single-sequence self-training and the metagenomic bank
//! - [`dp`]: the dynamic-programming resolver
//! - [`genes`]: final gene records, annotation and translation
//! - [`engine`]: the `train` / `find_genes` entry points
//!
//! ## Errors
//!
//! All fallible operations return [`Result<T, Error>`](error::Error):
//! invalid input is rejected at the boundary, training failures are
//! surfaced explicitly (an empty prediction is a success, not an
//! error), and translation errors indicate engine defects.

pub mod bitmap;
pub mod config;
pub mod constants;
pub mod dp;
pub mod engine;
pub mod error;
pub mod genes;
pub mod model;
pub mod node;
pub mod sequence;
pub mod train;

pub use config::GeneFinderConfig;
pub use engine::{GeneFinder, PredictionMode};
pub use error::Error;
pub use genes::{Gene, StartType};
pub use model::ScoringModel;
pub use sequence::dna::DnaSequence;
