//! The prediction engine and its two public entry points.
//!
//! ```rust,no_run
//! use genoscan::config::GeneFinderConfig;
//! use genoscan::engine::{GeneFinder, PredictionMode};
//! use genoscan::sequence::dna::DnaSequence;
//!
//! let finder = GeneFinder::new(GeneFinderConfig::default())?;
//! let sequence = DnaSequence::new(b"ATGAAACGCATT...")?;
//!
//! // Single-sequence mode: train, then predict
//! let model = finder.train(&sequence)?;
//! let genes = finder.find_genes(&sequence, PredictionMode::Single(&model))?;
//!
//! // Metagenomic mode: resolve against the precomputed bank
//! let genes = finder.find_genes(&sequence, PredictionMode::Metagenomic)?;
//! # Ok::<(), genoscan::error::Error>(())
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::config::GeneFinderConfig;
use crate::dp::{eliminate_negative_genes, resolve};
use crate::error::Error;
use crate::genes::{Gene, GeneBuilder};
use crate::model::ScoringModel;
use crate::node::{enumerate_nodes, record_frame_starts, score_nodes, sort_nodes};
use crate::sequence::dna::DnaSequence;
use crate::train::bank::TrainingBank;
use crate::train::train_single;

/// How `find_genes` obtains its scoring model.
#[derive(Debug, Clone, Copy)]
pub enum PredictionMode<'a> {
    /// Use a model previously produced by [`GeneFinder::train`].
    Single(&'a ScoringModel),
    /// Resolve against the precomputed bank by GC content.
    Metagenomic,
}

/// The gene-finding engine.
///
/// Stateless apart from configuration; one instance may serve any
/// number of sequences, concurrently, since every pipeline borrows its
/// inputs read-only.
#[derive(Debug)]
pub struct GeneFinder {
    config: GeneFinderConfig,
    bank: Arc<TrainingBank>,
}

impl GeneFinder {
    /// Create an engine with the given configuration, resolving
    /// metagenomic predictions against the built-in bank.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when the requested rayon thread pool
    /// cannot be installed.
    pub fn new(config: GeneFinderConfig) -> Result<Self, Error> {
        if let Some(num_threads) = config.num_threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .map_err(|e| Error::Configuration(format!("thread pool setup failed: {e}")))?;
        }
        Ok(Self {
            config,
            bank: TrainingBank::shared(),
        })
    }

    /// As [`GeneFinder::new`], with a caller-supplied bank. Used by
    /// tests and by callers with their own model collections.
    #[must_use]
    pub fn with_bank(config: GeneFinderConfig, bank: Arc<TrainingBank>) -> Self {
        Self { config, bank }
    }

    #[must_use]
    pub const fn config(&self) -> &GeneFinderConfig {
        &self.config
    }

    /// Train a scoring model on a single sequence.
    ///
    /// # Errors
    ///
    /// [`Error::TrainingFailure`] when self-training cannot converge or
    /// converges on a degenerate gene set.
    pub fn train(&self, sequence: &DnaSequence) -> Result<ScoringModel, Error> {
        train_single(sequence, &self.config)
    }

    /// Predict genes in a sequence.
    ///
    /// The result is ordered by coordinate and deterministic: repeated
    /// calls with the same sequence and mode yield identical records.
    /// A sequence legitimately containing no genes yields `Ok(vec![])`.
    ///
    /// # Errors
    ///
    /// [`Error::Translation`] on an internal span invariant violation.
    pub fn find_genes(
        &self,
        sequence: &DnaSequence,
        mode: PredictionMode<'_>,
    ) -> Result<Vec<Gene>, Error> {
        match mode {
            PredictionMode::Single(model) => {
                self.predict(sequence, model, false).map(|(genes, _)| genes)
            }
            PredictionMode::Metagenomic => self.find_genes_metagenomic(sequence),
        }
    }

    /// One full prediction pass with a fixed model. Returns the genes
    /// and the total path score (used to rank candidate bank models).
    fn predict(
        &self,
        sequence: &DnaSequence,
        model: &ScoringModel,
        is_meta: bool,
    ) -> Result<(Vec<Gene>, f64), Error> {
        let mut nodes = enumerate_nodes(sequence, model);
        sort_nodes(&mut nodes);
        if nodes.is_empty() {
            return Ok((Vec::new(), 0.0));
        }

        score_nodes(sequence, &mut nodes, model, is_meta);
        record_frame_starts(&mut nodes, model, true);

        let Some(terminal) = resolve(&mut nodes, model, true) else {
            return Ok((Vec::new(), 0.0));
        };
        eliminate_negative_genes(&mut nodes, Some(terminal), model);

        let genes = GeneBuilder::from_path(&nodes, terminal, model, sequence)
            .with_tweaked_starts()
            .build()?;
        let total_score = nodes[terminal].total_score;
        Ok((genes, total_score))
    }

    /// Metagenomic resolution: run one prediction per candidate bank
    /// model near the sequence's GC and keep the best-scoring result.
    /// Ties keep the earlier (lower-GC) candidate.
    fn find_genes_metagenomic(&self, sequence: &DnaSequence) -> Result<Vec<Gene>, Error> {
        let candidates = self.bank.candidates(sequence.gc_content);
        if candidates.is_empty() {
            return Err(Error::Configuration(
                "metagenomic prediction requires a non-empty training bank".to_string(),
            ));
        }

        let mut best: Option<(Vec<Gene>, f64, &str)> = None;
        for entry in candidates {
            let (genes, score) = self.predict(sequence, &entry.model, true)?;
            debug!(
                bin = entry.descriptor.label,
                gc = entry.descriptor.gc_percent,
                score,
                genes = genes.len(),
                "evaluated bank candidate"
            );
            let improves = match &best {
                None => true,
                Some((_, best_score, _)) => score > *best_score,
            };
            if improves {
                best = Some((genes, score, entry.descriptor.label));
            }
        }

        let (genes, score, label) = best.expect("at least one candidate was evaluated");
        debug!(bin = label, score, genes = genes.len(), "selected bank model");
        Ok(genes)
    }
}
