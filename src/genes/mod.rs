//! Final gene records and the builder that materializes them from the
//! resolved node path.

pub mod translate;

use bio::bio_types::strand::Strand;
use serde::{Serialize, Serializer};

use crate::constants::{
    MAX_CONFIDENCE, MAX_GENES, MAX_SAME_OVERLAP, NO_MOTIF_THRESHOLD, RBS_DESCRIPTIONS,
    START_SEARCH_WINDOW,
};
use crate::error::Error;
use crate::genes::translate::translate_span;
use crate::model::ScoringModel;
use crate::node::{CodonType, Node, intergenic_mod};
use crate::sequence::dna::DnaSequence;
use crate::sequence::kmer_text;

/// Start codon label carried on a gene record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StartType {
    #[default]
    Atg,
    Gtg,
    Ttg,
}

impl std::fmt::Display for StartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Atg => write!(f, "ATG"),
            Self::Gtg => write!(f, "GTG"),
            Self::Ttg => write!(f, "TTG"),
        }
    }
}

impl From<CodonType> for StartType {
    fn from(codon: CodonType) -> Self {
        match codon {
            CodonType::Gtg => Self::Gtg,
            CodonType::Ttg => Self::Ttg,
            _ => Self::Atg,
        }
    }
}

fn serialize_strand<S: Serializer>(strand: &Strand, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i8(match strand {
        Strand::Forward => 1,
        Strand::Reverse => -1,
        Strand::Unknown => 0,
    })
}

/// One accepted gene prediction.
///
/// Coordinates are 1-based inclusive on the forward strand, stop codon
/// included. Once built, a record holds no references to the node set
/// or the sequence it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gene {
    pub begin: usize,
    pub end: usize,
    #[serde(serialize_with = "serialize_strand")]
    pub strand: Strand,
    pub start_type: StartType,
    /// Label of the ribosome-binding motif, absent when nothing scored
    /// above threshold.
    pub rbs_motif: Option<String>,
    /// Spacer distance paired with `rbs_motif`.
    pub rbs_spacer: Option<usize>,
    /// Percent confidence in [50, 99.99].
    pub confidence: f64,
    pub total_score: f64,
    pub coding_score: f64,
    pub start_score: f64,
    pub rbs_score: f64,
    pub upstream_score: f64,
    pub type_score: f64,
    /// GC fraction of the gene span.
    pub gc_content: f64,
    translation: String,
}

impl Gene {
    /// Gene length in base pairs, stop codon included.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.end - self.begin + 1
    }

    /// Strand as +1 / -1.
    #[must_use]
    pub const fn strand_int(&self) -> i8 {
        match self.strand {
            Strand::Forward => 1,
            Strand::Reverse => -1,
            Strand::Unknown => 0,
        }
    }

    /// Amino-acid sequence, initial methionine included, stop excluded.
    #[must_use]
    pub fn translation(&self) -> &str {
        &self.translation
    }
}

/// A start/stop node pair collected from the path, before annotation.
#[derive(Debug, Clone, Copy)]
struct GeneSpan {
    begin: usize,
    end: usize,
    strand: Strand,
    start_index: usize,
    stop_index: usize,
}

/// Builds final gene records from the resolved path: collects node
/// pairs, optionally re-tweaks starts among same-stop alternatives, and
/// materializes annotated records.
pub struct GeneBuilder<'a> {
    spans: Vec<GeneSpan>,
    nodes: &'a [Node],
    model: &'a ScoringModel,
    sequence: &'a DnaSequence,
}

impl<'a> GeneBuilder<'a> {
    /// Collect gene spans by walking the forward-linked path from its
    /// head, skipping eliminated nodes.
    #[must_use]
    pub fn from_path(
        nodes: &'a [Node],
        terminal: usize,
        model: &'a ScoringModel,
        sequence: &'a DnaSequence,
    ) -> Self {
        let spans = collect_spans(nodes, terminal);
        Self {
            spans,
            nodes,
            model,
            sequence,
        }
    }

    /// Reconsider each gene's start among alternatives sharing its stop.
    #[must_use]
    pub fn with_tweaked_starts(mut self) -> Self {
        for i in 0..self.spans.len() {
            self.tweak_start(i);
        }
        self
    }

    /// Materialize annotated, translated gene records.
    ///
    /// # Errors
    ///
    /// [`Error::Translation`] if a collected span length is not a
    /// multiple of three; this indicates an engine defect.
    pub fn build(self) -> Result<Vec<Gene>, Error> {
        self.spans
            .iter()
            .map(|span| self.annotate(span))
            .collect()
    }

    fn annotate(&self, span: &GeneSpan) -> Result<Gene, Error> {
        let start_node = &self.nodes[span.start_index];

        let (rbs_motif, rbs_spacer) = self.resolve_rbs(start_node);
        let total_score = start_node.coding_score + start_node.start_score;
        let translation = translate_span(
            self.sequence,
            span.begin,
            span.end,
            span.strand,
            self.model.translation_table,
        )?;

        Ok(Gene {
            begin: span.begin,
            end: span.end,
            strand: span.strand,
            start_type: StartType::from(start_node.codon),
            rbs_motif,
            rbs_spacer,
            confidence: confidence(total_score, self.model.start_weight),
            total_score,
            coding_score: start_node.coding_score,
            start_score: start_node.start_score,
            rbs_score: start_node.rbs_score,
            upstream_score: start_node.upstream_score,
            type_score: start_node.type_score,
            gc_content: start_node.gc_content,
            translation,
        })
    }

    fn resolve_rbs(&self, start_node: &Node) -> (Option<String>, Option<usize>) {
        let exact = self.model.rbs_weights[start_node.rbs_bins[0]] * self.model.start_weight;
        let mismatch = self.model.rbs_weights[start_node.rbs_bins[1]] * self.model.start_weight;

        let sd_choice = || {
            let slot = if exact > mismatch { 0 } else { 1 };
            let bin = start_node.rbs_bins[slot];
            if bin == 0 {
                (None, None)
            } else {
                (
                    Some(RBS_DESCRIPTIONS[bin].0.to_string()),
                    Some(start_node.rbs_spacers[slot]),
                )
            }
        };

        if self.model.uses_sd_motifs {
            return sd_choice();
        }

        let motif_score = start_node.best_motif.score * self.model.start_weight;
        if self.model.no_motif_weight > NO_MOTIF_THRESHOLD && exact.max(mismatch) > motif_score {
            sd_choice()
        } else if start_node.best_motif.length == 0 {
            (None, None)
        } else {
            (
                Some(kmer_text(
                    start_node.best_motif.length,
                    start_node.best_motif.index,
                )),
                Some(start_node.best_motif.spacer),
            )
        }
    }

    fn tweak_start(&mut self, gene_index: usize) {
        let span = self.spans[gene_index];
        let current_index = span.start_index;
        let current = &self.nodes[current_index];

        let current_igm = self.context_adjustment(gene_index, current);
        let mut best_index = current_index;
        let mut best_score = current.coding_score + current.start_score + current_igm;

        let window_start = current_index.saturating_sub(START_SEARCH_WINDOW);
        let window_end = (current_index + START_SEARCH_WINDOW).min(self.nodes.len());
        for j in window_start..window_end {
            if j == current_index {
                continue;
            }
            let candidate = &self.nodes[j];
            if candidate.is_stop()
                || candidate.stop_position != current.stop_position
                || candidate.strand != current.strand
            {
                continue;
            }
            let Some(candidate_igm) = self.candidate_adjustment(gene_index, candidate) else {
                continue;
            };

            let score = candidate.coding_score + candidate.start_score + candidate_igm;
            let wins = score > best_score
                || (score == best_score
                    && (candidate.index < self.nodes[best_index].index
                        || (candidate.index == self.nodes[best_index].index
                            && candidate.codon.tie_break_rank()
                                < self.nodes[best_index].codon.tie_break_rank())));
            if wins {
                best_index = j;
                best_score = score;
            }
        }

        if best_index != current_index {
            let chosen = &self.nodes[best_index];
            let span = &mut self.spans[gene_index];
            span.start_index = best_index;
            match span.strand {
                Strand::Forward => span.begin = chosen.index + 1,
                Strand::Reverse => span.end = chosen.index + 1,
                Strand::Unknown => {}
            }
        }
    }

    /// Intergenic adjustment of the current start given its neighbors.
    fn context_adjustment(&self, gene_index: usize, node: &Node) -> f64 {
        let mut adjustment = 0.0;
        if gene_index > 0 {
            let previous = &self.spans[gene_index - 1];
            let previous_start = &self.nodes[previous.start_index];
            if node.strand == Strand::Forward && previous_start.strand == Strand::Forward {
                adjustment =
                    intergenic_mod(&self.nodes[previous.stop_index], node, self.model);
            } else if node.strand == Strand::Forward && previous_start.strand == Strand::Reverse {
                adjustment = intergenic_mod(previous_start, node, self.model);
            }
        }
        if gene_index + 1 < self.spans.len() {
            let next = &self.spans[gene_index + 1];
            let next_start = &self.nodes[next.start_index];
            if node.strand == Strand::Reverse && next_start.strand == Strand::Forward {
                adjustment = intergenic_mod(node, next_start, self.model);
            } else if node.strand == Strand::Reverse && next_start.strand == Strand::Reverse {
                adjustment = intergenic_mod(node, &self.nodes[next.stop_index], self.model);
            }
        }
        adjustment
    }

    /// As `context_adjustment`, additionally rejecting candidates that
    /// would overlap a neighbor illegally. `None` means rejected.
    fn candidate_adjustment(&self, gene_index: usize, candidate: &Node) -> Option<f64> {
        let mut adjustment = 0.0;
        if gene_index > 0 {
            let previous = &self.spans[gene_index - 1];
            let previous_start = &self.nodes[previous.start_index];
            if candidate.strand == Strand::Forward && previous_start.strand == Strand::Forward {
                let previous_stop_pos = self.nodes[previous.stop_index].index;
                if previous_stop_pos > candidate.index + MAX_SAME_OVERLAP {
                    return None;
                }
                adjustment =
                    intergenic_mod(&self.nodes[previous.stop_index], candidate, self.model);
            } else if candidate.strand == Strand::Forward
                && previous_start.strand == Strand::Reverse
            {
                if previous_start.index >= candidate.index {
                    return None;
                }
                adjustment = intergenic_mod(previous_start, candidate, self.model);
            }
        }
        if gene_index + 1 < self.spans.len() {
            let next = &self.spans[gene_index + 1];
            let next_start = &self.nodes[next.start_index];
            if candidate.strand == Strand::Reverse && next_start.strand == Strand::Forward {
                if next_start.index <= candidate.index {
                    return None;
                }
                adjustment = intergenic_mod(candidate, next_start, self.model);
            } else if candidate.strand == Strand::Reverse
                && next_start.strand == Strand::Reverse
            {
                let next_stop_pos = self.nodes[next.stop_index].index;
                if next_stop_pos + MAX_SAME_OVERLAP < candidate.index {
                    return None;
                }
                adjustment = intergenic_mod(candidate, &self.nodes[next.stop_index], self.model);
            }
        }
        Some(adjustment)
    }
}

fn collect_spans(nodes: &[Node], terminal: usize) -> Vec<GeneSpan> {
    let mut head = terminal;
    while let Some(previous) = nodes[head].traceback {
        head = previous;
    }

    let mut spans = Vec::new();
    let mut pending: Option<GeneSpan> = None;
    let mut current = Some(head);

    while let Some(i) = current {
        let node = &nodes[i];
        if node.eliminated {
            current = node.trace_forward;
            continue;
        }

        match (node.strand, node.is_stop()) {
            (Strand::Forward, false) => {
                pending = Some(GeneSpan {
                    begin: node.index + 1,
                    end: 0,
                    strand: Strand::Forward,
                    start_index: i,
                    stop_index: 0,
                });
            }
            (Strand::Reverse, true) => {
                pending = Some(GeneSpan {
                    begin: node.index - 1,
                    end: 0,
                    strand: Strand::Reverse,
                    start_index: 0,
                    stop_index: i,
                });
            }
            (Strand::Forward, true) => {
                if let Some(mut span) = pending.take()
                    && span.strand == Strand::Forward
                {
                    span.end = node.index + 3;
                    span.stop_index = i;
                    spans.push(span);
                }
            }
            (Strand::Reverse, false) => {
                if let Some(mut span) = pending.take()
                    && span.strand == Strand::Reverse
                {
                    span.end = node.index + 1;
                    span.start_index = i;
                    spans.push(span);
                }
            }
            (Strand::Unknown, _) => {}
        }

        if spans.len() >= MAX_GENES {
            tracing::warn!("maximum gene count reached, truncating predictions");
            break;
        }
        current = node.trace_forward;
    }

    spans
}

/// Logistic transform of the total score into a percent confidence.
fn confidence(score: f64, start_weight: f64) -> f64 {
    let normalized = score / start_weight;
    if normalized < 41.0 {
        let odds = normalized.exp();
        ((odds / (odds + 1.0)) * 100.0).max(50.0)
    } else {
        MAX_CONFIDENCE
    }
}
