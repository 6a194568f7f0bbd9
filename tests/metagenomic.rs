//! Metagenomic mode: bank selection and prediction properties.

mod common;

use std::sync::Arc;

use genoscan::config::GeneFinderConfig;
use genoscan::engine::{GeneFinder, PredictionMode};
use genoscan::sequence::dna::DnaSequence;
use genoscan::train::bank::{BankBin, BankEntry, Domain, TrainingBank, generic_model};

use common::tandem_genes;

fn synthetic_bank(gc_percents: &[(&'static str, f64)]) -> TrainingBank {
    TrainingBank::from_models(
        gc_percents
            .iter()
            .enumerate()
            .map(|(id, &(label, gc_percent))| {
                let descriptor = BankBin {
                    id,
                    label,
                    domain: Domain::Bacteria,
                    gc_percent,
                    translation_table: 11,
                };
                BankEntry {
                    model: generic_model(&descriptor),
                    descriptor,
                }
            })
            .collect(),
    )
}

#[test]
fn exact_gc_match_selects_that_bank_entry() {
    let sequence = DnaSequence::new(&tandem_genes(3)).unwrap();
    let bank = synthetic_bank(&[
        ("low", 20.0),
        ("exact", sequence.gc_content * 100.0),
        ("high", 80.0),
    ]);
    let chosen = bank.nearest(sequence.gc_content).unwrap();
    assert_eq!(chosen.descriptor.label, "exact");
}

#[test]
fn halfway_gc_resolves_to_lower_entry() {
    let bank = synthetic_bank(&[("forty", 40.0), ("fifty", 50.0)]);
    let chosen = bank.nearest(0.45).unwrap();
    assert_eq!(chosen.descriptor.label, "forty");
}

#[test]
fn nearest_is_stable_across_calls() {
    let bank = synthetic_bank(&[("a", 30.0), ("b", 42.0), ("c", 55.0), ("d", 68.0)]);
    for gc in [0.0, 0.30, 0.36, 0.4201, 0.485, 0.55, 0.615, 0.68, 1.0] {
        let first = bank.nearest(gc).unwrap().descriptor.label;
        let second = bank.nearest(gc).unwrap().descriptor.label;
        assert_eq!(first, second);
    }
}

#[test]
fn built_in_bank_spans_the_gc_range() {
    let bank = TrainingBank::built_in();
    let lowest = bank.nearest(0.10).unwrap().descriptor.gc_percent;
    let highest = bank.nearest(0.90).unwrap().descriptor.gc_percent;
    assert!(lowest < 35.0);
    assert!(highest > 65.0);
}

#[test]
fn metagenomic_prediction_satisfies_gene_invariants() {
    let sequence = DnaSequence::new(&tandem_genes(3)).unwrap();
    let finder = GeneFinder::new(GeneFinderConfig::default()).unwrap();

    let genes = finder
        .find_genes(&sequence, PredictionMode::Metagenomic)
        .unwrap();

    for gene in &genes {
        assert!(gene.begin <= gene.end);
        assert_eq!((gene.end - gene.begin + 1) % 3, 0);
        assert!(!gene.translation().contains('*'));
    }
}

#[test]
fn metagenomic_prediction_is_idempotent() {
    let sequence = DnaSequence::new(&tandem_genes(3)).unwrap();
    let finder = GeneFinder::new(GeneFinderConfig::default()).unwrap();

    let first = finder
        .find_genes(&sequence, PredictionMode::Metagenomic)
        .unwrap();
    let second = finder
        .find_genes(&sequence, PredictionMode::Metagenomic)
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn candidate_evaluation_prefers_higher_scoring_model() {
    // A bank whose two entries straddle the sequence GC: the winner
    // must be chosen by total path score, deterministically.
    let sequence = DnaSequence::new(&tandem_genes(4)).unwrap();
    let gc = sequence.gc_content * 100.0;
    let bank = synthetic_bank(&[("below", gc - 1.0), ("above", gc + 1.0)]);
    let finder = GeneFinder::with_bank(GeneFinderConfig::default(), Arc::new(bank));

    let first = finder
        .find_genes(&sequence, PredictionMode::Metagenomic)
        .unwrap();
    let second = finder
        .find_genes(&sequence, PredictionMode::Metagenomic)
        .unwrap();
    assert_eq!(first, second);
}
