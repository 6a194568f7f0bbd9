//! The precomputed model bank for metagenomic prediction.
//!
//! Anonymous fragments are too short and too mixed to self-train on,
//! so prediction falls back to generic models representative of known
//! genomes across the GC spectrum. The bank is immutable, built at most
//! once per process, and shared by reference counting; tests substitute
//! small synthetic banks through [`TrainingBank::from_models`].

use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::constants::{GC_NEIGHBOR_WINDOW, NUM_RBS_BINS};
use crate::model::ScoringModel;

/// Taxonomic domain of a bank bin's representative genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Domain {
    Bacteria,
    Archaea,
}

/// Descriptor for one bank entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BankBin {
    /// Stable bin identifier.
    pub id: usize,
    /// Canonical label of the representative genome.
    pub label: &'static str,
    pub domain: Domain,
    /// Representative GC percentage (0-100 scale).
    pub gc_percent: f64,
    /// Genetic code of the representative genome.
    pub translation_table: i32,
}

/// The 50 representative bins, ordered by id.
const BINS: [BankBin; 50] = [
    bin(0, "Mycoplasma_bovis_PG45", Domain::Bacteria, 29.31, 4),
    bin(1, "Mycoplasma_pneumoniae_M129", Domain::Bacteria, 40.01, 4),
    bin(2, "Mycoplasma_suis_Illinois", Domain::Bacteria, 31.08, 4),
    bin(3, "Aeropyrum_pernix_K1", Domain::Archaea, 56.31, 11),
    bin(4, "Akkermansia_muciniphila_ATCC_BAA_835", Domain::Bacteria, 55.76, 11),
    bin(5, "Anaplasma_marginale_Maries", Domain::Bacteria, 49.76, 11),
    bin(6, "Anaplasma_phagocytophilum_HZ", Domain::Bacteria, 41.64, 11),
    bin(7, "Archaeoglobus_fulgidus_DSM_4304", Domain::Archaea, 48.58, 11),
    bin(8, "Bacteroides_fragilis_NCTC_9343", Domain::Bacteria, 43.19, 11),
    bin(9, "Brucella_canis_ATCC_23365", Domain::Bacteria, 57.21, 11),
    bin(10, "Burkholderia_rhizoxinica_HKI_454", Domain::Bacteria, 59.70, 11),
    bin(11, "Candidatus_Amoebophilus_asiaticus_5a2", Domain::Bacteria, 35.05, 11),
    bin(12, "Candidatus_Korarchaeum_cryptofilum_OPF8", Domain::Archaea, 49.00, 11),
    bin(13, "Catenulispora_acidiphila_DSM_44928", Domain::Bacteria, 69.77, 11),
    bin(14, "Cenarchaeum_symbiosum_B", Domain::Archaea, 57.19, 11),
    bin(15, "Chlorobium_phaeobacteroides_BS1", Domain::Bacteria, 48.93, 11),
    bin(16, "Chlorobium_tepidum_TLS", Domain::Bacteria, 56.53, 11),
    bin(17, "Desulfotomaculum_acetoxidans_DSM_771", Domain::Bacteria, 41.55, 11),
    bin(18, "Desulfurococcus_kamchatkensis_1221n", Domain::Bacteria, 45.34, 11),
    bin(19, "Erythrobacter_litoralis_HTCC2594", Domain::Bacteria, 63.07, 11),
    bin(20, "Escherichia_coli_UMN026", Domain::Bacteria, 50.72, 11),
    bin(21, "Haloquadratum_walsbyi_DSM_16790", Domain::Archaea, 47.86, 11),
    bin(22, "Halorubrum_lacusprofundi_ATCC_49239", Domain::Archaea, 57.14, 11),
    bin(23, "Hyperthermus_butylicus_DSM_5456", Domain::Archaea, 53.74, 11),
    bin(24, "Ignisphaera_aggregans_DSM_17230", Domain::Archaea, 35.69, 11),
    bin(25, "Marinobacter_aquaeolei_VT8", Domain::Bacteria, 57.27, 11),
    bin(26, "Methanopyrus_kandleri_AV19", Domain::Archaea, 61.16, 11),
    bin(27, "Methanosphaerula_palustris_E1_9c", Domain::Archaea, 55.35, 11),
    bin(28, "Methanothermobacter_thermautotrophicus_Delta_H", Domain::Bacteria, 49.54, 11),
    bin(29, "Methylacidiphilum_infernorum_V4", Domain::Bacteria, 45.48, 11),
    bin(30, "Mycobacterium_leprae_TN", Domain::Bacteria, 57.80, 11),
    bin(31, "Natrialba_magadii_ATCC_43099", Domain::Archaea, 61.42, 11),
    bin(32, "Orientia_tsutsugamushi_Boryong", Domain::Bacteria, 30.53, 11),
    bin(33, "Pelotomaculum_thermopropionicum_SI", Domain::Bacteria, 52.96, 11),
    bin(34, "Prochlorococcus_marinus_MIT_9313", Domain::Bacteria, 50.74, 11),
    bin(35, "Pyrobaculum_aerophilum_IM2", Domain::Archaea, 51.36, 11),
    bin(36, "Ralstonia_solanacearum_PSI07", Domain::Bacteria, 66.13, 11),
    bin(37, "Rhizobium_NGR234", Domain::Bacteria, 58.49, 11),
    bin(38, "Rhodococcus_jostii_RHA1", Domain::Bacteria, 65.05, 11),
    bin(39, "Rickettsia_conorii_Malish_7", Domain::Bacteria, 32.44, 11),
    bin(40, "Rothia_dentocariosa_ATCC_17931", Domain::Bacteria, 53.69, 11),
    bin(41, "Shigella_dysenteriae_Sd197", Domain::Bacteria, 51.25, 11),
    bin(42, "Synechococcus_CC9605", Domain::Bacteria, 59.22, 11),
    bin(43, "Synechococcus_JA_2_3B_a_2_13_", Domain::Bacteria, 58.45, 11),
    bin(44, "Thermoplasma_volcanium_GSS1", Domain::Archaea, 39.92, 11),
    bin(45, "Treponema_pallidum_Nichols", Domain::Bacteria, 52.77, 11),
    bin(46, "Tropheryma_whipplei_TW08_27", Domain::Bacteria, 46.31, 11),
    bin(47, "Xenorhabdus_nematophila_ATCC_19061", Domain::Bacteria, 44.15, 11),
    bin(48, "Xylella_fastidiosa_Temecula1", Domain::Bacteria, 51.78, 11),
    bin(49, "_Nostoc_azollae__0708", Domain::Bacteria, 38.45, 11),
];

const fn bin(
    id: usize,
    label: &'static str,
    domain: Domain,
    gc_percent: f64,
    translation_table: i32,
) -> BankBin {
    BankBin {
        id,
        label,
        domain,
        gc_percent,
        translation_table,
    }
}

/// One bank entry: descriptor plus its generic model.
#[derive(Debug)]
pub struct BankEntry {
    pub descriptor: BankBin,
    pub model: ScoringModel,
}

/// Read-only, GC-ordered collection of generic scoring models.
#[derive(Debug)]
pub struct TrainingBank {
    entries: Vec<BankEntry>,
}

impl TrainingBank {
    /// Build the built-in bank from the 50 representative bins.
    #[must_use]
    pub fn built_in() -> Self {
        let entries = BINS
            .iter()
            .map(|&descriptor| BankEntry {
                model: generic_model(&descriptor),
                descriptor,
            })
            .collect();
        Self { entries }
    }

    /// Build a bank from caller-supplied entries (test fixtures).
    #[must_use]
    pub fn from_models(mut entries: Vec<BankEntry>) -> Self {
        entries.sort_by(|a, b| {
            a.descriptor
                .gc_percent
                .partial_cmp(&b.descriptor.gc_percent)
                .unwrap()
                .then(a.descriptor.id.cmp(&b.descriptor.id))
        });
        Self { entries }
    }

    /// The process-wide bank, built on first use.
    pub fn shared() -> Arc<Self> {
        static BANK: OnceLock<Arc<TrainingBank>> = OnceLock::new();
        Arc::clone(BANK.get_or_init(|| Arc::new(Self::built_in())))
    }

    #[must_use]
    pub fn entries(&self) -> &[BankEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry whose representative GC lies closest to `gc_fraction`
    /// (0-1 scale). A GC exactly halfway between two entries resolves
    /// to the lower-GC entry.
    #[must_use]
    pub fn nearest(&self, gc_fraction: f64) -> Option<&BankEntry> {
        let gc_percent = gc_fraction * 100.0;
        let mut best: Option<(&BankEntry, f64)> = None;
        for entry in &self.entries {
            let distance = (entry.descriptor.gc_percent - gc_percent).abs();
            let improves = match best {
                None => true,
                Some((incumbent, best_distance)) => {
                    distance < best_distance
                        || (distance == best_distance
                            && entry.descriptor.gc_percent < incumbent.descriptor.gc_percent)
                }
            };
            if improves {
                best = Some((entry, distance));
            }
        }
        best.map(|(entry, _)| entry)
    }

    /// The nearest entry plus every entry within the neighbor window of
    /// the observed GC, in ascending GC order.
    #[must_use]
    pub fn candidates(&self, gc_fraction: f64) -> Vec<&BankEntry> {
        let Some(nearest) = self.nearest(gc_fraction) else {
            return Vec::new();
        };
        let gc_percent = gc_fraction * 100.0;

        let mut picked: Vec<&BankEntry> = self
            .entries
            .iter()
            .filter(|entry| {
                (entry.descriptor.gc_percent - gc_percent).abs() <= GC_NEIGHBOR_WINDOW
                    || std::ptr::eq(*entry, nearest)
            })
            .collect();
        picked.sort_by(|a, b| {
            a.descriptor
                .gc_percent
                .partial_cmp(&b.descriptor.gc_percent)
                .unwrap()
                .then(a.descriptor.id.cmp(&b.descriptor.id))
        });
        picked
    }
}

/// Synthesize a generic scoring model for a bank bin.
///
/// The tables are parameterized by the bin's GC content and domain:
/// dicodon log-odds follow a positional GC model of coding sequence,
/// start-type weights follow typical usage, and the Shine-Dalgarno
/// weights follow the canonical bin-strength ladder.
#[must_use]
pub fn generic_model(descriptor: &BankBin) -> ScoringModel {
    let gc = descriptor.gc_percent / 100.0;
    let mut model = ScoringModel {
        gc_content: gc,
        translation_table: descriptor.translation_table,
        uses_sd_motifs: true,
        ..Default::default()
    };

    model.start_type_weights = match descriptor.domain {
        Domain::Bacteria => [0.85, -0.35, -1.10],
        Domain::Archaea => [0.65, 0.05, -0.80],
    };

    let sd_strength = match descriptor.domain {
        Domain::Bacteria => 1.0,
        Domain::Archaea => 0.8,
    };
    for (index, weight) in model.rbs_weights.iter_mut().enumerate() {
        *weight = sd_bin_ladder(index) * sd_strength;
    }

    for (index, slot) in model.dicodon_scores.iter_mut().enumerate() {
        *slot = dicodon_log_odds(index, gc);
    }

    model
}

/// Canonical relative strength of each SD bin: no-bin slightly
/// negative, full AGGAGG at short spacers strongest.
fn sd_bin_ladder(index: usize) -> f64 {
    debug_assert!(index < NUM_RBS_BINS);
    if index == 0 {
        -0.55
    } else {
        -0.35 + 0.105 * index as f64
    }
}

/// Log-odds of one dicodon under a positional-GC model of coding
/// sequence versus uniform background at the same GC.
fn dicodon_log_odds(index: usize, gc: f64) -> f64 {
    // Codon position GC propensities in coding sequence: position 1
    // tracks the genome mildly, position 2 is AT-shifted, position 3
    // absorbs most compositional pressure.
    let position_gc = [
        0.5 * gc + 0.28,
        0.9 * gc * 0.5 + 0.2,
        1.6 * gc * 0.5 + 0.05,
    ];

    let mut coding = 1.0;
    let mut background = 1.0;
    for base_index in 0..6 {
        let code = (index >> (2 * base_index)) & 0b11;
        // kmer bit layout: 0 = A, 1 = G, 2 = C, 3 = T
        let is_gc = code == 1 || code == 2;
        let position = base_index % 3;
        coding *= if is_gc {
            position_gc[position] / 2.0
        } else {
            (1.0 - position_gc[position]) / 2.0
        };
        background *= if is_gc { gc / 2.0 } else { (1.0 - gc) / 2.0 };
    }

    (coding / background).ln().clamp(-2.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_bank() -> TrainingBank {
        let descriptors = [
            bin(0, "low_gc", Domain::Bacteria, 35.0, 11),
            bin(1, "mid_gc", Domain::Bacteria, 50.0, 11),
            bin(2, "high_gc", Domain::Bacteria, 65.0, 11),
        ];
        TrainingBank::from_models(
            descriptors
                .iter()
                .map(|&descriptor| BankEntry {
                    model: generic_model(&descriptor),
                    descriptor,
                })
                .collect(),
        )
    }

    #[test]
    fn test_built_in_bank_has_fifty_entries() {
        let bank = TrainingBank::built_in();
        assert_eq!(bank.entries().len(), 50);
        // Mycoplasma bins carry translation table 4
        assert!(
            bank.entries()
                .iter()
                .filter(|e| e.descriptor.label.starts_with("Mycoplasma"))
                .all(|e| e.descriptor.translation_table == 4)
        );
    }

    #[test]
    fn test_nearest_exact_match() {
        let bank = synthetic_bank();
        let chosen = bank.nearest(0.50).unwrap();
        assert_eq!(chosen.descriptor.label, "mid_gc");
    }

    #[test]
    fn test_nearest_halfway_prefers_lower_gc() {
        let bank = synthetic_bank();
        // 42.5% sits exactly between the 35% and 50% bins
        let chosen = bank.nearest(0.425).unwrap();
        assert_eq!(chosen.descriptor.label, "low_gc");
    }

    #[test]
    fn test_nearest_extremes_clamp_to_ends() {
        let bank = synthetic_bank();
        assert_eq!(bank.nearest(0.05).unwrap().descriptor.label, "low_gc");
        assert_eq!(bank.nearest(0.95).unwrap().descriptor.label, "high_gc");
    }

    #[test]
    fn test_candidates_include_neighbors_in_window() {
        let descriptors = [
            bin(0, "a", Domain::Bacteria, 48.0, 11),
            bin(1, "b", Domain::Bacteria, 50.0, 11),
            bin(2, "c", Domain::Bacteria, 52.0, 11),
            bin(3, "d", Domain::Bacteria, 60.0, 11),
        ];
        let bank = TrainingBank::from_models(
            descriptors
                .iter()
                .map(|&descriptor| BankEntry {
                    model: generic_model(&descriptor),
                    descriptor,
                })
                .collect(),
        );
        let picked = bank.candidates(0.50);
        let labels: Vec<&str> = picked.iter().map(|e| e.descriptor.label).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_shared_bank_is_singleton() {
        let first = TrainingBank::shared();
        let second = TrainingBank::shared();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_generic_model_tables() {
        let descriptor = bin(0, "test", Domain::Bacteria, 50.0, 11);
        let model = generic_model(&descriptor);
        assert!(model.uses_sd_motifs);
        assert!(model.rbs_weights[27] > model.rbs_weights[1]);
        assert!(model.rbs_weights[0] < 0.0);
        assert!(model.start_type_weights[0] > model.start_type_weights[2]);
        assert!(model.dicodon_scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_dicodon_log_odds_bounded() {
        for gc in [0.3, 0.5, 0.7] {
            for index in [0, 1, 100, 4095] {
                let value = dicodon_log_odds(index, gc);
                assert!((-2.0..=2.0).contains(&value));
            }
        }
    }
}
