/// Configuration for a [`GeneFinder`](crate::engine::GeneFinder).
///
/// The defaults match the behavior the statistical models were calibrated
/// for: genetic code 11, Shine-Dalgarno detection enabled, no masking.
///
/// # Examples
///
/// ```rust
/// use genoscan::config::GeneFinderConfig;
///
/// let config = GeneFinderConfig {
///     mask_ambiguous_runs: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct GeneFinderConfig {
    /// Genetic code translation table (NCBI numbering).
    ///
    /// `None` selects table 11 (bacterial/archaeal). Table 4
    /// (Mycoplasma/Spiroplasma) reassigns TGA and changes the stop-codon
    /// rules used during enumeration and translation.
    pub translation_table: Option<u8>,

    /// Treat long runs of ambiguous bases (N) as masked gaps.
    ///
    /// When `true`, no gene may span a masked region. Useful for draft
    /// assemblies with scaffolding gaps.
    pub mask_ambiguous_runs: bool,

    /// Skip Shine-Dalgarno detection and always train the alternative
    /// upstream-motif model. Rarely needed outside organisms known to
    /// lack canonical ribosome binding sites.
    pub force_non_sd: bool,

    /// Rayon thread-pool size for the data-parallel stages.
    ///
    /// `None` uses the global default pool.
    pub num_threads: Option<usize>,
}

impl Default for GeneFinderConfig {
    fn default() -> Self {
        Self {
            translation_table: None,
            mask_ambiguous_runs: false,
            force_non_sd: false,
            num_threads: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeneFinderConfig::default();
        assert!(config.translation_table.is_none());
        assert!(!config.mask_ambiguous_runs);
        assert!(!config.force_non_sd);
        assert!(config.num_threads.is_none());
    }
}
