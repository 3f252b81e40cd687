//! CpG-site to gene lookup for methylation arrays.

use std::collections::HashMap;

/// Symbol written for CpG sites the platform does not map to any gene.
pub const UNMAPPED_GENE: &str = "-";

/// Lookup from CpG-site identifier to gene symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpgPlatform {
    genes: HashMap<String, String>,
}

impl CpgPlatform {
    /// Build a platform from `(cpg_site_id, gene_symbols)` pairs.
    ///
    /// Symbol lists separated by `;` keep their first entry. Empty symbols are
    /// treated as unmapped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let genes = pairs
            .into_iter()
            .filter_map(|(site, symbols)| {
                let gene = symbols.as_ref().split(';').next()?.trim();
                (!gene.is_empty()).then(|| (site.into(), gene.to_string()))
            })
            .collect();
        Self { genes }
    }

    /// Gene symbol for `site`, or [`UNMAPPED_GENE`].
    #[must_use]
    pub fn gene_for(&self, site: &str) -> &str {
        self.genes.get(site).map_or(UNMAPPED_GENE, String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}
