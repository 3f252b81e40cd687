//! Tabular source adapters.
//!
//! - [`file::FileSource`] reads delimited files in chunks.
//! - [`memory::MemorySource`] serves tables already materialised by a store.
//! - [`catalog::FileSourceCatalog`] resolves experiment source references to files.

pub mod catalog;
pub mod file;
pub mod memory;

use std::collections::HashSet;

use crate::domain::error::DomainError;

/// Reject repeated sample identifiers.
pub(crate) fn ensure_unique_samples(source_name: &str, samples: &[String]) -> Result<(), DomainError> {
    let mut seen = HashSet::with_capacity(samples.len());
    for sample in samples {
        if !seen.insert(sample.as_str()) {
            return Err(DomainError::DuplicateSample {
                sample: sample.clone(),
                source_name: source_name.to_string(),
            });
        }
    }
    Ok(())
}

/// Column positions of the samples to keep, in source order.
pub(crate) fn matching_positions(samples: &[String], only_matching: Option<&[String]>) -> Vec<usize> {
    match only_matching {
        None => (0..samples.len()).collect(),
        Some(keep) => {
            let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
            samples
                .iter()
                .enumerate()
                .filter(|(_, s)| keep.contains(s.as_str()))
                .map(|(i, _)| i)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_samples_are_reported() {
        let samples = vec!["S1".to_string(), "S2".to_string(), "S1".to_string()];
        let err = ensure_unique_samples("mrna", &samples).unwrap_err();
        assert_eq!(
            err,
            DomainError::DuplicateSample {
                sample: "S1".into(),
                source_name: "mrna".into()
            }
        );
    }

    #[test]
    fn matching_positions_keep_source_order() {
        let samples = vec!["S1".to_string(), "S2".to_string(), "S3".to_string()];
        let keep = vec!["S3".to_string(), "S1".to_string(), "S9".to_string()];
        assert_eq!(matching_positions(&samples, Some(&keep)), vec![0, 2]);
        assert_eq!(matching_positions(&samples, None), vec![0, 1, 2]);
    }
}
