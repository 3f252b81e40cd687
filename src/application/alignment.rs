//! Sample alignment across the sources of an experiment.

use crate::domain::error::DomainError;
use crate::port::outbound::source::SourceStream;
use crate::error::Result;

/// Sample identifiers present as a column in every source, sorted ascending.
///
/// Intersects left to right over two or three sources. An empty result means
/// the experiment has nothing to correlate. With `assume_unique` the
/// per-source de-duplication pass is skipped; all production sources have
/// unique column identifiers.
///
/// # Errors
/// Returns [`DomainError::SourceCount`] for fewer than two or more than three
/// sources, or any error raised while reading a source's samples.
pub fn common_samples(sources: &[&dyn SourceStream], assume_unique: bool) -> Result<Vec<String>> {
    if !(2..=3).contains(&sources.len()) {
        return Err(DomainError::SourceCount {
            count: sources.len(),
        }
        .into());
    }

    let mut common: Option<Vec<String>> = None;
    for source in sources {
        let samples = prepare(source.samples()?, assume_unique);
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        common = Some(match common {
            None => samples,
            Some(acc) => intersect_sorted(&acc, &samples),
        });
    }

    Ok(common.unwrap_or_default())
}

fn prepare(mut samples: Vec<String>, assume_unique: bool) -> Vec<String> {
    samples.sort_unstable();
    if !assume_unique {
        samples.dedup();
    }
    samples
}

/// Two-pointer intersection of ascending slices.
fn intersect_sorted(left: &[String], right: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(left.len().min(right.len()));
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(left[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    out
}
