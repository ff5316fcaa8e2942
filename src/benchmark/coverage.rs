//! Cross-configuration coverage.
//!
//! Answers "how many tasks would pass if each task could pick its best
//! configuration": the union of successful indices, compared against one
//! baseline configuration.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::report::Report;
use crate::error::ReportError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageAnalysis {
    pub baseline: String,
    pub baseline_count: usize,
    /// Successful indices per configuration that the baseline missed.
    pub new_per_configuration: BTreeMap<String, usize>,
    /// Size of the union over the baseline and the included configurations.
    pub theoretical_max: usize,
    /// `theoretical_max - baseline_count`.
    pub gain: usize,
}

/// Compare every configuration in `report` against `baseline`.
///
/// `include` restricts which configurations enter the union; `None` uses all
/// of them. Per-configuration "new" counts are always reported.
pub fn analyze(
    report: &Report,
    baseline: &str,
    include: Option<&[String]>,
) -> Result<CoverageAnalysis, ReportError> {
    let base = report
        .get(baseline)
        .ok_or_else(|| ReportError::UnknownConfiguration(baseline.to_string()))?;
    let base_set: BTreeSet<usize> = base.successful_indices.iter().copied().collect();

    if let Some(names) = include {
        if let Some(missing) = names.iter().find(|n| report.get(n).is_none()) {
            return Err(ReportError::UnknownConfiguration(missing.clone()));
        }
    }

    let mut union = base_set.clone();
    let mut new_per_configuration = BTreeMap::new();

    for (name, result) in &report.configurations {
        if name == baseline {
            continue;
        }
        let new = result
            .successful_indices
            .iter()
            .filter(|idx| !base_set.contains(idx))
            .collect::<BTreeSet<_>>()
            .len();
        new_per_configuration.insert(name.clone(), new);

        let included = include.is_none_or(|names| names.iter().any(|n| n == name));
        if included {
            union.extend(result.successful_indices.iter().copied());
        }
    }

    let theoretical_max = union.len();
    Ok(CoverageAnalysis {
        baseline: baseline.to_string(),
        baseline_count: base_set.len(),
        new_per_configuration,
        theoretical_max,
        gain: theoretical_max - base_set.len(),
    })
}
