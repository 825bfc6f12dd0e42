//! Reconcile discovered architectures with the operator's required set.

use mantle_core::error::{MantleError, Result};

use super::digest::DigestRecord;
use super::platform::normalize_architecture;

/// Apply the required-architecture policy to `records`.
///
/// - No requirement: every record passes.
/// - All required present: every record passes (the set is a minimum).
/// - Some missing: an error, or with `best_effort` only the required
///   architectures that were found.
///
/// An empty result is always an error.
pub fn filter_architectures(
    records: Vec<DigestRecord>,
    required: &[String],
    best_effort: bool,
) -> Result<Vec<DigestRecord>> {
    let required: Vec<String> = required
        .iter()
        .map(|a| normalize_architecture(a))
        .filter(|a| !a.is_empty())
        .collect();

    if required.is_empty() {
        return non_empty(records);
    }

    let missing: Vec<String> = required
        .iter()
        .filter(|arch| !records.iter().any(|r| &r.architecture == *arch))
        .cloned()
        .collect();

    if missing.is_empty() {
        return non_empty(records);
    }

    if !best_effort {
        return Err(MantleError::FilterError { missing });
    }

    tracing::warn!(
        missing = %missing.join(", "),
        "Missing required architectures, continuing in best-effort mode"
    );

    let kept: Vec<DigestRecord> = records
        .into_iter()
        .filter(|r| required.contains(&r.architecture))
        .collect();

    non_empty(kept)
}

fn non_empty(records: Vec<DigestRecord>) -> Result<Vec<DigestRecord>> {
    if records.is_empty() {
        Err(MantleError::NoArchitectures)
    } else {
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn record(arch: &str) -> DigestRecord {
        DigestRecord {
            image_name: "app".to_string(),
            architecture: arch.to_string(),
            digest: format!("sha256:{}", "a".repeat(64)),
            source_path: PathBuf::from("x"),
            modified_at: Utc::now(),
        }
    }

    fn archs(records: &[DigestRecord]) -> Vec<&str> {
        records.iter().map(|r| r.architecture.as_str()).collect()
    }

    fn req(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_requirement_passes_everything() {
        let out = filter_architectures(vec![record("amd64"), record("arm64")], &[], false).unwrap();
        assert_eq!(archs(&out), vec!["amd64", "arm64"]);
    }

    #[test]
    fn test_required_is_a_minimum() {
        let out = filter_architectures(
            vec![record("amd64"), record("arm64"), record("arm/v7")],
            &req(&["amd64"]),
            false,
        )
        .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_missing_without_best_effort_fails() {
        let err =
            filter_architectures(vec![record("amd64")], &req(&["amd64", "arm64"]), false).unwrap_err();
        match err {
            MantleError::FilterError { missing } => assert_eq!(missing, vec!["arm64"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_best_effort_keeps_required_subset() {
        let out = filter_architectures(
            vec![record("amd64"), record("ppc64le")],
            &req(&["amd64", "arm64"]),
            true,
        )
        .unwrap();
        assert_eq!(archs(&out), vec!["amd64"]);
    }

    #[test]
    fn test_best_effort_with_nothing_left_fails() {
        let err =
            filter_architectures(vec![record("ppc64le")], &req(&["arm64"]), true).unwrap_err();
        assert!(matches!(err, MantleError::NoArchitectures));
    }

    #[test]
    fn test_empty_input_fails() {
        let err = filter_architectures(vec![], &[], true).unwrap_err();
        assert!(matches!(err, MantleError::NoArchitectures));
    }

    #[test]
    fn test_required_is_normalized() {
        let out =
            filter_architectures(vec![record("arm/v7")], &req(&["arm-v7"]), false).unwrap();
        assert_eq!(archs(&out), vec!["arm/v7"]);
    }
}
