//! Constraint validator: a pure check of the selected file against the
//! configured size limit.
//!
//! The UI reset that must accompany a rejection lives in
//! [`crate::state::AppState::reject`]; this module only decides.

use crate::error::FoliatorError;
use crate::form::SelectedFile;

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Result of checking a selection against the constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Ok,
    Rejected {
        /// Human-readable comparison of the limit and the file's size.
        reason: String,
        observed_size_mb: f64,
    },
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        matches!(self, Validation::Ok)
    }

    pub fn into_result(self) -> Result<(), FoliatorError> {
        match self {
            Validation::Ok => Ok(()),
            Validation::Rejected {
                reason,
                observed_size_mb,
            } => Err(FoliatorError::Rejected {
                reason,
                observed_size_mb,
            }),
        }
    }
}

/// Check `file` against `max_bytes`.
///
/// No selection is valid: there is nothing to check yet.
pub fn validate(file: Option<&SelectedFile>, max_bytes: u64) -> Validation {
    let Some(file) = file else {
        return Validation::Ok;
    };
    if file.size() <= max_bytes {
        return Validation::Ok;
    }

    let observed_size_mb = round2(file.size() as f64 / MIB);
    Validation::Rejected {
        reason: format!(
            "ERROR: the file exceeds the maximum size of {} GB. Your file is {:.2} MB.",
            max_bytes as f64 / GIB,
            observed_size_mb
        ),
        observed_size_mb,
    }
}

/// Whether the submit action should be enabled for this selection.
pub fn submit_allowed(file: Option<&SelectedFile>, max_bytes: u64) -> bool {
    file.is_some_and(|f| f.size() <= max_bytes)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_FILE_BYTES;
    use crate::form::{FileContent, PDF_MEDIA_TYPE};
    use std::path::PathBuf;

    fn sized(size: u64) -> SelectedFile {
        SelectedFile::declared(
            "big.pdf",
            size,
            PDF_MEDIA_TYPE,
            FileContent::Disk(PathBuf::from("/nonexistent/big.pdf")),
        )
    }

    #[test]
    fn no_file_is_valid() {
        assert_eq!(validate(None, MAX_FILE_BYTES), Validation::Ok);
        assert!(!submit_allowed(None, MAX_FILE_BYTES));
    }

    #[test]
    fn exactly_at_limit_is_valid() {
        let f = sized(MAX_FILE_BYTES);
        assert!(validate(Some(&f), MAX_FILE_BYTES).is_ok());
        assert!(submit_allowed(Some(&f), MAX_FILE_BYTES));
    }

    #[test]
    fn one_byte_over_is_rejected() {
        let f = sized(MAX_FILE_BYTES + 1);
        assert!(!validate(Some(&f), MAX_FILE_BYTES).is_ok());
        assert!(!submit_allowed(Some(&f), MAX_FILE_BYTES));
    }

    #[test]
    fn rejection_reports_sizes() {
        let f = sized(3 * 1024 * 1024 * 1024);
        match validate(Some(&f), MAX_FILE_BYTES) {
            Validation::Rejected {
                reason,
                observed_size_mb,
            } => {
                assert_eq!(observed_size_mb, 3072.0);
                assert!(reason.contains("2 GB"), "got: {reason}");
                assert!(reason.contains("3072.00 MB"), "got: {reason}");
            }
            Validation::Ok => panic!("3 GiB must be rejected"),
        }
    }

    #[test]
    fn into_result_maps_to_rejected_error() {
        let f = sized(MAX_FILE_BYTES * 2);
        let err = validate(Some(&f), MAX_FILE_BYTES).into_result().unwrap_err();
        assert!(matches!(err, FoliatorError::Rejected { .. }));
    }

    #[test]
    fn media_type_does_not_affect_size_check() {
        let f = SelectedFile::from_bytes("notes.txt", b"hello".to_vec());
        assert!(validate(Some(&f), MAX_FILE_BYTES).is_ok());
    }
}
