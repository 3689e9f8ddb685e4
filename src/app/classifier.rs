// oppsift - app/classifier.rs
//
// The external classifier seam. The pipeline hands over a serialised
// request and receives raw response text; what sits behind the trait
// (a model API, a recorded response, nothing at all) is not its concern.

use crate::util::constants;
use crate::util::error::ClassifierError;
use std::path::{Path, PathBuf};

/// An opaque, synchronous, fallible collaborator that turns a request
/// payload into a raw plan response.
pub trait Classifier {
    /// Short name for logs and summaries.
    fn name(&self) -> &str;

    /// Return the raw response text for `request_json`.
    fn classify(&self, request_json: &str) -> Result<String, ClassifierError>;
}

/// Replays a response recorded on disk, ignoring the request.
#[derive(Debug, Clone)]
pub struct PlanFileClassifier {
    path: PathBuf,
}

impl PlanFileClassifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Classifier for PlanFileClassifier {
    fn name(&self) -> &str {
        "plan-file"
    }

    fn classify(&self, _request_json: &str) -> Result<String, ClassifierError> {
        let io_err = |source| ClassifierError::Io {
            path: self.path.clone(),
            source,
        };

        let size = std::fs::metadata(&self.path).map_err(io_err)?.len();
        if size > constants::MAX_PLAN_FILE_SIZE {
            return Err(ClassifierError::ResponseTooLarge {
                path: self.path.clone(),
                size,
                max_size: constants::MAX_PLAN_FILE_SIZE,
            });
        }

        let bytes = std::fs::read(&self.path).map_err(io_err)?;
        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Read recorded plan");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Always answers with the same text.
#[derive(Debug, Clone)]
pub struct FixedResponseClassifier {
    response: String,
}

impl FixedResponseClassifier {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl Classifier for FixedResponseClassifier {
    fn name(&self) -> &str {
        "fixed-response"
    }

    fn classify(&self, _request_json: &str) -> Result<String, ClassifierError> {
        Ok(self.response.clone())
    }
}

/// Stands in when no classifier is configured; every call fails.
#[derive(Debug, Clone)]
pub struct UnavailableClassifier {
    reason: String,
}

impl UnavailableClassifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableClassifier {
    fn default() -> Self {
        Self::new("no classifier configured")
    }
}

impl Classifier for UnavailableClassifier {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn classify(&self, _request_json: &str) -> Result<String, ClassifierError> {
        Err(ClassifierError::Unavailable {
            reason: self.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_plan_file_reads_response() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"plan_explanation": "recorded"}"#).unwrap();
        let c = PlanFileClassifier::new(file.path());
        assert_eq!(c.classify("{}").unwrap(), r#"{"plan_explanation": "recorded"}"#);
    }

    #[test]
    fn test_plan_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let c = PlanFileClassifier::new(dir.path().join("missing.json"));
        assert!(matches!(c.classify("{}"), Err(ClassifierError::Io { .. })));
    }

    #[test]
    fn test_plan_file_too_large() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let chunk = vec![b' '; 64 * 1024];
        for _ in 0..=(constants::MAX_PLAN_FILE_SIZE / chunk.len() as u64) {
            file.write_all(&chunk).unwrap();
        }
        let c = PlanFileClassifier::new(file.path());
        assert!(matches!(
            c.classify("{}"),
            Err(ClassifierError::ResponseTooLarge { .. })
        ));
    }

    #[test]
    fn test_unavailable_always_fails() {
        let c = UnavailableClassifier::default();
        match c.classify("{}") {
            Err(ClassifierError::Unavailable { reason }) => {
                assert_eq!(reason, "no classifier configured")
            }
            other => panic!("Expected Unavailable, got: {other:?}"),
        }
    }
}
