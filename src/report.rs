//! Presentation helpers.
//!
//! Turns an `InferenceResult` into what a front end shows or offers for
//! download. Only a successful run produces a download.

use std::path::{Path, PathBuf};

use crate::error::summarize_failure;
use crate::types::InferenceResult;

/// Fixed file name of the downloadable explanation
pub const DOWNLOAD_FILE_NAME: &str = "medical_image_explanation.txt";
pub const DOWNLOAD_MIME_TYPE: &str = "text/plain";

/// Downloadable plain-text artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplanationDownload {
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub body: String,
}

impl ExplanationDownload {
    /// `None` for failures; a failed run has nothing to download.
    pub fn from_result(result: &InferenceResult) -> Option<Self> {
        result.explanation().map(|text| Self {
            file_name: DOWNLOAD_FILE_NAME,
            mime_type: DOWNLOAD_MIME_TYPE,
            body: text.to_string(),
        })
    }

    /// Write into `dir` under the fixed file name, replacing an existing file.
    pub async fn write_to_dir(&self, dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let path = dir.as_ref().join(self.file_name);
        tokio::fs::write(&path, self.body.as_bytes()).await?;
        tracing::debug!(path = %path.display(), bytes = self.body.len(), "explanation written");
        Ok(path)
    }
}

/// User-facing failure text with one hint per line, or `None` on success.
pub fn render_failure(result: &InferenceResult) -> Option<String> {
    let InferenceResult::Failure { kind, detail } = result else {
        return None;
    };
    let summary = summarize_failure(*kind, detail);
    let mut out = summary.render();
    for hint in &summary.suggestions {
        out.push_str("\n  hint: ");
        out.push_str(hint);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn download_only_for_success() {
        let ok = InferenceResult::success("No abnormality seen.");
        let download = ExplanationDownload::from_result(&ok).unwrap();
        assert_eq!(download.file_name, "medical_image_explanation.txt");
        assert_eq!(download.mime_type, "text/plain");
        assert_eq!(download.body, "No abnormality seen.");

        let failed = InferenceResult::Failure {
            kind: ErrorKind::TransportError,
            detail: "timed out".into(),
        };
        assert!(ExplanationDownload::from_result(&failed).is_none());
    }

    #[test]
    fn failure_rendering_names_the_stage() {
        let upload = InferenceResult::Failure {
            kind: ErrorKind::UploadError,
            detail: "HTTP 400".into(),
        };
        let text = render_failure(&upload).unwrap();
        assert!(text.starts_with("Upload failed: HTTP 400"));
        assert!(text.contains("hint: "));

        let config = InferenceResult::Failure {
            kind: ErrorKind::ConfigError,
            detail: "OPENROUTER_API_KEY is not set".into(),
        };
        assert!(render_failure(&config).unwrap().starts_with("Misconfiguration"));
        assert!(render_failure(&InferenceResult::success("ok")).is_none());
    }

    #[tokio::test]
    async fn writes_fixed_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let download = ExplanationDownload::from_result(&InferenceResult::success("text")).unwrap();
        let path = download.write_to_dir(dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join(DOWNLOAD_FILE_NAME));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "text");
    }
}
