//! Visual text extraction (OCR adapter).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use casegen_core::Frame;

use crate::command::{run_cmd_with_timeout, tool_command, ToolProbe};

/// Recognizes text in a single image.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &str;

    async fn available(&self) -> bool;

    /// Cleaned text in the image, or an empty string. Never fails.
    async fn recognize(&self, image: &Path) -> String;
}

/// Trim and collapse all runs of whitespace to single spaces.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run recognition on every frame concurrently, filling `Frame::text`.
///
/// Output order matches input order.
pub async fn recognize_frames(recognizer: Arc<dyn TextRecognizer>, frames: &[Frame]) -> Vec<Frame> {
    let futures = frames.iter().map(|frame| {
        let recognizer = recognizer.clone();
        async move {
            let text = recognizer.recognize(&frame.path).await;
            Frame {
                text: Some(text),
                ..frame.clone()
            }
        }
    });
    join_all(futures).await
}

/// `tesseract <img> stdout -l <lang>`.
pub struct TesseractOcr {
    probe: ToolProbe,
    lang: String,
    timeout_secs: u64,
}

impl TesseractOcr {
    pub fn new(bin: &str, lang: &str, timeout_secs: u64) -> Self {
        Self {
            probe: ToolProbe::new(bin, &["--version"]),
            lang: lang.to_string(),
            timeout_secs,
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn available(&self) -> bool {
        self.probe.is_available().await
    }

    async fn recognize(&self, image: &Path) -> String {
        if !self.probe.is_available().await {
            return String::new();
        }

        let mut cmd = tool_command(self.probe.bin());
        cmd.arg(image).arg("stdout").arg("-l").arg(&self.lang);

        match run_cmd_with_timeout(&mut cmd, "tesseract", self.timeout_secs).await {
            Ok(raw) => {
                let text = normalize_text(&raw);
                debug!(tool = "tesseract", chars = text.len(), "Recognized frame text");
                text
            }
            Err(e) => {
                warn!(tool = "tesseract", error = %e, image = %image.display(), "OCR failed");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Login \n\n Username\tPassword  "), "Login Username Password");
        assert_eq!(normalize_text("\n \t"), "");
        assert_eq!(normalize_text("Café  ok"), "Café ok");
    }

    struct EchoRecognizer;

    #[async_trait]
    impl TextRecognizer for EchoRecognizer {
        fn name(&self) -> &str {
            "echo"
        }
        async fn available(&self) -> bool {
            true
        }
        async fn recognize(&self, image: &Path) -> String {
            image.file_stem().unwrap().to_string_lossy().into_owned()
        }
    }

    #[tokio::test]
    async fn test_recognize_frames_preserves_order() {
        let frames: Vec<Frame> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, name)| Frame {
                timestamp_secs: i as f64,
                path: PathBuf::from(format!("/tmp/{}.jpg", name)),
                text: None,
            })
            .collect();

        let out = recognize_frames(Arc::new(EchoRecognizer), &frames).await;
        let texts: Vec<_> = out.iter().map(|f| f.text.clone().unwrap()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(out[2].timestamp_secs, 2.0);
    }

    #[tokio::test]
    async fn test_missing_tesseract_returns_empty() {
        let ocr = TesseractOcr::new("/nonexistent/tesseract", "eng", 5);
        assert!(!ocr.available().await);
        assert_eq!(ocr.recognize(Path::new("/tmp/frame.jpg")).await, "");
    }
}
