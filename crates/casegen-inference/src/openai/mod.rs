//! OpenAI-compatible vision backend.
//!
//! Works with any endpoint implementing multimodal chat completions
//! (`image_url` content parts), including OpenAI, Azure OpenAI and
//! OpenRouter.
//!
//! # Example
//!
//! ```rust,no_run
//! use casegen_inference::openai::{OpenAIVisionBackend, OpenAIVisionConfig};
//! use casegen_inference::{GenerationBackend, GenerationRequest, ImageInput};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIVisionBackend::new(OpenAIVisionConfig {
//!         api_key: Some("sk-...".to_string()),
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//!     let request = GenerationRequest::new("Describe this screen")
//!         .with_images(vec![ImageInput::jpeg(std::fs::read("frame.jpg").unwrap())]);
//!     let text = backend.generate(&request).await.unwrap();
//!     println!("{}", text);
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIVisionBackend, OpenAIVisionConfig};
pub use error::{to_casegen_error, OpenAIErrorCode};
pub use types::*;
