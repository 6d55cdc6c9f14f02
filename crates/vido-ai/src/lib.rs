//! Generation-provider clients for Vido.
//!
//! - [`image`]: prompt-to-image generation (thumbnails)
//! - [`summarize`]: LLM summarization (titles, descriptions)
//! - [`seed`]: injectable randomness for generation parameters

pub mod error;
pub mod image;
pub mod seed;
pub mod summarize;

pub use error::{AiError, AiResult};
pub use image::{ImageGenClient, ImageGenConfig, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
pub use seed::{FixedSeeder, RandomSeeder, Seeder};
pub use summarize::{SummarizerClient, SummarizerConfig};
