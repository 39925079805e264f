//! GIF decorations.

mod giphy;

pub use giphy::{GiphyClient, NoGifs};

use async_trait::async_trait;

use crate::Result;

/// Looks up a single media URL for a search term.
#[async_trait]
pub trait GifProvider: Send + Sync {
    async fn random_gif(&self, term: &str) -> Result<String>;
}
