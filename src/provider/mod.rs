pub mod gemini;
pub mod openai;
pub mod stub;
mod types;

pub use types::{BoxFuture, ChatChunk, ChatRequest, ChunkStream, Provider, SharedProvider};
