//! Picture handling for Lumagram: upload compression, data-URI helpers, the
//! chunk codec for payloads above the backend document ceiling, and generated
//! placeholders.

pub mod chunks;
pub mod compress;
pub mod data_uri;
pub mod placeholder;
pub mod upload;

pub use chunks::{assemble_chunks, split_into_chunks, ChunkAssemblyError, ChunkPayload};
pub use compress::{compress_to_data_uri, CompressError, CompressionProfile};
pub use upload::ImageUpload;
