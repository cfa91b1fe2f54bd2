//! wgpu backing for the cache's upload and presentation boundaries.

pub mod headless;
pub mod tile_uniforms;
pub mod uploader;

pub use headless::HeadlessGpu;
pub use tile_uniforms::{TileLayerBuffers, TileLayerUniform};
pub use uploader::TextureArrayUploader;
