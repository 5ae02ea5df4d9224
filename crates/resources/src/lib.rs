//! Asset loading for the instanced renderer.
//!
//! This crate handles the CPU side of assets:
//! - The asset manifest (mesh and texture sources in slot order)
//! - OBJ mesh loading and the built-in cube
//! - Texture decoding
//! - Concatenation of all meshes into shared vertex/index arrays

mod assets;
mod error;
pub mod geometry;
pub mod manifest;
pub mod mesh;
pub mod obj;
pub mod texture;

pub use assets::LoadedAssets;
pub use error::{ResourceError, ResourceResult};
pub use geometry::{MeshRange, SceneGeometry};
pub use manifest::{AssetManifest, MeshSource};
pub use mesh::{MeshData, MeshVertex};
pub use texture::TextureData;
