//! Loading a whole manifest.

use tracing::info;

use crate::error::ResourceResult;
use crate::geometry::SceneGeometry;
use crate::manifest::{AssetManifest, MeshSource};
use crate::mesh::MeshData;
use crate::obj::load_obj;
use crate::texture::TextureData;

/// CPU copies of every asset the renderer uploads.
///
/// Kept alive for the lifetime of the renderer so GPU resources can be
/// rebuilt after a device loss without touching the filesystem again.
#[derive(Clone, Debug)]
pub struct LoadedAssets {
    pub geometry: SceneGeometry,
    /// At least one texture; a checker stands in when none are listed.
    pub textures: Vec<TextureData>,
}

impl LoadedAssets {
    /// Loads every mesh and texture in `manifest`. The first failure aborts.
    pub fn load(manifest: &AssetManifest) -> ResourceResult<Self> {
        manifest.validate()?;

        let meshes = manifest
            .meshes()
            .iter()
            .map(|source| match source {
                MeshSource::Obj(path) => load_obj(path),
                MeshSource::Cube => Ok(MeshData::cube()),
            })
            .collect::<ResourceResult<Vec<_>>>()?;
        let geometry = SceneGeometry::concatenate(&meshes)?;

        let mut textures = manifest
            .textures()
            .iter()
            .map(|path| TextureData::load(path))
            .collect::<ResourceResult<Vec<_>>>()?;
        if textures.is_empty() {
            textures.push(TextureData::checker());
        }

        info!(
            "Loaded {} meshes ({} vertices, {} indices) and {} textures",
            geometry.mesh_count(),
            geometry.vertices.len(),
            geometry.indices.len(),
            textures.len()
        );

        Ok(Self { geometry, textures })
    }

    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.geometry.mesh_count()
    }
}
