//! Asset manifest: which meshes and textures to load, in slot order.

use std::path::{Path, PathBuf};

use instancing_core::config::MAX_MESH_SLOTS;

use crate::error::{ResourceError, ResourceResult};

/// Where one mesh slot's geometry comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshSource {
    /// A Wavefront OBJ file.
    Obj(PathBuf),
    /// The built-in unit cube.
    Cube,
}

/// Ordered list of mesh and texture sources.
///
/// The position of a mesh in the manifest is its mesh slot. The manifest is a
/// plain value handed to initialization, so several renderers (or tests) can
/// use different asset sets side by side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetManifest {
    meshes: Vec<MeshSource>,
    textures: Vec<PathBuf>,
}

impl AssetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an OBJ mesh.
    pub fn with_mesh(mut self, path: impl Into<PathBuf>) -> Self {
        self.meshes.push(MeshSource::Obj(path.into()));
        self
    }

    /// Appends the built-in cube.
    pub fn with_cube(mut self) -> Self {
        self.meshes.push(MeshSource::Cube);
        self
    }

    /// Appends a texture.
    pub fn with_texture(mut self, path: impl Into<PathBuf>) -> Self {
        self.textures.push(path.into());
        self
    }

    /// Builds `dir/mesh1.obj ..= dir/mesh{mesh_count}.obj` and
    /// `dir/tex1.dds ..= dir/tex{texture_count}.dds`.
    pub fn numbered(dir: &Path, mesh_count: usize, texture_count: usize) -> Self {
        let meshes = (1..=mesh_count)
            .map(|i| MeshSource::Obj(dir.join(format!("mesh{i}.obj"))))
            .collect();
        let textures = (1..=texture_count)
            .map(|i| dir.join(format!("tex{i}.dds")))
            .collect();
        Self { meshes, textures }
    }

    /// Checks that every mesh maps to a mesh slot.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.meshes.len() > MAX_MESH_SLOTS {
            return Err(ResourceError::TooManyMeshes {
                count: self.meshes.len(),
                limit: MAX_MESH_SLOTS,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn meshes(&self) -> &[MeshSource] {
        &self.meshes
    }

    #[inline]
    pub fn textures(&self) -> &[PathBuf] {
        &self.textures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_paths() {
        let manifest = AssetManifest::numbered(Path::new("Assets"), 2, 1);
        assert_eq!(
            manifest.meshes(),
            &[
                MeshSource::Obj(PathBuf::from("Assets/mesh1.obj")),
                MeshSource::Obj(PathBuf::from("Assets/mesh2.obj")),
            ]
        );
        assert_eq!(manifest.textures(), &[PathBuf::from("Assets/tex1.dds")]);
    }

    #[test]
    fn test_builder_keeps_order() {
        let manifest = AssetManifest::new()
            .with_cube()
            .with_mesh("a.obj")
            .with_texture("t.png");
        assert_eq!(manifest.meshes()[0], MeshSource::Cube);
        assert_eq!(manifest.meshes()[1], MeshSource::Obj(PathBuf::from("a.obj")));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_too_many_meshes() {
        let manifest = (0..=MAX_MESH_SLOTS).fold(AssetManifest::new(), |m, _| m.with_cube());
        assert!(matches!(
            manifest.validate(),
            Err(ResourceError::TooManyMeshes { count: 11, limit: 10 })
        ));
    }
}
