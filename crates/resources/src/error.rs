//! Error types for asset loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for asset loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// An OBJ file could not be opened or parsed.
    #[error("Object file {} not found or wrong format: {message}", .path.display())]
    MeshLoad {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Loader message.
        message: String,
    },

    /// An OBJ file parsed but holds no triangles.
    #[error("Object file {} contains no geometry", .0.display())]
    EmptyMesh(PathBuf),

    /// A texture could not be decoded.
    #[error("Failed to load texture {}: {source}", .path.display())]
    Texture {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The manifest names more meshes than there are mesh slots.
    #[error("Manifest lists {count} meshes but only {limit} mesh slots exist")]
    TooManyMeshes { count: usize, limit: usize },

    /// Concatenated geometry no longer fits 32-bit offsets.
    #[error("Geometry too large: {0}")]
    GeometryOverflow(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for asset operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

impl From<ResourceError> for instancing_core::Error {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Io(io) => instancing_core::Error::Io(io),
            other => instancing_core::Error::Resource(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_load_message_names_path() {
        let err = ResourceError::MeshLoad {
            path: PathBuf::from("Assets/mesh1.obj"),
            message: "open failed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Object file Assets/mesh1.obj not found or wrong format: open failed"
        );
    }

    #[test]
    fn test_converts_to_core_error() {
        let err: instancing_core::Error = ResourceError::TooManyMeshes {
            count: 11,
            limit: 10,
        }
        .into();
        assert!(matches!(err, instancing_core::Error::Resource(_)));
    }
}
