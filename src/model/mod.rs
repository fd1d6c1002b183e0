// src/model/mod.rs
//! Model collaborator interface
//!
//! The viewer never parses geometry itself. A [`Model`] owns whatever is
//! needed to produce triangle meshes, prepares them in the background and
//! reports progress; the viewer only asks whether it is ready and hands it
//! to a renderer.

pub mod bounding_box;
pub mod obj_model;

pub use bounding_box::BoundingBox;
pub use obj_model::ObjModel;

use thiserror::Error;

use crate::gfx::camera::NamedView;

/// Errors raised while opening or preparing a model
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to load model '{path}': {source}")]
    Load {
        path: String,
        #[source]
        source: tobj::LoadError,
    },
    #[error("model '{0}' contains no triangles")]
    NoGeometry(String),
    #[error("model preparation was cancelled")]
    Cancelled,
    #[error("model preparation worker stopped unexpectedly")]
    WorkerLost,
}

/// Where a mesh preparation run currently stands
#[derive(Debug, Clone, PartialEq)]
pub enum PreparationStatus {
    InProgress,
    Succeeded,
    Failed(String),
    Cancelled,
}

/// One mesh-preparation progress event
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPreparationProgress {
    /// Fraction of meshes prepared, in `[0, 1]`
    pub mesh_progress: f32,
    pub status: PreparationStatus,
}

impl MeshPreparationProgress {
    pub fn in_progress(mesh_progress: f32) -> Self {
        Self {
            mesh_progress: mesh_progress.clamp(0.0, 1.0),
            status: PreparationStatus::InProgress,
        }
    }

    pub fn succeeded() -> Self {
        Self {
            mesh_progress: 1.0,
            status: PreparationStatus::Succeeded,
        }
    }

    pub fn did_succeed(&self) -> bool {
        self.status == PreparationStatus::Succeeded
    }

    /// True for failures and cancellation
    pub fn did_fail(&self) -> bool {
        matches!(
            self.status,
            PreparationStatus::Failed(_) | PreparationStatus::Cancelled
        )
    }
}

/// Triangle mesh ready for upload
#[derive(Debug, Clone, Default)]
pub struct PreparedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub color: [f32; 3],
}

impl PreparedMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(
            self.positions
                .iter()
                .map(|p| cgmath::Point3::new(p[0] as f64, p[1] as f64, p[2] as f64)),
        )
    }
}

/// A displayable model whose meshes are prepared asynchronously
pub trait Model {
    /// Starts mesh preparation. Calling it again while preparing or after
    /// success does nothing.
    fn prepare(&mut self);

    /// Requests cancellation of a running preparation
    fn cancel_preparation(&mut self);

    fn is_ready_for_rendering(&self) -> bool;

    /// Drains progress events produced since the last call
    fn poll_progress(&mut self) -> Vec<MeshPreparationProgress>;

    /// Prepared meshes; empty until ready
    fn meshes(&self) -> &[PreparedMesh];

    /// Bounding box of the prepared meshes
    fn bounding_box(&self) -> BoundingBox;

    /// Views saved with the model, if the format carries any
    fn views(&self) -> &[NamedView] {
        &[]
    }

    /// Changes whenever the prepared mesh set changes, so renderers can
    /// tell when their uploaded buffers are stale
    fn generation(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(MeshPreparationProgress::in_progress(1.5).mesh_progress, 1.0);
        assert_eq!(MeshPreparationProgress::in_progress(-0.5).mesh_progress, 0.0);
    }

    #[test]
    fn test_cancellation_counts_as_failure() {
        let progress = MeshPreparationProgress {
            mesh_progress: 0.3,
            status: PreparationStatus::Cancelled,
        };
        assert!(progress.did_fail());
        assert!(!progress.did_succeed());
        assert!(MeshPreparationProgress::succeeded().did_succeed());
    }
}
