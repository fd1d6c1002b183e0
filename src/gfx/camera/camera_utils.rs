use cgmath::{Matrix4, SquareMatrix};

use super::viewport::Viewport;

pub trait Camera: Sized {
    fn build_view_projection_matrix(&self) -> Matrix4<f32>;
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Debug)]
pub struct CameraUniform {
    /// The eye position of the camera in homogenous coordinates.
    ///
    /// Homogenous coordinates are used to fullfill the 16 byte alignment requirement.
    pub view_position: [f32; 4],

    /// Camera viewing direction, w unused.
    pub view_direction: [f32; 4],

    /// Contains the view projection matrix.
    pub view_proj: [[f32; 4]; 4],
}

impl Default for CameraUniform {
    /// Creates a default [CameraUniform].
    fn default() -> Self {
        Self {
            view_position: [0.0; 4],
            view_direction: [0.0, 0.0, -1.0, 0.0],
            view_proj: convert_matrix4_to_array(Matrix4::<f64>::identity()),
        }
    }
}

impl CameraUniform {
    /// Snapshot of a viewport in GPU layout
    pub fn from_viewport(viewport: &Viewport) -> Self {
        let eye = viewport.camera_location();
        let dir = viewport.camera_direction();
        Self {
            view_position: [eye.x as f32, eye.y as f32, eye.z as f32, 1.0],
            view_direction: [dir.x as f32, dir.y as f32, dir.z as f32, 0.0],
            view_proj: viewport.build_view_projection_matrix().into(),
        }
    }
}

/// Converts a double precision matrix to the single precision layout shaders expect
pub fn convert_matrix4_to_array(matrix4: Matrix4<f64>) -> [[f32; 4]; 4] {
    let mut result = [[0.0; 4]; 4];

    for i in 0..4 {
        for j in 0..4 {
            result[i][j] = matrix4[i][j] as f32;
        }
    }

    result
}
