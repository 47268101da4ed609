//! Mesh data and mesh views.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::RwLock;

use crate::error::GraphicsError;
use crate::types::Color;

use super::PhongMaterial;

/// Maximum number of lights a mesh view can hold.
pub const MAX_LIGHTS: usize = 3;

/// Interleaved mesh vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Texture coordinate.
    pub tex_coord: [f32; 2],
    /// Tangent frame encoded as a quaternion.
    pub normal: [f32; 4],
}

#[derive(Debug, Default)]
struct MeshData {
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
}

/// Triangle mesh geometry.
#[derive(Debug, Default)]
pub struct Mesh {
    data: RwLock<MeshData>,
}

impl Mesh {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replace the geometry.
    ///
    /// Indices must reference existing vertices and form whole triangles.
    pub fn build_geometry(
        &self,
        vertices: Vec<MeshVertex>,
        indices: Vec<u32>,
    ) -> Result<(), GraphicsError> {
        if indices.len() % 3 != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(GraphicsError::InvalidParameter(format!(
                "index {} out of range for {} vertices",
                bad,
                vertices.len()
            )));
        }
        *self.data.write() = MeshData { vertices, indices };
        Ok(())
    }

    /// Calculate vertex count.
    pub fn vertex_count(&self) -> usize {
        self.data.read().vertices.len()
    }

    /// Calculate triangle count.
    pub fn triangle_count(&self) -> usize {
        self.data.read().indices.len() / 3
    }

    /// Copy of the vertex data as bytes.
    pub fn vertex_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.data.read().vertices).to_vec()
    }

    /// Copy of the index data as bytes.
    pub fn index_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.data.read().indices).to_vec()
    }
}

/// Face culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    /// Draw both faces.
    None,
    /// Skip back faces.
    #[default]
    Back,
    /// Skip front faces.
    Front,
}

/// Point or spot light parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// World-space position.
    pub position: [f32; 3],
    /// Light color; alpha scales intensity.
    pub color: Color,
    /// Constant, linear and quadratic attenuation.
    pub attenuation: [f32; 3],
    /// Maximum range.
    pub range: f32,
    /// Spot direction.
    pub direction: [f32; 3],
    /// Inner and outer spot angles in degrees.
    pub cone: [f32; 2],
    /// Spot falloff exponent.
    pub falloff: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            color: Color::WHITE,
            attenuation: [1.0, 0.0, 0.0],
            range: f32::INFINITY,
            direction: [0.0, 0.0, 1.0],
            cone: [0.0, 180.0],
            falloff: 0.0,
        }
    }
}

#[derive(Debug)]
struct MeshViewState {
    material: Option<Arc<PhongMaterial>>,
    cull_mode: CullMode,
    wireframe: bool,
    ambient: [f32; 3],
    lights: [Option<Light>; MAX_LIGHTS],
}

/// A mesh placed in a 3D scene with material and lighting.
pub struct MeshView {
    mesh: Arc<Mesh>,
    state: RwLock<MeshViewState>,
}

impl MeshView {
    pub(crate) fn new(mesh: Arc<Mesh>) -> Self {
        Self {
            mesh,
            state: RwLock::new(MeshViewState {
                material: None,
                cull_mode: CullMode::default(),
                wireframe: false,
                ambient: [0.0; 3],
                lights: [None; MAX_LIGHTS],
            }),
        }
    }

    /// The viewed mesh.
    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    /// Set the material.
    pub fn set_material(&self, material: Option<Arc<PhongMaterial>>) {
        self.state.write().material = material;
    }

    /// The material.
    pub fn material(&self) -> Option<Arc<PhongMaterial>> {
        self.state.read().material.clone()
    }

    /// Set face culling.
    pub fn set_cull_mode(&self, mode: CullMode) {
        self.state.write().cull_mode = mode;
    }

    /// Face culling.
    pub fn cull_mode(&self) -> CullMode {
        self.state.read().cull_mode
    }

    /// Toggle wireframe rendering.
    pub fn set_wireframe(&self, wireframe: bool) {
        self.state.write().wireframe = wireframe;
    }

    /// Whether wireframe rendering is on.
    pub fn is_wireframe(&self) -> bool {
        self.state.read().wireframe
    }

    /// Set the ambient light color.
    pub fn set_ambient_light(&self, r: f32, g: f32, b: f32) {
        self.state.write().ambient = [r, g, b];
    }

    /// Set or clear a light slot.
    pub fn set_light(&self, index: usize, light: Option<Light>) -> Result<(), GraphicsError> {
        let mut state = self.state.write();
        let slot = state.lights.get_mut(index).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("light index {index} >= {MAX_LIGHTS}"))
        })?;
        *slot = light;
        Ok(())
    }

    /// Number of active lights.
    pub fn light_count(&self) -> usize {
        self.state.read().lights.iter().flatten().count()
    }
}

impl std::fmt::Debug for MeshView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshView")
            .field("vertex_count", &self.mesh.vertex_count())
            .field("state", &*self.state.read())
            .finish()
    }
}

static_assertions::assert_impl_all!(Mesh: Send, Sync);
static_assertions::assert_impl_all!(MeshView: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Vec<MeshVertex> {
        let v = |x: f32, y: f32| MeshVertex {
            position: [x, y, 0.0],
            tex_coord: [x, y],
            normal: [0.0, 0.0, 0.0, 1.0],
        };
        vec![v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)]
    }

    #[test]
    fn test_build_geometry() {
        let mesh = Mesh::new();
        mesh.build_geometry(triangle(), vec![0, 1, 2]).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertex_bytes().len(), 3 * 36);
        assert_eq!(mesh.index_bytes().len(), 12);

        assert!(mesh.build_geometry(triangle(), vec![0, 1]).is_err());
        assert!(mesh.build_geometry(triangle(), vec![0, 1, 3]).is_err());
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn test_mesh_view_lights() {
        let view = MeshView::new(Arc::new(Mesh::new()));
        view.set_light(0, Some(Light::default())).unwrap();
        view.set_light(2, Some(Light::default())).unwrap();
        assert_eq!(view.light_count(), 2);
        assert!(view.set_light(MAX_LIGHTS, Some(Light::default())).is_err());

        view.set_light(0, None).unwrap();
        assert_eq!(view.light_count(), 1);
        assert_eq!(view.cull_mode(), CullMode::Back);
    }
}
