//! Phong material definitions.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::RwLock;

use crate::types::Color;

use super::Texture;

/// Texture slots a phong material can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapType {
    /// Base color.
    Diffuse,
    /// Specular color and power.
    Specular,
    /// Normal perturbation.
    Bump,
    /// Emissive color.
    SelfIllumination,
}

impl MapType {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            Self::Diffuse => 0,
            Self::Specular => 1,
            Self::Bump => 2,
            Self::SelfIllumination => 3,
        }
    }
}

#[derive(Debug, Clone)]
struct MaterialState {
    diffuse_color: Color,
    specular_color: Color,
    specular_power: f32,
    maps: [Option<Arc<Texture>>; MapType::COUNT],
}

/// Phong lighting material for 3D mesh views.
///
/// Materials are shared between mesh views, so all setters take `&self`.
pub struct PhongMaterial {
    state: RwLock<MaterialState>,
}

impl Default for PhongMaterial {
    fn default() -> Self {
        Self {
            state: RwLock::new(MaterialState {
                diffuse_color: Color::WHITE,
                specular_color: Color::WHITE,
                specular_power: 32.0,
                maps: Default::default(),
            }),
        }
    }
}

impl PhongMaterial {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Set the base color.
    pub fn set_diffuse_color(&self, color: Color) {
        self.state.write().diffuse_color = color;
    }

    /// Set the highlight color and exponent.
    pub fn set_specular(&self, color: Color, power: f32) {
        let mut state = self.state.write();
        state.specular_color = color;
        state.specular_power = power;
    }

    /// Bind or clear a texture map.
    pub fn set_map(&self, map: MapType, texture: Option<Arc<Texture>>) {
        self.state.write().maps[map.index()] = texture;
    }

    /// The texture bound to a slot.
    pub fn map(&self, map: MapType) -> Option<Arc<Texture>> {
        self.state.read().maps[map.index()].clone()
    }

    /// Base color.
    pub fn diffuse_color(&self) -> Color {
        self.state.read().diffuse_color
    }

    /// Returns true if any bound map has been disposed and must be rebound.
    pub fn has_stale_maps(&self) -> bool {
        self.state
            .read()
            .maps
            .iter()
            .flatten()
            .any(|texture| texture.is_disposed())
    }

    /// Create a uniform data struct for the GPU.
    pub fn uniform_data(&self) -> PhongUniformData {
        let state = self.state.read();
        let c = state.diffuse_color;
        let s = state.specular_color;
        PhongUniformData {
            diffuse_color: [c.r, c.g, c.b, c.a],
            specular: [s.r, s.g, s.b, state.specular_power],
            map_mask: [
                state.maps[0].is_some() as u32,
                state.maps[1].is_some() as u32,
                state.maps[2].is_some() as u32,
                state.maps[3].is_some() as u32,
            ],
        }
    }
}

impl std::fmt::Debug for PhongMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("PhongMaterial")
            .field("diffuse_color", &state.diffuse_color)
            .field("specular_color", &state.specular_color)
            .field("specular_power", &state.specular_power)
            .field("bound_maps", &state.maps.iter().flatten().count())
            .finish()
    }
}

/// GPU-ready material uniform data.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PhongUniformData {
    /// Diffuse RGBA.
    pub diffuse_color: [f32; 4],
    /// Specular RGB plus power in `w`.
    pub specular: [f32; 4],
    /// 1 for each bound map, in [`MapType`] order.
    pub map_mask: [u32; 4],
}

static_assertions::assert_impl_all!(PhongMaterial: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_data_layout() {
        let material = PhongMaterial::new();
        material.set_diffuse_color(Color::new(1.0, 0.5, 0.25, 1.0));
        material.set_specular(Color::BLACK, 8.0);

        let data = material.uniform_data();
        assert_eq!(data.diffuse_color, [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(data.specular[3], 8.0);
        assert_eq!(data.map_mask, [0, 0, 0, 0]);
        assert_eq!(bytemuck::bytes_of(&data).len(), 48);
    }

    #[test]
    fn test_disposed_map_is_stale() {
        let device = Arc::new(crate::backend::dummy::DummyBackend::new());
        let factory = crate::factory::ResourceFactory::new(device, crate::config::Settings::default());
        let texture = factory
            .create_texture(
                crate::types::PixelFormat::ByteBgraPre,
                crate::types::UsageHint::Static,
                crate::types::WrapMode::Repeat,
                8,
                8,
            )
            .unwrap();

        let material = PhongMaterial::new();
        assert!(!material.has_stale_maps());
        material.set_map(MapType::Diffuse, Some(texture.clone()));
        assert!(!material.has_stale_maps());

        texture.dispose();
        assert!(material.has_stale_maps());
        material.set_map(MapType::Diffuse, None);
        assert!(!material.has_stale_maps());
    }
}
