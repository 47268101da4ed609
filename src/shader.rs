//! Shader descriptors and the stock shader registry.
//!
//! Stock shaders are looked up by name in a static table of loader
//! functions. Each loader produces the descriptor the resource factory turns
//! into a [`Shader`].

use std::collections::BTreeMap;

use crate::error::GraphicsError;

/// Parameters describing a fragment program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderDescriptor {
    /// Program name in the compiled shader library.
    pub name: String,
    /// Sampler name to texture unit.
    pub samplers: BTreeMap<String, u32>,
    /// Uniform name to register index.
    pub params: BTreeMap<String, u32>,
    /// Highest texture coordinate set the program reads.
    pub max_tex_coord_index: u32,
    /// Whether the program reads the pixel coordinate.
    pub pixcoord_used: bool,
    /// Whether the program reads per-vertex color.
    pub per_vertex_color_used: bool,
}

impl ShaderDescriptor {
    /// Create a descriptor with no samplers or params.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a sampler binding.
    pub fn with_sampler(mut self, name: &str, unit: u32) -> Self {
        self.samplers.insert(name.to_string(), unit);
        self
    }

    /// Add a uniform binding.
    pub fn with_param(mut self, name: &str, index: u32) -> Self {
        self.params.insert(name.to_string(), index);
        self
    }

    /// Set the highest texture coordinate index.
    pub fn with_max_tex_coord_index(mut self, index: u32) -> Self {
        self.max_tex_coord_index = index;
        self
    }

    /// Mark the pixel coordinate as used.
    pub fn with_pixcoord(mut self) -> Self {
        self.pixcoord_used = true;
        self
    }

    /// Mark per-vertex color as used.
    pub fn with_per_vertex_color(mut self) -> Self {
        self.per_vertex_color_used = true;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), GraphicsError> {
        if self.name.trim().is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "shader name must be non-empty".into(),
            ));
        }
        let mut units: Vec<u32> = self.samplers.values().copied().collect();
        units.sort_unstable();
        if units.windows(2).any(|w| w[0] == w[1]) {
            return Err(GraphicsError::InvalidParameter(format!(
                "shader {}: two samplers share a texture unit",
                self.name
            )));
        }
        Ok(())
    }
}

/// A shader program handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    descriptor: ShaderDescriptor,
}

impl Shader {
    pub(crate) fn new(descriptor: ShaderDescriptor) -> Self {
        Self { descriptor }
    }

    /// Program name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Full descriptor.
    pub fn descriptor(&self) -> &ShaderDescriptor {
        &self.descriptor
    }

    /// Texture unit bound to a sampler.
    pub fn sampler_unit(&self, sampler: &str) -> Option<u32> {
        self.descriptor.samplers.get(sampler).copied()
    }

    /// Register index of a uniform.
    pub fn param_index(&self, param: &str) -> Option<u32> {
        self.descriptor.params.get(param).copied()
    }
}

/// Loader for one stock shader.
pub type StockShaderLoader = fn() -> ShaderDescriptor;

fn solid_color() -> ShaderDescriptor {
    ShaderDescriptor::new("Solid_Color")
        .with_param("jsl_color", 0)
        .with_per_vertex_color()
}

fn texture_color() -> ShaderDescriptor {
    ShaderDescriptor::new("Texture_Color")
        .with_sampler("maskInput", 0)
        .with_per_vertex_color()
}

fn solid_texture_rgb() -> ShaderDescriptor {
    ShaderDescriptor::new("Solid_TextureRGB")
        .with_sampler("inputTex", 0)
        .with_per_vertex_color()
}

fn solid_texture_yv12() -> ShaderDescriptor {
    ShaderDescriptor::new("Solid_TextureYV12")
        .with_sampler("lumaTex", 0)
        .with_sampler("cbTex", 1)
        .with_sampler("crTex", 2)
        .with_sampler("alphaTex", 3)
        .with_param("lumaAlphaScale", 0)
        .with_param("cbCrScale", 1)
        .with_per_vertex_color()
}

fn texture_linear_gradient_pad() -> ShaderDescriptor {
    ShaderDescriptor::new("Texture_LinearGradient_PAD")
        .with_sampler("maskInput", 0)
        .with_sampler("colors", 1)
        .with_param("fractions", 0)
        .with_param("offset", 1)
        .with_param("perspVec", 2)
        .with_param("gradParams", 3)
        .with_max_tex_coord_index(1)
        .with_pixcoord()
        .with_per_vertex_color()
}

fn mask_texture_super() -> ShaderDescriptor {
    ShaderDescriptor::new("Mask_TextureSuper")
        .with_sampler("maskInput", 0)
        .with_sampler("textureInput", 1)
        .with_max_tex_coord_index(1)
        .with_per_vertex_color()
}

fn solid_texture_first_pass_lcd() -> ShaderDescriptor {
    ShaderDescriptor::new("Solid_TextureFirstPassLCD")
        .with_sampler("glyphTex", 0)
        .with_param("lcd_color", 0)
        .with_per_vertex_color()
}

fn solid_texture_second_pass_lcd() -> ShaderDescriptor {
    ShaderDescriptor::new("Solid_TextureSecondPassLCD")
        .with_sampler("glyphTex", 0)
        .with_sampler("dstTex", 1)
        .with_param("gamma", 0)
        .with_max_tex_coord_index(1)
        .with_per_vertex_color()
}

/// Stock shaders by name.
pub static STOCK_SHADERS: &[(&str, StockShaderLoader)] = &[
    ("Solid_Color", solid_color),
    ("Texture_Color", texture_color),
    ("Solid_TextureRGB", solid_texture_rgb),
    ("Solid_TextureYV12", solid_texture_yv12),
    ("Texture_LinearGradient_PAD", texture_linear_gradient_pad),
    ("Mask_TextureSuper", mask_texture_super),
    ("Solid_TextureFirstPassLCD", solid_texture_first_pass_lcd),
    ("Solid_TextureSecondPassLCD", solid_texture_second_pass_lcd),
];

/// Find the loader registered under `name`.
pub fn stock_shader_loader(name: &str) -> Option<StockShaderLoader> {
    STOCK_SHADERS
        .iter()
        .find(|(stock, _)| *stock == name)
        .map(|(_, loader)| *loader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_match_descriptors() {
        for (name, loader) in STOCK_SHADERS {
            let descriptor = loader();
            assert_eq!(descriptor.name, *name);
            descriptor.validate().unwrap();
        }
    }

    #[test]
    fn test_lookup() {
        assert!(stock_shader_loader("Solid_Color").is_some());
        assert!(stock_shader_loader("solid_color").is_none());
        assert!(stock_shader_loader("").is_none());
    }

    #[test]
    fn test_validate_rejects_shared_units() {
        let descriptor = ShaderDescriptor::new("Bad")
            .with_sampler("a", 0)
            .with_sampler("b", 0);
        assert!(descriptor.validate().is_err());
        assert!(ShaderDescriptor::new(" ").validate().is_err());
    }
}
