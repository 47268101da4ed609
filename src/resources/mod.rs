//! GPU resource types.
//!
//! Every object that owns a native handle is built from a
//! [`NativeResourceRecord`] wrapped in a [`GraphicsResource`]. Resources are
//! created through the [`ResourceFactory`](crate::ResourceFactory) and
//! reference-counted with `Arc`.

mod disposer;
mod graphics_resource;
mod material;
mod mesh;
mod record;
mod render_target;
mod texture;

pub use disposer::Disposer;
pub use graphics_resource::GraphicsResource;
pub use material::{MapType, PhongMaterial, PhongUniformData};
pub use mesh::{CullMode, Light, MAX_LIGHTS, Mesh, MeshVertex, MeshView};
pub use record::NativeResourceRecord;
pub use render_target::RenderTargetTexture;
pub use texture::{Texture, TextureData};

pub(crate) use texture::TextureCore;
