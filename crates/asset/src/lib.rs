//! Asset loading for the examples: meshes, shaders and textures.
//!
//! Every loader takes an explicit [`AssetRoots`] search list.

pub mod mesh;
pub mod roots;
pub mod shader;
pub mod texture;

pub use mesh::{FormatRevision, MeshData, MeshError, load_mesh};
pub use roots::AssetRoots;
pub use shader::{ProgramData, ShaderData, ShaderProfile, load_program, load_shader};
pub use texture::{TextureData, load_texture};
