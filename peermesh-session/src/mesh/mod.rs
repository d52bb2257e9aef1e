#[allow(clippy::module_inception)]
mod mesh;
mod mesh_command;
mod mesh_context;
mod mesh_handle;

pub use mesh_context::MeshContext;
pub use mesh_handle::{MeshBuilder, MeshHandle};
