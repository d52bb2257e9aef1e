mod local_bus;
mod signaling_output;

pub use local_bus::*;
pub use signaling_output::*;
