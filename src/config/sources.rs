//! Settings sources, in the order they are layered.

pub mod environment;
pub mod global_file;
pub mod settings_file;
