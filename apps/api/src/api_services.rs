mod state_builder;
mod store;

pub use state_builder::{StateInputs, assemble_app_state, build_app_state};
