pub mod light;
pub mod registry;
