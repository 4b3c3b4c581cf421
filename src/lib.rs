pub mod cloud;
pub mod config;
pub mod error;
pub mod lan;
pub mod light;
pub mod model;
pub mod platform;
