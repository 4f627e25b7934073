// ABOUTME: Library exports for termgrid modules for testing and external use
// ABOUTME: Makes the render pipeline available to integration tests and benchmarks

pub mod cli;
pub mod config;
pub mod error;
pub mod image_protocols;
pub mod items;
pub mod output;
