//! dockbuild-lib: container image builds driven through a container engine CLI
//!
//! This crate provides the building blocks of a dockbuild run:
//! - `config`: validated builder configuration and build files
//! - `driver`: the engine abstraction and its CLI-backed implementation
//! - `build`: the step pipeline that turns a base image into an artifact
//! - `postprocess`: tag, push, import and save stages applied afterwards
//! - `artifact`: what a build or post-processor produces

pub mod artifact;
pub mod build;
pub mod config;
pub mod consts;
pub mod credentials;
pub mod driver;
pub mod postprocess;
pub mod provision;
pub mod util;
