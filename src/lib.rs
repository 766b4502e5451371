//! luac-batch - Library for compiling MTA resources in bulk
//!
//! This library provides functionality to:
//! - Find every Lua script in a resource folder
//! - Compile them through a remote compile service or a local compiler
//! - Point the resource's `meta.xml` at the compiled files
//! - Snapshot the folder first and roll it back when anything fails

pub mod cli;
pub mod config;
pub mod logging;
pub mod pipeline;
