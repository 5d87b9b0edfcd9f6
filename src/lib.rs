//! Photobooth library - cameras, collages and printing for a photo booth.
//!
//! This library exposes the core functionality of the `photobooth` CLI for use
//! in tests and in front-ends such as a touchscreen UI.
//!
//! # Modules
//!
//! - `device`: Camera backends, the printer and role assignment
//! - `collage`: Template documents and collage assembly
//! - `session`: The shot, collage, print and save workflow
//! - `image_ops`: Resizing, cropping, zooming and compositing
//! - `config`: Configuration file handling
//! - `error`: Error types with user-recoverable hints
//! - `output`: Output mode abstraction (robot/human)
#![forbid(unsafe_code)]

pub mod cli;
pub mod collage;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod frame;
pub mod image_ops;
pub mod logging;
pub mod output;
pub mod session;
pub mod theme;
pub mod worker;
