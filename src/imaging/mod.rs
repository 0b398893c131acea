//! Image processing: decoded buffers, pixel primitives and the engine seam.
//!
//! | Concern | Where |
//! |---|---|
//! | **Decoded pixels** | [`ImageHandle`] (`f32` samples + colourspace tag) |
//! | **Primitives** | resize, crop, embed, conv, gaussblur, recomb, premultiply… in `pixel` |
//! | **Colourspace** | sRGB / greyscale / Lab via linear light in `colourspace` |
//! | **Decode / encode** | [`ImageEngine`] trait + [`RustEngine`] (`image` crate) |
//! | **Colours** | [`Color::parse`] (hex + CSS names) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Request map and the total resolvers for shared knobs
//! - **Engine**: [`ImageEngine`] trait + [`RustEngine`]

pub mod calculations;
pub mod color;
pub mod colourspace;
pub mod engine;
mod handle;
pub mod params;
mod pixel;
pub mod rust_engine;

pub use color::Color;
pub use engine::{EngineError, ImageEngine};
pub use handle::{AccessMode, BandFormat, ImageHandle, Interpretation};
pub use params::{EncodingOptions, ManipulationRequest, SharpenSettings};
pub use pixel::{Angle, Kernel};
pub use rust_engine::RustEngine;
