//! # imgchain
//!
//! On-the-fly image transformation: a source URL and a map of URL-style
//! parameters go in, a re-encoded image comes out.
//!
//! # Architecture: One Request, One Pass
//!
//! ```text
//! throttle → fetch → decode → Trim → Orientation → Crop → Size → Shape
//!          → Brightness → Contrast → Gamma → Filter → Sharpen → Blur
//!          → Background → unpremultiply → negotiate format → encode
//!          → (GIF shim)
//! ```
//!
//! Every operator sees the whole request and a small [`PipelineState`]
//! (alpha present, 16-bit, premultiplied). Operators that change one of
//! those facts report it back; the orchestrator keeps the state honest.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Orchestrator: throttling, access mode, operator chain, format negotiation, GIF fallback |
//! | [`manipulators`] | The operator chain and the state it threads |
//! | [`imaging`] | Decoded buffers, pixel primitives, parameter resolvers, the [`ImageEngine`](imaging::ImageEngine) seam |
//! | [`fetch`] | Source retrieval into scoped temporary files |
//! | [`throttle`] | Per-client rate limiting and ban notification |
//! | [`raster`] | Palette raster shim used to write GIF |
//! | [`config`] | TOML config loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Malformed Parameters Never Fail
//!
//! Every resolver is total. A bad `w` or an unknown `filt` falls back to the
//! default for that knob and the rest of the request still applies. Only
//! throttling, fetching, decoding and encoding can fail a request.
//!
//! ## Premultiplied Alpha Is Tracked, Not Assumed
//!
//! Resampling, sharpening, blurring and compositing must run on premultiplied
//! samples. The first operator that needs it premultiplies; the orchestrator
//! undoes it once at the end and casts back to the decoded bit depth.
//!
//! ## Self-Contained Imaging
//!
//! Decoding, resampling and most encoding use the `image` crate. Progressive
//! JPEG comes from `jpeg-encoder`, lossy WebP from the `webp` crate's bundled
//! libwebp, and GIF output goes through the `gif` crate's quantizer. No
//! system libraries are required.
//!
//! [`PipelineState`]: manipulators::PipelineState

pub mod config;
pub mod fetch;
pub mod imaging;
pub mod manipulators;
pub mod output;
pub mod pipeline;
pub mod raster;
pub mod throttle;
