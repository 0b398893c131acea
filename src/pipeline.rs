//! Request orchestration.
//!
//! [`Pipeline::run`] takes one request from source URL to encoded bytes:
//!
//! 1. **Throttle**: refuse clients over their allowance
//! 2. **Fetch**: pull the source into a scoped temporary file
//! 3. **Decode**: pick sequential or random access, load the pixels
//! 4. **Manipulate**: run the operator chain, threading [`PipelineState`]
//! 5. **Finish**: undo premultiplication, cast back to the decoded depth
//! 6. **Negotiate**: choose the output format and its encoder options
//! 7. **Encode**: write the buffer, re-encoding as GIF through the raster
//!    shim when the client asked for GIF
//!
//! Only throttling, fetching, decoding and encoding can fail. Malformed
//! parameters degrade to defaults and a failing GIF shim falls back to the
//! primary output.

use crate::fetch::{FetchError, Fetcher};
use crate::imaging::{
    AccessMode, BandFormat, Color, EncodingOptions, EngineError, ImageEngine, ImageHandle,
    ManipulationRequest,
};
use crate::imaging::params::{resolve_compression_level, resolve_quality};
use crate::manipulators::{Manipulator, PipelineState};
use crate::raster::RasterShim;
use crate::throttle::{BanHandler, LogBan, Throttler};
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("There's a limit of requests per client. Please try again later.")]
    RateExceeded,
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Image not readable. Is it a valid image?")]
    ImageNotReadable(#[source] EngineError),
    #[error("Encoding failed: {0}")]
    Engine(#[source] EngineError),
}

/// Formats the engine is allowed to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" => Some(OutputFormat::Jpg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }

    pub fn supports_alpha(self) -> bool {
        matches!(self, OutputFormat::Png | OutputFormat::Webp)
    }
}

pub const GIF_MIME_TYPE: &str = "image/gif";

/// Pick the output format.
///
/// An allowed `output` wins. Otherwise an image with alpha whose current
/// extension cannot carry alpha becomes PNG, and any other extension that
/// is not allowed becomes JPEG.
pub fn negotiate_format(output: Option<&str>, extension: &str, has_alpha: bool) -> OutputFormat {
    if let Some(format) = output.and_then(OutputFormat::from_extension) {
        return format;
    }
    let current = OutputFormat::from_extension(extension);
    if has_alpha && !current.is_some_and(OutputFormat::supports_alpha) {
        OutputFormat::Png
    } else {
        current.unwrap_or(OutputFormat::Jpg)
    }
}

/// Encoder options relevant to `format`.
pub fn encoding_options(format: OutputFormat, request: &ManipulationRequest) -> EncodingOptions {
    let quality = matches!(format, OutputFormat::Jpg | OutputFormat::Webp)
        .then(|| resolve_quality(request.get("q")));
    let interlace =
        matches!(format, OutputFormat::Jpg | OutputFormat::Png).then(|| request.contains("il"));
    let compression = matches!(format, OutputFormat::Png)
        .then(|| resolve_compression_level(request.get("level")));
    EncodingOptions {
        quality,
        interlace,
        compression,
    }
}

/// Whether the client ultimately wants a GIF.
pub fn needs_gif(output: Option<&str>, extension: &str) -> bool {
    match output {
        Some(output) => output == "gif",
        None => extension == "gif",
    }
}

/// Who is asking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub client_ip: Option<IpAddr>,
}

impl RequestContext {
    pub fn new(client_ip: Option<IpAddr>) -> Self {
        Self { client_ip }
    }

    /// Throttling identity; unknown clients count as loopback.
    pub fn identity(&self) -> String {
        self.client_ip
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .to_string()
    }
}

/// The encoded result of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub buffer: Vec<u8>,
    pub mime_type: &'static str,
    pub extension: String,
}

/// Orchestrates one request across the collaborators.
///
/// Collaborators are borrowed, so a single set can serve many pipelines or
/// many threads (`Pipeline` is `Sync`).
pub struct Pipeline<'a> {
    fetcher: &'a dyn Fetcher,
    engine: &'a dyn ImageEngine,
    throttler: Option<&'a dyn Throttler>,
    ban_handler: &'a dyn BanHandler,
    shim: Option<&'a dyn RasterShim>,
}

impl<'a> Pipeline<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, engine: &'a dyn ImageEngine) -> Self {
        Self {
            fetcher,
            engine,
            throttler: None,
            ban_handler: &LogBan,
            shim: None,
        }
    }

    pub fn with_throttler(mut self, throttler: &'a dyn Throttler) -> Self {
        self.throttler = Some(throttler);
        self
    }

    pub fn with_ban_handler(mut self, handler: &'a dyn BanHandler) -> Self {
        self.ban_handler = handler;
        self
    }

    pub fn with_shim(mut self, shim: &'a dyn RasterShim) -> Self {
        self.shim = Some(shim);
        self
    }

    /// Transform the image at `url`.
    ///
    /// `extension` is the format the source is believed to have; it decides
    /// the output format when the request names none.
    pub fn run(
        &self,
        ctx: &RequestContext,
        url: &str,
        extension: &str,
        request: &ManipulationRequest,
    ) -> Result<Transformed, PipelineError> {
        if let Some(throttler) = self.throttler {
            if throttler.is_exceeded(&ctx.identity(), self.ban_handler) {
                return Err(PipelineError::RateExceeded);
            }
        }

        let local = self.fetcher.fetch(url)?;

        let access = if Manipulator::needs_random_access(request) {
            AccessMode::Random
        } else {
            AccessMode::Sequential
        };
        log::debug!("{url}: decoding with {access:?} access");

        let image = self.engine.load(local.path(), access).map_err(|e| {
            log::warn!("Image not readable. Message: {e} URL: {url}");
            PipelineError::ImageNotReadable(e)
        })?;

        let (image, state) = manipulate(image, request);

        let output = request.get("output");
        let format = negotiate_format(output, extension, state.has_alpha);
        let options = encoding_options(format, request);
        log::debug!("{url}: encoding as {} with {options:?}", format.extension());

        let buffer = self
            .engine
            .encode(&image, format.extension(), &options)
            .map_err(PipelineError::Engine)?;

        if needs_gif(output, extension) && !self.engine.can_write("gif") {
            if let Some(shim) = self.shim {
                let interlace = options.interlace.unwrap_or(false);
                if let Some(gif) = reencode_gif(shim, &buffer, interlace, state.has_alpha) {
                    return Ok(Transformed {
                        buffer: gif,
                        mime_type: GIF_MIME_TYPE,
                        extension: "gif".to_string(),
                    });
                }
            }
        }

        Ok(Transformed {
            buffer,
            mime_type: format.mime_type(),
            extension: format.extension().to_string(),
        })
    }
}

/// Run the operator chain and undo premultiplication.
pub fn manipulate(image: ImageHandle, request: &ManipulationRequest) -> (ImageHandle, PipelineState) {
    let mut state = PipelineState::for_image(&image);
    let mut image = image;
    for manipulator in Manipulator::CHAIN {
        let applied = manipulator.apply(image, request, &state);
        state.absorb(manipulator, &applied);
        image = applied.image;
    }

    if state.is_premultiplied {
        let depth = if state.is_16_bit {
            BandFormat::U16
        } else {
            BandFormat::U8
        };
        image = image.unpremultiply().cast(depth);
    }
    (image, state)
}

/// Re-encode the primary output as GIF. Any failure yields `None`.
fn reencode_gif(
    shim: &dyn RasterShim,
    buffer: &[u8],
    interlace: bool,
    has_alpha: bool,
) -> Option<Vec<u8>> {
    let mut raster = shim
        .decode(buffer)
        .map_err(|e| log::debug!("GIF shim skipped: {e}"))
        .ok()?;

    if interlace {
        raster.set_interlace(true);
    }
    if has_alpha {
        raster.set_transparency(Color::rgba(0, 0, 0, 127));
        raster.set_alpha_blending(false);
        raster.set_save_alpha(true);
    }

    shim.encode_gif(&raster)
        .map_err(|e| log::debug!("GIF shim skipped: {e}"))
        .ok()
}
