//! Request parameters and their resolvers.
//!
//! A [`ManipulationRequest`] is the raw `key → value` query a client sent.
//! Resolvers turn individual raw values into typed settings. They are total:
//! malformed or out-of-range input resolves to the documented default, so a
//! single bad knob degrades one feature instead of failing the request.
//!
//! ## Types
//!
//! - [`ManipulationRequest`] — Immutable parameter map.
//! - [`SharpenSettings`] — Flat/jagged gains and sigma for the sharpen operator.
//! - [`EncodingOptions`] — Quality, interlace and compression for the encoder.

use std::collections::BTreeMap;

/// Raw manipulation parameters, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManipulationRequest(BTreeMap<String, String>);

impl ManipulationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` query string. Keys and
    /// values are percent-decoded (`+` is a space), keys without `=` map to an
    /// empty value and later duplicates win.
    pub fn from_query(query: &str) -> Self {
        form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ManipulationRequest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Parse a numeric parameter. Surrounding whitespace is ignored; NaN and
/// infinities are rejected.
pub fn numeric(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Numeric value within `min..=max`, or `None`.
pub fn numeric_in(raw: Option<&str>, min: f64, max: f64) -> Option<f64> {
    numeric(raw).filter(|v| (min..=max).contains(v))
}

/// Sigma sentinel selecting the fast 3x3 sharpen kernel.
pub const FAST_SHARPEN: f64 = -1.0;

/// Sentinel meaning "do not blur".
pub const NO_BLUR: f64 = -1.0;

/// Sharpening gains and mask size.
///
/// - `flat`: gain applied to smooth regions (1–10000, default 1)
/// - `jagged`: gain applied to edges (1–10000, default 2)
/// - `sigma`: Gaussian mask size; [`FAST_SHARPEN`] selects the fast kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharpenSettings {
    pub flat: i32,
    pub jagged: i32,
    pub sigma: f64,
}

impl Default for SharpenSettings {
    fn default() -> Self {
        Self {
            flat: 1,
            jagged: 2,
            sigma: FAST_SHARPEN,
        }
    }
}

impl SharpenSettings {
    pub fn is_fast(&self) -> bool {
        self.sigma == FAST_SHARPEN
    }
}

/// Resolve `sharp=flat,jagged,sigma`. Missing or invalid fields keep their
/// defaults independently of the others.
pub fn resolve_sharpen(raw: Option<&str>) -> SharpenSettings {
    let mut settings = SharpenSettings::default();
    let Some(raw) = raw else {
        return settings;
    };
    let mut fields = raw.split(',');

    if let Some(flat) = integer_in(fields.next(), 1, 10000) {
        settings.flat = flat;
    }
    if let Some(jagged) = integer_in(fields.next(), 1, 10000) {
        settings.jagged = jagged;
    }
    if let Some(sigma) = numeric_in(fields.next(), 0.01, 10000.0) {
        settings.sigma = sigma;
    }
    settings
}

fn integer_in(raw: Option<&str>, min: i32, max: i32) -> Option<i32> {
    numeric(raw)
        .map(|v| v.trunc() as i32)
        .filter(|v| (min..=max).contains(v))
}

/// Resolve `blur`: a sigma in `[0, 1000]`, otherwise [`NO_BLUR`].
pub fn resolve_blur(raw: Option<&str>) -> f64 {
    numeric_in(raw, 0.0, 1000.0).unwrap_or(NO_BLUR)
}

pub const DEFAULT_QUALITY: u8 = 85;
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 6;

/// Resolve `q`: lossy quality in `[0, 100]`, default 85.
pub fn resolve_quality(raw: Option<&str>) -> u8 {
    numeric_in(raw, 0.0, 100.0).map_or(DEFAULT_QUALITY, |q| q as u8)
}

/// Resolve `level`: zlib compression level in `[0, 9]`, default 6.
pub fn resolve_compression_level(raw: Option<&str>) -> u8 {
    numeric_in(raw, 0.0, 9.0).map_or(DEFAULT_COMPRESSION_LEVEL, |l| l as u8)
}

/// Encoder settings. Only the fields meaningful for the chosen extension are
/// populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodingOptions {
    pub quality: Option<u8>,
    pub interlace: Option<bool>,
    pub compression: Option<u8>,
}
