//! Image encoding collaborator.
//!
//! | Operation | Implementation |
//! |---|---|
//! | **Availability probe** | `which` lookup + `cwebp -version` |
//! | **Encode → WebP** | `cwebp -q Q [-resize W 0] in -o out`, bounded by a timeout |
//! | **Identify** | `image::image_dimensions` (header only, no decode) |
//!
//! The module is split into:
//! - **Parameters**: [`Quality`] and [`EncodeParams`], what to encode
//! - **Backend**: the [`Codec`] trait, [`CodecError`] and header probing
//! - **cwebp**: [`CwebpCodec`], the production external-process codec

pub mod backend;
pub mod cwebp;
mod params;

pub use backend::{Codec, CodecError, Dimensions, probe_dimensions};
pub use cwebp::CwebpCodec;
pub use params::{EncodeParams, Quality};
