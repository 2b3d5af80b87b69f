//! `lumistream` samples the edges of a screen, reduces every LED sample area to a single
//! gamma-corrected color and streams the resulting color array to an LED controller.
//!
//! # Structure
//!
//! Frames are pulled from a [capture::FrameSource] by a set of producer tasks, turned into
//! [pipeline::ColorFrame]s using the [geometry] engine and the [image] sampler, and handed
//! over to a single consumer through an overwrite-on-full slot. The consumer runs the
//! [filters] and writes the frame to the active [device], which encodes it using one of the
//! [codec] implementations (Adalight-style serial frames, chunked JSON or raw CSV streams).
//!
//! # License
//!
//! This source code is released under the [MIT-License](https://opensource.org/licenses/MIT)

#[macro_use]
extern crate tracing;

pub mod capture;
pub mod codec;
pub mod color;
pub mod device;
pub mod filters;
pub mod geometry;
pub mod image;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod session;
