// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! All heavy work (decode, resize, encode) runs on blocking threads and the
//! network round trip is awaited, so the interface stays responsive while a
//! cycle is in flight.
//!
//! - [`inference`]: acquire → preprocess → classify

pub mod inference;
