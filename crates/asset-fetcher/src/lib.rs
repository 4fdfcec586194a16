//! Asset Fetcher
//!
//! The network side of the offline asset cache: a [`Network`] trait for
//! issuing live requests, [`HttpNetwork`], its reqwest-backed
//! implementation, and [`UpstreamNetwork`] for serving a public origin from
//! a different upstream host.

pub mod client;
pub mod error;
pub mod types;

pub use client::{HttpNetwork, Network, UpstreamNetwork};
pub use error::{FetchError, Result};
pub use types::{AssetRequest, AssetResponse, ResponseSource};
