//! Wind farm geometry engine and wake backend dispatcher.
//!
//! This library provides:
//! - Monotone curve interpolation with an exact inverse up to the peak
//! - Turbine performance envelopes (power, thrust coefficient, induction)
//! - Farm geometry: relative position tensor, flow-frame rotation and
//!   upstream/downstream ranking for any wind direction
//! - A dispatcher driving interchangeable wake backends through a uniform
//!   settings, argument and result contract
//!
//! # Features
//!
//! - **plotting**: PNG layout rendering through plotters
//! - **python-bindings**: PyO3 bindings exposing turbines, farms and the
//!   dispatcher

#![warn(missing_docs)]
#![warn(clippy::doc_markdown)]

pub mod backend;
pub mod constants;
pub mod curve;
pub mod dispatcher;
pub mod error;
pub mod farm;
pub mod layout;
pub mod render;
pub mod settings;
pub mod turbine;
pub mod vector;

// Optional Python bindings
#[cfg(feature = "python-bindings")]
pub mod python;

pub use backend::{BackendId, FreeStreamBackend, WakeBackend};
pub use curve::{CurveInterpolator, Extrapolation, Interpolation};
pub use dispatcher::{Availability, DispatcherState, WakeBackendDispatcher, WakeQuery, WakeResult};
pub use error::{FarmError, FarmResult};
pub use farm::{SharedFarm, TurbineArray, TurbineOrdering};
pub use layout::{CsvLayout, DescribedLayout, InMemoryLayout, LayoutSource};
pub use settings::{SettingsUpdate, WakeSettings};
pub use turbine::{TurbineSpec, TurbineType};
pub use vector::Vec3;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
