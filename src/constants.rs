//! Physical constants and default wake-model tunables.
//!
//! This module collects every fixed number the geometry engine and the
//! backend dispatcher rely on, so that the defaults table of the dispatcher,
//! the turbine constructors and the tests all read from one place.

/// Backends report power in kilowatt; results are exposed in watt.
pub const KW_TO_W: f64 = 1.0e3;

/// Wind direction offset (degrees) between the meteorological convention
/// (clockwise from north, direction the wind blows from) and the flow frame
/// whose first axis points downwind.
pub const FLOW_FRAME_OFFSET_DEG: f64 = 270.0;

/// Relative tolerance used to locate the rated-power sample in a power table.
pub const PEAK_TOLERANCE: f64 = 1e-9;

/// Flow-frame offsets smaller than this fraction of the pair distance are
/// treated as crosswind when ranking turbines.
pub const ORDERING_TOLERANCE: f64 = 1e-12;

/// Idle thrust coefficient for turbines built from a reference curve table.
pub const DEFAULT_IDLE_THRUST: f64 = 0.053;

/// Idle thrust coefficient for described turbines without an explicit value.
pub const DESCRIPTION_IDLE_THRUST: f64 = 0.056;

/// Default tunables of the Larsen-type wake backends.
pub mod wake_defaults {
    /// Air density (kg/m³)
    pub const AIR_DENSITY: f64 = 1.225;

    /// Wake expansion coefficients `[a1, a2, a3, a4, b1, b2]`
    pub const EXPANSION_COEFFICIENTS: [f64; 6] = [
        0.435449861,
        0.797853685,
        -0.124807893,
        0.136821858,
        15.6298,
        1.0,
    ];

    /// Ground roughness length (m)
    pub const ROUGHNESS_LENGTH: f64 = 0.0001;

    /// Power-law wind shear exponent
    pub const SHEAR_EXPONENT: f64 = 0.101;

    /// Number of Gauss points used to discretize the rotor in the wake zone
    pub const WAKE_ZONE_POINTS: usize = 4;
}
