//! Typed wake-model settings and partial updates.
//!
//! [`WakeSettings`] is the dispatcher's merged state. It starts from the
//! defaults in [`wake_defaults`](crate::constants::wake_defaults) and is
//! changed only through [`WakeSettings::merge`], which validates a whole
//! [`SettingsUpdate`] before applying any of it.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::backend::BackendId;
use crate::constants::{KW_TO_W, wake_defaults};
use crate::error::{FarmError, FarmResult};
use crate::farm::TurbineArray;

/// How single-wake deficits are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Superposition {
    /// Linear sum of deficits
    #[default]
    #[serde(rename = "lin", alias = "linear")]
    Linear,
    /// Root sum of squared deficits
    #[serde(rename = "quad", alias = "quadratic")]
    Quadratic,
}

impl Superposition {
    /// Short name passed to backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            Superposition::Linear => "lin",
            Superposition::Quadratic => "quad",
        }
    }
}

/// Vertical inflow profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InflowProfile {
    /// Logarithmic boundary layer
    #[default]
    #[serde(rename = "log", alias = "logarithmic")]
    Logarithmic,
    /// Height-independent inflow
    #[serde(rename = "uniform")]
    Uniform,
}

impl InflowProfile {
    /// Short name passed to backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            InflowProfile::Logarithmic => "log",
            InflowProfile::Uniform => "uniform",
        }
    }
}

/// Farm-derived backend inputs, pulled from a [`TurbineArray`] once per
/// configure.
#[derive(Debug, Clone)]
pub struct FarmInputs {
    /// Farm the inputs were pulled from
    pub farm: Arc<TurbineArray>,
    /// N×N global offsets, `x_g[i, j] = x[j] - x[i]`
    pub x_g: Array2<f64>,
    /// N×N global y offsets
    pub y_g: Array2<f64>,
    /// N×N global z offsets
    pub z_g: Array2<f64>,
    /// Rotor diameters (m)
    pub rotor_diameters: Array1<f64>,
    /// Per turbine, K×2 `[u, P (kW)]`
    pub power_tables: Vec<Array2<f64>>,
    /// Per turbine, K×2 `[u, CT]`
    pub thrust_tables: Vec<Array2<f64>>,
    /// Cut-in speeds (m/s)
    pub cut_in_speeds: Array1<f64>,
    /// Cut-out speeds (m/s)
    pub cut_out_speeds: Array1<f64>,
    /// Idle thrust coefficients
    pub idle_thrust_coefficients: Array1<f64>,
}

impl FarmInputs {
    /// Pull every farm-derived input.
    pub fn from_farm(farm: Arc<TurbineArray>) -> Self {
        let (x_g, y_g, z_g) = farm.pairwise_global_offsets();
        let power_tables = farm
            .turbines()
            .iter()
            .map(|wt| {
                let mut table = wt.curves().power_table();
                table.column_mut(1).mapv_inplace(|p| p / KW_TO_W);
                table
            })
            .collect();
        let thrust_tables = farm.turbines().iter().map(|wt| wt.curves().thrust_table()).collect();

        Self {
            x_g,
            y_g,
            z_g,
            rotor_diameters: farm.rotor_diameters(),
            power_tables,
            thrust_tables,
            cut_in_speeds: farm.cut_in_speeds(),
            cut_out_speeds: farm.cut_out_speeds(),
            idle_thrust_coefficients: farm.idle_thrust_coefficients(),
            farm,
        }
    }

    /// Number of turbines.
    pub fn num_turbines(&self) -> usize {
        self.farm.len()
    }
}

/// Merged dispatcher settings.
#[derive(Debug, Clone)]
pub struct WakeSettings {
    /// Selected backend
    pub version: Option<BackendId>,
    /// Air density (kg/m³)
    pub density: f64,
    /// `[a1, a2, a3, a4, b1, b2]`
    pub expansion_coefficients: [f64; 6],
    /// Roughness length (m)
    pub roughness_length: f64,
    /// Power-law shear exponent
    pub shear_exponent: f64,
    /// Wake superposition
    pub superposition: Superposition,
    /// Inflow profile
    pub inflow: InflowProfile,
    /// Wake zone integration points
    pub wake_zone_points: usize,
    /// Farm-derived inputs
    pub farm: Option<FarmInputs>,
}

impl Default for WakeSettings {
    fn default() -> Self {
        Self {
            version: None,
            density: wake_defaults::AIR_DENSITY,
            expansion_coefficients: wake_defaults::EXPANSION_COEFFICIENTS,
            roughness_length: wake_defaults::ROUGHNESS_LENGTH,
            shear_exponent: wake_defaults::SHEAR_EXPONENT,
            superposition: Superposition::default(),
            inflow: InflowProfile::default(),
            wake_zone_points: wake_defaults::WAKE_ZONE_POINTS,
            farm: None,
        }
    }
}

impl WakeSettings {
    /// Validate `update` as a whole, then apply its set fields.
    ///
    /// On error nothing is applied.
    pub fn merge(&mut self, update: &SettingsUpdate) -> FarmResult<()> {
        let version = update.version.as_deref().map(str::parse::<BackendId>).transpose()?;

        if let Some(density) = update.density {
            if !(density > 0.0 && density.is_finite()) {
                return Err(FarmError::Configuration(format!("density must be positive, got {}", density)));
            }
        }
        if let Some(pars) = update.expansion_coefficients {
            if pars.iter().any(|p| !p.is_finite()) {
                return Err(FarmError::Configuration(format!(
                    "expansion coefficients must be finite, got {:?}",
                    pars
                )));
            }
        }
        if let Some(z0) = update.roughness_length {
            if !(z0 > 0.0 && z0.is_finite()) {
                return Err(FarmError::Configuration(format!("roughness length must be positive, got {}", z0)));
            }
        }
        if let Some(alpha) = update.shear_exponent {
            if !alpha.is_finite() {
                return Err(FarmError::Configuration(format!("shear exponent must be finite, got {}", alpha)));
            }
        }
        if update.wake_zone_points == Some(0) {
            return Err(FarmError::Configuration("wake zone needs at least one point".to_string()));
        }

        if version.is_some() {
            self.version = version;
        }
        if let Some(density) = update.density {
            self.density = density;
        }
        if let Some(pars) = update.expansion_coefficients {
            self.expansion_coefficients = pars;
        }
        if let Some(z0) = update.roughness_length {
            self.roughness_length = z0;
        }
        if let Some(alpha) = update.shear_exponent {
            self.shear_exponent = alpha;
        }
        if let Some(sup) = update.superposition {
            self.superposition = sup;
        }
        if let Some(inflow) = update.inflow {
            self.inflow = inflow;
        }
        if let Some(ng) = update.wake_zone_points {
            self.wake_zone_points = ng;
        }
        if let Some(farm) = &update.farm {
            self.farm = Some(FarmInputs::from_farm(Arc::clone(farm)));
        }
        Ok(())
    }
}

/// Partial settings; unset fields keep their current value.
///
/// Deserializes from JSON using either the long field names or the short
/// backend names (`rho`, `pars`, `z0`, `alpha`, `sup`, `NG`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsUpdate {
    /// Backend version name
    #[serde(default)]
    pub version: Option<String>,
    /// Air density (kg/m³)
    #[serde(default, alias = "rho")]
    pub density: Option<f64>,
    /// Expansion coefficients
    #[serde(default, alias = "pars")]
    pub expansion_coefficients: Option<[f64; 6]>,
    /// Roughness length (m)
    #[serde(default, alias = "z0")]
    pub roughness_length: Option<f64>,
    /// Shear exponent
    #[serde(default, alias = "alpha")]
    pub shear_exponent: Option<f64>,
    /// Wake superposition
    #[serde(default, alias = "sup")]
    pub superposition: Option<Superposition>,
    /// Inflow profile
    #[serde(default)]
    pub inflow: Option<InflowProfile>,
    /// Wake zone integration points
    #[serde(default, alias = "NG")]
    pub wake_zone_points: Option<usize>,
    /// Farm replacing the configured one
    #[serde(skip)]
    pub farm: Option<Arc<TurbineArray>>,
}

impl SettingsUpdate {
    /// Parse a JSON update.
    pub fn from_json_str(json: &str) -> FarmResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON update from a file.
    pub fn from_path(path: impl AsRef<Path>) -> FarmResult<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Select a backend version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the air density.
    pub fn density(mut self, density: f64) -> Self {
        self.density = Some(density);
        self
    }

    /// Set all six expansion coefficients.
    pub fn expansion_coefficients(mut self, pars: [f64; 6]) -> Self {
        self.expansion_coefficients = Some(pars);
        self
    }

    /// Set the roughness length.
    pub fn roughness_length(mut self, z0: f64) -> Self {
        self.roughness_length = Some(z0);
        self
    }

    /// Set the shear exponent.
    pub fn shear_exponent(mut self, alpha: f64) -> Self {
        self.shear_exponent = Some(alpha);
        self
    }

    /// Set the superposition rule.
    pub fn superposition(mut self, sup: Superposition) -> Self {
        self.superposition = Some(sup);
        self
    }

    /// Set the inflow profile.
    pub fn inflow(mut self, inflow: InflowProfile) -> Self {
        self.inflow = Some(inflow);
        self
    }

    /// Set the wake zone point count.
    pub fn wake_zone_points(mut self, ng: usize) -> Self {
        self.wake_zone_points = Some(ng);
        self
    }

    /// Replace the farm.
    pub fn farm(mut self, farm: Arc<TurbineArray>) -> Self {
        self.farm = Some(farm);
        self
    }
}
