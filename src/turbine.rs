//! Per-turbine physical description and operating curves.
//!
//! A [`TurbineSpec`] is immutable once built. It owns a [`PerformanceCurves`]
//! pair (power and thrust coefficient) and answers every envelope question the
//! wake backends need: power and thrust coefficient at a wind speed, the wind
//! speed that produces a given power below rated, and the axial induction
//! factor for a thrust coefficient.
//!
//! Three construction paths exist:
//!
//! - [`TurbineSpec::new`] from explicit [`TurbineParams`],
//! - [`TurbineSpec::from_reference_curves`] from a `(u, P, CT)` table, where
//!   the envelope is read off the table itself,
//! - [`TurbineSpec::from_description`] from a per-instance record plus a
//!   shared [`TurbineType`] template (power given in kW).

use ndarray::{Array, Array2, Dimension};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_IDLE_THRUST, DESCRIPTION_IDLE_THRUST, KW_TO_W, PEAK_TOLERANCE};
use crate::curve::{CurveInterpolator, Interpolation};
use crate::error::{FarmError, FarmResult};

/// Turbine type template, shared by every instance of the same model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurbineType {
    /// Model name
    pub name: String,
    /// Hub height (m)
    pub hub_height: f64,
    /// Rotor diameter (m)
    pub rotor_diameter: f64,
    /// Cut-in wind speed (m/s)
    pub cut_in_wind_speed: f64,
    /// Cut-out wind speed (m/s)
    pub cut_out_wind_speed: f64,
    /// Derived from the power curve when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated_wind_speed: Option<f64>,
    /// Rated power (kW)
    pub rated_power: f64,
    /// `[u (m/s), P (kW)]` rows
    pub power_curve: Vec<[f64; 2]>,
    /// `[u (m/s), CT (-)]` rows
    pub c_t_curve: Vec<[f64; 2]>,
    /// Idle thrust coefficient of the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_t_idle: Option<f64>,
}

/// One placed turbine referring to a [`TurbineType`] by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurbineDescription {
    /// Instance name
    pub name: String,
    /// Name of the [`TurbineType`] template
    pub turbine_type: String,
    /// `[x, y]` (m)
    pub position: [f64; 2],
    /// Per-instance override of the template's idle thrust coefficient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_t_idle: Option<f64>,
}

/// Power (W) and thrust-coefficient curves of one turbine.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceCurves {
    power: CurveInterpolator,
    thrust: CurveInterpolator,
}

impl PerformanceCurves {
    /// Build both interpolators from `[u, value]` rows.
    pub fn new(
        power_table: &[[f64; 2]],
        thrust_table: &[[f64; 2]],
        method: Interpolation,
    ) -> FarmResult<Self> {
        Ok(Self {
            power: CurveInterpolator::from_rows(power_table, method)?,
            thrust: CurveInterpolator::from_rows(thrust_table, method)?,
        })
    }

    /// Power curve (W)
    pub fn power(&self) -> &CurveInterpolator {
        &self.power
    }

    /// Thrust coefficient curve
    pub fn thrust(&self) -> &CurveInterpolator {
        &self.thrust
    }

    /// Power table as a K×2 matrix `[u, P (W)]`.
    pub fn power_table(&self) -> Array2<f64> {
        table_matrix(&self.power)
    }

    /// Thrust table as a K×2 matrix `[u, CT]`.
    pub fn thrust_table(&self) -> Array2<f64> {
        table_matrix(&self.thrust)
    }
}

fn table_matrix(curve: &CurveInterpolator) -> Array2<f64> {
    let (xs, ys) = curve.samples();
    Array2::from_shape_fn((xs.len(), 2), |(k, c)| if c == 0 { xs[k] } else { ys[k] })
}

/// Explicit construction parameters for [`TurbineSpec::new`].
#[derive(Debug, Clone)]
pub struct TurbineParams {
    /// Instance name
    pub name: String,
    /// Model name
    pub turbine_type: String,
    /// Hub height (m)
    pub hub_height: f64,
    /// Rotor radius (m)
    pub rotor_radius: f64,
    /// Cut-in wind speed (m/s)
    pub cut_in_speed: f64,
    /// Inverse-interpolated at rated power when `None`
    pub rated_speed: Option<f64>,
    /// Cut-out wind speed (m/s)
    pub cut_out_speed: f64,
    /// Thrust coefficient outside the envelope
    pub idle_thrust_coefficient: f64,
    /// Power and thrust tables
    pub curves: PerformanceCurves,
}

/// Immutable physical description of one wind turbine.
#[derive(Debug, Clone, PartialEq)]
pub struct TurbineSpec {
    name: String,
    turbine_type: String,
    hub_height: f64,
    rotor_radius: f64,
    cut_in_speed: f64,
    rated_speed: f64,
    cut_out_speed: f64,
    rated_power: f64,
    idle_thrust_coefficient: f64,
    curves: PerformanceCurves,
}

impl TurbineSpec {
    /// Validate parameters and build the spec.
    pub fn new(params: TurbineParams) -> FarmResult<Self> {
        let TurbineParams {
            name,
            turbine_type,
            hub_height,
            rotor_radius,
            cut_in_speed,
            rated_speed,
            cut_out_speed,
            idle_thrust_coefficient,
            curves,
        } = params;

        if !(hub_height > 0.0 && hub_height.is_finite()) {
            return Err(FarmError::Layout(format!("{}: hub height must be positive, got {}", name, hub_height)));
        }
        if !(rotor_radius > 0.0 && rotor_radius.is_finite()) {
            return Err(FarmError::Layout(format!("{}: rotor radius must be positive, got {}", name, rotor_radius)));
        }
        if !(idle_thrust_coefficient > 0.0 && idle_thrust_coefficient <= 1.0) {
            return Err(FarmError::Layout(format!(
                "{}: idle thrust coefficient must lie in (0, 1], got {}",
                name, idle_thrust_coefficient
            )));
        }

        for (label, curve) in [("power", curves.power()), ("thrust", curves.thrust())] {
            let (lo, hi) = curve.domain();
            if cut_in_speed < lo || cut_out_speed > hi {
                return Err(FarmError::Layout(format!(
                    "{}: operating envelope [{}, {}] exceeds the {} table domain [{}, {}]",
                    name, cut_in_speed, cut_out_speed, label, lo, hi
                )));
            }
        }

        let rated_power = curves.power().peak_value();
        let rated_speed = match rated_speed {
            Some(speed) => speed,
            None => curves.power().invert_up_to_peak(rated_power)?,
        };

        if !(cut_in_speed < rated_speed && rated_speed < cut_out_speed) {
            return Err(FarmError::Layout(format!(
                "{}: wind speeds must satisfy cut-in < rated < cut-out, got {} / {} / {}",
                name, cut_in_speed, rated_speed, cut_out_speed
            )));
        }

        Ok(Self {
            name,
            turbine_type,
            hub_height,
            rotor_radius,
            cut_in_speed,
            rated_speed,
            cut_out_speed,
            rated_power,
            idle_thrust_coefficient,
            curves,
        })
    }

    /// Build from a reference table of `[u (m/s), P (W), CT (-)]` rows.
    ///
    /// Cut-in and cut-out are the first and last tabulated speeds, rated power
    /// is the table maximum and the rated speed its inverse.
    pub fn from_reference_curves(
        name: &str,
        table: &[[f64; 3]],
        hub_height: f64,
        rotor_radius: f64,
        idle_thrust_coefficient: Option<f64>,
    ) -> FarmResult<Self> {
        let (first, last) = match (table.first(), table.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(FarmError::Layout(format!("{}: empty reference curve table", name))),
        };
        let power: Vec<[f64; 2]> = table.iter().map(|r| [r[0], r[1]]).collect();
        let thrust: Vec<[f64; 2]> = table.iter().map(|r| [r[0], r[2]]).collect();

        Self::new(TurbineParams {
            name: name.to_string(),
            turbine_type: name.to_string(),
            hub_height,
            rotor_radius,
            cut_in_speed: first[0],
            rated_speed: None,
            cut_out_speed: last[0],
            idle_thrust_coefficient: idle_thrust_coefficient.unwrap_or(DEFAULT_IDLE_THRUST),
            curves: PerformanceCurves::new(&power, &thrust, Interpolation::Linear)?,
        })
    }

    /// Build a placed turbine from its record and type template.
    ///
    /// Template power values are in kW and are scaled to W. The instance's
    /// idle thrust coefficient wins over the template's.
    pub fn from_description(instance: &TurbineDescription, template: &TurbineType) -> FarmResult<Self> {
        if instance.turbine_type != template.name {
            return Err(FarmError::Layout(format!(
                "{}: refers to turbine type {}, but template {} was supplied",
                instance.name, instance.turbine_type, template.name
            )));
        }

        let power: Vec<[f64; 2]> = template
            .power_curve
            .iter()
            .map(|r| [r[0], r[1] * KW_TO_W])
            .collect();
        let curves = PerformanceCurves::new(&power, &template.c_t_curve, Interpolation::Linear)?;

        let rated_power = template.rated_power * KW_TO_W;
        let table_peak = curves.power().peak_value();
        if (table_peak - rated_power).abs() > PEAK_TOLERANCE * rated_power.abs().max(1.0) {
            return Err(FarmError::Layout(format!(
                "{}: rated power {} W does not match the power curve maximum {} W",
                template.name, rated_power, table_peak
            )));
        }

        Self::new(TurbineParams {
            name: instance.name.clone(),
            turbine_type: template.name.clone(),
            hub_height: template.hub_height,
            rotor_radius: template.rotor_diameter / 2.0,
            cut_in_speed: template.cut_in_wind_speed,
            rated_speed: template.rated_wind_speed,
            cut_out_speed: template.cut_out_wind_speed,
            idle_thrust_coefficient: instance
                .c_t_idle
                .or(template.c_t_idle)
                .unwrap_or(DESCRIPTION_IDLE_THRUST),
            curves,
        })
    }

    /// Same spec under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// True when both specs describe the same machine, whatever their names.
    pub fn same_model_as(&self, other: &Self) -> bool {
        self.turbine_type == other.turbine_type
            && self.hub_height == other.hub_height
            && self.rotor_radius == other.rotor_radius
            && self.cut_in_speed == other.cut_in_speed
            && self.rated_speed == other.rated_speed
            && self.cut_out_speed == other.cut_out_speed
            && self.idle_thrust_coefficient == other.idle_thrust_coefficient
            && self.curves == other.curves
    }

    #[inline(always)]
    fn operating(&self, wind_speed: f64) -> bool {
        wind_speed >= self.cut_in_speed && wind_speed <= self.cut_out_speed
    }

    /// Power (W) at the undisturbed wind speed; 0 outside the envelope.
    pub fn power(&self, wind_speed: f64) -> f64 {
        if self.operating(wind_speed) {
            self.curves.power().evaluate_clamped(wind_speed)
        } else {
            0.0
        }
    }

    /// Elementwise [`TurbineSpec::power`].
    pub fn power_array<D: Dimension>(&self, wind_speed: &Array<f64, D>) -> Array<f64, D> {
        wind_speed.mapv(|u| self.power(u))
    }

    /// Wind speed producing `power` (W) on the rising branch; 0 outside
    /// `[0, rated_power]`.
    pub fn wind_speed_from_power(&self, power: f64) -> FarmResult<f64> {
        if !(0.0..=self.rated_power).contains(&power) {
            return Ok(0.0);
        }
        self.curves.power().invert_up_to_peak(power)
    }

    /// Thrust coefficient; the idle value outside the envelope.
    pub fn thrust_coefficient(&self, wind_speed: f64) -> f64 {
        if self.operating(wind_speed) {
            self.curves.thrust().evaluate_clamped(wind_speed)
        } else {
            self.idle_thrust_coefficient
        }
    }

    /// Elementwise [`TurbineSpec::thrust_coefficient`].
    pub fn thrust_coefficient_array<D: Dimension>(&self, wind_speed: &Array<f64, D>) -> Array<f64, D> {
        wind_speed.mapv(|u| self.thrust_coefficient(u))
    }

    /// Axial induction factor from actuator-disc theory.
    ///
    /// a = ½ (1 − √(1 − CT))
    pub fn induction_factor(thrust_coefficient: f64) -> FarmResult<f64> {
        if !(0.0..=1.0).contains(&thrust_coefficient) {
            return Err(FarmError::PhysicalRange(format!(
                "thrust coefficient {} is outside [0, 1]",
                thrust_coefficient
            )));
        }
        Ok(0.5 * (1.0 - (1.0 - thrust_coefficient).sqrt()))
    }

    /// Instance name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model name
    pub fn turbine_type(&self) -> &str {
        &self.turbine_type
    }

    /// Hub height (m)
    pub fn hub_height(&self) -> f64 {
        self.hub_height
    }

    /// Rotor radius (m)
    pub fn rotor_radius(&self) -> f64 {
        self.rotor_radius
    }

    /// Rotor diameter (m)
    pub fn rotor_diameter(&self) -> f64 {
        2.0 * self.rotor_radius
    }

    /// Cut-in wind speed (m/s)
    pub fn cut_in_speed(&self) -> f64 {
        self.cut_in_speed
    }

    /// Rated wind speed (m/s)
    pub fn rated_speed(&self) -> f64 {
        self.rated_speed
    }

    /// Cut-out wind speed (m/s)
    pub fn cut_out_speed(&self) -> f64 {
        self.cut_out_speed
    }

    /// Rated power (W)
    pub fn rated_power(&self) -> f64 {
        self.rated_power
    }

    /// Thrust coefficient outside the envelope
    pub fn idle_thrust_coefficient(&self) -> f64 {
        self.idle_thrust_coefficient
    }

    /// Power and thrust curves
    pub fn curves(&self) -> &PerformanceCurves {
        &self.curves
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::TurbineSpec;

    /// Vestas V80-like 2 MW offshore reference table `[u, P (W), CT]`.
    pub(crate) const V80_TABLE: [[f64; 3]; 22] = [
        [4.0, 66_600.0, 0.818],
        [5.0, 154_000.0, 0.806],
        [6.0, 282_000.0, 0.804],
        [7.0, 460_000.0, 0.805],
        [8.0, 696_000.0, 0.806],
        [9.0, 996_000.0, 0.807],
        [10.0, 1_341_000.0, 0.793],
        [11.0, 1_661_000.0, 0.739],
        [12.0, 1_866_000.0, 0.709],
        [13.0, 1_958_000.0, 0.409],
        [14.0, 1_988_000.0, 0.314],
        [15.0, 1_997_000.0, 0.249],
        [16.0, 2_000_000.0, 0.202],
        [17.0, 2_000_000.0, 0.167],
        [18.0, 2_000_000.0, 0.140],
        [19.0, 2_000_000.0, 0.119],
        [20.0, 2_000_000.0, 0.102],
        [21.0, 2_000_000.0, 0.088],
        [22.0, 2_000_000.0, 0.077],
        [23.0, 2_000_000.0, 0.067],
        [24.0, 2_000_000.0, 0.060],
        [25.0, 2_000_000.0, 0.053],
    ];

    pub(crate) fn v80() -> TurbineSpec {
        TurbineSpec::from_reference_curves("V80", &V80_TABLE, 70.0, 40.0, None).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{V80_TABLE, v80};
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn v80_type() -> TurbineType {
        TurbineType {
            name: "V80".to_string(),
            hub_height: 70.0,
            rotor_diameter: 80.0,
            cut_in_wind_speed: 4.0,
            cut_out_wind_speed: 25.0,
            rated_wind_speed: None,
            rated_power: 2000.0,
            power_curve: V80_TABLE.iter().map(|r| [r[0], r[1] / 1000.0]).collect(),
            c_t_curve: V80_TABLE.iter().map(|r| [r[0], r[2]]).collect(),
            c_t_idle: None,
        }
    }

    fn placed(name: &str, c_t_idle: Option<f64>) -> TurbineDescription {
        TurbineDescription {
            name: name.to_string(),
            turbine_type: "V80".to_string(),
            position: [0.0, 0.0],
            c_t_idle,
        }
    }

    #[test]
    fn test_reference_envelope() {
        let wt = v80();
        assert_eq!(wt.cut_in_speed(), 4.0);
        assert_eq!(wt.cut_out_speed(), 25.0);
        assert_eq!(wt.rated_power(), 2_000_000.0);
        assert_relative_eq!(wt.rated_speed(), 16.0);
        assert_eq!(wt.idle_thrust_coefficient(), DEFAULT_IDLE_THRUST);
        assert_eq!(wt.rotor_diameter(), 80.0);
    }

    #[test]
    fn test_power_zero_outside_envelope() {
        let wt = v80();
        assert_eq!(wt.power(3.99), 0.0);
        assert_eq!(wt.power(25.01), 0.0);
        assert_eq!(wt.power(-1.0), 0.0);
        assert_eq!(wt.power(f64::NAN), 0.0);
    }

    #[test]
    fn test_power_matches_table_samples() {
        let wt = v80();
        for row in V80_TABLE.iter() {
            assert_relative_eq!(wt.power(row[0]), row[1]);
            assert_relative_eq!(wt.thrust_coefficient(row[0]), row[2]);
        }
        assert_relative_eq!(wt.power(10.5), 0.5 * (1_341_000.0 + 1_661_000.0));
    }

    #[test]
    fn test_power_array_is_elementwise() {
        let wt = v80();
        let u = array![[3.0, 8.0], [16.0, 30.0]];
        let p = wt.power_array(&u);
        assert_eq!(p.shape(), &[2, 2]);
        assert_eq!(p[[0, 0]], 0.0);
        assert_relative_eq!(p[[0, 1]], 696_000.0);
        assert_relative_eq!(p[[1, 0]], 2_000_000.0);
        assert_eq!(p[[1, 1]], 0.0);
    }

    #[test]
    fn test_wind_speed_from_power() {
        let wt = v80();
        for u in [4.0, 6.5, 9.25, 12.0, 15.5, 16.0] {
            assert_relative_eq!(wt.wind_speed_from_power(wt.power(u)).unwrap(), u, epsilon = 1e-9);
        }
        assert_eq!(wt.wind_speed_from_power(-5.0).unwrap(), 0.0);
        assert_eq!(wt.wind_speed_from_power(2_500_000.0).unwrap(), 0.0);
        // Below the first tabulated power the inverse is undefined.
        assert!(matches!(wt.wind_speed_from_power(1000.0), Err(FarmError::Domain(_))));
    }

    #[test]
    fn test_wind_speed_from_power_with_pchip_curves() {
        let power: Vec<[f64; 2]> = V80_TABLE.iter().map(|r| [r[0], r[1]]).collect();
        let thrust: Vec<[f64; 2]> = V80_TABLE.iter().map(|r| [r[0], r[2]]).collect();
        let wt = TurbineSpec::new(TurbineParams {
            name: "V80-pchip".to_string(),
            turbine_type: "V80".to_string(),
            hub_height: 70.0,
            rotor_radius: 40.0,
            cut_in_speed: 4.0,
            rated_speed: None,
            cut_out_speed: 25.0,
            idle_thrust_coefficient: DEFAULT_IDLE_THRUST,
            curves: PerformanceCurves::new(&power, &thrust, Interpolation::Pchip).unwrap(),
        })
        .unwrap();
        assert_relative_eq!(wt.rated_speed(), 16.0);
        for u in [4.0, 5.3, 7.0, 7.7, 10.5, 13.2, 15.6] {
            assert_relative_eq!(wt.wind_speed_from_power(wt.power(u)).unwrap(), u, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_idle_thrust_outside_envelope() {
        let wt = v80();
        assert_eq!(wt.thrust_coefficient(2.0), DEFAULT_IDLE_THRUST);
        assert_eq!(wt.thrust_coefficient(30.0), DEFAULT_IDLE_THRUST);
        let ct = wt.thrust_coefficient_array(&array![0.0, 10.0, 26.0]);
        assert_eq!(ct[0], DEFAULT_IDLE_THRUST);
        assert_relative_eq!(ct[1], 0.793);
        assert_eq!(ct[2], DEFAULT_IDLE_THRUST);
    }

    #[test]
    fn test_induction_factor() {
        assert_relative_eq!(TurbineSpec::induction_factor(0.0).unwrap(), 0.0);
        assert_relative_eq!(TurbineSpec::induction_factor(1.0).unwrap(), 0.5);
        assert_relative_eq!(TurbineSpec::induction_factor(0.75).unwrap(), 0.25);
        assert!(matches!(TurbineSpec::induction_factor(1.2), Err(FarmError::PhysicalRange(_))));
        assert!(matches!(TurbineSpec::induction_factor(f64::NAN), Err(FarmError::PhysicalRange(_))));
    }

    #[test]
    fn test_from_description_scales_power() {
        let wt = TurbineSpec::from_description(&placed("wt1", None), &v80_type()).unwrap();
        assert_eq!(wt.name(), "wt1");
        assert_eq!(wt.turbine_type(), "V80");
        assert_relative_eq!(wt.power(8.0), 696_000.0);
        assert_relative_eq!(wt.rated_speed(), 16.0);
        assert_eq!(wt.idle_thrust_coefficient(), DESCRIPTION_IDLE_THRUST);
        assert!(!wt.same_model_as(&v80()));
    }

    #[test]
    fn test_instance_overrides_idle_thrust() {
        let mut template = v80_type();
        template.c_t_idle = Some(0.06);
        let from_type = TurbineSpec::from_description(&placed("wt1", None), &template).unwrap();
        assert_eq!(from_type.idle_thrust_coefficient(), 0.06);

        let overridden = TurbineSpec::from_description(&placed("wt2", Some(0.09)), &template).unwrap();
        assert_eq!(overridden.idle_thrust_coefficient(), 0.09);
        assert_eq!(overridden.thrust_coefficient(1.0), 0.09);
    }

    #[test]
    fn test_description_rejects_rated_power_mismatch() {
        let mut template = v80_type();
        template.rated_power = 3000.0;
        let err = TurbineSpec::from_description(&placed("wt1", None), &template);
        assert!(matches!(err, Err(FarmError::Layout(_))));
    }

    #[test]
    fn test_description_rejects_wrong_template() {
        let mut instance = placed("wt1", None);
        instance.turbine_type = "SWT-3.6".to_string();
        assert!(matches!(
            TurbineSpec::from_description(&instance, &v80_type()),
            Err(FarmError::Layout(_))
        ));
    }

    #[test]
    fn test_envelope_must_fit_tables() {
        let curves = v80().curves().clone();
        let err = TurbineSpec::new(TurbineParams {
            name: "wide".to_string(),
            turbine_type: "wide".to_string(),
            hub_height: 70.0,
            rotor_radius: 40.0,
            cut_in_speed: 3.0,
            rated_speed: Some(16.0),
            cut_out_speed: 25.0,
            idle_thrust_coefficient: 0.05,
            curves,
        });
        assert!(matches!(err, Err(FarmError::Layout(_))));
    }

    #[test]
    fn test_renamed_keeps_model() {
        let a = v80();
        let b = a.renamed("wt7");
        assert_eq!(b.name(), "wt7");
        assert!(a.same_model_as(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_description_deserializes() {
        let json = r#"{"name": "wt3", "turbine_type": "V80", "position": [500.0, 0.0]}"#;
        let d: TurbineDescription = serde_json::from_str(json).unwrap();
        assert_eq!(d.position, [500.0, 0.0]);
        assert_eq!(d.c_t_idle, None);
    }
}
