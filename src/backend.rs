//! Wake backend identifiers, projected arguments and the backend contract.
//!
//! Every backend declares the fields it consumes ([`BackendId::required_fields`]).
//! The dispatcher projects its typed settings onto those fields as a
//! [`BackendArgs`] map and hands it to a registered [`WakeBackend`]. Backends
//! answer with power (kW), thrust force (N) and effective wind speed (m/s).

use std::collections::BTreeMap;
use std::error::Error;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayD, IxDyn};

use crate::constants::{KW_TO_W, wake_defaults};
use crate::curve::{CurveInterpolator, Interpolation};
use crate::error::FarmError;
use crate::farm::TurbineArray;
use crate::turbine::TurbineSpec;

/// Whether a backend evaluates one flow case or a batch per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseLayout {
    /// Evaluates exactly one flow case per call
    Single,
    /// Evaluates a (cases × N) batch per call
    Batch,
}

/// Closed set of wake backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendId {
    /// Reference Python GCL, first revision
    PyGclV0,
    /// Reference Python GCL, second revision
    PyGclV1,
    /// Compiled GCL with per-turbine availability
    FortGclAv,
    /// Compiled GCL over a batch of flow cases
    FortGcl,
    /// Compiled GCL for a single flow case
    FortGclS,
}

impl BackendId {
    /// Every backend, in declaration order.
    pub const ALL: [BackendId; 5] = [
        BackendId::PyGclV0,
        BackendId::PyGclV1,
        BackendId::FortGclAv,
        BackendId::FortGcl,
        BackendId::FortGclS,
    ];

    /// Version name as accepted by [`BackendId::from_str`](std::str::FromStr).
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::PyGclV0 => "py_gcl_v0",
            BackendId::PyGclV1 => "py_gcl_v1",
            BackendId::FortGclAv => "fort_gcl_av",
            BackendId::FortGcl => "fort_gcl",
            BackendId::FortGclS => "fort_gcl_s",
        }
    }

    /// Known version names, sorted.
    pub fn versions() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Self::ALL.iter().map(BackendId::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Declared input fields, in the backend's own order.
    pub fn required_fields(&self) -> &'static [SettingKey] {
        use SettingKey::*;
        match self {
            BackendId::PyGclV0 => &[
                Farm,
                WindSpeed,
                WindDirection,
                TurbulenceIntensity,
                RoughnessLength,
                WakeZonePoints,
                Superposition,
                ExpansionCoefficients,
            ],
            BackendId::PyGclV1 => &[
                Farm,
                WindSpeed,
                WindDirection,
                TurbulenceIntensity,
                RoughnessLength,
                ShearExponent,
                Inflow,
                WakeZonePoints,
                Superposition,
                ExpansionCoefficients,
            ],
            BackendId::FortGclAv => &[
                OffsetX,
                OffsetY,
                OffsetZ,
                RotorDiameters,
                PowerCurves,
                ThrustCurves,
                WindSpeed,
                WindDirection,
                TurbulenceIntensity,
                Availability,
                A1,
                A2,
                A3,
                A4,
                B1,
                B2,
                WakeZonePoints,
                Density,
                CutInSpeeds,
                CutOutSpeeds,
                IdleThrust,
            ],
            BackendId::FortGcl | BackendId::FortGclS => &[
                OffsetX,
                OffsetY,
                OffsetZ,
                RotorDiameters,
                PowerCurves,
                ThrustCurves,
                WindSpeed,
                WindDirection,
                TurbulenceIntensity,
                A1,
                A2,
                A3,
                A4,
                B1,
                B2,
                WakeZonePoints,
                Density,
                CutInSpeeds,
                CutOutSpeeds,
                IdleThrust,
            ],
        }
    }

    /// Compiled backends only accept lowercase argument names.
    pub fn lowercase_only(&self) -> bool {
        matches!(self, BackendId::FortGclAv | BackendId::FortGcl | BackendId::FortGclS)
    }

    /// Whether one call evaluates a single case or a batch.
    pub fn case_layout(&self) -> CaseLayout {
        match self {
            BackendId::FortGclS => CaseLayout::Single,
            _ => CaseLayout::Batch,
        }
    }

    /// Argument name of `key` as this backend receives it.
    pub fn field_name(&self, key: SettingKey) -> String {
        if self.lowercase_only() {
            key.name().to_lowercase()
        } else {
            key.name().to_string()
        }
    }
}

impl FromStr for BackendId {
    type Err = FarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| {
                FarmError::Configuration(format!(
                    "unknown version: {}, one of [{}]",
                    s,
                    BackendId::versions().join("|")
                ))
            })
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single backend input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Farm handle (`WF`)
    Farm,
    /// Wind speed (`WS`)
    WindSpeed,
    /// Wind direction (`WD`)
    WindDirection,
    /// Turbulence intensity (`TI`)
    TurbulenceIntensity,
    /// Roughness length (`z0`)
    RoughnessLength,
    /// Shear exponent (`alpha`)
    ShearExponent,
    /// Inflow profile (`inflow`)
    Inflow,
    /// Wake zone points (`NG`)
    WakeZonePoints,
    /// Wake superposition (`sup`)
    Superposition,
    /// Expansion coefficients (`pars`)
    ExpansionCoefficients,
    /// Global x offsets (`x_g`)
    OffsetX,
    /// Global y offsets (`y_g`)
    OffsetY,
    /// Global z offsets (`z_g`)
    OffsetZ,
    /// Rotor diameters (`dt`)
    RotorDiameters,
    /// Power tables in kW (`p_c`)
    PowerCurves,
    /// Thrust coefficient tables (`ct_c`)
    ThrustCurves,
    /// Availability (`av`)
    Availability,
    /// Expansion coefficient `a1`
    A1,
    /// Expansion coefficient `a2`
    A2,
    /// Expansion coefficient `a3`
    A3,
    /// Expansion coefficient `a4`
    A4,
    /// Expansion coefficient `b1`
    B1,
    /// Expansion coefficient `b2`
    B2,
    /// Air density (`rho`)
    Density,
    /// Cut-in speeds (`ws_ci`)
    CutInSpeeds,
    /// Cut-out speeds (`ws_co`)
    CutOutSpeeds,
    /// Idle thrust coefficients (`ct_idle`)
    IdleThrust,
}

impl SettingKey {
    /// Declared argument name.
    pub fn name(&self) -> &'static str {
        match self {
            SettingKey::Farm => "WF",
            SettingKey::WindSpeed => "WS",
            SettingKey::WindDirection => "WD",
            SettingKey::TurbulenceIntensity => "TI",
            SettingKey::RoughnessLength => "z0",
            SettingKey::ShearExponent => "alpha",
            SettingKey::Inflow => "inflow",
            SettingKey::WakeZonePoints => "NG",
            SettingKey::Superposition => "sup",
            SettingKey::ExpansionCoefficients => "pars",
            SettingKey::OffsetX => "x_g",
            SettingKey::OffsetY => "y_g",
            SettingKey::OffsetZ => "z_g",
            SettingKey::RotorDiameters => "dt",
            SettingKey::PowerCurves => "p_c",
            SettingKey::ThrustCurves => "ct_c",
            SettingKey::Availability => "av",
            SettingKey::A1 => "a1",
            SettingKey::A2 => "a2",
            SettingKey::A3 => "a3",
            SettingKey::A4 => "a4",
            SettingKey::B1 => "b1",
            SettingKey::B2 => "b2",
            SettingKey::Density => "rho",
            SettingKey::CutInSpeeds => "ws_ci",
            SettingKey::CutOutSpeeds => "ws_co",
            SettingKey::IdleThrust => "ct_idle",
        }
    }

    /// Position in the expansion coefficient array, for `a1`..`b2`.
    pub fn expansion_index(&self) -> Option<usize> {
        match self {
            SettingKey::A1 => Some(0),
            SettingKey::A2 => Some(1),
            SettingKey::A3 => Some(2),
            SettingKey::A4 => Some(3),
            SettingKey::B1 => Some(4),
            SettingKey::B2 => Some(5),
            _ => None,
        }
    }

    /// Whether the value comes from a configured farm.
    pub fn needs_farm(&self) -> bool {
        matches!(
            self,
            SettingKey::Farm
                | SettingKey::OffsetX
                | SettingKey::OffsetY
                | SettingKey::OffsetZ
                | SettingKey::RotorDiameters
                | SettingKey::PowerCurves
                | SettingKey::ThrustCurves
                | SettingKey::Availability
                | SettingKey::CutInSpeeds
                | SettingKey::CutOutSpeeds
                | SettingKey::IdleThrust
        )
    }
}

/// One projected argument value.
#[derive(Debug, Clone)]
pub enum ArgValue {
    /// Shared farm handle
    Farm(Arc<TurbineArray>),
    /// Real scalar
    Scalar(f64),
    /// Count
    Integer(usize),
    /// Enumerated option name
    Text(&'static str),
    /// Per-turbine or per-case vector
    Vector(Array1<f64>),
    /// Dense matrix
    Matrix(Array2<f64>),
    /// Per-turbine tables
    Tables(Vec<Array2<f64>>),
}

impl ArgValue {
    /// The farm handle, if this is one.
    pub fn as_farm(&self) -> Option<&Arc<TurbineArray>> {
        match self {
            ArgValue::Farm(farm) => Some(farm),
            _ => None,
        }
    }

    /// The scalar, if this is one.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ArgValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// The count, if this is one.
    pub fn as_integer(&self) -> Option<usize> {
        match self {
            ArgValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// The option name, if this is one.
    pub fn as_text(&self) -> Option<&'static str> {
        match self {
            ArgValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The vector, if this is one.
    pub fn as_vector(&self) -> Option<&Array1<f64>> {
        match self {
            ArgValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// The matrix, if this is one.
    pub fn as_matrix(&self) -> Option<&Array2<f64>> {
        match self {
            ArgValue::Matrix(v) => Some(v),
            _ => None,
        }
    }

    /// The tables, if this is one.
    pub fn as_tables(&self) -> Option<&[Array2<f64>]> {
        match self {
            ArgValue::Tables(v) => Some(v),
            _ => None,
        }
    }

    /// Scalar or vector as a vector.
    pub fn to_vector(&self) -> Option<Array1<f64>> {
        match self {
            ArgValue::Scalar(v) => Some(Array1::from_elem(1, *v)),
            ArgValue::Vector(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Farm(farm) => write!(f, "<farm of {} turbines>", farm.len()),
            ArgValue::Scalar(v) => write!(f, "{}", v),
            ArgValue::Integer(v) => write!(f, "{}", v),
            ArgValue::Text(v) => write!(f, "{:?}", v),
            ArgValue::Vector(v) if v.len() <= 6 => write!(f, "{}", v),
            ArgValue::Vector(v) => write!(f, "<vector of {}>", v.len()),
            ArgValue::Matrix(m) => write!(f, "<matrix {}x{}>", m.nrows(), m.ncols()),
            ArgValue::Tables(t) => write!(f, "<{} tables>", t.len()),
        }
    }
}

/// Named arguments handed to a backend.
#[derive(Debug, Clone, Default)]
pub struct BackendArgs {
    values: BTreeMap<String, ArgValue>,
}

impl BackendArgs {
    /// Empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    /// Value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Bound names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no name is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for BackendArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (k, (name, value)) in self.values.iter().enumerate() {
            if k > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        f.write_str("}")
    }
}

/// Raw backend output: power (kW), thrust force (N), effective wind speed
/// (m/s), each shaped (cases × N) or (N).
#[derive(Debug, Clone, PartialEq)]
pub struct BackendOutput {
    /// kW
    pub power: ArrayD<f64>,
    /// N
    pub thrust: ArrayD<f64>,
    /// m/s
    pub wind_speed: ArrayD<f64>,
}

/// Error raised by a backend implementation.
pub type BackendFailure = Box<dyn Error + Send + Sync>;

/// An interchangeable wake evaluation engine.
pub trait WakeBackend {
    /// Evaluate the version `id` on already projected arguments.
    fn invoke(&self, id: BackendId, args: &BackendArgs) -> Result<BackendOutput, BackendFailure>;

    /// Rotor disc area used to recover the thrust coefficient from the
    /// returned thrust force.
    fn rotor_area(&self, rotor_diameter: f64) -> f64 {
        PI / 4.0 * rotor_diameter * rotor_diameter
    }
}

/// Reference backend without any wake deficit.
///
/// Every turbine sees the ambient wind speed. Useful as a baseline and to
/// exercise the dispatcher contract end to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeStreamBackend;

/// Per-turbine operating model read from the projected arguments.
enum RotorModel<'a> {
    Spec(&'a TurbineSpec),
    Tables {
        power_kw: CurveInterpolator,
        thrust: CurveInterpolator,
        cut_in: f64,
        cut_out: f64,
        idle: f64,
    },
}

impl RotorModel<'_> {
    fn operating(&self, u: f64) -> bool {
        match self {
            RotorModel::Spec(wt) => u >= wt.cut_in_speed() && u <= wt.cut_out_speed(),
            RotorModel::Tables { cut_in, cut_out, .. } => u >= *cut_in && u <= *cut_out,
        }
    }

    fn power_kw(&self, u: f64) -> f64 {
        match self {
            RotorModel::Spec(wt) => wt.power(u) / KW_TO_W,
            RotorModel::Tables { power_kw, .. } if self.operating(u) => power_kw.evaluate_clamped(u),
            RotorModel::Tables { .. } => 0.0,
        }
    }

    fn thrust_coefficient(&self, u: f64) -> f64 {
        match self {
            RotorModel::Spec(wt) => wt.thrust_coefficient(u),
            RotorModel::Tables { thrust, .. } if self.operating(u) => thrust.evaluate_clamped(u),
            RotorModel::Tables { idle, .. } => *idle,
        }
    }

    fn idle_thrust_coefficient(&self) -> f64 {
        match self {
            RotorModel::Spec(wt) => wt.idle_thrust_coefficient(),
            RotorModel::Tables { idle, .. } => *idle,
        }
    }
}

fn missing(name: &str) -> BackendFailure {
    format!("missing or mistyped argument {}", name).into()
}

impl FreeStreamBackend {
    fn rotors<'a>(&self, args: &'a BackendArgs) -> Result<(Vec<RotorModel<'a>>, Array1<f64>), BackendFailure> {
        if let Some(farm) = args.get("WF").and_then(ArgValue::as_farm) {
            let rotors = farm.turbines().iter().map(RotorModel::Spec).collect();
            return Ok((rotors, farm.rotor_diameters()));
        }

        let power = args.get("p_c").and_then(ArgValue::as_tables).ok_or_else(|| missing("p_c"))?;
        let thrust = args.get("ct_c").and_then(ArgValue::as_tables).ok_or_else(|| missing("ct_c"))?;
        let diameters = args.get("dt").and_then(ArgValue::as_vector).ok_or_else(|| missing("dt"))?;
        let cut_in = args.get("ws_ci").and_then(ArgValue::as_vector).ok_or_else(|| missing("ws_ci"))?;
        let cut_out = args.get("ws_co").and_then(ArgValue::as_vector).ok_or_else(|| missing("ws_co"))?;
        let idle = args.get("ct_idle").and_then(ArgValue::as_vector).ok_or_else(|| missing("ct_idle"))?;

        let n = diameters.len();
        if [power.len(), thrust.len(), cut_in.len(), cut_out.len(), idle.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(format!("per-turbine inputs disagree on the turbine count {}", n).into());
        }

        let mut rotors = Vec::with_capacity(n);
        for i in 0..n {
            rotors.push(RotorModel::Tables {
                power_kw: table_curve(&power[i])?,
                thrust: table_curve(&thrust[i])?,
                cut_in: cut_in[i],
                cut_out: cut_out[i],
                idle: idle[i],
            });
        }
        Ok((rotors, diameters.clone()))
    }
}

fn table_curve(table: &Array2<f64>) -> Result<CurveInterpolator, BackendFailure> {
    let x: Vec<f64> = table.column(0).to_vec();
    let y: Vec<f64> = table.column(1).to_vec();
    Ok(CurveInterpolator::new(&x, &y, Interpolation::Linear)?)
}

impl WakeBackend for FreeStreamBackend {
    fn invoke(&self, id: BackendId, args: &BackendArgs) -> Result<BackendOutput, BackendFailure> {
        let (rotors, diameters) = self.rotors(args)?;
        let n = rotors.len();

        let ws_name = id.field_name(SettingKey::WindSpeed);
        let wind_speeds = args
            .get(&ws_name)
            .and_then(ArgValue::to_vector)
            .ok_or_else(|| missing(&ws_name))?;
        let cases = wind_speeds.len();

        let availability = match args.get("av") {
            Some(value) => value.as_matrix().cloned().ok_or_else(|| missing("av"))?,
            None => Array2::ones((cases, n)),
        };
        if availability.dim() != (cases, n) {
            return Err(format!(
                "availability is {:?}, expected ({}, {})",
                availability.dim(),
                cases,
                n
            )
            .into());
        }

        let rho = args
            .get("rho")
            .and_then(ArgValue::as_scalar)
            .unwrap_or(wake_defaults::AIR_DENSITY);

        let mut power = Array2::<f64>::zeros((cases, n));
        let mut thrust = Array2::<f64>::zeros((cases, n));
        let mut wind_speed = Array2::<f64>::zeros((cases, n));
        for (c, &u) in wind_speeds.iter().enumerate() {
            for (i, rotor) in rotors.iter().enumerate() {
                let av = availability[[c, i]];
                let ct = if av > 0.0 {
                    rotor.thrust_coefficient(u)
                } else {
                    rotor.idle_thrust_coefficient()
                };
                power[[c, i]] = av * rotor.power_kw(u);
                thrust[[c, i]] = 0.5 * rho * self.rotor_area(diameters[i]) * ct * u * u;
                wind_speed[[c, i]] = u;
            }
        }

        let shape = match id.case_layout() {
            CaseLayout::Single => IxDyn(&[n]),
            CaseLayout::Batch => IxDyn(&[cases, n]),
        };
        let reshape = |a: Array2<f64>| -> Result<ArrayD<f64>, BackendFailure> {
            Ok(a.into_shape(shape.clone())?)
        };
        Ok(BackendOutput {
            power: reshape(power)?,
            thrust: reshape(thrust)?,
            wind_speed: reshape(wind_speed)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::farm::fixtures::column_farm;
    use crate::settings::FarmInputs;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_versions_are_sorted() {
        assert_eq!(
            BackendId::versions(),
            vec!["fort_gcl", "fort_gcl_av", "fort_gcl_s", "py_gcl_v0", "py_gcl_v1"]
        );
    }

    #[test]
    fn test_parse_round_trip_and_unknown() {
        for id in BackendId::ALL {
            assert_eq!(id.as_str().parse::<BackendId>().unwrap(), id);
        }
        match "unknown".parse::<BackendId>() {
            Err(FarmError::Configuration(msg)) => {
                assert!(msg.contains("unknown version"));
                assert!(msg.contains("fort_gcl_av"));
                assert!(msg.contains("py_gcl_v1"));
            }
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_declared_field_names() {
        let names: Vec<String> = BackendId::PyGclV1
            .required_fields()
            .iter()
            .map(|&k| BackendId::PyGclV1.field_name(k))
            .collect();
        assert_eq!(names, vec!["WF", "WS", "WD", "TI", "z0", "alpha", "inflow", "NG", "sup", "pars"]);

        let fort_s: Vec<String> = BackendId::FortGclS
            .required_fields()
            .iter()
            .map(|&k| BackendId::FortGclS.field_name(k))
            .collect();
        assert!(fort_s.contains(&"ws".to_string()));
        assert!(fort_s.contains(&"ng".to_string()));
        assert!(!fort_s.contains(&"av".to_string()));
        assert_eq!(BackendId::FortGclAv.required_fields().len(), 21);
        assert_eq!(BackendId::FortGcl.required_fields().len(), 20);
    }

    #[test]
    fn test_case_layouts() {
        assert_eq!(BackendId::FortGclS.case_layout(), CaseLayout::Single);
        assert_eq!(BackendId::FortGclAv.case_layout(), CaseLayout::Batch);
        assert!(BackendId::FortGcl.lowercase_only());
        assert!(!BackendId::PyGclV0.lowercase_only());
    }

    #[test]
    fn test_default_rotor_area() {
        assert_relative_eq!(FreeStreamBackend.rotor_area(2.0), PI);
    }

    #[test]
    fn test_args_display_summarizes_shapes() {
        let mut args = BackendArgs::new();
        args.insert("rho", ArgValue::Scalar(1.225));
        args.insert("av", ArgValue::Matrix(Array2::ones((2, 3))));
        args.insert("ws", ArgValue::Vector(array![8.0, 9.0]));
        assert_eq!(args.to_string(), "{av: <matrix 2x3>, rho: 1.225, ws: [8, 9]}");
    }

    #[test]
    fn test_free_stream_from_tables() {
        let inputs = FarmInputs::from_farm(Arc::new(column_farm()));
        let mut args = BackendArgs::new();
        args.insert("p_c", ArgValue::Tables(inputs.power_tables.clone()));
        args.insert("ct_c", ArgValue::Tables(inputs.thrust_tables.clone()));
        args.insert("dt", ArgValue::Vector(inputs.rotor_diameters.clone()));
        args.insert("ws_ci", ArgValue::Vector(inputs.cut_in_speeds.clone()));
        args.insert("ws_co", ArgValue::Vector(inputs.cut_out_speeds.clone()));
        args.insert("ct_idle", ArgValue::Vector(inputs.idle_thrust_coefficients.clone()));
        args.insert("ws", ArgValue::Vector(array![8.0, 30.0]));
        args.insert("av", ArgValue::Matrix(array![[1.0, 0.0, 1.0], [1.0, 1.0, 1.0]]));
        args.insert("rho", ArgValue::Scalar(1.225));

        let out = FreeStreamBackend.invoke(BackendId::FortGclAv, &args).unwrap();
        assert_eq!(out.power.shape(), &[2, 3]);
        assert_relative_eq!(out.power[[0, 0]], 696.0);
        assert_eq!(out.power[[0, 1]], 0.0);
        assert_eq!(out.power[[1, 2]], 0.0);
        assert_eq!(out.wind_speed[[1, 0]], 30.0);

        let area = PI / 4.0 * 80.0 * 80.0;
        assert_relative_eq!(out.thrust[[0, 0]], 0.5 * 1.225 * area * 0.806 * 64.0, max_relative = 1e-12);
        assert_relative_eq!(out.thrust[[0, 1]], 0.5 * 1.225 * area * 0.053 * 64.0, max_relative = 1e-12);
    }

    #[test]
    fn test_free_stream_from_farm_handle() {
        let mut args = BackendArgs::new();
        args.insert("WF", ArgValue::Farm(Arc::new(column_farm())));
        args.insert("WS", ArgValue::Vector(array![10.0]));
        let out = FreeStreamBackend.invoke(BackendId::PyGclV1, &args).unwrap();
        assert_eq!(out.power.shape(), &[1, 3]);
        assert_relative_eq!(out.power[[0, 2]], 1341.0);
    }

    #[test]
    fn test_free_stream_single_case_is_flat() {
        let mut args = BackendArgs::new();
        args.insert("WF", ArgValue::Farm(Arc::new(column_farm())));
        args.insert("ws", ArgValue::Scalar(10.0));
        let out = FreeStreamBackend.invoke(BackendId::FortGclS, &args).unwrap();
        assert_eq!(out.power.shape(), &[3]);
    }

    #[test]
    fn test_free_stream_reports_missing_inputs() {
        let mut args = BackendArgs::new();
        args.insert("ws", ArgValue::Vector(array![10.0]));
        let err = FreeStreamBackend.invoke(BackendId::FortGcl, &args).unwrap_err();
        assert!(err.to_string().contains("p_c"));
    }
}
