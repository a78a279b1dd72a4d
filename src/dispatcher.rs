//! Wake backend dispatcher.
//!
//! The dispatcher owns the merged [`WakeSettings`], a registry of
//! [`WakeBackend`] implementations keyed by [`BackendId`], and the result of
//! the last successful evaluation. One evaluation is:
//!
//! 1. merge the query's settings update (rejected as a whole when invalid),
//! 2. promote scalar flow inputs and broadcast availability,
//! 3. project the settings onto the backend's declared fields,
//! 4. invoke the backend,
//! 5. recover the thrust coefficient, convert kW to W and drop the case
//!    axis when exactly one flow case was evaluated.
//!
//! A backend failure moves the dispatcher to [`DispatcherState::Error`] and
//! clears the last result. The next successful configure leaves the error
//! state.

use std::collections::HashMap;

use ndarray::{Array1, Array2, ArrayD, Axis};

use crate::backend::{
    ArgValue, BackendArgs, BackendId, BackendOutput, CaseLayout, FreeStreamBackend, SettingKey, WakeBackend,
};
use crate::constants::KW_TO_W;
use crate::error::{FarmError, FarmResult};
use crate::settings::{FarmInputs, SettingsUpdate, WakeSettings};

/// Lifecycle of a [`WakeBackendDispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// No backend version selected yet
    Unset,
    /// A backend version is selected
    Configured,
    /// The last invocation failed
    Error,
}

/// Wind speed, direction or turbulence intensity: one case or a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowInput {
    /// One flow case
    Scalar(f64),
    /// One value per flow case
    Batch(Array1<f64>),
}

impl FlowInput {
    /// Values as a vector; a scalar becomes length 1.
    pub fn to_vector(&self) -> Array1<f64> {
        match self {
            FlowInput::Scalar(v) => Array1::from_elem(1, *v),
            FlowInput::Batch(v) => v.clone(),
        }
    }
}

impl From<f64> for FlowInput {
    fn from(v: f64) -> Self {
        FlowInput::Scalar(v)
    }
}

impl From<Array1<f64>> for FlowInput {
    fn from(v: Array1<f64>) -> Self {
        FlowInput::Batch(v)
    }
}

impl From<Vec<f64>> for FlowInput {
    fn from(v: Vec<f64>) -> Self {
        FlowInput::Batch(Array1::from_vec(v))
    }
}

/// Turbine availability in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    /// Length N, repeated for every flow case
    PerTurbine(Array1<f64>),
    /// cases × N
    PerCase(Array2<f64>),
}

/// One wake evaluation request.
#[derive(Debug, Clone)]
pub struct WakeQuery {
    /// Ambient wind speed (m/s)
    pub wind_speed: FlowInput,
    /// Meteorological direction (deg)
    pub wind_direction: FlowInput,
    /// Ambient turbulence intensity (-)
    pub turbulence_intensity: FlowInput,
    /// Turbine availability, all ones when absent
    pub availability: Option<Availability>,
    /// Settings merged before this evaluation
    pub settings: SettingsUpdate,
}

impl WakeQuery {
    /// Query without availability or setting overrides.
    pub fn new(
        wind_speed: impl Into<FlowInput>,
        wind_direction: impl Into<FlowInput>,
        turbulence_intensity: impl Into<FlowInput>,
    ) -> Self {
        Self {
            wind_speed: wind_speed.into(),
            wind_direction: wind_direction.into(),
            turbulence_intensity: turbulence_intensity.into(),
            availability: None,
            settings: SettingsUpdate::default(),
        }
    }

    /// Attach turbine availability.
    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = Some(availability);
        self
    }

    /// Attach setting overrides.
    pub fn with_settings(mut self, settings: SettingsUpdate) -> Self {
        self.settings = settings;
        self
    }
}

/// Per-turbine results: 1-D (N) for a single case, (cases × N) otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct WakeResult {
    /// W
    pub power: ArrayD<f64>,
    /// m/s
    pub effective_wind_speed: ArrayD<f64>,
    /// Thrust coefficient (-)
    pub thrust_coefficient: ArrayD<f64>,
}

impl WakeResult {
    /// Number of flow cases covered.
    pub fn num_cases(&self) -> usize {
        if self.is_single_case() {
            1
        } else {
            self.power.shape()[0]
        }
    }

    /// Whether the result has no case axis.
    pub fn is_single_case(&self) -> bool {
        self.power.ndim() == 1
    }
}

/// Flow inputs promoted to per-case vectors.
#[derive(Debug, Clone)]
struct NormalizedFlow {
    wind_speed: Array1<f64>,
    wind_direction: Array1<f64>,
    turbulence_intensity: Array1<f64>,
    availability: Array2<f64>,
}

impl NormalizedFlow {
    fn new(query: &WakeQuery, num_turbines: usize) -> FarmResult<Self> {
        let wind_speed = query.wind_speed.to_vector();
        let cases = wind_speed.len();
        if cases == 0 {
            return Err(FarmError::Configuration("empty wind speed batch".to_string()));
        }
        let wind_direction = per_case("wind direction", &query.wind_direction, cases)?;
        let turbulence_intensity = per_case("turbulence intensity", &query.turbulence_intensity, cases)?;

        let availability = match &query.availability {
            None => Array2::ones((cases, num_turbines)),
            Some(Availability::PerTurbine(av)) if av.len() == num_turbines => {
                av.broadcast((cases, num_turbines))
                    .map(|view| view.to_owned())
                    .ok_or_else(|| FarmError::Configuration("availability cannot be broadcast".to_string()))?
            }
            Some(Availability::PerCase(av)) if av.dim() == (cases, num_turbines) => av.clone(),
            Some(other) => {
                return Err(FarmError::Configuration(format!(
                    "availability {:?} does not fit {} cases of {} turbines",
                    other, cases, num_turbines
                )));
            }
        };
        if availability.iter().any(|a| !(0.0..=1.0).contains(a)) {
            return Err(FarmError::Configuration("availability values must lie in [0, 1]".to_string()));
        }

        Ok(Self {
            wind_speed,
            wind_direction,
            turbulence_intensity,
            availability,
        })
    }

    fn cases(&self) -> usize {
        self.wind_speed.len()
    }
}

/// Promote `input` to `cases` values; a scalar is repeated.
fn per_case(label: &str, input: &FlowInput, cases: usize) -> FarmResult<Array1<f64>> {
    let values = input.to_vector();
    match values.len() {
        n if n == cases => Ok(values),
        1 => Ok(Array1::from_elem(cases, values[0])),
        n => Err(FarmError::Configuration(format!(
            "{} has {} values for {} wind speeds",
            label, n, cases
        ))),
    }
}

/// Selects, feeds and post-processes interchangeable wake backends.
pub struct WakeBackendDispatcher {
    settings: WakeSettings,
    state: DispatcherState,
    backends: HashMap<BackendId, Box<dyn WakeBackend>>,
    last_result: Option<WakeResult>,
}

impl Default for WakeBackendDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeBackendDispatcher {
    /// Dispatcher with default settings and no registered backends.
    pub fn new() -> Self {
        Self {
            settings: WakeSettings::default(),
            state: DispatcherState::Unset,
            backends: HashMap::new(),
            last_result: None,
        }
    }

    /// Dispatcher with [`FreeStreamBackend`] serving every version.
    pub fn with_reference_backends() -> Self {
        BackendId::ALL
            .iter()
            .fold(Self::new(), |d, &id| d.with_backend(id, FreeStreamBackend))
    }

    /// Register `backend` for `id`, replacing any earlier one.
    pub fn register(&mut self, id: BackendId, backend: Box<dyn WakeBackend>) {
        tracing::debug!("Registering backend for {}", id);
        self.backends.insert(id, backend);
    }

    /// Builder form of [`WakeBackendDispatcher::register`].
    pub fn with_backend(mut self, id: BackendId, backend: impl WakeBackend + 'static) -> Self {
        self.register(id, Box::new(backend));
        self
    }

    /// Merge a settings update. Invalid updates change nothing.
    pub fn configure(&mut self, update: &SettingsUpdate) -> FarmResult<()> {
        self.settings.merge(update)?;

        if let Some(id) = self.settings.version {
            self.state = DispatcherState::Configured;
            if self.settings.farm.is_none() {
                for key in id.required_fields().iter().filter(|k| k.needs_farm()) {
                    tracing::debug!("{}: {} is not set, the backend will not receive it", id, id.field_name(*key));
                }
            }
        }
        Ok(())
    }

    /// Configure with the query's settings, then invoke.
    pub fn evaluate(&mut self, query: &WakeQuery) -> FarmResult<&WakeResult> {
        self.configure(&query.settings)?;
        self.invoke(query)
    }

    /// Run the selected backend on `query` with the current settings.
    pub fn invoke(&mut self, query: &WakeQuery) -> FarmResult<&WakeResult> {
        let id = self.settings.version.ok_or_else(|| {
            FarmError::Configuration(format!("version not set: version=[{}]", BackendId::versions().join("|")))
        })?;
        let farm = self
            .settings
            .farm
            .as_ref()
            .ok_or_else(|| FarmError::Configuration("no wind farm configured".to_string()))?;
        let backend = self
            .backends
            .get(&id)
            .ok_or_else(|| FarmError::Configuration(format!("no backend registered for {}", id)))?;

        let flow = NormalizedFlow::new(query, farm.num_turbines())?;
        if id.case_layout() == CaseLayout::Single && flow.cases() != 1 {
            return Err(FarmError::Configuration(format!(
                "{} evaluates a single flow case, got {}",
                id,
                flow.cases()
            )));
        }
        if query.availability.is_some() && !id.required_fields().contains(&SettingKey::Availability) {
            tracing::debug!("{} does not take availability, ignoring it", id);
        }

        let args = project(id, &self.settings, farm, &flow);
        let rotor_areas = farm.rotor_diameters.mapv(|d| backend.rotor_area(d));
        let outcome = backend
            .invoke(id, &args)
            .map_err(|e| e.to_string())
            .and_then(|output| normalize(output, id, &flow, &rotor_areas, self.settings.density));

        match outcome {
            Ok(result) => {
                self.state = DispatcherState::Configured;
                Ok(&*self.last_result.insert(result))
            }
            Err(message) => {
                tracing::warn!("Backend {} failed: {}", id, message);
                self.state = DispatcherState::Error;
                self.last_result = None;
                Err(FarmError::BackendExecution {
                    backend: id,
                    args,
                    message,
                })
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Merged settings.
    pub fn settings(&self) -> &WakeSettings {
        &self.settings
    }

    /// Result of the last successful invocation.
    pub fn last_result(&self) -> Option<&WakeResult> {
        self.last_result.as_ref()
    }

    /// Every accepted version name, sorted.
    pub fn versions(&self) -> Vec<&'static str> {
        BackendId::versions()
    }
}

/// Map every declared field of `id` onto a value.
fn project(id: BackendId, settings: &WakeSettings, farm: &FarmInputs, flow: &NormalizedFlow) -> BackendArgs {
    let single = id.case_layout() == CaseLayout::Single;
    let per_case = |values: &Array1<f64>| {
        if single {
            ArgValue::Scalar(values[0])
        } else {
            ArgValue::Vector(values.clone())
        }
    };
    let pars = settings.expansion_coefficients;

    let mut args = BackendArgs::new();
    for &key in id.required_fields() {
        let value = match key {
            SettingKey::Farm => ArgValue::Farm(farm.farm.clone()),
            SettingKey::WindSpeed => per_case(&flow.wind_speed),
            SettingKey::WindDirection => per_case(&flow.wind_direction),
            SettingKey::TurbulenceIntensity => per_case(&flow.turbulence_intensity),
            SettingKey::RoughnessLength => ArgValue::Scalar(settings.roughness_length),
            SettingKey::ShearExponent => ArgValue::Scalar(settings.shear_exponent),
            SettingKey::Inflow => ArgValue::Text(settings.inflow.as_str()),
            SettingKey::WakeZonePoints => ArgValue::Integer(settings.wake_zone_points),
            SettingKey::Superposition => ArgValue::Text(settings.superposition.as_str()),
            SettingKey::ExpansionCoefficients => ArgValue::Vector(Array1::from_vec(pars.to_vec())),
            SettingKey::OffsetX => ArgValue::Matrix(farm.x_g.clone()),
            SettingKey::OffsetY => ArgValue::Matrix(farm.y_g.clone()),
            SettingKey::OffsetZ => ArgValue::Matrix(farm.z_g.clone()),
            SettingKey::RotorDiameters => ArgValue::Vector(farm.rotor_diameters.clone()),
            SettingKey::PowerCurves => ArgValue::Tables(farm.power_tables.clone()),
            SettingKey::ThrustCurves => ArgValue::Tables(farm.thrust_tables.clone()),
            SettingKey::Availability => ArgValue::Matrix(flow.availability.clone()),
            SettingKey::A1
            | SettingKey::A2
            | SettingKey::A3
            | SettingKey::A4
            | SettingKey::B1
            | SettingKey::B2 => {
                let coefficient = key.expansion_index().map_or(0.0, |k| pars[k]);
                per_case(&Array1::from_elem(flow.cases(), coefficient))
            }
            SettingKey::Density => ArgValue::Scalar(settings.density),
            SettingKey::CutInSpeeds => ArgValue::Vector(farm.cut_in_speeds.clone()),
            SettingKey::CutOutSpeeds => ArgValue::Vector(farm.cut_out_speeds.clone()),
            SettingKey::IdleThrust => ArgValue::Vector(farm.idle_thrust_coefficients.clone()),
        };
        args.insert(id.field_name(key), value);
    }
    args
}

/// Check the output contract and convert to physical units.
fn normalize(
    output: BackendOutput,
    id: BackendId,
    flow: &NormalizedFlow,
    rotor_areas: &Array1<f64>,
    density: f64,
) -> Result<WakeResult, String> {
    let cases = flow.cases();
    let n = rotor_areas.len();
    let expected: Vec<usize> = match id.case_layout() {
        CaseLayout::Single => vec![n],
        CaseLayout::Batch => vec![cases, n],
    };

    let as_cases = |label: &str, a: ArrayD<f64>| -> Result<Array2<f64>, String> {
        if a.shape() != expected.as_slice() {
            return Err(format!(
                "backend returned {} shaped {:?}, expected {:?}",
                label,
                a.shape(),
                expected
            ));
        }
        a.into_shape((cases, n)).map_err(|e| e.to_string())
    };
    let power = as_cases("power", output.power)? * KW_TO_W;
    let thrust = as_cases("thrust", output.thrust)?;
    let wind_speed = as_cases("wind speed", output.wind_speed)?;

    let mut thrust_coefficient = Array2::<f64>::zeros((cases, n));
    for ((c, i), ct) in thrust_coefficient.indexed_iter_mut() {
        let u = wind_speed[[c, i]];
        let dynamic_force = 0.5 * rotor_areas[i] * density * u * u;
        *ct = if dynamic_force == 0.0 {
            0.0
        } else {
            thrust[[c, i]] / dynamic_force
        };
    }

    let finish = |a: Array2<f64>| -> ArrayD<f64> {
        if cases == 1 {
            a.index_axis_move(Axis(0), 0).into_dyn()
        } else {
            a.into_dyn()
        }
    };
    Ok(WakeResult {
        power: finish(power),
        effective_wind_speed: finish(wind_speed),
        thrust_coefficient: finish(thrust_coefficient),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendFailure;
    use crate::farm::TurbineArray;
    use crate::farm::fixtures::{column_farm, v80_farm};
    use approx::assert_relative_eq;
    use ndarray::{IxDyn, array};
    use std::sync::Arc;

    fn five_turbines() -> Arc<TurbineArray> {
        Arc::new(v80_farm(&[
            [0.0, 0.0],
            [560.0, 0.0],
            [1120.0, 0.0],
            [0.0, 560.0],
            [560.0, 560.0],
        ]))
    }

    fn configured(version: &str, farm: Arc<TurbineArray>) -> WakeBackendDispatcher {
        let mut gcl = WakeBackendDispatcher::with_reference_backends();
        gcl.configure(&SettingsUpdate::default().version(version).farm(farm)).unwrap();
        gcl
    }

    struct FailingBackend;

    impl WakeBackend for FailingBackend {
        fn invoke(&self, _id: BackendId, _args: &BackendArgs) -> Result<BackendOutput, BackendFailure> {
            Err("solver diverged".into())
        }
    }

    /// Returns one row too many.
    struct MisshapenBackend;

    impl WakeBackend for MisshapenBackend {
        fn invoke(&self, _id: BackendId, args: &BackendArgs) -> Result<BackendOutput, BackendFailure> {
            let n = args.get("dt").and_then(ArgValue::as_vector).map_or(0, |d| d.len());
            let bad = ArrayD::<f64>::zeros(IxDyn(&[2, n]));
            Ok(BackendOutput {
                power: bad.clone(),
                thrust: bad.clone(),
                wind_speed: bad,
            })
        }
    }

    /// Thrust force computed with a square "area" of D².
    struct SquareAreaBackend;

    impl WakeBackend for SquareAreaBackend {
        fn invoke(&self, id: BackendId, args: &BackendArgs) -> Result<BackendOutput, BackendFailure> {
            let d = args.get("dt").and_then(ArgValue::as_vector).cloned().ok_or("dt")?;
            let n = d.len();
            let u = 10.0;
            let thrust = d.mapv(|d| 0.5 * 1.225 * self.rotor_area(d) * 0.5 * u * u);
            let shape = if id.case_layout() == CaseLayout::Single { vec![n] } else { vec![1, n] };
            Ok(BackendOutput {
                power: ArrayD::zeros(IxDyn(&shape)),
                thrust: thrust.into_shape(IxDyn(&shape))?,
                wind_speed: ArrayD::from_elem(IxDyn(&shape), u),
            })
        }

        fn rotor_area(&self, rotor_diameter: f64) -> f64 {
            rotor_diameter * rotor_diameter
        }
    }

    #[test]
    fn test_invoke_without_version() {
        let mut gcl = WakeBackendDispatcher::with_reference_backends();
        gcl.configure(&SettingsUpdate::default().farm(five_turbines())).unwrap();
        assert_eq!(gcl.state(), DispatcherState::Unset);
        match gcl.invoke(&WakeQuery::new(8.0, 270.0, 0.07)) {
            Err(FarmError::Configuration(msg)) => assert!(msg.contains("version not set")),
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_version_lists_versions() {
        let mut gcl = WakeBackendDispatcher::with_reference_backends();
        let query = WakeQuery::new(8.0, 270.0, 0.07).with_settings(SettingsUpdate::default().version("unknown"));
        match gcl.evaluate(&query).unwrap_err() {
            FarmError::Configuration(msg) => {
                for version in BackendId::versions() {
                    assert!(msg.contains(version));
                }
            }
            other => panic!("expected a configuration error, got {:?}", other),
        }
        assert_eq!(gcl.state(), DispatcherState::Unset);
        assert_eq!(gcl.settings().version, None);
    }

    #[test]
    fn test_scalar_query_is_flat() {
        for version in ["py_gcl_v0", "py_gcl_v1", "fort_gcl_av", "fort_gcl", "fort_gcl_s"] {
            let mut gcl = configured(version, five_turbines());
            let result = gcl.invoke(&WakeQuery::new(8.0, 270.0, 0.07)).unwrap();
            assert_eq!(result.power.shape(), &[5], "{}", version);
            assert_eq!(result.effective_wind_speed.shape(), &[5]);
            assert_eq!(result.thrust_coefficient.shape(), &[5]);
            assert!(result.is_single_case());
            assert_eq!(gcl.state(), DispatcherState::Configured);
        }
    }

    #[test]
    fn test_free_stream_recovers_turbine_curves() {
        let farm = five_turbines();
        let wt = farm.turbines()[0].clone();
        let mut gcl = configured("fort_gcl_av", farm);
        let result = gcl.invoke(&WakeQuery::new(9.0, 0.0, 0.1)).unwrap();
        for i in 0..5 {
            assert_relative_eq!(result.power[[i]], wt.power(9.0), max_relative = 1e-12);
            assert_relative_eq!(result.thrust_coefficient[[i]], wt.thrust_coefficient(9.0), max_relative = 1e-12);
            assert_eq!(result.effective_wind_speed[[i]], 9.0);
        }
    }

    #[test]
    fn test_batch_query_keeps_case_axis() {
        let mut gcl = configured("fort_gcl", five_turbines());
        let query = WakeQuery::new(vec![6.0, 8.0, 12.0], vec![270.0, 270.0, 180.0], 0.07);
        let result = gcl.invoke(&query).unwrap();
        assert_eq!(result.power.shape(), &[3, 5]);
        assert_eq!(result.num_cases(), 3);
        assert_relative_eq!(result.power[[1, 0]], 696_000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_single_case_backend_rejects_batches() {
        let mut gcl = configured("fort_gcl_s", five_turbines());
        let query = WakeQuery::new(vec![6.0, 8.0], 270.0, 0.07);
        assert!(matches!(gcl.invoke(&query), Err(FarmError::Configuration(_))));
    }

    #[test]
    fn test_length_one_batch_is_flattened() {
        let mut gcl = configured("fort_gcl_av", five_turbines());
        let result = gcl.invoke(&WakeQuery::new(vec![8.0], vec![270.0], vec![0.07])).unwrap();
        assert_eq!(result.power.shape(), &[5]);
    }

    #[test]
    fn test_availability_broadcast_and_shape_check() {
        let mut gcl = configured("fort_gcl_av", column_farm().into());
        let query = WakeQuery::new(vec![8.0, 10.0], 270.0, 0.07)
            .with_availability(Availability::PerTurbine(array![1.0, 0.0, 1.0]));
        let result = gcl.invoke(&query).unwrap();
        assert_eq!(result.power[[0, 1]], 0.0);
        assert_eq!(result.power[[1, 1]], 0.0);
        assert!(result.power[[1, 0]] > 0.0);

        let bad = WakeQuery::new(8.0, 270.0, 0.07).with_availability(Availability::PerTurbine(array![1.0, 1.0]));
        assert!(matches!(gcl.invoke(&bad), Err(FarmError::Configuration(_))));

        let out_of_range =
            WakeQuery::new(8.0, 270.0, 0.07).with_availability(Availability::PerCase(array![[1.0, 2.0, 1.0]]));
        assert!(matches!(gcl.invoke(&out_of_range), Err(FarmError::Configuration(_))));
    }

    #[test]
    fn test_projection_for_lowercase_backend() {
        let gcl = configured("fort_gcl_s", column_farm().into());
        let settings = gcl.settings();
        let farm = settings.farm.as_ref().unwrap();
        let flow = NormalizedFlow::new(&WakeQuery::new(8.0, 270.0, 0.07), 3).unwrap();
        let args = project(BackendId::FortGclS, settings, farm, &flow);

        assert_eq!(args.len(), 20);
        assert!(args.contains("ng") && !args.contains("NG"));
        assert_eq!(args.get("ws").and_then(ArgValue::as_scalar), Some(8.0));
        assert_eq!(args.get("b1").and_then(ArgValue::as_scalar), Some(15.6298));
        assert_eq!(args.get("rho").and_then(ArgValue::as_scalar), Some(1.225));
        assert_eq!(args.get("x_g").and_then(ArgValue::as_matrix).map(|m| m.dim()), Some((3, 3)));
    }

    #[test]
    fn test_projection_for_batch_backend() {
        let gcl = configured("py_gcl_v1", column_farm().into());
        let settings = gcl.settings();
        let farm = settings.farm.as_ref().unwrap();
        let flow = NormalizedFlow::new(&WakeQuery::new(vec![8.0, 9.0], 270.0, 0.07), 3).unwrap();
        let args = project(BackendId::PyGclV1, settings, farm, &flow);

        let names: Vec<&str> = args.names().collect();
        assert_eq!(names.len(), 10);
        assert_eq!(args.get("WS").and_then(ArgValue::as_vector), Some(&array![8.0, 9.0]));
        assert_eq!(args.get("WD").and_then(ArgValue::as_vector), Some(&array![270.0, 270.0]));
        assert_eq!(args.get("sup").and_then(ArgValue::as_text), Some("lin"));
        assert_eq!(args.get("NG").and_then(ArgValue::as_integer), Some(4));
        assert!(args.get("WF").and_then(ArgValue::as_farm).is_some());
    }

    #[test]
    fn test_backend_failure_moves_to_error() {
        let mut gcl = WakeBackendDispatcher::with_reference_backends().with_backend(BackendId::FortGcl, FailingBackend);
        gcl.configure(&SettingsUpdate::default().version("fort_gcl_av").farm(five_turbines()))
            .unwrap();
        gcl.invoke(&WakeQuery::new(8.0, 270.0, 0.07)).unwrap();
        assert!(gcl.last_result().is_some());

        gcl.configure(&SettingsUpdate::default().version("fort_gcl")).unwrap();
        match gcl.invoke(&WakeQuery::new(8.0, 270.0, 0.07)) {
            Err(FarmError::BackendExecution { backend, args, message }) => {
                assert_eq!(backend, BackendId::FortGcl);
                assert!(args.contains("x_g"));
                assert_eq!(message, "solver diverged");
            }
            other => panic!("expected a backend error, got {:?}", other),
        }
        assert_eq!(gcl.state(), DispatcherState::Error);
        assert!(gcl.last_result().is_none());

        gcl.configure(&SettingsUpdate::default().version("fort_gcl_av")).unwrap();
        assert_eq!(gcl.state(), DispatcherState::Configured);
    }

    #[test]
    fn test_output_shape_violation_is_backend_error() {
        let mut gcl = WakeBackendDispatcher::new().with_backend(BackendId::FortGcl, MisshapenBackend);
        gcl.configure(&SettingsUpdate::default().version("fort_gcl").farm(five_turbines()))
            .unwrap();
        let err = gcl.invoke(&WakeQuery::new(8.0, 270.0, 0.07)).unwrap_err();
        assert!(matches!(err, FarmError::BackendExecution { .. }));
        assert!(err.to_string().starts_with("Backend fort_gcl failed with the following inputs: {"));
        assert_eq!(gcl.state(), DispatcherState::Error);
    }

    #[test]
    fn test_backend_rotor_area_override() {
        let mut gcl = WakeBackendDispatcher::new().with_backend(BackendId::FortGclS, SquareAreaBackend);
        gcl.configure(&SettingsUpdate::default().version("fort_gcl_s").farm(five_turbines()))
            .unwrap();
        let result = gcl.invoke(&WakeQuery::new(10.0, 270.0, 0.07)).unwrap();
        for ct in result.thrust_coefficient.iter() {
            assert_relative_eq!(*ct, 0.5, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_missing_farm_or_backend() {
        let mut gcl = WakeBackendDispatcher::new();
        gcl.configure(&SettingsUpdate::default().version("py_gcl_v0")).unwrap();
        assert!(matches!(
            gcl.invoke(&WakeQuery::new(8.0, 270.0, 0.07)),
            Err(FarmError::Configuration(_))
        ));
        gcl.configure(&SettingsUpdate::default().farm(five_turbines())).unwrap();
        match gcl.invoke(&WakeQuery::new(8.0, 270.0, 0.07)) {
            Err(FarmError::Configuration(msg)) => assert!(msg.contains("py_gcl_v0")),
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_wind_speed_gives_zero_thrust_coefficient() {
        let mut gcl = configured("fort_gcl", five_turbines());
        let result = gcl.invoke(&WakeQuery::new(0.0, 270.0, 0.07)).unwrap();
        assert!(result.thrust_coefficient.iter().all(|&ct| ct == 0.0));
        assert!(result.power.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_evaluate_merges_query_settings() {
        let mut gcl = WakeBackendDispatcher::with_reference_backends();
        let query = WakeQuery::new(8.0, 270.0, 0.07).with_settings(
            SettingsUpdate::default()
                .version("py_gcl_v1")
                .farm(five_turbines())
                .density(1.0),
        );
        gcl.evaluate(&query).unwrap();
        assert_eq!(gcl.settings().density, 1.0);
        assert_eq!(gcl.last_result().map(WakeResult::num_cases), Some(1));
    }
}
