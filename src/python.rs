//! Python bindings for the farmwake library.
//!
//! NOTE: This module requires the `python-bindings` feature to be enabled.
//! Compile with: `cargo build --features python-bindings --release`
//!
//! Usage in Python:
//! ```python
//! import farmwake as fw
//! wt = fw.WindTurbine("V80", table, 70.0, 40.0)
//! wf = fw.WindFarm([[0, 0], [560, 0]], wt, "Pair")
//! gcl = fw.GCL()
//! gcl.configure(version="fort_gcl", farm=wf)
//! power, speed, ct = gcl(8.0, 270.0, 0.07)              # length-N lists
//! power, speed, ct = gcl([6.0, 9.0], 270.0, 0.07)       # 2 × N nested lists
//! ```

use std::sync::Arc;

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::dispatcher::{FlowInput, WakeBackendDispatcher, WakeQuery, WakeResult};
use crate::error::FarmError;
use crate::farm::TurbineArray;
use crate::layout::InMemoryLayout;
use crate::settings::SettingsUpdate;
use crate::turbine::TurbineSpec;

fn to_py_err(err: FarmError) -> PyErr {
    match err {
        FarmError::BackendExecution { .. } => PyRuntimeError::new_err(err.to_string()),
        FarmError::Io(_) => PyIOError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

/// Flow argument: a float or a sequence of floats.
#[derive(Debug, Clone, FromPyObject)]
pub enum PyFlowInput {
    /// A float
    Scalar(f64),
    /// A sequence of floats
    Batch(Vec<f64>),
}

impl From<PyFlowInput> for FlowInput {
    fn from(value: PyFlowInput) -> Self {
        match value {
            PyFlowInput::Scalar(v) => FlowInput::Scalar(v),
            PyFlowInput::Batch(v) => FlowInput::from(v),
        }
    }
}

/// Per-turbine values for one case, or one row per case.
#[derive(Debug, Clone, PartialEq)]
pub enum PyFarmValues {
    /// One value per turbine
    Single(Vec<f64>),
    /// One row per flow case
    Batch(Vec<Vec<f64>>),
}

impl IntoPy<PyObject> for PyFarmValues {
    fn into_py(self, py: Python<'_>) -> PyObject {
        match self {
            PyFarmValues::Single(values) => values.into_py(py),
            PyFarmValues::Batch(rows) => rows.into_py(py),
        }
    }
}

/// `(power, effective_wind_speed, c_t)` keeping the case axis of batches.
fn result_values(result: &WakeResult) -> (PyFarmValues, PyFarmValues, PyFarmValues) {
    let single = result.is_single_case();
    let convert = |values: &ndarray::ArrayD<f64>| {
        if single {
            PyFarmValues::Single(values.iter().copied().collect())
        } else {
            PyFarmValues::Batch(values.outer_iter().map(|row| row.iter().copied().collect()).collect())
        }
    };
    (
        convert(&result.power),
        convert(&result.effective_wind_speed),
        convert(&result.thrust_coefficient),
    )
}

// ============================================================================
// Python Type Wrappers
// ============================================================================

/// Wind turbine built from a `(u, P [W], CT)` reference table.
#[pyclass(name = "WindTurbine")]
#[derive(Debug, Clone)]
pub struct PyWindTurbine {
    spec: TurbineSpec,
}

#[pymethods]
impl PyWindTurbine {
    /// Build from `[u, P (W), CT]` rows.
    #[new]
    #[pyo3(signature = (name, table, hub_height, rotor_radius, c_t_idle=None))]
    pub fn new(
        name: &str,
        table: Vec<[f64; 3]>,
        hub_height: f64,
        rotor_radius: f64,
        c_t_idle: Option<f64>,
    ) -> PyResult<Self> {
        let spec = TurbineSpec::from_reference_curves(name, &table, hub_height, rotor_radius, c_t_idle)
            .map_err(to_py_err)?;
        Ok(Self { spec })
    }

    /// Turbine name
    #[getter]
    pub fn name(&self) -> String {
        self.spec.name().to_string()
    }

    /// Rated power (W)
    #[getter]
    pub fn rated_power(&self) -> f64 {
        self.spec.rated_power()
    }

    /// Rotor diameter (m)
    #[getter]
    pub fn rotor_diameter(&self) -> f64 {
        self.spec.rotor_diameter()
    }

    /// Power (W) at a hub-height wind speed.
    pub fn power(&self, wind_speed: f64) -> f64 {
        self.spec.power(wind_speed)
    }

    /// Thrust coefficient at a hub-height wind speed.
    pub fn thrust_coefficient(&self, wind_speed: f64) -> f64 {
        self.spec.thrust_coefficient(wind_speed)
    }

    /// Wind speed producing `power` below rated.
    pub fn wind_speed_from_power(&self, power: f64) -> PyResult<f64> {
        self.spec.wind_speed_from_power(power).map_err(to_py_err)
    }

    /// Axial induction factor.
    #[staticmethod]
    pub fn induction_factor(thrust_coefficient: f64) -> PyResult<f64> {
        TurbineSpec::induction_factor(thrust_coefficient).map_err(to_py_err)
    }

    /// Python representation.
    pub fn __repr__(&self) -> String {
        format!(
            "WindTurbine(name={}, D={:.1} m, H={:.1} m, P={:.0} W)",
            self.spec.name(),
            self.spec.rotor_diameter(),
            self.spec.hub_height(),
            self.spec.rated_power()
        )
    }
}

/// Homogeneous wind farm.
#[pyclass(name = "WindFarm")]
#[derive(Debug, Clone)]
pub struct PyWindFarm {
    farm: Arc<TurbineArray>,
}

#[pymethods]
impl PyWindFarm {
    /// Build from `[x, y]` positions sharing one turbine model.
    #[new]
    #[pyo3(signature = (positions, turbine, name=None))]
    pub fn new(positions: Vec<[f64; 2]>, turbine: PyRef<PyWindTurbine>, name: Option<String>) -> PyResult<Self> {
        let mut layout = InMemoryLayout::shared(positions, turbine.spec.clone());
        if let Some(name) = name {
            layout = layout.with_name(name);
        }
        let farm = TurbineArray::from_layout(&layout).map_err(to_py_err)?;
        Ok(Self { farm: Arc::new(farm) })
    }

    /// `(upstream_count, ranking)` for a wind direction in degrees.
    pub fn turbine_ordering(&self, wind_direction: f64) -> (Vec<usize>, Vec<usize>) {
        let ordering = self.farm.turbine_ordering(wind_direction);
        (ordering.upstream_count, ordering.ranking)
    }

    /// Sum of rated powers (W)
    #[getter]
    pub fn total_capacity(&self) -> f64 {
        self.farm.total_capacity()
    }

    /// Rotor diameter per turbine (m)
    #[getter]
    pub fn rotor_diameters(&self) -> Vec<f64> {
        self.farm.rotor_diameters().to_vec()
    }

    /// Number of turbines.
    pub fn __len__(&self) -> usize {
        self.farm.len()
    }

    /// Python representation.
    pub fn __repr__(&self) -> String {
        self.farm.to_string()
    }
}

/// Wake model dispatcher served by the free-stream reference backend.
#[pyclass(name = "GCL", unsendable)]
pub struct PyGcl {
    dispatcher: WakeBackendDispatcher,
}

#[pymethods]
impl PyGcl {
    /// Dispatcher with the free-stream backend registered for every version.
    #[new]
    pub fn new() -> Self {
        Self {
            dispatcher: WakeBackendDispatcher::with_reference_backends(),
        }
    }

    /// Accepted version names
    #[getter]
    pub fn versions(&self) -> Vec<&'static str> {
        self.dispatcher.versions()
    }

    /// Merge the given settings.
    #[pyo3(signature = (version=None, farm=None, rho=None))]
    pub fn configure(
        &mut self,
        version: Option<String>,
        farm: Option<PyRef<PyWindFarm>>,
        rho: Option<f64>,
    ) -> PyResult<()> {
        let mut update = SettingsUpdate::default();
        update.version = version;
        update.density = rho;
        update.farm = farm.map(|f| Arc::clone(&f.farm));
        self.dispatcher.configure(&update).map_err(to_py_err)
    }

    /// Evaluate; returns `(power, effective_wind_speed, c_t)`.
    ///
    /// Scalar flow inputs give length-N lists, sequences give one length-N
    /// list per case.
    pub fn __call__(
        &mut self,
        ws: PyFlowInput,
        wd: PyFlowInput,
        ti: PyFlowInput,
    ) -> PyResult<(PyFarmValues, PyFarmValues, PyFarmValues)> {
        let query = WakeQuery::new(FlowInput::from(ws), FlowInput::from(wd), FlowInput::from(ti));
        let result = self.dispatcher.invoke(&query).map_err(to_py_err)?;
        Ok(result_values(result))
    }
}

/// Python module definition.
#[pymodule]
fn farmwake(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyWindTurbine>()?;
    m.add_class::<PyWindFarm>()?;
    m.add_class::<PyGcl>()?;
    m.add("__version__", crate::VERSION)?;
    Ok(())
}
