//! Wind farm geometry engine.
//!
//! A [`TurbineArray`] pairs N turbine positions with their [`TurbineSpec`]s
//! and caches the full turbine-to-turbine relative position tensor. Every
//! wind-direction dependent quantity (flow-frame rotation, upstream ordering)
//! is derived from that tensor on demand.
//!
//! The array is never mutated after [`TurbineArray::build`]. A layout change
//! builds a new array; [`SharedFarm`] swaps snapshots atomically for readers
//! on other threads.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use parking_lot::RwLock;

use crate::constants::ORDERING_TOLERANCE;
use crate::error::{FarmError, FarmResult};
use crate::layout::LayoutSource;
use crate::turbine::TurbineSpec;
use crate::vector::{FlowRotation, Vec3};

/// Name used when a layout does not supply one.
pub const UNKNOWN_FARM: &str = "Unknown wind farm";

/// Upstream/downstream ordering of a farm for one wind direction.
#[derive(Debug, Clone, PartialEq)]
pub struct TurbineOrdering {
    /// 2×N×N; `[:, i, j]` is the vector i → j in the flow frame
    pub flow_vectors: Array3<f64>,
    /// Number of turbines lying upwind of each turbine
    pub upstream_count: Vec<usize>,
    /// Turbine indices from most upstream to most downstream
    pub ranking: Vec<usize>,
}

impl TurbineOrdering {
    /// Rank of each turbine (inverse permutation of `ranking`).
    pub fn ranks(&self) -> Vec<usize> {
        let mut ranks = vec![0; self.ranking.len()];
        for (rank, &turbine) in self.ranking.iter().enumerate() {
            ranks[turbine] = rank;
        }
        ranks
    }
}

/// Immutable wind farm geometry.
#[derive(Debug, Clone)]
pub struct TurbineArray {
    name: String,
    positions: Vec<Vec3>,
    turbines: Vec<TurbineSpec>,
    /// N×N×3, entry (i, j) = positions[j] − positions[i]
    relative_vectors: Array3<f64>,
}

impl TurbineArray {
    /// Build an array from `[x, y]` positions and index-aligned turbines.
    ///
    /// Each position's z is the hub height of its turbine.
    pub fn build(positions: &[[f64; 2]], turbines: Vec<TurbineSpec>) -> FarmResult<Self> {
        let n = positions.len();
        if n == 0 {
            return Err(FarmError::Layout("a farm needs at least one turbine".to_string()));
        }
        if turbines.len() != n {
            return Err(FarmError::Layout(format!(
                "{} positions but {} turbines",
                n,
                turbines.len()
            )));
        }

        let mut seen_xy = HashSet::with_capacity(n);
        let mut seen_names = HashSet::with_capacity(n);
        for (i, (xy, wt)) in positions.iter().zip(&turbines).enumerate() {
            if !xy[0].is_finite() || !xy[1].is_finite() {
                return Err(FarmError::Layout(format!("turbine {} has a non-finite position {:?}", i, xy)));
            }
            // +0.0 folds -0.0 onto 0.0 so both compare equal
            if !seen_xy.insert(((xy[0] + 0.0).to_bits(), (xy[1] + 0.0).to_bits())) {
                return Err(FarmError::Layout(format!("turbine {} duplicates position {:?}", i, xy)));
            }
            if !seen_names.insert(wt.name()) {
                return Err(FarmError::Layout(format!("duplicate turbine name {}", wt.name())));
            }
        }

        let positions: Vec<Vec3> = positions
            .iter()
            .zip(&turbines)
            .map(|(xy, wt)| Vec3::new(xy[0], xy[1], wt.hub_height()))
            .collect();
        let relative_vectors = relative_vectors(&positions);

        tracing::info!("Built turbine array with {} turbines", n);

        Ok(Self {
            name: UNKNOWN_FARM.to_string(),
            positions,
            turbines,
            relative_vectors,
        })
    }

    /// Build from an external layout provider.
    pub fn from_layout(source: &dyn LayoutSource) -> FarmResult<Self> {
        let xy = source.positions()?;
        if xy.nrows() != 2 {
            return Err(FarmError::Layout(format!(
                "layout positions must be 2×N, got {:?}",
                xy.shape()
            )));
        }
        let positions: Vec<[f64; 2]> = xy.columns().into_iter().map(|c| [c[0], c[1]]).collect();
        let farm = Self::build(&positions, source.turbine_types()?)?;
        Ok(match source.name() {
            Some(name) => farm.with_name(name),
            None => farm,
        })
    }

    /// Replace the farm name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 2×2 rotation from global (x, y) into the flow frame.
    pub fn flow_rotation(wind_direction_deg: f64) -> Array2<f64> {
        FlowRotation::from_wind_direction(wind_direction_deg).matrix()
    }

    /// Rotate a 2×K array of horizontal vectors into the flow frame.
    pub fn to_flow_coordinates(wind_direction_deg: f64, vectors: ArrayView2<f64>) -> FarmResult<Array2<f64>> {
        if vectors.nrows() != 2 {
            return Err(FarmError::Layout(format!(
                "flow rotation expects a 2×K array, got {:?}",
                vectors.shape()
            )));
        }
        Ok(Self::flow_rotation(wind_direction_deg).dot(&vectors))
    }

    /// Rank turbines from most upstream to most downstream.
    ///
    /// Turbine j lies upwind of i when the flow-frame vector i → j points
    /// against the flow. Pairs within [`ORDERING_TOLERANCE`] of crosswind do
    /// not count. Ties keep index order.
    pub fn turbine_ordering(&self, wind_direction_deg: f64) -> TurbineOrdering {
        let n = self.len();
        let rot = FlowRotation::from_wind_direction(wind_direction_deg);
        let mut flow_vectors = Array3::<f64>::zeros((2, n, n));
        let mut upstream_count = vec![0usize; n];

        for i in 0..n {
            for j in 0..n {
                let dx = self.relative_vectors[[i, j, 0]];
                let dy = self.relative_vectors[[i, j, 1]];
                let (along, across) = rot.apply(dx, dy);
                flow_vectors[[0, i, j]] = along;
                flow_vectors[[1, i, j]] = across;

                let distance = dx.hypot(dy);
                if along < -ORDERING_TOLERANCE * distance {
                    upstream_count[i] += 1;
                }
            }
        }

        let mut ranking: Vec<usize> = (0..n).collect();
        ranking.sort_by_key(|&i| upstream_count[i]);

        TurbineOrdering {
            flow_vectors,
            upstream_count,
            ranking,
        }
    }

    /// Pairwise global offsets `(dx, dy, dz)`, each N×N with
    /// `d[i, j] = position[j] − position[i]`.
    pub fn pairwise_global_offsets(&self) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
        let component = |axis: usize| self.relative_vectors.index_axis(Axis(2), axis).to_owned();
        (component(0), component(1), component(2))
    }

    /// The shared spec when every turbine is the same model.
    pub fn homogeneous(&self) -> FarmResult<&TurbineSpec> {
        let first = &self.turbines[0];
        match self.turbines.iter().find(|wt| !wt.same_model_as(first)) {
            None => Ok(first),
            Some(other) => Err(FarmError::Layout(format!(
                "farm is heterogeneous: {} ({}) differs from {} ({})",
                other.name(),
                other.turbine_type(),
                first.name(),
                first.turbine_type()
            ))),
        }
    }

    fn column(&self, f: impl Fn(&TurbineSpec) -> f64) -> Array1<f64> {
        self.turbines.iter().map(f).collect()
    }

    /// Rotor diameter per turbine (m)
    pub fn rotor_diameters(&self) -> Array1<f64> {
        self.column(TurbineSpec::rotor_diameter)
    }

    /// Rotor radius per turbine (m)
    pub fn rotor_radii(&self) -> Array1<f64> {
        self.column(TurbineSpec::rotor_radius)
    }

    /// Hub height per turbine (m)
    pub fn hub_heights(&self) -> Array1<f64> {
        self.column(TurbineSpec::hub_height)
    }

    /// Cut-in wind speed per turbine (m/s)
    pub fn cut_in_speeds(&self) -> Array1<f64> {
        self.column(TurbineSpec::cut_in_speed)
    }

    /// Cut-out wind speed per turbine (m/s)
    pub fn cut_out_speeds(&self) -> Array1<f64> {
        self.column(TurbineSpec::cut_out_speed)
    }

    /// Idle thrust coefficient per turbine
    pub fn idle_thrust_coefficients(&self) -> Array1<f64> {
        self.column(TurbineSpec::idle_thrust_coefficient)
    }

    /// Rated power per turbine (W)
    pub fn rated_powers(&self) -> Array1<f64> {
        self.column(TurbineSpec::rated_power)
    }

    /// Sum of rated powers (W)
    pub fn total_capacity(&self) -> f64 {
        self.rated_powers().sum()
    }

    /// Turbine names in index order
    pub fn names(&self) -> Vec<&str> {
        self.turbines.iter().map(TurbineSpec::name).collect()
    }

    /// Farm name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of turbines
    pub fn len(&self) -> usize {
        self.turbines.len()
    }

    /// Always false for a built farm
    pub fn is_empty(&self) -> bool {
        self.turbines.is_empty()
    }

    /// Turbine positions (m)
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Turbine specs, index-aligned with the positions
    pub fn turbines(&self) -> &[TurbineSpec] {
        &self.turbines
    }

    /// N×N×3 relative position tensor
    pub fn relative_vectors(&self) -> &Array3<f64> {
        &self.relative_vectors
    }
}

impl fmt::Display for TurbineArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = Vec::new();
        for wt in &self.turbines {
            if !types.contains(&wt.turbine_type()) {
                types.push(wt.turbine_type());
            }
        }
        write!(
            f,
            "{} has {} {} wind turbines, with a total capacity of {:.1} MW",
            self.name,
            self.len(),
            types.join("/"),
            self.total_capacity() / 1.0e6
        )
    }
}

fn relative_vectors(positions: &[Vec3]) -> Array3<f64> {
    let n = positions.len();
    let mut tensor = Array3::<f64>::zeros((n, n, 3));
    for (i, pi) in positions.iter().enumerate() {
        for (j, pj) in positions.iter().enumerate() {
            if i == j {
                continue;
            }
            let d = pj.sub(pi);
            for axis in 0..3 {
                tensor[[i, j, axis]] = d.component(axis);
            }
        }
    }
    tensor
}

/// Farm handle shared between readers and a rebuilding writer.
///
/// Readers take an `Arc` snapshot and never observe a partially rebuilt
/// array.
#[derive(Debug, Clone)]
pub struct SharedFarm {
    inner: Arc<RwLock<Arc<TurbineArray>>>,
}

impl SharedFarm {
    /// Wrap a farm for shared access.
    pub fn new(farm: TurbineArray) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(farm))),
        }
    }

    /// Current array.
    pub fn snapshot(&self) -> Arc<TurbineArray> {
        Arc::clone(&self.inner.read())
    }

    /// Swap in a rebuilt array, returning the previous one.
    pub fn replace(&self, farm: TurbineArray) -> Arc<TurbineArray> {
        tracing::info!("Replacing farm {} with {}", self.inner.read().name(), farm.name());
        std::mem::replace(&mut *self.inner.write(), Arc::new(farm))
    }
}
