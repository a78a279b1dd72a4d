//! Layout providers feeding [`TurbineArray::from_layout`](crate::farm::TurbineArray::from_layout).
//!
//! A provider supplies a 2×N position matrix and N turbine specs. Three
//! providers ship with the crate:
//!
//! - [`InMemoryLayout`]: positions plus one shared spec or one spec per turbine
//! - [`DescribedLayout`]: serde records (turbine types and placed instances)
//! - [`CsvLayout`]: a coordinate CSV (`x`, `y`) and a reference curve CSV
//!   (`u`, `p`, `ct`), power in W

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FarmError, FarmResult};
use crate::turbine::{TurbineDescription, TurbineSpec, TurbineType};

/// Source of farm geometry and turbine specs.
pub trait LayoutSource {
    /// Farm name, if the source carries one.
    fn name(&self) -> Option<&str> {
        None
    }

    /// 2×N matrix, row 0 = x, row 1 = y (m)
    fn positions(&self) -> FarmResult<Array2<f64>>;

    /// N specs, index-aligned with the position columns
    fn turbine_types(&self) -> FarmResult<Vec<TurbineSpec>>;
}

/// How turbines are assigned to the positions of an [`InMemoryLayout`].
#[derive(Debug, Clone)]
pub enum TurbineAssignment {
    /// Every position gets a copy of this spec, named `wt1`, `wt2`, ...
    Shared(TurbineSpec),
    /// One spec per position
    PerTurbine(Vec<TurbineSpec>),
}

/// Positions and specs held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryLayout {
    /// Farm name
    pub name: Option<String>,
    /// `[x, y]` per turbine (m)
    pub positions: Vec<[f64; 2]>,
    /// Spec assignment
    pub turbines: TurbineAssignment,
}

impl InMemoryLayout {
    /// Every position uses `turbine`.
    pub fn shared(positions: Vec<[f64; 2]>, turbine: TurbineSpec) -> Self {
        Self {
            name: None,
            positions,
            turbines: TurbineAssignment::Shared(turbine),
        }
    }

    /// Index-aligned positions and specs.
    pub fn per_turbine(positions: Vec<[f64; 2]>, turbines: Vec<TurbineSpec>) -> Self {
        Self {
            name: None,
            positions,
            turbines: TurbineAssignment::PerTurbine(turbines),
        }
    }

    /// Set the farm name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl LayoutSource for InMemoryLayout {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn positions(&self) -> FarmResult<Array2<f64>> {
        Ok(positions_matrix(&self.positions))
    }

    fn turbine_types(&self) -> FarmResult<Vec<TurbineSpec>> {
        Ok(match &self.turbines {
            TurbineAssignment::Shared(spec) => (1..=self.positions.len())
                .map(|i| spec.renamed(format!("wt{}", i)))
                .collect(),
            TurbineAssignment::PerTurbine(specs) => specs.clone(),
        })
    }
}

/// Structured farm description: type templates plus placed instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribedLayout {
    /// Farm name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Type templates
    pub turbine_types: Vec<TurbineType>,
    /// Placed instances
    pub turbines: Vec<TurbineDescription>,
}

impl DescribedLayout {
    /// Parse a JSON description.
    pub fn from_json_str(json: &str) -> FarmResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON description from a file.
    pub fn from_path(path: impl AsRef<Path>) -> FarmResult<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

impl LayoutSource for DescribedLayout {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn positions(&self) -> FarmResult<Array2<f64>> {
        let xy: Vec<[f64; 2]> = self.turbines.iter().map(|t| t.position).collect();
        Ok(positions_matrix(&xy))
    }

    fn turbine_types(&self) -> FarmResult<Vec<TurbineSpec>> {
        let templates: HashMap<&str, &TurbineType> =
            self.turbine_types.iter().map(|t| (t.name.as_str(), t)).collect();
        self.turbines
            .iter()
            .map(|instance| {
                let template = templates.get(instance.turbine_type.as_str()).ok_or_else(|| {
                    FarmError::Layout(format!(
                        "{}: unknown turbine type {}",
                        instance.name, instance.turbine_type
                    ))
                })?;
                TurbineSpec::from_description(instance, template)
            })
            .collect()
    }
}

/// Coordinate file plus a single reference curve file shared by all turbines.
#[derive(Debug, Clone)]
pub struct CsvLayout {
    /// Farm name
    pub name: Option<String>,
    /// CSV with `x` and `y` columns (m)
    pub coordinates: PathBuf,
    /// CSV with `u`, `p` (W) and `ct` columns
    pub reference_curve: PathBuf,
    /// Name given to the shared turbine spec
    pub turbine_name: String,
    /// Hub height (m)
    pub hub_height: f64,
    /// Rotor radius (m)
    pub rotor_radius: f64,
    /// Idle thrust coefficient, the reference default when absent
    pub idle_thrust_coefficient: Option<f64>,
}

impl CsvLayout {
    /// Layout reading both CSV files on demand.
    pub fn new(
        coordinates: impl Into<PathBuf>,
        reference_curve: impl Into<PathBuf>,
        turbine_name: impl Into<String>,
        hub_height: f64,
        rotor_radius: f64,
    ) -> Self {
        Self {
            name: None,
            coordinates: coordinates.into(),
            reference_curve: reference_curve.into(),
            turbine_name: turbine_name.into(),
            hub_height,
            rotor_radius,
            idle_thrust_coefficient: None,
        }
    }

    /// Set the farm name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the idle thrust coefficient.
    pub fn with_idle_thrust_coefficient(mut self, c_t_idle: f64) -> Self {
        self.idle_thrust_coefficient = Some(c_t_idle);
        self
    }

    fn coordinate_rows(&self) -> FarmResult<Vec<[f64; 2]>> {
        let df = read_csv(&self.coordinates)?;
        let x = float_column(&df, "x")?;
        let y = float_column(&df, "y")?;
        Ok(x.into_iter().zip(y).map(|(x, y)| [x, y]).collect())
    }
}

impl LayoutSource for CsvLayout {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn positions(&self) -> FarmResult<Array2<f64>> {
        Ok(positions_matrix(&self.coordinate_rows()?))
    }

    fn turbine_types(&self) -> FarmResult<Vec<TurbineSpec>> {
        let df = read_csv(&self.reference_curve)?;
        let u = float_column(&df, "u")?;
        let p = float_column(&df, "p")?;
        let ct = float_column(&df, "ct")?;
        let table: Vec<[f64; 3]> = u
            .into_iter()
            .zip(p)
            .zip(ct)
            .map(|((u, p), ct)| [u, p, ct])
            .collect();

        let reference = TurbineSpec::from_reference_curves(
            &self.turbine_name,
            &table,
            self.hub_height,
            self.rotor_radius,
            self.idle_thrust_coefficient,
        )?;
        let n = self.coordinate_rows()?.len();
        Ok((1..=n).map(|i| reference.renamed(format!("wt{}", i))).collect())
    }
}

fn positions_matrix(rows: &[[f64; 2]]) -> Array2<f64> {
    Array2::from_shape_fn((2, rows.len()), |(axis, i)| rows[i][axis])
}

fn read_csv(path: &Path) -> FarmResult<DataFrame> {
    let file = File::open(path)?;
    let df = CsvReader::new(file).has_header(true).finish()?;
    tracing::debug!("Read {} rows from {}", df.height(), path.display());
    Ok(df)
}

/// Column as `f64`, rejecting nulls.
fn float_column(df: &DataFrame, name: &str) -> FarmResult<Vec<f64>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| FarmError::Layout(format!("column {} has an empty value at row {}", name, row)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_IDLE_THRUST;
    use crate::farm::TurbineArray;
    use crate::turbine::fixtures::{V80_TABLE, v80};
    use approx::assert_relative_eq;
    use std::io::Write;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("farmwake-layout-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_in_memory_shared_names_turbines() {
        let layout = InMemoryLayout::shared(vec![[0.0, 0.0], [560.0, 0.0]], v80()).with_name("Pair");
        let farm = TurbineArray::from_layout(&layout).unwrap();
        assert_eq!(farm.name(), "Pair");
        assert_eq!(farm.names(), vec!["wt1", "wt2"]);
        assert_eq!(farm.positions()[1].x, 560.0);
    }

    #[test]
    fn test_in_memory_per_turbine_misaligned() {
        let layout = InMemoryLayout::per_turbine(vec![[0.0, 0.0], [560.0, 0.0]], vec![v80()]);
        assert!(matches!(TurbineArray::from_layout(&layout), Err(FarmError::Layout(_))));
    }

    #[test]
    fn test_described_layout_from_json() {
        let power: Vec<String> = V80_TABLE.iter().map(|r| format!("[{}, {}]", r[0], r[1] / 1000.0)).collect();
        let ct: Vec<String> = V80_TABLE.iter().map(|r| format!("[{}, {}]", r[0], r[2])).collect();
        let json = format!(
            r#"{{
                "name": "Described",
                "turbine_types": [{{
                    "name": "V80", "hub_height": 70.0, "rotor_diameter": 80.0,
                    "cut_in_wind_speed": 4.0, "cut_out_wind_speed": 25.0,
                    "rated_power": 2000.0,
                    "power_curve": [{}], "c_t_curve": [{}]
                }}],
                "turbines": [
                    {{"name": "a", "turbine_type": "V80", "position": [0.0, 0.0]}},
                    {{"name": "b", "turbine_type": "V80", "position": [0.0, 560.0], "c_t_idle": 0.07}}
                ]
            }}"#,
            power.join(", "),
            ct.join(", ")
        );
        let layout = DescribedLayout::from_json_str(&json).unwrap();
        let path = scratch_file("described.json", &json);
        assert_eq!(DescribedLayout::from_path(&path).unwrap(), layout);
        let farm = TurbineArray::from_layout(&layout).unwrap();
        assert_eq!(farm.len(), 2);
        assert_eq!(farm.name(), "Described");
        assert_relative_eq!(farm.turbines()[0].rated_power(), 2.0e6);
        assert_eq!(farm.idle_thrust_coefficients()[1], 0.07);
    }

    #[test]
    fn test_described_layout_unknown_type() {
        let layout = DescribedLayout {
            name: None,
            turbine_types: vec![],
            turbines: vec![TurbineDescription {
                name: "a".to_string(),
                turbine_type: "V90".to_string(),
                position: [0.0, 0.0],
                c_t_idle: None,
            }],
        };
        assert!(matches!(layout.turbine_types(), Err(FarmError::Layout(_))));
    }

    #[test]
    fn test_csv_layout() {
        let coords = scratch_file("coords.csv", "x,y\n0,0\n560,0\n0,560\n");
        let mut curve = String::from("u,p,ct\n");
        for r in V80_TABLE.iter() {
            curve.push_str(&format!("{},{},{}\n", r[0], r[1], r[2]));
        }
        let curve = scratch_file("curve.csv", &curve);

        let layout = CsvLayout::new(&coords, &curve, "V80", 70.0, 40.0).with_name("Csv");
        let farm = TurbineArray::from_layout(&layout).unwrap();
        assert_eq!(farm.len(), 3);
        assert_eq!(farm.positions()[2].y, 560.0);
        assert_relative_eq!(farm.turbines()[0].power(8.0), 696_000.0);
        assert!(farm.homogeneous().is_ok());
        assert_eq!(farm.idle_thrust_coefficients()[0], DEFAULT_IDLE_THRUST);

        let idle = CsvLayout::new(&coords, &curve, "V80", 70.0, 40.0).with_idle_thrust_coefficient(0.07);
        let farm = TurbineArray::from_layout(&idle).unwrap();
        assert_eq!(farm.idle_thrust_coefficients(), ndarray::array![0.07, 0.07, 0.07]);
    }

    #[test]
    fn test_csv_missing_column() {
        let coords = scratch_file("no_y.csv", "x,z\n0,0\n");
        let layout = CsvLayout::new(&coords, &coords, "V80", 70.0, 40.0);
        assert!(matches!(layout.positions(), Err(FarmError::Table(_))));
    }
}
