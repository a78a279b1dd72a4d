//! Demo program: builds a farm, prints its ordering for a few wind
//! directions and runs one evaluation through the free-stream backend.
//!
//! Usage: `farmwake [coordinates.csv reference_curve.csv]`
use std::sync::Arc;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

use farmwake::layout::{CsvLayout, InMemoryLayout};
use farmwake::render::{LayoutRenderer, render_or_warn};
use farmwake::{
    FarmResult, SettingsUpdate, TurbineArray, TurbineSpec, WakeBackendDispatcher, WakeQuery,
};

/// V80-like reference table `[u (m/s), P (W), CT]`
const REFERENCE_CURVE: [[f64; 3]; 22] = [
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

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("===================================================");
    println!("Wind Farm Geometry and Wake Dispatch Demo");
    println!("===================================================");
    println!();

    let args: Vec<String> = std::env::args().collect();
    let farm = match args.as_slice() {
        [_, coords, curve, ..] => load_csv_farm(coords, curve)?,
        _ => synthetic_farm()?,
    };
    println!("{}", farm);
    println!();

    demo_ordering(&farm);
    println!();

    let farm = Arc::new(farm);
    demo_evaluation(Arc::clone(&farm))?;
    println!();

    let renderer = renderer();
    render_or_warn(renderer.as_ref(), &farm, Some(&farm.turbine_ordering(270.0)));

    println!("===================================================");
    println!("Demo completed successfully!");
    println!("===================================================");
    Ok(())
}

fn load_csv_farm(coords: &str, curve: &str) -> FarmResult<TurbineArray> {
    let layout = CsvLayout::new(coords, curve, "reference", 70.0, 40.0).with_name(coords);
    TurbineArray::from_layout(&layout)
}

/// 3×3 grid with 7 D spacing.
fn synthetic_farm() -> FarmResult<TurbineArray> {
    let turbine = TurbineSpec::from_reference_curves("V80", &REFERENCE_CURVE, 70.0, 40.0, None)?;
    let spacing = 7.0 * turbine.rotor_diameter();
    let positions = (0..9)
        .map(|k| [(k % 3) as f64 * spacing, (k / 3) as f64 * spacing])
        .collect();
    let layout = InMemoryLayout::shared(positions, turbine).with_name("Demo grid");
    TurbineArray::from_layout(&layout)
}

fn demo_ordering(farm: &TurbineArray) {
    println!("--- Turbine ordering ---");
    for wd in [0.0, 90.0, 180.0, 225.0, 270.0] {
        let start = Instant::now();
        let ordering = farm.turbine_ordering(wd);
        println!(
            "  wd = {:>5.1}°  ranking = {:?}  ({:.1?})",
            wd,
            ordering.ranking,
            start.elapsed()
        );
    }
}

fn demo_evaluation(farm: Arc<TurbineArray>) -> FarmResult<()> {
    println!("--- Free-stream evaluation ---");
    let mut gcl = WakeBackendDispatcher::with_reference_backends();
    let query = WakeQuery::new(vec![6.0, 9.0, 12.0], 270.0, 0.07)
        .with_settings(SettingsUpdate::default().version("fort_gcl").farm(farm));
    let result = gcl.evaluate(&query)?;

    for (c, row) in result.power.outer_iter().enumerate() {
        let total: f64 = row.sum();
        println!("  case {}: farm power = {:.3} MW", c, total / 1.0e6);
    }
    println!("  C_T (case 0) = {:.3}", result.thrust_coefficient.index_axis(ndarray::Axis(0), 0));
    Ok(())
}

#[cfg(feature = "plotting")]
fn renderer() -> Box<dyn LayoutRenderer> {
    Box::new(farmwake::render::PlottersRenderer::new("farm_layout.png"))
}

#[cfg(not(feature = "plotting"))]
fn renderer() -> Box<dyn LayoutRenderer> {
    Box::new(farmwake::render::NoopRenderer)
}
