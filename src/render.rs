//! Optional farm layout rendering.
//!
//! Rendering never feeds back into the computations: callers go through
//! [`render_or_warn`], which turns any renderer failure into a warning.

use std::error::Error;

use crate::farm::{TurbineArray, TurbineOrdering};

/// Error raised by a renderer.
pub type RenderError = Box<dyn Error + Send + Sync>;

/// Draws a farm layout, optionally annotated with a turbine ordering.
pub trait LayoutRenderer {
    /// Draw `farm`, colouring by `ordering` when given.
    fn render(&self, farm: &TurbineArray, ordering: Option<&TurbineOrdering>) -> Result<(), RenderError>;
}

/// Renderer that draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

impl LayoutRenderer for NoopRenderer {
    fn render(&self, _farm: &TurbineArray, _ordering: Option<&TurbineOrdering>) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Render, logging a warning instead of failing. Returns whether it worked.
pub fn render_or_warn(
    renderer: &dyn LayoutRenderer,
    farm: &TurbineArray,
    ordering: Option<&TurbineOrdering>,
) -> bool {
    match renderer.render(farm, ordering) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Rendering {} failed, continuing without a plot: {}", farm.name(), e);
            false
        }
    }
}

#[cfg(feature = "plotting")]
pub use self::plotting::PlottersRenderer;

#[cfg(feature = "plotting")]
mod plotting {
    use std::path::PathBuf;

    use plotters::prelude::*;

    use super::{LayoutRenderer, RenderError};
    use crate::farm::{TurbineArray, TurbineOrdering};

    /// PNG scatter of turbine positions in rotor diameters, coloured and
    /// labelled by upstream rank.
    #[derive(Debug, Clone)]
    pub struct PlottersRenderer {
        /// Output PNG path
        pub path: PathBuf,
        /// Image size in pixels
        pub size: (u32, u32),
    }

    impl PlottersRenderer {
        /// Renderer writing an 800×800 PNG to `path`.
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self {
                path: path.into(),
                size: (800, 800),
            }
        }
    }

    fn rank_color(rank: usize, count: usize) -> RGBColor {
        if count <= 1 {
            return RGBColor(128, 128, 128);
        }
        let t = rank as f64 / (count - 1) as f64;
        RGBColor((255.0 * (1.0 - t)) as u8, (255.0 * t) as u8, 0)
    }

    impl LayoutRenderer for PlottersRenderer {
        fn render(&self, farm: &TurbineArray, ordering: Option<&TurbineOrdering>) -> Result<(), RenderError> {
            let diameter = 2.0 * farm.rotor_radii().fold(0.0_f64, |a, &r| a.max(r));
            let points: Vec<(f64, f64)> = farm
                .positions()
                .iter()
                .map(|p| (p.x / diameter, p.y / diameter))
                .collect();
            let (mut x_min, mut x_max, mut y_min, mut y_max) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
            for &(x, y) in &points {
                x_min = x_min.min(x);
                x_max = x_max.max(x);
                y_min = y_min.min(y);
                y_max = y_max.max(y);
            }

            let root = BitMapBackend::new(&self.path, self.size).into_drawing_area();
            root.fill(&WHITE)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(farm.name(), ("sans-serif", 24))
                .margin(20)
                .x_label_area_size(30)
                .y_label_area_size(30)
                .build_cartesian_2d((x_min - 2.0)..(x_max + 2.0), (y_min - 2.0)..(y_max + 2.0))?;
            chart.configure_mesh().x_desc("x/D").y_desc("y/D").draw()?;

            let ranks = ordering.map(TurbineOrdering::ranks);
            let n = points.len();
            for (i, &(x, y)) in points.iter().enumerate() {
                let rank = ranks.as_ref().map(|r| r[i]);
                let color = rank.map_or(BLUE, |r| rank_color(r, n));
                chart.draw_series(std::iter::once(Circle::new((x, y), 5, color.filled())))?;
                let label = rank.map_or_else(|| farm.turbines()[i].name().to_string(), |r| r.to_string());
                chart.draw_series(std::iter::once(Text::new(label, (x, y), ("sans-serif", 14))))?;
            }

            root.present()?;
            Ok(())
        }
    }
}
