//! Density surface that keeps the latest frame and draws it as text.

use anyhow::{ensure, Result};
use crowd_pulse_core::{HeatFrame, Vec2};
use crowd_pulse_rendering::{
    overlay::{DebugMarker, ZoneDisc, ZoneLink},
    DensitySurface,
};
use tracing::{debug, trace};

const SHADES: &[u8] = b" .:-=+*#%@";

/// Buckets heat samples into a character grid covering the floor plan.
#[derive(Debug)]
pub(crate) struct TerminalSurface {
    canvas: Vec2,
    columns: usize,
    rows: usize,
    frame: Option<HeatFrame>,
    pushes: u64,
    markers: Vec<DebugMarker>,
    links: usize,
    zones: usize,
}

impl TerminalSurface {
    pub(crate) fn new(canvas: Vec2, columns: usize, rows: usize) -> Self {
        Self {
            canvas,
            columns: columns.max(1),
            rows: rows.max(1),
            frame: None,
            pushes: 0,
            markers: Vec::new(),
            links: 0,
            zones: 0,
        }
    }

    pub(crate) fn pushes(&self) -> u64 {
        self.pushes
    }

    pub(crate) fn links(&self) -> usize {
        self.links
    }

    pub(crate) fn zones(&self) -> usize {
        self.zones
    }

    /// Summed sample weight per cell, row-major.
    pub(crate) fn density_grid(&self) -> Vec<Vec<f32>> {
        let mut grid = vec![vec![0.0; self.columns]; self.rows];
        let Some(frame) = &self.frame else {
            return grid;
        };

        for sample in &frame.samples {
            let column = cell(sample.x, self.canvas.x, self.columns);
            let row = cell(sample.y, self.canvas.y, self.rows);
            grid[row][column] += sample.value;
        }
        grid
    }

    /// Text rendering of the latest frame, with debug markers drawn as `o`.
    pub(crate) fn render(&self) -> String {
        let grid = self.density_grid();
        let peak = grid
            .iter()
            .flatten()
            .fold(0.0_f32, |peak, &value| peak.max(value));

        let mut lines: Vec<Vec<u8>> = grid
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&value| {
                        if peak <= 0.0 {
                            return SHADES[0];
                        }
                        let level = (value / peak * (SHADES.len() - 1) as f32).round() as usize;
                        SHADES[level.min(SHADES.len() - 1)]
                    })
                    .collect()
            })
            .collect();

        for marker in &self.markers {
            let column = cell(marker.position.x, self.canvas.x, self.columns);
            let row = cell(marker.position.y, self.canvas.y, self.rows);
            lines[row][column] = b'o';
        }

        let border = format!("+{}+", "-".repeat(self.columns));
        let mut out = String::with_capacity((self.columns + 3) * (self.rows + 2));
        out.push_str(&border);
        out.push('\n');
        for line in lines {
            out.push('|');
            out.push_str(&String::from_utf8_lossy(&line));
            out.push_str("|\n");
        }
        out.push_str(&border);
        out
    }
}

fn cell(coordinate: f32, extent: f32, cells: usize) -> usize {
    let scaled = (coordinate / extent * cells as f32).floor();
    if scaled.is_nan() || scaled < 0.0 {
        return 0;
    }
    (scaled as usize).min(cells - 1)
}

impl DensitySurface for TerminalSurface {
    fn set_data(&mut self, frame: &HeatFrame) -> Result<()> {
        ensure!(
            frame
                .samples
                .iter()
                .all(|sample| sample.value > 0.0 && sample.value <= frame.max),
            "heat frame carries a sample outside (0, {}]",
            frame.max
        );

        self.pushes += 1;
        trace!(samples = frame.samples.len(), "terminal surface updated");
        self.frame = Some(frame.clone());
        Ok(())
    }

    fn draw_debug(&mut self, markers: &[DebugMarker]) -> Result<()> {
        self.markers.clear();
        self.markers.extend_from_slice(markers);
        Ok(())
    }

    fn draw_links(&mut self, links: &[ZoneLink]) -> Result<()> {
        self.links = links.len();
        debug!(links = links.len(), "zone links redrawn");
        Ok(())
    }

    fn draw_zones(&mut self, discs: &[ZoneDisc]) -> Result<()> {
        self.zones = discs.len();
        debug!(zones = discs.len(), "zone discs redrawn");
        Ok(())
    }
}
