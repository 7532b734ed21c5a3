//! Grid warp for per-projector geometric correction.
//!
//! A lattice of control points over the unit square, each carrying a
//! displacement from its canonical position. Evaluation interpolates the
//! displacement field and adds it to the input coordinate.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from editing a warp grid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WarpGridError {
    #[error("control point ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("control point ({row}, {col}) is pinned")]
    Pinned { row: usize, col: usize },
    #[error("displacement must be finite")]
    NonFinite,
}

/// Interpolation between control points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WarpInterpolation {
    /// Bilinear between the four surrounding points
    #[default]
    Linear,
    /// Catmull-Rom over the sixteen surrounding points
    Bicubic,
}

impl WarpInterpolation {
    pub fn display_name(&self) -> &'static str {
        match self {
            WarpInterpolation::Linear => "Linear",
            WarpInterpolation::Bicubic => "Bicubic (Smooth)",
        }
    }
}

/// Vertex for warp mesh rendering.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct WarpVertex {
    /// Warped output position
    pub position: [f32; 2],
    /// Canonical input coordinate
    pub uv: [f32; 2],
}

/// Deformable control-point lattice over `[0, 1]²`.
///
/// Control points are stored row-major; row 0 is `v = 0`, column 0 is `u = 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarpGrid {
    rows: usize,
    cols: usize,
    displacements: Vec<DVec2>,
    pinned: Vec<bool>,
    pub interpolation: WarpInterpolation,
}

impl Default for WarpGrid {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl WarpGrid {
    /// Identity grid with the boundary pinned. At least 2x2.
    pub fn new(rows: usize, cols: usize) -> Self {
        let rows = rows.max(2);
        let cols = cols.max(2);
        let mut grid = Self {
            rows,
            cols,
            displacements: vec![DVec2::ZERO; rows * cols],
            pinned: vec![false; rows * cols],
            interpolation: WarpInterpolation::Linear,
        };
        grid.pin_boundary();
        grid
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn index(&self, row: usize, col: usize) -> Result<usize, WarpGridError> {
        if row < self.rows && col < self.cols {
            Ok(row * self.cols + col)
        } else {
            Err(WarpGridError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    fn is_boundary(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row == self.rows - 1 || col == self.cols - 1
    }

    /// Canonical position of a lattice point.
    pub fn lattice_position(&self, row: usize, col: usize) -> DVec2 {
        DVec2::new(
            col as f64 / (self.cols - 1) as f64,
            row as f64 / (self.rows - 1) as f64,
        )
    }

    pub fn displacement(&self, row: usize, col: usize) -> Option<DVec2> {
        let index = self.index(row, col).ok()?;
        Some(self.displacements[index])
    }

    /// Set the displacement of one control point.
    pub fn set_control_point(
        &mut self,
        row: usize,
        col: usize,
        displacement: DVec2,
    ) -> Result<(), WarpGridError> {
        let index = self.index(row, col)?;
        if self.pinned[index] {
            return Err(WarpGridError::Pinned { row, col });
        }
        if !displacement.is_finite() {
            return Err(WarpGridError::NonFinite);
        }
        self.displacements[index] = displacement;
        Ok(())
    }

    /// Add to the displacement of one control point.
    pub fn move_control_point(
        &mut self,
        row: usize,
        col: usize,
        delta: DVec2,
    ) -> Result<(), WarpGridError> {
        let current = self.displacements[self.index(row, col)?];
        self.set_control_point(row, col, current + delta)
    }

    pub fn is_pinned(&self, row: usize, col: usize) -> bool {
        self.index(row, col).map(|i| self.pinned[i]).unwrap_or(false)
    }

    pub fn set_pinned(
        &mut self,
        row: usize,
        col: usize,
        pinned: bool,
    ) -> Result<(), WarpGridError> {
        let index = self.index(row, col)?;
        self.pinned[index] = pinned;
        Ok(())
    }

    pub fn pin_boundary(&mut self) {
        self.set_boundary_pins(true);
    }

    pub fn unpin_boundary(&mut self) {
        self.set_boundary_pins(false);
    }

    fn set_boundary_pins(&mut self, pinned: bool) {
        for row in 0..self.rows {
            for col in 0..self.cols {
                if self.is_boundary(row, col) {
                    self.pinned[row * self.cols + col] = pinned;
                }
            }
        }
    }

    /// Reset all displacements to zero. Pins are kept.
    pub fn reset(&mut self) {
        self.displacements.fill(DVec2::ZERO);
    }

    pub fn is_identity(&self) -> bool {
        self.displacements.iter().all(|d| *d == DVec2::ZERO)
    }

    /// Displacements of the corners: (0,0), (0,1), (1,0), (1,1) in (u, v).
    pub fn corners(&self) -> [DVec2; 4] {
        let last_row = self.rows - 1;
        let last_col = self.cols - 1;
        [
            self.displacements[0],
            self.displacements[last_col],
            self.displacements[last_row * self.cols],
            self.displacements[last_row * self.cols + last_col],
        ]
    }

    fn at(&self, row: isize, col: isize) -> DVec2 {
        let row = row.clamp(0, self.rows as isize - 1) as usize;
        let col = col.clamp(0, self.cols as isize - 1) as usize;
        self.displacements[row * self.cols + col]
    }

    /// Interpolated displacement at `(u, v)`, clamped to the unit square.
    pub fn displacement_at(&self, u: f64, v: f64) -> DVec2 {
        let u = if u.is_nan() { 0.0 } else { u.clamp(0.0, 1.0) };
        let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        let fx = u * (self.cols - 1) as f64;
        let fy = v * (self.rows - 1) as f64;
        // Last cell owns the far edge so the fraction stays in [0, 1]
        let ix = (fx.floor() as usize).min(self.cols - 2);
        let iy = (fy.floor() as usize).min(self.rows - 2);
        let tx = fx - ix as f64;
        let ty = fy - iy as f64;
        let (ix, iy) = (ix as isize, iy as isize);

        match self.interpolation {
            WarpInterpolation::Linear => {
                let top = self.at(iy, ix).lerp(self.at(iy, ix + 1), tx);
                let bottom = self.at(iy + 1, ix).lerp(self.at(iy + 1, ix + 1), tx);
                top.lerp(bottom, ty)
            }
            WarpInterpolation::Bicubic => {
                let mut rows = [DVec2::ZERO; 4];
                for (k, row) in rows.iter_mut().enumerate() {
                    let r = iy - 1 + k as isize;
                    *row = catmull_rom(
                        self.at(r, ix - 1),
                        self.at(r, ix),
                        self.at(r, ix + 1),
                        self.at(r, ix + 2),
                        tx,
                    );
                }
                catmull_rom(rows[0], rows[1], rows[2], rows[3], ty)
            }
        }
    }

    /// Corrected coordinate for a canonical `(u, v)`.
    pub fn evaluate(&self, u: f64, v: f64) -> DVec2 {
        let u = if u.is_nan() { 0.0 } else { u.clamp(0.0, 1.0) };
        let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        DVec2::new(u, v) + self.displacement_at(u, v)
    }

    /// Change the lattice resolution, resampling the displacement field.
    ///
    /// New points take the old grid's interpolated displacement at their
    /// position, so corners and any aligned lattice points are kept exactly.
    /// A point that coincides with an old lattice point keeps its pin. Other
    /// boundary points follow the nearest old boundary point and other
    /// interior points are free.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        let rows = rows.max(2);
        let cols = cols.max(2);
        if rows == self.rows && cols == self.cols {
            return;
        }

        let mut displacements = Vec::with_capacity(rows * cols);
        let mut pinned = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let u = col as f64 / (cols - 1) as f64;
                let v = row as f64 / (rows - 1) as f64;
                displacements.push(self.displacement_at(u, v));

                let row_aligned = (row * (self.rows - 1)) % (rows - 1) == 0;
                let col_aligned = (col * (self.cols - 1)) % (cols - 1) == 0;
                let on_boundary = row == 0 || col == 0 || row == rows - 1 || col == cols - 1;
                let pin = if (row_aligned && col_aligned) || on_boundary {
                    let old_row = (v * (self.rows - 1) as f64).round() as usize;
                    let old_col = (u * (self.cols - 1) as f64).round() as usize;
                    self.pinned[old_row * self.cols + old_col]
                } else {
                    false
                };
                pinned.push(pin);
            }
        }

        log::debug!(
            "Warp grid resized from {}x{} to {}x{}",
            self.rows,
            self.cols,
            rows,
            cols
        );
        self.rows = rows;
        self.cols = cols;
        self.displacements = displacements;
        self.pinned = pinned;
    }

    /// Triangle list covering the unit square, `subdivisions` quads per side.
    pub fn generate_mesh(&self, subdivisions: u32) -> Vec<WarpVertex> {
        let steps = subdivisions.max(1);
        let mut vertices = Vec::with_capacity((steps * steps * 6) as usize);
        let vertex = |u: f64, v: f64| {
            let p = self.evaluate(u, v);
            WarpVertex {
                position: [p.x as f32, p.y as f32],
                uv: [u as f32, v as f32],
            }
        };

        for sy in 0..steps {
            for sx in 0..steps {
                let u0 = sx as f64 / steps as f64;
                let v0 = sy as f64 / steps as f64;
                let u1 = (sx + 1) as f64 / steps as f64;
                let v1 = (sy + 1) as f64 / steps as f64;

                let p00 = vertex(u0, v0);
                let p10 = vertex(u1, v0);
                let p01 = vertex(u0, v1);
                let p11 = vertex(u1, v1);

                vertices.extend_from_slice(&[p00, p10, p01, p10, p11, p01]);
            }
        }
        vertices
    }
}

fn catmull_rom(p0: DVec2, p1: DVec2, p2: DVec2, p3: DVec2, t: f64) -> DVec2 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid = WarpGrid::new(4, 4);
        assert_eq!(grid.rows(), 4);
        assert_eq!(grid.cols(), 4);
        assert!(grid.is_identity());
        assert!(grid.is_pinned(0, 2));
        assert!(!grid.is_pinned(1, 1));

        let tiny = WarpGrid::new(0, 1);
        assert_eq!((tiny.rows(), tiny.cols()), (2, 2));
    }

    #[test]
    fn test_identity_evaluation() {
        let grid = WarpGrid::new(5, 3);
        let p = grid.evaluate(0.3, 0.7);
        assert!(p.abs_diff_eq(DVec2::new(0.3, 0.7), 1e-12));
        assert!(grid.evaluate(-1.0, 2.0).abs_diff_eq(DVec2::new(0.0, 1.0), 1e-12));
    }

    #[test]
    fn test_pinned_boundary_rejects_edits() {
        let mut grid = WarpGrid::new(4, 4);
        assert_eq!(
            grid.set_control_point(0, 0, DVec2::new(0.1, 0.0)),
            Err(WarpGridError::Pinned { row: 0, col: 0 })
        );
        assert!(matches!(
            grid.set_control_point(4, 0, DVec2::ZERO),
            Err(WarpGridError::OutOfBounds { .. })
        ));
        assert_eq!(
            grid.set_control_point(1, 1, DVec2::new(f64::NAN, 0.0)),
            Err(WarpGridError::NonFinite)
        );
        grid.set_control_point(1, 1, DVec2::new(0.05, 0.0)).unwrap();
        assert!(!grid.is_identity());
        grid.move_control_point(1, 1, DVec2::new(0.05, 0.0)).unwrap();
        assert_eq!(grid.displacement(1, 1), Some(DVec2::new(0.1, 0.0)));
    }

    #[test]
    fn test_control_point_is_interpolated_exactly() {
        let mut grid = WarpGrid::new(4, 4);
        let d = DVec2::new(0.02, -0.03);
        grid.set_control_point(1, 2, d).unwrap();
        for interpolation in [WarpInterpolation::Linear, WarpInterpolation::Bicubic] {
            grid.interpolation = interpolation;
            let lattice = grid.lattice_position(1, 2);
            let p = grid.evaluate(lattice.x, lattice.y);
            assert!(p.abs_diff_eq(lattice + d, 1e-12), "{interpolation:?}");
        }
    }

    #[test]
    fn test_evaluation_is_continuous() {
        let mut grid = WarpGrid::new(4, 4);
        grid.set_control_point(1, 1, DVec2::new(0.1, 0.05)).unwrap();
        grid.set_control_point(2, 2, DVec2::new(-0.08, 0.02)).unwrap();
        let spread = 0.1f64.hypot(0.05) + 0.08f64.hypot(0.02);

        for interpolation in [WarpInterpolation::Linear, WarpInterpolation::Bicubic] {
            grid.interpolation = interpolation;
            let step = 1e-4;
            let mut u = 0.0;
            while u + step <= 1.0 {
                for v in [0.2, 1.0 / 3.0, 0.5, 0.9] {
                    let a = grid.displacement_at(u, v);
                    let b = grid.displacement_at(u + step, v);
                    // Crossing a lattice line must not jump
                    assert!((a - b).length() <= spread * step * 10.0, "{interpolation:?} at {u}");
                }
                u += step;
            }
        }
    }

    #[test]
    fn test_resize_keeps_corners() {
        let mut grid = WarpGrid::new(4, 4);
        grid.unpin_boundary();
        let corners = [
            DVec2::new(0.1, 0.1),
            DVec2::new(-0.1, 0.05),
            DVec2::new(0.02, -0.1),
            DVec2::new(-0.05, -0.05),
        ];
        grid.set_control_point(0, 0, corners[0]).unwrap();
        grid.set_control_point(0, 3, corners[1]).unwrap();
        grid.set_control_point(3, 0, corners[2]).unwrap();
        grid.set_control_point(3, 3, corners[3]).unwrap();
        let before: Vec<DVec2> = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
            .iter()
            .map(|(u, v)| grid.evaluate(*u, *v))
            .collect();

        grid.resize(8, 8);
        assert_eq!((grid.rows(), grid.cols()), (8, 8));
        assert_eq!(grid.corners(), corners);
        let after: Vec<DVec2> = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
            .iter()
            .map(|(u, v)| grid.evaluate(*u, *v))
            .collect();
        for (b, a) in before.iter().zip(&after) {
            assert!(b.abs_diff_eq(*a, 1e-12));
        }
    }

    #[test]
    fn test_resize_keeps_interior_edits() {
        let mut grid = WarpGrid::new(3, 3);
        grid.set_control_point(1, 1, DVec2::new(0.1, 0.0)).unwrap();
        grid.resize(5, 5);
        // Old center lands on new lattice point (2, 2)
        assert_eq!(grid.displacement(2, 2), Some(DVec2::new(0.1, 0.0)));
        assert!(grid.is_pinned(0, 0));
        assert!(!grid.is_pinned(2, 2));
    }

    #[test]
    fn test_resize_leaves_new_interior_points_free() {
        let mut grid = WarpGrid::new(4, 4);
        grid.resize(8, 8);
        for row in 0..8 {
            for col in 0..8 {
                let boundary = row == 0 || col == 0 || row == 7 || col == 7;
                assert_eq!(grid.is_pinned(row, col), boundary, "({}, {})", row, col);
            }
        }

        // A pinned interior point survives where it lands on the new lattice
        let mut grid = WarpGrid::new(3, 3);
        grid.set_pinned(1, 1, true).unwrap();
        grid.resize(5, 5);
        assert!(grid.is_pinned(2, 2));
        assert!(!grid.is_pinned(1, 1));
        assert!(!grid.is_pinned(1, 2));

        // Unpinned edges stay unpinned
        let mut grid = WarpGrid::new(4, 4);
        grid.unpin_boundary();
        grid.resize(6, 6);
        assert!(!grid.is_pinned(0, 3));
        assert!(!grid.is_pinned(5, 5));
    }

    #[test]
    fn test_generate_mesh() {
        let grid = WarpGrid::new(4, 4);
        let mesh = grid.generate_mesh(8);
        assert_eq!(mesh.len(), 8 * 8 * 6);
        assert_eq!(bytemuck::cast_slice::<WarpVertex, u8>(&mesh).len(), mesh.len() * 16);
        assert!(mesh.iter().all(|v| v.position == v.uv));
    }
}
