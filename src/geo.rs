//! Great-circle distance and the rounded-coordinate grid.
//!
//! The grid serves two purposes: it indexes complaints by location so duplicate
//! detection only looks at nearby candidates, and it keys the lock stripes that
//! make check-then-create atomic per neighbourhood.

use serde::{Deserialize, Serialize};

use crate::models::Coordinates;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Above this latitude every longitude falls into one cell column.
pub const POLAR_LATITUDE: f64 = 85.0;

/// Great-circle distance between two points, in meters.
#[must_use]
pub fn haversine_m(a: Coordinates, b: Coordinates) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lon - a.lon).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // Rounding can push near-antipodal points just past 1.
    let h = h.min(1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// A cell of the rounded-coordinate grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    /// Row index (latitude band)
    pub row: i64,
    /// Column index (longitude band); always 0 in polar rows
    pub col: i64,
}

/// Maps coordinates to grid cells of a fixed angular size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    cell_degrees: f64,
}

impl Grid {
    /// Create a grid with square cells of `cell_degrees`.
    #[must_use]
    pub const fn new(cell_degrees: f64) -> Self {
        Self { cell_degrees }
    }

    /// Cell size in degrees.
    #[must_use]
    pub const fn cell_degrees(&self) -> f64 {
        self.cell_degrees
    }

    #[allow(clippy::cast_possible_truncation)]
    fn index(&self, degrees: f64) -> i64 {
        (degrees / self.cell_degrees).floor() as i64
    }

    fn is_polar_row(&self, row: i64) -> bool {
        #[allow(clippy::cast_precision_loss)]
        let south_edge = row as f64 * self.cell_degrees;
        let north_edge = south_edge + self.cell_degrees;
        south_edge >= POLAR_LATITUDE || north_edge <= -POLAR_LATITUDE
    }

    /// Cell containing a point.
    #[must_use]
    pub fn cell_of(&self, coords: Coordinates) -> GridCell {
        let row = self.index(coords.lat);
        let col = if self.is_polar_row(row) {
            0
        } else {
            // Longitude 180 shares a column with -180.
            wrap_col(self.index(coords.lon), self.cell_degrees)
        };
        GridCell { row, col }
    }

    /// The 3x3 neighbourhood around a point, deduplicated and sorted.
    ///
    /// Every point within one cell width of `coords` lies in one of these cells,
    /// provided the cell is wider than the search radius at that latitude.
    #[must_use]
    pub fn neighbourhood(&self, coords: Coordinates) -> Vec<GridCell> {
        let center = self.cell_of(coords);
        let mut cells = Vec::with_capacity(9);
        for d_row in -1..=1 {
            let row = center.row + d_row;
            if self.is_polar_row(row) {
                cells.push(GridCell { row, col: 0 });
                continue;
            }
            let base_col = if self.is_polar_row(center.row) {
                self.index(coords.lon)
            } else {
                center.col
            };
            for d_col in -1..=1 {
                cells.push(GridCell {
                    row,
                    col: wrap_col(base_col + d_col, self.cell_degrees),
                });
            }
        }
        cells.sort_unstable();
        cells.dedup();
        cells
    }

    /// Smallest cell width, in meters, outside the polar rows.
    #[must_use]
    pub fn min_cell_width_m(&self) -> f64 {
        let lon_width = self.cell_degrees.to_radians() * POLAR_LATITUDE.to_radians().cos();
        EARTH_RADIUS_M * lon_width.min(self.cell_degrees.to_radians())
    }
}

/// Keep column indices on the antimeridian consistent with `cell_of`.
#[allow(clippy::cast_possible_truncation)]
fn wrap_col(col: i64, cell_degrees: f64) -> i64 {
    let columns = (360.0 / cell_degrees).round() as i64;
    let min = (-180.0 / cell_degrees).floor() as i64;
    (col - min).rem_euclid(columns) + min
}
