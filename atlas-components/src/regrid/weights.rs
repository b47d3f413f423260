//! Conservative remapping weights.
//!
//! Cells are treated as polygons in the cylindrical equal-area plane `(lon, sin(lat))`,
//! where the area of a longitude/latitude box is proportional to its area on the sphere.
//! The weight linking a source and a destination cell is the area of their intersection,
//! found by clipping the source polygon against the (convex) destination polygon.
//!
//! Longitude is periodic: every source cell is also tried shifted by ±360°.
//!
//! Normalisation follows the `conservative_normed` scheme: a destination value is the
//! overlap-weighted mean of the contributing source values, so partially covered
//! destination cells are not diluted. Destination cells without any contribution are NaN.

use crate::regrid::grid::GridDescriptor;
use atlas_core::errors::{AtlasError, AtlasResult};
use log::{debug, warn};
use ndarray::{Array2, ArrayD, ArrayView2, Axis, IxDyn};

/// Polygons below this area (in degree units of the equal-area plane) are degenerate.
const MIN_AREA: f64 = 1e-12;

/// Corners further than this from the prime meridian are treated as fill values.
/// unit: degrees
const MAX_LONGITUDE: f64 = 720.0;

const PERIODIC_SHIFTS: [f64; 3] = [-360.0, 0.0, 360.0];

type Point = (f64, f64);

#[derive(Debug, Clone, Copy)]
struct BoundingBox {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl BoundingBox {
    fn of(points: &[Point]) -> Self {
        points.iter().fold(
            BoundingBox {
                x_min: f64::INFINITY,
                x_max: f64::NEG_INFINITY,
                y_min: f64::INFINITY,
                y_max: f64::NEG_INFINITY,
            },
            |b, (x, y)| BoundingBox {
                x_min: b.x_min.min(*x),
                x_max: b.x_max.max(*x),
                y_min: b.y_min.min(*y),
                y_max: b.y_max.max(*y),
            },
        )
    }

    fn union(&self, other: &Self) -> Self {
        BoundingBox {
            x_min: self.x_min.min(other.x_min),
            x_max: self.x_max.max(other.x_max),
            y_min: self.y_min.min(other.y_min),
            y_max: self.y_max.max(other.y_max),
        }
    }

    fn shifted(&self, dx: f64) -> Self {
        BoundingBox {
            x_min: self.x_min + dx,
            x_max: self.x_max + dx,
            ..*self
        }
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.x_min < other.x_max
            && other.x_min < self.x_max
            && self.y_min < other.y_max
            && other.y_min < self.y_max
    }
}

/// A simple polygon with counter-clockwise vertices.
#[derive(Debug, Clone)]
struct Polygon {
    points: Vec<Point>,
}

fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|k| {
            let (x0, y0) = points[k];
            let (x1, y1) = points[(k + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum::<f64>()
        / 2.0
}

fn cross(a: Point, b: Point, p: Point) -> f64 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

fn intersection(p: Point, q: Point, a: Point, b: Point) -> Point {
    let dp = cross(a, b, p);
    let dq = cross(a, b, q);
    let t = dp / (dp - dq);
    (p.0 + t * (q.0 - p.0), p.1 + t * (q.1 - p.1))
}

impl Polygon {
    /// Project a lon/lat cell into the equal-area plane.
    ///
    /// Longitudes are unwrapped around the first corner so cells crossing the antimeridian
    /// stay contiguous. Returns `None` for degenerate cells.
    fn from_cell(corners: &[(f64, f64); 4]) -> Option<Self> {
        if corners.iter().any(|(lon, lat)| {
            !lon.is_finite() || !lat.is_finite() || lon.abs() > MAX_LONGITUDE
        }) {
            return None;
        }
        let (lon_min, lon_max) = corners
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (lon, _)| {
                (lo.min(*lon), hi.max(*lon))
            });
        if lon_max - lon_min > 360.0 {
            return None;
        }
        let reference = corners[0].0;
        let mut points: Vec<Point> = corners
            .iter()
            .map(|(lon, lat)| {
                let x = reference + (lon - reference + 180.0).rem_euclid(360.0) - 180.0;
                (x, lat.clamp(-90.0, 90.0).to_radians().sin())
            })
            .collect();
        let area = signed_area(&points);
        if area.abs() < MIN_AREA {
            return None;
        }
        if area < 0.0 {
            points.reverse();
        }
        Some(Self { points })
    }

    fn area(&self) -> f64 {
        signed_area(&self.points).abs()
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::of(&self.points)
    }

    fn shifted(&self, dx: f64) -> Self {
        Self {
            points: self.points.iter().map(|(x, y)| (x + dx, *y)).collect(),
        }
    }

    /// Area of the intersection with a convex polygon (Sutherland-Hodgman).
    fn overlap_area(&self, convex: &Polygon) -> f64 {
        let mut output = self.points.clone();
        let n = convex.points.len();
        for k in 0..n {
            if output.is_empty() {
                return 0.0;
            }
            let a = convex.points[k];
            let b = convex.points[(k + 1) % n];
            let input = std::mem::take(&mut output);
            let m = input.len();
            for index in 0..m {
                let current = input[index];
                let previous = input[(index + m - 1) % m];
                let current_inside = cross(a, b, current) >= 0.0;
                let previous_inside = cross(a, b, previous) >= 0.0;
                if current_inside {
                    if !previous_inside {
                        output.push(intersection(previous, current, a, b));
                    }
                    output.push(current);
                } else if previous_inside {
                    output.push(intersection(previous, current, a, b));
                }
            }
        }
        if output.len() < 3 {
            return 0.0;
        }
        signed_area(&output).abs()
    }
}

/// Uniform bins over the destination cells, used to find overlap candidates.
struct BinIndex {
    bounds: BoundingBox,
    nx: usize,
    ny: usize,
    bins: Vec<Vec<usize>>,
}

impl BinIndex {
    fn new(boxes: &[Option<BoundingBox>]) -> Self {
        let bounds = boxes
            .iter()
            .flatten()
            .copied()
            .reduce(|a, b| a.union(&b))
            .unwrap_or(BoundingBox {
                x_min: 0.0,
                x_max: 0.0,
                y_min: 0.0,
                y_max: 0.0,
            });
        let side = ((boxes.len() as f64).sqrt().ceil() as usize).clamp(1, 512);
        let mut index = Self {
            bounds,
            nx: side,
            ny: side,
            bins: vec![Vec::new(); side * side],
        };
        for (cell, bbox) in boxes.iter().enumerate() {
            if let Some(bbox) = bbox {
                let (i0, i1, j0, j1) = index.bin_range(bbox);
                for j in j0..=j1 {
                    for i in i0..=i1 {
                        index.bins[j * index.nx + i].push(cell);
                    }
                }
            }
        }
        index
    }

    fn bin_of(value: f64, min: f64, max: f64, n: usize) -> usize {
        let width = max - min;
        if width <= 0.0 {
            return 0;
        }
        let position = ((value - min) / width * n as f64).floor();
        position.clamp(0.0, (n - 1) as f64) as usize
    }

    fn bin_range(&self, bbox: &BoundingBox) -> (usize, usize, usize, usize) {
        let b = &self.bounds;
        (
            Self::bin_of(bbox.x_min, b.x_min, b.x_max, self.nx),
            Self::bin_of(bbox.x_max, b.x_min, b.x_max, self.nx),
            Self::bin_of(bbox.y_min, b.y_min, b.y_max, self.ny),
            Self::bin_of(bbox.y_max, b.y_min, b.y_max, self.ny),
        )
    }

    /// Cells whose bins intersect `bbox`, sorted and without duplicates.
    fn candidates(&self, bbox: &BoundingBox, out: &mut Vec<usize>) {
        out.clear();
        if !bbox.overlaps(&self.bounds) {
            return;
        }
        let (i0, i1, j0, j1) = self.bin_range(bbox);
        for j in j0..=j1 {
            for i in i0..=i1 {
                out.extend_from_slice(&self.bins[j * self.nx + i]);
            }
        }
        out.sort_unstable();
        out.dedup();
    }
}

/// Sparse conservative weights between two grids.
///
/// Row `d` lists `(source cell, overlap area)` pairs for destination cell `d`. Cells are
/// numbered in row-major `(j, i)` order.
#[derive(Debug, Clone, PartialEq)]
pub struct RegridWeights {
    source_shape: (usize, usize),
    destination_shape: (usize, usize),
    rows: Vec<Vec<(usize, f64)>>,
}

impl RegridWeights {
    /// Compute the overlap of every valid source cell with every valid destination cell.
    ///
    /// Source cells with non-finite corners or a vanishing area are skipped.
    pub fn build(source: &GridDescriptor, destination: &GridDescriptor) -> AtlasResult<Self> {
        let (dst_ny, dst_nx) = destination.shape();
        let destination_polygons: Vec<Option<Polygon>> = (0..dst_ny)
            .flat_map(|j| (0..dst_nx).map(move |i| (j, i)))
            .map(|(j, i)| {
                if destination.mask[[j, i]] {
                    Polygon::from_cell(&destination.cell_corners(j, i))
                } else {
                    None
                }
            })
            .collect();
        let boxes: Vec<Option<BoundingBox>> = destination_polygons
            .iter()
            .map(|polygon| polygon.as_ref().map(Polygon::bounding_box))
            .collect();
        let index = BinIndex::new(&boxes);

        let (src_ny, src_nx) = source.shape();
        let mut rows = vec![Vec::new(); dst_ny * dst_nx];
        let mut degenerate = 0usize;
        let mut candidates = Vec::new();
        for j in 0..src_ny {
            for i in 0..src_nx {
                if !source.mask[[j, i]] {
                    continue;
                }
                let Some(polygon) = Polygon::from_cell(&source.cell_corners(j, i)) else {
                    degenerate += 1;
                    continue;
                };
                let source_index = j * src_nx + i;
                let bbox = polygon.bounding_box();
                for shift in PERIODIC_SHIFTS {
                    index.candidates(&bbox.shifted(shift), &mut candidates);
                    if candidates.is_empty() {
                        continue;
                    }
                    let shifted = polygon.shifted(shift);
                    for &target in &candidates {
                        let Some(destination_polygon) = &destination_polygons[target] else {
                            continue;
                        };
                        if !boxes[target].is_some_and(|b| b.overlaps(&bbox.shifted(shift))) {
                            continue;
                        }
                        let area = shifted.overlap_area(destination_polygon);
                        if area > MIN_AREA * destination_polygon.area() {
                            rows[target].push((source_index, area));
                        }
                    }
                }
            }
        }
        if degenerate > 0 {
            warn!("Skipped {degenerate} degenerate source cells");
        }
        debug!(
            "Built conservative weights: {} links for {} destination cells",
            rows.iter().map(Vec::len).sum::<usize>(),
            rows.len()
        );

        Ok(Self {
            source_shape: (src_ny, src_nx),
            destination_shape: (dst_ny, dst_nx),
            rows,
        })
    }

    pub fn source_shape(&self) -> (usize, usize) {
        self.source_shape
    }

    pub fn destination_shape(&self) -> (usize, usize) {
        self.destination_shape
    }

    /// Contributions to destination cell `(j, i)`
    pub fn contributions(&self, j: usize, i: usize) -> &[(usize, f64)] {
        &self.rows[j * self.destination_shape.1 + i]
    }

    /// Remap a single `(ny, nx)` field.
    ///
    /// NaN source values are left out of the weighted mean.
    pub fn apply(&self, field: ArrayView2<f64>) -> AtlasResult<Array2<f64>> {
        if field.dim() != self.source_shape {
            return Err(AtlasError::Shape(format!(
                "field of shape {:?} does not match the source grid {:?}",
                field.dim(),
                self.source_shape
            )));
        }
        let src_nx = self.source_shape.1;
        let values: Vec<f64> = self
            .rows
            .iter()
            .map(|row| {
                let (total, area) = row.iter().fold((0.0, 0.0), |(total, area), (source, w)| {
                    let value = field[[source / src_nx, source % src_nx]];
                    if value.is_nan() {
                        (total, area)
                    } else {
                        (total + w * value, area + w)
                    }
                });
                if area > 0.0 {
                    total / area
                } else {
                    f64::NAN
                }
            })
            .collect();
        Array2::from_shape_vec(self.destination_shape, values)
            .map_err(|err| AtlasError::Shape(err.to_string()))
    }

    /// Remap an array whose last two axes are the source `(y, x)` axes.
    pub fn apply_nd(&self, data: &ArrayD<f64>) -> AtlasResult<ArrayD<f64>> {
        let ndim = data.ndim();
        if ndim < 2 {
            return Err(AtlasError::Shape(format!(
                "expected at least 2 axes, got {ndim}"
            )));
        }
        let (src_ny, src_nx) = self.source_shape;
        let (dst_ny, dst_nx) = self.destination_shape;
        if data.shape()[ndim - 2..] != [src_ny, src_nx] {
            return Err(AtlasError::Shape(format!(
                "array of shape {:?} does not end with the source grid {:?}",
                data.shape(),
                self.source_shape
            )));
        }
        let leading: Vec<usize> = data.shape()[..ndim - 2].to_vec();
        let n_fields: usize = leading.iter().product();

        let fields = data
            .as_standard_layout()
            .into_owned()
            .into_shape((n_fields, src_ny, src_nx))
            .map_err(|err| AtlasError::Shape(err.to_string()))?;
        let mut out = ndarray::Array3::from_elem((n_fields, dst_ny, dst_nx), f64::NAN);
        for (field, mut target) in fields.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
            target.assign(&self.apply(field)?);
        }

        let mut shape = leading;
        shape.extend([dst_ny, dst_nx]);
        out.into_shape(IxDyn(&shape))
            .map_err(|err| AtlasError::Shape(err.to_string()))
    }
}
