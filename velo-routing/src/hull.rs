//! Incremental convex hull over cost points
//!
//! The enumerator needs three operations from its cost-space triangulation:
//! insert a point, enumerate the full cells incident to the infinite vertex
//! (the hull facets), and read the vertices of a cell. This module provides
//! them for the fixed cost dimension, handling degenerate point sets by
//! their affine rank: a full-rank set has triangle facets, a planar set has
//! hull edges, anything flatter has no cells to explore.
//!
//! Facets are recomputed after each insert (point counts stay small, one
//! per discovered route). Cell identity is the sorted vertex set, which
//! keys the persistent `checked`/`priority` flags; a cell that stops being
//! a facet simply no longer appears.

use rustc_hash::FxHashMap;

use crate::cost::EDGE_COST_DIMENSION;

pub type VertexId = usize;
pub type CellKey = Vec<VertexId>;

type Point = [f64; EDGE_COST_DIMENSION];

#[derive(Debug, Clone)]
struct CellData {
    checked: bool,
    prio: f64,
}

#[derive(Debug, Default)]
pub struct CostHull {
    points: Vec<Point>,
    cells: FxHashMap<CellKey, CellData>,
}

impl CostHull {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cost point; an exact duplicate returns the existing vertex.
    pub fn insert(&mut self, point: Point) -> VertexId {
        if let Some(existing) = self
            .points
            .iter()
            .position(|p| p.iter().zip(point.iter()).all(|(a, b)| (a - b).abs() <= 1e-12))
        {
            return existing;
        }
        self.points.push(point);
        self.points.len() - 1
    }

    pub fn point(&self, vertex: VertexId) -> Point {
        self.points[vertex]
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn checked(&self, key: &CellKey) -> bool {
        self.cells.get(key).map(|data| data.checked).unwrap_or(false)
    }

    pub fn set_checked(&mut self, key: &CellKey) {
        self.entry(key).checked = true;
    }

    pub fn prio(&self, key: &CellKey) -> f64 {
        self.cells.get(key).map(|data| data.prio).unwrap_or(-1.0)
    }

    pub fn set_prio(&mut self, key: &CellKey, prio: f64) {
        self.entry(key).prio = prio;
    }

    fn entry(&mut self, key: &CellKey) -> &mut CellData {
        self.cells
            .entry(key.clone())
            .or_insert(CellData { checked: false, prio: -1.0 })
    }

    /// The current hull facets as sorted vertex-id sets.
    pub fn full_cells(&self) -> Vec<CellKey> {
        let scale = self
            .points
            .iter()
            .flat_map(|p| p.iter())
            .fold(1.0f64, |acc, &v| acc.max(v.abs()));
        let eps = 1e-9 * scale;

        let basis = self.affine_basis(eps);
        let mut cells = match basis.len() {
            3 => self.facets_rank3(eps),
            2 => self.facets_rank2(&basis),
            1 => self.facets_rank1(&basis),
            _ => Vec::new(),
        };
        for cell in &mut cells {
            cell.sort_unstable();
        }
        cells.sort();
        cells.dedup();
        cells
    }

    fn affine_basis(&self, eps: f64) -> Vec<Point> {
        let mut basis: Vec<Point> = Vec::new();
        let Some(&origin) = self.points.first() else {
            return basis;
        };
        for point in &self.points[1..] {
            let mut v = sub(*point, origin);
            for b in &basis {
                let projection = dot(v, *b);
                v = sub(v, scaled(*b, projection));
            }
            let len = dot(v, v).sqrt();
            if len > eps {
                basis.push(scaled(v, 1.0 / len));
                if basis.len() == EDGE_COST_DIMENSION {
                    break;
                }
            }
        }
        basis
    }

    fn facets_rank3(&self, eps: f64) -> Vec<CellKey> {
        let n = self.points.len();
        let mut cells = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                for k in (j + 1)..n {
                    let normal = cross(
                        sub(self.points[j], self.points[i]),
                        sub(self.points[k], self.points[i]),
                    );
                    if dot(normal, normal).sqrt() <= eps {
                        continue;
                    }
                    let mut above = false;
                    let mut below = false;
                    for (other, point) in self.points.iter().enumerate() {
                        if other == i || other == j || other == k {
                            continue;
                        }
                        let side = dot(normal, sub(*point, self.points[i]));
                        if side > eps {
                            above = true;
                        } else if side < -eps {
                            below = true;
                        }
                        if above && below {
                            break;
                        }
                    }
                    if !(above && below) {
                        cells.push(vec![i, j, k]);
                    }
                }
            }
        }
        cells
    }

    fn facets_rank2(&self, basis: &[Point]) -> Vec<CellKey> {
        let origin = self.points[0];
        let mut planar: Vec<(f64, f64, VertexId)> = self
            .points
            .iter()
            .enumerate()
            .map(|(id, p)| {
                let v = sub(*p, origin);
                (dot(v, basis[0]), dot(v, basis[1]), id)
            })
            .collect();
        planar.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let cross2 = |o: &(f64, f64, VertexId), a: &(f64, f64, VertexId), b: &(f64, f64, VertexId)| {
            (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
        };

        let mut lower: Vec<(f64, f64, VertexId)> = Vec::new();
        for p in &planar {
            while lower.len() >= 2 && cross2(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
                lower.pop();
            }
            lower.push(*p);
        }
        let mut upper: Vec<(f64, f64, VertexId)> = Vec::new();
        for p in planar.iter().rev() {
            while upper.len() >= 2 && cross2(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
                upper.pop();
            }
            upper.push(*p);
        }
        lower.pop();
        upper.pop();
        let hull: Vec<(f64, f64, VertexId)> = lower.into_iter().chain(upper).collect();

        if hull.len() < 2 {
            return Vec::new();
        }
        (0..hull.len())
            .map(|i| vec![hull[i].2, hull[(i + 1) % hull.len()].2])
            .collect()
    }

    fn facets_rank1(&self, basis: &[Point]) -> Vec<CellKey> {
        let origin = self.points[0];
        let positions: Vec<f64> = self
            .points
            .iter()
            .map(|p| dot(sub(*p, origin), basis[0]))
            .collect();
        let min = positions
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(id, _)| id);
        let max = positions
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(id, _)| id);
        match (min, max) {
            (Some(lo), Some(hi)) if lo != hi => vec![vec![lo], vec![hi]],
            _ => Vec::new(),
        }
    }
}

fn sub(a: Point, b: Point) -> Point {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scaled(a: Point, factor: f64) -> Point {
    [a[0] * factor, a[1] * factor, a[2] * factor]
}

fn dot(a: Point, b: Point) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: Point, b: Point) -> Point {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
