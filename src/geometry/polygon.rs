use serde::{Deserialize, Serialize};

/// Integer pixel position in the reference frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Named closed polygon. Vertices are kept in file order; the closing edge
/// runs from the last vertex back to the first.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    name: String,
    points: Vec<Point>,
    min: Point,
    max: Point,
}

impl Polygon {
    /// Build a polygon; `None` when fewer than three vertices are given
    pub fn new(name: impl Into<String>, points: Vec<Point>) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }

        let mut min = points[0];
        let mut max = points[0];
        for p in &points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }

        Some(Self {
            name: name.into(),
            points,
            min,
            max,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Inclusive containment test: points on an edge or vertex are inside.
    ///
    /// Even-odd ray casting toward +x, evaluated with exact integer cross
    /// products so that edge hits never depend on float rounding.
    pub fn contains(&self, p: Point) -> bool {
        if p.x < self.min.x || p.x > self.max.x || p.y < self.min.y || p.y > self.max.y {
            return false;
        }

        let (px, py) = (p.x as i64, p.y as i64);
        let n = self.points.len();
        let mut inside = false;
        let mut j = n - 1;

        for i in 0..n {
            let (xi, yi) = (self.points[i].x as i64, self.points[i].y as i64);
            let (xj, yj) = (self.points[j].x as i64, self.points[j].y as i64);

            if on_segment((xj, yj), (xi, yi), (px, py)) {
                return true;
            }

            if (yi > py) != (yj > py) {
                // px lies left of the edge's crossing with the horizontal line y = py
                let lhs = (px - xi) * (yj - yi);
                let rhs = (xj - xi) * (py - yi);
                let crosses = if yj > yi { lhs < rhs } else { lhs > rhs };
                if crosses {
                    inside = !inside;
                }
            }

            j = i;
        }

        inside
    }

    /// Scale every vertex by independent per-axis factors, truncating toward zero
    pub fn scaled(&self, sx: f64, sy: f64) -> Polygon {
        let points = self
            .points
            .iter()
            .map(|p| Point::new((p.x as f64 * sx) as i32, (p.y as f64 * sy) as i32))
            .collect();
        // Scaling preserves the vertex count, so the polygon stays valid
        Polygon::new(self.name.clone(), points).unwrap_or_else(|| self.clone())
    }
}

fn on_segment(a: (i64, i64), b: (i64, i64), p: (i64, i64)) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    cross == 0
        && p.0 >= a.0.min(b.0)
        && p.0 <= a.0.max(b.0)
        && p.1 >= a.1.min(b.1)
        && p.1 <= a.1.max(b.1)
}
