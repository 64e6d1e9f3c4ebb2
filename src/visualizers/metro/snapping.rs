//! Snapping lines onto the unit grid with octilinear segments.
//!
//! Every candidate starts at one of the four grid points around one of
//! the original bin centres. From there a recursive search picks the
//! best-fitting snapped sub-line towards each end of the line: each step
//! may move along any of the eight compass directions by a step count near
//! the projection of the next centre onto that direction, or stay put.
//! Sub-line scores are memoized per index and grid point, so every anchor
//! shares the same search. The candidate with the smallest summed
//! deviation wins.

use std::collections::HashMap;

use crate::geometry::Point;

/// The eight compass directions, clockwise from east.
pub const DIRECTIONS: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Compass index of the segment `from → to`, `None` for zero length or
/// directions that are not multiples of 45°.
#[must_use]
pub fn direction_index(from: Point, to: Point) -> Option<usize> {
    let dx = (to.x - from.x).round() as i64;
    let dy = (to.y - from.y).round() as i64;
    if dx == 0 && dy == 0 {
        return None;
    }
    if dx != 0 && dy != 0 && dx.abs() != dy.abs() {
        return None;
    }
    let unit = (dx.signum(), dy.signum());
    DIRECTIONS.iter().position(|d| *d == unit)
}

/// Snapped version of `line` on an `x_size × y_size` grid.
#[must_use]
pub fn snap_line(line: &[Point], x_size: usize, y_size: usize) -> Vec<Point> {
    let bounds = Bounds {
        max_x: x_size.saturating_sub(1) as i64,
        max_y: y_size.saturating_sub(1) as i64,
    };
    let mut search = Search {
        line,
        bounds,
        memo: HashMap::new(),
    };
    let mut best: Option<(f64, usize, Cell)> = None;
    for anchor in 0..line.len() {
        for start in bounds.corners(line[anchor]) {
            let cost = deviation(start, line[anchor])
                + search.best(Walk::Forward, anchor, start).0
                + search.best(Walk::Backward, anchor, start).0;
            if best.map_or(true, |(c, _, _)| cost < c) {
                best = Some((cost, anchor, start));
            }
        }
    }
    let Some((_, anchor, start)) = best else {
        return Vec::new();
    };
    let mut cells = search.path(Walk::Backward, anchor, start);
    cells.reverse();
    cells.push(start);
    cells.extend(search.path(Walk::Forward, anchor, start));
    cells
        .into_iter()
        .map(|(x, y)| Point::new(x as f64, y as f64))
        .collect()
}

type Cell = (i64, i64);

#[derive(Clone, Copy)]
struct Bounds {
    max_x: i64,
    max_y: i64,
}

impl Bounds {
    fn contains(self, (x, y): Cell) -> bool {
        (0..=self.max_x).contains(&x) && (0..=self.max_y).contains(&y)
    }

    fn clamp(self, (x, y): Cell) -> Cell {
        (x.clamp(0, self.max_x), y.clamp(0, self.max_y))
    }

    /// The four grid points around `p`, clamped to the grid.
    fn corners(self, p: Point) -> Vec<Cell> {
        let (x0, x1) = (p.x.floor() as i64, p.x.ceil() as i64);
        let (y0, y1) = (p.y.floor() as i64, p.y.ceil() as i64);
        let mut out: Vec<Cell> = Vec::with_capacity(4);
        for c in [(x0, y0), (x1, y0), (x0, y1), (x1, y1)] {
            let c = self.clamp(c);
            if !out.contains(&c) {
                out.push(c);
            }
        }
        out
    }

    /// Largest step count from `from` along `(dx, dy)` that stays on the grid.
    fn reach(self, from: Cell, (dx, dy): (i64, i64)) -> i64 {
        let mut k = 0;
        while self.contains((from.0 + (k + 1) * dx, from.1 + (k + 1) * dy)) {
            k += 1;
        }
        k
    }
}

fn deviation((x, y): Cell, p: Point) -> f64 {
    Point::new(x as f64, y as f64).distance(p)
}

/// Grid points worth trying after `from` when the next centre is `target`:
/// `from` itself, plus per direction the step counts within one of the
/// projection of `target`, or the furthest step when the grid ends first.
fn candidates(from: Cell, target: Point, bounds: Bounds) -> Vec<Cell> {
    let mut out = vec![from];
    let ox = target.x - from.0 as f64;
    let oy = target.y - from.1 as f64;
    for (dx, dy) in DIRECTIONS {
        let along = (ox * dx as f64 + oy * dy as f64) / (dx * dx + dy * dy) as f64;
        let hi = (along.ceil() as i64 + 1).min(bounds.reach(from, (dx, dy)));
        if hi < 1 {
            continue;
        }
        let lo = (along.floor() as i64 - 1).max(1).min(hi);
        for k in lo..=hi {
            let c = (from.0 + k * dx, from.1 + k * dy);
            if !out.contains(&c) {
                out.push(c);
            }
        }
    }
    out
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Walk {
    Forward,
    Backward,
}

impl Walk {
    fn next(self, i: usize, len: usize) -> Option<usize> {
        match self {
            Self::Forward => (i + 1 < len).then_some(i + 1),
            Self::Backward => i.checked_sub(1),
        }
    }
}

struct Search<'a> {
    line: &'a [Point],
    bounds: Bounds,
    memo: HashMap<(Walk, usize, Cell), (f64, Option<Cell>)>,
}

impl Search<'_> {
    /// Smallest summed deviation of the sub-line beyond index `i` (in the
    /// `walk` direction) when point `i` sits at `at`, with the grid point
    /// chosen for the next index.
    fn best(&mut self, walk: Walk, i: usize, at: Cell) -> (f64, Option<Cell>) {
        if let Some(&hit) = self.memo.get(&(walk, i, at)) {
            return hit;
        }
        let result = match walk.next(i, self.line.len()) {
            None => (0.0, None),
            Some(j) => {
                let target = self.line[j];
                let mut best = (f64::INFINITY, None);
                for c in candidates(at, target, self.bounds) {
                    let cost = deviation(c, target) + self.best(walk, j, c).0;
                    if cost < best.0 {
                        best = (cost, Some(c));
                    }
                }
                best
            }
        };
        self.memo.insert((walk, i, at), result);
        result
    }

    /// Grid points of the best sub-line beyond index `i`, nearest first.
    fn path(&mut self, walk: Walk, mut i: usize, mut at: Cell) -> Vec<Cell> {
        let mut out = Vec::new();
        while let (Some(j), (_, Some(next))) = (walk.next(i, self.line.len()), self.best(walk, i, at)) {
            out.push(next);
            i = j;
            at = next;
        }
        out
    }
}
