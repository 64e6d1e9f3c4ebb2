//! Nearest-site partitioning of the image plane.

use crate::geometry::Point;

/// Set of sites; every location belongs to its closest site.
#[derive(Debug, Clone, Default)]
pub struct VoronoiPartition {
    sites: Vec<Point>,
}

impl VoronoiPartition {
    /// Partition around `sites`.
    #[must_use]
    pub fn new(sites: Vec<Point>) -> Self {
        Self { sites }
    }

    /// Number of sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// True without sites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Index of the site nearest to `p`; the lower index wins ties.
    #[must_use]
    pub fn nearest(&self, p: Point) -> Option<usize> {
        self.sites
            .iter()
            .enumerate()
            .map(|(i, s)| (i, (s.x - p.x).powi(2) + (s.y - p.y).powi(2)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(i, _)| i)
    }

    /// Owning site of every pixel centre of a `width × height` raster, row-major.
    #[must_use]
    pub fn rasterize(&self, width: u32, height: u32) -> Vec<Option<usize>> {
        let mut out = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                out.push(self.nearest(Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5)));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_site() {
        let v = VoronoiPartition::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert_eq!(v.nearest(Point::new(2.0, 5.0)), Some(0));
        assert_eq!(v.nearest(Point::new(8.0, -5.0)), Some(1));
        assert_eq!(v.nearest(Point::new(5.0, 0.0)), Some(0));
    }

    #[test]
    fn test_rasterize_halves() {
        let v = VoronoiPartition::new(vec![Point::new(1.0, 1.0), Point::new(3.0, 1.0)]);
        let cells = v.rasterize(4, 2);
        assert_eq!(cells[0], Some(0));
        assert_eq!(cells[3], Some(1));
        assert!(VoronoiPartition::default().rasterize(2, 2).iter().all(Option::is_none));
    }
}
