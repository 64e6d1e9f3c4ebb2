//! Numerical and graph algorithms behind the visualizers.

pub mod knn;
pub mod mst;
pub mod pareto;
pub mod spline;
pub mod stats;
pub mod voronoi;
pub mod ward;
