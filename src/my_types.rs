use nalgebra as na;

pub type Point2d = na::Vector2::<f64>;

pub type Matrixd = nalgebra::DMatrix::<f64>;

/// Graph-assigned detection identifier, monotonically increasing.
pub type SpotId = usize;
/// Identifier of a derived track, stable for a given link set.
pub type TrackId = usize;
pub type LinkId = usize;
