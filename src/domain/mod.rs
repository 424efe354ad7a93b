// Domain layer: products, recipes, geometry, job types and ports (interfaces).

pub mod expression;
pub mod geometry;
pub mod job;
pub mod model;
pub mod ports;
