// Domain layer: core models and ports (interfaces) the engine consumes.

pub mod model;
pub mod ports;
