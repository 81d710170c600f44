// Domain layer: core models and ports (interfaces). No browser or filesystem code here.

pub mod model;
pub mod ports;
