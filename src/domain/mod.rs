// Domain layer: plain data models and the traits the rest of the crate plugs into.

pub mod model;
pub mod ports;
