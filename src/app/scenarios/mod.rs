pub mod crazy_small_volumes;
pub mod crazy_volumes;
pub mod enlarger;
pub mod sample;
pub mod streams;

use crate::domain::ports::Scenario;

pub use crazy_small_volumes::CrazySmallVolumesTest;
pub use crazy_volumes::CrazyVolumesTest;
pub use sample::SampleTest;

/// Every scenario the harness knows, in listing order.
pub fn all() -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(SampleTest),
        Box::new(CrazyVolumesTest),
        Box::new(CrazySmallVolumesTest),
    ]
}
