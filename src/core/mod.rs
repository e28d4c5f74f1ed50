pub mod engine;

pub use engine::CollateralEngine;
