pub mod distressed;

pub use distressed::remove_distressed;
