pub mod checkpoint;
pub mod checkpoint_store;
pub mod producer;
