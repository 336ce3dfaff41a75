pub mod disk;

pub use disk::{DiskStore, StoreError};
