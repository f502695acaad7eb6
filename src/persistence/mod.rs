pub mod kv;
pub mod persist;
pub mod settings;
pub mod snapshots;
