pub mod frontend;
pub mod input;
