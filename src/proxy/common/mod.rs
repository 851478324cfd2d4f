pub mod content;
pub mod cors;
pub mod target;
