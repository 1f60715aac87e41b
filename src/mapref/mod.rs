pub mod entry;
pub mod one;
