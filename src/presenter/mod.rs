pub mod eta;
pub mod list;
pub mod map;
