pub mod input;
pub mod item;

pub use input::*;
pub use item::*;
