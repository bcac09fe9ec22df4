pub mod colors;
pub mod geometry;
pub mod messages;

pub use colors::{faction_color, faction_color_hex};
pub use geometry::*;
pub use messages::*;
