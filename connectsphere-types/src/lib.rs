pub mod likes;
pub mod models;

pub use likes::*;
pub use models::*;
