pub mod error;
pub mod model;
pub mod result;

pub use error::*;
pub use model::*;
pub use result::*;
