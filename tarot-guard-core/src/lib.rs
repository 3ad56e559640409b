pub mod domain;
pub mod error;
pub mod policy;

pub use domain::*;
pub use error::*;
pub use policy::*;
