pub mod principal;
pub mod fields;
pub mod decision;

pub use principal::*;
pub use fields::*;
pub use decision::*;
