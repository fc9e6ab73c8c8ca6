pub mod password;
pub mod response;
pub mod validation;

pub use response::*;
pub use validation::*;
