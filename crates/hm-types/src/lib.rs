pub mod errors;
pub mod space;
pub mod task;
pub mod trial;

pub use errors::*;
pub use space::*;
pub use task::*;
pub use trial::*;
