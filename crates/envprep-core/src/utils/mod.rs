pub mod environment;
pub mod verbose;

pub use environment::{update_environ, Environment};
pub use verbose::{VerboseLogger, VerboseScope};
