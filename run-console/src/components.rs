pub mod diff;
pub mod run;

pub use diff::*;
pub use run::*;
