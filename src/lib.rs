mod admittance;
mod circuit;
mod derivatives;
mod driver;
mod errors;
mod formulation;
mod indices;
mod jacobian;
mod loadcase;
mod newton;
mod options;
mod power;
mod report;
mod results;
mod topology;
mod traits;

pub mod fmt;
pub mod math;

pub use admittance::*;
pub use circuit::*;
pub use derivatives::*;
pub use driver::*;
pub use errors::*;
pub use formulation::*;
pub use indices::*;
pub use jacobian::*;
pub use loadcase::*;
pub use newton::*;
pub use options::*;
pub use power::*;
pub use report::*;
pub use results::*;
pub use topology::*;
pub use traits::*;

#[cfg(test)]
mod tests;
