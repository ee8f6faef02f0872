//! Stack integration: streaming frames through the cache and assembling
//! coordinate-labeled output.

mod assemble;
mod coordinates;
mod run;
mod runner;

pub use assemble::OutputContainer;
pub use coordinates::{CoordinateIndex, CoordinateMapping, CoordinateTuple};
pub use run::{
    integrate_stack, SkippedFrame, StackAssemblyError, StackError, StackOutput, StackReport,
};
pub use runner::{RunnerConfig, StackRunner};
