// Library exports for graphsam
pub mod alignment;
pub mod segments;
pub mod trace;
pub mod writer;

mod sam;
