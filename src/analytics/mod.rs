mod background;
mod origin;
mod pipeline;
mod processor;
mod region;
mod segment;

pub use origin::TieBreak;
pub use pipeline::spawn_runner;
