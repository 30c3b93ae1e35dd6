pub mod assignment;
pub mod config;
pub mod crop;
pub mod detector;
pub mod error;
pub mod export;
pub mod graph;
pub mod linker;
pub mod my_types;
pub mod pipeline;
pub mod spot;
pub mod stack;
pub mod synth;
pub mod track;
