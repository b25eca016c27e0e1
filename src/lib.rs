pub mod config;
pub mod convert;
pub mod midi;
pub mod note;
pub mod player;
pub mod processor;
pub mod render;
pub mod string;
pub mod synth;
mod util;
