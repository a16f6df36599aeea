#![deny(warnings)]

pub mod assembly;
pub mod character;
pub mod config;
pub mod emotion;
pub mod markup;
pub mod pipeline;
pub mod script;
pub mod segment;
pub mod tts;
