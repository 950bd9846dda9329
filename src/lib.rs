pub mod core;
pub mod engine;
pub mod gui;
pub mod player;
