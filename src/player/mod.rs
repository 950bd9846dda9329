pub mod bus;
pub mod controller;
pub mod timer;


pub use bus::*;
pub use controller::*;
pub use timer::PollTimer;
