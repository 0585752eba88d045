pub mod ports;
pub mod preview;
