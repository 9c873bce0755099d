//! Session ports and state evaluation

pub mod ports;
pub mod state;
