// Real-time control core of a camera rover: UDP command channel, motor
// actuation, multicast discovery and camera frame streaming.

pub mod camera;
pub mod comm;
pub mod config;
pub mod error;
pub mod motor;
pub mod protocol;
pub mod runtime;
