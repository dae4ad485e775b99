pub mod device;
pub mod message;

pub use device::*;
pub use message::*;
