//! Power interface abstraction and the HaaS implementation.

pub mod haas;
mod traits;

pub use traits::{
    DriverInfo, LockMode, Node, NodeTask, PowerError, PowerInterface, PowerState, Property,
};
