//! Physical serial link abstraction.
//!
//! The driver above this crate only needs three primitives from the wire:
//! how many bytes the transmit side can take, a write that may accept just a
//! prefix, and a single-byte read with a timeout. [`SerialLink`] captures
//! those; this crate ships two implementations:
//! - [`MemoryLink`], a simulated wire used by tests and demos
//! - [`SocketLink`], a link over a Unix domain socket (Linux/macOS)
//!
//! This is the lowest layer of serplex. Everything else builds on top of
//! the [`SerialLink`] trait provided here.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod stream;
#[cfg(unix)]
pub mod uds;

pub use error::{LinkError, Result};
pub use memory::MemoryLink;
pub use traits::{SerialLink, DEFAULT_CHANNEL};

#[cfg(unix)]
pub use stream::LinkStream;
#[cfg(unix)]
pub use uds::{SocketLink, UnixDomainSocket};
