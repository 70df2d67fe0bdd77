//! Multiplexed serial streams over one physical link.
//!
//! Several logical byte streams (standard output, standard error, a kernel
//! debug channel, and any 4-character named stream) share a single serial
//! link. Each write is COBS-framed with its stream identity so concurrent
//! writers never interleave, and standard error is never dropped.
//!
//! # Crate Structure
//!
//! - [`link`]: physical link abstraction (in-memory wire, Unix sockets)
//! - [`frame`]: stream identities, frame codec, and the far-end demultiplexer
//! - [`driver`]: stream gating, output queue, read/write paths, device interface

/// Re-export link types.
pub mod link {
    pub use serplex_link::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serplex_frame::*;
}

/// Re-export driver types.
pub mod driver {
    pub use serplex_driver::*;
}
