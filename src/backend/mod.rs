//! Production implementors of [`crate::connection::Connection`].
//!
//! The core itself never names a wire-protocol crate outside this module
//!; everything
//! above talks only to the trait. `x11rb` is presently the only backend,
//! gated behind the `x11rb-backend` feature so the library still builds (for
//! tests against the mock connection) on a machine with no X11 headers.

#[cfg(feature = "x11rb-backend")]
pub mod x11rb;
