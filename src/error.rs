//! The crate-wide error type.
//!
//! Mirrors the shape the rest of the corpus uses for a window manager core
//! (one flat `#[derive(thiserror::Error)]` enum with `#[from]` wrapping the
//! handful of external error sources) rather than a per-module error per
//! function, so callers (in particular the event loop in `manager.rs`) can
//! use a single `Result` alias everywhere.
use crate::xid::Xid;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A request to the X server failed. Most of these are expected races
    /// with a client that vanished mid-operation and are
    /// handled by dropping the offending client rather than propagating.
    #[error("X protocol error: {0}")]
    Protocol(String),

    /// `SubstructureRedirect` on the root window was denied: another window
    /// manager already holds it. Fatal at startup.
    #[error("another window manager is already running on this display")]
    WmAlreadyRunning,

    /// A tagset expression failed to parse. Recoverable: the caller keeps
    /// whatever tagset was active before the attempted switch.
    #[error("invalid tagset expression: {0}")]
    TagsetParse(String),

    /// No window is currently known under this id.
    #[error("no such client: {0:?}")]
    UnknownClient(Xid),

    /// A font could not be loaded and no built-in fallback was available.
    #[error("failed to load font '{0}'")]
    FontLoad(String),

    /// Error surfaced by a `TextRenderer` implementor.
    #[error("draw error: {0}")]
    Draw(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
