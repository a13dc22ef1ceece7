//! Filesystem subsystem: standard streams and `File::open`.
//!
//! The concrete file/pipe/socket subsystem beyond its readiness
//! contract is an external collaborator — this module offers exactly
//! the fd sources transports need: the three standard streams, and
//! `open(2)` dispatched through the reactor.

mod file;
mod stdio;

pub use file::File;
pub use stdio::Stdio;
