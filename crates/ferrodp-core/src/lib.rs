//! Common traits and types shared by every FerroDP crate: byte cursors, the
//! [`Encode`]/[`Decode`] traits and their error types, and a growable write
//! buffer.

#[macro_use]
mod macros;

mod cursor;
mod decode;
mod encode;
mod error;
mod padding;
mod write_buf;

// Flat API hierarchy of common traits and types

pub use self::cursor::*;
pub use self::decode::*;
pub use self::encode::*;
pub use self::error::*;
pub use self::padding::*;
pub use self::write_buf::*;
