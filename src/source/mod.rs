//! Built-in document sources. Any `Pipe<(), Document>` works as a source.

pub mod fs;
pub mod iter;
