//! Reading STL files, ASCII and binary.
//!
//! STL stores every triangle on its own, with three positions and a face
//! normal. [`Reader::read`] turns every facet into a one-triangle polygon of
//! a [`GeometryStore`][crate::store::GeometryStore], ready to be
//! reconstructed.

use std::io;

use derive_more::Display;
use failure::Fail;


mod read;

pub use self::read::{
    CounterSink, RawResult, ReadOptions, ReadResults, Reader, Sink, Triangle,
};


/// The two flavors of STL files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Format {
    #[display(fmt = "ASCII")]
    Ascii,
    #[display(fmt = "binary")]
    Binary,
}

/// Everything that can go wrong while reading an STL file.
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "IO error: {}", _0)]
    Io(#[cause] io::Error),

    #[fail(display = "unexpected end of file")]
    UnexpectedEof,

    #[fail(display = "parse error in line {}: {}", line, msg)]
    Parse {
        line: usize,
        msg: String,
    },

    #[fail(
        display = "binary STL declares {} triangles, but {} bytes are left after them",
        declared, trailing
    )]
    TrailingData {
        declared: u32,
        trailing: usize,
    },
}

impl From<io::Error> for Error {
    fn from(src: io::Error) -> Self {
        Error::Io(src)
    }
}
