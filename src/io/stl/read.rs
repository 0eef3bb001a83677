use std::{
    fs::File,
    io,
    iter::Peekable,
    path::Path,
};

use boolinator::Boolinator;
use byteorder::{ByteOrder, LittleEndian};
use cgmath::{Point3, Vector3};
use log::trace;

use crate::store::{Corner, GeometryStore};
use super::{Error, Format};


/// Size of the binary header, including the triangle count.
const BINARY_HEADER_LEN: usize = 84;

/// Size of one binary triangle: normal, three vertices, attribute count.
const BINARY_TRIANGLE_LEN: usize = 4 * 3 * 4 + 2;


/// A reader able to read ASCII and binary STL files.
#[derive(Debug)]
pub struct Reader<R: io::Read> {
    reader: R,
}

impl Reader<File> {
    /// Creates a new `Reader` from the given file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, io::Error> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: io::Read> Reader<R> {
    /// Creates a new `Reader` from the given `io::Read` instance. If you want
    /// to open a file, rather use [`Reader::open`].
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the file into a new geometry store, one polygon per facet.
    pub fn read(self, options: ReadOptions) -> Result<ReadResults, Error> {
        struct StoreSink {
            results: ReadResults,
            read_normals: bool,
        }

        impl Sink for StoreSink {
            fn format(&mut self, format: Format) {
                self.results.format = Some(format);
            }

            fn solid_name(&mut self, name: String) {
                self.results.solid_name = Some(name);
            }

            fn num_triangles(&mut self, _: u32) {}

            fn triangle(&mut self, triangle: Triangle) {
                let normal = self.read_normals
                    .as_some(triangle.normal_vector())
                    .unwrap_or_else(|| Vector3::new(0.0, 0.0, 0.0));
                let [a, b, c] = triangle.positions();
                let corner = |p| Corner::at(p).with_normal(normal);
                self.results.store.add_polygon(Some([corner(a), corner(b), corner(c)]));
            }
        }

        let mut sink = StoreSink {
            results: ReadResults {
                format: None,
                solid_name: None,
                store: GeometryStore::new(),
            },
            read_normals: options.read_normals,
        };
        self.read_raw_into(&mut sink)?;

        Ok(sink.results)
    }

    /// Reads the whole file into a [`RawResult`].
    pub fn read_raw(self) -> Result<RawResult, Error> {
        let mut out = RawResult::new();
        self.read_raw_into(&mut out)?;
        Ok(out)
    }

    /// Reads the whole file into the given sink. This is the streaming
    /// version of [`Reader::read_raw`].
    pub fn read_raw_into(mut self, sink: &mut impl Sink) -> Result<(), Error> {
        let mut data = Vec::new();
        self.reader.read_to_end(&mut data)?;

        let format = guess_format(&data);
        trace!("reading {} bytes of {:?} STL", data.len(), format);
        sink.format(format);

        match format {
            Format::Binary => read_binary(&data, sink),
            Format::Ascii => read_ascii(&data, sink),
        }
    }
}

/// Guesses whether `data` is an ASCII or a binary STL file.
///
/// ASCII files start with `solid`, but so do many binary files, as the
/// 80 byte header is free-form. A file is considered binary if it does not
/// start with `solid`, if its first KB contains non-ASCII bytes, or if its
/// length matches the triangle count stored at offset 80 exactly.
fn guess_format(data: &[u8]) -> Format {
    if !data.starts_with(b"solid") {
        return Format::Binary;
    }

    let head = &data[..data.len().min(1024)];
    if head.iter().any(|b| !b.is_ascii()) {
        return Format::Binary;
    }

    if data.len() >= BINARY_HEADER_LEN {
        let count = LittleEndian::read_u32(&data[80..84]) as usize;
        if BINARY_HEADER_LEN + count * BINARY_TRIANGLE_LEN == data.len() {
            return Format::Binary;
        }
    }

    Format::Ascii
}

fn read_binary(data: &[u8], sink: &mut impl Sink) -> Result<(), Error> {
    if data.len() < BINARY_HEADER_LEN {
        return Err(Error::UnexpectedEof);
    }

    if data.starts_with(b"solid") {
        let name = String::from_utf8_lossy(&data[5..80]);
        sink.solid_name(name.trim_matches(|c: char| c.is_whitespace() || c == '\0').to_string());
    }

    let declared = LittleEndian::read_u32(&data[80..84]);
    sink.num_triangles(declared);

    let body = &data[BINARY_HEADER_LEN..];
    let needed = declared as usize * BINARY_TRIANGLE_LEN;
    if body.len() < needed {
        return Err(Error::UnexpectedEof);
    }
    if body.len() > needed {
        return Err(Error::TrailingData { declared, trailing: body.len() - needed });
    }

    /// Reads three consecutive `f32`s.
    fn vec3(data: &[u8]) -> [f32; 3] {
        [
            LittleEndian::read_f32(&data[0..]),
            LittleEndian::read_f32(&data[4..]),
            LittleEndian::read_f32(&data[8..]),
        ]
    }

    for raw in body.chunks_exact(BINARY_TRIANGLE_LEN) {
        sink.triangle(Triangle {
            normal: vec3(&raw[0..]),
            vertices: [vec3(&raw[12..]), vec3(&raw[24..]), vec3(&raw[36..])],
            attribute_byte_count: LittleEndian::read_u16(&raw[48..]),
        });
    }

    Ok(())
}

/// Whitespace separated words, each with its line number.
struct Words<'a> {
    inner: Peekable<Box<dyn Iterator<Item = (usize, &'a str)> + 'a>>,
    last_line: usize,
}

impl<'a> Words<'a> {
    fn new(lines: impl Iterator<Item = (usize, &'a str)> + 'a) -> Self {
        let words: Box<dyn Iterator<Item = (usize, &'a str)> + 'a> = Box::new(
            lines.flat_map(|(n, line)| line.split_whitespace().map(move |w| (n, w)))
        );
        Self {
            inner: words.peekable(),
            last_line: 0,
        }
    }

    fn next(&mut self) -> Result<&'a str, Error> {
        let (line, word) = self.inner.next().ok_or(Error::UnexpectedEof)?;
        self.last_line = line;
        Ok(word)
    }

    fn peek(&mut self) -> Option<&'a str> {
        self.inner.peek().map(|&(_, w)| w)
    }

    fn error(&self, msg: impl Into<String>) -> Error {
        Error::Parse { line: self.last_line, msg: msg.into() }
    }

    fn expect(&mut self, keyword: &str) -> Result<(), Error> {
        let word = self.next()?;
        (word == keyword).ok_or_else(|| {
            self.error(format!("expected '{}', found '{}'", keyword, word))
        })
    }

    fn float(&mut self) -> Result<f32, Error> {
        let word = self.next()?;
        word.parse::<f32>()
            .map_err(|e| self.error(format!("invalid float literal '{}': {}", word, e)))
    }

    fn vec3(&mut self) -> Result<[f32; 3], Error> {
        Ok([self.float()?, self.float()?, self.float()?])
    }
}

fn read_ascii(data: &[u8], sink: &mut impl Sink) -> Result<(), Error> {
    let text = std::str::from_utf8(data).map_err(|e| {
        let line = data[..e.valid_up_to()].iter().filter(|&&b| b == b'\n').count() + 1;
        Error::Parse { line, msg: "file is neither binary STL nor valid text".into() }
    })?;

    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

    // The first line is `solid` followed by an optional name that may contain
    // spaces.
    let (_, first) = lines.next().ok_or(Error::UnexpectedEof)?;
    let name = first.trim_start().trim_start_matches("solid").trim();
    sink.solid_name(name.to_string());

    let mut words = Words::new(lines);
    loop {
        match words.peek() {
            Some("endsolid") | None => break,
            _ => {}
        }

        words.expect("facet")?;
        words.expect("normal")?;
        let normal = words.vec3()?;

        words.expect("outer")?;
        words.expect("loop")?;
        let mut vertices = [[0.0; 3]; 3];
        for v in &mut vertices {
            words.expect("vertex")?;
            *v = words.vec3()?;
        }
        words.expect("endloop")?;
        words.expect("endfacet")?;

        sink.triangle(Triangle {
            normal,
            vertices,
            attribute_byte_count: 0,
        });
    }

    // A missing `endsolid` is tolerated, anything after it is ignored.
    Ok(())
}

/// A sink can accept data from an STL file. This is mainly used for
/// [`Reader::read_raw_into`].
pub trait Sink {
    /// Is called once in the beginning with the detected format.
    fn format(&mut self, _format: Format) {}

    /// Is called once in the beginning if the file starts with `solid`.
    ///
    /// For ASCII files, `name` is the rest of the first line. For binary
    /// files, it is the rest of the 80 byte header. Whitespace and NUL bytes
    /// are trimmed in both cases.
    fn solid_name(&mut self, name: String);

    /// If the file is binary, this method is called once in the beginning
    /// with the number of triangles stored in the file.
    fn num_triangles(&mut self, num: u32);

    /// Is called for each triangle that is read from the file.
    fn triangle(&mut self, triangle: Triangle);
}

/// One raw triangle in an STL file.
#[derive(Clone, Debug, PartialEq)]
pub struct Triangle {
    /// Face normal.
    pub normal: [f32; 3],

    /// The 3D positions of the vertices in CCW order (that is, when looking
    /// at the face "from the outside").
    pub vertices: [[f32; 3]; 3],

    /// Only stored in binary files and usually zero. Set to 0 for ASCII
    /// files.
    pub attribute_byte_count: u16,
}

impl Triangle {
    pub fn positions(&self) -> [Point3<f64>; 3] {
        let p = |[x, y, z]: [f32; 3]| Point3::new(f64::from(x), f64::from(y), f64::from(z));
        [p(self.vertices[0]), p(self.vertices[1]), p(self.vertices[2])]
    }

    pub fn normal_vector(&self) -> Vector3<f64> {
        let [x, y, z] = self.normal;
        Vector3::new(f64::from(x), f64::from(y), f64::from(z))
    }
}

/// Holds the raw data from an STL file.
///
/// To obtain a `RawResult`, call [`Reader::read_raw`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    pub format: Option<Format>,

    /// The solid name if it's specified in the file.
    pub solid_name: Option<String>,

    /// All triangles from the file.
    pub triangles: Vec<Triangle>,
}

impl RawResult {
    fn new() -> Self {
        Self {
            format: None,
            solid_name: None,
            triangles: Vec::new(),
        }
    }
}

impl Sink for RawResult {
    fn format(&mut self, format: Format) {
        self.format = Some(format);
    }

    fn solid_name(&mut self, name: String) {
        self.solid_name = Some(name);
    }

    fn num_triangles(&mut self, num: u32) {
        self.triangles.reserve(num as usize);
    }

    fn triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }
}

/// A sink that only counts triangles.
#[derive(Debug, Clone, Default)]
pub struct CounterSink {
    pub format: Option<Format>,

    /// The solid name if it's specified in the file.
    pub solid_name: Option<String>,

    /// The number of triangles in that file.
    pub triangle_count: u32,
}

impl CounterSink {
    /// Returns an instance with no name and 0 triangles.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink for CounterSink {
    fn format(&mut self, format: Format) {
        self.format = Some(format);
    }

    fn solid_name(&mut self, name: String) {
        self.solid_name = Some(name);
    }

    fn num_triangles(&mut self, _: u32) {}

    fn triangle(&mut self, _: Triangle) {
        self.triangle_count += 1;
    }
}

/// Returned by [`Reader::read`].
#[derive(Debug)]
pub struct ReadResults {
    pub format: Option<Format>,

    /// The name of the solid, if stored in the file.
    pub solid_name: Option<String>,

    /// One polygon per facet, in file order.
    pub store: GeometryStore,
}

/// Used to configure [`Reader::read`].
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Whether the facet normals are stored as corner normals. Otherwise all
    /// normals are zero. *Default*: `true`.
    pub read_normals: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            read_normals: true,
        }
    }
}
