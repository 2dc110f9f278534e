use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Line source over a gzip file; concatenated gzip members are read as one stream.
pub struct GzLines {
    reader: BufReader<MultiGzDecoder<BufReader<File>>>,
    buf: Vec<u8>,
}

/// Open `path` and check the gzip magic so a non-gzip input fails here
/// rather than surfacing as a read error on the first line.
pub fn open_gzip_lines<P: AsRef<Path>>(path: P) -> Result<GzLines> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("open input: {:?}", path))?;

    let mut magic = [0u8; 2];
    let n = read_up_to(&mut file, &mut magic).with_context(|| format!("read gzip header: {:?}", path))?;
    if n < GZIP_MAGIC.len() || magic != GZIP_MAGIC {
        bail!("not a gzip file: {:?}", path);
    }
    file.seek(SeekFrom::Start(0))?;

    Ok(GzLines { reader: BufReader::new(MultiGzDecoder::new(BufReader::new(file))), buf: Vec::with_capacity(256) })
}

fn read_up_to(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

impl GzLines {
    /// Next line without its trailing `\n`. `Ok(None)` at end of stream.
    pub fn next_line(&mut self) -> std::io::Result<Option<&[u8]>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        Ok(Some(&self.buf))
    }
}
