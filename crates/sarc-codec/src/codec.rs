use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sarc_types::CompressionMethod;
use tracing::debug;

use crate::error::{CodecError, CodecResult};

/// gzip level used for new payloads.
pub const GZIP_LEVEL: u32 = 6;
/// xz preset used for new payloads.
pub const XZ_PRESET: u32 = 6;
/// zstd level used for new payloads.
pub const ZSTD_LEVEL: i32 = 3;

/// Compress everything from `input` into `output`.
///
/// Returns the number of uncompressed bytes consumed.
pub fn compress<R: Read, W: Write>(
    mut input: R,
    output: W,
    method: CompressionMethod,
) -> CodecResult<u64> {
    let fail = move |source: io::Error| CodecError::CompressionFailed { method, source };
    let consumed = match method {
        CompressionMethod::Gz => {
            let mut encoder = GzEncoder::new(output, Compression::new(GZIP_LEVEL));
            let n = io::copy(&mut input, &mut encoder).map_err(fail)?;
            encoder.finish().and_then(flush).map_err(fail)?;
            n
        }
        CompressionMethod::Xz => {
            let mut encoder = xz2::write::XzEncoder::new(output, XZ_PRESET);
            let n = io::copy(&mut input, &mut encoder).map_err(fail)?;
            encoder.finish().and_then(flush).map_err(fail)?;
            n
        }
        CompressionMethod::Zstd => {
            let mut encoder = zstd::stream::write::Encoder::new(output, ZSTD_LEVEL).map_err(fail)?;
            let n = io::copy(&mut input, &mut encoder).map_err(fail)?;
            encoder.finish().and_then(flush).map_err(fail)?;
            n
        }
    };
    Ok(consumed)
}

/// Decompress everything from `input` into `output`.
///
/// Concatenated gzip members and xz streams are decoded in sequence.
/// Returns the number of decompressed bytes written.
pub fn decompress<R: Read, W: Write>(
    input: R,
    mut output: W,
    method: CompressionMethod,
) -> CodecResult<u64> {
    let fail = move |source: io::Error| CodecError::DecompressionFailed { method, source };
    let produced = match method {
        CompressionMethod::Gz => io::copy(&mut MultiGzDecoder::new(input), &mut output),
        CompressionMethod::Xz => io::copy(
            &mut xz2::read::XzDecoder::new_multi_decoder(input),
            &mut output,
        ),
        CompressionMethod::Zstd => zstd::stream::read::Decoder::new(input)
            .and_then(|mut decoder| io::copy(&mut decoder, &mut output)),
    }
    .map_err(fail)?;
    output.flush().map_err(fail)?;
    Ok(produced)
}

/// Compress the file at `src` into a new file at `dst`.
///
/// `dst` is synced before returning. Returns the number of bytes read.
pub fn compress_file(src: &Path, dst: &Path, method: CompressionMethod) -> CodecResult<u64> {
    let input = File::open(src).map_err(|e| CodecError::io(src, e))?;
    let mut output = BufWriter::new(File::create(dst).map_err(|e| CodecError::io(dst, e))?);
    let consumed = compress(BufReader::new(input), &mut output, method)?;
    finish_file(dst, output)?;
    debug!(src = %src.display(), dst = %dst.display(), %method, bytes = consumed, "compressed");
    Ok(consumed)
}

/// Decompress the file at `src` into a new file at `dst`.
///
/// Returns the number of bytes written.
pub fn decompress_file(src: &Path, dst: &Path, method: CompressionMethod) -> CodecResult<u64> {
    let input = File::open(src).map_err(|e| CodecError::io(src, e))?;
    let mut output = BufWriter::new(File::create(dst).map_err(|e| CodecError::io(dst, e))?);
    let produced = decompress(BufReader::new(input), &mut output, method)?;
    finish_file(dst, output)?;
    debug!(src = %src.display(), dst = %dst.display(), %method, bytes = produced, "decompressed");
    Ok(produced)
}

fn flush<W: Write>(mut writer: W) -> io::Result<()> {
    writer.flush()
}

fn finish_file(path: &Path, writer: BufWriter<File>) -> CodecResult<()> {
    let file = writer
        .into_inner()
        .map_err(|e| CodecError::io(path, e.into_error()))?;
    file.sync_all().map_err(|e| CodecError::io(path, e))
}
