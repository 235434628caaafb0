//! GLB binary container
//!
//! Layout per the glTF 2.0 spec: a 12-byte header (`glTF` magic,
//! version 2, total size) followed by chunks. The JSON chunk pads with
//! spaces, the BIN chunk with zeros; every chunk starts on a 4-byte
//! boundary.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::exporter::{GltfExportError, GltfResult};

pub const MAGIC: &[u8; 4] = b"glTF";
pub const VERSION: u32 = 2;

const CHUNK_JSON: &[u8; 4] = b"JSON";
const CHUNK_BIN: &[u8; 4] = b"BIN\0";
const HEADER_SIZE: u32 = 12;
const CHUNK_HEADER_SIZE: u32 = 8;

fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Assemble a GLB container from serialized JSON and the binary blob.
///
/// The binary chunk is omitted entirely when `bin` is empty.
pub fn write<W: Write>(mut writer: W, json: &[u8], bin: &[u8]) -> GltfResult<()> {
    let json_padding = padding(json.len());
    let bin_padding = padding(bin.len());

    let mut total = HEADER_SIZE + CHUNK_HEADER_SIZE + (json.len() + json_padding) as u32;
    if !bin.is_empty() {
        total += CHUNK_HEADER_SIZE + (bin.len() + bin_padding) as u32;
    }

    writer.write_all(MAGIC)?;
    writer.write_u32::<LittleEndian>(VERSION)?;
    writer.write_u32::<LittleEndian>(total)?;

    writer.write_u32::<LittleEndian>((json.len() + json_padding) as u32)?;
    writer.write_all(CHUNK_JSON)?;
    writer.write_all(json)?;
    writer.write_all(&b" ".repeat(json_padding))?;

    if !bin.is_empty() {
        writer.write_u32::<LittleEndian>((bin.len() + bin_padding) as u32)?;
        writer.write_all(CHUNK_BIN)?;
        writer.write_all(bin)?;
        writer.write_all(&vec![0u8; bin_padding])?;
    }

    Ok(())
}

/// Chunks pulled out of a GLB container
#[derive(Debug)]
pub struct GlbChunks {
    pub json: Vec<u8>,
    pub bin: Option<Vec<u8>>,
}

/// Split a GLB container into its JSON and BIN chunks.
///
/// Unknown chunk types are skipped, as the format requires.
pub fn read(data: &[u8]) -> GltfResult<GlbChunks> {
    let mut cursor = Cursor::new(data);

    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(GltfExportError::InvalidContainer(
            "bad magic, not a glb file".to_string(),
        ));
    }

    let version = cursor.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(GltfExportError::InvalidContainer(format!(
            "unsupported glb version {version}"
        )));
    }

    let total = cursor.read_u32::<LittleEndian>()? as u64;
    if total as usize != data.len() {
        return Err(GltfExportError::InvalidContainer(format!(
            "declared size {total} does not match file size {}",
            data.len()
        )));
    }

    let mut json = None;
    let mut bin = None;
    while cursor.position() < total {
        let size = cursor.read_u32::<LittleEndian>()? as usize;
        let mut kind = [0u8; 4];
        cursor.read_exact(&mut kind)?;

        let mut chunk = vec![0u8; size];
        cursor.read_exact(&mut chunk)?;

        match &kind {
            k if k == CHUNK_JSON => json = Some(chunk),
            k if k == CHUNK_BIN => bin = Some(chunk),
            _ => {}
        }
    }

    let json = json.ok_or_else(|| {
        GltfExportError::InvalidContainer("missing JSON chunk".to_string())
    })?;
    Ok(GlbChunks { json, bin })
}
