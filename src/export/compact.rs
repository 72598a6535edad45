use log::debug;

use crate::chain::{ProofChain, ProofLink};
use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::{
        Hash32, RegionDescriptor, TransformationDescriptor, COMPACT_FORMAT_VERSION, COMPACT_MAGIC,
        HASH_SIZE,
    },
    utils::compute_crc32,
};

// Transformation tags in the compact wire encoding
const TAG_CROP: u8 = 1;
const TAG_RESIZE: u8 = 2;
const TAG_ROTATE: u8 = 3;
const TAG_GRAYSCALE: u8 = 4;
const TAG_BRIGHTNESS: u8 = 5;
const TAG_BLUR: u8 = 6;
const TAG_REDACTION: u8 = 7;
const TAG_CUSTOM: u8 = 8;

/// Serialize a chain into the compact binary layout.
///
/// Input roots are elided: link 0 starts at the genesis root and every later
/// link starts at its predecessor's output root, so the import re-derives
/// them. A CRC32 trailer covers everything before it.
pub fn export_compact(chain: &ProofChain) -> ProvenanceResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(128 + chain.links.len() * 64);
    bytes.extend_from_slice(COMPACT_MAGIC);
    bytes.extend_from_slice(&COMPACT_FORMAT_VERSION.to_be_bytes());
    bytes.extend_from_slice(&chain.chain_id);
    bytes.extend_from_slice(&chain.genesis_root);
    bytes.extend_from_slice(&chain.tile_width.to_be_bytes());
    bytes.extend_from_slice(&chain.tile_height.to_be_bytes());
    bytes.extend_from_slice(&(chain.links.len() as u32).to_be_bytes());
    for link in &chain.links {
        write_transformation(&mut bytes, &link.transformation)?;
        bytes.extend_from_slice(&link.output_root);
        bytes.extend_from_slice(&(link.proof_blob.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&link.proof_blob);
    }
    let crc = compute_crc32(&bytes);
    bytes.extend_from_slice(&crc.to_be_bytes());
    debug!(
        "Compact export of chain {}: {} links, {} bytes",
        chain.short_id(),
        chain.links.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Parse compact bytes back into a read-only chain
pub fn import_compact(bytes: &[u8]) -> ProvenanceResult<ProofChain> {
    // Trailer first; nothing else is trustworthy before the checksum holds
    if bytes.len() < COMPACT_MAGIC.len() + 4 {
        return Err(ProvenanceError::MalformedEncoding(
            "compact payload too short".into(),
        ));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - 4);
    let declared_crc = u32::from_be_bytes(trailer.try_into().expect("4-byte slice"));
    if compute_crc32(body) != declared_crc {
        return Err(ProvenanceError::MalformedEncoding(
            "compact payload checksum mismatch".into(),
        ));
    }

    let mut reader = Reader::new(body);
    if reader.take(COMPACT_MAGIC.len())? != COMPACT_MAGIC {
        return Err(ProvenanceError::MalformedEncoding(
            "compact payload magic mismatch".into(),
        ));
    }
    let version = reader.read_u16()?;
    if version != COMPACT_FORMAT_VERSION {
        return Err(ProvenanceError::UnsupportedFormat {
            version: version as u32,
            supported: COMPACT_FORMAT_VERSION as u32,
        });
    }

    let chain_id = reader.read_hash()?;
    let genesis_root = reader.read_hash()?;
    let tile_width = reader.read_u32()?;
    let tile_height = reader.read_u32()?;
    let link_count = reader.read_u32()? as usize;

    let mut links = Vec::with_capacity(link_count.min(4096));
    let mut input_root = genesis_root;
    for index in 0..link_count {
        let transformation = read_transformation(&mut reader)?;
        let output_root = reader.read_hash()?;
        let blob_len = reader.read_u32()? as usize;
        let proof_blob = reader.take(blob_len)?.to_vec();
        links.push(ProofLink {
            index: index as u32,
            input_root,
            output_root,
            transformation,
            proof_blob,
        });
        input_root = output_root;
    }
    if !reader.is_exhausted() {
        return Err(ProvenanceError::MalformedEncoding(format!(
            "{} trailing bytes after the last link",
            reader.remaining()
        )));
    }

    ProofChain::from_parts(chain_id, genesis_root, tile_width, tile_height, links)
}

fn write_transformation(out: &mut Vec<u8>, t: &TransformationDescriptor) -> ProvenanceResult<()> {
    match t {
        TransformationDescriptor::Crop {
            x,
            y,
            width,
            height,
        } => {
            out.push(TAG_CROP);
            out.extend_from_slice(&x.to_be_bytes());
            out.extend_from_slice(&y.to_be_bytes());
            out.extend_from_slice(&width.to_be_bytes());
            out.extend_from_slice(&height.to_be_bytes());
        }
        TransformationDescriptor::Resize { width, height } => {
            out.push(TAG_RESIZE);
            out.extend_from_slice(&width.to_be_bytes());
            out.extend_from_slice(&height.to_be_bytes());
        }
        TransformationDescriptor::Rotate { degrees } => {
            out.push(TAG_ROTATE);
            out.extend_from_slice(&degrees.to_be_bytes());
        }
        TransformationDescriptor::Grayscale => out.push(TAG_GRAYSCALE),
        TransformationDescriptor::Brightness { delta } => {
            out.push(TAG_BRIGHTNESS);
            out.extend_from_slice(&delta.to_be_bytes());
        }
        TransformationDescriptor::Blur { radius } => {
            out.push(TAG_BLUR);
            out.extend_from_slice(&radius.to_be_bytes());
        }
        TransformationDescriptor::Redaction { regions } => {
            if regions.len() > u16::MAX as usize {
                return Err(ProvenanceError::MalformedEncoding(format!(
                    "{} redaction regions exceed the compact encoding limit",
                    regions.len()
                )));
            }
            out.push(TAG_REDACTION);
            out.extend_from_slice(&(regions.len() as u16).to_be_bytes());
            for region in regions {
                out.extend_from_slice(&region.x.to_be_bytes());
                out.extend_from_slice(&region.y.to_be_bytes());
                out.extend_from_slice(&region.width.to_be_bytes());
                out.extend_from_slice(&region.height.to_be_bytes());
            }
        }
        TransformationDescriptor::Custom { name, params } => {
            let name_bytes = name.as_bytes();
            let param_bytes = params.as_bytes();
            if name_bytes.len() > u16::MAX as usize {
                return Err(ProvenanceError::MalformedEncoding(
                    "custom transformation name too long".into(),
                ));
            }
            out.push(TAG_CUSTOM);
            out.extend_from_slice(&(name_bytes.len() as u16).to_be_bytes());
            out.extend_from_slice(name_bytes);
            out.extend_from_slice(&(param_bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(param_bytes);
        }
    }
    Ok(())
}

fn read_transformation(reader: &mut Reader) -> ProvenanceResult<TransformationDescriptor> {
    let tag = reader.read_u8()?;
    match tag {
        TAG_CROP => Ok(TransformationDescriptor::Crop {
            x: reader.read_u32()?,
            y: reader.read_u32()?,
            width: reader.read_u32()?,
            height: reader.read_u32()?,
        }),
        TAG_RESIZE => Ok(TransformationDescriptor::Resize {
            width: reader.read_u32()?,
            height: reader.read_u32()?,
        }),
        TAG_ROTATE => Ok(TransformationDescriptor::Rotate {
            degrees: reader.read_u16()?,
        }),
        TAG_GRAYSCALE => Ok(TransformationDescriptor::Grayscale),
        TAG_BRIGHTNESS => Ok(TransformationDescriptor::Brightness {
            delta: reader.read_i16()?,
        }),
        TAG_BLUR => Ok(TransformationDescriptor::Blur {
            radius: reader.read_u32()?,
        }),
        TAG_REDACTION => {
            let count = reader.read_u16()? as usize;
            let mut regions = Vec::with_capacity(count);
            for _ in 0..count {
                regions.push(RegionDescriptor {
                    x: reader.read_u32()?,
                    y: reader.read_u32()?,
                    width: reader.read_u32()?,
                    height: reader.read_u32()?,
                });
            }
            Ok(TransformationDescriptor::Redaction { regions })
        }
        TAG_CUSTOM => {
            let name_len = reader.read_u16()? as usize;
            let name = String::from_utf8(reader.take(name_len)?.to_vec()).map_err(|_| {
                ProvenanceError::MalformedEncoding("custom name is not UTF-8".into())
            })?;
            let param_len = reader.read_u32()? as usize;
            let params = String::from_utf8(reader.take(param_len)?.to_vec()).map_err(|_| {
                ProvenanceError::MalformedEncoding("custom params are not UTF-8".into())
            })?;
            Ok(TransformationDescriptor::Custom { name, params })
        }
        other => Err(ProvenanceError::MalformedEncoding(format!(
            "unknown transformation tag {}",
            other
        ))),
    }
}

/// Bounds-checked cursor over the compact payload
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> ProvenanceResult<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&e| e <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(ProvenanceError::MalformedEncoding(format!(
                "compact payload truncated at offset {}",
                self.pos
            ))),
        }
    }

    fn read_u8(&mut self) -> ProvenanceResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> ProvenanceResult<u16> {
        Ok(u16::from_be_bytes(
            self.take(2)?.try_into().expect("2-byte slice"),
        ))
    }

    fn read_i16(&mut self) -> ProvenanceResult<i16> {
        Ok(i16::from_be_bytes(
            self.take(2)?.try_into().expect("2-byte slice"),
        ))
    }

    fn read_u32(&mut self) -> ProvenanceResult<u32> {
        Ok(u32::from_be_bytes(
            self.take(4)?.try_into().expect("4-byte slice"),
        ))
    }

    fn read_hash(&mut self) -> ProvenanceResult<Hash32> {
        Ok(self
            .take(HASH_SIZE)?
            .try_into()
            .expect("32-byte slice"))
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}
