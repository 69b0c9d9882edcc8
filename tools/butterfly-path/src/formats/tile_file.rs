//! `.gph` tile file: fixed 64-byte header, bincode body, CRC-64 footer
//!
//! ```text
//! header (64 B, little-endian)
//!   0  magic "BPTG"        u32
//!   4  version             u16
//!   6  reserved            u16
//!   8  graph id (base)     u64
//!  16  node count          u32
//!  20  edge count          u32
//!  24  transition count    u32
//!  28  edge info count     u32
//!  32  body length         u64
//!  40  padding             24 B
//! body (bincode: nodes, edges, transitions, edge info)
//! footer (16 B)
//!   0  body crc            u64
//!   8  file crc            u64   (header + body)
//! ```

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::crc;
use crate::error::{Result, StoreError};
use crate::graph_id::GraphId;
use crate::tile::{DirectedEdge, EdgeInfo, GraphTile, NodeInfo, NodeTransition, TileHeader};

const MAGIC: u32 = 0x4250_5447; // "BPTG"
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 64;
const FOOTER_SIZE: usize = 16;

pub const TILE_EXTENSION: &str = "gph";

#[derive(Serialize)]
struct TileBodyRef<'a> {
    nodes: &'a [NodeInfo],
    edges: &'a [DirectedEdge],
    transitions: &'a [NodeTransition],
    edge_info: &'a [EdgeInfo],
}

#[derive(Deserialize)]
struct TileBody {
    nodes: Vec<NodeInfo>,
    edges: Vec<DirectedEdge>,
    transitions: Vec<NodeTransition>,
    edge_info: Vec<EdgeInfo>,
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

pub struct TileFile;

impl TileFile {
    /// `<root>/<level>/<tile>.gph`
    pub fn path_for(root: &Path, base: GraphId) -> PathBuf {
        root.join(base.level().to_string())
            .join(format!("{}.{}", base.tile(), TILE_EXTENSION))
    }

    pub fn encode(tile: &GraphTile) -> Result<Vec<u8>> {
        let body = bincode::serialize(&TileBodyRef {
            nodes: &tile.nodes,
            edges: &tile.edges,
            transitions: &tile.transitions,
            edge_info: &tile.edge_info,
        })?;

        let h = &tile.header;
        let mut out = Vec::with_capacity(HEADER_SIZE + body.len() + FOOTER_SIZE);
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&h.graph_id.tile_base().value().to_le_bytes());
        out.extend_from_slice(&h.node_count.to_le_bytes());
        out.extend_from_slice(&h.edge_count.to_le_bytes());
        out.extend_from_slice(&h.transition_count.to_le_bytes());
        out.extend_from_slice(&h.edge_info_count.to_le_bytes());
        out.extend_from_slice(&(body.len() as u64).to_le_bytes());
        out.resize(HEADER_SIZE, 0);

        let body_crc = crc::checksum(&body);
        let mut file_digest = crc::Digest::new();
        file_digest.update(&out).update(&body);
        let file_crc = file_digest.finalize();

        out.extend_from_slice(&body);
        out.extend_from_slice(&body_crc.to_le_bytes());
        out.extend_from_slice(&file_crc.to_le_bytes());
        Ok(out)
    }

    /// Parse and verify the fixed header only
    pub fn decode_header(expected: GraphId, bytes: &[u8]) -> Result<(TileHeader, usize)> {
        if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(StoreError::corrupt(
                expected,
                format!("truncated file ({} bytes)", bytes.len()),
            ));
        }
        let magic = le_u32(bytes, 0);
        if magic != MAGIC {
            return Err(StoreError::corrupt(
                expected,
                format!("bad magic 0x{magic:08X}"),
            ));
        }
        let version = le_u16(bytes, 4);
        if version != VERSION {
            return Err(StoreError::corrupt(
                expected,
                format!("unsupported version {version}"),
            ));
        }
        let graph_id = GraphId::from_raw(le_u64(bytes, 8));
        if graph_id != expected.tile_base() {
            return Err(StoreError::corrupt(
                expected,
                format!("header names tile {graph_id}"),
            ));
        }
        let header = TileHeader {
            graph_id,
            node_count: le_u32(bytes, 16),
            edge_count: le_u32(bytes, 20),
            transition_count: le_u32(bytes, 24),
            edge_info_count: le_u32(bytes, 28),
        };
        let raw_len = le_u64(bytes, 32);
        let body_len = usize::try_from(raw_len).map_err(|_| {
            StoreError::corrupt(expected, format!("body length {raw_len} out of range"))
        })?;
        Ok((header, body_len))
    }

    pub fn decode(expected: GraphId, bytes: &[u8]) -> Result<GraphTile> {
        let (header, body_len) = Self::decode_header(expected, bytes)?;
        if bytes.len().checked_sub(HEADER_SIZE + FOOTER_SIZE) != Some(body_len) {
            return Err(StoreError::corrupt(
                expected,
                format!(
                    "body length {body_len} disagrees with file size {}",
                    bytes.len()
                ),
            ));
        }

        let body = &bytes[HEADER_SIZE..HEADER_SIZE + body_len];
        let footer = &bytes[HEADER_SIZE + body_len..];
        let stored_body_crc = le_u64(footer, 0);
        let stored_file_crc = le_u64(footer, 8);

        let computed = crc::checksum(body);
        if computed != stored_body_crc {
            return Err(StoreError::corrupt(
                expected,
                format!(
                    "body CRC64 mismatch: computed 0x{computed:016X}, stored 0x{stored_body_crc:016X}"
                ),
            ));
        }
        let computed = crc::checksum(&bytes[..HEADER_SIZE + body_len]);
        if computed != stored_file_crc {
            return Err(StoreError::corrupt(
                expected,
                format!(
                    "file CRC64 mismatch: computed 0x{computed:016X}, stored 0x{stored_file_crc:016X}"
                ),
            ));
        }

        let body: TileBody = bincode::deserialize(body)?;
        let tile = GraphTile {
            header,
            nodes: body.nodes,
            edges: body.edges,
            transitions: body.transitions,
            edge_info: body.edge_info,
        };
        tile.validate()?;
        Ok(tile)
    }

    pub fn write(root: &Path, tile: &GraphTile) -> Result<PathBuf> {
        let path = Self::path_for(root, tile.id());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = Self::encode(tile)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(path)
    }

    /// `Ok(None)` when the file does not exist
    pub fn read(root: &Path, base: GraphId) -> Result<Option<GraphTile>> {
        let path = Self::path_for(root, base);
        match fs::read(&path) {
            Ok(bytes) => Self::decode(base, &bytes).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{access, RoadClass, Surface, Use};

    fn sample() -> GraphTile {
        let base = GraphId::tile_id(1, 32_400).unwrap();
        GraphTile {
            header: TileHeader {
                graph_id: base,
                node_count: 2,
                edge_count: 2,
                transition_count: 0,
                edge_info_count: 1,
            },
            nodes: (0..2)
                .map(|i| NodeInfo {
                    lat: 50.0 + i as f64 * 0.01,
                    lon: 4.0,
                    edge_index: i,
                    edge_count: 1,
                    transition_index: 0,
                    transition_count: 0,
                    access: access::ALL,
                    traffic_signal: i == 1,
                })
                .collect(),
            edges: (0..2)
                .map(|i| DirectedEdge {
                    end_node: base.with_index(1 - i).unwrap(),
                    length_m: 1112.0,
                    forward_access: access::ALL,
                    reverse_access: access::ALL,
                    class: RoadClass::Secondary,
                    road_use: Use::Road,
                    surface: Surface::Paved,
                    speed_kph: 70,
                    flags: 0,
                    local_edge_idx: 0,
                    opp_local_idx: 0,
                    restrictions: 0,
                    edge_info_offset: 0,
                })
                .collect(),
            transitions: vec![],
            edge_info: vec![EdgeInfo {
                name: Some("Chaussée de Wavre".to_string()),
                shape: vec![(50.0, 4.0), (50.01, 4.0)],
            }],
        }
    }

    #[test]
    fn test_encode_decode() {
        let tile = sample();
        let bytes = TileFile::encode(&tile).unwrap();
        assert_eq!(le_u32(&bytes, 0), MAGIC);
        let back = TileFile::decode(tile.id(), &bytes).unwrap();
        assert_eq!(back, tile);
    }

    #[test]
    fn test_wrong_tile_rejected() {
        let tile = sample();
        let bytes = TileFile::encode(&tile).unwrap();
        let other = GraphId::tile_id(1, 7).unwrap();
        assert!(matches!(
            TileFile::decode(other, &bytes),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_flipped_body_byte_rejected() {
        let tile = sample();
        let mut bytes = TileFile::encode(&tile).unwrap();
        bytes[HEADER_SIZE + 3] ^= 0xFF;
        let err = TileFile::decode(tile.id(), &bytes).unwrap_err();
        assert!(err.to_string().contains("CRC64"));
    }

    #[test]
    fn test_truncated_rejected() {
        let tile = sample();
        let bytes = TileFile::encode(&tile).unwrap();
        assert!(TileFile::decode(tile.id(), &bytes[..40]).is_err());
        assert!(TileFile::decode(tile.id(), &bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_huge_body_length_rejected() {
        let tile = sample();
        let mut bytes = TileFile::encode(&tile).unwrap();
        bytes[32..40].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            TileFile::decode(tile.id(), &bytes),
            Err(StoreError::Corrupt { .. })
        ));
        // one byte longer than the file holds
        let mut bytes = TileFile::encode(&tile).unwrap();
        let body_len = (bytes.len() - HEADER_SIZE - FOOTER_SIZE + 1) as u64;
        bytes[32..40].copy_from_slice(&body_len.to_le_bytes());
        assert!(matches!(
            TileFile::decode(tile.id(), &bytes),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_header_count_mismatch_rejected() {
        let mut tile = sample();
        tile.header.edge_count = 5;
        let bytes = TileFile::encode(&tile).unwrap();
        assert!(matches!(
            TileFile::decode(tile.id(), &bytes),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_path_layout() {
        let base = GraphId::tile_id(2, 1234).unwrap();
        let path = TileFile::path_for(Path::new("/tiles"), base);
        assert_eq!(path, PathBuf::from("/tiles/2/1234.gph"));
    }
}
