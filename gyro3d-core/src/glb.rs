/// Binary glTF (GLB) decoding into a triangle mesh
use std::collections::HashMap;

use nalgebra::Point3;
use nom::{
    bytes::complete::{tag, take},
    multi::many0,
    number::complete::le_u32,
    sequence::tuple,
    IResult,
};
use serde::Deserialize;

use crate::geometry::{Mesh, Triangle};
use crate::model::ModelError;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const GLB_HEADER_LEN: usize = 12;

const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const MODE_TRIANGLES: u32 = 4;

const COMPONENT_UNSIGNED_BYTE: u32 = 5121;
const COMPONENT_UNSIGNED_SHORT: u32 = 5123;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const COMPONENT_FLOAT: u32 = 5126;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(default)]
    meshes: Vec<MeshDef>,
    #[serde(default)]
    accessors: Vec<Accessor>,
    #[serde(default)]
    buffer_views: Vec<BufferView>,
}

#[derive(Debug, Deserialize)]
struct MeshDef {
    primitives: Vec<Primitive>,
}

#[derive(Debug, Deserialize)]
struct Primitive {
    attributes: HashMap<String, usize>,
    indices: Option<usize>,
    mode: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: Option<usize>,
    #[serde(default)]
    byte_offset: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    buffer: usize,
    #[serde(default)]
    byte_offset: usize,
    byte_length: usize,
    byte_stride: Option<usize>,
}

/// True when `data` starts with the GLB magic
pub fn is_glb(data: &[u8]) -> bool {
    data.starts_with(GLB_MAGIC)
}

fn glb_header(input: &[u8]) -> IResult<&[u8], (u32, u32)> {
    let (input, _) = tag(&GLB_MAGIC[..])(input)?;
    tuple((le_u32, le_u32))(input)
}

fn glb_chunk(input: &[u8]) -> IResult<&[u8], (u32, &[u8])> {
    let (input, (length, kind)) = tuple((le_u32, le_u32))(input)?;
    let (input, data) = take(length)(input)?;
    Ok((input, (kind, data)))
}

/// Parse a GLB container and collect every triangle primitive of every mesh.
///
/// Node transforms are not applied and only the embedded BIN chunk is
/// supported as a buffer source.
pub fn parse_glb(data: &[u8]) -> Result<Mesh, ModelError> {
    if data.len() < GLB_HEADER_LEN {
        return Err(ModelError::Truncated("GLB header"));
    }
    let (_, (version, length)) =
        glb_header(data).map_err(|_| ModelError::Malformed("missing glTF magic".into()))?;
    if version != GLB_VERSION {
        return Err(ModelError::Unsupported(format!("glTF container version {}", version)));
    }

    let end = (length as usize).min(data.len());
    if end < GLB_HEADER_LEN {
        return Err(ModelError::Truncated("GLB header"));
    }
    let (_, chunks) = many0(glb_chunk)(&data[GLB_HEADER_LEN..end])
        .map_err(|_| ModelError::Truncated("GLB chunks"))?;

    let json = match chunks.first() {
        Some((CHUNK_JSON, json)) => *json,
        _ => return Err(ModelError::Malformed("first GLB chunk is not JSON".into())),
    };
    let bin = chunks
        .iter()
        .find(|(kind, _)| *kind == CHUNK_BIN)
        .map(|(_, bin)| *bin)
        .unwrap_or(&[]);

    let document: Document = serde_json::from_slice(json)
        .map_err(|e| ModelError::Malformed(format!("glTF JSON: {}", e)))?;

    let mut mesh = Mesh::new();
    for mesh_def in &document.meshes {
        for primitive in &mesh_def.primitives {
            let mode = primitive.mode.unwrap_or(MODE_TRIANGLES);
            if mode != MODE_TRIANGLES {
                tracing::debug!(mode, "Skipping non-triangle glTF primitive");
                continue;
            }
            append_primitive(&document, bin, primitive, &mut mesh)?;
        }
    }
    Ok(mesh)
}

fn append_primitive(
    document: &Document,
    bin: &[u8],
    primitive: &Primitive,
    mesh: &mut Mesh,
) -> Result<(), ModelError> {
    let position_index = *primitive
        .attributes
        .get("POSITION")
        .ok_or_else(|| ModelError::Malformed("primitive without POSITION".into()))?;
    let positions = read_positions(document, bin, position_index)?;

    let indices = match primitive.indices {
        Some(index) => read_indices(document, bin, index)?,
        None => (0..positions.len() as u32).collect(),
    };

    for corners in indices.chunks_exact(3) {
        let point = |i: u32| {
            positions
                .get(i as usize)
                .copied()
                .ok_or_else(|| ModelError::Malformed(format!("vertex index {} out of range", i)))
        };
        mesh.add_triangle(Triangle::from_positions(
            point(corners[0])?,
            point(corners[1])?,
            point(corners[2])?,
        ));
    }
    Ok(())
}

/// Resolve an accessor to its element count, backing bytes and stride
fn accessor_bytes<'a, 'b>(
    document: &'a Document,
    bin: &'b [u8],
    index: usize,
    element_size: usize,
) -> Result<(&'a Accessor, &'b [u8], usize), ModelError> {
    let accessor = document
        .accessors
        .get(index)
        .ok_or_else(|| ModelError::Malformed(format!("accessor {} missing", index)))?;
    let view_index = accessor
        .buffer_view
        .ok_or_else(|| ModelError::Unsupported("accessor without bufferView".into()))?;
    let view = document
        .buffer_views
        .get(view_index)
        .ok_or_else(|| ModelError::Malformed(format!("bufferView {} missing", view_index)))?;
    if view.buffer != 0 {
        return Err(ModelError::Unsupported(format!("external buffer {}", view.buffer)));
    }

    let view_end = view
        .byte_offset
        .checked_add(view.byte_length)
        .filter(|end| *end <= bin.len())
        .ok_or(ModelError::Truncated("GLB binary chunk"))?;
    let view_bytes = &bin[view.byte_offset..view_end];
    let start = accessor.byte_offset.min(view_bytes.len());
    let stride = view.byte_stride.unwrap_or(element_size).max(element_size);

    if accessor.count > 0 {
        let needed = (accessor.count - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_add(element_size));
        if needed.map_or(true, |needed| view_bytes.len() - start < needed) {
            return Err(ModelError::Truncated("glTF accessor"));
        }
    }
    Ok((accessor, &view_bytes[start..], stride))
}

fn read_positions(
    document: &Document,
    bin: &[u8],
    index: usize,
) -> Result<Vec<Point3<f32>>, ModelError> {
    let (accessor, bytes, stride) = accessor_bytes(document, bin, index, 12)?;
    if accessor.kind != "VEC3" || accessor.component_type != COMPONENT_FLOAT {
        return Err(ModelError::Unsupported(format!(
            "POSITION as {} of component {}",
            accessor.kind, accessor.component_type
        )));
    }

    let read_f32 = |at: usize| f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    Ok((0..accessor.count)
        .map(|i| {
            let at = i * stride;
            Point3::new(read_f32(at), read_f32(at + 4), read_f32(at + 8))
        })
        .collect())
}

fn read_indices(document: &Document, bin: &[u8], index: usize) -> Result<Vec<u32>, ModelError> {
    let component_type = document
        .accessors
        .get(index)
        .map(|a| a.component_type)
        .ok_or_else(|| ModelError::Malformed(format!("accessor {} missing", index)))?;
    let size = match component_type {
        COMPONENT_UNSIGNED_BYTE => 1,
        COMPONENT_UNSIGNED_SHORT => 2,
        COMPONENT_UNSIGNED_INT => 4,
        other => return Err(ModelError::Unsupported(format!("index component {}", other))),
    };

    let (accessor, bytes, stride) = accessor_bytes(document, bin, index, size)?;
    if accessor.kind != "SCALAR" {
        return Err(ModelError::Malformed(format!("indices of type {}", accessor.kind)));
    }

    Ok((0..accessor.count)
        .map(|i| {
            let at = i * stride;
            match size {
                1 => bytes[at] as u32,
                2 => u16::from_le_bytes([bytes[at], bytes[at + 1]]) as u32,
                _ => u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]),
            }
        })
        .collect())
}
