#![allow(clippy::new_without_default)]

use std::{
    fmt::{self, Display, Formatter},
    io::{Read, Seek, SeekFrom},
    string::{FromUtf16Error, FromUtf8Error},
};

use binrw::{prelude::*, Endian};
use modular_bitfield::prelude::*;

#[derive(Debug, Clone)]
pub enum PmxFormatError {
    BadUtf8Text(FromUtf8Error),
    BadUtf16Text,
    BadBoolean(u8),
}

impl Display for PmxFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PmxFormatError::BadUtf8Text(err) => write!(f, "Bad UTF-8 text: {}", err),
            PmxFormatError::BadUtf16Text => write!(f, "Bad UTF-16 text"),
            PmxFormatError::BadBoolean(value) => write!(f, "Bad boolean value: {}", value),
        }
    }
}

impl std::error::Error for PmxFormatError {}

impl From<FromUtf8Error> for PmxFormatError {
    fn from(value: FromUtf8Error) -> Self {
        PmxFormatError::BadUtf8Text(value)
    }
}

impl From<FromUtf16Error> for PmxFormatError {
    fn from(_: FromUtf16Error) -> Self {
        PmxFormatError::BadUtf16Text
    }
}

#[derive(Debug, Clone, BinRead)]
struct PmxText {
    length: u32,
    #[br(count = length)]
    bytes: Vec<u8>,
}

impl PmxText {
    fn try_into_string(self, encoding: PmxTextEncoding) -> Result<String, PmxFormatError> {
        Ok(match encoding {
            PmxTextEncoding::Utf8 => String::from_utf8(self.bytes)?,
            PmxTextEncoding::Utf16le => {
                if self.bytes.len() % 2 != 0 {
                    return Err(PmxFormatError::BadUtf16Text);
                }
                let words: Vec<u16> = self
                    .bytes
                    .chunks_exact(2)
                    .map(|word| u16::from_le_bytes([word[0], word[1]]))
                    .collect();
                String::from_utf16(&words)?
            }
        })
    }
}

fn parse_bool(value: u8) -> Result<bool, PmxFormatError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(PmxFormatError::BadBoolean(other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
pub enum PmxTextEncoding {
    #[br(magic = 0u8)]
    Utf16le,
    #[br(magic = 1u8)]
    Utf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
pub enum PmxIndexType {
    #[br(magic = 1u8)]
    Byte,
    #[br(magic = 2u8)]
    Short,
    #[br(magic = 4u8)]
    Int,
}

impl PmxIndexType {
    pub fn size(self) -> u64 {
        match self {
            PmxIndexType::Byte => 1,
            PmxIndexType::Short => 2,
            PmxIndexType::Int => 4,
        }
    }
}

fn read_index_bytes<R: Read + Seek>(
    reader: &mut R,
    endian: Endian,
    index_type: PmxIndexType,
) -> binrw::BinResult<(u64, i64, i64)> {
    let pos = reader.stream_position()?;
    Ok(match index_type {
        PmxIndexType::Byte => {
            let mut buf = [0u8; 1];
            reader.read_exact(&mut buf)?;
            (pos, buf[0] as i64, buf[0] as i8 as i64)
        }
        PmxIndexType::Short => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf)?;
            let unsigned = match endian {
                Endian::Big => u16::from_be_bytes(buf),
                Endian::Little => u16::from_le_bytes(buf),
            };
            (pos, unsigned as i64, unsigned as i16 as i64)
        }
        PmxIndexType::Int => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            let signed = match endian {
                Endian::Big => i32::from_be_bytes(buf),
                Endian::Little => i32::from_le_bytes(buf),
            } as i64;
            (pos, signed, signed)
        }
    })
}

fn index_from_value(pos: u64, value: i64) -> binrw::BinResult<Option<usize>> {
    if value == -1 {
        Ok(None)
    } else if value < 0 {
        Err(binrw::Error::AssertFail {
            pos,
            message: format!("Bad index: {}", value),
        })
    } else {
        Ok(Some(value as usize))
    }
}

/// Vertex, texture, material, morph and rigid body index.
///
/// One and two byte values are unsigned. Four byte values use -1 as the
/// empty sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmxIndex(pub Option<usize>);

impl BinRead for PmxIndex {
    type Args<'a> = (PmxIndexType,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let (pos, unsigned, _) = read_index_bytes(reader, endian, args.0)?;
        Ok(Self(index_from_value(pos, unsigned)?))
    }
}

/// Bone index. Values of every width are signed, so all ones means no bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmxBoneIndex(pub Option<usize>);

impl BinRead for PmxBoneIndex {
    type Args<'a> = (PmxIndexType,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let (pos, _, signed) = read_index_bytes(reader, endian, args.0)?;
        Ok(Self(index_from_value(pos, signed)?))
    }
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct PmxGlobals {
    #[br(assert(globals_count >= 8))]
    pub globals_count: i8,
    pub text_encoding: PmxTextEncoding,
    #[br(assert((0..=4).contains(&additional_vec4_count)))]
    pub additional_vec4_count: i8,
    pub vertex_index_type: PmxIndexType,
    pub texture_index_type: PmxIndexType,
    pub material_index_type: PmxIndexType,
    pub bone_index_type: PmxIndexType,
    pub morph_index_type: PmxIndexType,
    #[br(pad_after = globals_count - 8)]
    pub rigidbody_index_type: PmxIndexType,
}

#[derive(Debug, Clone, BinRead)]
pub struct PmxFileHeader {
    #[br(assert(version >= 2.0, "Unsupported PMX version {}", version))]
    pub version: f32,
    pub globals: PmxGlobals,
    #[br(try_map = |str: PmxText| str.try_into_string(globals.text_encoding))]
    pub model_name_local: String,
    #[br(try_map = |str: PmxText| str.try_into_string(globals.text_encoding))]
    pub model_name_universal: String,
    #[br(try_map = |str: PmxText| str.try_into_string(globals.text_encoding))]
    pub comments_local: String,
    #[br(try_map = |str: PmxText| str.try_into_string(globals.text_encoding))]
    pub comments_universal: String,
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub enum PmxWeightDeform {
    #[br(magic = 0u8)]
    Bdef1 {
        #[br(args(header.globals.bone_index_type))]
        bone_index: PmxBoneIndex,
    },
    #[br(magic = 1u8)]
    Bdef2 {
        #[br(args(header.globals.bone_index_type))]
        bone_index_1: PmxBoneIndex,
        #[br(args(header.globals.bone_index_type))]
        bone_index_2: PmxBoneIndex,
        bone_weight_1: f32,
    },
    #[br(magic = 2u8)]
    Bdef4 {
        #[br(args(header.globals.bone_index_type))]
        bone_indices: [PmxBoneIndex; 4],
        bone_weights: [f32; 4],
    },
    #[br(magic = 3u8)]
    Sdef {
        #[br(args(header.globals.bone_index_type))]
        bone_index_1: PmxBoneIndex,
        #[br(args(header.globals.bone_index_type))]
        bone_index_2: PmxBoneIndex,
        bone_weight_1: f32,
        c: [f32; 3],
        r0: [f32; 3],
        r1: [f32; 3],
    },
    #[br(magic = 4u8)]
    Qdef {
        #[br(args(header.globals.bone_index_type))]
        bone_indices: [PmxBoneIndex; 4],
        bone_weights: [f32; 4],
    },
}

impl PmxWeightDeform {
    /// Joints and weights in the fixed four slot layout. Unused slots stay zero.
    pub fn joints_and_weights(&self) -> ([Option<usize>; 4], [f32; 4]) {
        fn two(
            a: PmxBoneIndex,
            b: PmxBoneIndex,
            weight: f32,
        ) -> ([Option<usize>; 4], [f32; 4]) {
            ([a.0, b.0, None, None], [weight, 1.0 - weight, 0.0, 0.0])
        }
        match self {
            PmxWeightDeform::Bdef1 { bone_index } => {
                let weight = if bone_index.0.is_some() { 1.0 } else { 0.0 };
                ([bone_index.0, None, None, None], [weight, 0.0, 0.0, 0.0])
            }
            PmxWeightDeform::Bdef2 {
                bone_index_1,
                bone_index_2,
                bone_weight_1,
            }
            | PmxWeightDeform::Sdef {
                bone_index_1,
                bone_index_2,
                bone_weight_1,
                ..
            } => two(*bone_index_1, *bone_index_2, *bone_weight_1),
            PmxWeightDeform::Bdef4 {
                bone_indices,
                bone_weights,
            }
            | PmxWeightDeform::Qdef {
                bone_indices,
                bone_weights,
            } => {
                let joints = bone_indices.map(|index| index.0);
                let mut weights = [0.0; 4];
                for (slot, weight) in weights.iter_mut().enumerate() {
                    if joints[slot].is_some() {
                        *weight = bone_weights[slot];
                    }
                }
                (joints, weights)
            }
        }
    }
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    #[br(count = header.globals.additional_vec4_count)]
    pub additional_vec4: Vec<[f32; 4]>,
    #[br(args { header })]
    pub weight_deform: PmxWeightDeform,
    pub edge_scale: f32,
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxTexture {
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub path: String,
}

#[bitfield]
#[derive(Debug, Clone, Copy, BinRead)]
#[br(map = Self::from_bytes)]
pub struct PmxDrawingFlags {
    pub no_cull: bool,
    pub ground_shadow: bool,
    pub draw_shadow: bool,
    pub receive_shadow: bool,
    pub has_edge: bool,
    pub vertex_color: bool,
    pub point_drawing: bool,
    pub line_drawing: bool,
}

#[derive(Debug, Clone, Copy, BinRead)]
pub enum PmxEnvironmentBlendMode {
    #[br(magic = 0u8)]
    Disabled,
    #[br(magic = 1u8)]
    Multiply,
    #[br(magic = 2u8)]
    Additive,
    #[br(magic = 3u8)]
    AdditionalVec4,
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub enum PmxToonReference {
    #[br(magic = 0u8)]
    Texture {
        #[br(args(header.globals.texture_index_type))]
        index: PmxIndex,
    },
    #[br(magic = 1u8)]
    Internal { index: u8 },
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxMaterial {
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub material_name_local: String,
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub material_name_universal: String,
    pub diffuse_color: [f32; 4],
    pub specular_color: [f32; 3],
    pub specular_strength: f32,
    pub ambient_color: [f32; 3],
    pub drawing_flags: PmxDrawingFlags,
    pub edge_color: [f32; 4],
    pub edge_scale: f32,
    #[br(args(header.globals.texture_index_type))]
    pub texture_index: PmxIndex,
    #[br(args(header.globals.texture_index_type))]
    pub environment_index: PmxIndex,
    pub environment_blend_mode: PmxEnvironmentBlendMode,
    #[br(args { header })]
    pub toon_reference: PmxToonReference,
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub meta_data: String,
    #[br(assert(surface_count >= 0))]
    pub surface_count: i32,
}

#[bitfield]
#[derive(Debug, Clone, Copy, BinRead)]
#[br(map = Self::from_bytes)]
pub struct PmxBoneFlags {
    pub indexed_tail_position: bool,
    pub rotatable: bool,
    pub translatable: bool,
    pub is_visible: bool,
    pub enabled: bool,
    pub ik: bool,
    #[skip]
    __: B1,
    pub inherit_local: bool,
    pub inherit_rotation: bool,
    pub inherit_translation: bool,
    pub fixed_axis: bool,
    pub local_coordinate: bool,
    pub physics_after_deform: bool,
    pub external_parent_deform: bool,
    #[skip]
    __: B2,
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader, flags: &PmxBoneFlags } )]
pub enum PmxBoneTailPosition {
    #[br(pre_assert(!flags.indexed_tail_position()))]
    Position([f32; 3]),
    #[br(pre_assert(flags.indexed_tail_position()))]
    Indexed {
        #[br(args(header.globals.bone_index_type))]
        bone_index: PmxBoneIndex,
    },
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxBoneInheritParent {
    #[br(args(header.globals.bone_index_type))]
    pub inherit_parent_index: PmxBoneIndex,
    pub inherit_parent_influence: f32,
}

#[derive(Debug, Clone, BinRead)]
pub enum PmxBoneIkLinkLimit {
    #[br(magic = 0u8)]
    None,
    #[br(magic = 1u8)]
    Some {
        limit_min: [f32; 3],
        limit_max: [f32; 3],
    },
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxBoneIkLink {
    #[br(args(header.globals.bone_index_type))]
    pub bone_index: PmxBoneIndex,
    pub limits: PmxBoneIkLinkLimit,
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxBoneIk {
    #[br(args(header.globals.bone_index_type))]
    pub target_index: PmxBoneIndex,
    #[br(assert(loop_count >= 0))]
    pub loop_count: i32,
    pub limit_radian: f32,
    #[br(assert(link_count >= 0))]
    pub link_count: i32,
    #[br(args { count: link_count as usize, inner: binrw::args! { header } })]
    pub links: Vec<PmxBoneIkLink>,
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxBone {
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub bone_name_local: String,
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub bone_name_universal: String,
    pub position: [f32; 3],
    #[br(args(header.globals.bone_index_type))]
    pub parent_bone_index: PmxBoneIndex,
    pub layer: i32,
    pub flags: PmxBoneFlags,
    #[br(args { header, flags: &flags })]
    pub tail_position: PmxBoneTailPosition,
    #[br(if(flags.inherit_rotation() || flags.inherit_translation()), args { header })]
    pub inherit_parent: Option<PmxBoneInheritParent>,
    #[br(if(flags.fixed_axis()))]
    pub axis_direction: Option<[f32; 3]>,
    #[br(if(flags.local_coordinate()))]
    pub local_coordinate: Option<[[f32; 3]; 2]>,
    #[br(if(flags.external_parent_deform()), args(header.globals.bone_index_type))]
    pub external_parent_index: Option<PmxBoneIndex>,
    #[br(if(flags.ik()), args { header })]
    pub ik: Option<PmxBoneIk>,
}

#[derive(Debug, Clone, Copy, BinRead, PartialEq, Eq)]
pub enum PmxMorphPanelType {
    #[br(magic = 0u8)]
    Hidden,
    #[br(magic = 1u8)]
    Eyebrows,
    #[br(magic = 2u8)]
    Eyes,
    #[br(magic = 3u8)]
    Mouth,
    #[br(magic = 4u8)]
    Other,
}

#[derive(Debug, Clone, Copy, BinRead, PartialEq, Eq)]
pub enum PmxMorphType {
    #[br(magic = 0u8)]
    Group,
    #[br(magic = 1u8)]
    Vertex,
    #[br(magic = 2u8)]
    Bone,
    #[br(magic = 3u8)]
    Uv,
    #[br(magic = 4u8)]
    UvExt1,
    #[br(magic = 5u8)]
    UvExt2,
    #[br(magic = 6u8)]
    UvExt3,
    #[br(magic = 7u8)]
    UvExt4,
    #[br(magic = 8u8)]
    Material,
    #[br(magic = 9u8)]
    Flip,
    #[br(magic = 10u8)]
    Impulse,
}

impl PmxMorphType {
    /// Size of one offset record of a morph kind that is not decoded.
    fn skipped_stride(self, globals: &PmxGlobals) -> Option<u64> {
        match self {
            PmxMorphType::Group | PmxMorphType::Vertex => None,
            // index, translation vec3, rotation vec4
            PmxMorphType::Bone => Some(globals.bone_index_type.size() + 28),
            PmxMorphType::Uv
            | PmxMorphType::UvExt1
            | PmxMorphType::UvExt2
            | PmxMorphType::UvExt3
            | PmxMorphType::UvExt4 => Some(globals.vertex_index_type.size() + 16),
            // index, operation byte, 28 floats
            PmxMorphType::Material => Some(globals.material_index_type.size() + 113),
            PmxMorphType::Flip => Some(globals.morph_index_type.size() + 4),
            // index, local flag, velocity vec3, torque vec3
            PmxMorphType::Impulse => Some(globals.rigidbody_index_type.size() + 25),
        }
    }
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxGroupMorphData {
    #[br(args(header.globals.morph_index_type))]
    pub morph_index: PmxIndex,
    pub influence: f32,
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxVertexMorphData {
    #[br(args(header.globals.vertex_index_type))]
    pub vertex_index: PmxIndex,
    pub translation: [f32; 3],
}

#[derive(Debug, Clone)]
pub enum PmxMorphOffsets {
    Group(Vec<PmxGroupMorphData>),
    Vertex(Vec<PmxVertexMorphData>),
    /// Offsets of a kind that is consumed but not decoded.
    Skipped { morph_type: PmxMorphType, count: usize },
}

impl BinRead for PmxMorphOffsets {
    type Args<'a> = (&'a PmxFileHeader, PmxMorphType, usize);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        (header, morph_type, count): Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        match morph_type {
            PmxMorphType::Group => {
                let mut data = Vec::with_capacity(count);
                for _ in 0..count {
                    data.push(PmxGroupMorphData::read_options(
                        reader,
                        endian,
                        binrw::args! { header },
                    )?);
                }
                Ok(PmxMorphOffsets::Group(data))
            }
            PmxMorphType::Vertex => {
                let mut data = Vec::with_capacity(count);
                for _ in 0..count {
                    data.push(PmxVertexMorphData::read_options(
                        reader,
                        endian,
                        binrw::args! { header },
                    )?);
                }
                Ok(PmxMorphOffsets::Vertex(data))
            }
            other => {
                let stride = other.skipped_stride(&header.globals).unwrap_or(0);
                let length = stride * count as u64;
                let start = reader.stream_position()?;
                let end = reader.seek(SeekFrom::End(0))?;
                if end - start < length {
                    return Err(binrw::Error::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("Morph data of {} bytes runs past end of file", length),
                    )));
                }
                reader.seek(SeekFrom::Start(start + length))?;
                Ok(PmxMorphOffsets::Skipped {
                    morph_type: other,
                    count,
                })
            }
        }
    }
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxMorph {
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub morph_name_local: String,
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub morph_name_universal: String,
    pub panel_type: PmxMorphPanelType,
    pub morph_type: PmxMorphType,
    #[br(assert(offset_size >= 0))]
    pub offset_size: i32,
    #[br(args(header, morph_type, offset_size as usize))]
    pub offsets: PmxMorphOffsets,
}

#[derive(Debug, Clone, Copy, BinRead, PartialEq, Eq)]
pub enum PmxFrameType {
    #[br(magic = 0u8)]
    Bone,
    #[br(magic = 1u8)]
    Morph,
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader, frame_type: PmxFrameType } )]
pub enum PmxFrameData {
    #[br(pre_assert(frame_type == PmxFrameType::Bone))]
    Bone {
        #[br(args(header.globals.bone_index_type))]
        bone_index: PmxBoneIndex,
    },
    #[br(pre_assert(frame_type == PmxFrameType::Morph))]
    Morph {
        #[br(args(header.globals.morph_index_type))]
        morph_index: PmxIndex,
    },
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxFrameItem {
    pub frame_type: PmxFrameType,
    #[br(args { header, frame_type })]
    pub frame_data: PmxFrameData,
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxDisplayFrame {
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub display_name_local: String,
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub display_name_universal: String,
    #[br(try_map = parse_bool)]
    pub special_frame: bool,
    #[br(assert(frame_count >= 0))]
    pub frame_count: i32,
    #[br(args { count: frame_count as usize, inner: binrw::args! { header } })]
    pub frames: Vec<PmxFrameItem>,
}

#[derive(Debug, Clone, Copy, BinRead, PartialEq, Eq)]
pub enum PmxShapeType {
    #[br(magic = 0u8)]
    Sphere,
    #[br(magic = 1u8)]
    Box,
    #[br(magic = 2u8)]
    Capsule,
}

#[derive(Debug, Clone, Copy, BinRead, PartialEq, Eq)]
pub enum PmxPhysicsMode {
    #[br(magic = 0u8)]
    FollowBone,
    #[br(magic = 1u8)]
    Physics,
    #[br(magic = 2u8)]
    PhysicsAndBone,
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxRigidbody {
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub rigidbody_name_local: String,
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub rigidbody_name_universal: String,
    #[br(args(header.globals.bone_index_type))]
    pub related_bone_index: PmxBoneIndex,
    pub group_id: u8,
    pub no_collision_group: u16,
    pub shape: PmxShapeType,
    pub shape_size: [f32; 3],
    pub shape_position: [f32; 3],
    pub shape_rotation: [f32; 3],
    pub mass: f32,
    pub move_attenuation: f32,
    pub rotation_damping: f32,
    pub repulsion: f32,
    pub friction_force: f32,
    pub physics_mode: PmxPhysicsMode,
}

#[derive(Debug, Clone, Copy, BinRead, PartialEq, Eq)]
pub enum PmxJointType {
    #[br(magic = 0u8)]
    Spring6dof,
    #[br(magic = 1u8)]
    SixDof,
    #[br(magic = 2u8)]
    P2p,
    #[br(magic = 3u8)]
    ConeTwist,
    #[br(magic = 4u8)]
    Slider,
    #[br(magic = 5u8)]
    Hinge,
}

#[derive(Debug, Clone, BinRead)]
#[br(import { header: &PmxFileHeader } )]
pub struct PmxJoint {
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub joint_name_local: String,
    #[br(try_map = |str: PmxText| str.try_into_string(header.globals.text_encoding))]
    pub joint_name_universal: String,
    pub joint_type: PmxJointType,
    #[br(args(header.globals.rigidbody_index_type))]
    pub rigidbody_index_a: PmxIndex,
    #[br(args(header.globals.rigidbody_index_type))]
    pub rigidbody_index_b: PmxIndex,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub position_minimum: [f32; 3],
    pub position_maximum: [f32; 3],
    pub rotation_minimum: [f32; 3],
    pub rotation_maximum: [f32; 3],
    pub position_spring: [f32; 3],
    pub rotation_spring: [f32; 3],
}

#[derive(Debug, Clone, BinRead)]
#[br(little, magic = b"PMX ")]
pub struct PmxFile {
    pub header: PmxFileHeader,
    #[br(assert(vertex_count >= 0))]
    pub vertex_count: i32,
    #[br(args { count: vertex_count as usize, inner: binrw::args! { header: &header } })]
    pub vertices: Vec<PmxVertex>,
    #[br(assert(surfaces_count >= 0 && surfaces_count % 3 == 0))]
    pub surfaces_count: i32,
    #[br(args { count: surfaces_count as usize, inner: (header.globals.vertex_index_type,) })]
    pub surfaces: Vec<PmxIndex>,
    #[br(assert(textures_count >= 0))]
    pub textures_count: i32,
    #[br(args { count: textures_count as usize, inner: binrw::args! { header: &header } })]
    pub textures: Vec<PmxTexture>,
    #[br(assert(material_count >= 0))]
    pub material_count: i32,
    #[br(args { count: material_count as usize, inner: binrw::args! { header: &header } })]
    pub materials: Vec<PmxMaterial>,
    #[br(assert(bones_count >= 0))]
    pub bones_count: i32,
    #[br(args { count: bones_count as usize, inner: binrw::args! { header: &header } })]
    pub bones: Vec<PmxBone>,
    #[br(assert(morphs_count >= 0))]
    pub morphs_count: i32,
    #[br(args { count: morphs_count as usize, inner: binrw::args! { header: &header } })]
    pub morphs: Vec<PmxMorph>,
    #[br(assert(display_frame_count >= 0))]
    pub display_frame_count: i32,
    #[br(args { count: display_frame_count as usize, inner: binrw::args! { header: &header } })]
    pub display_frames: Vec<PmxDisplayFrame>,
    #[br(assert(rigidbodies_count >= 0))]
    pub rigidbodies_count: i32,
    #[br(args { count: rigidbodies_count as usize, inner: binrw::args! { header: &header } })]
    pub rigidbodies: Vec<PmxRigidbody>,
    #[br(assert(joint_count >= 0))]
    pub joint_count: i32,
    #[br(args { count: joint_count as usize, inner: binrw::args! { header: &header } })]
    pub joints: Vec<PmxJoint>,
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinRead;

    use super::*;

    fn globals(index_type: PmxIndexType) -> PmxGlobals {
        PmxGlobals {
            globals_count: 8,
            text_encoding: PmxTextEncoding::Utf8,
            additional_vec4_count: 0,
            vertex_index_type: index_type,
            texture_index_type: index_type,
            material_index_type: index_type,
            bone_index_type: index_type,
            morph_index_type: index_type,
            rigidbody_index_type: index_type,
        }
    }

    #[test]
    fn test_index_sign_handling() {
        let index = PmxIndex::read_le_args(&mut Cursor::new([0xFFu8]), (PmxIndexType::Byte,))
            .unwrap();
        assert_eq!(index.0, Some(255));
        let index = PmxBoneIndex::read_le_args(&mut Cursor::new([0xFFu8]), (PmxIndexType::Byte,))
            .unwrap();
        assert_eq!(index.0, None);
        let index = PmxBoneIndex::read_le_args(
            &mut Cursor::new([0xFFu8, 0xFF]),
            (PmxIndexType::Short,),
        )
        .unwrap();
        assert_eq!(index.0, None);
        let index = PmxIndex::read_le_args(
            &mut Cursor::new((-1i32).to_le_bytes()),
            (PmxIndexType::Int,),
        )
        .unwrap();
        assert_eq!(index.0, None);
        assert!(PmxBoneIndex::read_le_args(
            &mut Cursor::new((-2i32).to_le_bytes()),
            (PmxIndexType::Int,)
        )
        .is_err());
    }

    #[test]
    fn test_utf16_text() {
        let text = PmxText {
            length: 4,
            bytes: vec![0x42, 0x30, 0x41, 0x00],
        };
        assert_eq!(text.try_into_string(PmxTextEncoding::Utf16le).unwrap(), "あA");
        let odd = PmxText {
            length: 1,
            bytes: vec![0x41],
        };
        assert!(odd.try_into_string(PmxTextEncoding::Utf16le).is_err());
        let bad_utf8 = PmxText {
            length: 1,
            bytes: vec![0xFF],
        };
        assert!(bad_utf8.try_into_string(PmxTextEncoding::Utf8).is_err());
    }

    #[test]
    fn test_skipped_stride() {
        let globals = globals(PmxIndexType::Short);
        assert_eq!(PmxMorphType::Bone.skipped_stride(&globals), Some(30));
        assert_eq!(PmxMorphType::UvExt2.skipped_stride(&globals), Some(18));
        assert_eq!(PmxMorphType::Material.skipped_stride(&globals), Some(115));
        assert_eq!(PmxMorphType::Flip.skipped_stride(&globals), Some(6));
        assert_eq!(PmxMorphType::Impulse.skipped_stride(&globals), Some(27));
        assert_eq!(PmxMorphType::Vertex.skipped_stride(&globals), None);
    }

    #[test]
    fn test_deform_weights() {
        let deform = PmxWeightDeform::Bdef4 {
            bone_indices: [
                PmxBoneIndex(Some(0)),
                PmxBoneIndex(None),
                PmxBoneIndex(Some(2)),
                PmxBoneIndex(None),
            ],
            bone_weights: [0.25, 0.5, 0.75, 1.0],
        };
        let (joints, weights) = deform.joints_and_weights();
        assert_eq!(joints, [Some(0), None, Some(2), None]);
        assert_eq!(weights, [0.25, 0.0, 0.75, 0.0]);

        let deform = PmxWeightDeform::Bdef1 {
            bone_index: PmxBoneIndex(None),
        };
        assert_eq!(deform.joints_and_weights().1, [0.0; 4]);
    }
}
