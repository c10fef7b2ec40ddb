//! Name-addressed uniform storage laid out with WGSL uniform-buffer rules.
//!
//! Each shader program declares its uniforms as an ordered list of named
//! fields. Values are written by name into a CPU-side byte block that the
//! renderer uploads once per frame. Unknown names are ignored, the way an
//! unresolved uniform location is.

use std::collections::{HashMap, HashSet};

use glam::{Mat4, Vec3, Vec4};
use log::{debug, warn};

/// Type of a single uniform field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    F32,
    I32,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    fn align(self) -> usize {
        match self {
            UniformKind::F32 | UniformKind::I32 => 4,
            UniformKind::Vec3 | UniformKind::Vec4 | UniformKind::Mat4 => 16,
        }
    }

    fn size(self) -> usize {
        match self {
            UniformKind::F32 | UniformKind::I32 => 4,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
        }
    }
}

/// A typed uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    F32(f32),
    I32(i32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::F32(_) => UniformKind::F32,
            UniformValue::I32(_) => UniformKind::I32,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn write(&self, out: &mut [u8]) {
        match self {
            UniformValue::F32(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::I32(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec3(v) => out.copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec4(v) => out.copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Mat4(m) => {
                out.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    kind: UniformKind,
    offset: usize,
}

/// Offsets of every named field in a uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    fields: HashMap<&'static str, Field>,
    size: usize,
}

impl UniformLayout {
    /// Lays out `fields` in declaration order. The WGSL struct bound to the
    /// block must declare the same fields in the same order.
    pub fn new(fields: &[(&'static str, UniformKind)]) -> Self {
        let mut offset = 0;
        let mut map = HashMap::with_capacity(fields.len());
        for &(name, kind) in fields {
            offset = align_to(offset, kind.align());
            map.insert(name, Field { kind, offset });
            offset += kind.size();
        }
        Self {
            fields: map,
            size: align_to(offset.max(1), 16),
        }
    }

    /// Total size in bytes, padded to a 16-byte multiple.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.fields.get(name).map(|field| field.offset)
    }
}

fn align_to(offset: usize, align: usize) -> usize {
    offset.div_ceil(align) * align
}

/// CPU copy of a uniform buffer, written by field name.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    layout: UniformLayout,
    bytes: Vec<u8>,
    unknown: HashSet<String>,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let bytes = vec![0; layout.size()];
        Self {
            layout,
            bytes,
            unknown: HashSet::new(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Writes `value` into the field called `name`. Returns whether the
    /// write landed.
    pub fn set(&mut self, name: &str, value: UniformValue) -> bool {
        let Some(field) = self.layout.fields.get(name).copied() else {
            if self.unknown.insert(name.to_string()) {
                debug!("uniform `{name}` is not declared by this program; ignoring");
            }
            return false;
        };
        if field.kind != value.kind() {
            warn!(
                "uniform `{name}` expects {:?} but got {:?}; ignoring",
                field.kind,
                value.kind()
            );
            return false;
        }
        let end = field.offset + field.kind.size();
        value.write(&mut self.bytes[field.offset..end]);
        true
    }

    pub fn set_f32(&mut self, name: &str, value: f32) -> bool {
        self.set(name, UniformValue::F32(value))
    }

    pub fn set_i32(&mut self, name: &str, value: i32) -> bool {
        self.set(name, UniformValue::I32(value))
    }

    pub fn set_vec3(&mut self, name: &str, value: Vec3) -> bool {
        self.set(name, UniformValue::Vec3(value))
    }

    pub fn set_vec4(&mut self, name: &str, value: Vec4) -> bool {
        self.set(name, UniformValue::Vec4(value))
    }

    pub fn set_mat4(&mut self, name: &str, value: Mat4) -> bool {
        self.set(name, UniformValue::Mat4(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_f32(bytes: &[u8], offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&bytes[offset..offset + 4])
    }

    #[test]
    fn fields_follow_uniform_alignment() {
        let layout = UniformLayout::new(&[
            ("scale", UniformKind::F32),
            ("color", UniformKind::Vec3),
            ("slot", UniformKind::I32),
            ("transform", UniformKind::Mat4),
            ("tint", UniformKind::Vec4),
            ("gain", UniformKind::F32),
        ]);
        assert_eq!(layout.offset_of("scale"), Some(0));
        assert_eq!(layout.offset_of("color"), Some(16));
        // a scalar packs into the tail of a vec3
        assert_eq!(layout.offset_of("slot"), Some(28));
        assert_eq!(layout.offset_of("transform"), Some(32));
        assert_eq!(layout.offset_of("tint"), Some(96));
        assert_eq!(layout.offset_of("gain"), Some(112));
        assert_eq!(layout.size(), 128);
    }

    #[test]
    fn setters_write_at_declared_offsets() {
        let layout = UniformLayout::new(&[
            ("radius", UniformKind::F32),
            ("center", UniformKind::Vec3),
            ("view", UniformKind::Mat4),
        ]);
        let mut block = UniformBlock::new(layout);
        assert!(block.set_f32("radius", 5.0));
        assert!(block.set_vec3("center", Vec3::new(1.0, 2.0, 3.0)));
        assert!(block.set_mat4("view", Mat4::from_translation(Vec3::new(7.0, 8.0, 9.0))));

        let bytes = block.bytes();
        assert_eq!(read_f32(bytes, 0), 5.0);
        assert_eq!(read_f32(bytes, 16), 1.0);
        assert_eq!(read_f32(bytes, 24), 3.0);
        // translation lives in the fourth column
        assert_eq!(read_f32(bytes, 32 + 48), 7.0);
        assert_eq!(read_f32(bytes, 32 + 56), 9.0);
    }

    #[test]
    fn unknown_or_mistyped_names_are_ignored() {
        let mut block = UniformBlock::new(UniformLayout::new(&[("gain", UniformKind::F32)]));
        let before = block.bytes().to_vec();
        assert!(!block.set_f32("missing", 1.0));
        assert!(!block.set_f32("missing", 2.0));
        assert!(!block.set_i32("gain", 3));
        assert_eq!(block.bytes(), before.as_slice());
    }
}
