//! Vertex layouts and the vertex types the G-buffer pass consumes.

use bytemuck::{Pod, Zeroable};

/// Semantic of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attrib {
    Position,
    Normal,
    Tangent,
    TexCoord0,
    Color0,
}

/// One `f32` attribute of a vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub attrib: Attrib,
    /// Number of `f32` components (1 to 4).
    pub components: u8,
    /// Byte offset from the start of the vertex.
    pub offset: u32,
}

/// Describes how vertex buffer bytes are split into attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: u32,
}

impl VertexLayout {
    pub fn begin() -> Self {
        Self::default()
    }

    /// Append an attribute of `components` floats after the previous one.
    pub fn add(mut self, attrib: Attrib, components: u8) -> Self {
        let components = components.clamp(1, 4);
        self.attributes.push(VertexAttribute {
            attrib,
            components,
            offset: self.stride,
        });
        self.stride += components as u32 * 4;
        self
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn has(&self, attrib: Attrib) -> bool {
        self.attributes.iter().any(|a| a.attrib == attrib)
    }
}

/// Position-only vertex, used for full-screen and debug geometry.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPos {
    pub position: [f32; 3],
}

impl VertexPos {
    pub fn layout() -> VertexLayout {
        VertexLayout::begin().add(Attrib::Position, 3)
    }
}

/// Vertex of a lit mesh: position, normal, tangent (w = handedness) and uv.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 4],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn layout() -> VertexLayout {
        VertexLayout::begin()
            .add(Attrib::Position, 3)
            .add(Attrib::Normal, 3)
            .add(Attrib::Tangent, 4)
            .add(Attrib::TexCoord0, 2)
    }
}

/// Unit cube centered on the origin, one quad per face so each face has
/// its own normal, tangent and uv set.
pub fn cube_mesh() -> (Vec<MeshVertex>, Vec<u32>) {
    // (normal, tangent) per face
    let faces: [([f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];
    let corners = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, tangent) in faces {
        let n = glam::Vec3::from(normal);
        let t = glam::Vec3::from(tangent);
        let b = n.cross(t);
        let base = vertices.len() as u32;
        for uv in corners {
            let p = n * 0.5 + t * (uv[0] - 0.5) + b * (uv[1] - 0.5);
            vertices.push(MeshVertex {
                position: p.to_array(),
                normal,
                tangent: [tangent[0], tangent[1], tangent[2], 1.0],
                uv: [uv[0], 1.0 - uv[1]],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}
