//! CPU-side mesh geometry assembled from a mesh's JSON attributes.
//!
//! A [`Geometry`] holds each attribute in the shape the server sent it (flat
//! buffer plus item size). [`Geometry::to_vertices`] then interleaves them into
//! the fixed [`ModelVertex`] layout the pipeline expects.

use anyhow::{Context, Result, bail};

use crate::{
    data_structures::model::ModelVertex,
    resources::{
        attribute::{Attribute, Element, flatten},
        documents::AttributeSet,
    },
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub index: Option<Attribute<u16>>,
    pub position: Option<Attribute<f32>>,
    pub normal: Option<Attribute<f32>>,
    pub color: Option<Attribute<u8>>,
    pub uv: Option<Attribute<f32>>,
    pub skin_weight: Option<Attribute<f32>>,
    pub skin_index: Option<Attribute<u8>>,
}

/// Axis-aligned bounds of a set of positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    pub fn center(&self) -> [f32; 3] {
        [0, 1, 2].map(|i| (self.min[i] + self.max[i]) * 0.5)
    }

    /// Half the diagonal length.
    pub fn radius(&self) -> f32 {
        let d = [0, 1, 2].map(|i| self.max[i] - self.min[i]);
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt() * 0.5
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: [0, 1, 2].map(|i| self.min[i].min(other.min[i])),
            max: [0, 1, 2].map(|i| self.max[i].max(other.max[i])),
        }
    }
}

impl Geometry {
    pub fn from_attributes(attributes: &AttributeSet) -> Result<Self> {
        Ok(Self {
            index: flatten(attributes.indices.as_ref()).context("invalid indices")?,
            position: flatten(attributes.positions.as_ref()).context("invalid positions")?,
            normal: flatten(attributes.normals.as_ref()).context("invalid normals")?,
            color: flatten(attributes.colors.as_ref()).context("invalid colors")?,
            uv: flatten(attributes.uvs.as_ref()).context("invalid uvs")?,
            skin_weight: flatten(attributes.blend_weights.as_ref())
                .context("invalid blend weights")?,
            skin_index: flatten(attributes.blend_indices.as_ref())
                .context("invalid blend indices")?,
        })
    }

    /// Names of the attached attributes, in attachment order.
    pub fn attribute_names(&self) -> Vec<&'static str> {
        [
            ("index", self.index.is_some()),
            ("position", self.position.is_some()),
            ("normal", self.normal.is_some()),
            ("color", self.color.is_some()),
            ("uv", self.uv.is_some()),
            ("skinWeight", self.skin_weight.is_some()),
            ("skinIndex", self.skin_index.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, attached)| attached.then_some(name))
        .collect()
    }

    pub fn vertex_count(&self) -> usize {
        self.position.as_ref().map_or(0, Attribute::count)
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let position = self.position.as_ref()?;
        (0..position.count())
            .map(|i| {
                let p = read::<3, _>(position, i, [0.0; 3]);
                Bounds { min: p, max: p }
            })
            .reduce(|a, b| a.union(&b))
    }

    /// Interleave all attributes into one vertex per position.
    ///
    /// Attributes shorter than the position list fall back to defaults for the
    /// missing vertices.
    pub fn to_vertices(&self) -> Vec<ModelVertex> {
        let count = self.vertex_count();
        warn_if_short("normal", self.normal.as_ref(), count);
        warn_if_short("color", self.color.as_ref(), count);
        warn_if_short("uv", self.uv.as_ref(), count);
        warn_if_short("skinWeight", self.skin_weight.as_ref(), count);
        warn_if_short("skinIndex", self.skin_index.as_ref(), count);

        (0..count)
            .map(|i| ModelVertex {
                position: self.position.as_ref().map_or([0.0; 3], |p| read(p, i, [0.0; 3])),
                normal: self.normal.as_ref().map_or([0.0; 3], |n| read(n, i, [0.0; 3])),
                tex_coords: self.uv.as_ref().map_or([0.0; 2], |uv| read(uv, i, [0.0; 2])),
                color: self
                    .color
                    .as_ref()
                    .map_or([255; 4], |c| read(c, i, [255; 4])),
                skin_weight: self
                    .skin_weight
                    .as_ref()
                    .map_or([0.0; 4], |w| read(w, i, [0.0; 4])),
                skin_index: self
                    .skin_index
                    .as_ref()
                    .map_or([0; 4], |j| read(j, i, [0; 4])),
            })
            .collect()
    }

    /// Triangle indices, or `None` when the mesh is drawn without an index buffer.
    pub fn indices(&self) -> Result<Option<Vec<u16>>> {
        let Some(index) = &self.index else {
            return Ok(None);
        };
        let count = self.vertex_count();
        let mut indices = index.array.clone();
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= count) {
            bail!("index {bad} is out of range for {count} vertices");
        }
        let whole_triangles = indices.len() - indices.len() % 3;
        if whole_triangles != indices.len() {
            log::warn!(
                "{} indices do not form whole triangles, dropping the last {}",
                indices.len(),
                indices.len() - whole_triangles
            );
            indices.truncate(whole_triangles);
        }
        Ok(Some(indices))
    }
}

/// Read up to `N` components of item `i`; missing components keep `defaults`.
fn read<const N: usize, T: Element>(attribute: &Attribute<T>, i: usize, defaults: [T; N]) -> [T; N] {
    let mut out = defaults;
    for (component, slot) in out.iter_mut().enumerate() {
        if let Some(value) = attribute.component(i, component) {
            *slot = value;
        }
    }
    out
}

fn warn_if_short<T: Element>(name: &str, attribute: Option<&Attribute<T>>, count: usize) {
    if let Some(attribute) = attribute {
        if attribute.count() < count {
            log::warn!(
                "{name} has {} items for {count} vertices, padding with defaults",
                attribute.count()
            );
        }
    }
}
