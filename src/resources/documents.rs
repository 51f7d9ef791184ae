//! JSON documents served by the model server.
//!
//! The model document only fixes its outer structure (levels of detail, meshes,
//! a map of attributes); the attribute arrays themselves stay untyped
//! [`serde_json::Value`]s until [`crate::resources::attribute::flatten`]
//! decides their shape.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

/// Top level of a `.mdl` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDocument {
    pub lods: Vec<LodDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LodDocument {
    #[serde(default)]
    pub meshes: Vec<MeshDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeshDocument {
    /// Material file name, appended verbatim to the material directory.
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub attributes: AttributeSet,
}

/// Raw vertex attributes of one mesh, keyed the way the server names them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttributeSet {
    pub indices: Option<Value>,
    pub positions: Option<Value>,
    pub normals: Option<Value>,
    pub colors: Option<Value>,
    pub uvs: Option<Value>,
    pub blend_weights: Option<Value>,
    pub blend_indices: Option<Value>,
}

/// A `.mtrl` response: texture slot name to texture path (`null` when unused).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialDocument {
    #[serde(default)]
    pub textures: BTreeMap<String, Option<String>>,
}

impl MaterialDocument {
    /// Slots that actually reference a texture, in slot-name order.
    pub fn referenced_textures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.textures
            .iter()
            .filter_map(|(slot, path)| Some((slot.as_str(), path.as_deref()?)))
    }
}

/// Pixel encoding of a texture as reported by the `tex/` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TextureKind {
    #[serde(rename = "RGB5A1")]
    Rgb5a1,
    #[serde(rename = "RGB4A4")]
    Rgb4a4,
    #[serde(rename = "RGB8A8")]
    Rgb8a8,
    #[serde(rename = "DXT1")]
    Dxt1,
    #[serde(rename = "DXT5")]
    Dxt5,
    #[serde(rename = "RGBAF")]
    Rgbaf,
}

impl TextureKind {
    /// Size in bytes of the top mip level for the given dimensions.
    ///
    /// Fails when the size does not fit in `usize` (only reachable on 32-bit targets).
    pub fn top_level_size(&self, width: u32, height: u32) -> Result<usize> {
        let (width, height) = (width as usize, height as usize);
        let blocks = width
            .div_ceil(4)
            .max(1)
            .checked_mul(height.div_ceil(4).max(1));
        let size = match self {
            TextureKind::Rgb5a1 | TextureKind::Rgb4a4 => pixels_times(width, height, 2),
            TextureKind::Rgb8a8 => pixels_times(width, height, 4),
            TextureKind::Rgbaf => pixels_times(width, height, 8),
            TextureKind::Dxt1 => blocks.and_then(|b| b.checked_mul(8)),
            TextureKind::Dxt5 => blocks.and_then(|b| b.checked_mul(16)),
        };
        size.with_context(|| format!("a {width}x{height} {self:?} texture is too large"))
    }
}

fn pixels_times(width: usize, height: usize, bytes: usize) -> Option<usize> {
    width.checked_mul(height)?.checked_mul(bytes)
}

/// A `tex/` response describing the binary served under `tex_data/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TextureDocument {
    #[serde(rename = "type")]
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
}

pub fn parse<T: DeserializeOwned>(text: &str, path: &str) -> Result<T> {
    serde_json::from_str(text)
        .with_context(|| format!("{path} is not a valid {}", std::any::type_name::<T>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_documents_with_partial_attributes() {
        let json = r#"{
            "lods": [
                {"meshes": [
                    {"material": "/mt_m0001b0001_a.mtrl",
                     "attributes": {"positions": [[0, 0, 0]], "indices": [0], "tangents": [1]}},
                    {"attributes": {}}
                ]},
                {"meshes": []}
            ]
        }"#;
        let model: ModelDocument = parse(json, "m0001b0001.mdl").unwrap();
        assert_eq!(model.lods.len(), 2);
        let meshes = &model.lods[0].meshes;
        assert_eq!(meshes[0].material.as_deref(), Some("/mt_m0001b0001_a.mtrl"));
        assert!(meshes[0].attributes.positions.is_some());
        assert!(meshes[0].attributes.normals.is_none());
        assert!(meshes[1].material.is_none());
        assert!(meshes[1].attributes.indices.is_none());
    }

    #[test]
    fn material_documents_skip_unused_slots() {
        let json = r#"{"textures": {
            "diffuse": "chara/monster/m0001/obj/body/b0001/texture/v01_m0001b0001_d.tex",
            "specular": null,
            "normal": "chara/monster/m0001/obj/body/b0001/texture/v01_m0001b0001_n.tex"
        }}"#;
        let material: MaterialDocument = parse(json, "mt.mtrl").unwrap();
        let slots: Vec<&str> = material.referenced_textures().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec!["diffuse", "normal"]);
    }

    #[test]
    fn texture_documents_name_their_kind() {
        let texture: TextureDocument =
            parse(r#"{"type": "DXT5", "width": 256, "height": 128}"#, "t.tex").unwrap();
        assert_eq!(texture.kind, TextureKind::Dxt5);
        assert_eq!(
            texture.kind.top_level_size(texture.width, texture.height).unwrap(),
            64 * 32 * 16
        );
        assert!(parse::<TextureDocument>(r#"{"type": "BC7", "width": 1, "height": 1}"#, "t.tex").is_err());
    }

    #[test]
    fn block_sizes_round_up_to_whole_blocks() {
        assert_eq!(TextureKind::Dxt1.top_level_size(2, 2).unwrap(), 8);
        assert_eq!(TextureKind::Dxt1.top_level_size(6, 4).unwrap(), 16);
        assert_eq!(TextureKind::Rgb4a4.top_level_size(3, 3).unwrap(), 18);
        assert_eq!(TextureKind::Rgbaf.top_level_size(2, 1).unwrap(), 16);
    }

    #[test]
    fn oversized_textures_are_errors() {
        assert!(TextureKind::Rgbaf.top_level_size(u32::MAX, u32::MAX).is_err());
        let size = TextureKind::Rgbaf.top_level_size(u16::MAX as u32, u16::MAX as u32);
        // 65535 x 65535 x 8 only fits in a 64-bit usize
        #[cfg(target_pointer_width = "64")]
        assert_eq!(size.unwrap(), 65535 * 65535 * 8);
        #[cfg(not(target_pointer_width = "64"))]
        assert!(size.is_err());
    }

    #[test]
    fn malformed_documents_mention_their_path() {
        let err = parse::<ModelDocument>("{\"lods\": 3}", "broken.mdl").unwrap_err();
        assert!(format!("{err}").contains("broken.mdl"));
    }
}
