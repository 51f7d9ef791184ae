//! Fetching and decoding of models, materials and textures.
//!
//! Loading a model is a chain of requests: the model document first, then for
//! every mesh its material document, then every texture the material lists
//! (header, then data). [`fetch_model`] runs that chain and returns plain CPU
//! data; [`ModelData::upload`] turns it into GPU resources on the render
//! thread.

use anyhow::{Context, Result, anyhow};
use futures::future::join_all;
use wgpu::util::DeviceExt;

use crate::data_structures::{
    geometry::Geometry,
    model::{self, Material, Mesh},
    texture::Texture,
};

pub mod attribute;
pub mod documents;
pub mod paths;
pub mod source;
pub mod texture;

use documents::{MaterialDocument, MeshDocument, ModelDocument, TextureDocument};
use paths::ModelSelection;
use source::AssetSource;
use texture::TextureData;

/// Material slots the basic pipeline binds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureSlot {
    Diffuse,
    Specular,
    Normal,
}

impl TextureSlot {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "diffuse" => Some(TextureSlot::Diffuse),
            "specular" => Some(TextureSlot::Specular),
            "normal" => Some(TextureSlot::Normal),
            _ => None,
        }
    }

    /// Only the diffuse map holds colour; the others are sampled linearly.
    pub fn is_linear(&self) -> bool {
        !matches!(self, TextureSlot::Diffuse)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialData {
    pub name: String,
    pub diffuse: Option<TextureData>,
    pub specular: Option<TextureData>,
    pub normal: Option<TextureData>,
}

impl MaterialData {
    fn slot_mut(&mut self, slot: TextureSlot) -> &mut Option<TextureData> {
        match slot {
            TextureSlot::Diffuse => &mut self.diffuse,
            TextureSlot::Specular => &mut self.specular,
            TextureSlot::Normal => &mut self.normal,
        }
    }

    pub fn upload(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        supports_bc: bool,
    ) -> Material {
        let upload = |data: &Option<TextureData>, slot: TextureSlot| {
            let data = data.as_ref()?;
            match data.upload(device, queue, supports_bc, slot.is_linear()) {
                Ok(texture) => Some(texture),
                Err(e) => {
                    log::warn!("{:?} map {} could not be uploaded: {e:#}", slot, data.path);
                    None
                }
            }
        };
        let diffuse = upload(&self.diffuse, TextureSlot::Diffuse).unwrap_or_else(|| {
            Texture::create_solid_colour([255; 4], "default diffuse map", device, queue)
        });
        let specular = upload(&self.specular, TextureSlot::Specular).unwrap_or_else(|| {
            Texture::create_solid_colour([0, 0, 0, 255], "default specular map", device, queue)
        });
        let normal = upload(&self.normal, TextureSlot::Normal)
            .unwrap_or_else(|| Texture::create_default_normal_map(device, queue));
        Material::new(device, &self.name, diffuse, specular, normal, layout)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub geometry: Geometry,
    pub material: MaterialData,
}

/// Everything needed to show one model, without any GPU resources yet.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelData {
    pub selection: ModelSelection,
    pub meshes: Vec<MeshData>,
}

impl ModelData {
    pub fn upload(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        supports_bc: bool,
    ) -> model::Model {
        let mut meshes = Vec::new();
        let mut materials = Vec::new();
        let mut bounds = None;

        for mesh in &self.meshes {
            if mesh.geometry.is_empty() {
                log::warn!("{} has no vertices and is skipped", mesh.name);
                continue;
            }
            let indices = match mesh.geometry.indices() {
                Ok(indices) => indices,
                Err(e) => {
                    log::warn!("{} is skipped: {e:#}", mesh.name);
                    continue;
                }
            };
            if matches!(&indices, Some(indices) if indices.is_empty()) {
                log::warn!("{} has no whole triangles and is skipped", mesh.name);
                continue;
            }
            let vertices = mesh.geometry.to_vertices();
            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Vertex Buffer", mesh.name)),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let (index_buffer, num_elements) = match &indices {
                Some(indices) => (
                    Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} Index Buffer", mesh.name)),
                        contents: bytemuck::cast_slice(indices),
                        usage: wgpu::BufferUsages::INDEX,
                    })),
                    indices.len() as u32,
                ),
                None => (None, vertices.len() as u32),
            };

            if let Some(mesh_bounds) = mesh.geometry.bounds() {
                bounds = Some(match bounds {
                    Some(b) => mesh_bounds.union(&b),
                    None => mesh_bounds,
                });
            }
            materials.push(mesh.material.upload(device, queue, layout, supports_bc));
            meshes.push(Mesh {
                name: mesh.name.clone(),
                vertex_buffer,
                index_buffer,
                num_elements,
                material: materials.len() - 1,
            });
        }

        model::Model {
            name: self.selection.to_string(),
            meshes,
            materials,
            bounds,
        }
    }
}

/// Fetch a model and everything its first level of detail references.
///
/// Meshes whose geometry is malformed are dropped; meshes whose material or
/// textures fail to load keep their geometry and fall back to default maps.
pub async fn fetch_model(source: &AssetSource, selection: ModelSelection) -> Result<ModelData> {
    let model_path = selection.model_path();
    log::info!("loading {selection} from {model_path}");
    let text = source.load_string(&model_path).await?;
    let document: ModelDocument = documents::parse(&text, &model_path)?;
    let lod = document
        .lods
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("{model_path} has no levels of detail"))?;

    let meshes = lod
        .meshes
        .into_iter()
        .enumerate()
        .map(|(idx, mesh)| fetch_mesh(source, selection, idx, mesh));
    let meshes = join_all(meshes)
        .await
        .into_iter()
        .enumerate()
        .filter_map(|(idx, result)| match result {
            Ok(mesh) => Some(mesh),
            Err(e) => {
                log::warn!("mesh {idx} of {model_path} could not be loaded: {e:#}");
                None
            }
        })
        .collect();

    Ok(ModelData { selection, meshes })
}

async fn fetch_mesh(
    source: &AssetSource,
    selection: ModelSelection,
    idx: usize,
    mesh: MeshDocument,
) -> Result<MeshData> {
    let geometry = Geometry::from_attributes(&mesh.attributes)?;
    log::debug!("mesh {idx} attributes: {:?}", geometry.attribute_names());
    let name = format!("{selection} mesh {idx}");

    let material = match &mesh.material {
        Some(material) => match fetch_material(source, selection, material).await {
            Ok(material) => material,
            Err(e) => {
                log::warn!("{name} falls back to the default material: {e:#}");
                MaterialData {
                    name: material.clone(),
                    ..Default::default()
                }
            }
        },
        None => MaterialData {
            name: format!("{name} default material"),
            ..Default::default()
        },
    };

    Ok(MeshData {
        name,
        geometry,
        material,
    })
}

/// Fetch a material document and all of its textures, waiting for every texture.
pub async fn fetch_material(
    source: &AssetSource,
    selection: ModelSelection,
    material: &str,
) -> Result<MaterialData> {
    let material_path = selection.material_path(material);
    let text = source.load_string(&material_path).await?;
    let document: MaterialDocument = documents::parse(&text, &material_path)?;

    let textures = document.referenced_textures().map(|(slot, path)| async move {
        (slot, path, fetch_texture(source, path).await)
    });
    let mut data = MaterialData {
        name: material.to_string(),
        ..Default::default()
    };
    for (slot_name, path, result) in join_all(textures).await {
        let texture = match result {
            Ok(texture) => texture,
            Err(e) => {
                log::warn!("{slot_name} map of {material_path} is unavailable: {e:#}");
                continue;
            }
        };
        match TextureSlot::from_name(slot_name) {
            Some(slot) => *data.slot_mut(slot) = Some(texture),
            None => log::warn!("{material_path} binds {path} to unknown slot {slot_name}"),
        }
    }
    Ok(data)
}

/// Fetch a texture header and its top-level pixel data.
pub async fn fetch_texture(source: &AssetSource, path: &str) -> Result<TextureData> {
    let header_path = paths::texture_header_path(path);
    let header = source.load_string(&header_path).await?;
    let document: TextureDocument = documents::parse(&header, &header_path)?;
    let data = source
        .load_binary(&paths::texture_data_path(path))
        .await
        .with_context(|| format!("no pixel data for {path}"))?;
    TextureData::decode(path, &document, &data)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resources::texture::{TexturePixels, material_layout};

    fn device(limits: wgpu::Limits) -> (wgpu::Device, wgpu::Queue) {
        wgpu::Device::noop(&wgpu::DeviceDescriptor {
            required_limits: limits,
            ..Default::default()
        })
    }

    fn mesh(name: &str, attributes: serde_json::Value) -> MeshData {
        MeshData {
            name: name.to_string(),
            geometry: Geometry::from_attributes(&serde_json::from_value(attributes).unwrap())
                .unwrap(),
            material: MaterialData {
                name: format!("{name} material"),
                ..Default::default()
            },
        }
    }

    fn rgba_texture(width: u32, height: u32) -> TextureData {
        TextureData {
            path: "d.tex".into(),
            width,
            height,
            pixels: TexturePixels::Rgba(image::RgbaImage::new(width, height)),
        }
    }

    fn upload(meshes: Vec<MeshData>, limits: wgpu::Limits) -> model::Model {
        let (device, queue) = device(limits);
        let layout = material_layout(&device);
        ModelData {
            selection: ModelSelection::new(1, 1, 1),
            meshes,
        }
        .upload(&device, &queue, &layout, false)
    }

    #[test]
    fn slots_are_recognised_by_name() {
        assert_eq!(TextureSlot::from_name("diffuse"), Some(TextureSlot::Diffuse));
        assert_eq!(TextureSlot::from_name("normal"), Some(TextureSlot::Normal));
        assert_eq!(TextureSlot::from_name("emissive"), None);
        assert!(!TextureSlot::Diffuse.is_linear());
        assert!(TextureSlot::Specular.is_linear());
    }

    #[test]
    fn material_slots_are_assignable() {
        let mut material = MaterialData::default();
        *material.slot_mut(TextureSlot::Specular) = Some(rgba_texture(1, 1));
        assert!(material.specular.is_some());
        assert!(material.diffuse.is_none());
    }

    #[test]
    fn meshes_without_drawable_triangles_are_skipped() {
        let model = upload(
            vec![
                mesh("empty", json!({"indices": [0, 1, 2]})),
                mesh(
                    "partial triangle",
                    json!({"positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]], "indices": [0, 1]}),
                ),
                mesh(
                    "out of range",
                    json!({"positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]], "indices": [0, 1, 5]}),
                ),
                mesh(
                    "triangle",
                    json!({"positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]], "indices": [0, 1, 2, 2]}),
                ),
                mesh("soup", json!({"positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]]})),
            ],
            wgpu::Limits::default(),
        );

        let names: Vec<_> = model.meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["triangle", "soup"]);
        assert_eq!(model.materials.len(), 2);
        assert_eq!(model.meshes[1].material, 1);

        let triangle = &model.meshes[0];
        assert_eq!(triangle.num_elements, 3);
        assert!(triangle.index_buffer.is_some());
        assert!(model.meshes[1].index_buffer.is_none());
        assert_eq!(model.meshes[1].num_elements, 3);
    }

    #[test]
    fn model_bounds_cover_every_mesh() {
        let model = upload(
            vec![
                mesh("a", json!({"positions": [[-1, 0, 0], [0, 2, 0], [0, 0, 1]]})),
                mesh("b", json!({"positions": [[3, -4, 0], [0, 0, 0], [0, 0, 0]]})),
            ],
            wgpu::Limits::default(),
        );
        let bounds = model.bounds.unwrap();
        assert_eq!(bounds.min, [-1.0, -4.0, 0.0]);
        assert_eq!(bounds.max, [3.0, 2.0, 1.0]);
        assert_eq!(model.name, "m0001b0001v0001");
    }

    #[test]
    fn missing_maps_use_single_pixel_defaults() {
        let mut triangle = mesh("t", json!({"positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]]}));
        triangle.material.diffuse = Some(rgba_texture(8, 4));
        let model = upload(vec![triangle], wgpu::Limits::default());

        let material = &model.materials[0];
        assert_eq!(material.name, "t material");
        assert_eq!(material.diffuse_texture.texture.width(), 8);
        assert_eq!(
            material.diffuse_texture.texture.format(),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
        for default in [&material.specular_texture, &material.normal_texture] {
            assert_eq!(default.texture.width(), 1);
            assert_eq!(default.texture.height(), 1);
        }
    }

    #[test]
    fn textures_beyond_the_device_limit_fall_back_to_defaults() {
        let mut triangle = mesh("t", json!({"positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]]}));
        triangle.material.diffuse = Some(rgba_texture(4096, 4));
        triangle.material.normal = Some(rgba_texture(4, 4096));
        let model = upload(vec![triangle], wgpu::Limits::downlevel_webgl2_defaults());

        let material = &model.materials[0];
        assert_eq!(material.diffuse_texture.texture.width(), 1);
        assert_eq!(material.normal_texture.texture.height(), 1);
    }

    #[test]
    fn compressed_maps_are_decoded_without_bc_support() {
        let mut triangle = mesh("t", json!({"positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]]}));
        triangle.material.diffuse = Some(TextureData {
            path: "d.tex".into(),
            width: 4,
            height: 4,
            pixels: TexturePixels::Compressed {
                format: crate::data_structures::texture::BlockFormat::Bc1,
                blocks: vec![0; 8],
            },
        });
        let model = upload(vec![triangle], wgpu::Limits::default());
        assert_eq!(
            model.materials[0].diffuse_texture.texture.format(),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
    }
}
