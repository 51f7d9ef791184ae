#![cfg(not(target_arch = "wasm32"))]

use mdl_viewer::{
    AssetSource, ModelSelection, fetch_model,
    resources::{fetch_material, fetch_texture, texture::TexturePixels},
};

fn fixtures() -> AssetSource {
    AssetSource::Directory {
        root: concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures").into(),
    }
}

const DIFFUSE: &str = "chara/monster/m0001/obj/body/b0001/texture/v01_m0001b0001_d.tex";

#[tokio::test]
async fn loads_meshes_in_document_order() {
    let model = fetch_model(&fixtures(), ModelSelection::new(1, 1, 1))
        .await
        .unwrap();

    // the third mesh has malformed normals and is dropped
    let names: Vec<_> = model.meshes.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["m0001b0001v0001 mesh 0", "m0001b0001v0001 mesh 1"]);

    let quad = &model.meshes[0];
    assert_eq!(quad.geometry.vertex_count(), 4);
    assert_eq!(quad.geometry.indices().unwrap(), Some(vec![0, 1, 2, 2, 1, 3]));
    assert_eq!(
        quad.geometry.attribute_names(),
        vec!["index", "position", "normal", "uv", "skinWeight", "skinIndex"]
    );

    let triangle = &model.meshes[1];
    assert_eq!(triangle.geometry.indices().unwrap(), None);
    assert_eq!(triangle.geometry.to_vertices()[2].color, [0, 0, 255, 255]);
}

#[tokio::test]
async fn materials_wait_for_their_textures() {
    let model = fetch_model(&fixtures(), ModelSelection::new(1, 1, 1))
        .await
        .unwrap();

    let material = &model.meshes[0].material;
    assert_eq!(material.name, "/mt_m0001b0001_a.mtrl");
    let diffuse = material.diffuse.as_ref().unwrap();
    assert_eq!((diffuse.width, diffuse.height), (2, 1));
    // the normal map header exists but its data does not
    assert!(material.normal.is_none());
    assert!(material.specular.is_none());
}

#[tokio::test]
async fn unknown_slots_are_not_bound() {
    let material = fetch_material(
        &fixtures(),
        ModelSelection::new(1, 1, 1),
        "/mt_m0001b0001_a.mtrl",
    )
    .await
    .unwrap();

    // "emissive" names the diffuse texture but has no slot to go to
    let diffuse = fetch_texture(&fixtures(), DIFFUSE).await.unwrap();
    assert_eq!(material.diffuse, Some(diffuse));
    assert!(material.specular.is_none());
    assert!(material.normal.is_none());
}

#[tokio::test]
async fn missing_materials_fall_back_to_defaults() {
    let model = fetch_model(&fixtures(), ModelSelection::new(1, 1, 1))
        .await
        .unwrap();

    let material = &model.meshes[1].material;
    assert_eq!(material.name, "/mt_m0001b0001_missing.mtrl");
    assert!(material.diffuse.is_none());
    assert!(material.specular.is_none());
    assert!(material.normal.is_none());
}

#[tokio::test]
async fn models_without_lods_are_errors() {
    let err = fetch_model(&fixtures(), ModelSelection::new(2, 1, 1))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("levels of detail"));

    assert!(
        fetch_model(&fixtures(), ModelSelection::new(3, 1, 1))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn textures_are_decoded_to_rgba() {
    let texture = fetch_texture(&fixtures(), DIFFUSE).await.unwrap();
    let TexturePixels::Rgba(image) = &texture.pixels else {
        panic!("expected decoded pixels");
    };
    assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(1, 0).0, [0, 0, 255, 255]);

    // leading slashes are tolerated
    assert!(fetch_texture(&fixtures(), &format!("/{DIFFUSE}")).await.is_ok());
}

#[tokio::test]
async fn material_lookup_uses_the_variant_directory() {
    let source = fixtures();
    assert!(
        fetch_material(&source, ModelSelection::new(1, 1, 1), "/mt_m0001b0001_a.mtrl")
            .await
            .is_ok()
    );
    assert!(
        fetch_material(&source, ModelSelection::new(1, 1, 2), "/mt_m0001b0001_a.mtrl")
            .await
            .is_err()
    );
}
