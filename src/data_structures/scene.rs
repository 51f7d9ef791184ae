//! The model currently on screen and bookkeeping for loads in flight.

use crate::{
    data_structures::model::{DrawModel, Model},
    resources::paths::ModelSelection,
};

/// Identifies one `display` request; later requests have larger ids.
pub type RequestId = u64;

#[derive(Debug, Default)]
pub struct Scene {
    model: Option<Model>,
    latest: RequestId,
}

impl Scene {
    /// Start a new request; any result for an older one will be ignored.
    pub fn request(&mut self) -> RequestId {
        self.latest += 1;
        self.latest
    }

    pub fn is_current(&self, request: RequestId) -> bool {
        request == self.latest
    }

    /// Replace the scene if `request` is still the latest one.
    pub fn replace(&mut self, request: RequestId, selection: ModelSelection, model: Model) -> bool {
        if !self.is_current(request) {
            log::debug!("dropping {selection} from stale request {request}");
            return false;
        }
        self.model = Some(model);
        true
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn draw<'a, 'b: 'a>(
        &'b self,
        render_pass: &mut wgpu::RenderPass<'a>,
        camera: &'b wgpu::BindGroup,
    ) {
        if let Some(model) = &self.model {
            render_pass.draw_model(model, camera);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_count_up() {
        let mut scene = Scene::default();
        let first = scene.request();
        let second = scene.request();
        assert!(second > first);
        assert!(scene.is_current(second));
        assert!(!scene.is_current(first));
    }

    #[test]
    fn stale_results_do_not_replace_the_scene() {
        let mut scene = Scene::default();
        let stale = scene.request();
        let _latest = scene.request();
        let model = Model {
            name: "m0001b0001v0001".into(),
            meshes: Vec::new(),
            materials: Vec::new(),
            bounds: None,
        };
        assert!(!scene.replace(stale, ModelSelection::new(1, 1, 1), model));
        assert!(scene.model().is_none());
    }
}
