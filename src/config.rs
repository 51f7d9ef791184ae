//! Viewer configuration.
//!
//! Native builds read an optional JSON file named by `MDL_VIEWER_CONFIG` and
//! then apply positional arguments `[source] [monster] [body] [variant]`.
//! The browser build takes its base URL from the page origin and the initial
//! model from the query string (`?m=0001&b=0001&v=0001`).

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::resources::{
    paths::{ModelSelection, parse_id},
    source::AssetSource,
};

pub const CONFIG_ENV: &str = "MDL_VIEWER_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub source: AssetSource,
    pub selection: ModelSelection,
    pub clear_colour: [f64; 4],
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Initial distance of the camera from the origin along +z.
    pub distance: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            source: AssetSource::default(),
            selection: ModelSelection::new(1, 1, 1),
            clear_colour: [0.0, 0.0, 0.0, 1.0],
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            distance: 5.0,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Override fields from positional arguments (program name already stripped).
    pub fn apply_args<I: IntoIterator<Item = String>>(mut self, args: I) -> Result<Self> {
        let args: Vec<String> = args.into_iter().collect();
        if let Some(source) = args.first() {
            self.source = AssetSource::from_arg(source);
        }
        match &args[1.min(args.len())..] {
            [] => (),
            [monster, body, variant, ..] => {
                self.selection = ModelSelection::parse(monster, body, variant)?;
            }
            _ => anyhow::bail!("expected monster, body and variant ids after the source"),
        }
        Ok(self)
    }

    /// Configuration for the native binary: config file, then command line.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Result<Self> {
        let config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("could not read {}", path.to_string_lossy()))?;
                Self::from_json(&text)
                    .with_context(|| format!("invalid config {}", path.to_string_lossy()))?
            }
            None => Self::default(),
        };
        config.apply_args(std::env::args().skip(1))
    }

    /// Configuration derived from a page URL such as `http://host/viewer?m=2&b=1&v=1`.
    ///
    /// Assets are served from the root of the page's origin.
    pub fn from_page_url(href: &str) -> Result<Self> {
        let url = reqwest::Url::parse(href).with_context(|| format!("invalid page url {href}"))?;

        let mut selection = ModelSelection::new(1, 1, 1);
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "m" => selection.monster = parse_id("monster", &value)?,
                "b" => selection.body = parse_id("body", &value)?,
                "v" => selection.variant = parse_id("variant", &value)?,
                _ => (),
            }
        }

        let base_url = format!("{}/", url.origin().ascii_serialization());

        Ok(Self {
            source: AssetSource::Http { base_url },
            selection,
            ..Self::default()
        })
    }

    #[cfg(target_arch = "wasm32")]
    pub fn from_location() -> Result<Self> {
        let href = web_sys::window()
            .context("no window")?
            .location()
            .href()
            .map_err(|e| anyhow::anyhow!("could not read the page location: {e:?}"))?;
        Self::from_page_url(&href)
    }
}
