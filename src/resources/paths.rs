//! Server-relative paths of the model, material and texture endpoints.

use std::{fmt, str::FromStr};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Which monster body variant to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ModelSelection {
    pub monster: u16,
    pub body: u16,
    pub variant: u16,
}

impl ModelSelection {
    pub fn new(monster: u16, body: u16, variant: u16) -> Self {
        Self {
            monster,
            body,
            variant,
        }
    }

    /// Build a selection from the raw text of the three id fields.
    pub fn parse(monster: &str, body: &str, variant: &str) -> Result<Self> {
        Ok(Self {
            monster: parse_id("monster", monster)?,
            body: parse_id("body", body)?,
            variant: parse_id("variant", variant)?,
        })
    }

    fn body_dir(&self) -> String {
        format!(
            "chara/monster/m{:04}/obj/body/b{:04}",
            self.monster, self.body
        )
    }

    pub fn model_path(&self) -> String {
        format!(
            "model/{}/model/m{:04}b{:04}.mdl",
            self.body_dir(),
            self.monster,
            self.body
        )
    }

    /// `material` is appended as-is; the model document usually stores it with a leading `/`.
    pub fn material_path(&self, material: &str) -> String {
        format!(
            "mtrl/{}/material/v{:04}{}",
            self.body_dir(),
            self.variant,
            material
        )
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m{:04}b{:04}v{:04}",
            self.monster, self.body, self.variant
        )
    }
}

pub fn parse_id(field: &str, raw: &str) -> Result<u16> {
    u16::from_str(raw.trim()).with_context(|| format!("{field} id {raw:?} is not a number"))
}

pub fn texture_header_path(texture: &str) -> String {
    format!("tex/{}", texture.trim_start_matches('/'))
}

pub fn texture_data_path(texture: &str) -> String {
    format!("tex_data/{}", texture.trim_start_matches('/'))
}
