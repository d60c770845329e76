use crate::libs::color::Palette;
use crate::libs::design::TrackDesign;
use crate::libs::error::{HubError, Result};
use crate::libs::track::{FILE_FIELD, NAME_FIELD};
use serde::{Deserialize, Serialize};

/// Which metadata columns shape the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingSpec {
    /// Columns whose joined values name the supertracks
    #[serde(default)]
    pub supergroup_keys: Vec<String>,
    /// Composite dimensions
    #[serde(default)]
    pub subgroup_keys: Vec<String>,
    /// Column whose value is the only difference inside an overlay
    #[serde(default)]
    pub overlay_key: Option<String>,
    #[serde(default)]
    pub color_key: Option<String>,
    #[serde(default)]
    pub palette: Palette,
}

impl GroupingSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn supergroup_by<S: AsRef<str>>(mut self, keys: &[S]) -> Self {
        push_unique(&mut self.supergroup_keys, keys);
        self
    }

    pub fn subgroup_by<S: AsRef<str>>(mut self, keys: &[S]) -> Self {
        push_unique(&mut self.subgroup_keys, keys);
        self
    }

    pub fn overlay_by(mut self, key: &str) -> Self {
        self.overlay_key = Some(key.to_string());
        self
    }

    pub fn color_by(mut self, key: &str, palette: Palette) -> Self {
        self.color_key = Some(key.to_string());
        self.palette = palette;
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Every key the grouping steps partition by.
    pub fn grouping_keys(&self) -> Vec<String> {
        let mut keys = self.supergroup_keys.clone();
        keys.extend(self.subgroup_keys.iter().cloned());
        keys.extend(self.overlay_key.iter().cloned());
        keys
    }

    /// Internal consistency, then every referenced column against the
    /// design's schema. Runs before any hierarchy work.
    pub fn validate(&self, design: &TrackDesign) -> Result<()> {
        for key in self.grouping_keys().iter().chain(self.color_key.iter()) {
            if key.trim().is_empty() {
                return Err(HubError::InvalidSpec("empty column name".to_string()));
            }
        }
        for key in self.grouping_keys() {
            if key == NAME_FIELD {
                return Err(HubError::InvalidSpec(format!(
                    "`{}` is the display label and can't be grouped by",
                    NAME_FIELD
                )));
            }
        }
        for key in self.grouping_keys().iter().chain(self.color_key.iter()) {
            if key == FILE_FIELD {
                return Err(HubError::InvalidSpec(format!(
                    "`{}` is the track file, group or color by a metadata column",
                    FILE_FIELD
                )));
            }
        }
        if let Some(overlay) = &self.overlay_key {
            if self.subgroup_keys.contains(overlay) {
                return Err(HubError::InvalidSpec(format!(
                    "overlay column `{}` is also a subgroup column",
                    overlay
                )));
            }
            if self.supergroup_keys.contains(overlay) {
                return Err(HubError::InvalidSpec(format!(
                    "overlay column `{}` is also a supergroup column",
                    overlay
                )));
            }
        }
        if let Some(key) = self
            .subgroup_keys
            .iter()
            .find(|k| self.supergroup_keys.contains(k))
        {
            return Err(HubError::InvalidSpec(format!(
                "subgroup column `{}` is also a supergroup column",
                key
            )));
        }

        for key in &self.supergroup_keys {
            design.require_column(key, "supertracks")?;
        }
        for key in &self.subgroup_keys {
            design.require_column(key, "subgroups")?;
        }
        if let Some(key) = &self.overlay_key {
            design.require_column(key, "overlays")?;
        }
        if let Some(key) = &self.color_key {
            design.require_column(key, "colors")?;
        }

        Ok(())
    }

    /// Union of two specs, first-seen order. Overlay and color settings of
    /// `self` win when both are set.
    pub fn union(&self, other: &GroupingSpec) -> GroupingSpec {
        let mut spec = self.clone();
        push_unique(&mut spec.supergroup_keys, &other.supergroup_keys);
        push_unique(&mut spec.subgroup_keys, &other.subgroup_keys);
        if spec.overlay_key.is_none() {
            spec.overlay_key = other.overlay_key.clone();
        }
        if spec.color_key.is_none() {
            spec.color_key = other.color_key.clone();
            spec.palette = other.palette;
        }
        spec
    }
}

fn push_unique<S: AsRef<str>>(keys: &mut Vec<String>, new: &[S]) {
    for k in new {
        let k = k.as_ref();
        if !keys.iter().any(|e| e == k) {
            keys.push(k.to_string());
        }
    }
}
