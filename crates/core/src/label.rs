//! Label vocabulary.
//!
//! A [`LabelInfo`] names one semantic category. Its numeric id doubles as a
//! packed color (`id << 8`) so label maps can be stored as RGB images.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;

use crate::error::{LayoutError, Result};

/// Closed set of semantic categories a label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    #[default]
    Unknown,
    Background,
    Text,
    Separator,
    Ignore,
}

impl LabelKind {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "background" => Self::Background,
            "text" => Self::Text,
            "separator" | "sep" => Self::Separator,
            "ignore" => Self::Ignore,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelInfo {
    pub id: u32,
    pub name: SmolStr,
    #[serde(default)]
    pub aliases: Vec<SmolStr>,
}

impl LabelInfo {
    pub fn new(id: u32, name: impl Into<SmolStr>) -> Self {
        Self {
            id,
            name: name.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<SmolStr>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn unknown() -> Self {
        Self::new(0, "unknown")
    }

    pub fn background() -> Self {
        Self::new(1, "background")
    }

    pub fn text() -> Self {
        Self::new(2, "text")
    }

    pub fn separator() -> Self {
        Self::new(3, "separator")
    }

    pub fn ignore() -> Self {
        Self::new(4, "ignore")
    }

    pub fn kind(&self) -> LabelKind {
        match LabelKind::from_name(&self.name) {
            LabelKind::Unknown => self
                .aliases
                .iter()
                .map(|a| LabelKind::from_name(a))
                .find(|k| *k != LabelKind::Unknown)
                .unwrap_or(LabelKind::Unknown),
            kind => kind,
        }
    }

    /// Packed color of the label.
    pub fn color(&self) -> u32 {
        self.id << 8
    }

    pub fn color_to_id(color: u32) -> u32 {
        (color >> 8) & 0xFFFF
    }

    /// True if `name` equals the label's name or one of its aliases
    /// (ASCII case-insensitive).
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for LabelInfo {
    /// `"id, name, alias, ..."`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.id, self.name)?;
        for alias in &self.aliases {
            write!(f, ", {alias}")?;
        }
        Ok(())
    }
}

impl FromStr for LabelInfo {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(',').map(str::trim);
        let id_part = parts.next().unwrap_or_default();
        let id: u32 = id_part.parse().map_err(|_| LayoutError::InvalidParameter {
            name: "label",
            value: s.to_string(),
            reason: "expected \"id, name, alias...\"",
        })?;
        let name = parts
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| LayoutError::InvalidParameter {
                name: "label",
                value: s.to_string(),
                reason: "label name is missing",
            })?;
        let mut label = LabelInfo::new(id, name);
        label.aliases.extend(parts.filter(|a| !a.is_empty()).map(SmolStr::from));
        Ok(label)
    }
}

/// A label attached to a pixel after classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelLabel {
    pub label: LabelInfo,
    pub confidence: f64,
    /// Ground truth, when known.
    #[serde(default)]
    pub true_label: Option<LabelInfo>,
}

impl PixelLabel {
    pub fn new(label: LabelInfo, confidence: f64) -> Self {
        Self {
            label,
            confidence,
            true_label: None,
        }
    }

    pub fn is_correct(&self) -> Option<bool> {
        self.true_label.as_ref().map(|t| t.id == self.label.id)
    }
}

/// Ordered label vocabulary with unique ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelManager {
    labels: Vec<LabelInfo>,
}

impl LabelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// background, text, separator, ignore
    pub fn default_vocabulary() -> Self {
        Self {
            labels: vec![
                LabelInfo::background(),
                LabelInfo::text(),
                LabelInfo::separator(),
                LabelInfo::ignore(),
            ],
        }
    }

    pub fn from_labels(labels: impl IntoIterator<Item = LabelInfo>) -> Result<Self> {
        let mut manager = Self::new();
        for label in labels {
            manager.add(label)?;
        }
        Ok(manager)
    }

    /// Adds `label`. Re-adding an identical label is a no-op; reusing an id
    /// for a different label is an error.
    pub fn add(&mut self, label: LabelInfo) -> Result<()> {
        if let Some(existing) = self.find_id(label.id) {
            if *existing == label {
                debug!(label = %label, "label already registered");
                return Ok(());
            }
            return Err(LayoutError::InvalidModel(format!(
                "label id {} is used by both {:?} and {:?}",
                label.id, existing.name, label.name
            )));
        }
        self.labels.push(label);
        Ok(())
    }

    /// Looks a label up by name, then by alias.
    pub fn find(&self, name: &str) -> Option<&LabelInfo> {
        self.labels
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
            .or_else(|| self.labels.iter().find(|l| l.matches(name)))
    }

    pub fn find_id(&self, id: u32) -> Option<&LabelInfo> {
        self.labels.iter().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.labels.iter().position(|l| l.id == id)
    }

    pub fn get(&self, idx: usize) -> Option<&LabelInfo> {
        self.labels.get(idx)
    }

    /// Resolves a packed color back to its label.
    pub fn from_color(&self, color: u32) -> Result<&LabelInfo> {
        let id = LabelInfo::color_to_id(color);
        self.find_id(id).ok_or(LayoutError::UnknownLabel(id))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelInfo> {
        self.labels.iter()
    }

    pub fn labels(&self) -> &[LabelInfo] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_string_round_trip() {
        let label: LabelInfo = "3, separator, sep, line".parse().unwrap();
        assert_eq!(label.id, 3);
        assert_eq!(label.name, "separator");
        assert_eq!(label.aliases, vec![SmolStr::new("sep"), SmolStr::new("line")]);
        assert_eq!(label.to_string(), "3, separator, sep, line");
        assert_eq!(label.kind(), LabelKind::Separator);
        assert!("x, text".parse::<LabelInfo>().is_err());
        assert!("2".parse::<LabelInfo>().is_err());
    }

    #[test]
    fn test_color_packing() {
        let label = LabelInfo::text();
        assert_eq!(label.color(), 0x200);
        assert_eq!(LabelInfo::color_to_id(label.color()), 2);
        let manager = LabelManager::default_vocabulary();
        assert_eq!(manager.from_color(0x200).unwrap().name, "text");
        assert!(matches!(manager.from_color(0x900), Err(LayoutError::UnknownLabel(9))));
    }

    #[test]
    fn test_manager_rejects_conflicting_ids() {
        let mut manager = LabelManager::default_vocabulary();
        assert!(manager.add(LabelInfo::text()).is_ok());
        assert_eq!(manager.len(), 4);
        assert!(manager.add(LabelInfo::new(2, "image")).is_err());
        manager.add(LabelInfo::new(7, "image").with_alias("figure")).unwrap();
        assert_eq!(manager.find("Figure").map(|l| l.id), Some(7));
        assert_eq!(manager.index_of(7), Some(4));
    }
}
