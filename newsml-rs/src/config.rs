//! Codec configuration.
//!
//! Settings are passed explicitly to the importer, exporter and snapshot
//! builder through [`CodecConfig`]. Host applications that keep settings per
//! plugin implement [`ConfigAccessor`]; [`PluginConfig`] is a JSON-backed
//! implementation.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{CODEC_PLUGIN, DEFAULT_LANGUAGE, TEASER_PLUGIN, TEASER_POSITION_KEY};
use crate::error::Result;
use crate::schema::TextStyle;
use crate::template::DEFAULT_TEMPLATE;

/// Read access to per-plugin configuration values.
pub trait ConfigAccessor {
    /// Returns the value of `key` for `plugin_id`, or `default` when unset.
    fn get_config_value(&self, plugin_id: &str, key: &str, default: Value) -> Value;
}

/// Configuration of the form `{"plugins": {"<plugin id>": {"<key>": <value>}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    plugins: FxHashMap<String, Map<String, Value>>,
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Sets a value, replacing any previous one.
    pub fn set(&mut self, plugin_id: &str, key: &str, value: Value) {
        self.plugins
            .entry(plugin_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, plugin_id: &str, key: &str, value: Value) -> Self {
        self.set(plugin_id, key, value);
        self
    }
}

impl ConfigAccessor for PluginConfig {
    fn get_config_value(&self, plugin_id: &str, key: &str, default: Value) -> Value {
        self.plugins
            .get(plugin_id)
            .and_then(|values| values.get(key))
            .cloned()
            .unwrap_or(default)
    }
}

/// Where the teaser object is placed in the body on import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeaserPosition {
    Top,
    #[default]
    Bottom,
}

impl TeaserPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            TeaserPosition::Top => "top",
            TeaserPosition::Bottom => "bottom",
        }
    }
}

impl FromStr for TeaserPosition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "top" => Ok(TeaserPosition::Top),
            "bottom" => Ok(TeaserPosition::Bottom),
            other => Err(format!("unknown teaser position '{}'", other)),
        }
    }
}

impl fmt::Display for TeaserPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by the importer, exporter and snapshot builder.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecConfig {
    pub teaser_position: TeaserPosition,
    /// Header fields in the order they are written back.
    pub header_fields: Vec<TextStyle>,
    /// Language assumed when the item has no `xml:lang`.
    pub default_language: String,
    /// Base document used when no XML is given.
    pub template: String,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            teaser_position: TeaserPosition::default(),
            header_fields: vec![TextStyle::Headline, TextStyle::Preamble],
            default_language: DEFAULT_LANGUAGE.to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl CodecConfig {
    /// Resolves settings through a host accessor, falling back to defaults.
    ///
    /// The teaser position is read from the teaser plugin; header fields,
    /// default language and template from the codec's own plugin entry.
    pub fn from_accessor(accessor: &dyn ConfigAccessor) -> Self {
        let defaults = CodecConfig::default();

        let position = accessor.get_config_value(
            TEASER_PLUGIN,
            TEASER_POSITION_KEY,
            Value::from(defaults.teaser_position.as_str()),
        );
        let teaser_position = match position.as_str().map(str::parse::<TeaserPosition>) {
            Some(Ok(position)) => position,
            _ => {
                tracing::warn!(value = %position, "ignoring invalid teaser position");
                defaults.teaser_position
            }
        };

        let header_fields = match accessor.get_config_value(CODEC_PLUGIN, "headerFields", Value::Null) {
            Value::Array(names) => names
                .iter()
                .filter_map(|name| {
                    let style = name.as_str().and_then(TextStyle::parse);
                    if style.is_none() {
                        tracing::warn!(field = %name, "ignoring unknown header field");
                    }
                    style
                })
                .collect(),
            _ => defaults.header_fields,
        };

        let default_language = accessor
            .get_config_value(CODEC_PLUGIN, "language", Value::Null)
            .as_str()
            .map(str::to_string)
            .unwrap_or(defaults.default_language);

        let template = accessor
            .get_config_value(CODEC_PLUGIN, "template", Value::Null)
            .as_str()
            .map(str::to_string)
            .unwrap_or(defaults.template);

        CodecConfig {
            teaser_position,
            header_fields,
            default_language,
            template,
        }
    }

    pub fn with_teaser_position(mut self, position: TeaserPosition) -> Self {
        self.teaser_position = position;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Returns true if `style` is a declared header field.
    pub fn is_header_field(&self, style: TextStyle) -> bool {
        self.header_fields.contains(&style)
    }
}
