//! Configuration management for the virtual touchpad
//!
//! Handles the runtime engine settings (with clamping), the attribute-string
//! surface, and loading/saving/hot-reloading of the configuration file.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

use crate::engine::follow::{Bounds, Radii};
use crate::engine::Point;

pub use watcher::ConfigWatcher;

/// Minimum for both circle radii
pub const MIN_RADIUS: f64 = 1.0;
/// Minimum click and double-click window
pub const MIN_WINDOW_MS: u64 = 100;

/// Configuration errors surfaced to the embedding widget
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown touchpad attribute '{0}'")]
    UnknownAttribute(String),
}

/// Root configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TouchpadConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub surface: CoordinateSpace,
    #[serde(default)]
    pub touch: TouchConfig,
}

/// Touch-to-pointer translation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TouchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Added to touch identifiers so they never collide with the mouse pointer id
    #[serde(default = "default_touch_id_base")]
    pub id_base: i64,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            id_base: default_touch_id_base(),
        }
    }
}

/// How raw sample positions relate to the surface
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CoordinateSpace {
    /// Samples are viewport coordinates; the surface's top-left corner is subtracted.
    /// The control circle is not clamped to the surface.
    Viewport {
        #[serde(default)]
        left: f64,
        #[serde(default)]
        top: f64,
    },
    /// Samples are already surface-local; the control circle is clamped to the surface box.
    Local { width: f64, height: f64 },
}

impl Default for CoordinateSpace {
    fn default() -> Self {
        CoordinateSpace::Viewport { left: 0.0, top: 0.0 }
    }
}

impl CoordinateSpace {
    /// Convert a raw sample position to surface-local coordinates
    pub fn to_local(&self, x: f64, y: f64) -> Point {
        match *self {
            CoordinateSpace::Viewport { left, top } => Point::new(x - left, y - top),
            CoordinateSpace::Local { .. } => Point::new(x, y),
        }
    }

    /// Replace unusable geometry: non-finite origins and non-finite or
    /// negative surface sizes become 0.
    pub fn sanitized(self) -> Self {
        match self {
            CoordinateSpace::Viewport { left, top } => CoordinateSpace::Viewport {
                left: finite_or_zero("surface.left", left),
                top: finite_or_zero("surface.top", top),
            },
            CoordinateSpace::Local { width, height } => CoordinateSpace::Local {
                width: size_or_zero("surface.width", width),
                height: size_or_zero("surface.height", height),
            },
        }
    }

    /// Box the control center is clamped to, if any
    pub fn bounds(&self) -> Option<Bounds> {
        match *self {
            CoordinateSpace::Viewport { .. } => None,
            CoordinateSpace::Local { width, height } => Some(Bounds { width, height }),
        }
    }
}

/// Serialized form of [`EngineConfig`]; every value is clamped on conversion
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    #[serde(default = "default_deadzone_radius")]
    pub deadzone_radius: f64,
    #[serde(default = "default_control_radius")]
    pub control_radius: f64,
    #[serde(default = "default_window_ms")]
    pub click_time_ms: u64,
    #[serde(default = "default_window_ms")]
    pub double_click_time_ms: u64,
    #[serde(default = "default_click_distance")]
    pub click_distance: f64,
    #[serde(default)]
    pub max_concurrent_contacts: usize,
}

/// Engine parameters, validated on every write
///
/// Invalid values are clamped to the nearest valid bound rather than rejected.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "EngineSettings", into = "EngineSettings")]
pub struct EngineConfig {
    deadzone_radius: f64,
    control_radius: f64,
    click_time_ms: u64,
    double_click_time_ms: u64,
    click_distance: f64,
    max_concurrent_contacts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deadzone_radius: default_deadzone_radius(),
            control_radius: default_control_radius(),
            click_time_ms: default_window_ms(),
            double_click_time_ms: default_window_ms(),
            click_distance: default_click_distance(),
            max_concurrent_contacts: 0,
        }
    }
}

impl From<EngineSettings> for EngineConfig {
    fn from(settings: EngineSettings) -> Self {
        let mut config = EngineConfig::default();
        config.set_deadzone_radius(settings.deadzone_radius);
        config.set_control_radius(settings.control_radius);
        config.set_click_time_ms(settings.click_time_ms);
        config.set_double_click_time_ms(settings.double_click_time_ms);
        config.set_click_distance(settings.click_distance);
        config.set_max_concurrent_contacts(settings.max_concurrent_contacts);
        config
    }
}

impl From<EngineConfig> for EngineSettings {
    fn from(config: EngineConfig) -> Self {
        Self {
            deadzone_radius: config.deadzone_radius,
            control_radius: config.control_radius,
            click_time_ms: config.click_time_ms,
            double_click_time_ms: config.double_click_time_ms,
            click_distance: config.click_distance,
            max_concurrent_contacts: config.max_concurrent_contacts,
        }
    }
}

impl EngineConfig {
    pub fn deadzone_radius(&self) -> f64 {
        self.deadzone_radius
    }

    pub fn control_radius(&self) -> f64 {
        self.control_radius
    }

    pub fn radii(&self) -> Radii {
        Radii {
            control: self.control_radius,
            deadzone: self.deadzone_radius,
        }
    }

    pub fn click_time_ms(&self) -> u64 {
        self.click_time_ms
    }

    pub fn double_click_time_ms(&self) -> u64 {
        self.double_click_time_ms
    }

    pub fn click_distance(&self) -> f64 {
        self.click_distance
    }

    pub fn max_concurrent_contacts(&self) -> usize {
        self.max_concurrent_contacts
    }

    pub fn set_deadzone_radius(&mut self, radius: f64) {
        self.deadzone_radius = clamp_min_f64("deadzone_radius", radius, MIN_RADIUS);
    }

    pub fn set_control_radius(&mut self, radius: f64) {
        self.control_radius = clamp_min_f64("control_radius", radius, MIN_RADIUS);
    }

    pub fn set_click_time_ms(&mut self, time_ms: u64) {
        self.click_time_ms = clamp_min_u64("click_time_ms", time_ms, MIN_WINDOW_MS);
    }

    pub fn set_double_click_time_ms(&mut self, time_ms: u64) {
        self.double_click_time_ms = clamp_min_u64("double_click_time_ms", time_ms, MIN_WINDOW_MS);
    }

    pub fn set_click_distance(&mut self, distance: f64) {
        self.click_distance = clamp_min_f64("click_distance", distance, 0.0);
    }

    /// 0 disables analog tracking
    pub fn set_max_concurrent_contacts(&mut self, max: usize) {
        self.max_concurrent_contacts = max;
    }

    /// Apply a reflected attribute value, parsed the way the widget attributes are:
    /// numeric text rounded to an integer, empty text as 0, anything unparsable
    /// clamped to the attribute's minimum.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let number = parse_attribute_number(value);

        match name.to_ascii_lowercase().as_str() {
            "deadzoneradius" => self.set_deadzone_radius(number),
            "controlradius" => self.set_control_radius(number),
            "clicktime" => self.set_click_time_ms(to_u64(number)),
            "doubleclicktime" => self.set_double_click_time_ms(to_u64(number)),
            "clickdistance" => self.set_click_distance(number),
            "analogmax" => self.set_max_concurrent_contacts(to_u64(number) as usize),
            _ => return Err(ConfigError::UnknownAttribute(name.to_string())),
        }

        Ok(())
    }
}

impl TouchpadConfig {
    /// Load configuration from a YAML or JSON file (chosen by extension) with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&contents, path)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file, in the format implied by the extension
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = if is_json(path) {
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?
        } else {
            serde_yaml::to_string(self).context("Failed to serialize config to YAML")?
        };

        fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Settings that differ in `newer`, as `name: old -> new` lines
    pub fn changed_settings(&self, newer: &TouchpadConfig) -> Vec<String> {
        let mut changes = Vec::new();
        let mut note = |name: &str, old: String, new: String| {
            if old != new {
                changes.push(format!("{}: {} -> {}", name, old, new));
            }
        };

        let (old, new) = (&self.engine, &newer.engine);
        note("engine.deadzone_radius", old.deadzone_radius.to_string(), new.deadzone_radius.to_string());
        note("engine.control_radius", old.control_radius.to_string(), new.control_radius.to_string());
        note("engine.click_time_ms", old.click_time_ms.to_string(), new.click_time_ms.to_string());
        note(
            "engine.double_click_time_ms",
            old.double_click_time_ms.to_string(),
            new.double_click_time_ms.to_string(),
        );
        note("engine.click_distance", old.click_distance.to_string(), new.click_distance.to_string());
        note(
            "engine.max_concurrent_contacts",
            old.max_concurrent_contacts.to_string(),
            new.max_concurrent_contacts.to_string(),
        );
        note("surface", format!("{:?}", self.surface), format!("{:?}", newer.surface));
        note("touch.enabled", self.touch.enabled.to_string(), newer.touch.enabled.to_string());
        note("touch.id_base", self.touch.id_base.to_string(), newer.touch.id_base.to_string());

        changes
    }

    fn parse(contents: &str, path: &Path) -> Result<Self> {
        if is_json(path) {
            serde_json::from_str(contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            serde_yaml::from_str(contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
        }
    }

    /// Validate configuration for correctness
    ///
    /// Engine values are already clamped; only the surface geometry can be invalid.
    pub fn validate(&self) -> Result<()> {
        match self.surface {
            CoordinateSpace::Local { width, height } => {
                if !(width.is_finite() && width > 0.0) {
                    anyhow::bail!("Surface width must be positive, got {}", width);
                }
                if !(height.is_finite() && height > 0.0) {
                    anyhow::bail!("Surface height must be positive, got {}", height);
                }
            }
            CoordinateSpace::Viewport { left, top } => {
                if !left.is_finite() || !top.is_finite() {
                    anyhow::bail!("Surface origin must be finite, got ({}, {})", left, top);
                }
            }
        }

        Ok(())
    }
}

pub(crate) fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Parse and round to the nearest integer; NaN for unparsable text, 0 for empty text
fn parse_attribute_number(value: &str) -> f64 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse::<f64>().map(f64::round).unwrap_or(f64::NAN)
}

/// NaN and negatives map to 0
fn to_u64(number: f64) -> u64 {
    if number.is_nan() || number <= 0.0 {
        0
    } else {
        number as u64
    }
}

fn clamp_min_f64(name: &str, value: f64, min: f64) -> f64 {
    if value.is_nan() || value < min {
        warn!("{} = {} is below the minimum, clamping to {}", name, value, min);
        min
    } else if value.is_infinite() {
        warn!("{} = {} is not finite, clamping to {}", name, value, f64::MAX);
        f64::MAX
    } else {
        value
    }
}

fn finite_or_zero(name: &str, value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!("{} = {} is not finite, using 0", name, value);
        0.0
    }
}

fn size_or_zero(name: &str, value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        warn!("{} = {} is not a usable size, using 0", name, value);
        0.0
    }
}

fn clamp_min_u64(name: &str, value: u64, min: u64) -> u64 {
    if value < min {
        warn!("{} = {} is below the minimum, clamping to {}", name, value, min);
        min
    } else {
        value
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_touch_id_base() -> i64 { 2 }
fn default_deadzone_radius() -> f64 { 8.0 }
fn default_control_radius() -> f64 { 64.0 }
fn default_window_ms() -> u64 { 500 }
fn default_click_distance() -> f64 { 8.0 }
