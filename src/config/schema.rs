//! Per-profile frame-generation options
//!
//! The option set is closed: every key is a [`ConfigField`] with a fixed
//! [`ValueKind`], so a profile's [`ConfigurationData`] is a plain struct rather
//! than a dynamic map. [`ConfigValue`] is the tagged value used when a single
//! option is read or edited by key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Frame presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentMode {
    /// Vsync (default)
    #[default]
    Fifo,
    Mailbox,
}

impl PresentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresentMode::Fifo => "fifo",
            PresentMode::Mailbox => "mailbox",
        }
    }
}

/// Complete option snapshot for one profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationData {
    /// Frame generation multiplier (1 = off)
    pub multiplier: u8,
    /// Internal motion estimation resolution scale
    pub flow_scale: f64,
    /// Lighter frame generation model
    pub performance_mode: bool,
    pub hdr_mode: bool,
    pub experimental_present_mode: PresentMode,
    /// Base frame rate cap for DXVK titles (0 = off)
    pub dxvk_frame_rate: u8,
    /// Gamescope WSI layer
    pub enable_wsi: bool,
    /// PROTON_USE_WOW64=1 for 32-bit titles
    pub enable_wow64: bool,
    pub disable_steamdeck_mode: bool,
    /// Transparent MangoHud overlay
    pub mangohud_workaround: bool,
    pub disable_vkbasalt: bool,
    pub force_enable_vkbasalt: bool,
    pub no_fp16: bool,
}

impl Default for ConfigurationData {
    fn default() -> Self {
        Self {
            multiplier: 1,
            flow_scale: 0.8,
            performance_mode: true,
            hdr_mode: false,
            experimental_present_mode: PresentMode::Fifo,
            dxvk_frame_rate: 0,
            enable_wsi: false,
            enable_wow64: false,
            disable_steamdeck_mode: false,
            mangohud_workaround: false,
            disable_vkbasalt: false,
            force_enable_vkbasalt: false,
            no_fp16: false,
        }
    }
}

/// Primitive kind of an option value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Number,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::Text => "string",
        })
    }
}

/// A single option value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::Number(_) => ValueKind::Number,
            ConfigValue::Text(_) => ValueKind::Text,
        }
    }

    /// Parse user input according to the kind the field expects
    pub fn parse_for(field: ConfigField, raw: &str) -> Result<Self, SchemaError> {
        let raw = raw.trim();
        match field.kind() {
            ValueKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => Ok(ConfigValue::Bool(true)),
                "false" | "off" | "no" | "0" => Ok(ConfigValue::Bool(false)),
                _ => Err(SchemaError::Unparsable {
                    key: field.key(),
                    expected: ValueKind::Bool,
                    raw: raw.to_string(),
                }),
            },
            ValueKind::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(ConfigValue::Number)
                .ok_or_else(|| SchemaError::Unparsable {
                    key: field.key(),
                    expected: ValueKind::Number,
                    raw: raw.to_string(),
                }),
            ValueKind::Text => Ok(ConfigValue::Text(raw.to_string())),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Number(n) => write!(f, "{n}"),
            ConfigValue::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("unknown option '{0}'")]
    UnknownKey(String),
    #[error("option '{key}' expects a {expected}, got a {found}")]
    TypeMismatch {
        key: &'static str,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("option '{key}' expects a {expected}, got '{raw}'")]
    Unparsable {
        key: &'static str,
        expected: ValueKind,
        raw: String,
    },
    #[error("option '{key}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("option '{key}' must be a whole number, got {value}")]
    NotInteger { key: &'static str, value: f64 },
    #[error("option '{key}' must be one of {allowed:?}, got '{value}'")]
    InvalidChoice {
        key: &'static str,
        allowed: &'static [&'static str],
        value: String,
    },
    #[error("option '{key}' requires '{requires}' to be enabled")]
    Dependency {
        key: &'static str,
        requires: &'static str,
    },
}

/// Every option a profile carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    Multiplier,
    FlowScale,
    PerformanceMode,
    HdrMode,
    ExperimentalPresentMode,
    DxvkFrameRate,
    EnableWsi,
    EnableWow64,
    DisableSteamdeckMode,
    MangohudWorkaround,
    DisableVkbasalt,
    ForceEnableVkbasalt,
    NoFp16,
}

const PRESENT_MODES: &[&str] = &["fifo", "mailbox"];

impl ConfigField {
    pub const ALL: [ConfigField; 13] = [
        ConfigField::Multiplier,
        ConfigField::FlowScale,
        ConfigField::PerformanceMode,
        ConfigField::HdrMode,
        ConfigField::ExperimentalPresentMode,
        ConfigField::DxvkFrameRate,
        ConfigField::EnableWsi,
        ConfigField::EnableWow64,
        ConfigField::DisableSteamdeckMode,
        ConfigField::MangohudWorkaround,
        ConfigField::DisableVkbasalt,
        ConfigField::ForceEnableVkbasalt,
        ConfigField::NoFp16,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ConfigField::Multiplier => "multiplier",
            ConfigField::FlowScale => "flow_scale",
            ConfigField::PerformanceMode => "performance_mode",
            ConfigField::HdrMode => "hdr_mode",
            ConfigField::ExperimentalPresentMode => "experimental_present_mode",
            ConfigField::DxvkFrameRate => "dxvk_frame_rate",
            ConfigField::EnableWsi => "enable_wsi",
            ConfigField::EnableWow64 => "enable_wow64",
            ConfigField::DisableSteamdeckMode => "disable_steamdeck_mode",
            ConfigField::MangohudWorkaround => "mangohud_workaround",
            ConfigField::DisableVkbasalt => "disable_vkbasalt",
            ConfigField::ForceEnableVkbasalt => "force_enable_vkbasalt",
            ConfigField::NoFp16 => "no_fp16",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigField::Multiplier | ConfigField::FlowScale | ConfigField::DxvkFrameRate => {
                ValueKind::Number
            }
            ConfigField::ExperimentalPresentMode => ValueKind::Text,
            _ => ValueKind::Bool,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConfigField::Multiplier => "Frame generation multiplier (1 = off, up to 4)",
            ConfigField::FlowScale => "Motion estimation resolution scale (0.25 - 1.0)",
            ConfigField::PerformanceMode => "Use the lighter frame generation model",
            ConfigField::HdrMode => "HDR output (requires enable_wsi)",
            ConfigField::ExperimentalPresentMode => "Present mode: fifo (vsync) or mailbox",
            ConfigField::DxvkFrameRate => "Base frame rate cap for DXVK titles (0 = off, max 60)",
            ConfigField::EnableWsi => "Re-enable the Gamescope WSI layer",
            ConfigField::EnableWow64 => "Set PROTON_USE_WOW64=1 for 32-bit titles",
            ConfigField::DisableSteamdeckMode => "Disable Steam Deck mode",
            ConfigField::MangohudWorkaround => "Transparent MangoHud overlay workaround",
            ConfigField::DisableVkbasalt => "Disable the vkBasalt layer",
            ConfigField::ForceEnableVkbasalt => "Force-enable the vkBasalt layer",
            ConfigField::NoFp16 => "Force-disable FP16 acceleration",
        }
    }

    /// Inclusive numeric bounds and whether the value must be whole
    fn numeric_bounds(&self) -> Option<(f64, f64, bool)> {
        match self {
            ConfigField::Multiplier => Some((1.0, 4.0, true)),
            ConfigField::FlowScale => Some((0.25, 1.0, false)),
            ConfigField::DxvkFrameRate => Some((0.0, 60.0, true)),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for ConfigField {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl FromStr for ConfigField {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        ConfigField::ALL
            .into_iter()
            .find(|field| field.key() == key)
            .ok_or_else(|| SchemaError::UnknownKey(key.to_string()))
    }
}

impl ConfigurationData {
    pub fn get(&self, field: ConfigField) -> ConfigValue {
        match field {
            ConfigField::Multiplier => ConfigValue::Number(f64::from(self.multiplier)),
            ConfigField::FlowScale => ConfigValue::Number(self.flow_scale),
            ConfigField::PerformanceMode => ConfigValue::Bool(self.performance_mode),
            ConfigField::HdrMode => ConfigValue::Bool(self.hdr_mode),
            ConfigField::ExperimentalPresentMode => {
                ConfigValue::Text(self.experimental_present_mode.as_str().to_string())
            }
            ConfigField::DxvkFrameRate => ConfigValue::Number(f64::from(self.dxvk_frame_rate)),
            ConfigField::EnableWsi => ConfigValue::Bool(self.enable_wsi),
            ConfigField::EnableWow64 => ConfigValue::Bool(self.enable_wow64),
            ConfigField::DisableSteamdeckMode => ConfigValue::Bool(self.disable_steamdeck_mode),
            ConfigField::MangohudWorkaround => ConfigValue::Bool(self.mangohud_workaround),
            ConfigField::DisableVkbasalt => ConfigValue::Bool(self.disable_vkbasalt),
            ConfigField::ForceEnableVkbasalt => ConfigValue::Bool(self.force_enable_vkbasalt),
            ConfigField::NoFp16 => ConfigValue::Bool(self.no_fp16),
        }
    }

    /// All options in schema order
    pub fn entries(&self) -> Vec<(ConfigField, ConfigValue)> {
        ConfigField::ALL
            .into_iter()
            .map(|field| (field, self.get(field)))
            .collect()
    }

    /// Set one option after type and range checks; no coupled-option rules
    pub fn set(&mut self, field: ConfigField, value: ConfigValue) -> Result<(), SchemaError> {
        if value.kind() != field.kind() {
            return Err(SchemaError::TypeMismatch {
                key: field.key(),
                expected: field.kind(),
                found: value.kind(),
            });
        }

        match value {
            ConfigValue::Bool(b) => {
                let slot = match field {
                    ConfigField::PerformanceMode => &mut self.performance_mode,
                    ConfigField::HdrMode => &mut self.hdr_mode,
                    ConfigField::EnableWsi => &mut self.enable_wsi,
                    ConfigField::EnableWow64 => &mut self.enable_wow64,
                    ConfigField::DisableSteamdeckMode => &mut self.disable_steamdeck_mode,
                    ConfigField::MangohudWorkaround => &mut self.mangohud_workaround,
                    ConfigField::DisableVkbasalt => &mut self.disable_vkbasalt,
                    ConfigField::ForceEnableVkbasalt => &mut self.force_enable_vkbasalt,
                    ConfigField::NoFp16 => &mut self.no_fp16,
                    // kind check above rules out the remaining fields
                    _ => return Ok(()),
                };
                *slot = b;
            }
            ConfigValue::Number(n) => {
                if let Some((min, max, whole)) = field.numeric_bounds() {
                    if !(min..=max).contains(&n) {
                        return Err(SchemaError::OutOfRange {
                            key: field.key(),
                            min,
                            max,
                            value: n,
                        });
                    }
                    if whole && n.fract() != 0.0 {
                        return Err(SchemaError::NotInteger {
                            key: field.key(),
                            value: n,
                        });
                    }
                }
                match field {
                    ConfigField::Multiplier => self.multiplier = n as u8,
                    ConfigField::FlowScale => self.flow_scale = n,
                    ConfigField::DxvkFrameRate => self.dxvk_frame_rate = n as u8,
                    _ => {}
                }
            }
            ConfigValue::Text(s) => {
                if field == ConfigField::ExperimentalPresentMode {
                    self.experimental_present_mode = match s.to_ascii_lowercase().as_str() {
                        "fifo" => PresentMode::Fifo,
                        "mailbox" => PresentMode::Mailbox,
                        _ => {
                            return Err(SchemaError::InvalidChoice {
                                key: field.key(),
                                allowed: PRESENT_MODES,
                                value: s,
                            });
                        }
                    };
                }
            }
        }
        Ok(())
    }

    /// Set one option and enforce the rules that couple options together.
    ///
    /// Returns every field whose value actually changed, the edited one first.
    pub fn apply_change(
        &mut self,
        field: ConfigField,
        value: ConfigValue,
    ) -> Result<Vec<ConfigField>, SchemaError> {
        if field == ConfigField::HdrMode && value == ConfigValue::Bool(true) && !self.enable_wsi {
            return Err(SchemaError::Dependency {
                key: ConfigField::HdrMode.key(),
                requires: ConfigField::EnableWsi.key(),
            });
        }

        let before = self.get(field);
        self.set(field, value.clone())?;
        let mut changed = Vec::new();
        if self.get(field) != before {
            changed.push(field);
        }

        match (field, value) {
            (ConfigField::EnableWsi, ConfigValue::Bool(false)) if self.hdr_mode => {
                self.hdr_mode = false;
                changed.push(ConfigField::HdrMode);
            }
            (ConfigField::DisableVkbasalt, ConfigValue::Bool(true)) if self.force_enable_vkbasalt => {
                self.force_enable_vkbasalt = false;
                changed.push(ConfigField::ForceEnableVkbasalt);
            }
            (ConfigField::ForceEnableVkbasalt, ConfigValue::Bool(true)) if self.disable_vkbasalt => {
                self.disable_vkbasalt = false;
                changed.push(ConfigField::DisableVkbasalt);
            }
            _ => {}
        }

        Ok(changed)
    }
}
