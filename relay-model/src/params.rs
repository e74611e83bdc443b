//! Generation parameters: per-parameter specs (range, step, precision, help
//! text) and the per-user value map persisted alongside user settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration of one tunable generation parameter.
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Decimal places kept on display and persistence; 0 means integer.
    pub precision: u32,
    pub description: &'static str,
    pub detail: &'static str,
}

pub const PARAMETERS: &[ParamSpec] = &[
    ParamSpec {
        name: "temperature",
        min: 0.0,
        max: 2.0,
        step: 0.1,
        precision: 1,
        description: "Controls response randomness",
        detail: "🌡️ Temperature affects how creative or focused the response is:\n\n\
                 • Low (0.1-0.3): More focused, consistent responses\n\
                 • Medium (0.4-0.7): Balanced creativity and focus\n\
                 • High (0.8+): More creative, varied responses\n\n\
                 Recommended:\n\
                 • Code/Technical: 0.2-0.3\n\
                 • General Chat: 0.6-0.7\n\
                 • Creative Tasks: 0.8-1.0",
    },
    ParamSpec {
        name: "top_p",
        min: 0.0,
        max: 1.0,
        step: 0.05,
        precision: 2,
        description: "Controls response diversity",
        detail: "🎯 Top_p (nucleus sampling) affects word choice variety:\n\n\
                 • Low (0.1-0.3): Uses only most likely words\n\
                 • Medium (0.4-0.7): Balanced variety\n\
                 • High (0.8+): More diverse vocabulary\n\n\
                 Recommended:\n\
                 • Technical: 0.1-0.3\n\
                 • General: 0.7\n\
                 • Creative: 0.9-1.0",
    },
    ParamSpec {
        name: "top_k",
        min: 1.0,
        max: 100.0,
        step: 1.0,
        precision: 0,
        description: "Controls vocabulary range",
        detail: "🔝 Top_k limits the number of words to choose from:\n\n\
                 • Low (1-20): Very focused vocabulary\n\
                 • Medium (20-50): Normal range\n\
                 • High (50+): Broader word selection\n\n\
                 Recommended:\n\
                 • Technical: 10-20\n\
                 • General: 40\n\
                 • Creative: 50+",
    },
    ParamSpec {
        name: "max_tokens",
        min: 64.0,
        max: 8192.0,
        step: 64.0,
        precision: 0,
        description: "Maximum response length",
        detail: "📝 Max_tokens sets the maximum response length:\n\n\
                 • Short (64-512): Quick responses\n\
                 • Medium (512-2048): Normal conversations\n\
                 • Long (2048+): Detailed explanations\n\n\
                 Recommended:\n\
                 • Quick answers: 256\n\
                 • Normal chat: 1024\n\
                 • Detailed: 2048+",
    },
];

/// Looks up the spec for a parameter name.
pub fn param_spec(name: &str) -> Option<&'static ParamSpec> {
    PARAMETERS.iter().find(|p| p.name == name)
}

impl ParamSpec {
    /// Clamps into `[min, max]` and rounds to the configured precision.
    pub fn clamp(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.min, self.max);
        let factor = 10f64.powi(self.precision as i32);
        (clamped * factor).round() / factor
    }

    /// Formats a value at this spec's precision ("0.7", "0.95", "40").
    pub fn format(&self, value: f64) -> String {
        if self.precision == 0 {
            format!("{}", value.round() as i64)
        } else {
            format!("{:.*}", self.precision as usize, value)
        }
    }

    /// "top_p" → "Top P" for menu labels.
    pub fn display_name(&self) -> String {
        self.name
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Per-user generation parameter values, name → numeric value. Persisted as
/// JSON in the store; unknown names are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams(pub BTreeMap<String, f64>);

impl GenerationParams {
    pub fn defaults() -> Self {
        let mut map = BTreeMap::new();
        map.insert("temperature".to_string(), 0.7);
        map.insert("top_p".to_string(), 0.95);
        map.insert("top_k".to_string(), 40.0);
        map.insert("max_tokens".to_string(), 2048.0);
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Sets a value, clamped/rounded when the parameter has a spec.
    pub fn set(&mut self, name: &str, value: f64) {
        let value = match param_spec(name) {
            Some(spec) => spec.clamp(value),
            None => value,
        };
        self.0.insert(name.to_string(), value);
    }

    /// Steps a parameter up (+1) or down (-1) by its configured step, clamped
    /// and rounded. Returns the new value, or `None` for unknown parameters.
    pub fn adjust(&mut self, name: &str, direction: i8) -> Option<f64> {
        let spec = param_spec(name)?;
        let current = self.get(name).unwrap_or(spec.min);
        let new_value = spec.clamp(current + f64::from(direction) * spec.step);
        self.0.insert(name.to_string(), new_value);
        Some(new_value)
    }

    /// Missing parameters filled in from the defaults.
    pub fn merged_over_defaults(mut self) -> Self {
        for (name, value) in Self::defaults().0 {
            self.0.entry(name).or_insert(value);
        }
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parses persisted JSON; malformed input degrades to the defaults.
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str::<BTreeMap<String, f64>>(json)
            .map(Self)
            .unwrap_or_default()
            .merged_over_defaults()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}
