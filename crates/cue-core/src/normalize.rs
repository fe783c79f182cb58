//! Declarative mapping between the controller's numeric conventions and the
//! host's internal ones.
//!
//! Rules are matched by exact method name plus a glob over the module path
//! (`*`, `*.volume`, `game.audio*`). The first matching rule wins; anything
//! unmatched passes through untouched.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::warn;

/// Which way a rule converts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Controller → host (argument rewriting).
    Inbound,
    /// Host → controller (result rewriting).
    Outbound,
}

/// One entry of the normalization table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationRule {
    pub direction: Direction,
    /// Exact method names this rule applies to.
    pub methods: Vec<String>,
    /// Glob over the canonical (dot-notation) module path.
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub external_min: f64,
    #[serde(default = "default_external_max")]
    pub external_max: f64,
    #[serde(default = "default_internal_max")]
    pub internal_max: f64,
}

fn default_path() -> String {
    "*".to_string()
}

fn default_external_max() -> f64 {
    100.0
}

fn default_internal_max() -> f64 {
    1.0
}

impl NormalizationRule {
    pub fn inbound(methods: &[&str], path: &str, internal_max: f64) -> Self {
        Self::percent(Direction::Inbound, methods, path, internal_max)
    }

    pub fn outbound(methods: &[&str], path: &str, internal_max: f64) -> Self {
        Self::percent(Direction::Outbound, methods, path, internal_max)
    }

    fn percent(direction: Direction, methods: &[&str], path: &str, internal_max: f64) -> Self {
        Self {
            direction,
            methods: methods.iter().map(|m| (*m).to_string()).collect(),
            path: path.to_string(),
            external_min: 0.0,
            external_max: default_external_max(),
            internal_max,
        }
    }

    /// Check that the rule describes a usable mapping.
    pub fn validate(&self) -> Result<(), String> {
        if self.methods.is_empty() {
            return Err("rule has no methods".into());
        }
        if self.external_min.is_nan()
            || self.external_max.is_nan()
            || self.external_max <= self.external_min
        {
            return Err(format!(
                "empty external range {}..{}",
                self.external_min, self.external_max
            ));
        }
        if !self.internal_max.is_finite() || self.internal_max <= 0.0 {
            return Err(format!("internal ceiling must be positive, got {}", self.internal_max));
        }
        if let Err(e) = Pattern::new(&self.path) {
            return Err(format!("invalid path pattern {:?}: {e}", self.path));
        }
        Ok(())
    }

    /// External value → internal value. Out-of-range input is clamped first.
    pub fn to_internal(&self, external: f64) -> f64 {
        let span = self.external_max - self.external_min;
        let clamped = external.clamp(self.external_min, self.external_max);
        (clamped - self.external_min) / span * self.internal_max
    }

    /// Internal value → rounded external value; non-finite input maps to 0.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_external(&self, internal: f64) -> i64 {
        if !internal.is_finite() || self.internal_max <= 0.0 {
            return 0;
        }
        let span = self.external_max - self.external_min;
        let external = (internal / self.internal_max * span + self.external_min).round();
        if external.is_finite() {
            external as i64
        } else {
            0
        }
    }
}

struct CompiledRule {
    rule: NormalizationRule,
    pattern: Pattern,
}

impl CompiledRule {
    fn matches(&self, direction: Direction, method: &str, path: &str) -> bool {
        if self.rule.direction != direction || !self.rule.methods.iter().any(|m| m == method) {
            return false;
        }
        self.pattern.matches(path)
    }
}

/// Ordered rule table.
pub struct Normalizer {
    rules: Vec<CompiledRule>,
}

impl Normalizer {
    /// Compile `rules` in order. Rules that fail [`NormalizationRule::validate`]
    /// are logged and left out.
    pub fn new(rules: Vec<NormalizationRule>) -> Self {
        let rules = rules
            .into_iter()
            .enumerate()
            .filter_map(|(i, rule)| {
                if let Err(reason) = rule.validate() {
                    warn!(rule = i, path = %rule.path, reason = %reason, "skipping normalization rule");
                    return None;
                }
                let pattern = Pattern::new(&rule.path).ok()?;
                Some(CompiledRule { rule, pattern })
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The stock table: boosted master volume (ceiling 1.25) for setters and the
    /// master-volume query, plain 0..1 for `readVariable` on `*.volume` paths.
    pub fn default_rules() -> Vec<NormalizationRule> {
        vec![
            NormalizationRule::inbound(&["setVolume", "setMasterVolume"], "*", 1.25),
            NormalizationRule::outbound(&["getMasterVolumeValue"], "*", 1.25),
            NormalizationRule::outbound(&["readVariable"], "*.volume", 1.0),
        ]
    }

    /// First rule for `(direction, method, path)`.
    pub fn find(&self, direction: Direction, method: &str, path: &str) -> Option<&NormalizationRule> {
        self.rules
            .iter()
            .find(|c| c.matches(direction, method, path))
            .map(|c| &c.rule)
    }

    /// Rewrite the first numeric argument in place. Returns whether a rule applied.
    pub fn normalize_args(&self, method: &str, path: &str, args: &mut [Value]) -> bool {
        let Some(rule) = self.find(Direction::Inbound, method, path) else {
            return false;
        };
        let Some(slot) = args.iter_mut().find(|a| a.is_number()) else {
            return false;
        };
        let Some(external) = slot.as_f64() else {
            return false;
        };
        match Number::from_f64(rule.to_internal(external)) {
            Some(n) => {
                *slot = Value::Number(n);
                true
            }
            None => false,
        }
    }

    /// Rewrite a result value. Non-numeric results under a matching rule count
    /// as non-finite and become 0.
    pub fn normalize_result(&self, method: &str, path: &str, value: Value) -> Value {
        match self.find(Direction::Outbound, method, path) {
            Some(rule) => {
                let raw = value.as_f64().unwrap_or(f64::NAN);
                Value::from(rule.to_external(raw))
            }
            None => value,
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Self::default_rules())
    }
}
