//! Page configuration and the override resolver.
//!
//! A resolved configuration starts from a variant's defaults and folds in
//! override sources in order: a saved file first, request query parameters
//! last. Only keys already present in the defaults can be overridden.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Number, Value};

/// Option name to value, in declaration order.
pub type ConfigMap = Map<String, Value>;

pub const INCH_TO_METER: f64 = 0.0254;

/// Pool ball diameter: 2.25 inches.
pub const BALL_DIAMETER: f64 = 2.25 * INCH_TO_METER;

/// A raw override value that is neither a boolean literal nor a finite number.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("could not convert {raw:?} to a number")]
pub struct CoerceError {
    pub raw: String,
}

/// Convert the string form of an override value.
///
/// `"true"` and `"false"` become booleans, anything that parses as a finite
/// float becomes a number. Everything else is an error carrying the original
/// text, which callers keep as a string.
pub fn coerce(raw: &str) -> Result<Value, CoerceError> {
    match raw {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| CoerceError {
            raw: raw.to_string(),
        })
}

/// Truthiness of a JSON value, as the browser client sees it.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// A provider of override key/value pairs.
#[derive(Debug, Clone)]
pub enum OverrideSource {
    /// Contents of a saved JSON file. String values are coerced,
    /// other JSON values are taken as they are.
    File(ConfigMap),
    /// Request query parameters. The first occurrence of a key wins.
    Query(Vec<(String, String)>),
}

/// An override value that was kept as a string because it could not be coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideWarning {
    pub key: String,
    pub error: CoerceError,
}

impl fmt::Display for OverrideWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.error)
    }
}

/// Result of folding override sources into a profile's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub config: ConfigMap,
    pub warnings: Vec<OverrideWarning>,
}

/// Default option set plus the cross-field rules applied after merging.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigProfile {
    defaults: ConfigMap,
    /// When set, an enabled `useShadowMap` forces `useBasicMaterials` off.
    shadow_map_disables_basic_materials: bool,
}

impl ConfigProfile {
    pub fn new(defaults: ConfigMap) -> Self {
        Self {
            defaults,
            shadow_map_disables_basic_materials: false,
        }
    }

    pub fn with_shadow_map_rule(mut self) -> Self {
        self.shadow_map_disables_basic_materials = true;
        self
    }

    pub fn defaults(&self) -> &ConfigMap {
        &self.defaults
    }

    /// Merge `sources` over the defaults, later sources winning.
    pub fn resolve(&self, sources: &[OverrideSource]) -> Resolution {
        let mut config = self.defaults.clone();
        let mut warnings = Vec::new();

        for source in sources {
            match source {
                OverrideSource::File(values) => {
                    for (key, value) in values {
                        if !self.defaults.contains_key(key) {
                            continue;
                        }
                        let value = match value {
                            Value::String(raw) => coerce_or_keep(key, raw, &mut warnings),
                            other => other.clone(),
                        };
                        config.insert(key.clone(), value);
                    }
                }
                OverrideSource::Query(pairs) => {
                    let mut seen = HashSet::new();
                    for (key, raw) in pairs {
                        if !self.defaults.contains_key(key) || !seen.insert(key.as_str()) {
                            continue;
                        }
                        let value = coerce_or_keep(key, raw, &mut warnings);
                        config.insert(key.clone(), value);
                    }
                }
            }
        }

        if self.shadow_map_disables_basic_materials
            && config.get("useShadowMap").is_some_and(is_truthy)
        {
            config.insert("useBasicMaterials".to_string(), Value::Bool(false));
        }

        Resolution { config, warnings }
    }
}

fn coerce_or_keep(key: &str, raw: &str, warnings: &mut Vec<OverrideWarning>) -> Value {
    coerce(raw).unwrap_or_else(|error| {
        warnings.push(OverrideWarning {
            key: key.to_string(),
            error,
        });
        Value::String(raw.to_string())
    })
}

fn object(value: Value) -> ConfigMap {
    match value {
        Value::Object(map) => map,
        _ => ConfigMap::new(),
    }
}

/// Defaults of the standalone page served at `/`.
pub fn classic_defaults() -> ConfigMap {
    object(json!({
        "gravity": 9.81,
        "useBasicMaterials": true,
        "useShadowMap": false,
        "useSpotLight": true,
        "usePointLight": false,
        "useTextGeomLogger": true,
        "L_table": 2.3368,
        "H_table": 0.77,
        "ball_diameter": BALL_DIAMETER,
        "soundVolume": 0.0,
        "toolOptions": {
            "tipShape": "Cylinder",
            "numSegments": 8,
            "toolRadius": 0.009,
            "tipRadius": 0.009,
            "toolLength": 0.37,
            "tipLength": 0.37,
            "toolMass": 0.54,
            "offset": [0, 0, 0.37 / 2.0],
            "interactionPlaneOpacity": 0.22,
            "useImplicitCylinder": true
        }
    }))
}

/// Defaults of the page served at `/poolvr` with saved configurations.
pub fn pyserver_defaults() -> ConfigMap {
    object(json!({
        "pyserver": true,
        "gravity": 9.8,
        "useWebVRBoilerplate": false,
        "useBasicMaterials": true,
        "useShadowMap": false,
        "pointLight": null,
        "skybox": true,
        "L_table": 2.3368,
        "H_table": 0.74295,
        "ball_diameter": BALL_DIAMETER,
        "textGeomLogger": true,
        "toolOptions": {
            "toolOffset": [0, -0.42, -0.4],
            "toolRotation": 0,
            "tipShape": "Cylinder"
        }
    }))
}

/// Defaults of the `WebVRConfig` polyfill global.
pub fn webvr_defaults() -> ConfigMap {
    object(json!({
        "FORCE_ENABLE_VR": false,
        "K_FILTER": 0.98,
        "PREDICTION_TIME_S": 0.010,
        "TOUCH_PANNER_DISABLED": false,
        "YAW_ONLY": false,
        "MOUSE_KEYBOARD_CONTROLS_DISABLED": false,
        "KEYBOARD_CONTROLS_DISABLED": true
    }))
}

/// Deployment variant. Both share one resolver and renderer and differ only
/// in data: defaults, page globals and cross-field rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    Classic,
    #[default]
    PyServer,
}

impl Variant {
    pub fn app_profile(self) -> ConfigProfile {
        match self {
            Variant::Classic => ConfigProfile::new(classic_defaults()),
            Variant::PyServer => ConfigProfile::new(pyserver_defaults()).with_shadow_map_rule(),
        }
    }

    /// Profile of the `WebVRConfig` global, if the variant emits one.
    pub fn webvr_profile(self) -> Option<ConfigProfile> {
        match self {
            Variant::Classic => Some(ConfigProfile::new(webvr_defaults())),
            Variant::PyServer => None,
        }
    }

    /// Name of the script global holding the scene export.
    pub fn scene_global(self) -> &'static str {
        match self {
            Variant::Classic => "THREEPY_SCENE",
            Variant::PyServer => "JSON_SCENE",
        }
    }

    /// Camera start position injected into the play page config.
    pub fn play_position(self) -> Option<[f64; 3]> {
        match self {
            Variant::Classic => None,
            Variant::PyServer => Some([0.0, 0.98295, 1.0042]),
        }
    }

    /// Camera start position injected into the configurator page config.
    pub fn configurator_position(self) -> Option<[f64; 3]> {
        match self {
            Variant::Classic => None,
            Variant::PyServer => Some([0.0, 0.9, 0.9]),
        }
    }

    pub fn shows_revision_links(self) -> bool {
        matches!(self, Variant::Classic)
    }

    /// Version string baked into the variant; `None` means read it from the site.
    pub fn fixed_version(self) -> Option<&'static str> {
        match self {
            Variant::Classic => None,
            Variant::PyServer => Some("0.1.0dev"),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Classic => f.write_str("classic"),
            Variant::PyServer => f.write_str("pyserver"),
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(Variant::Classic),
            "pyserver" => Ok(Variant::PyServer),
            other => Err(format!(
                "unknown variant {other:?} (expected \"classic\" or \"pyserver\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> OverrideSource {
        OverrideSource::Query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn boolean_literals_become_booleans() {
        assert_eq!(coerce("true"), Ok(Value::Bool(true)));
        assert_eq!(coerce("false"), Ok(Value::Bool(false)));
        // Only the exact lowercase literals count
        assert!(coerce("True").is_err());
    }

    #[test]
    fn numeric_strings_become_numbers() {
        assert_eq!(coerce("0.5").unwrap().as_f64(), Some(0.5));
        assert_eq!(coerce("3").unwrap().as_f64(), Some(3.0));
        assert_eq!(coerce(" 9.81 ").unwrap().as_f64(), Some(9.81));
    }

    #[test]
    fn non_numeric_strings_are_rejected() {
        let err = coerce("Cylinder").unwrap_err();
        assert_eq!(err.raw, "Cylinder");
        assert!(coerce("nan").is_err());
        assert!(coerce("inf").is_err());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let profile = Variant::PyServer.app_profile();
        let resolved = profile.resolve(&[query(&[("notAnOption", "1"), ("config", "x.json")])]);
        assert_eq!(&resolved.config, profile.defaults());
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn query_values_are_coerced() {
        let profile = Variant::Classic.app_profile();
        let resolved = profile.resolve(&[query(&[
            ("useSpotLight", "false"),
            ("soundVolume", "0.5"),
            ("H_table", "1"),
        ])]);
        assert_eq!(resolved.config["useSpotLight"], Value::Bool(false));
        assert_eq!(resolved.config["soundVolume"].as_f64(), Some(0.5));
        assert_eq!(resolved.config["H_table"].as_f64(), Some(1.0));
    }

    #[test]
    fn unparseable_value_kept_as_string_with_warning() {
        let profile = Variant::PyServer.app_profile();
        let resolved = profile.resolve(&[query(&[("gravity", "lots")])]);
        assert_eq!(resolved.config["gravity"], Value::String("lots".into()));
        assert_eq!(resolved.warnings.len(), 1);
        assert_eq!(resolved.warnings[0].key, "gravity");
    }

    #[test]
    fn query_overrides_win_over_file_overrides() {
        let profile = Variant::PyServer.app_profile();
        let file = object(json!({"gravity": 5, "skybox": false}));
        let resolved = profile.resolve(&[
            OverrideSource::File(file),
            query(&[("gravity", "9.81")]),
        ]);
        assert_eq!(resolved.config["gravity"].as_f64(), Some(9.81));
        // Untouched file values survive
        assert_eq!(resolved.config["skybox"], Value::Bool(false));
    }

    #[test]
    fn file_overrides_are_filtered_and_coerced() {
        let profile = Variant::PyServer.app_profile();
        let file = object(json!({
            "useShadowMap": "false",
            "H_table": "0.8",
            "toolOptions": {"tipShape": "Ellipsoid"},
            "extra": 1
        }));
        let resolved = profile.resolve(&[OverrideSource::File(file)]);
        assert_eq!(resolved.config["useShadowMap"], Value::Bool(false));
        assert_eq!(resolved.config["H_table"].as_f64(), Some(0.8));
        assert_eq!(resolved.config["toolOptions"]["tipShape"], "Ellipsoid");
        assert!(!resolved.config.contains_key("extra"));
    }

    #[test]
    fn first_repeated_query_key_wins() {
        let profile = Variant::PyServer.app_profile();
        let resolved = profile.resolve(&[query(&[("gravity", "1"), ("gravity", "2")])]);
        assert_eq!(resolved.config["gravity"].as_f64(), Some(1.0));
    }

    #[test]
    fn shadow_map_forces_standard_materials() {
        let profile = Variant::PyServer.app_profile();
        let resolved = profile.resolve(&[query(&[
            ("useShadowMap", "true"),
            ("useBasicMaterials", "true"),
        ])]);
        assert_eq!(resolved.config["useShadowMap"], Value::Bool(true));
        assert_eq!(resolved.config["useBasicMaterials"], Value::Bool(false));
    }

    #[test]
    fn shadow_map_rule_only_applies_to_pyserver() {
        let profile = Variant::Classic.app_profile();
        let resolved = profile.resolve(&[query(&[("useShadowMap", "true")])]);
        assert_eq!(resolved.config["useBasicMaterials"], Value::Bool(true));
    }

    #[test]
    fn resolved_keys_keep_default_order() {
        let profile = Variant::PyServer.app_profile();
        let resolved = profile.resolve(&[query(&[("skybox", "false"), ("pyserver", "false")])]);
        let keys: Vec<_> = resolved.config.keys().collect();
        let default_keys: Vec<_> = profile.defaults().keys().collect();
        assert_eq!(keys, default_keys);
    }

    #[test]
    fn webvr_profile_only_for_classic() {
        assert!(Variant::Classic.webvr_profile().is_some());
        assert!(Variant::PyServer.webvr_profile().is_none());
    }

    #[test]
    fn variant_display_parses_back() {
        for variant in [Variant::Classic, Variant::PyServer] {
            assert_eq!(variant.to_string().parse::<Variant>(), Ok(variant));
        }
    }

    #[test]
    fn variant_parses_case_insensitively() {
        assert_eq!("Classic".parse::<Variant>(), Ok(Variant::Classic));
        assert_eq!("pyserver".parse::<Variant>(), Ok(Variant::PyServer));
        assert!("flask".parse::<Variant>().is_err());
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!(1.5)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("x")));
    }
}
