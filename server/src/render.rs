//! Page rendering: fills the HTML templates with the resolved configuration
//! and the scene export, embedded as inline script globals.

use std::sync::Arc;

use poolvr_shared::config::{ConfigMap, Variant};
use poolvr_shared::protocol::PoolvrGlobal;
use serde::Serialize;
use serde_json::{json, Value};

use crate::scene::{export_json, SceneBuilder, SceneError};
use crate::template::{Context, TemplateSet};

pub const PLAY_TEMPLATE: &str = "poolvr.html";
pub const CONFIG_TEMPLATE: &str = "config.html";

/// Prefix for asset URLs in the configurator, which lives one level down.
const CONFIG_URL_PREFIX: &str = "../";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template {0} not found")]
    TemplateNotFound(String),
    #[error("invalid version {0:?}")]
    InvalidVersion(String),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("failed to serialize page config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Renders the play and configurator pages. Built once at start-up.
pub struct PageRenderer {
    variant: Variant,
    templates: TemplateSet,
    scene: Arc<dyn SceneBuilder>,
    debug: bool,
    version: String,
    /// Revision links, when the variant shows them and git history was found.
    version_content: Option<String>,
}

impl PageRenderer {
    pub fn new(
        variant: Variant,
        templates: TemplateSet,
        scene: Arc<dyn SceneBuilder>,
        debug: bool,
        version: String,
        version_content: Option<String>,
    ) -> Self {
        Self {
            variant,
            templates,
            scene,
            debug,
            version,
            version_content: version_content.filter(|_| variant.shows_revision_links()),
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// The play page. `version` selects the alternate template `poolvr-<version>.html`.
    pub fn render_play(
        &self,
        mut config: ConfigMap,
        webvr: Option<&ConfigMap>,
        version: Option<&str>,
    ) -> Result<String, RenderError> {
        if let Some(position) = self.variant.play_position() {
            config.insert("initialPosition".into(), json!(position));
        }
        let template_name = match version {
            Some(v) => format!("poolvr-{}.html", checked_version(v)?),
            None => PLAY_TEMPLATE.to_string(),
        };
        let template = self
            .templates
            .get(&template_name)
            .ok_or(RenderError::TemplateNotFound(template_name))?;

        let scene = self.scene.pool_hall(&config)?;
        let scene_json = export_json(&scene, self.debug)?;
        let version = version.unwrap_or(&self.version).to_string();
        let context = self.page_context(config, webvr, version, &scene_json)?;
        Ok(template.render(&context))
    }

    /// The configurator page.
    pub fn render_configurator(
        &self,
        mut config: ConfigMap,
        version: Option<&str>,
    ) -> Result<String, RenderError> {
        if let Some(position) = self.variant.configurator_position() {
            config.insert("initialPosition".into(), json!(position));
        }
        let template = self
            .templates
            .get(CONFIG_TEMPLATE)
            .ok_or_else(|| RenderError::TemplateNotFound(CONFIG_TEMPLATE.to_string()))?;

        let scene = self.scene.config_scene(CONFIG_URL_PREFIX, &config)?;
        let scene_json = export_json(&scene, self.debug)?;
        let version = version.unwrap_or(&self.version).to_string();
        let context = self.page_context(config, None, version, &scene_json)?;
        Ok(template.render(&context))
    }

    /// The play page for default configuration and no request, as shipped in the bundle.
    pub fn render_default(&self) -> Result<String, RenderError> {
        let config = self.variant.app_profile().defaults().clone();
        let webvr = self
            .variant
            .webvr_profile()
            .map(|profile| profile.defaults().clone());
        self.render_play(config, webvr.as_ref(), None)
    }

    fn page_context(
        &self,
        config: ConfigMap,
        webvr: Option<&ConfigMap>,
        version: String,
        scene_json: &str,
    ) -> Result<Context, RenderError> {
        let mut context = Context::new();
        for (key, value) in &config {
            if let Some(text) = scalar_text(value) {
                context.text(key.clone(), text);
            }
        }

        let global = PoolvrGlobal {
            config,
            version: version.clone(),
        };
        let mut script = String::from("<script>\n");
        if let Some(webvr) = webvr {
            script.push_str(&format!("var WebVRConfig = {};\n", pretty_for_script(webvr)?));
        }
        script.push_str(&format!("var POOLVR = {};\n", pretty_for_script(&global)?));
        script.push_str(&format!(
            "var {} = {};\n",
            self.variant.scene_global(),
            escape_script(scene_json)
        ));
        script.push_str("</script>");

        context
            .text("debug", self.debug.to_string())
            .text("js_suffix", if self.debug { ".js" } else { ".min.js" })
            .text("version", version)
            .markup("version_content", self.version_content.clone().unwrap_or_default())
            .markup("json_config", script);
        Ok(context)
    }
}

/// Alternate template versions end up in a file name; keep them to a safe alphabet.
fn checked_version(version: &str) -> Result<&str, RenderError> {
    let safe = !version.is_empty()
        && !version.contains("..")
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if safe {
        Ok(version)
    } else {
        Err(RenderError::InvalidVersion(version.to_string()))
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        _ => None,
    }
}

fn pretty_for_script<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value).map(|json| escape_script(&json))
}

/// Keep embedded JSON from closing the surrounding `<script>` element.
fn escape_script(json: &str) -> String {
    json.replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::PoolHall;
    use crate::template::Template;

    fn templates() -> TemplateSet {
        let mut set = TemplateSet::default();
        let page = "<title>{{ version }}</title>{{ version_content }}{{ json_config }}\
                    <script src=\"three{{ js_suffix }}\"></script><i>{{ gravity }}</i>";
        set.insert(Template::parse(PLAY_TEMPLATE, page).unwrap());
        set.insert(Template::parse("poolvr-dev.html", "dev {{ version }}").unwrap());
        set.insert(Template::parse(CONFIG_TEMPLATE, "cfg {{ json_config }}").unwrap());
        set
    }

    fn renderer(variant: Variant, debug: bool) -> PageRenderer {
        PageRenderer::new(
            variant,
            templates(),
            Arc::new(PoolHall),
            debug,
            "1.2.3".into(),
            Some("<table>revs</table>".into()),
        )
    }

    fn defaults(variant: Variant) -> ConfigMap {
        variant.app_profile().defaults().clone()
    }

    #[test]
    fn play_page_embeds_globals() {
        let page = renderer(Variant::PyServer, true)
            .render_play(defaults(Variant::PyServer), None, None)
            .unwrap();
        assert!(page.contains("<title>1.2.3</title>"));
        assert!(page.contains("var POOLVR = {"));
        assert!(page.contains("var JSON_SCENE = {"));
        assert!(!page.contains("WebVRConfig"));
        assert!(page.contains("\"initialPosition\""));
        assert!(page.contains("three.js"));
        assert!(page.contains("<i>9.8</i>"));
    }

    #[test]
    fn classic_page_has_webvr_config_and_revision_links() {
        let variant = Variant::Classic;
        let webvr = variant.webvr_profile().unwrap().defaults().clone();
        let page = renderer(variant, false)
            .render_play(defaults(variant), Some(&webvr), None)
            .unwrap();
        assert!(page.contains("var WebVRConfig = {"));
        assert!(page.contains("var THREEPY_SCENE = {"));
        assert!(page.contains("<table>revs</table>"));
        assert!(page.contains("three.min.js"));
        assert!(!page.contains("initialPosition"));
    }

    #[test]
    fn revision_links_hidden_for_pyserver() {
        let page = renderer(Variant::PyServer, true)
            .render_play(defaults(Variant::PyServer), None, None)
            .unwrap();
        assert!(!page.contains("revs"));
    }

    #[test]
    fn scene_json_is_compact_outside_debug() {
        let page = renderer(Variant::PyServer, false)
            .render_play(defaults(Variant::PyServer), None, None)
            .unwrap();
        let line = page
            .lines()
            .find(|l| l.starts_with("var JSON_SCENE"))
            .unwrap();
        assert!(line.ends_with("};"));
    }

    #[test]
    fn version_selects_alternate_template() {
        let page = renderer(Variant::PyServer, true)
            .render_play(defaults(Variant::PyServer), None, Some("dev"))
            .unwrap();
        assert_eq!(page, "dev dev");
    }

    #[test]
    fn unknown_or_unsafe_version_is_rejected() {
        let r = renderer(Variant::PyServer, true);
        let err = r
            .render_play(defaults(Variant::PyServer), None, Some("missing"))
            .unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound(_)));
        let err = r
            .render_play(defaults(Variant::PyServer), None, Some("../x"))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidVersion(_)));
    }

    #[test]
    fn configurator_uses_config_template() {
        let page = renderer(Variant::PyServer, true)
            .render_configurator(defaults(Variant::PyServer), None)
            .unwrap();
        assert!(page.starts_with("cfg <script>"));
        assert!(page.contains("../images/skybox.png"));
        assert!(page.contains("0.9"));
    }

    #[test]
    fn script_closing_tags_are_escaped() {
        let mut config = defaults(Variant::PyServer);
        config.insert("skybox".into(), json!("</script><b>"));
        let page = renderer(Variant::PyServer, true)
            .render_play(config, None, None)
            .unwrap();
        assert!(page.contains("<\\/script><b>"));
        assert_eq!(page.matches("</script>").count(), 2);
    }

    #[test]
    fn default_render_needs_no_request() {
        let page = renderer(Variant::Classic, true).render_default().unwrap();
        assert!(page.contains("var WebVRConfig"));
    }
}
