use crate::core::models::{Asset, AssetKind, Compilation, HtmlOptions};
use crate::core::plugin::{Plugin, PluginContext};
use crate::infrastructure::AssetProcessor;
use crate::utils::{KilnError, Logger, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static TITLE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<%=\s*htmlWebpackPlugin\.options\.title\s*%>").unwrap()
});
static TITLE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<title[\s>]").unwrap());

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
</head>
<body>
</body>
</html>
"#;

/// Renders the HTML page that loads each entry's stylesheet and script
pub struct HtmlPlugin {
    options: HtmlOptions,
}

impl HtmlPlugin {
    pub fn new(options: HtmlOptions) -> Self {
        Self { options }
    }

    fn load_template(&self) -> Result<String> {
        if self.options.template.exists() {
            std::fs::read_to_string(&self.options.template).map_err(|e| {
                KilnError::plugin(
                    self.name(),
                    format!("cannot read template {}: {}", self.options.template.display(), e),
                )
            })
        } else {
            Logger::warn(&format!(
                "HTML template {} not found, using the built-in page",
                self.options.template.display()
            ));
            Ok(DEFAULT_TEMPLATE.to_string())
        }
    }

    /// Tags for `<head>`: title (when the template has none), meta, stylesheets
    fn head_tags(&self, html: &str, stylesheets: &[String]) -> String {
        let mut tags = String::new();

        if !TITLE_TAG.is_match(html) {
            tags.push_str(&format!("  <title>{}</title>\n", escape(&self.options.title)));
        }

        for (name, content) in &self.options.meta {
            if html.contains(&format!("name=\"{}\"", name)) {
                continue;
            }
            tags.push_str(&format!(
                "  <meta name=\"{}\" content=\"{}\">\n",
                escape(name),
                escape(content)
            ));
        }

        for href in stylesheets {
            tags.push_str(&format!("  <link href=\"{}\" rel=\"stylesheet\">\n", href));
        }
        tags
    }

    pub fn render(&self, template: &str, scripts: &[String], stylesheets: &[String]) -> String {
        let title = escape(&self.options.title);
        let mut html = TITLE_PLACEHOLDER
            .replace_all(template, title.as_str())
            .into_owned();

        let head = self.head_tags(&html, stylesheets);
        html = insert_before(&html, "</head>", &head);

        let body: String = scripts
            .iter()
            .map(|src| format!("  <script defer src=\"{}\"></script>\n", src))
            .collect();
        insert_before(&html, "</body>", &body)
    }
}

/// Insert `tags` before the last `marker`, or append them when it is missing
fn insert_before(html: &str, marker: &str, tags: &str) -> String {
    if tags.is_empty() {
        return html.to_string();
    }
    match html.rfind(marker) {
        Some(index) => format!("{}{}{}", &html[..index], tags, &html[index..]),
        None => format!("{}{}", html, tags),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl Plugin for HtmlPlugin {
    fn name(&self) -> &str {
        "html"
    }

    fn on_emit(&self, context: &PluginContext, compilation: &mut Compilation) -> Result<()> {
        let public_path = &context.settings.output.public_path;
        let mut scripts = Vec::new();
        let mut stylesheets = Vec::new();

        for entry in &context.settings.entries {
            let css_name = format!("{}.css", entry.name);
            let js_name = format!("{}.js", entry.name);

            for asset in compilation.assets() {
                if asset.kind == AssetKind::Stylesheet && asset.logical_name == css_name {
                    stylesheets.push(AssetProcessor::public_url(public_path, &asset.url_path()));
                }
                if asset.kind == AssetKind::Script && asset.logical_name == js_name {
                    scripts.push(AssetProcessor::public_url(public_path, &asset.url_path()));
                }
            }
        }

        let template = self.load_template()?;
        let html = self.render(&template, &scripts, &stylesheets);

        compilation.emit(Asset::new(
            self.options.filename.clone(),
            self.options.filename.clone(),
            html.into_bytes(),
            AssetKind::Html,
        ))
    }
}
