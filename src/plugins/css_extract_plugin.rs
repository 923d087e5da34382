use crate::core::models::{Asset, AssetKind, Compilation, NameTemplate};
use crate::core::plugin::{Plugin, PluginContext};
use crate::utils::{Logger, Result};

/// Writes the CSS collected for each entry to its own stylesheet
pub struct CssExtractPlugin {
    filename: NameTemplate,
}

impl CssExtractPlugin {
    pub fn new(filename: NameTemplate) -> Self {
        Self { filename }
    }
}

impl Plugin for CssExtractPlugin {
    fn name(&self) -> &str {
        "extract-css"
    }

    fn on_compile(&self, _context: &PluginContext, compilation: &mut Compilation) -> Result<()> {
        let stylesheets: Vec<Asset> = compilation
            .styles
            .iter()
            .filter(|styles| !styles.css.trim().is_empty())
            .map(|styles| {
                let path = self.filename.render(&styles.entry, "css", styles.css.as_bytes());
                Asset::new(
                    format!("{}.css", styles.entry),
                    path,
                    styles.css.clone().into_bytes(),
                    AssetKind::Stylesheet,
                )
            })
            .collect();

        for stylesheet in stylesheets {
            Logger::debug(&format!("Extracted {}", stylesheet.url_path()));
            compilation.emit(stylesheet)?;
        }
        Ok(())
    }
}
