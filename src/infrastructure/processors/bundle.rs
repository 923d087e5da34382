use crate::core::interfaces::ScriptOutput;
use crate::utils::{KilnError, Result};
use sourcemap::{SourceMap, SourceMapBuilder};

/// One transformed source, in entry order
#[derive(Debug, Clone)]
pub struct BundlePiece {
    /// Project-relative path used in comments and the source map
    pub label: String,
    pub source: String,
    pub output: ScriptOutput,
}

#[derive(Debug, Clone)]
pub struct ScriptBundle {
    pub code: String,
    pub map: Option<Vec<u8>>,
}

/// Concatenates pieces and merges their per-file maps with line offsets
pub struct ScriptBundler {
    with_comments: bool,
    with_map: bool,
}

impl ScriptBundler {
    pub fn new(with_comments: bool, with_map: bool) -> Self {
        Self {
            with_comments,
            with_map,
        }
    }

    pub fn assemble(&self, pieces: &[BundlePiece], file_name: Option<&str>) -> Result<ScriptBundle> {
        let mut code = String::new();
        let mut line: u32 = 0;
        let mut builder = if self.with_map {
            Some(SourceMapBuilder::new(file_name))
        } else {
            None
        };

        for piece in pieces {
            if self.with_comments {
                code.push_str(&format!("// {}\n", piece.label));
                line += 1;
            }

            if let (Some(builder), Some(map_json)) = (builder.as_mut(), piece.output.map.as_ref()) {
                let map = SourceMap::from_slice(map_json.as_bytes()).map_err(|e| {
                    KilnError::build(format!("invalid source map for {}: {}", piece.label, e))
                })?;

                let src_id = builder.add_source(&piece.label);
                builder.set_source_contents(src_id, Some(&piece.source));

                for token in map.tokens() {
                    if token.get_source().is_none() {
                        continue;
                    }
                    builder.add_raw(
                        line + token.get_dst_line(),
                        token.get_dst_col(),
                        token.get_src_line(),
                        token.get_src_col(),
                        Some(src_id),
                        None,
                        false,
                    );
                }
            }

            let mut chunk = piece.output.code.clone();
            if !chunk.ends_with('\n') {
                chunk.push('\n');
            }
            line += chunk.matches('\n').count() as u32;
            code.push_str(&chunk);
        }

        let map = match builder {
            Some(builder) => {
                let mut out = Vec::new();
                builder
                    .into_sourcemap()
                    .to_writer(&mut out)
                    .map_err(|e| KilnError::build(format!("failed to write source map: {}", e)))?;
                Some(out)
            }
            None => None,
        };

        Ok(ScriptBundle { code, map })
    }
}

/// Script snippet that injects a stylesheet at runtime
pub fn style_injection(css: &str) -> Result<String> {
    let literal = serde_json::to_string(css)?;
    Ok(format!(
        "(function(){{var s=document.createElement(\"style\");s.textContent={};document.head.appendChild(s);}})();",
        literal
    ))
}
