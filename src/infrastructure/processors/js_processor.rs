use crate::core::interfaces::{ScriptOptions, ScriptOutput, ScriptProcessor};
use crate::utils::{ErrorContext, KilnError, Logger, Result, Timer};
use oxc_allocator::Allocator;
use oxc_ast::ast::{Program, Statement};
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};
use std::path::{Path, PathBuf};

/// Script linting, lowering and minification on top of oxc
#[derive(Clone, Default)]
pub struct OxcScriptProcessor;

impl OxcScriptProcessor {
    pub fn new() -> Self {
        Self
    }

    fn source_type(path: &Path) -> SourceType {
        SourceType::from_path(path).unwrap_or_default()
    }

    fn parse_error(path: &Path, message: String) -> KilnError {
        KilnError::parse_with_context(message, ErrorContext::new().with_file(path.to_path_buf()))
    }

    /// Syntax and early-error check, the subset of linting that needs no rule config
    pub fn lint_source(source: &str, path: &Path) -> Result<()> {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, Self::source_type(path)).parse();

        if let Some(error) = parsed.errors.first() {
            return Err(Self::parse_error(path, error.to_string()));
        }

        let semantic = SemanticBuilder::new()
            .with_check_syntax_error(true)
            .build(&parsed.program);

        if let Some(error) = semantic.errors.first() {
            return Err(Self::parse_error(path, error.to_string()));
        }

        Ok(())
    }

    pub fn transform_source(source: &str, path: &Path, options: &ScriptOptions) -> Result<ScriptOutput> {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, Self::source_type(path)).parse();

        if !parsed.errors.is_empty() {
            let errors: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
            return Err(Self::parse_error(path, errors.join("\n")));
        }

        let mut program = parsed.program;
        let mut warnings = Vec::new();

        if has_module_syntax(&program) {
            warnings.push(format!(
                "{} uses import/export; imports are not followed and are emitted unchanged",
                path.display()
            ));
        }

        if let Some(target) = &options.target {
            let transform_options = TransformOptions::from_target(target)
                .map_err(|e| KilnError::config(format!("invalid transpile target '{}': {}", target, e)))?;

            let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
            let transformed = Transformer::new(&allocator, path, &transform_options)
                .build_with_scoping(scoping, &mut program);

            if let Some(error) = transformed.errors.first() {
                return Err(KilnError::transform("scripts", format!("{}: {}", path.display(), error)));
            }
        }

        let scoping = if options.minify {
            let minifier = Minifier::new(MinifierOptions {
                mangle: Some(MangleOptions::default()),
                compress: Some(CompressOptions::default()),
            });
            minifier.minify(&allocator, &mut program).scoping
        } else {
            None
        };

        let mut codegen_options = if options.minify {
            CodegenOptions::minify()
        } else {
            CodegenOptions::default()
        };
        if options.source_map {
            codegen_options.source_map_path = Some(path.to_path_buf());
        }

        let generated = Codegen::new()
            .with_options(codegen_options)
            .with_scoping(scoping)
            .build(&program);

        if options.minify {
            Logger::debug(&format!(
                "🗜️  {}: {} → {} bytes",
                path.display(),
                source.len(),
                generated.code.len()
            ));
        }

        Ok(ScriptOutput {
            code: generated.code,
            map: generated.map.map(|map| map.to_json_string()),
            warnings,
        })
    }
}

fn has_module_syntax(program: &Program) -> bool {
    program.body.iter().any(|statement| {
        matches!(
            statement,
            Statement::ImportDeclaration(_)
                | Statement::ExportAllDeclaration(_)
                | Statement::ExportDefaultDeclaration(_)
                | Statement::ExportNamedDeclaration(_)
        )
    })
}

#[async_trait::async_trait]
impl ScriptProcessor for OxcScriptProcessor {
    async fn lint(&self, source: &str, path: &Path) -> Result<()> {
        let _timer = Timer::start(&format!("Linting {}", path.display()));
        let source = source.to_string();
        let path: PathBuf = path.to_path_buf();

        tokio::task::spawn_blocking(move || Self::lint_source(&source, &path))
            .await
            .map_err(|e| KilnError::build(format!("Lint task failed: {}", e)))?
    }

    async fn transform(&self, source: &str, path: &Path, options: &ScriptOptions) -> Result<ScriptOutput> {
        let _timer = Timer::start(&format!("Transforming {}", path.display()));
        let source = source.to_string();
        let path: PathBuf = path.to_path_buf();
        let options = options.clone();

        // oxc passes are CPU bound
        tokio::task::spawn_blocking(move || Self::transform_source(&source, &path, &options))
            .await
            .map_err(|e| KilnError::build(format!("Transform task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lint_accepts_valid_script() {
        let source = "const greet = (name) => `Hello, ${name}`;\nconsole.log(greet('kiln'));";
        assert!(OxcScriptProcessor::lint_source(source, Path::new("app.js")).is_ok());
    }

    #[test]
    fn test_lint_rejects_syntax_error() {
        let err = OxcScriptProcessor::lint_source("let = ;", Path::new("broken.js")).unwrap_err();
        assert!(matches!(err, KilnError::Parse { .. }));
        assert!(err.format_detailed().contains("broken.js"));
    }

    #[test]
    fn test_lint_rejects_redeclaration() {
        let source = "let a = 1;\nlet a = 2;";
        assert!(OxcScriptProcessor::lint_source(source, Path::new("dup.js")).is_err());
    }

    #[test]
    fn test_transpile_lowers_exponentiation() {
        let options = ScriptOptions {
            target: Some("es2015".to_string()),
            ..Default::default()
        };
        let output = OxcScriptProcessor::transform_source(
            "var double = (x) => x ** 2;",
            Path::new("app.js"),
            &options,
        )
        .unwrap();

        assert!(!output.code.contains("**"));
    }

    #[test]
    fn test_minify_shrinks_code() {
        let source = r#"
            function hello(name) {
                const message = "Hello, " + name;
                console.log(message);
                return message;
            }
            hello("world");
        "#;
        let options = ScriptOptions {
            minify: true,
            ..Default::default()
        };
        let output = OxcScriptProcessor::transform_source(source, Path::new("app.js"), &options).unwrap();
        assert!(output.code.len() < source.len());
    }

    #[test]
    fn test_source_map_requested() {
        let options = ScriptOptions {
            source_map: true,
            ..Default::default()
        };
        let output = OxcScriptProcessor::transform_source("console.log(1);\n", Path::new("app.js"), &options).unwrap();
        let map = output.map.expect("map requested");
        assert!(map.contains("\"mappings\""));
    }

    #[test]
    fn test_module_syntax_warns() {
        let output = OxcScriptProcessor::transform_source(
            "import { x } from './x.js';\nconsole.log(x);",
            Path::new("app.js"),
            &ScriptOptions::default(),
        )
        .unwrap();
        assert_eq!(output.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_async_transform() {
        let processor = OxcScriptProcessor::new();
        let output = processor
            .transform("let a = 1;", Path::new("a.js"), &ScriptOptions::default())
            .await
            .unwrap();
        assert!(output.code.contains("let a = 1"));
    }
}
