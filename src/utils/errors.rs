use std::path::PathBuf;
use thiserror::Error;

/// Location details attached to parse and transform failures
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub code_snippet: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_snippet(mut self, snippet: String) -> Self {
        self.code_snippet = Some(snippet);
        self
    }
}

#[derive(Error, Debug)]
pub enum KilnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {message}")]
    Parse {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Transform error in {rule}: {message}")]
    Transform { rule: String, message: String },

    #[error("No transform rule matches {0}")]
    NoRule(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Plugin {plugin} failed: {message}")]
    Plugin { plugin: String, message: String },

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Build error: {0}")]
    Build(String),
}

impl KilnError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            context: None,
        }
    }

    pub fn parse_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Parse {
            message: message.into(),
            context: Some(context),
        }
    }

    pub fn transform(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            rule: rule.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    /// Format error with file, location and snippet when available
    pub fn format_detailed(&self) -> String {
        match self {
            KilnError::Parse {
                message,
                context: Some(ctx),
            } => {
                let mut output = format!("❌ Parse Error: {}", message);

                if let Some(ref file_path) = ctx.file_path {
                    output.push_str(&format!("\n📁 File: {}", file_path.display()));
                }

                if let (Some(line), Some(column)) = (ctx.line, ctx.column) {
                    output.push_str(&format!("\n📍 Location: line {}, column {}", line, column));
                }

                if let Some(ref snippet) = ctx.code_snippet {
                    output.push_str("\n📝 Code:\n");
                    output.push_str(&format_code_snippet(snippet, ctx.line));
                }

                output
            }
            other => format!("❌ {}", other),
        }
    }
}

fn format_code_snippet(snippet: &str, error_line: Option<usize>) -> String {
    let mut output = String::new();

    for (i, line) in snippet.lines().enumerate() {
        let line_num = i + 1;
        if error_line == Some(line_num) {
            output.push_str(&format!("→ {:3} │ {}\n", line_num, line));
        } else {
            output.push_str(&format!("  {:3} │ {}\n", line_num, line));
        }
    }

    output
}

pub type Result<T> = std::result::Result<T, KilnError>;

impl From<regex::Error> for KilnError {
    fn from(err: regex::Error) -> Self {
        KilnError::parse(format!("Regex error: {}", err))
    }
}

impl From<serde_json::Error> for KilnError {
    fn from(err: serde_json::Error) -> Self {
        KilnError::build(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for KilnError {
    fn from(err: anyhow::Error) -> Self {
        KilnError::build(err.to_string())
    }
}
