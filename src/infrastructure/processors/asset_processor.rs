use crate::core::models::extension_of;
use base64::Engine;
use std::path::Path;

/// Helpers for emitted and inlined file assets (fonts, images)
pub struct AssetProcessor;

impl AssetProcessor {
    pub fn mime_type(path: &Path) -> &'static str {
        match extension_of(path).as_deref() {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("svg") => "image/svg+xml",
            Some("woff") => "font/woff",
            Some("woff2") => "font/woff2",
            Some("ttf") => "font/ttf",
            Some("otf") => "font/otf",
            Some("eot") => "application/vnd.ms-fontobject",
            _ => "application/octet-stream",
        }
    }

    /// Base64 `data:` URI for inlining small assets into stylesheets
    pub fn data_uri(bytes: &[u8], path: &Path) -> String {
        format!(
            "data:{};base64,{}",
            Self::mime_type(path),
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    /// Join a public path prefix and a file name with exactly one slash
    pub fn public_url(public_path: &str, file_name: &str) -> String {
        let prefix = public_path.trim_end_matches('/');
        if prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", prefix, file_name)
        }
    }

    /// References that point outside the project and are left untouched
    pub fn is_external_reference(reference: &str) -> bool {
        let lower = reference.trim().to_lowercase();
        lower.is_empty()
            || lower.starts_with("data:")
            || lower.starts_with("http:")
            || lower.starts_with("https:")
            || lower.starts_with("//")
            || lower.starts_with('#')
            || lower.starts_with('/')
    }
}
