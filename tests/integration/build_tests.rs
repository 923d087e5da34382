use kiln::core::descriptor::BuildDescriptor;
use kiln::core::interfaces::BuildService;
use kiln::core::models::{BuildMode, BuildResult, EntryPoint};
use kiln::core::services::KilnBuildService;
use kiln::utils::KilnError;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STYLES: &str = r#"$brand: #4285f4;

@font-face {
  font-family: Icons;
  src: url("../fonts/icons.woff2") format("woff2"), url("../fonts/icons.eot?#iefix");
}

.logo { background: url(../img/logo.svg) no-repeat; }
.hero { background-image: url('../img/hero.png'); user-select: none; }
.brand { color: $brand; }
"#;

const SCRIPT: &str = r#"const greet = (name) => `Hello ${name}`;
document.addEventListener('DOMContentLoaded', () => {
  document.body.append(greet('kiln'));
});
"#;

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title><%= htmlWebpackPlugin.options.title %></title>
</head>
<body>
  <main id="root"></main>
</body>
</html>
"#;

const LOGO: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="8">
  <title>Logo</title>
  <rect width="8" height="8" fill="#4285f4"/>
</svg>
"##;

/// Noise does not compress, so the PNG stays above the inline limit
fn hero_png() -> Vec<u8> {
    let mut state: u32 = 0x2545_f491;
    let img = image::RgbaImage::from_fn(96, 96, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        image::Rgba([r, g, b, 255])
    });

    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn sample_project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(root, "src/index.html", TEMPLATE.as_bytes());
    write(root, "src/assets/scss/app.scss", STYLES.as_bytes());
    write(root, "src/assets/js/app.js", SCRIPT.as_bytes());
    write(root, "src/assets/fonts/icons.woff2", b"wOF2 fake font payload");
    write(root, "src/assets/fonts/icons.eot", b"fake eot payload");
    write(root, "src/assets/img/logo.svg", LOGO.as_bytes());
    write(root, "src/assets/img/hero.png", &hero_png());

    dir
}

async fn build(root: &Path, mode: BuildMode) -> BuildResult {
    let settings = BuildDescriptor::new(root).resolve(mode);
    let mut service = KilnBuildService::from_settings(&settings);
    service.build(&settings).await.expect("build succeeds")
}

fn read_output(root: &Path, manifest: &BTreeMap<String, String>, key: &str) -> String {
    let rel = manifest.get(key).unwrap_or_else(|| panic!("{} missing from manifest", key));
    std::fs::read_to_string(root.join("dist").join(rel)).unwrap()
}

#[tokio::test]
async fn test_development_build() {
    let project = sample_project();
    let root = project.path();
    let result = build(root, BuildMode::Development).await;

    assert!(result.success);
    assert_eq!(result.scripts_processed, 1);
    assert_eq!(result.styles_processed, 1);

    let manifest = &result.manifest;
    for key in ["app.js", "app.js.map", "app.css", "index.html"] {
        assert!(manifest.contains_key(key), "{} missing from manifest", key);
    }

    // stable asset names in development
    assert_eq!(manifest["assets/fonts/icons.woff2"], "assets/fonts/icons.woff2");
    assert_eq!(manifest["assets/img/hero.png"], "assets/images/hero.png");
    assert!(!manifest.contains_key("assets/img/logo.svg"));

    let css = read_output(root, manifest, "app.css");
    assert!(css.contains("../assets/fonts/icons.woff2"));
    assert!(css.contains("../assets/fonts/icons.eot?#iefix"));
    assert!(css.contains("../assets/images/hero.png"));
    assert!(css.contains("data:image/svg+xml;base64,"));
    assert!(css.contains("#4285f4"));

    let js = read_output(root, manifest, "app.js");
    assert!(js.contains("// src/assets/js/app.js"));
    assert!(js.contains("Hello"));
    assert!(js.trim_end().ends_with(&format!(
        "//# sourceMappingURL={}",
        manifest["app.js.map"]
    )));

    let map: serde_json::Value = serde_json::from_str(&read_output(root, manifest, "app.js.map")).unwrap();
    assert_eq!(map["sources"][0], "src/assets/js/app.js");

    let html = read_output(root, manifest, "index.html");
    assert!(html.contains("<title>Custom template</title>"));
    assert!(html.contains(r##"<meta name="theme-color" content="#4285f4">"##));
    assert!(html.contains(&format!("<script defer src=\"{}\"></script>", manifest["app.js"])));
    assert!(html.contains(&format!("<link href=\"{}\" rel=\"stylesheet\">", manifest["app.css"])));
}

#[tokio::test]
async fn test_production_build_hashes_names() {
    let project = sample_project();
    let root = project.path();
    let result = build(root, BuildMode::Production).await;
    let manifest = &result.manifest;

    let hashed = |pattern: &str, key: &str| {
        let re = Regex::new(pattern).unwrap();
        assert!(re.is_match(&manifest[key]), "{} = {} does not match {}", key, manifest[key], pattern);
    };
    hashed(r"^app\.[0-9a-f]{20}\.js$", "app.js");
    hashed(r"^app\.[0-9a-f]{20}\.js\.map$", "app.js.map");
    hashed(r"^assets/app\.[0-9a-f]{20}\.css$", "app.css");
    hashed(r"^assets/fonts/icons\.[0-9a-f]{20}\.woff2$", "assets/fonts/icons.woff2");
    hashed(r"^assets/images/hero\.[0-9a-f]{20}\.png$", "assets/img/hero.png");

    let js = read_output(root, manifest, "app.js");
    assert!(!js.contains("// src/assets/js/app.js"));

    let css = read_output(root, manifest, "app.css");
    assert!(css.contains(&format!("../{}", manifest["assets/fonts/icons.woff2"])));
    assert!(!css.contains("\n  "));

    let on_disk: BTreeMap<String, String> =
        serde_json::from_str(&std::fs::read_to_string(root.join("dist/manifest.json")).unwrap()).unwrap();
    assert_eq!(&on_disk, manifest);
}

#[tokio::test]
async fn test_builds_are_deterministic() {
    let project = sample_project();
    let root = project.path();

    let first = build(root, BuildMode::Production).await;
    let first_js = read_output(root, &first.manifest, "app.js");
    let second = build(root, BuildMode::Production).await;

    assert_eq!(first.manifest, second.manifest);
    assert_eq!(first_js, read_output(root, &second.manifest, "app.js"));
}

#[tokio::test]
async fn test_stale_outputs_are_removed() {
    let project = sample_project();
    let root = project.path();
    write(root, "dist/app.0000.js", b"old bundle");
    write(root, "dist/old/assets/x.png", b"old image");

    let result = build(root, BuildMode::Production).await;

    assert!(!root.join("dist/app.0000.js").exists());
    assert!(!root.join("dist/old").exists());
    for rel in result.manifest.values() {
        assert!(root.join("dist").join(rel).exists(), "{} should exist", rel);
    }
    assert!(root.join("dist/manifest.json").exists());
}

#[tokio::test]
async fn test_switching_modes_replaces_outputs() {
    let project = sample_project();
    let root = project.path();

    build(root, BuildMode::Development).await;
    assert!(root.join("dist/assets/fonts/icons.woff2").exists());

    let prod = build(root, BuildMode::Production).await;
    assert!(!root.join("dist/assets/fonts/icons.woff2").exists());
    assert!(root.join("dist").join(&prod.manifest["assets/fonts/icons.woff2"]).exists());
}

#[tokio::test]
async fn test_syntax_error_reports_file() {
    let project = sample_project();
    let root = project.path();
    write(root, "src/assets/js/app.js", b"const = ;\n");

    let settings = BuildDescriptor::new(root).resolve(BuildMode::Development);
    let mut service = KilnBuildService::from_settings(&settings);
    let err = service.build(&settings).await.unwrap_err();

    assert!(matches!(err, KilnError::Parse { .. }));
    assert!(err.format_detailed().contains("app.js"));
}

#[tokio::test]
async fn test_missing_template_uses_builtin_page() {
    let project = sample_project();
    let root = project.path();
    std::fs::remove_file(root.join("src/index.html")).unwrap();

    let result = build(root, BuildMode::Development).await;
    let html = read_output(root, &result.manifest, "index.html");

    assert!(html.contains("<title>Custom template</title>"));
    assert!(html.contains("<script defer"));
}

#[tokio::test]
async fn test_multiple_entries_link_every_bundle() {
    let project = sample_project();
    let root = project.path();
    write(root, "src/assets/js/admin.js", b"var admin = true;\n");
    write(root, "src/assets/css/theme.css", b"body { color: #222; }\n");

    let mut descriptor = BuildDescriptor::new(root);
    descriptor.entries.push(EntryPoint::new("admin", vec![PathBuf::from("src/assets/js/admin.js")]));
    descriptor.entries.push(EntryPoint::new("theme", vec![PathBuf::from("src/assets/css/theme.css")]));
    let settings = descriptor.resolve(BuildMode::Production);
    let mut service = KilnBuildService::from_settings(&settings);
    let result = service.build(&settings).await.unwrap();

    assert_eq!(result.scripts_processed, 2);
    assert_eq!(result.styles_processed, 2);

    let manifest = &result.manifest;
    for key in ["app.js", "app.css", "admin.js", "theme.css"] {
        assert!(manifest.contains_key(key), "{} missing from manifest", key);
    }
    assert!(!manifest.contains_key("admin.css"));
    assert!(!manifest.contains_key("theme.js"));

    let theme = read_output(root, manifest, "theme.css");
    assert!(theme.contains("#222"));

    let html = read_output(root, manifest, "index.html");
    for key in ["app.js", "admin.js"] {
        assert!(html.contains(&format!("<script defer src=\"{}\"></script>", manifest[key])));
    }
    for key in ["app.css", "theme.css"] {
        assert!(html.contains(&format!("<link href=\"{}\" rel=\"stylesheet\">", manifest[key])));
    }
}

#[tokio::test]
async fn test_same_named_images_are_kept_apart() {
    let project = sample_project();
    let root = project.path();
    write(root, "src/brand/a/badge.gif", &vec![1u8; 9000]);
    write(root, "src/brand/b/badge.gif", &vec![2u8; 9000]);
    write(
        root,
        "src/assets/css/badges.css",
        b".a { background: url(../../brand/a/badge.gif); }\n.b { background: url(../../brand/b/badge.gif); }\n",
    );

    let mut descriptor = BuildDescriptor::new(root);
    descriptor.entries.push(EntryPoint::new("badges", vec![PathBuf::from("src/assets/css/badges.css")]));

    let settings = descriptor.clone().resolve(BuildMode::Production);
    let mut service = KilnBuildService::from_settings(&settings);
    let result = service.build(&settings).await.unwrap();

    let a = &result.manifest["brand/a/badge.gif"];
    let b = &result.manifest["brand/b/badge.gif"];
    assert_ne!(a, b);
    assert_eq!(std::fs::read(root.join("dist").join(a)).unwrap(), vec![1u8; 9000]);
    assert_eq!(std::fs::read(root.join("dist").join(b)).unwrap(), vec![2u8; 9000]);

    // unhashed names collide in development
    let settings = descriptor.resolve(BuildMode::Development);
    let mut service = KilnBuildService::from_settings(&settings);
    let err = service.build(&settings).await.unwrap_err();
    assert!(matches!(err, KilnError::Build(_)));
    assert!(err.to_string().contains("assets/images/badge.gif"));
}

#[tokio::test]
async fn test_output_dir_at_root_is_rejected() {
    let project = sample_project();
    let root = project.path();

    let mut descriptor = BuildDescriptor::new(root);
    descriptor.output_dir = PathBuf::from(".");
    let settings = descriptor.resolve(BuildMode::Production);
    let mut service = KilnBuildService::from_settings(&settings);
    let err = service.build(&settings).await.unwrap_err();

    assert!(matches!(err, KilnError::Config(_)));
    assert!(root.join("src/assets/js/app.js").exists());
    assert!(root.join("src/index.html").exists());
    assert!(!root.join("manifest.json").exists());
}
