use kiln::core::interfaces::BuildService;
use kiln::core::models::BuildMode;
use kiln::core::services::KilnBuildService;
use kiln::utils::{ConfigLoader, CONFIG_FILE};

#[tokio::test]
async fn test_config_file_drives_build() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    std::fs::create_dir_all(root.join("web")).unwrap();
    std::fs::write(root.join("web/main.js"), "var answer = 42;\n").unwrap();
    std::fs::write(root.join("web/main.css"), "body { margin: 0; }\n").unwrap();
    std::fs::write(
        root.join(CONFIG_FILE),
        r#"{
  "entry": { "main": ["web/main.css", "web/main.js"] },
  "srcdir": "web",
  "outdir": "public",
  "title": "Config driven",
  "sourceMaps": false
}"#,
    )
    .unwrap();

    let file_config = ConfigLoader::load_from_file(root).unwrap();
    let descriptor = ConfigLoader::merge_with_cli(file_config, root.to_path_buf(), None, None);
    let settings = descriptor.resolve(BuildMode::Development);

    let mut service = KilnBuildService::from_settings(&settings);
    let result = service.build(&settings).await.unwrap();

    assert!(result.manifest.contains_key("main.js"));
    assert!(result.manifest.contains_key("main.css"));
    assert!(!result.manifest.contains_key("main.js.map"));

    let html = std::fs::read_to_string(root.join("public/index.html")).unwrap();
    assert!(html.contains("<title>Config driven</title>"));
    assert!(root.join("public/manifest.json").exists());
}

#[test]
fn test_production_settings_do_not_watch() {
    let descriptor = ConfigLoader::merge_with_cli(None, "/srv/app".into(), None, None);

    assert!(descriptor.resolve(BuildMode::Development).watch);
    assert!(!descriptor.resolve(BuildMode::Production).watch);
}
