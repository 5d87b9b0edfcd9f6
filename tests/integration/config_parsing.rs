//! Integration tests for configuration files and template documents.

use std::path::{Path, PathBuf};

use photobooth::collage::{ParamValue, PhotoSlot, Template, TemplateCollage};
use photobooth::config::{AppConfig, ConfigFormat, home_dir, resolve_path};
use photobooth::error::PhotoboothError;

use crate::common::fixtures::{TemplateDir, write_offline_config};

#[test]
fn test_offline_config_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_offline_config(dir.path(), Path::new("/opt/booth/templates"));

    let config = AppConfig::load(&path).unwrap();
    assert!(!config.devices.vendor.enabled);
    assert!(!config.devices.board.enabled);
    assert!(!config.devices.webcam.enabled);
    assert!(!config.printer.enabled);
    assert_eq!(config.templates_dir(), PathBuf::from("/opt/booth/templates"));
    assert_eq!(config.session.dcim_dir, dir.path().join("DCIM"));
}

#[test]
fn test_home_relative_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[session]\ndcim_dir = \"~/DCIM\"\n").unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.session.dcim_dir, home_dir().unwrap().join("DCIM"));
    assert_eq!(resolve_path(Path::new("/abs"), dir.path()).unwrap(), PathBuf::from("/abs"));
}

#[test]
fn test_unknown_keys_are_tolerated_but_bad_types_are_not() {
    assert!(AppConfig::parse("[session]\ncountdown_secs = 5\nflavour = \"x\"\n").is_ok());
    assert!(matches!(
        AppConfig::parse("[session]\ncountdown_secs = \"soon\"\n"),
        Err(PhotoboothError::ConfigParse(_))
    ));
}

#[test]
fn test_same_template_in_every_format() {
    let json = r#"{"name": "Trio", "page": {"width": 900, "height": 300},
        "photos": [{"x": 0, "y": 0, "width": 300, "height": 300},
                   {"x": 300, "y": 0, "width": 300, "height": 300},
                   {"x": 600, "y": 0, "width": 300, "height": 300}],
        "print_params": {"copies": 2}}"#;
    let yaml = "name: Trio\npage: {width: 900, height: 300}\nphotos:\n  - {x: 0, y: 0, width: 300, height: 300}\n  - {x: 300, y: 0, width: 300, height: 300}\n  - {x: 600, y: 0, width: 300, height: 300}\nprint_params:\n  copies: 2\n";
    let toml = "name = \"Trio\"\npage = { width = 900, height = 300 }\nphotos = [\n  { x = 0, y = 0, width = 300, height = 300 },\n  { x = 300, y = 0, width = 300, height = 300 },\n  { x = 600, y = 0, width = 300, height = 300 },\n]\n[print_params]\ncopies = 2\n";

    let dir = TemplateDir::new();
    let documents = [("trio.json", json), ("trio.yml", yaml), ("trio.toml", toml)];
    let loaded: Vec<TemplateCollage> = documents
        .into_iter()
        .map(|(name, content)| TemplateCollage::load(&dir.write(name, content)).unwrap())
        .collect();

    for template in &loaded {
        assert_eq!(template.name(), "Trio");
        assert_eq!(template.photos_required(), 3);
        assert_eq!(template.template().photos, loaded[0].template().photos);
        assert_eq!(template.template().print_params["copies"], ParamValue::Int(2));
    }
}

#[test]
fn test_slots_may_start_off_page() {
    let template = Template::parse(
        r#"{"page": {"width": 100, "height": 100},
            "photos": [{"x": -20, "y": -10, "width": 60, "height": 60}]}"#,
        ConfigFormat::Json,
    )
    .unwrap();
    assert_eq!(
        template.photos[0],
        PhotoSlot {
            x: -20,
            y: -10,
            width: 60,
            height: 60
        }
    );
    let collage = TemplateCollage::new(template).unwrap();
    let frame = collage.assemble::<PathBuf>(&[], None, false).unwrap();
    assert_eq!(frame.dimensions(), (100, 100));
}

#[test]
fn test_template_errors_name_the_file() {
    let dir = TemplateDir::new();
    let path = dir.write("empty_page.json", r#"{"page": {"width": 10, "height": 0}}"#);
    match TemplateCollage::load(&path) {
        Err(PhotoboothError::TemplateInvalid { path: shown, .. }) => {
            assert!(shown.ends_with("empty_page.json"));
        }
        other => panic!("expected TemplateInvalid, got {other:?}"),
    }

    let missing_page = dir.write("no_page.yaml", "name: Broken\n");
    assert!(matches!(
        TemplateCollage::load(&missing_page),
        Err(PhotoboothError::TemplateInvalid { .. })
    ));
}

#[test]
fn test_config_format_detection() {
    assert_eq!(ConfigFormat::from_extension(Path::new("a.JSON")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_extension(Path::new("a.yml")), Some(ConfigFormat::Yaml));
    assert_eq!(ConfigFormat::from_extension(Path::new("a.toml")), Some(ConfigFormat::Toml));
    assert_eq!(ConfigFormat::from_extension(Path::new("a.txt")), None);
}
