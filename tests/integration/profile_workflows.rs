// Integration tests for profile save/load and catalog lookup order

use std::fs;
use tempfile::TempDir;
use videoslim::engine::{
    BuiltinProfiles, EncodingProfile, ProfileCatalog, ProfileStore, SpeedPreset,
};

fn custom(name: &str, crf: f64) -> EncodingProfile {
    EncodingProfile {
        name: name.to_string(),
        crf,
        preset: SpeedPreset::Faster,
        keyint: 120,
        refs: 2,
        bframes: 1,
        hardware_acceleration: true,
        additional_args: "-tune film -vf \"scale=1280:-2\"".to_string(),
    }
}

#[test]
fn test_profile_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let profile = custom("Phone Clips", 28.5);

    profile.save(dir.path()).unwrap();
    assert!(dir.path().join("phone_clips.json").exists());

    let loaded = EncodingProfile::load(dir.path(), "Phone Clips").unwrap();
    assert_eq!(loaded, profile);
    assert_eq!(
        EncodingProfile::list_saved(dir.path()).unwrap(),
        vec!["Phone Clips".to_string()]
    );
}

#[test]
fn test_saved_profile_without_optional_fields_gets_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("minimal.json"),
        r#"{ "name": "minimal", "crf": 24.0, "preset": "medium" }"#,
    )
    .unwrap();

    let profile = EncodingProfile::load(dir.path(), "minimal").unwrap();
    assert_eq!(profile.preset, SpeedPreset::Medium);
    assert_eq!(profile.keyint, 600);
    assert_eq!(profile.refs, 4);
    assert_eq!(profile.bframes, 3);
    assert!(!profile.hardware_acceleration);
    assert!(profile.additional_args.is_empty());
}

#[test]
fn test_catalog_lookup_order() {
    let dir = TempDir::new().unwrap();
    // A saved profile shadows the built-in of the same name
    custom("fast", 30.0).save(dir.path()).unwrap();
    custom("mine", 21.0).save(dir.path()).unwrap();

    let catalog = ProfileCatalog::new(Some(dir.path().to_path_buf()));
    assert_eq!(catalog.get("fast").unwrap().crf, 30.0);
    assert_eq!(catalog.get("mine").unwrap().crf, 21.0);
    assert_eq!(catalog.get("archive").unwrap().preset, SpeedPreset::Veryslow);
    assert!(catalog.get("nothing").is_none());

    // An override shadows both
    catalog.set_override(custom("fast", 35.0));
    assert_eq!(catalog.get("fast").unwrap().crf, 35.0);

    let names = catalog.names();
    for expected in ["archive", "default", "fast", "mine"] {
        assert!(names.contains(&expected.to_string()), "names: {:?}", names);
    }
    assert_eq!(names.iter().filter(|n| *n == "fast").count(), 1);
}

#[test]
fn test_builtin_store() {
    let store = BuiltinProfiles;
    let default = store.get("default").unwrap();
    assert_eq!(default.crf, 23.5);
    assert_eq!(default.preset, SpeedPreset::Slow);
    assert!(store.get("Default").is_none());

    for name in EncodingProfile::builtin_names() {
        assert!(store.get(name).is_some(), "missing builtin {}", name);
    }
}

#[test]
fn test_speed_preset_slider_positions() {
    assert_eq!(SpeedPreset::Veryslow.index(), 0);
    assert_eq!(SpeedPreset::Ultrafast.index(), 8);
    assert_eq!(SpeedPreset::from_index(6), Some(SpeedPreset::Veryfast));
    assert_eq!(SpeedPreset::from_index(9), None);
    assert_eq!("VeryFast".parse::<SpeedPreset>(), Ok(SpeedPreset::Veryfast));
    assert!("turbo".parse::<SpeedPreset>().is_err());
    assert_eq!(SpeedPreset::Superfast.to_string(), "superfast");
}
