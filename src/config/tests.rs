use std::io::Write;

use super::*;

fn scope(path: &str) -> RawScope {
    RawScope {
        path: Some(path.to_string()),
        ..Default::default()
    }
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.database.path = Some("/var/lib/amber/from-file.db".to_string());

    let overrides = GlobalOverrides {
        log_level: Some("debug".to_string()),
        database_path: Some("/tmp/override.db".to_string()),
        ..Default::default()
    };

    raw.apply_global_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.database.path, "/tmp/override.db");
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_global_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn defaults_disable_annotation() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    let config = settings.filter.resolve("/index.html");

    assert!(!config.enabled);
    assert!(!config.cache_delivery);
    assert_eq!(config.behavior_up, BehaviorAction::None);
    assert_eq!(config.store_location, DEFAULT_DATABASE_PATH);
    assert!(settings.database.create_if_missing);
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid level");

    assert!(matches!(err, LoadError::Invalid { key: "logging.level", .. }));
}

#[test]
fn blank_database_path_is_rejected() {
    let mut raw = RawSettings::default();
    raw.database.path = Some("  ".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn directory_path_must_be_absolute() {
    let mut raw = RawSettings::default();
    raw.filter.directories.push(scope("cache"));

    let err = Settings::from_raw(raw).expect_err("relative path");

    assert!(matches!(err, LoadError::Invalid { key: "filter.directories.path", .. }));
}

#[test]
fn negative_delay_is_rejected() {
    let mut raw = RawSettings::default();
    raw.filter.hover_delay_up = Some(-1);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn nested_directories_are_rejected() {
    let mut raw = RawSettings::default();
    let mut outer = scope("/a");
    outer.directories.push(scope("/a/b"));
    raw.filter.directories.push(outer);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn directory_scopes_merge_broadest_first() {
    let mut raw = RawSettings::default();
    raw.filter.enabled = Some(true);
    raw.filter.behavior_up = Some("popup".to_string());
    raw.filter.hover_delay_down = Some(5);

    let mut deep = scope("/docs/archive/");
    deep.behavior_up = Some("cache".to_string());
    let mut shallow = scope("/docs");
    shallow.behavior_up = Some("hover".to_string());
    shallow.hover_delay_up = Some(2);
    shallow.enabled = Some(false);
    raw.filter.directories.push(deep);
    raw.filter.directories.push(shallow);

    let settings = Settings::from_raw(raw).expect("valid settings");

    let root = settings.filter.resolve("/index.html");
    assert!(root.enabled);
    assert_eq!(root.behavior_up, BehaviorAction::Popup);

    let docs = settings.filter.resolve("/docs/guide.html");
    assert!(!docs.enabled);
    assert_eq!(docs.behavior_up, BehaviorAction::Hover);
    assert_eq!(docs.hover_delay_up, 2);
    assert_eq!(docs.hover_delay_down, 5);

    let archive = settings.filter.resolve("/docs/archive/2019.html?page=2");
    assert_eq!(archive.behavior_up, BehaviorAction::Cache);
    assert_eq!(archive.hover_delay_up, 2);
}

#[test]
fn directory_match_respects_segments() {
    let mut raw = RawSettings::default();
    let mut cache = scope("/cache");
    cache.cache_delivery = Some(true);
    raw.filter.directories.push(cache);

    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(settings.filter.resolve("/cache").cache_delivery);
    assert!(settings.filter.resolve("/cache/abc123").cache_delivery);
    assert!(!settings.filter.resolve("/cached/abc123").cache_delivery);
}

#[test]
fn unknown_behavior_strings_disable_behavior() {
    let mut raw = RawSettings::default();
    raw.filter.behavior_down = Some("explode".to_string());
    raw.filter.country = Some("FR".to_string());
    raw.filter.country_behavior_down = Some("popup".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    let config = settings.filter.resolve("/");

    assert_eq!(config.behavior_down, BehaviorAction::None);
    assert_eq!(config.country.as_deref(), Some("FR"));
    assert_eq!(config.country_behavior_down, BehaviorAction::Popup);
}

#[test]
fn directory_store_location_overrides_database_path() {
    let mut raw = RawSettings::default();
    raw.database.path = Some("/srv/amber/main.db".to_string());
    let mut mirror = scope("/mirror");
    mirror.store_location = Some("/srv/amber/mirror.db".to_string());
    raw.filter.directories.push(mirror);

    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.filter.resolve("/").store_location, "/srv/amber/main.db");
    assert_eq!(
        settings.filter.resolve("/mirror/page").store_location,
        "/srv/amber/mirror.db"
    );
}

#[test]
fn loads_scopes_from_config_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    write!(
        file,
        r#"
[logging]
level = "warn"

[database]
path = "/tmp/amberlink-test.db"

[filter]
enabled = true
behavior_up = "popup"
behavior_down = "cache"
country = "FR"
country_behavior_down = "popup"

[[filter.directories]]
path = "/amber/cache"
cache_delivery = true
"#
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        "amberlink",
        "--config-file",
        file.path().to_str().expect("utf-8 path"),
        "migrate",
    ]);
    let settings = load(&args).expect("settings");

    assert_eq!(settings.logging.level, LevelFilter::WARN);
    assert_eq!(settings.database.path, "/tmp/amberlink-test.db");
    let page = settings.filter.resolve("/blog/post.html");
    assert!(page.enabled);
    assert_eq!(page.behavior_down, BehaviorAction::Cache);
    assert_eq!(page.country_behavior_down, BehaviorAction::Popup);
    assert!(settings.filter.resolve("/amber/cache/abc/").cache_delivery);
}

#[test]
fn default_to_annotate_command() {
    let args = CliArgs::parse_from(["amberlink"]);
    let command = args
        .command
        .unwrap_or(Command::Annotate(AnnotateArgs::default()));

    match command {
        Command::Annotate(annotate) => {
            assert_eq!(annotate.uri, "/");
            assert_eq!(annotate.content_type, "text/html");
            assert!(annotate.file.is_none());
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_annotate_arguments() {
    let args = CliArgs::parse_from([
        "amberlink",
        "annotate",
        "--uri",
        "/docs/page.html",
        "--content-type",
        "text/html; charset=utf-8",
        "--chunk-size",
        "512",
        "--database-path",
        "/tmp/a.db",
        "/tmp/page.html",
    ]);

    assert_eq!(args.overrides.database_path.as_deref(), Some("/tmp/a.db"));
    match args.command.expect("annotate command") {
        Command::Annotate(annotate) => {
            assert_eq!(annotate.uri, "/docs/page.html");
            assert_eq!(annotate.content_type, "text/html; charset=utf-8");
            assert_eq!(annotate.chunk_size, 512);
            assert_eq!(annotate.file, Some(std::path::PathBuf::from("/tmp/page.html")));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_queue_arguments() {
    let args = CliArgs::parse_from(["amberlink", "queue", "--limit", "10", "--log-json", "true"]);

    assert_eq!(args.overrides.log_json, Some(true));
    match args.command.expect("queue command") {
        Command::Queue(queue) => assert_eq!(queue.limit, 10),
        _ => panic!("wrong command parsed"),
    }
}
