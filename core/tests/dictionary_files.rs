use jyutping_core::{Config, Dictionary, DictionaryStore, LookupQuery};

fn temp(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("jyutping_{}_{}", std::process::id(), name))
}

/// `Dictionary::load` picks the reader from the file extension.
#[test]
fn load_dispatches_on_extension() {
    let json = temp("dict.json");
    std::fs::write(
        &json,
        r#"[
            {"hanzi": "你", "jyutping_code": "NEI5", "frequency": 2800},
            {"word": "你好", "jyutping_code": "nei5 hou2", "frequency": 900, "tags": ["greeting"]}
        ]"#,
    )
    .unwrap();
    let d = Dictionary::load(&json).unwrap();
    assert_eq!(d.len(), 2);
    let codes = vec!["nei5".to_string()];
    let hits = d.find_by_code(&LookupQuery::new(&codes, None, 10)).unwrap();
    assert_eq!(hits[0].text(), "你");
    assert_eq!(hits[0].id, 1);
    assert_eq!(d.find_tagged(&["greeting"], None, 5).unwrap()[0].text(), "你好");

    let snapshot = temp("dict.bincode");
    d.save_bincode(&snapshot).unwrap();
    let back = Dictionary::load(&snapshot).unwrap();
    assert_eq!(back.entries(), d.entries());

    let tsv = temp("dict.tsv");
    std::fs::write(&tsv, "# hanzi\tcode\tfreq\n好\thou2\t2000\n\tnei5 hou2\t900\t你好\tgreeting\n").unwrap();
    let t = Dictionary::load(&tsv).unwrap();
    assert_eq!(t.len(), 2);
    assert_eq!(t.find_exact("你好", None).unwrap().unwrap().jyutping_code, "nei5 hou2");

    for p in [json, snapshot, tsv] {
        let _ = std::fs::remove_file(p);
    }
}

#[test]
fn broken_files_report_load_errors() {
    let bad = temp("bad.json");
    std::fs::write(&bad, "{ not json").unwrap();
    let err = Dictionary::load(&bad).unwrap_err();
    assert_eq!(err.kind(), "internal");
    let _ = std::fs::remove_file(&bad);

    assert!(Dictionary::load(temp("missing.bincode")).is_err());
}

#[test]
fn config_file_roundtrip() {
    let path = temp("engine.toml");
    let cfg = Config {
        exact_limit: 4,
        ..Config::default()
    };
    cfg.save_toml(&path).unwrap();
    let back = Config::load_toml(&path).unwrap();
    assert_eq!(back.exact_limit, 4);
    assert_eq!(back.partial_limit, Config::default().partial_limit);
    let _ = std::fs::remove_file(&path);
}
