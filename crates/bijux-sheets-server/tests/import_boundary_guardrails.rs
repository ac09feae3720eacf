use std::path::{Path, PathBuf};

fn rust_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("read source dir")
        .map(|entry| entry.expect("entry").path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("rs"))
        .collect()
}

fn assert_free_of(path: &Path, forbidden: &[&str]) {
    let text = std::fs::read_to_string(path).expect("read source file");
    for token in forbidden {
        assert!(
            !text.contains(token),
            "{} contains forbidden token: {}",
            path.display(),
            token
        );
    }
}

#[test]
fn http_layer_talks_to_the_adapter_not_the_backends() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/http");
    for path in rust_files(&root) {
        assert_free_of(
            &path,
            &["GoogleSheetsBackend", "MemorySheetsBackend", "SheetRange", "reqwest::"],
        );
    }
}

#[test]
fn adapter_does_not_depend_on_http_protocol_modules() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/items.rs");
    assert_free_of(&path, &["axum::", "crate::http::", "StatusCode"]);
}
