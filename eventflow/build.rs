// Rejects lint-suppression attributes ("#[" + "allow" + ...) anywhere in the eventflow sources.
// Set EVENTFLOW_ALLOW_CHECK=0 to skip the scan (e.g. while bisecting a toolchain upgrade).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const SCANNED: [&str; 2] = ["src", "tests"];

fn main() {
    for relative in SCANNED {
        println!("cargo:rerun-if-changed={relative}");
    }
    println!("cargo:rerun-if-env-changed=EVENTFLOW_ALLOW_CHECK");

    if env::var("EVENTFLOW_ALLOW_CHECK").is_ok_and(|v| v == "0") {
        return;
    }

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("manifest dir"));

    let mut violations = Vec::new();
    for relative in SCANNED {
        let path = manifest_dir.join(relative);
        if path.exists() {
            scan(&path, &mut violations);
        }
    }

    if violations.is_empty() {
        return;
    }

    eprintln!("ERROR: lint suppression attributes found in eventflow:");
    for (file, line, content) in &violations {
        eprintln!("  {}:{}: {}", file.display(), line, content.trim());
    }
    panic!("lint suppression attributes are forbidden");
}

fn scan(path: &Path, violations: &mut Vec<(PathBuf, usize, String)>) {
    if path.is_dir() {
        if path.ends_with("target") {
            return;
        }
        for entry in fs::read_dir(path).expect("read dir") {
            scan(&entry.expect("dir entry").path(), violations);
        }
        return;
    }

    if path.extension().map_or(true, |ext| ext != "rs") {
        return;
    }

    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let needle = concat!("#", "[", "allow");
    let inner = concat!("#!", "[", "allow");
    for (idx, line) in content.lines().enumerate() {
        if line.contains(needle) || line.contains(inner) {
            violations.push((path.to_path_buf(), idx + 1, line.to_string()));
        }
    }
}
