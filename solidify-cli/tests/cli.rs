use std::path::PathBuf;
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "tests/snap", name]
        .iter()
        .collect()
}

fn solidify(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_solidify"))
        .args(args)
        .output()
        .expect("failed to run solidify")
}

#[test]
fn writes_to_stdout() {
    let file = fixture("animals.snap");
    let out = solidify(&[file.to_str().unwrap()]);
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("** Solidified class: Dog"));
    assert!(stdout.contains("extern bclosure *class_Animal_speak;"));
}

#[test]
fn picks_root_and_weak_strings() {
    let file = fixture("animals.snap");
    let out = solidify(&["--root", "Animal", "--weak", file.to_str().unwrap()]);
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("** Solidified class: Animal"));
    assert!(stdout.contains("be_const_key_weak(speak, "));
    assert!(!stdout.contains("class: Dog"));
}

#[test]
fn writes_to_output_file() {
    let file = fixture("animals.snap");
    let dest = std::env::temp_dir().join(format!("solidify_cli_{}.h", std::process::id()));
    let out = solidify(&[file.to_str().unwrap(), "-o", dest.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
    let written = std::fs::read_to_string(&dest).unwrap();
    std::fs::remove_file(&dest).unwrap();
    assert!(written.ends_with("    (bstring*) &be_const_str_Dog\n);\n"));
}

#[test]
fn emits_listing() {
    let file = fixture("animals.snap");
    let out = solidify(&["--emit-graph", "--root", "Dog", file.to_str().unwrap()]);
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("function speak"));
    assert!(stdout.contains("function bark"));
    assert!(stdout.contains("class: Dog"));
    assert!(!stdout.contains("be_local_class"));
}

#[test]
fn reports_errors() {
    let file = fixture("unknown.snap");
    let out = solidify(&[file.to_str().unwrap()]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("no item named 'nowhere'"));
}

#[test]
fn missing_file() {
    let out = solidify(&["does_not_exist.snap"]);
    assert!(!out.status.success());
}
