use std::path::Path;
use std::process::{Command, Output};

fn handscript(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_handscript"))
        .args(args)
        .current_dir(home)
        .env("HOME", home)
        .env("HANDSCRIPT_DIR", home.join(".handscript"))
        .env_remove("OLLAMA_HOST")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn renders_chinese_text_with_neat_style() {
    let home = tempfile::tempdir().unwrap();
    let output = home.path().join("out.png");
    let result = handscript(
        home.path(),
        &[
            "--text",
            "测试文字",
            "--style",
            "neat",
            "--output",
            output.to_str().unwrap(),
            "--seed",
            "5",
        ],
    );
    assert!(
        result.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&result.stdout).trim(),
        output.display().to_string()
    );
    assert_eq!(image::image_dimensions(&output).unwrap(), (2480, 1748));
}

#[test]
fn unknown_style_fails_without_output() {
    let home = tempfile::tempdir().unwrap();
    let output = home.path().join("bogus.png");
    let result = handscript(
        home.path(),
        &[
            "--style",
            "bogus",
            "--text",
            "x",
            "--output",
            output.to_str().unwrap(),
        ],
    );
    assert_eq!(result.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("unknown style 'bogus'"), "stderr: {stderr}");
    assert!(!output.exists());
}

#[test]
fn empty_style_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let output = home.path().join("empty.png");
    let result = handscript(
        home.path(),
        &["--style", "", "--text", "x", "-o", output.to_str().unwrap()],
    );
    assert_eq!(result.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("unknown style ''"), "stderr: {stderr}");
    assert!(!output.exists());
}

#[test]
fn text_file_is_rendered_to_default_location() {
    let home = tempfile::tempdir().unwrap();
    let input = home.path().join("note.txt");
    std::fs::write(&input, "第一行\n第二行\n").unwrap();
    let result = handscript(home.path(), &["-f", input.to_str().unwrap()]);
    assert!(
        result.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    let printed = String::from_utf8_lossy(&result.stdout).trim().to_string();
    let path = Path::new(&printed);
    assert!(path.starts_with(home.path().join(".handscript").join("output")));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("handwritten_") && name.ends_with(".png"));
    assert!(path.exists());
}

#[test]
fn missing_input_file_is_an_input_error() {
    let home = tempfile::tempdir().unwrap();
    let result = handscript(home.path(), &["--file", "does-not-exist.txt"]);
    assert_eq!(result.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&result.stderr).starts_with("error: "));
}

#[test]
fn text_sources_conflict() {
    let home = tempfile::tempdir().unwrap();
    let result = handscript(home.path(), &["--text", "a", "--file", "b.txt"]);
    assert!(!result.status.success());
}

#[test]
fn missing_font_exits_with_resource_code() {
    let home = tempfile::tempdir().unwrap();
    let output = home.path().join("font.png");
    let result = handscript(
        home.path(),
        &[
            "-t",
            "hello",
            "-F",
            "/nonexistent/font.ttf",
            "-o",
            output.to_str().unwrap(),
        ],
    );
    assert_eq!(result.status.code(), Some(4));
    assert!(!output.exists());
}

#[test]
fn show_styles_lists_presets() {
    let home = tempfile::tempdir().unwrap();
    let result = handscript(home.path(), &["--show-styles"]);
    assert!(result.status.success());
    let names: Vec<String> = String::from_utf8_lossy(&result.stdout)
        .lines()
        .filter_map(|line| line.split('\t').next().map(str::to_string))
        .collect();
    assert_eq!(names, vec!["default", "compact", "neat", "casual"]);
}
