//! Command-line tests for the pdf-watermarker binary

use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn write_letter(path: &Path) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 m".to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "Kids" => vec![Object::from(page_id)],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("Failed to write test PDF");
}

fn watermarker(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pdf-watermarker"))
        .current_dir(dir)
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .expect("Failed to run pdf-watermarker")
}

/// Overlay stream of the first page of a watermarked document
fn overlay(path: &Path) -> String {
    let doc = Document::load(path).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let content = doc.get_page_content(page_id).unwrap();
    String::from_utf8_lossy(&content).into_owned()
}

#[test]
fn test_missing_input_does_not_stop_batch() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let dir = temp_dir.path();
    write_letter(&dir.join("a.pdf"));
    write_letter(&dir.join("c.pdf"));

    let output = watermarker(dir, &["apply", "a.pdf", "missing.pdf", "c.pdf", "--text", "DRAFT"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(dir.join("a_marked.pdf").exists());
    assert!(dir.join("c_marked.pdf").exists());
    assert!(!dir.join("missing_marked.pdf").exists());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing.pdf"));
    assert!(stderr.contains("Done: 2 of 3 files watermarked"));
}

#[test]
fn test_same_name_into_one_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let dir = temp_dir.path();
    for sub in ["d1", "d2"] {
        std::fs::create_dir(dir.join(sub)).unwrap();
        write_letter(&dir.join(sub).join("a.pdf"));
    }

    let output = watermarker(
        dir,
        &["apply", "d1/a.pdf", "d2/a.pdf", "--text", "DRAFT", "-o", "out"],
    );

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Done: 1 of 2 files watermarked"));
    assert!(stderr.contains("already used"));
    assert!(dir.join("out").join("a_marked.pdf").exists());
}

#[test]
fn test_flags_override_template_style() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let dir = temp_dir.path();
    write_letter(&dir.join("a.pdf"));

    let saved = watermarker(
        dir,
        &[
            "apply", "a.pdf", "--text", "DRAFT", "--opacity", "0.7", "--settings", "s.json",
            "--save-template", "draft",
        ],
    );
    assert!(saved.status.success());

    // Stored template opacity is kept without a flag
    let kept = watermarker(
        dir,
        &["apply", "a.pdf", "--settings", "s.json", "--template", "draft", "--suffix", "_kept"],
    );
    assert!(kept.status.success());
    assert!(overlay(&dir.join("a_kept.pdf")).contains("/WmGs700 gs"));

    let overridden = watermarker(
        dir,
        &[
            "apply", "a.pdf", "--settings", "s.json", "--template", "draft", "--opacity", "0.25",
            "--suffix", "_light",
        ],
    );
    assert!(overridden.status.success());
    let content = overlay(&dir.join("a_light.pdf"));
    assert!(content.contains("/WmGs250 gs"));
    assert!(!content.contains("/WmGs700 gs"));
}
