//! End-to-end runs over real image files and the real codec.

use image::{DynamicImage, Rgba, RgbaImage};
use pixelsieve::codec::{Codec, ImageCodec};
use pixelsieve::config::PipelineConfig;
use pixelsieve::fetch::{FetchError, FetchTransport};
use pixelsieve::orchestrator::{PipelineOrchestrator, RunOptions, derive_run_id};
use pixelsieve::package::DirPackager;
use pixelsieve::source::DirectorySource;
use pixelsieve::types::ItemStatus;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

/// These tests only use local files; any network call is a bug.
struct NoNetwork;

impl FetchTransport for NoNetwork {
    fn get(&self, reference: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Permanent(format!(
            "unexpected network fetch: {reference}"
        )))
    }
}

fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
    let img = RgbaImage::from_pixel(width, height, Rgba([120, 80, 40, 255]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    fs::write(dir.join(name), bytes).unwrap();
}

fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.min_resolution = 50;
    config.workers.count = 2;
    config
}

fn run_options(tmp: &TempDir, source: &Path) -> RunOptions {
    RunOptions {
        source: source.to_string_lossy().into_owned(),
        work_dir: tmp.path().join("work"),
        output_dir: tmp.path().join("out"),
        force_restart: false,
    }
}

#[test]
fn end_to_end_directory_run() {
    let tmp = TempDir::new().unwrap();
    let source_dir = tmp.path().join("source");
    fs::create_dir(&source_dir).unwrap();
    write_png(&source_dir, "big.png", 60, 60); // passes
    write_png(&source_dir, "small.png", 40, 40); // below threshold
    write_png(&source_dir, "edge.png", 50, 80); // exactly at threshold: passes
    fs::write(source_dir.join("notes.txt"), "not an image").unwrap();

    let config = test_config();
    let codec = ImageCodec::new();
    let source = DirectorySource;
    let options = run_options(&tmp, &source_dir);
    let packager = DirPackager::new(&options.output_dir);

    let orchestrator =
        PipelineOrchestrator::new(config, &source, &codec, NoNetwork, &packager);
    let result = orchestrator.run(&options).unwrap();

    assert!(result.completed);
    assert_eq!(result.count(ItemStatus::Packaged), 2);
    assert_eq!(result.count(ItemStatus::Rejected), 1);
    assert_eq!(result.failures.len(), 1);
    assert!(result.failures[0].reason.contains("below minimum resolution"));

    // Output names are fixed-width, sequential, and gapless: three items
    // went through rename, two survived to packaging.
    let mut names: Vec<String> = fs::read_dir(&options.output_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".webp"))
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    for name in &names {
        assert!(
            ["img000001.webp", "img000002.webp", "img000003.webp"].contains(&name.as_str()),
            "unexpected output name {name}"
        );
    }

    // Packaged files decode back to images at or above the threshold.
    for name in &names {
        let bytes = fs::read(options.output_dir.join(name)).unwrap();
        let attrs = codec.probe(&bytes).unwrap();
        assert!(attrs.width.min(attrs.height) >= 50);
    }

    // Manifest lists exactly the packaged survivors.
    let manifest: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(options.output_dir.join("package-manifest.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest.as_array().unwrap().len(), 2);

    // Spool cleaned up after a completed run.
    let run_id = derive_run_id(&options.source, &test_config());
    assert!(!options.work_dir.join(&run_id).exists());
}

#[test]
fn cancelled_run_resumes_to_completion() {
    let tmp = TempDir::new().unwrap();
    let source_dir = tmp.path().join("source");
    fs::create_dir(&source_dir).unwrap();
    write_png(&source_dir, "a.png", 60, 60);
    write_png(&source_dir, "b.png", 70, 70);

    let codec = ImageCodec::new();
    let source = DirectorySource;
    let options = run_options(&tmp, &source_dir);
    let packager = DirPackager::new(&options.output_dir);

    // First invocation is cancelled before any item is dispatched.
    let orchestrator =
        PipelineOrchestrator::new(test_config(), &source, &codec, NoNetwork, &packager);
    orchestrator.cancel_token().cancel();
    let interrupted = orchestrator.run(&options).unwrap();
    assert!(!interrupted.completed);
    assert_eq!(interrupted.count(ItemStatus::Packaged), 0);

    // Same command again: picks up the checkpoint and finishes.
    let orchestrator =
        PipelineOrchestrator::new(test_config(), &source, &codec, NoNetwork, &packager);
    let resumed = orchestrator.run(&options).unwrap();
    assert!(resumed.completed);
    assert_eq!(resumed.count(ItemStatus::Packaged), 2);
    assert!(options.output_dir.join("package-manifest.json").exists());
}

#[test]
fn jpeg_output_format_respected() {
    let tmp = TempDir::new().unwrap();
    let source_dir = tmp.path().join("source");
    fs::create_dir(&source_dir).unwrap();
    write_png(&source_dir, "a.png", 64, 64);

    let mut config = test_config();
    config.output_format = pixelsieve::config::OutputFormat::Jpeg;
    config.quality = 80;

    let codec = ImageCodec::new();
    let source = DirectorySource;
    let options = run_options(&tmp, &source_dir);
    let packager = DirPackager::new(&options.output_dir);

    let orchestrator =
        PipelineOrchestrator::new(config, &source, &codec, NoNetwork, &packager);
    let result = orchestrator.run(&options).unwrap();
    assert_eq!(result.count(ItemStatus::Packaged), 1);

    let bytes = fs::read(options.output_dir.join("img000001.jpg")).unwrap();
    let attrs = codec.probe(&bytes).unwrap();
    assert_eq!(attrs.format, "jpeg");
    assert_eq!((attrs.width, attrs.height), (64, 64));
}
