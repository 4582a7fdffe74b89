#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A small gradient so encoders have something other than flat colour.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 13 % 256) as u8, (y * 7 % 256) as u8, 96])
    }))
}

pub fn create_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    gradient(width, height)
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();
    path
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    gradient(width, height)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

pub fn create_test_image_files(dir: &Path) -> Vec<PathBuf> {
    vec![
        create_png(dir, "first.png", 20, 10),
        create_png(dir, "second.png", 12, 12),
        create_png(dir, "third.png", 8, 16),
    ]
}

pub fn create_nested_directory_structure(dir: &Path) -> PathBuf {
    let subdir = dir.join("subdir");
    std::fs::create_dir(&subdir).unwrap();
    create_png(&subdir, "nested.png", 6, 6);
    std::fs::write(subdir.join("nested.txt"), b"not an image").unwrap();
    subdir
}

pub fn create_temp_directory() -> TempDir {
    TempDir::new().unwrap()
}
