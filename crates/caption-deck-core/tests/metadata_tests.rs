use std::fs::{self, File};
use std::io::{BufWriter, Cursor};
use std::path::Path;
use tempfile::tempdir;

use caption_deck_core::grid::ReviewGrid;
use caption_deck_core::metadata::{extract_prompt, read_text_fields};
use exif::experimental::Writer as ExifWriter;
use exif::{Field, In, Tag, Value};
use image::{ImageFormat, Rgb, RgbImage};

/// Write a 4x4 grey PNG carrying the given text chunks.
fn write_png_with_text(path: &Path, text: &[(&str, &str)], compressed: &[(&str, &str)]) {
    let writer = BufWriter::new(File::create(path).unwrap());
    let mut encoder = png::Encoder::new(writer, 4, 4);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    for (keyword, value) in text {
        encoder
            .add_text_chunk(keyword.to_string(), value.to_string())
            .unwrap();
    }
    for (keyword, value) in compressed {
        encoder
            .add_ztxt_chunk(keyword.to_string(), value.to_string())
            .unwrap();
    }
    let mut png_writer = encoder.write_header().unwrap();
    png_writer.write_image_data(&[128u8; 4 * 4 * 3]).unwrap();
}

const WORKFLOW: &str = r#"{
    "4": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "model.safetensors"}},
    "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "a lighthouse on a cliff at dawn", "clip": ["4", 1]}},
    "7": {"class_type": "CLIPTextEncode", "inputs": {"text": "lowres, watermark", "clip": ["4", 1]}},
    "9": {"class_type": "CLIPTextEncode", "inputs": {"text": "a lighthouse on a cliff at dawn", "clip": ["4", 1]}}
}"#;

#[test]
fn test_workflow_prompts_are_deduplicated() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("comfy.png");
    write_png_with_text(&path, &[("prompt", WORKFLOW)], &[]);

    assert_eq!(
        extract_prompt(&path).as_deref(),
        Some("a lighthouse on a cliff at dawn\nlowres, watermark")
    );
}

#[test]
fn test_parameters_first_line() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("a1111.png");
    write_png_with_text(
        &path,
        &[(
            "parameters",
            "portrait of a knight, oil painting\nNegative prompt: blurry\nSteps: 20, Sampler: Euler a",
        )],
        &[],
    );

    assert_eq!(
        extract_prompt(&path).as_deref(),
        Some("portrait of a knight, oil painting")
    );
}

#[test]
fn test_compressed_text_chunks_are_read() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("ztxt.png");
    write_png_with_text(&path, &[("Software", "test")], &[("Description", "  a foggy harbor  ")]);

    let fields = read_text_fields(&path).unwrap();
    assert_eq!(fields.get("Software").map(String::as_str), Some("test"));
    assert_eq!(extract_prompt(&path).as_deref(), Some("a foggy harbor"));
}

#[test]
fn test_plain_images_have_no_prompt() {
    let tmp = tempdir().unwrap();
    let png_path = tmp.path().join("plain.png");
    RgbImage::from_pixel(8, 8, Rgb([1, 1, 1])).save(&png_path).unwrap();
    assert_eq!(extract_prompt(&png_path), None);

    let jpg_path = tmp.path().join("plain.jpg");
    RgbImage::from_pixel(8, 8, Rgb([1, 1, 1])).save(&jpg_path).unwrap();
    assert_eq!(extract_prompt(&jpg_path), None);
}

#[test]
fn test_unreadable_files_yield_none() {
    let tmp = tempdir().unwrap();
    let garbage = tmp.path().join("garbage.png");
    fs::write(&garbage, b"definitely not a png").unwrap();
    assert_eq!(extract_prompt(&garbage), None);

    assert_eq!(extract_prompt(&tmp.path().join("missing.webp")), None);
}

#[test]
fn test_apply_extracted_prompt_saves_caption() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("comfy.png");
    write_png_with_text(&path, &[("prompt", WORKFLOW)], &[]);

    let mut grid = ReviewGrid::new();
    let prompt = grid.apply_extracted_prompt(&path).unwrap();
    assert!(prompt.is_some());
    assert_eq!(
        fs::read_to_string(tmp.path().join("comfy.txt")).unwrap(),
        "a lighthouse on a cliff at dawn\nlowres, watermark"
    );

    let plain = tmp.path().join("plain.png");
    RgbImage::from_pixel(2, 2, Rgb([0, 0, 0])).save(&plain).unwrap();
    assert_eq!(grid.apply_extracted_prompt(&plain).unwrap(), None);
    assert!(!tmp.path().join("plain.txt").exists());
}

/// UserComment payload: 8-byte character code followed by the text.
fn user_comment(code: &[u8; 8], body: &[u8]) -> Field {
    let mut bytes = code.to_vec();
    bytes.extend_from_slice(body);
    Field {
        tag: Tag::UserComment,
        ifd_num: In::PRIMARY,
        value: Value::Undefined(bytes, 0),
    }
}

fn image_description(text: &str) -> Field {
    Field {
        tag: Tag::ImageDescription,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![text.as_bytes().to_vec()]),
    }
}

fn utf16(text: &str, little_endian: bool) -> Vec<u8> {
    text.encode_utf16()
        .flat_map(|unit| {
            if little_endian {
                unit.to_le_bytes()
            } else {
                unit.to_be_bytes()
            }
        })
        .collect()
}

/// Write a small JPEG with an APP1 EXIF segment holding `fields`.
fn write_jpeg_with_exif(path: &Path, fields: &[Field], little_endian: bool) {
    let mut writer = ExifWriter::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, little_endian).unwrap();
    let tiff = tiff.into_inner();

    let mut jpeg = Cursor::new(Vec::new());
    RgbImage::from_pixel(8, 8, Rgb([90, 90, 90]))
        .write_to(&mut jpeg, ImageFormat::Jpeg)
        .unwrap();
    let jpeg = jpeg.into_inner();

    // SOI, then APP1 "Exif\0\0" + TIFF block, then the rest of the stream
    let segment_len = (2 + 6 + tiff.len()) as u16;
    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    fs::write(path, out).unwrap();
}

#[test]
fn test_exif_ascii_user_comment() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("ascii.jpg");
    let comment = user_comment(
        b"ASCII\0\0\0",
        b"a harbor at night, long exposure\nSteps: 25, Sampler: DPM++",
    );
    write_jpeg_with_exif(&path, &[comment], false);

    let fields = read_text_fields(&path).unwrap();
    assert!(fields.contains_key("parameters"));
    assert_eq!(
        extract_prompt(&path).as_deref(),
        Some("a harbor at night, long exposure")
    );
}

#[test]
fn test_exif_unicode_user_comment_both_byte_orders() {
    let tmp = tempdir().unwrap();
    for little_endian in [false, true] {
        let path = tmp.path().join(format!("unicode_{little_endian}.jpg"));
        let comment = user_comment(b"UNICODE\0", &utf16("a red barn", little_endian));
        write_jpeg_with_exif(&path, &[comment], little_endian);

        assert_eq!(extract_prompt(&path).as_deref(), Some("a red barn"));
    }
}

#[test]
fn test_exif_description_only() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("described.jpg");
    write_jpeg_with_exif(&path, &[image_description("  a foggy pier ")], true);

    let fields = read_text_fields(&path).unwrap();
    assert!(!fields.contains_key("parameters"));
    assert_eq!(extract_prompt(&path).as_deref(), Some("a foggy pier"));
}

#[test]
fn test_exif_blank_user_comment_falls_back_to_description() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("camera.jpg");
    write_jpeg_with_exif(
        &path,
        &[
            user_comment(b"ASCII\0\0\0", b""),
            image_description("  a foggy pier "),
        ],
        true,
    );
    assert_eq!(extract_prompt(&path).as_deref(), Some("a foggy pier"));

    let padded = tmp.path().join("padded.jpg");
    write_jpeg_with_exif(
        &padded,
        &[
            user_comment(&[0u8; 8], b"        "),
            image_description("lighthouse keeper"),
        ],
        false,
    );
    assert_eq!(extract_prompt(&padded).as_deref(), Some("lighthouse keeper"));
}
