//! Short human readable descriptions of clipboard contents.

use crate::clipboard::{formats, ClipboardFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Maximum number of characters kept in a text preview.
pub const PREVIEW_LENGTH: usize = 60;

const UNKNOWN: &str = "Unknown";
const DROPFILES_HEADER_LEN: usize = 20;

/// Coarse kind of content, used by the UI to pick an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconCategory {
    Html,
    RichText,
    Text,
    Audio,
    Image,
    FileDrop,
    Unknown,
}

fn find<'a>(formats: &'a [ClipboardFormat], name: &str) -> Option<&'a ClipboardFormat> {
    formats.iter().find(|f| f.name == name && !f.data.is_empty())
}

fn has(formats: &[ClipboardFormat], name: &str) -> bool {
    find(formats, name).is_some()
}

pub fn icon_category(formats: &[ClipboardFormat]) -> IconCategory {
    if has(formats, formats::HTML) {
        IconCategory::Html
    } else if has(formats, formats::RTF) {
        IconCategory::RichText
    } else if plain_text(formats).is_some() {
        IconCategory::Text
    } else if has(formats, formats::WAVE_AUDIO) || has(formats, formats::RIFF_AUDIO) {
        IconCategory::Audio
    } else if has(formats, formats::DIB)
        || has(formats, formats::DIB_V5)
        || has(formats, formats::PNG)
        || has(formats, formats::BITMAP)
    {
        IconCategory::Image
    } else if has(formats, formats::FILE_DROP) {
        IconCategory::FileDrop
    } else {
        IconCategory::Unknown
    }
}

/// Build the preview string for a set of formats.
pub fn describe(formats: &[ClipboardFormat]) -> String {
    match icon_category(formats) {
        IconCategory::Html | IconCategory::RichText | IconCategory::Text => text_preview(formats)
            .map(|text| truncate(&text))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        IconCategory::Audio => {
            let len = find(formats, formats::WAVE_AUDIO)
                .or_else(|| find(formats, formats::RIFF_AUDIO))
                .map(|f| f.data.len())
                .unwrap_or(0);
            format!("Audio clip ({len} bytes)")
        }
        IconCategory::Image => image_preview(formats).unwrap_or_else(|| "Image".to_string()),
        IconCategory::FileDrop => find(formats, formats::FILE_DROP)
            .map(|f| truncate(&parse_file_drop(&f.data).join(", ")))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        IconCategory::Unknown => UNKNOWN.to_string(),
    }
}

fn text_preview(formats: &[ClipboardFormat]) -> Option<String> {
    plain_text(formats)
        .or_else(|| find(formats, formats::HTML).map(|f| html_to_text(&nul_terminated(&f.data))))
        .or_else(|| find(formats, formats::RTF).map(|f| rtf_to_text(&nul_terminated(&f.data))))
}

fn plain_text(formats: &[ClipboardFormat]) -> Option<String> {
    if let Some(f) = find(formats, formats::UNICODE_TEXT) {
        return Some(decode_unicode_text(&f.data));
    }
    find(formats, formats::TEXT)
        .or_else(|| find(formats, formats::OEM_TEXT))
        .map(|f| nul_terminated(&f.data))
}

/// Decode `CF_UNICODETEXT` data: UTF-16LE up to the first NUL.
pub fn decode_unicode_text(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

fn nul_terminated(data: &[u8]) -> String {
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Flatten line breaks to spaces and cut to [`PREVIEW_LENGTH`] characters.
pub fn truncate(text: &str) -> String {
    let flat = text.replace("\r\n", " ").replace(['\r', '\n'], " ");
    let flat = flat.trim();
    if flat.chars().count() > PREVIEW_LENGTH {
        let cut: String = flat.chars().take(PREVIEW_LENGTH).collect();
        format!("{cut}...")
    } else {
        flat.to_string()
    }
}

fn html_to_text(html: &str) -> String {
    let fragment = match (html.find("<!--StartFragment-->"), html.find("<!--EndFragment-->")) {
        (Some(start), Some(end)) if end > start => &html[start + "<!--StartFragment-->".len()..end],
        _ => html,
    };
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn rtf_to_text(rtf: &str) -> String {
    let mut out = String::new();
    let mut chars = rtf.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' | '}' => {}
            '\\' => match chars.peek() {
                Some('\\') | Some('{') | Some('}') => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                _ => {
                    while matches!(chars.peek(), Some(c) if c.is_ascii_alphanumeric() || *c == '-')
                    {
                        chars.next();
                    }
                    if chars.peek() == Some(&' ') {
                        chars.next();
                    }
                }
            },
            _ => out.push(c),
        }
    }
    out
}

fn image_preview(formats: &[ClipboardFormat]) -> Option<String> {
    if let Some(f) = find(formats, formats::DIB).or_else(|| find(formats, formats::DIB_V5)) {
        return dib_preview(&f.data);
    }
    let png = find(formats, formats::PNG)?;
    let (width, height) = image::io::Reader::new(Cursor::new(&png.data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some(format!("Image {width}x{height}"))
}

fn read_i32(data: &[u8], offset: usize) -> Option<i32> {
    data.get(offset..offset + 4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Describe a packed DIB from its `BITMAPINFOHEADER`.
fn dib_preview(data: &[u8]) -> Option<String> {
    let width = read_i32(data, 4)?;
    let height = read_i32(data, 8)?.unsigned_abs();
    let bits = data.get(14..16).map(|b| u16::from_le_bytes([b[0], b[1]]))?;
    let x_ppm = read_i32(data, 24).unwrap_or(0);
    let y_ppm = read_i32(data, 28).unwrap_or(0);
    let mut text = format!("Image {width}x{height}, {bits}-bit");
    if x_ppm > 0 && y_ppm > 0 {
        let dpi = |ppm: i32| (f64::from(ppm) * 0.0254).round() as i64;
        text.push_str(&format!(", {}x{} DPI", dpi(x_ppm), dpi(y_ppm)));
    }
    Some(text)
}

/// Parse a `CF_HDROP` (`DROPFILES`) payload into its paths.
pub fn parse_file_drop(data: &[u8]) -> Vec<String> {
    let Some(offset) = read_u32(data, 0).map(|o| o as usize) else {
        return Vec::new();
    };
    let wide = read_u32(data, 16).unwrap_or(0) != 0;
    let Some(list) = data.get(offset..) else {
        return Vec::new();
    };

    if wide {
        let units: Vec<u16> = list
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        units
            .split(|unit| *unit == 0)
            .take_while(|path| !path.is_empty())
            .map(String::from_utf16_lossy)
            .collect()
    } else {
        list.split(|b| *b == 0)
            .take_while(|path| !path.is_empty())
            .map(|path| String::from_utf8_lossy(path).into_owned())
            .collect()
    }
}

/// Build a wide-character `DROPFILES` payload for `paths`.
pub fn encode_file_drop<S: AsRef<str>>(paths: &[S]) -> Vec<u8> {
    let mut data = vec![0u8; DROPFILES_HEADER_LEN];
    data[0..4].copy_from_slice(&(DROPFILES_HEADER_LEN as u32).to_le_bytes());
    data[16..20].copy_from_slice(&1u32.to_le_bytes());
    for path in paths {
        for unit in path.as_ref().encode_utf16().chain(std::iter::once(0)) {
            data.extend_from_slice(&unit.to_le_bytes());
        }
    }
    data.extend_from_slice(&0u16.to_le_bytes());
    data
}
