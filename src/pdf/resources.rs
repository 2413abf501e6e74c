//! Page contents and resources: fonts, soft-masked images, graphics states
//!
//! Everything added here lives under `Wm`-prefixed resource names so it can
//! not collide with the names the page already uses.

use std::collections::BTreeMap;

use image::RgbaImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::geometry::{inherited, resolve, resolve_dict};
use crate::error::Result;
use crate::fonts::{FontClass, CJK_FONT_FAMILY};

/// Resources one page needs for its watermark content
#[derive(Debug, Default, Clone)]
pub struct ResourceSet {
    pub xobjects: BTreeMap<String, ObjectId>,
    pub fonts: BTreeMap<String, ObjectId>,
    pub ext_gstates: BTreeMap<String, ObjectId>,
}

impl ResourceSet {
    pub fn is_empty(&self) -> bool {
        self.xobjects.is_empty() && self.fonts.is_empty() && self.ext_gstates.is_empty()
    }
}

/// PDF base font used to draw a font class
pub fn base_font(class: FontClass) -> &'static str {
    match class {
        FontClass::Sans => "Helvetica",
        FontClass::Serif => "Times-Roman",
        FontClass::Mono => "Courier",
        FontClass::Cjk => CJK_FONT_FAMILY,
    }
}

/// Add the font object for a class: a standard Type1 font, or the
/// predefined Chinese CID font for CJK text
pub fn add_font(doc: &mut Document, class: FontClass) -> ObjectId {
    match class {
        FontClass::Cjk => add_cjk_font(doc),
        other => add_standard_font(doc, base_font(other)),
    }
}

/// One of the 14 standard PDF fonts with WinAnsiEncoding
fn add_standard_font(doc: &mut Document, name: &str) -> ObjectId {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(name.as_bytes().to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    doc.add_object(Object::Dictionary(font))
}

/// STSong-Light via UniGB-UCS2-H: strings are UCS-2 big-endian
fn add_cjk_font(doc: &mut Document) -> ObjectId {
    let name = CJK_FONT_FAMILY.as_bytes().to_vec();

    let mut descriptor = Dictionary::new();
    descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
    descriptor.set("FontName", Object::Name(name.clone()));
    descriptor.set("Flags", Object::Integer(6));
    descriptor.set(
        "FontBBox",
        Object::Array(vec![
            Object::Integer(-25),
            Object::Integer(-254),
            Object::Integer(1000),
            Object::Integer(880),
        ]),
    );
    descriptor.set("ItalicAngle", Object::Integer(0));
    descriptor.set("Ascent", Object::Integer(880));
    descriptor.set("Descent", Object::Integer(-120));
    descriptor.set("CapHeight", Object::Integer(880));
    descriptor.set("StemV", Object::Integer(93));
    let descriptor_id = doc.add_object(Object::Dictionary(descriptor));

    let mut system_info = Dictionary::new();
    system_info.set("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal));
    system_info.set("Ordering", Object::String(b"GB1".to_vec(), StringFormat::Literal));
    system_info.set("Supplement", Object::Integer(2));

    let mut cid_font = Dictionary::new();
    cid_font.set("Type", Object::Name(b"Font".to_vec()));
    cid_font.set("Subtype", Object::Name(b"CIDFontType0".to_vec()));
    cid_font.set("BaseFont", Object::Name(name.clone()));
    cid_font.set("CIDSystemInfo", Object::Dictionary(system_info));
    cid_font.set("FontDescriptor", Object::Reference(descriptor_id));
    cid_font.set("DW", Object::Integer(1000));
    // Half-width Latin range of Adobe-GB1
    cid_font.set(
        "W",
        Object::Array(vec![
            Object::Integer(1),
            Object::Integer(95),
            Object::Integer(500),
        ]),
    );
    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type0".to_vec()));
    font.set("BaseFont", Object::Name(name));
    font.set("Encoding", Object::Name(b"UniGB-UCS2-H".to_vec()));
    font.set(
        "DescendantFonts",
        Object::Array(vec![Object::Reference(cid_font_id)]),
    );
    doc.add_object(Object::Dictionary(font))
}

/// Graphics state with constant fill and stroke alpha
pub fn add_opacity_state(doc: &mut Document, opacity: f64) -> ObjectId {
    let mut state = Dictionary::new();
    state.set("Type", Object::Name(b"ExtGState".to_vec()));
    state.set("ca", Object::Real(opacity as f32));
    state.set("CA", Object::Real(opacity as f32));
    doc.add_object(Object::Dictionary(state))
}

/// Embed an RGBA bitmap as an RGB image XObject with a DeviceGray soft mask
///
/// Fully opaque bitmaps get no mask.
pub fn add_image_xobject(doc: &mut Document, bitmap: &RgbaImage) -> ObjectId {
    let (width, height) = bitmap.dimensions();
    let pixels = width as usize * height as usize;
    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut alpha = Vec::with_capacity(pixels);
    for pixel in bitmap.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let soft_mask = if alpha.iter().any(|&a| a != u8::MAX) {
        let dict = image_dict(width, height, b"DeviceGray");
        Some(doc.add_object(Stream::new(dict, alpha)))
    } else {
        None
    };

    let mut dict = image_dict(width, height, b"DeviceRGB");
    if let Some(mask_id) = soft_mask {
        dict.set("SMask", Object::Reference(mask_id));
    }
    doc.add_object(Stream::new(dict, rgb))
}

fn image_dict(width: u32, height: u32, color_space: &[u8]) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict
}

/// Encode text for a font class as a hex string operand
///
/// Standard fonts take WinAnsi bytes; the CJK font takes UCS-2. Characters
/// the encoding cannot represent become `?`.
pub fn encode_text(text: &str, class: FontClass) -> String {
    let bytes: Vec<u8> = match class {
        FontClass::Cjk => text
            .chars()
            .flat_map(|c| {
                let unit = u16::try_from(c as u32).unwrap_or(b'?' as u16);
                unit.to_be_bytes()
            })
            .collect(),
        _ => text.chars().map(win_ansi_byte).collect(),
    };

    let mut hex = String::with_capacity(bytes.len() * 2 + 2);
    hex.push('<');
    for byte in bytes {
        hex.push_str(&format!("{:02X}", byte));
    }
    hex.push('>');
    hex
}

fn win_ansi_byte(c: char) -> u8 {
    match c {
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '€' => 0x80,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        _ => b'?',
    }
}

/// Isolate the page's existing content in its own graphics state
///
/// Adds a `q` stream before and a `Q` stream after the current contents, so
/// whatever CTM or state the page leaves behind cannot leak into content
/// appended later.
pub fn isolate_page_content(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let close_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
    prepend_content_to_page(doc, page_id, open_id)?;
    append_content_to_page(doc, page_id, close_id)
}

/// Existing Contents as a list of stream references
fn page_contents(doc: &Document, page_dict: &Dictionary) -> Vec<Object> {
    match page_dict.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // Contents may point at an array object rather than a stream
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Prepend a content stream to a page's Contents
pub fn prepend_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut contents = page_contents(doc, doc.get_dictionary(page_id)?);
    contents.insert(0, Object::Reference(new_content_id));
    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Append a content stream to a page's Contents, drawn on top of the page
pub fn append_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut contents = page_contents(doc, doc.get_dictionary(page_id)?);
    contents.push(Object::Reference(new_content_id));
    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Merge `additions` into the page's (possibly inherited) Resources
///
/// The merged dictionary is set directly on the page, so an inherited or
/// shared Resources object is never modified for other pages.
pub fn add_resources_to_page(doc: &mut Document, page_id: ObjectId, additions: &ResourceSet) -> Result<()> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .map(|o| resolve_dict(doc, &o))
        .unwrap_or_else(Dictionary::new);

    for (category, entries) in [
        (&b"XObject"[..], &additions.xobjects),
        (&b"Font"[..], &additions.fonts),
        (&b"ExtGState"[..], &additions.ext_gstates),
    ] {
        if entries.is_empty() {
            continue;
        }
        let mut sub = match resources.get(category) {
            Ok(object) => match resolve(doc, object) {
                Object::Dictionary(dict) => dict,
                _ => Dictionary::new(),
            },
            Err(_) => Dictionary::new(),
        };
        for (name, id) in entries {
            sub.set(name.as_bytes().to_vec(), Object::Reference(*id));
        }
        resources.set(category.to_vec(), Object::Dictionary(sub));
    }

    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use lopdf::dictionary;

    fn page_with_shared_resources() -> (Document, ObjectId, ObjectId) {
        let mut doc = Document::with_version("1.7");
        let font_id = add_standard_font(&mut doc, "Helvetica");
        let shared_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"BT ET".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Resources" => shared_id,
            "Contents" => content_id,
        });
        (doc, page_id, shared_id)
    }

    #[test]
    fn test_resources_merge_keeps_existing_entries() {
        let (mut doc, page_id, shared_id) = page_with_shared_resources();
        let image_id = add_image_xobject(&mut doc, &RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255])));

        let mut additions = ResourceSet::default();
        additions.xobjects.insert("WmIm0".to_string(), image_id);
        add_resources_to_page(&mut doc, page_id, &additions).unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(resources.get(b"Font").unwrap().as_dict().unwrap().has(b"F1"));
        assert!(resources.get(b"XObject").unwrap().as_dict().unwrap().has(b"WmIm0"));

        // The shared dictionary itself is untouched
        assert!(!doc.get_dictionary(shared_id).unwrap().has(b"XObject"));
    }

    #[test]
    fn test_isolation_wraps_existing_stream() {
        let (mut doc, page_id, _) = page_with_shared_resources();
        isolate_page_content(&mut doc, page_id).unwrap();

        let contents = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(contents.len(), 3);

        let first = doc.get_object(contents[0].as_reference().unwrap()).unwrap();
        assert_eq!(first.as_stream().unwrap().content, b"q\n");
        let last = doc.get_object(contents[2].as_reference().unwrap()).unwrap();
        assert_eq!(last.as_stream().unwrap().content, b"\nQ\n");
    }

    #[test]
    fn test_soft_mask_only_when_needed() {
        let mut doc = Document::with_version("1.7");
        let opaque = add_image_xobject(&mut doc, &RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255])));
        let stream = doc.get_object(opaque).unwrap().as_stream().unwrap();
        assert!(!stream.dict.has(b"SMask"));
        assert_eq!(stream.content.len(), 12);

        let translucent = add_image_xobject(&mut doc, &RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 128])));
        let stream = doc.get_object(translucent).unwrap().as_stream().unwrap();
        let mask_id = stream.dict.get(b"SMask").unwrap().as_reference().unwrap();
        let mask = doc.get_object(mask_id).unwrap().as_stream().unwrap();
        assert_eq!(mask.content, vec![128u8; 4]);
    }

    #[test]
    fn test_text_encoding() {
        assert_eq!(encode_text("Hi!", FontClass::Sans), "<486921>");
        assert_eq!(encode_text("é€", FontClass::Serif), "<E980>");
        assert_eq!(encode_text("中", FontClass::Sans), "<3F>");
        assert_eq!(encode_text("中A", FontClass::Cjk), "<4E2D0041>");
        assert_eq!(encode_text("😀", FontClass::Cjk), "<003F>");
    }

    #[test]
    fn test_cjk_font_structure() {
        let mut doc = Document::with_version("1.7");
        let font_id = add_font(&mut doc, FontClass::Cjk);
        let font = doc.get_dictionary(font_id).unwrap();
        assert_eq!(font.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
        assert_eq!(font.get(b"Encoding").unwrap().as_name().unwrap(), b"UniGB-UCS2-H");
        assert_eq!(base_font(FontClass::Mono), "Courier");
    }
}
