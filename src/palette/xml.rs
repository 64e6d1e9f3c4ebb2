//! Palette file format.
//!
//! ```xml
//! <palette version="1.0">
//!   <shortName>grey</shortName>
//!   <longName>Greyscale</longName>
//!   <description>black to white</description>
//!   <colors colorCount="256" reversed="false">
//!     <gradientPoint position="0">0,0,0</gradientPoint>
//!     <gradientPoint position="1">255,255,255</gradientPoint>
//!   </colors>
//! </palette>
//! ```
//!
//! Plain palettes list `<color>r,g,b</color>` elements instead and omit
//! `colorCount`. A plain palette stores its colours in their current
//! (possibly reversed) order; a gradient palette stores the gradient and is
//! reversed again after loading.

use super::{ColorGradient, GradientPoint, Palette};
use crate::color::Rgba;
use crate::error::{Error, Result};
use log::{debug, warn};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs;
use std::path::{Path, PathBuf};

const FORMAT_VERSION: &str = "1.0";

impl Palette {
    /// Serialize to the palette XML format.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("palette");
        root.push_attribute(("version", FORMAT_VERSION));
        writer.write_event(Event::Start(root))?;

        write_text_element(&mut writer, "shortName", &self.short_name)?;
        write_text_element(&mut writer, "longName", &self.name)?;
        write_text_element(&mut writer, "description", &self.description)?;

        let mut colors = BytesStart::new("colors");
        let count = self.colours.len().to_string();
        if self.gradient.is_some() {
            colors.push_attribute(("colorCount", count.as_str()));
        }
        colors.push_attribute(("reversed", if self.reversed { "true" } else { "false" }));
        writer.write_event(Event::Start(colors))?;

        match &self.gradient {
            Some(gradient) => {
                for point in gradient.points() {
                    let mut el = BytesStart::new("gradientPoint");
                    let position = point.position.to_string();
                    el.push_attribute(("position", position.as_str()));
                    writer.write_event(Event::Start(el))?;
                    writer.write_event(Event::Text(BytesText::new(&point.colour.to_triplet())))?;
                    writer.write_event(Event::End(BytesEnd::new("gradientPoint")))?;
                }
            }
            None => {
                for colour in &self.colours {
                    write_text_element(&mut writer, "color", &colour.to_triplet())?;
                }
            }
        }

        writer.write_event(Event::End(BytesEnd::new("colors")))?;
        writer.write_event(Event::End(BytesEnd::new("palette")))?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| Error::PaletteFormat(format!("writer produced invalid UTF-8: {e}")))
    }

    /// Parse a palette from its XML form.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut doc = PaletteDocument::default();
        let mut field: Option<Field> = None;
        let mut text = String::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    text.clear();
                    field = doc.open(&e)?;
                }
                Event::Empty(e) => {
                    text.clear();
                    if let Some(f) = doc.open(&e)? {
                        doc.close(f, "")?;
                    }
                }
                Event::Text(t) => {
                    if field.is_some() {
                        text.push_str(&t.unescape()?);
                    }
                }
                Event::End(_) => {
                    if let Some(f) = field.take() {
                        doc.close(f, text.trim())?;
                    }
                    text.clear();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        doc.into_palette()
    }

    /// Write the XML form to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_xml()?)?;
        Ok(())
    }

    /// Read a palette file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_xml(&fs::read_to_string(path)?)
    }
}

/// Load every `*.xml` palette in `dir`, in file-name order.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_palette_dir(dir: impl AsRef<Path>) -> Result<Vec<Palette>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        })
        .collect();
    paths.sort();

    let mut palettes = Vec::with_capacity(paths.len());
    for path in paths {
        match Palette::load(&path) {
            Ok(palette) => {
                debug!("loaded palette '{}' from {}", palette.short_name(), path.display());
                palettes.push(palette);
            }
            Err(e) => warn!("skipping palette file {}: {e}", path.display()),
        }
    }
    Ok(palettes)
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, Copy)]
enum Field {
    ShortName,
    LongName,
    Description,
    Color,
    GradientPoint(f64),
}

#[derive(Debug, Default)]
struct PaletteDocument {
    seen_root: bool,
    short_name: Option<String>,
    long_name: Option<String>,
    description: String,
    colour_count: Option<usize>,
    reversed: bool,
    colours: Vec<Rgba>,
    points: Vec<GradientPoint>,
}

impl PaletteDocument {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<Option<Field>> {
        let field = match e.name().as_ref() {
            b"palette" => {
                let version = attribute(e, b"version")?.unwrap_or_default();
                if version != FORMAT_VERSION {
                    return Err(Error::PaletteFormat(format!(
                        "unsupported palette version '{version}'"
                    )));
                }
                self.seen_root = true;
                None
            }
            b"shortName" => Some(Field::ShortName),
            b"longName" => Some(Field::LongName),
            b"description" => Some(Field::Description),
            b"colors" => {
                if let Some(count) = attribute(e, b"colorCount")? {
                    let n = count.trim().parse::<usize>().map_err(|err| {
                        Error::PaletteFormat(format!("bad colorCount '{count}': {err}"))
                    })?;
                    self.colour_count = Some(n);
                }
                self.reversed = attribute(e, b"reversed")?
                    .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
                None
            }
            b"color" => Some(Field::Color),
            b"gradientPoint" => {
                let raw = attribute(e, b"position")?.ok_or_else(|| {
                    Error::PaletteFormat("gradientPoint without position".to_string())
                })?;
                let position = raw.trim().parse::<f64>().map_err(|err| {
                    Error::PaletteFormat(format!("bad gradient position '{raw}': {err}"))
                })?;
                Some(Field::GradientPoint(position))
            }
            _ => None,
        };
        Ok(field)
    }

    fn close(&mut self, field: Field, text: &str) -> Result<()> {
        match field {
            Field::ShortName => self.short_name = Some(text.to_string()),
            Field::LongName => self.long_name = Some(text.to_string()),
            Field::Description => self.description = text.to_string(),
            Field::Color => self.colours.push(Rgba::parse_triplet(text)?),
            Field::GradientPoint(position) => self
                .points
                .push(GradientPoint::new(position, Rgba::parse_triplet(text)?)),
        }
        Ok(())
    }

    fn into_palette(self) -> Result<Palette> {
        if !self.seen_root {
            return Err(Error::PaletteFormat("missing <palette> root element".to_string()));
        }
        let short_name = self
            .short_name
            .ok_or_else(|| Error::PaletteFormat("missing <shortName>".to_string()))?;
        let long_name = self.long_name.unwrap_or_else(|| short_name.clone());

        match self.colour_count {
            Some(count) => {
                let gradient = ColorGradient::new(self.points)?;
                let mut palette = Palette::from_gradient(
                    &short_name,
                    &long_name,
                    &self.description,
                    gradient,
                    count,
                )?;
                if self.reversed {
                    palette.reverse();
                }
                Ok(palette)
            }
            None => {
                let mut palette =
                    Palette::new(&short_name, &long_name, &self.description, self.colours)?;
                palette.reversed = self.reversed;
                Ok(palette)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::GradientFactory;

    #[test]
    fn test_plain_palette_round_trip() {
        let mut p = Palette::new(
            "traffic",
            "Traffic <lights>",
            "red & green",
            vec![Rgba::RED, Rgba::rgb(255, 200, 0), Rgba::GREEN],
        )
        .unwrap();
        p.reverse();
        let xml = p.to_xml().unwrap();
        assert!(xml.contains("<palette version=\"1.0\">"));
        assert!(xml.contains("reversed=\"true\""));
        let back = Palette::from_xml(&xml).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_gradient_palette_round_trip() {
        let mut p = GradientFactory::palette("matlab-jet", 64).unwrap();
        p.reverse();
        let xml = p.to_xml().unwrap();
        assert!(xml.contains("colorCount=\"64\""));
        assert!(xml.contains("<gradientPoint position=\"0.125\">"));
        let back = Palette::from_xml(&xml).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let xml = r#"<palette version="2.0"><shortName>x</shortName>
            <colors><color>1,2,3</color></colors></palette>"#;
        assert!(matches!(Palette::from_xml(xml), Err(Error::PaletteFormat(_))));
    }

    #[test]
    fn test_rejects_empty_colours() {
        let xml = r#"<palette version="1.0"><shortName>x</shortName><colors/></palette>"#;
        assert!(Palette::from_xml(xml).is_err());
    }

    #[test]
    fn test_rejects_bad_triplet() {
        let xml = r#"<palette version="1.0"><shortName>x</shortName>
            <colors><color>1,2</color></colors></palette>"#;
        assert!(Palette::from_xml(xml).is_err());
    }

    #[test]
    fn test_long_name_defaults_to_short_name() {
        let xml = r#"<palette version="1.0"><shortName>mono</shortName>
            <colors><color>9,9,9</color></colors></palette>"#;
        let p = Palette::from_xml(xml).unwrap();
        assert_eq!(p.name(), "mono");
        assert_eq!(p.colours(), &[Rgba::rgb(9, 9, 9)]);
    }

    #[test]
    fn test_load_palette_dir_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        GradientFactory::palette("grey", 16)
            .unwrap()
            .save(dir.path().join("a_grey.xml"))
            .unwrap();
        GradientFactory::palette("heat", 16)
            .unwrap()
            .save(dir.path().join("b_heat.xml"))
            .unwrap();
        fs::write(dir.path().join("c_broken.xml"), "<palette version=\"1.0\">").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = load_palette_dir(dir.path()).unwrap();
        let names: Vec<&str> = loaded.iter().map(Palette::short_name).collect();
        assert_eq!(names, vec!["grey", "heat"]);
    }
}
