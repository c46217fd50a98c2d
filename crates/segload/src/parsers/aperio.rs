use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use super::Decoded;
use crate::error::{LoaderError, Result};
use crate::features::{parse_number, FeatureMapper};
use crate::geometry;
use crate::types::PolygonRecord;

/// `Region` attributes carried over as features.
const REGION_FEATURES: [&str; 4] = ["Area", "AreaMicrons", "Length", "LengthMicrons"];

/// Aperio ImageScope annotation files: every `Region` with its `Vertex`
/// children becomes one polygon.
#[derive(Debug, Clone)]
pub struct AperioParser {
    simplify: Option<f64>,
}

impl AperioParser {
    pub fn new(simplify: Option<f64>) -> Self {
        Self { simplify }
    }

    pub fn decode(&self, path: &Path) -> Result<Decoded> {
        let text = std::fs::read_to_string(path)?;
        let mut records = parse_regions(&text).map_err(|reason| LoaderError::parse(path, reason))?;

        if let Some(tolerance) = self.simplify {
            for record in &mut records {
                record.points = geometry::simplify(&record.points, tolerance);
            }
        }
        debug!(path = %path.display(), regions = records.len(), "parsed aperio markup");
        Ok(Decoded { records, raster: None })
    }
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> std::result::Result<Option<String>, String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.as_ref() == key {
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn region_start(element: &BytesStart<'_>) -> std::result::Result<PolygonRecord, String> {
    let mut mapper = FeatureMapper::new();
    let mut area = None;
    for name in REGION_FEATURES {
        if let Some(raw) = attribute(element, name.as_bytes())? {
            let value = mapper.insert_raw(name, &raw);
            if name == "Area" {
                area = value;
            }
        }
    }
    Ok(PolygonRecord { points: Vec::new(), features: mapper.finish(), area })
}

fn vertex(element: &BytesStart<'_>) -> std::result::Result<Option<[f64; 2]>, String> {
    let x = attribute(element, b"X")?.as_deref().and_then(parse_number);
    let y = attribute(element, b"Y")?.as_deref().and_then(parse_number);
    Ok(x.zip(y).map(|(x, y)| [x, y]))
}

fn parse_regions(text: &str) -> std::result::Result<Vec<PolygonRecord>, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut current: Option<PolygonRecord> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"Region" => {
                current = Some(region_start(&e)?);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"Region" => {
                records.push(region_start(&e)?);
            }
            Ok(Event::Start(e) | Event::Empty(e)) if e.name().as_ref() == b"Vertex" => {
                let Some(region) = current.as_mut() else {
                    continue;
                };
                match vertex(&e)? {
                    Some(point) => region.points.push(point),
                    None => warn!(
                        position = reader.buffer_position(),
                        "skipping vertex without numeric X/Y"
                    ),
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"Region" => {
                if let Some(region) = current.take() {
                    records.push(region);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "malformed XML at position {}: {e}",
                    reader.error_position()
                ));
            }
        }
    }

    if current.is_some() {
        return Err("unterminated Region element".into());
    }
    Ok(records)
}
