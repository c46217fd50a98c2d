use std::path::Path;

use tracing::{debug, warn};

use super::Decoded;
use crate::error::{LoaderError, Result};
use crate::features::{parse_number, CsvLayout};
use crate::geometry;
use crate::types::{ImageMetadata, PointSequence, PolygonRecord};

/// Comma-separated feature tables: one polygon per row, the boundary as
/// interleaved coordinates running to the end of the row.
#[derive(Debug, Clone)]
pub struct CsvParser {
    layout: CsvLayout,
    simplify: Option<f64>,
}

/// Tables live in a folder named after the image, e.g.
/// `TCGA-AB-0001.svs/tile_12_34.csv`.
pub fn case_from_parent(path: &Path) -> Result<String> {
    path.parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|case_id| !case_id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LoaderError::parse(path, "cannot derive a case id from the parent folder"))
}

enum Row {
    Polygon(PolygonRecord),
    Skip(String),
}

impl CsvParser {
    pub fn new(layout: CsvLayout, simplify: Option<f64>) -> Self {
        Self { layout, simplify }
    }

    pub fn decode(&self, path: &Path, image: &ImageMetadata) -> Result<Decoded> {
        let text = std::fs::read_to_string(path)?;
        let mpp = image.mpp_x.zip(image.mpp_y);
        let mut records = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match self.parse_row(line, mpp) {
                Row::Polygon(record) => records.push(record),
                Row::Skip(reason) if line_no == 0 => {
                    debug!(path = %path.display(), %reason, "treating first row as header");
                }
                Row::Skip(reason) => {
                    warn!(path = %path.display(), line = line_no + 1, %reason, "skipping row");
                }
            }
        }

        debug!(path = %path.display(), layout = self.layout.version, rows = records.len(), "parsed csv");
        Ok(Decoded { records, raster: None })
    }

    fn parse_row(&self, line: &str, mpp: Option<(f64, f64)>) -> Row {
        // trailing empty fields carry nothing
        let fields: Vec<&str> = line.trim_end().trim_end_matches(',').split(',').collect();
        if fields.len() < self.layout.points_start {
            return Row::Skip(format!(
                "expected at least {} fields, found {}",
                self.layout.points_start,
                fields.len()
            ));
        }

        let coordinates: Option<Vec<f64>> = fields[self.layout.points_start..]
            .iter()
            .map(|raw| parse_number(raw))
            .collect();
        let Some(coordinates) = coordinates else {
            return Row::Skip("boundary holds a non-numeric coordinate".into());
        };
        if coordinates.len() % 2 != 0 {
            return Row::Skip("boundary has an odd number of coordinates".into());
        }

        let mut points: PointSequence = coordinates.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
        if let Some(tolerance) = self.simplify {
            points = geometry::simplify(&points, tolerance);
        }

        let (features, area) = self.layout.map_features(&fields, mpp);
        Row::Polygon(PolygonRecord { points, features, area })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn row(area: &str, boundary: &str) -> String {
        let mut fields: Vec<String> = (0..21).map(|i| i.to_string()).collect();
        fields[7] = "bad".into();
        fields.push(area.into());
        fields.push(boundary.into());
        fields.join(",")
    }

    #[test]
    fn test_case_comes_from_parent_folder() {
        let path = Path::new("/results/TCGA-AB-0001.svs/part_1.csv");
        assert_eq!(case_from_parent(path).unwrap(), "TCGA-AB-0001");
        assert!(case_from_parent(Path::new("loose.csv")).is_err());
    }

    #[test]
    fn test_decode_skips_header_and_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "MinX,MinY,MaxX,MaxY,NumberOfPixels,PhysicalSize,x,y").unwrap();
        writeln!(file, "{}", row("64", "0,0,8,0,8,8,0,8")).unwrap();
        writeln!(file, "{}", row("64", "0,0,8")).unwrap();
        writeln!(file, "1,2,3").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{}", row("12.5", "1,1,2,1,2,2")).unwrap();

        let mut image = ImageMetadata::new("TCGA-AB-0001", "TCGA-AB-0001");
        image.mpp_x = Some(0.5);
        image.mpp_y = Some(0.5);
        let decoded = CsvParser::new(CsvLayout::V1, None).decode(&path, &image).unwrap();

        assert_eq!(decoded.records.len(), 2);
        let first = &decoded.records[0];
        assert_eq!(first.points, vec![[0.0, 0.0], [8.0, 0.0], [8.0, 8.0], [0.0, 8.0]]);
        assert_eq!(first.area, Some(64.0));
        assert_eq!(first.features.get("PhysicalSize"), Some(&1.25));
        assert!(!first.features.contains_key("FeretDiameter"));
        assert_eq!(decoded.records[1].area, Some(12.5));
        assert!(decoded.raster.is_none());
    }

    #[test]
    fn test_rows_ending_in_a_comma_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{},", row("16", "0,0,4,0,4,4,0,4")).unwrap();
        writeln!(file, "{},,", row("4", "1,1,3,1,3,3")).unwrap();

        let image = ImageMetadata::new("TCGA-AB-0002", "TCGA-AB-0002");
        let decoded = CsvParser::new(CsvLayout::V1, None).decode(&path, &image).unwrap();
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.records[0].points.len(), 4);
        assert_eq!(decoded.records[1].points, vec![[1.0, 1.0], [3.0, 1.0], [3.0, 3.0]]);
    }

    #[test]
    fn test_row_without_boundary_keeps_features() {
        let parser = CsvParser::new(CsvLayout::V1, None);
        let mut fields: Vec<String> = (0..22).map(|i| i.to_string()).collect();
        fields[21] = "9".into();
        match parser.parse_row(&fields.join(","), None) {
            Row::Polygon(record) => {
                assert!(record.points.is_empty());
                assert_eq!(record.area, Some(9.0));
            }
            Row::Skip(reason) => panic!("row skipped: {reason}"),
        }
    }
}
