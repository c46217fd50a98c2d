use std::path::Path;

use tracing::{debug, warn};

use super::{file_name, Decoded};
use crate::error::{LoaderError, Result};
use crate::features::{parse_number, TsvLayout};
use crate::geometry;
use crate::types::{PointSequence, PolygonRecord};

/// Tab-separated tables with a header row; the last column holds the
/// boundary as `x,y;x,y;...`.
#[derive(Debug, Clone)]
pub struct TsvParser {
    layout: TsvLayout,
    simplify: Option<f64>,
}

/// Case id and image identifier from a name such as
/// `TCGA-AB-0001.tile7.features.tsv`: the case is the first `.` token, the
/// identifier appends the second.
pub fn identity_from_name(path: &Path) -> Result<(String, String)> {
    let name = file_name(path)?;
    let mut tokens = name.split('.').filter(|t| !t.is_empty());
    let case_id = tokens
        .next()
        .ok_or_else(|| LoaderError::parse(path, "cannot derive a case id from the file name"))?;
    let identifier = match tokens.next() {
        Some(second) => format!("{case_id}.{second}"),
        None => case_id.to_string(),
    };
    Ok((case_id.to_string(), identifier))
}

/// Parse `x,y;x,y;...`. Any malformed pair rejects the whole boundary.
pub fn parse_boundary(raw: &str) -> Option<PointSequence> {
    raw.split(';')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (x, y) = pair.split_once(',')?;
            Some([parse_number(x)?, parse_number(y)?])
        })
        .collect()
}

impl TsvParser {
    pub fn new(layout: TsvLayout, simplify: Option<f64>) -> Self {
        Self { layout, simplify }
    }

    pub fn decode(&self, path: &Path) -> Result<Decoded> {
        let text = std::fs::read_to_string(path)?;
        let mut lines = text.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| LoaderError::parse(path, "missing header row"))?;
        let headers: Vec<&str> = header.split('\t').filter(|h| !h.is_empty()).collect();
        let Some(boundary_column) = headers.len().checked_sub(1) else {
            return Err(LoaderError::parse(path, "header row has no columns"));
        };

        let mut records = Vec::new();
        for (line_no, line) in lines {
            let values: Vec<&str> = line
                .split([' ', '\t'])
                .filter(|v| !v.is_empty())
                .collect();

            let Some(mut points) = values.get(boundary_column).and_then(|raw| parse_boundary(raw)) else {
                warn!(path = %path.display(), line = line_no + 1, "skipping row without a readable boundary");
                continue;
            };
            if let Some(tolerance) = self.simplify {
                points = geometry::simplify(&points, tolerance);
            }

            let (features, area) = self.layout.map_features(&headers, &values);
            records.push(PolygonRecord { points, features, area });
        }

        debug!(path = %path.display(), columns = headers.len(), rows = records.len(), "parsed tsv");
        Ok(Decoded { records, raster: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_uses_first_two_name_tokens() {
        let (case_id, identifier) =
            identity_from_name(Path::new("/in/TCGA-AB-0001.tile7.features.tsv")).unwrap();
        assert_eq!(case_id, "TCGA-AB-0001");
        assert_eq!(identifier, "TCGA-AB-0001.tile7");

        let (case_id, identifier) = identity_from_name(Path::new("CASE")).unwrap();
        assert_eq!((case_id.as_str(), identifier.as_str()), ("CASE", "CASE"));
    }

    #[test]
    fn test_boundary_parsing() {
        assert_eq!(
            parse_boundary("0,0;10,0;10,10;"),
            Some(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]])
        );
        assert_eq!(parse_boundary("0,0;10"), None);
        assert_eq!(parse_boundary(""), Some(vec![]));
    }

    #[test]
    fn test_decode_reads_header_features_and_area() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CASE.a.tsv");
        std::fs::write(
            &path,
            "id\tx\tarea\tboundary\n1\t10\t250\t0,0;10,0;10,10;0,10\n2\t11\t7\tbroken\n3 12 n/a 1,1;2,2;3,1\n",
        )
        .unwrap();

        let decoded = TsvParser::new(TsvLayout::default(), None).decode(&path).unwrap();
        assert_eq!(decoded.records.len(), 2);

        let first = &decoded.records[0];
        assert_eq!(first.points, vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);
        assert_eq!(first.features.get("area"), Some(&250.0));
        assert_eq!(first.features.len(), 1);
        assert_eq!(first.area, Some(250.0));

        let second = &decoded.records[1];
        assert!(second.features.is_empty());
        assert_eq!(second.area, None);
    }

    #[test]
    fn test_empty_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.tsv");
        std::fs::write(&path, "\n\n").unwrap();
        let err = TsvParser::new(TsvLayout::default(), None).decode(&path).unwrap_err();
        assert!(matches!(err, LoaderError::Parse { .. }));
    }
}
