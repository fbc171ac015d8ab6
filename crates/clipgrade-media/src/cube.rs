//! `.cube` 3D LUT parsing.
//!
//! The format is line oriented:
//!
//! ```text
//! # Comment
//! TITLE "Grade"
//! LUT_3D_SIZE 33
//! 0.0 0.0 0.0
//! ...
//! 1.0 1.0 1.0
//! ```
//!
//! Only `LUT_3D_SIZE` is interpreted. Every other line whose first three
//! tokens are numbers is one RGB entry, red varying fastest. Lines such as
//! `TITLE` or `DOMAIN_MIN` are ignored.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// Size keyword of a 3D cube.
pub const SIZE_DIRECTIVE: &str = "LUT_3D_SIZE";
/// Cube dimension assumed when the file never declares one.
pub const DEFAULT_DIMENSION: usize = 33;
/// Largest dimension accepted; larger tables are almost certainly corrupt.
pub const MAX_DIMENSION: usize = 256;

/// A dense, validated 3D color table.
///
/// `data` holds `dimension³` RGBA quadruples flattened in file order
/// (red fastest, then green, then blue), alpha always 1.0. The layout
/// can be uploaded directly as a 3D lookup texture.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorCube {
    dimension: usize,
    data: Vec<f32>,
}

impl ColorCube {
    /// Build a cube from a flat RGBA buffer.
    pub fn from_rgba(dimension: usize, data: Vec<f32>) -> MediaResult<Self> {
        if !(2..=MAX_DIMENSION).contains(&dimension) {
            return Err(MediaError::cube_parse(
                0,
                format!("size {} outside 2..={}", dimension, MAX_DIMENSION),
            ));
        }
        let expected = dimension.pow(3);
        if data.len() != expected * 4 {
            return Err(MediaError::CubeSizeMismatch {
                expected,
                actual: data.len() / 4,
            });
        }
        Ok(Self { dimension, data })
    }

    /// Identity cube: output equals input.
    pub fn identity(dimension: usize) -> Self {
        let n = dimension.max(2);
        let scale = (n - 1) as f32;
        let mut data = Vec::with_capacity(n.pow(3) * 4);
        for b in 0..n {
            for g in 0..n {
                for r in 0..n {
                    data.extend_from_slice(&[r as f32 / scale, g as f32 / scale, b as f32 / scale, 1.0]);
                }
            }
        }
        Self { dimension: n, data }
    }

    /// Cube side length.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of RGB entries (`dimension³`).
    pub fn entry_count(&self) -> usize {
        self.data.len() / 4
    }

    /// Flat RGBA buffer.
    pub fn as_rgba(&self) -> &[f32] {
        &self.data
    }

    /// Entry at grid position (r, g, b).
    #[inline]
    pub fn entry(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        let n = self.dimension;
        let i = (r + g * n + b * n * n) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Serialize back to `.cube` text.
    pub fn to_cube_text(&self, title: Option<&str>) -> String {
        let mut out = String::with_capacity(self.entry_count() * 28 + 64);
        if let Some(title) = title {
            let _ = writeln!(out, "TITLE \"{}\"", title.replace('"', "'"));
        }
        let _ = writeln!(out, "{} {}", SIZE_DIRECTIVE, self.dimension);
        for rgba in self.data.chunks_exact(4) {
            // Shortest round-trip form, so a re-read table is bit-identical
            let _ = writeln!(out, "{} {} {}", rgba[0], rgba[1], rgba[2]);
        }
        out
    }

    /// Write the cube as a `.cube` file.
    pub async fn write(&self, path: impl AsRef<Path>) -> MediaResult<()> {
        tokio::fs::write(path.as_ref(), self.to_cube_text(None)).await?;
        Ok(())
    }
}

/// Parse `.cube` text into a [`ColorCube`].
pub fn parse_cube(text: &str) -> MediaResult<ColorCube> {
    let mut dimension: Option<usize> = None;
    let mut data: Vec<f32> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let first = tokens.next().unwrap_or_default();

        if first == SIZE_DIRECTIVE {
            dimension = Some(parse_dimension(tokens.next(), line_no)?);
            continue;
        }

        let Some(rgb) = parse_triple(first, &mut tokens) else {
            continue;
        };
        if rgb.iter().any(|v| !v.is_finite()) {
            return Err(MediaError::cube_parse(line_no, "non-finite color value"));
        }
        data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 1.0]);
    }

    let dimension = dimension.unwrap_or(DEFAULT_DIMENSION);
    ColorCube::from_rgba(dimension, data)
}

/// Read and parse a `.cube` file.
pub async fn read_cube(path: impl AsRef<Path>) -> MediaResult<ColorCube> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    let text = tokio::fs::read_to_string(path).await?;
    parse_cube(&text)
}

fn parse_dimension(token: Option<&str>, line_no: usize) -> MediaResult<usize> {
    let token = token.ok_or_else(|| MediaError::cube_parse(line_no, "missing size value"))?;
    let size: usize = token
        .parse()
        .map_err(|_| MediaError::cube_parse(line_no, format!("invalid size value '{}'", token)))?;
    if !(2..=MAX_DIMENSION).contains(&size) {
        return Err(MediaError::cube_parse(
            line_no,
            format!("size {} outside 2..={}", size, MAX_DIMENSION),
        ));
    }
    Ok(size)
}

/// First three tokens as floats, or `None` for non-data lines.
fn parse_triple<'a>(first: &str, rest: &mut impl Iterator<Item = &'a str>) -> Option<[f32; 3]> {
    let r = first.parse::<f32>().ok()?;
    let g = rest.next()?.parse::<f32>().ok()?;
    let b = rest.next()?.parse::<f32>().ok()?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_text(size: usize, entries: usize) -> String {
        let mut text = format!("# generated\nTITLE \"test\"\n{} {}\n\n", SIZE_DIRECTIVE, size);
        for i in 0..entries {
            let v = i as f32 / entries.max(1) as f32;
            text.push_str(&format!("{} {} {}\n", v, v * 0.5, 1.0 - v));
        }
        text
    }

    #[test]
    fn test_parse_size_two() {
        let cube = parse_cube(&cube_text(2, 8)).unwrap();
        assert_eq!(cube.dimension(), 2);
        assert_eq!(cube.as_rgba().len(), 32);
        assert!(cube.as_rgba().chunks_exact(4).all(|q| q[3] == 1.0));
    }

    #[test]
    fn test_too_few_entries_fails() {
        match parse_cube(&cube_text(2, 7)) {
            Err(MediaError::CubeSizeMismatch { expected, actual }) => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 7);
            }
            other => panic!("expected size mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_too_many_entries_fails() {
        assert!(matches!(
            parse_cube(&cube_text(2, 9)),
            Err(MediaError::CubeSizeMismatch { expected: 8, actual: 9 })
        ));
    }

    #[test]
    fn test_buffer_length_for_various_sizes() {
        for n in [2usize, 3, 5, 17] {
            let cube = parse_cube(&cube_text(n, n.pow(3))).unwrap();
            assert_eq!(cube.as_rgba().len(), n.pow(3) * 4);
        }
    }

    #[test]
    fn test_default_dimension_is_33() {
        let mut text = String::new();
        for _ in 0..DEFAULT_DIMENSION.pow(3) {
            text.push_str("0.5 0.5 0.5\n");
        }
        let cube = parse_cube(&text).unwrap();
        assert_eq!(cube.dimension(), 33);

        assert!(matches!(
            parse_cube("0.5 0.5 0.5\n"),
            Err(MediaError::CubeSizeMismatch { expected: 35937, actual: 1 })
        ));
    }

    #[test]
    fn test_order_preserved() {
        let text = "LUT_3D_SIZE 2\n\
            0.1 0.2 0.3\n0.4 0.5 0.6\n0 0 0\n0 0 0\n0 0 0\n0 0 0\n0 0 0\n0.7 0.8 0.9\n";
        let cube = parse_cube(text).unwrap();
        assert_eq!(&cube.as_rgba()[0..4], &[0.1, 0.2, 0.3, 1.0]);
        assert_eq!(&cube.as_rgba()[4..8], &[0.4, 0.5, 0.6, 1.0]);
        assert_eq!(cube.entry(1, 0, 0), [0.4, 0.5, 0.6]);
        assert_eq!(cube.entry(1, 1, 1), [0.7, 0.8, 0.9]);
    }

    #[test]
    fn test_directives_and_extra_tokens_ignored() {
        let mut text = String::from("LUT_3D_SIZE 2\nDOMAIN_MIN 0.0 0.0 0.0\nDOMAIN_MAX 1.0 1.0 1.0\n");
        for _ in 0..8 {
            text.push_str("  0.1 0.2 0.3 trailing\n");
        }
        let cube = parse_cube(&text).unwrap();
        assert_eq!(cube.entry_count(), 8);
    }

    #[test]
    fn test_invalid_size_value() {
        assert!(matches!(
            parse_cube("LUT_3D_SIZE abc\n"),
            Err(MediaError::CubeParse { line: 1, .. })
        ));
        assert!(matches!(
            parse_cube("# c\nLUT_3D_SIZE\n"),
            Err(MediaError::CubeParse { line: 2, .. })
        ));
        tokio_test::assert_err!(parse_cube("LUT_3D_SIZE 1\n0 0 0\n"));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut text = String::from("LUT_3D_SIZE 2\n");
        for _ in 0..7 {
            text.push_str("0 0 0\n");
        }
        text.push_str("nan 0 0\n");
        assert!(matches!(parse_cube(&text), Err(MediaError::CubeParse { line: 9, .. })));
    }

    #[test]
    fn test_text_round_trip_of_identity() {
        let cube = ColorCube::identity(3);
        let parsed = parse_cube(&cube.to_cube_text(Some("identity"))).unwrap();
        assert_eq!(parsed.dimension(), 3);
        assert_eq!(parsed.as_rgba(), cube.as_rgba());
    }

    #[test]
    fn test_written_table_matches_exactly() {
        let data: Vec<f32> = (0..8)
            .flat_map(|i| {
                let v = (i as f32 + 0.123_456_79) / 7.0;
                [v, v * v, 1.0 / (v + 3.0), 1.0]
            })
            .collect();
        let cube = ColorCube::from_rgba(2, data).unwrap();
        let parsed = parse_cube(&cube.to_cube_text(None)).unwrap();
        assert_eq!(parsed, cube);
    }

    #[test]
    fn test_from_rgba_rejects_degenerate_dimension() {
        assert!(matches!(
            ColorCube::from_rgba(1, vec![0.0, 0.0, 0.0, 1.0]),
            Err(MediaError::CubeParse { .. })
        ));
        assert!(matches!(
            ColorCube::from_rgba(0, Vec::new()),
            Err(MediaError::CubeParse { .. })
        ));
        tokio_test::assert_ok!(ColorCube::from_rgba(2, vec![0.5; 32]));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        assert!(matches!(
            read_cube("/nonexistent/grade.cube").await,
            Err(MediaError::FileNotFound(_))
        ));
    }
}
