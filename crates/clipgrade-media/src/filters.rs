//! FFmpeg video filter definitions.

use std::path::Path;

/// Interpolation used by the export filter; must match [`crate::transform::ColorTransform::apply_rgb`].
pub const LUT_INTERPOLATION: &str = "trilinear";

/// Build the `lut3d` filter applying a cube file to every frame.
pub fn filter_lut3d(lut_file: &Path, interpolation: &str) -> String {
    format!(
        "lut3d=file={}:interp={}",
        escape_filter_value(&lut_file.to_string_lossy()),
        interpolation
    )
}

/// Escape a value for use as a filter option inside a filtergraph.
///
/// FFmpeg parses two levels: the option value (`\ ' :`) and then the
/// filtergraph itself (`\ ' [ ] , ;`).
pub fn escape_filter_value(value: &str) -> String {
    let mut option_level = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(c);
    }

    let mut graph_level = String::with_capacity(option_level.len());
    for c in option_level.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(c);
    }
    graph_level
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_lut3d_filter() {
        let filter = filter_lut3d(&PathBuf::from("/tmp/work/grade.cube"), LUT_INTERPOLATION);
        assert_eq!(filter, "lut3d=file=/tmp/work/grade.cube:interp=trilinear");
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_filter_value("C:/a"), "C\\\\:/a");
        assert_eq!(escape_filter_value("a,b"), "a\\,b");
        assert_eq!(escape_filter_value("plain"), "plain");
    }
}
