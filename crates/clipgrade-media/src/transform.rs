//! Color transforms built from parsed cube LUTs.
//!
//! A [`ColorTransform`] is used twice: as a still-image filter for previews
//! ([`ColorTransform::apply_to_image`]) and as a [`VideoComposition`] that
//! attaches the same table to every frame of an export. Both paths use
//! trilinear interpolation over the identical table, so a preview matches
//! the baked output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use rayon::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::cube::ColorCube;
use crate::error::{MediaError, MediaResult};
use crate::filters::{filter_lut3d, LUT_INTERPOLATION};
use crate::probe::VideoInfo;

/// Well-known NTSC-style rates expressed as `base * 1000 / 1001`.
const FRACTIONAL_BASES: &[u32] = &[24, 30, 48, 60, 120];
/// How close a probed rate must be to a known rate to snap to it.
const RATE_SNAP_TOLERANCE: f64 = 0.01;

/// Duration of one frame as an exact rational (`value / timescale` seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDuration {
    pub value: u32,
    pub timescale: u32,
}

impl FrameDuration {
    /// Derive a frame duration from a nominal frame rate.
    ///
    /// Rates near 23.976, 29.97, 47.952, 59.94 or 119.88 become `1001/N000`;
    /// rates near an integer become `1/N`; anything else is kept to the
    /// millisecond as `1000/round(fps * 1000)`.
    pub fn from_fps(fps: f64) -> Self {
        if !fps.is_finite() || fps <= 0.0 {
            return Self { value: 1, timescale: 30 };
        }

        for &base in FRACTIONAL_BASES {
            let exact = base as f64 * 1000.0 / 1001.0;
            if (fps - exact).abs() < RATE_SNAP_TOLERANCE {
                return Self {
                    value: 1001,
                    timescale: base * 1000,
                };
            }
        }

        let rounded = fps.round();
        if (fps - rounded).abs() < RATE_SNAP_TOLERANCE {
            return Self {
                value: 1,
                timescale: rounded as u32,
            };
        }

        Self {
            value: 1000,
            timescale: (fps * 1000.0).round() as u32,
        }
    }

    /// Frames per second.
    pub fn fps(&self) -> f64 {
        self.timescale as f64 / self.value as f64
    }

    /// Frame rate in FFmpeg's rational syntax (e.g. `24000/1001`).
    pub fn rate_arg(&self) -> String {
        format!("{}/{}", self.timescale, self.value)
    }
}

/// A parsed LUT wrapped as a reusable per-frame filter.
#[derive(Debug, Clone)]
pub struct ColorTransform {
    cube: Arc<ColorCube>,
    name: String,
}

impl ColorTransform {
    /// Wrap a parsed cube.
    pub fn new(cube: ColorCube, name: impl Into<String>) -> Self {
        Self {
            cube: Arc::new(cube),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cube(&self) -> &ColorCube {
        &self.cube
    }

    /// Map one RGB value through the table.
    ///
    /// Inputs are clamped to the table's domain before lookup so
    /// out-of-range samples take the edge value instead of extrapolating.
    pub fn apply_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        let cube = &self.cube;
        let n = cube.dimension();
        let max = (n - 1) as f32;

        let coord = |v: f32| -> (usize, f32) {
            let scaled = v.clamp(0.0, 1.0) * max;
            let i = (scaled.floor() as usize).min(n - 2);
            (i, scaled - i as f32)
        };
        let (ri, rf) = coord(rgb[0]);
        let (gi, gf) = coord(rgb[1]);
        let (bi, bf) = coord(rgb[2]);

        let c000 = cube.entry(ri, gi, bi);
        let c100 = cube.entry(ri + 1, gi, bi);
        let c010 = cube.entry(ri, gi + 1, bi);
        let c110 = cube.entry(ri + 1, gi + 1, bi);
        let c001 = cube.entry(ri, gi, bi + 1);
        let c101 = cube.entry(ri + 1, gi, bi + 1);
        let c011 = cube.entry(ri, gi + 1, bi + 1);
        let c111 = cube.entry(ri + 1, gi + 1, bi + 1);

        let mut out = [0.0f32; 3];
        for i in 0..3 {
            let c00 = c000[i] * (1.0 - rf) + c100[i] * rf;
            let c10 = c010[i] * (1.0 - rf) + c110[i] * rf;
            let c01 = c001[i] * (1.0 - rf) + c101[i] * rf;
            let c11 = c011[i] * (1.0 - rf) + c111[i] * rf;

            let c0 = c00 * (1.0 - gf) + c10 * gf;
            let c1 = c01 * (1.0 - gf) + c11 * gf;

            out[i] = c0 * (1.0 - bf) + c1 * bf;
        }
        out
    }

    /// Apply the table to an 8-bit RGBA frame in place. Alpha is untouched.
    pub fn apply_to_image(&self, frame: &mut RgbaImage) {
        frame.par_chunks_mut(4).for_each(|px| {
            let rgb = self.apply_rgb([
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ]);
            for c in 0..3 {
                px[c] = (rgb[c].clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        });
    }

    /// Render a graded still of `video` at `at_secs` into `output` (PNG/JPEG by extension).
    pub async fn render_preview(
        &self,
        video: impl AsRef<Path>,
        at_secs: f64,
        output: impl AsRef<Path>,
    ) -> MediaResult<()> {
        let video = video.as_ref();
        let output = output.as_ref();

        let scratch = output.with_extension(format!("{}.png", Uuid::new_v4().simple()));
        let cmd = FfmpegCommand::new(video, &scratch)
            .seek(at_secs.max(0.0))
            .single_frame();
        FfmpegRunner::new().run(&cmd).await?;

        let decoded = image::open(&scratch);
        let _ = tokio::fs::remove_file(&scratch).await;
        let mut frame = decoded?.to_rgba8();

        self.apply_to_image(&mut frame);
        frame.save(output)?;
        Ok(())
    }

    /// Build the per-frame composition for exporting `source` over a time range.
    ///
    /// The validated table is written into `scratch_dir` so the encoder reads
    /// exactly the data the preview uses.
    pub async fn composition(
        &self,
        source: &VideoInfo,
        start_secs: f64,
        duration_secs: f64,
        scratch_dir: impl AsRef<Path>,
    ) -> MediaResult<VideoComposition> {
        if !source.has_video() {
            return Err(MediaError::NoVisualTrack(source.path.clone()));
        }

        let scratch_dir = scratch_dir.as_ref();
        tokio::fs::create_dir_all(scratch_dir).await?;
        let lut_file = scratch_dir.join(format!("{}.cube", Uuid::new_v4()));
        self.cube.write(&lut_file).await?;

        let composition = VideoComposition {
            render_width: source.width,
            render_height: source.height,
            frame_duration: FrameDuration::from_fps(source.fps),
            start_secs,
            duration_secs,
            lut_file,
        };

        debug!(
            lut = %self.name,
            width = composition.render_width,
            height = composition.render_height,
            rate = %composition.frame_duration.rate_arg(),
            "Built color composition"
        );

        Ok(composition)
    }
}

/// Time-domain application of a color transform to a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoComposition {
    /// Natural (untransformed) width of the source track
    pub render_width: u32,
    /// Natural (untransformed) height of the source track
    pub render_height: u32,
    /// Exact frame duration matching the source rate
    pub frame_duration: FrameDuration,
    /// Start of the time range, seconds
    pub start_secs: f64,
    /// Length of the time range, seconds
    pub duration_secs: f64,
    /// Sanitized table read by the encoder
    pub lut_file: PathBuf,
}

impl VideoComposition {
    /// The FFmpeg video filter applying the table to every frame.
    pub fn video_filter(&self) -> String {
        filter_lut3d(&self.lut_file, LUT_INTERPOLATION)
    }

    /// Attach the composition to an encode command.
    pub fn attach(&self, cmd: FfmpegCommand) -> FfmpegCommand {
        let rate = self.frame_duration.rate_arg();
        cmd.video_filter(self.video_filter())
            .output_args(["-r".to_string(), rate])
            .output_args([
                "-video_track_timescale".to_string(),
                self.frame_duration.timescale.to_string(),
            ])
    }

    /// Remove the scratch table.
    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_file(&self.lut_file).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::parse_cube;
    use image::Rgba;

    fn source(width: u32, height: u32, fps: f64) -> VideoInfo {
        VideoInfo {
            path: PathBuf::from("/clips/C0001.MP4"),
            width,
            height,
            fps,
            duration: 10.0,
            codec: "h264".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fractional_rates_are_exact() {
        assert_eq!(FrameDuration::from_fps(23.976), FrameDuration { value: 1001, timescale: 24000 });
        assert_eq!(FrameDuration::from_fps(24000.0 / 1001.0), FrameDuration { value: 1001, timescale: 24000 });
        assert_eq!(FrameDuration::from_fps(29.97), FrameDuration { value: 1001, timescale: 30000 });
        assert_eq!(FrameDuration::from_fps(59.94), FrameDuration { value: 1001, timescale: 60000 });
        assert_eq!(FrameDuration::from_fps(59.94).rate_arg(), "60000/1001");
    }

    #[test]
    fn test_integer_and_odd_rates() {
        assert_eq!(FrameDuration::from_fps(25.0), FrameDuration { value: 1, timescale: 25 });
        assert_eq!(FrameDuration::from_fps(50.0).rate_arg(), "50/1");
        assert_eq!(FrameDuration::from_fps(12.5), FrameDuration { value: 1000, timescale: 12500 });
        assert_eq!(FrameDuration::from_fps(0.0), FrameDuration { value: 1, timescale: 30 });
    }

    #[test]
    fn test_identity_lookup() {
        let t = ColorTransform::new(ColorCube::identity(17), "identity");
        for rgb in [[0.0, 0.0, 0.0], [0.25, 0.5, 0.75], [1.0, 1.0, 1.0]] {
            let out = t.apply_rgb(rgb);
            for c in 0..3 {
                assert!((out[c] - rgb[c]).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let t = ColorTransform::new(ColorCube::identity(2), "identity");
        assert_eq!(t.apply_rgb([-0.5, 1.5, 2.0]), [0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_invert_cube() {
        let mut text = String::from("LUT_3D_SIZE 2\n");
        for b in 0..2 {
            for g in 0..2 {
                for r in 0..2 {
                    text.push_str(&format!("{} {} {}\n", 1 - r, 1 - g, 1 - b));
                }
            }
        }
        let t = ColorTransform::new(parse_cube(&text).unwrap(), "invert");
        let out = t.apply_rgb([0.25, 0.5, 1.0]);
        assert!((out[0] - 0.75).abs() < 1e-5);
        assert!((out[1] - 0.5).abs() < 1e-5);
        assert!(out[2].abs() < 1e-5);

        let mut frame = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 255, 128]));
        t.apply_to_image(&mut frame);
        assert_eq!(frame.get_pixel(1, 1), &Rgba([0, 255, 0, 128]));
    }

    #[tokio::test]
    async fn test_composition_preserves_geometry_and_rate() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = ColorTransform::new(ColorCube::identity(2), "identity");

        let comp = t
            .composition(&source(3840, 2160, 23.976), 2.0, 6.0, dir.path())
            .await
            .unwrap();

        assert_eq!((comp.render_width, comp.render_height), (3840, 2160));
        assert_eq!(comp.frame_duration.rate_arg(), "24000/1001");
        assert!(comp.lut_file.exists());
        assert!(comp.video_filter().starts_with("lut3d="));

        let args = comp.attach(FfmpegCommand::new("in.mp4", "out.mp4")).build_args();
        assert!(args.contains(&"24000/1001".to_string()));
        assert!(args.contains(&"-video_track_timescale".to_string()));

        comp.cleanup().await;
        assert!(!comp.lut_file.exists());
    }

    #[tokio::test]
    async fn test_composition_requires_video_track() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = ColorTransform::new(ColorCube::identity(2), "identity");
        let result = t.composition(&source(0, 0, 0.0), 0.0, 1.0, dir.path()).await;
        assert!(matches!(result, Err(MediaError::NoVisualTrack(_))));
    }
}
