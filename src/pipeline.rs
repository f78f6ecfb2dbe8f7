//! Wires the mapper, bin manager, and frame renderer together across an
//! ordered multi-file event stream, with end-of-stream auto-scaling and
//! encoder invocation.

use std::path::{Path, PathBuf};

use crate::binmgr::BinManager;
use crate::cidr::CidrTable;
use crate::cli::{parse_period_seconds, Opt};
use crate::curve::CurveConfig;
use crate::encode::{self, EncodeError};
use crate::error::{warn_cidr_table_unavailable, ConfigError, HoneyplotError, PipelineError};
use crate::fsutil::create_no_symlink;
use crate::logsource;
use crate::mapper;
use crate::mask::MaskCache;
use crate::render::{self, RenderParams};
use crate::timefmt;

const DEFAULT_DECAY_SECONDS: u32 = 3 * 3600;

/// Validated, immutable configuration for one pipeline run. Built once from
/// [`Opt`] via [`TryFrom`] so invalid input fails before any I/O happens.
pub struct PipelineConfig {
    pub curve: CurveConfig,
    pub bin_seconds: u32,
    pub decay_seconds: u32,
    pub output_dir: PathBuf,
    pub output_prefix: String,
    pub image_width: u32,
    pub image_height: u32,
    pub video_fps: Option<u32>,
    pub codec_name: String,
    pub show_timestamp: bool,
    pub no_video: bool,
    pub target_video_duration: u32,
    pub cidr_map: Option<PathBuf>,
    pub inputs: Vec<PathBuf>,
}

impl TryFrom<&Opt> for PipelineConfig {
    type Error = ConfigError;

    fn try_from(opt: &Opt) -> Result<Self, ConfigError> {
        let curve = CurveConfig::new(opt.order).map_err(|e| ConfigError::InvalidOrder(e.0))?;
        let bin_seconds = parse_period_seconds(&opt.period)?;
        if !encode::ALLOWED_CODECS.contains(&opt.codec.as_str()) {
            return Err(ConfigError::DisallowedCodec(opt.codec.clone()));
        }
        if !(10..=3600).contains(&opt.duration) {
            return Err(ConfigError::InvalidDuration(opt.duration));
        }
        if opt.inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }

        Ok(Self {
            curve,
            bin_seconds,
            decay_seconds: DEFAULT_DECAY_SECONDS,
            output_dir: opt.output.clone(),
            output_prefix: "frame".to_string(),
            image_width: opt.width,
            image_height: opt.height,
            video_fps: opt.fps,
            codec_name: opt.codec.clone(),
            show_timestamp: opt.timestamp,
            no_video: opt.no_video,
            target_video_duration: opt.duration,
            cidr_map: opt.cidr_map.clone(),
            inputs: opt.inputs.clone(),
        })
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    cidr: CidrTable,
    bin_manager: BinManager,
    mask_cache: MaskCache,
    frame_sequence: u32,
    written_frames: Vec<PathBuf>,
    first_event_ts: Option<i64>,
    last_event_ts: Option<i64>,
    last_accepted_ts: Option<i64>,
    events_processed: u64,
    events_discarded: u64,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let cidr = match &config.cidr_map {
            Some(path) => match CidrTable::load(path) {
                Ok(table) => table,
                Err(err) => {
                    warn_cidr_table_unavailable(path, &err);
                    CidrTable::empty()
                }
            },
            None => CidrTable::empty(),
        };
        let bin_manager = BinManager::new(config.curve.dimension(), config.bin_seconds, config.decay_seconds);
        Self {
            config,
            cidr,
            bin_manager,
            mask_cache: MaskCache::default(),
            frame_sequence: 0,
            written_frames: Vec::new(),
            first_event_ts: None,
            last_event_ts: None,
            last_accepted_ts: None,
            events_processed: 0,
            events_discarded: 0,
        }
    }

    /// Orders `inputs` by earliest observed timestamp, skipping files
    /// whose read fails outright.
    fn ordered_inputs(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let mut dated: Vec<(i64, PathBuf)> = Vec::with_capacity(self.config.inputs.len());
        for path in &self.config.inputs {
            let earliest = logsource::peek_earliest_timestamp(path).map_err(|source| PipelineError::ReadInput {
                path: path.clone(),
                source,
            })?;
            dated.push((earliest.unwrap_or(i64::MAX), path.clone()));
        }
        dated.sort_by_key(|(ts, _)| *ts);
        Ok(dated.into_iter().map(|(_, path)| path).collect())
    }

    pub fn run(&mut self) -> Result<Option<PathBuf>, HoneyplotError> {
        std::fs::create_dir_all(&self.config.output_dir).map_err(|source| PipelineError::RenderFrame {
            path: self.config.output_dir.clone(),
            source,
        })?;
        let inputs = self.ordered_inputs()?;

        for path in &inputs {
            let events = logsource::read_events(path).map_err(|source| PipelineError::ReadInput {
                path: path.clone(),
                source,
            })?;
            for event in events {
                if let Some(last) = self.last_accepted_ts {
                    if event.ts < last {
                        log::debug!("discarding out-of-order event at ts={}, last accepted ts={last}", event.ts);
                        self.events_discarded += 1;
                        continue;
                    }
                }
                self.last_accepted_ts = Some(event.ts);
                self.first_event_ts = Some(self.first_event_ts.map_or(event.ts, |t| t.min(event.ts)));
                self.last_event_ts = Some(self.last_event_ts.map_or(event.ts, |t| t.max(event.ts)));
                self.events_processed += 1;

                let (x, y) = mapper::map(event.src, &mut self.cidr, self.config.curve);
                let ts = event.ts;
                let output_dir = self.config.output_dir.clone();
                let curve = self.config.curve;
                let params = self.render_params();
                let prefix = self.config.output_prefix.clone();
                let mask_cache = &mut self.mask_cache;
                let cidr = &mut self.cidr;
                let frame_sequence = &mut self.frame_sequence;
                let written_frames = &mut self.written_frames;

                self.bin_manager.process(ts, x, y, |bin, residue| {
                    let mask = mask_cache.get(curve, cidr);
                    write_frame(
                        bin,
                        residue,
                        mask,
                        &params,
                        &output_dir,
                        &prefix,
                        frame_sequence,
                        written_frames,
                    )
                })?;
            }
        }

        if let (Some(first), Some(last)) = (self.first_event_ts, self.last_event_ts) {
            self.apply_auto_scale(first, last);
        }

        let output_dir = self.config.output_dir.clone();
        let curve = self.config.curve;
        let params = self.render_params();
        let prefix = self.config.output_prefix.clone();
        let mask_cache = &mut self.mask_cache;
        let cidr = &mut self.cidr;
        let frame_sequence = &mut self.frame_sequence;
        let written_frames = &mut self.written_frames;
        self.bin_manager.flush(|bin, residue| {
            let mask = mask_cache.get(curve, cidr);
            write_frame(
                bin,
                residue,
                mask,
                &params,
                &output_dir,
                &prefix,
                frame_sequence,
                written_frames,
            )
        })?;

        log::info!(
            "processed {} events into {} bins ({} frames), discarded {} out-of-order",
            self.events_processed,
            self.bin_manager.total_bins(),
            self.frame_sequence,
            self.events_discarded
        );

        if self.config.no_video || self.frame_sequence == 0 {
            return Ok(None);
        }

        let fps = self.effective_fps();
        let output_path = self.config.output_dir.join("output.mp4");
        self.invoke_encoder(fps, &output_path)?;
        Ok(Some(output_path))
    }

    /// Scales `decay_seconds` (always) and `video_fps` (unless the user
    /// pinned `--fps`) from the observed event span.
    fn apply_auto_scale(&mut self, first: i64, last: i64) {
        let span_seconds = (last - first).max(0);
        let span_days = span_seconds as f64 / 86_400.0;
        if span_days <= 0.0 {
            return;
        }

        let decay_seconds = ((span_days * 3.0 * 3600.0).round() as i64).max(3600) as u32;
        self.bin_manager.set_decay_seconds(decay_seconds);
    }

    fn effective_fps(&self) -> u32 {
        if let Some(fps) = self.config.video_fps {
            return fps;
        }
        match (self.first_event_ts, self.last_event_ts) {
            (Some(first), Some(last)) => {
                let span_days = (last - first).max(0) as f64 / 86_400.0;
                ((span_days * 3.0).round() as i64).clamp(1, 120) as u32
            }
            _ => 3,
        }
    }

    fn render_params(&self) -> RenderParams {
        RenderParams {
            image_width: self.config.image_width,
            image_height: self.config.image_height
                + if self.config.show_timestamp {
                    render::strip_height()
                } else {
                    0
                },
            show_timestamp: self.config.show_timestamp,
        }
    }

    fn invoke_encoder(&mut self, fps: u32, output_path: &Path) -> Result<(), EncodeError> {
        match encode::invoke_ffmpeg(&self.config.output_dir, &self.config.codec_name, fps, output_path) {
            Ok(()) => {
                delete_written_frames(&mut self.written_frames);
                Ok(())
            }
            Err(err) => {
                log::warn!("ffmpeg invocation failed, keeping frames: {err}");
                Err(err)
            }
        }
    }
}

/// Deletes each path exactly as recorded when its frame was written, and
/// drains the list regardless of individual failures.
fn delete_written_frames(written_frames: &mut Vec<PathBuf>) {
    for path in written_frames.drain(..) {
        if let Err(err) = std::fs::remove_file(&path) {
            log::warn!("failed to delete frame {}: {err}", path.display());
        }
    }
}

fn frame_path(dir: &Path, prefix: &str, bin_start: i64, sequence: u32) -> PathBuf {
    dir.join(format!(
        "{prefix}_{}_{sequence:04}.ppm",
        timefmt::format_filename_timestamp(bin_start)
    ))
}

#[allow(clippy::too_many_arguments)]
fn write_frame(
    bin: &crate::raster::BinRaster,
    residue: &crate::residue::ResidueMap,
    mask: &crate::mask::NonRoutableMask,
    params: &RenderParams,
    output_dir: &Path,
    prefix: &str,
    frame_sequence: &mut u32,
    written_frames: &mut Vec<PathBuf>,
) -> Result<(), PipelineError> {
    let path = frame_path(output_dir, prefix, bin.bin_start, *frame_sequence);
    let bytes = render::render(bin, residue, mask, params);

    use std::io::Write;
    let mut file = create_no_symlink(&path).map_err(|source| PipelineError::RenderFrame {
        path: path.clone(),
        source,
    })?;
    file.write_all(&bytes).map_err(|source| PipelineError::RenderFrame { path: path.clone(), source })?;

    *frame_sequence += 1;
    written_frames.push(path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_opt(inputs: Vec<PathBuf>, output: PathBuf) -> Opt {
        Opt {
            debug: 0,
            period: "1m".to_string(),
            order: 4,
            output,
            no_video: true,
            fps: None,
            codec: "libx264".to_string(),
            cidr_map: None,
            duration: 300,
            timestamp: false,
            width: 64,
            height: 64,
            inputs,
        }
    }

    fn write_sample_log(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    #[test]
    fn rejects_disallowed_codec() {
        let dir = tempfile::tempdir().unwrap();
        let mut opt = base_opt(vec![dir.path().join("a.log")], dir.path().join("out"));
        opt.codec = "theora".to_string();
        assert!(matches!(
            PipelineConfig::try_from(&opt),
            Err(ConfigError::DisallowedCodec(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_duration() {
        let dir = tempfile::tempdir().unwrap();
        let mut opt = base_opt(vec![dir.path().join("a.log")], dir.path().join("out"));
        opt.duration = 5;
        assert!(matches!(
            PipelineConfig::try_from(&opt),
            Err(ConfigError::InvalidDuration(_))
        ));
    }

    #[test]
    fn end_to_end_single_event_produces_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let log = write_sample_log(
            dir.path(),
            "a.log",
            &["Feb 22 09:26:39 10.10.10.40 honeypi00 sensor: PacketTime:1970-01-01 00:01:00.000000 Len:60 IPv4/TCP 128.0.0.0:1 -> 10.10.10.40:5900"],
        );
        let output = dir.path().join("out");
        let opt = base_opt(vec![log], output.clone());
        let config = PipelineConfig::try_from(&opt).unwrap();
        let mut pipeline = Pipeline::new(config);
        let result = pipeline.run().unwrap();
        assert!(result.is_none());
        assert_eq!(pipeline.frame_sequence, 1);

        let frame = frame_path(&output, "frame", 60, 0);
        let bytes = std::fs::read(&frame).unwrap();
        assert!(bytes.starts_with(b"P6\n"));
    }

    #[test]
    fn no_inputs_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let opt = base_opt(vec![], dir.path().join("out"));
        assert!(matches!(PipelineConfig::try_from(&opt), Err(ConfigError::NoInputs)));
    }

    #[test]
    fn out_of_order_event_is_discarded_not_binned() {
        let dir = tempfile::tempdir().unwrap();
        let log = write_sample_log(
            dir.path(),
            "a.log",
            &[
                "Feb 22 09:26:39 10.10.10.40 honeypi00 sensor: PacketTime:1970-01-01 00:02:00.000000 Len:60 IPv4/TCP 128.0.0.0:1 -> 10.10.10.40:5900",
                "Feb 22 09:26:40 10.10.10.40 honeypi00 sensor: PacketTime:1970-01-01 00:01:00.000000 Len:60 IPv4/TCP 129.0.0.0:1 -> 10.10.10.40:5900",
            ],
        );
        let output = dir.path().join("out");
        let opt = base_opt(vec![log], output);
        let config = PipelineConfig::try_from(&opt).unwrap();
        let mut pipeline = Pipeline::new(config);
        pipeline.run().unwrap();

        assert_eq!(pipeline.events_processed, 1);
        assert_eq!(pipeline.events_discarded, 1);
        assert_eq!(pipeline.frame_sequence, 1);
    }

    #[test]
    fn successful_encode_deletes_exactly_the_frames_it_wrote() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        std::fs::create_dir_all(&output).unwrap();

        let params = RenderParams {
            image_width: 64,
            image_height: 64,
            show_timestamp: false,
        };
        let mut frame_sequence = 0u32;
        let mut written_frames = Vec::new();
        let bin = crate::raster::BinRaster::new(3600, 60, 16);
        let residue = crate::residue::ResidueMap::new(16);
        let curve = crate::curve::CurveConfig::new(4).unwrap();
        let mask = crate::mask::NonRoutableMask::build(curve, &mut crate::cidr::CidrTable::empty());
        write_frame(&bin, &residue, &mask, &params, &output, "frame", &mut frame_sequence, &mut written_frames).unwrap();

        // Non-zero bin_start: a zero-bin_start reconstruction (the old, wrong
        // behavior) would never match the path actually written on disk.
        assert_eq!(written_frames.len(), 1);
        assert_ne!(written_frames[0], frame_path(&output, "frame", 0, 0));
        assert!(written_frames[0].exists());

        delete_written_frames(&mut written_frames);
        assert!(written_frames.is_empty());
        assert!(!std::fs::read_dir(&output).unwrap().next().is_some());
    }
}
