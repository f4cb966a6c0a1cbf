use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{select, tick, Receiver, Sender};

use crate::recording::domain::codec::mime_codecs;
use crate::recording::domain::media_recorder::{
    MediaRecorder, RecorderBackend, RecorderEvent, RecorderOptions, RecorderState,
};
use crate::recording::domain::surface_stream::SurfaceStream;
use crate::shared::frame::Frame;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Container muxer for a MIME type, as `(ffmpeg format name, default video codec)`.
fn container_for(mime_type: &str) -> Option<(&'static str, &'static str)> {
    let base = mime_type.split(';').next().unwrap_or_default().trim();
    match base {
        "video/webm" => Some(("webm", "vp8")),
        "video/mp4" => Some(("mp4", "avc1")),
        _ => None,
    }
}

fn is_video_codec(name: &str) -> bool {
    matches!(name, "vp8" | "vp9" | "avc1" | "h264")
}

fn find_encoder(name: &str) -> Option<ffmpeg_next::Codec> {
    match name {
        "vp9" => ffmpeg_next::encoder::find_by_name("libvpx-vp9"),
        "vp8" => ffmpeg_next::encoder::find_by_name("libvpx"),
        "avc1" | "h264" => ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::H264),
        "opus" => ffmpeg_next::encoder::find_by_name("libopus")
            .or_else(|| ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::OPUS)),
        "vorbis" => ffmpeg_next::encoder::find_by_name("libvorbis"),
        _ => None,
    }
}

/// The video codec a MIME type asks for, or the container default.
fn video_codec_for(mime_type: &str) -> Option<String> {
    let (_, default_codec) = container_for(mime_type)?;
    Some(
        mime_codecs(mime_type)
            .into_iter()
            .find(|c| is_video_codec(c))
            .unwrap_or_else(|| default_codec.to_string()),
    )
}

/// Records the drawing surface with libavcodec/libavformat.
///
/// WebM is written in live mode and MP4 as fragmented MP4, so every flushed
/// segment only appends to what came before and the concatenated segments
/// form a playable file. The canvas stream carries no audio; audio codecs
/// in a MIME type are checked for support but not encoded.
#[derive(Default)]
pub struct FfmpegRecorderBackend;

impl FfmpegRecorderBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RecorderBackend for FfmpegRecorderBackend {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        if ffmpeg_next::init().is_err() || container_for(mime_type).is_none() {
            return false;
        }
        let codecs = mime_codecs(mime_type);
        if !codecs.iter().all(|c| find_encoder(c).is_some()) {
            return false;
        }
        video_codec_for(mime_type).is_some_and(|c| find_encoder(&c).is_some())
    }

    fn create(
        &mut self,
        stream: SurfaceStream,
        options: RecorderOptions,
        events: Sender<RecorderEvent>,
    ) -> Result<Box<dyn MediaRecorder>, Box<dyn std::error::Error>> {
        if !self.is_type_supported(&options.mime_type) {
            return Err(format!("unsupported recording type {}", options.mime_type).into());
        }
        let (w, h) = stream.dimensions();
        if w == 0 || h == 0 {
            return Err("drawing surface has no pixels".into());
        }
        Ok(Box::new(FfmpegRecorder {
            stream: Some(stream),
            options,
            events,
            recording: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            worker: None,
        }))
    }
}

pub struct FfmpegRecorder {
    stream: Option<SurfaceStream>,
    options: RecorderOptions,
    events: Sender<RecorderEvent>,
    recording: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl MediaRecorder for FfmpegRecorder {
    fn state(&self) -> RecorderState {
        if self.recording.load(Ordering::SeqCst) {
            RecorderState::Recording
        } else {
            RecorderState::Inactive
        }
    }

    fn start(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let stream = self.stream.take().ok_or("recorder was already started")?;
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        self.recording.store(true, Ordering::SeqCst);
        self.stop_tx = Some(stop_tx);
        self.worker = Some(spawn_encoder(
            stream,
            self.options.clone(),
            self.events.clone(),
            stop_rx,
            self.recording.clone(),
        ));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Disconnecting the stop channel ends the encoder loop.
        self.stop_tx.take().ok_or("recorder is not running")?;
        Ok(())
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn spawn_encoder(
    stream: SurfaceStream,
    options: RecorderOptions,
    events: Sender<RecorderEvent>,
    stop_rx: Receiver<()>,
    recording: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        if let Err(e) = run_encoder(&stream, &options, &events, &stop_rx) {
            log::warn!("Recording failed: {e}");
            let _ = events.send(RecorderEvent::Error(e.to_string()));
        }
        recording.store(false, Ordering::SeqCst);
        let _ = events.send(RecorderEvent::Stopped);
    })
}

fn run_encoder(
    stream: &SurfaceStream,
    options: &RecorderOptions,
    events: &Sender<RecorderEvent>,
    stop_rx: &Receiver<()>,
) -> Result<(), SendError> {
    let (format, _) = container_for(&options.mime_type).ok_or("unsupported container")?;
    let codec = video_codec_for(&options.mime_type).ok_or("no video codec")?;
    let (width, height) = stream.dimensions();

    let temp = tempfile::Builder::new()
        .prefix("facetrack-")
        .suffix(&format!(".{format}"))
        .tempfile()?;
    let mut encoder = SegmentEncoder::open(temp.path(), format, &codec, width, height, stream.fps())
        .map_err(|e| -> SendError { e.to_string().into() })?;
    let mut tail = FileTail::new(temp.path());

    let _ = events.send(RecorderEvent::Started);
    let frames = tick(stream.frame_interval());
    let flushes = tick(options.timeslice);
    let mut index = 0usize;

    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(frames) -> _ => {
                if let Some(frame) = stream.sample(index) {
                    encoder
                        .write(&frame)
                        .map_err(|e| -> SendError { e.to_string().into() })?;
                    index += 1;
                }
            }
            recv(flushes) -> _ => {
                encoder.flush_io();
                let _ = events.send(RecorderEvent::DataAvailable(tail.read_new()?));
            }
        }
    }

    encoder
        .finish()
        .map_err(|e| -> SendError { e.to_string().into() })?;
    let _ = events.send(RecorderEvent::DataAvailable(tail.read_new()?));
    log::debug!("Recorder encoded {index} frames");
    Ok(())
}

/// Reads the bytes appended to a growing file since the last read.
struct FileTail {
    path: std::path::PathBuf,
    offset: u64,
}

impl FileTail {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            offset: 0,
        }
    }

    fn read_new(&mut self) -> std::io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        self.offset += buf.len() as u64;
        Ok(buf)
    }
}

/// One open output file with its video encoder.
struct SegmentEncoder {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: Option<(u32, u32, ffmpeg_next::software::scaling::Context)>,
    width: u32,
    height: u32,
    fps: i32,
    frame_count: i64,
    stream_time_base: ffmpeg_next::Rational,
}

impl SegmentEncoder {
    fn open(
        path: &Path,
        format: &str,
        codec_name: &str,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let mut octx = ffmpeg_next::format::output_as(path, format)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = find_encoder(codec_name)
            .ok_or_else(|| format!("{codec_name} encoder not found"))?;
        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        // 4:2:0 needs even dimensions.
        let width = width & !1;
        let height = height & !1;
        if width == 0 || height == 0 {
            return Err("surface too small to encode".into());
        }
        let fps = fps.max(1) as i32;

        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        // One keyframe per second, so fragments close at least that often.
        encoder_ctx.set_gop(fps as u32);
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut codec_opts = ffmpeg_next::Dictionary::new();
        match codec_name {
            "vp8" | "vp9" => {
                codec_opts.set("deadline", "realtime");
                codec_opts.set("cpu-used", "8");
            }
            _ => {
                codec_opts.set("preset", "ultrafast");
                codec_opts.set("tune", "zerolatency");
            }
        }
        let encoder = encoder_ctx.open_with(codec_opts)?;
        ost.set_parameters(&encoder);

        let mut mux_opts = ffmpeg_next::Dictionary::new();
        if format == "mp4" {
            mux_opts.set("movflags", "frag_keyframe+empty_moov+default_base_moof");
        } else {
            mux_opts.set("live", "1");
        }
        octx.write_header_with(mux_opts)?;

        let stream_time_base = octx
            .stream(0)
            .map(|s| s.time_base())
            .ok_or("output stream missing")?;

        Ok(Self {
            octx,
            encoder,
            scaler: None,
            width,
            height,
            fps,
            frame_count: 0,
            stream_time_base,
        })
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let (src_w, src_h) = frame.dimensions();
        let needs_scaler = !matches!(&self.scaler, Some((w, h, _)) if *w == src_w && *h == src_h);
        if needs_scaler {
            let scaler = ffmpeg_next::software::scaling::Context::get(
                ffmpeg_next::format::Pixel::RGB24,
                src_w,
                src_h,
                ffmpeg_next::format::Pixel::YUV420P,
                self.width,
                self.height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )?;
            self.scaler = Some((src_w, src_h, scaler));
        }
        let Some((_, _, scaler)) = self.scaler.as_mut() else {
            return Err("scaler unavailable".into());
        };

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            src_w,
            src_h,
        );
        let stride = rgb_frame.stride(0);
        let row_bytes = src_w as usize * Frame::CHANNELS;
        let dst = rgb_frame.data_mut(0);
        for (row, src_row) in frame.data().chunks_exact(row_bytes).enumerate() {
            let start = row * stride;
            dst[start..start + row_bytes].copy_from_slice(src_row);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frame_count));
        self.frame_count += 1;

        self.encoder.send_frame(&yuv_frame)?;
        self.drain_packets()
    }

    fn drain_packets(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, self.fps), self.stream_time_base);
            encoded.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }

    /// Pushes buffered muxer output to the file so it can be read back.
    fn flush_io(&mut self) {
        // Safety: `pb` belongs to `octx`, which outlives this call and is
        // only touched from this thread.
        unsafe {
            let pb = (*self.octx.as_mut_ptr()).pb;
            if !pb.is_null() {
                ffmpeg_next::ffi::avio_flush(pb);
            }
        }
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.encoder.send_eof()?;
        self.drain_packets()?;
        self.octx.write_trailer()?;
        self.flush_io();
        Ok(())
    }
}
