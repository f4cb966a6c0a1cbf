pub mod download_dir_sink;
pub mod ffmpeg_recorder;
