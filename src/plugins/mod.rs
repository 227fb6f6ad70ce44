pub mod http;
pub mod mp3;
pub mod mp4;
pub mod registry;
pub mod ytdlp;
