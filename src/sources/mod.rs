pub mod ytdl;

pub use ytdl::YtdlResolver;
