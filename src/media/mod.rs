pub mod materializer;

pub use materializer::{
    normalize_local_path, DownloadOutcome, HttpImageFetcher, ImageFetcher, ImageMaterializer,
    MaterializeReport, MaterializingHandler,
};
