// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod collect;
pub mod config;
pub mod mapper;
pub mod orchestrate;
pub mod render;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::collect::types::{
    BatchResult, FetchOutcome, FetchStatus, Fetcher, RequestContext, RequestParams, Source,
};
pub use crate::collect::{collect, collect_concurrent, CollectError, CollectOptions};
pub use crate::mapper::{
    DomainBounds, EncodingUnavailable, MapperError, MappingRequest, MappingResult, Rgb, Strategy,
    ValueMapper,
};
