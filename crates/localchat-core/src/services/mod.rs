pub mod error_collector_layer;
pub mod inference_client;
pub mod renderer;
pub mod request_builder;
pub mod sanitizer;

pub use error_collector_layer::ErrorCollectorLayer;
pub use inference_client::{
    ClientError, DEFAULT_ENDPOINT, HttpInferenceClient, InferenceBackend, NO_RESPONSE_FALLBACK,
};
pub use renderer::{DisplayContent, MessageRenderer, display_content};
pub use request_builder::{BuildError, ChatRequest, MODEL_ID, RequestMessage, RequestRole, build};
pub use sanitizer::{sanitize, strip_think_blocks};
