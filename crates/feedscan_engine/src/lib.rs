//! Feed scanner engine: credential capture, persistence, page fetching and the scan driver.
mod capture;
mod credentials;
mod fetch;
mod page;
mod persist;
mod scanner;
mod store;
mod types;

pub use capture::{CaptureError, CaptureSettings, ChromiumCapture, CredentialCapture};
pub use credentials::Credentials;
pub use fetch::{ChannelProgressSink, FetchSettings, NullProgressSink, PageFetcher, ProgressSink, ReqwestFetcher};
pub use page::{decode_page, PageBody, PageDecodeError};
pub use persist::{ensure_parent_dir, AtomicFileWriter, PersistError};
pub use scanner::{FeedScanner, ScanError, ScanOutcome, ScanRequest, ScanSettings};
pub use store::CredentialStore;
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput, ScanEvent};
