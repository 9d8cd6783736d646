#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Credentials are available; scanning starts from their request url.
    Started { seed_url: String },
    /// A page was fetched and decoded.
    PageFetched(crate::FeedPage),
    /// The API answered with an error status.
    FetchRejected { status: u16 },
    /// A fresh credential was captured and stored.
    Recaptured,
    /// The API answered with an empty body.
    EndOfResults,
    /// The caller asked the scan to stop.
    Cancelled,
}
