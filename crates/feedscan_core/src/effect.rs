#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Fetch { url: String },
    Recapture { attempt: u32 },
    ReportProgress(crate::ScanProgress),
    Finish { reason: StopReason },
    /// Consecutive rejections exceeded the reauthentication bound.
    GiveUp { attempts: u32, url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetReached,
    EndOfResults,
    Cancelled,
}
