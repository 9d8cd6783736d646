use crate::view_model::ScanProgress;
use crate::{Candidate, FeedPage, StopReason, TypeFilter, NO_CANDIDATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Init,
    Fetching,
    Reauthenticating,
    Done(StopReason),
    Failed,
}

/// State of one scan invocation. Discarded when the scan completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSession {
    scanned: usize,
    budget: usize,
    filter: TypeFilter,
    current_url: Option<String>,
    best: Option<Candidate>,
    phase: Phase,
    reauth_attempts: u32,
    max_reauth_attempts: Option<u32>,
}

impl ScanSession {
    pub fn new(budget: usize, filter: TypeFilter, max_reauth_attempts: Option<u32>) -> Self {
        Self {
            scanned: 0,
            budget,
            filter,
            current_url: None,
            best: None,
            phase: Phase::Init,
            reauth_attempts: 0,
            max_reauth_attempts,
        }
    }

    pub fn scanned(&self) -> usize {
        self.scanned
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    /// Best like count, or [`NO_CANDIDATE`] when nothing matched.
    pub fn best_count(&self) -> i64 {
        self.best
            .as_ref()
            .map_or(NO_CANDIDATE, |candidate| candidate.like_count)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reauth_attempts(&self) -> u32 {
        self.reauth_attempts
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Done(_) | Phase::Failed)
    }

    pub fn budget_exhausted(&self) -> bool {
        self.scanned >= self.budget
    }

    pub fn progress(&self) -> ScanProgress {
        let percent = if self.budget == 0 {
            100.0
        } else {
            (self.scanned as f64 * 100.0 / self.budget as f64).min(100.0)
        };
        ScanProgress {
            percent,
            scanned: self.scanned,
            budget: self.budget,
            best: self.best.clone(),
        }
    }

    /// Progress observation for a scan that ran out of results early.
    pub(crate) fn completed_progress(&self) -> ScanProgress {
        ScanProgress {
            percent: 100.0,
            ..self.progress()
        }
    }

    pub(crate) fn begin(&mut self, seed_url: String) {
        self.current_url = Some(seed_url);
        self.phase = Phase::Fetching;
    }

    /// Scores every admitted card of the page, then advances to the next page url.
    ///
    /// Only a strictly greater upvote count replaces the current best, so the
    /// earliest card wins ties. The budget is checked by the caller afterwards,
    /// never mid-page.
    pub(crate) fn apply_page(&mut self, page: FeedPage) {
        for card in page.cards.iter().filter(|card| self.filter.admits(card)) {
            for count in card.upvotes() {
                if count > self.best_count() {
                    self.best = Some(Candidate::from_card(card, count));
                }
            }
        }
        self.scanned += page.cards.len();
        self.reauth_attempts = 0;
        self.current_url = Some(page.next_page_url);
    }

    /// Counts a rejection. Returns `false` once the bound is exceeded.
    pub(crate) fn register_rejection(&mut self) -> bool {
        self.reauth_attempts += 1;
        match self.max_reauth_attempts {
            Some(max) if self.reauth_attempts > max => {
                self.phase = Phase::Failed;
                false
            }
            _ => {
                self.phase = Phase::Reauthenticating;
                true
            }
        }
    }

    pub(crate) fn resume(&mut self) {
        self.phase = Phase::Fetching;
    }

    pub(crate) fn finish(&mut self, reason: StopReason) {
        self.phase = Phase::Done(reason);
    }
}
