use crate::{Effect, Msg, Phase, ScanSession, StopReason};

/// Pure update function: applies a message to the scan session and returns any effects.
///
/// Messages that do not fit the current phase are ignored. A terminal session
/// never produces further effects.
pub fn update(mut session: ScanSession, msg: Msg) -> (ScanSession, Vec<Effect>) {
    if session.is_terminal() {
        return (session, Vec::new());
    }

    let effects = match msg {
        Msg::Started { seed_url } => {
            if session.phase() != Phase::Init {
                return (session, Vec::new());
            }
            session.begin(seed_url.clone());
            if session.budget_exhausted() {
                finish(&mut session, StopReason::BudgetReached)
            } else {
                vec![Effect::Fetch { url: seed_url }]
            }
        }
        Msg::PageFetched(page) => {
            if session.phase() != Phase::Fetching {
                return (session, Vec::new());
            }
            session.apply_page(page);
            let mut effects = vec![Effect::ReportProgress(session.progress())];
            if session.budget_exhausted() {
                effects.extend(finish(&mut session, StopReason::BudgetReached));
            } else if session.current_url().map_or(true, str::is_empty) {
                effects.push(Effect::ReportProgress(session.completed_progress()));
                effects.extend(finish(&mut session, StopReason::EndOfResults));
            } else {
                effects.push(fetch_current(&session));
            }
            effects
        }
        Msg::FetchRejected { .. } => {
            if session.phase() != Phase::Fetching {
                return (session, Vec::new());
            }
            if session.register_rejection() {
                vec![Effect::Recapture {
                    attempt: session.reauth_attempts(),
                }]
            } else {
                vec![Effect::GiveUp {
                    attempts: session.reauth_attempts(),
                    url: session.current_url().unwrap_or_default().to_string(),
                }]
            }
        }
        Msg::Recaptured => {
            if session.phase() != Phase::Reauthenticating {
                return (session, Vec::new());
            }
            // Resume at the page that was rejected, not at the seed.
            session.resume();
            vec![fetch_current(&session)]
        }
        Msg::EndOfResults => {
            if session.phase() != Phase::Fetching {
                return (session, Vec::new());
            }
            let mut effects = vec![Effect::ReportProgress(session.completed_progress())];
            effects.extend(finish(&mut session, StopReason::EndOfResults));
            effects
        }
        Msg::Cancelled => finish(&mut session, StopReason::Cancelled),
    };

    (session, effects)
}

fn fetch_current(session: &ScanSession) -> Effect {
    Effect::Fetch {
        url: session.current_url().unwrap_or_default().to_string(),
    }
}

fn finish(session: &mut ScanSession, reason: StopReason) -> Vec<Effect> {
    session.finish(reason);
    vec![Effect::Finish { reason }]
}
