//! Listened time, rebuilt from the playback ledger.
//!
//! A closed session counts its wall-clock length minus the time spent
//! paused. Pauses and resumes are paired by position, not by nearest
//! timestamp. Open sessions count as zero, which also covers sessions a
//! failed store write never closed.

use tracing::debug;

use crate::error::Result;
use crate::library::TrackId;
use crate::store::{EventStore, PlaybackMark, PlaybackSession};

/// Listened milliseconds for one session, or `None` if it does not count.
///
/// `pauses` and `resumes` must be in timestamp order.
pub fn session_listened_millis(
    session: &PlaybackSession,
    pauses: &[PlaybackMark],
    resumes: &[PlaybackMark],
) -> Option<i64> {
    let ended_at = session.ended_at?;
    if pauses.len().abs_diff(resumes.len()) > 1 {
        return None;
    }

    let mut elapsed = ended_at - session.started_at;
    for (pause, resume) in pauses.iter().zip(resumes) {
        elapsed -= resume.timestamp - pause.timestamp;
    }
    if pauses.len() > resumes.len() {
        if let Some(last) = pauses.last() {
            elapsed -= ended_at - last.timestamp;
        }
    }
    Some(elapsed.max(0))
}

/// Total listened seconds for `track_id` across all of its sessions.
pub async fn listened_seconds(store: &dyn EventStore, track_id: TrackId) -> Result<f64> {
    let mut total_millis = 0_i64;
    for session in store.sessions(track_id).await? {
        if session.ended_at.is_none() {
            continue;
        }
        let pauses = store.pauses(session.id).await?;
        let resumes = store.resumes(session.id).await?;
        match session_listened_millis(&session, &pauses, &resumes) {
            Some(millis) => total_millis += millis,
            None => debug!(
                session = session.id,
                pauses = pauses.len(),
                resumes = resumes.len(),
                "skipping session with unbalanced pauses"
            ),
        }
    }
    Ok(total_millis as f64 / 1000.0)
}
