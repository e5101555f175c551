use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{resolve_and_pin, MergeOutcome, Restructurer};
use crate::db::format_timestamp;
use crate::db::sittings;
use crate::db::timeline::{
    count_photos, get_session, photos_in_session, renumber_photos, set_session_hero,
    update_session_span,
};
use crate::error::RollbackReason;

impl Restructurer<'_> {
    /// Move every photo of `source_id` into `target_id`, re-sort the combined
    /// set by capture time and delete the emptied source.
    ///
    /// Never returns an error: failures are logged and reported as
    /// [`MergeOutcome::RolledBack`] with the store left as it was.
    pub fn merge(&self, target_id: i64, source_id: i64) -> MergeOutcome {
        if target_id == source_id {
            tracing::warn!(session_id = target_id, "Refusing to merge a session into itself");
            return MergeOutcome::RolledBack(RollbackReason::SameSession);
        }

        match self.try_merge(target_id, source_id) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(target_id, source_id, "Merge failed: {:#}", e);
                MergeOutcome::RolledBack(RollbackReason::Failed(e.to_string()))
            }
        }
    }

    fn try_merge(&self, target_id: i64, source_id: i64) -> Result<MergeOutcome> {
        let tx = self.db.connection().unchecked_transaction()?;
        let now = self.db.now();

        let Some(target) = get_session(&tx, target_id)? else {
            return Ok(MergeOutcome::RolledBack(RollbackReason::SessionNotFound(target_id)));
        };
        let Some(source) = get_session(&tx, source_id)? else {
            return Ok(MergeOutcome::RolledBack(RollbackReason::SessionNotFound(source_id)));
        };

        // Positions are about to change, so resolve against each photo's own
        // session first and freeze the instants that depend on position.
        let mut instants = resolve_and_pin(&tx, self.resolver, &target, now)?;
        instants.extend(resolve_and_pin(&tx, self.resolver, &source, now)?);

        let moved = tx.execute(
            r#"
            UPDATE photos SET session_id = ?, position = -1 - id, updated_at = ?
            WHERE session_id = ?
            "#,
            params![target_id, format_timestamp(&now), source_id],
        )?;

        #[cfg(test)]
        if let Some(hook) = &self.after_move {
            hook(&*tx, source_id)?;
        }

        let mut combined: Vec<(DateTime<Utc>, String, i64)> = photos_in_session(&tx, target_id)?
            .into_iter()
            .map(|photo| {
                let instant = instants
                    .get(&photo.id)
                    .copied()
                    .unwrap_or_else(|| self.resolver.resolve(&tx, &photo, &target));
                (instant, photo.filename, photo.id)
            })
            .collect();
        combined.sort();
        let ordered_ids: Vec<i64> = combined.iter().map(|(_, _, id)| *id).collect();
        renumber_photos(&tx, target_id, &ordered_ids, now)?;

        let started_at = target.started_at.or(source.started_at);
        let ended_at = latest(target.ended_at, source.ended_at);
        update_session_span(&tx, target_id, started_at, ended_at, ordered_ids.len() as i64, now)?;

        if target.hero_photo_id.is_none() {
            if let Some(hero) = source.hero_photo_id {
                if ordered_ids.contains(&hero) {
                    set_session_hero(&tx, target_id, Some(hero), now)?;
                }
            }
        }

        let sittings_moved = sittings::reassign(&tx, source_id, target_id)?;

        let left_behind = count_photos(&tx, source_id)?;
        if left_behind != 0 {
            tx.rollback()?;
            tracing::warn!(
                target = %target.burst_id,
                source = %source.burst_id,
                left_behind,
                "Merge verification failed, rolled back"
            );
            return Ok(MergeOutcome::RolledBack(RollbackReason::SourceNotEmpty(left_behind)));
        }

        tx.execute("DELETE FROM sessions WHERE id = ?", [source_id])?;
        tx.commit()?;

        tracing::info!(
            target = %target.burst_id,
            source = %source.burst_id,
            moved,
            sittings_moved,
            "Merged sessions"
        );
        Ok(MergeOutcome::Merged { moved })
    }
}

fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
