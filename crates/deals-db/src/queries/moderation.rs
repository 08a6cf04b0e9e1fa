use anyhow::Result;
use deals_types::models::{ListingRef, ModerationStatus};
use deals_types::moderation::{Decision, TransitionError};
use rusqlite::{Connection, TransactionBehavior};
use tracing::info;
use uuid::Uuid;

use super::OptionalExt;
use crate::{Database, now};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecideOutcome {
    Decided(ModerationStatus),
    NotFound,
    Refused(TransitionError),
}

/// A decision to apply together with a content edit.
#[derive(Debug, Clone, Copy)]
pub struct Verdict<'a> {
    pub moderator_id: Uuid,
    pub decision: &'a Decision,
}

/// Result of an edit that may carry a moderation decision.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome<T> {
    Saved(T),
    NotFound,
    Refused(TransitionError),
}

impl Database {
    // -- Moderation --

    /// Applies a moderator's decision to a promotion or coupon.
    ///
    /// The read, the transition check and the write share one immediate
    /// transaction, and the write is additionally guarded by
    /// `status = 'pending'`, so a second decision can never overwrite the first.
    pub fn decide(
        &self,
        target: ListingRef,
        moderator_id: Uuid,
        decision: &Decision,
        notes: Option<&str>,
    ) -> Result<DecideOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let outcome = apply_decision(&tx, target, moderator_id, decision, notes)?;
            if matches!(outcome, DecideOutcome::Decided(_)) {
                tx.commit()?;
            }
            Ok(outcome)
        })
    }
}

/// Decision step shared by [`Database::decide`] and the listing edits. Runs
/// inside the caller's transaction; the caller commits.
pub(super) fn apply_decision(
    conn: &Connection,
    target: ListingRef,
    moderator_id: Uuid,
    decision: &Decision,
    notes: Option<&str>,
) -> Result<DecideOutcome> {
    let table = target.kind.table();
    let id = target.id.to_string();

    let current: Option<String> = conn
        .query_row(&format!("SELECT status FROM {table} WHERE id = ?1"), [&id], |r| {
            r.get(0)
        })
        .optional()?;

    let Some(current) = current else {
        return Ok(DecideOutcome::NotFound);
    };
    let current: ModerationStatus = current.parse()?;

    let next = match current.apply(decision) {
        Ok(next) => next,
        Err(refusal) => return Ok(DecideOutcome::Refused(refusal)),
    };

    let updated = conn.execute(
        &format!(
            "UPDATE {table} SET
                status = ?1,
                moderator_id = ?2,
                rejection_reason = ?3,
                moderation_notes = COALESCE(?4, moderation_notes),
                decided_at = ?5,
                updated_at = ?5
             WHERE id = ?6 AND status = 'pending'"
        ),
        rusqlite::params![
            next.as_str(),
            moderator_id.to_string(),
            decision.reason(),
            notes,
            now(),
            id,
        ],
    )?;
    if updated == 0 {
        anyhow::bail!("{} {} changed status mid-transaction", target.kind.label(), id);
    }

    info!(
        "{} {} {} by moderator {}",
        target.kind.label(),
        id,
        next,
        moderator_id
    );
    Ok(DecideOutcome::Decided(next))
}
