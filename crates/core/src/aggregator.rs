//! Candidate aggregation.
//!
//! The aggregator is the single entry point the linking workflow calls. It runs every enabled
//! finder against the same base record and folds their outputs into one list holding at most
//! one candidate per golden record:
//! - a higher tier replaces a lower one
//! - on equal tiers the finder configured earlier keeps its entry
//! - the list is ordered by tier, strongest first, and by first discovery within a tier
//!
//! A failing finder fails the whole pass. An incomplete search could report "no match" for a
//! record that has a golden record, and the caller would then create a duplicate.

use crate::config::MatchConfig;
use crate::finders::CandidateFinder;
use crate::{BaseRecord, CandidateStrategy, InternalId, MatchError, MatchResult, MatchedCandidate};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Runs the configured finders and merges their candidates.
#[derive(Clone)]
pub struct CandidateAggregator {
    cfg: Arc<MatchConfig>,
    finders: Vec<Arc<dyn CandidateFinder>>,
}

impl std::fmt::Debug for CandidateAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateAggregator")
            .field("strategies", &self.strategies())
            .field("parallel_finders", &self.cfg.parallel_finders())
            .finish()
    }
}

impl CandidateAggregator {
    /// Selects and orders finders according to `cfg.strategies()`.
    ///
    /// Finders whose strategy is not configured are left out of every pass.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidConfig`] if a configured strategy has no finder, or if two
    /// finders implement the same strategy.
    pub fn new(
        cfg: Arc<MatchConfig>,
        available: Vec<Arc<dyn CandidateFinder>>,
    ) -> MatchResult<Self> {
        let mut by_strategy: HashMap<CandidateStrategy, Arc<dyn CandidateFinder>> = HashMap::new();
        for finder in available {
            let strategy = finder.strategy();
            if by_strategy.insert(strategy, finder).is_some() {
                return Err(MatchError::InvalidConfig(format!(
                    "more than one finder supplied for strategy {strategy}"
                )));
            }
        }

        let mut finders = Vec::with_capacity(cfg.strategies().len());
        for strategy in cfg.strategies() {
            let finder = by_strategy.remove(strategy).ok_or_else(|| {
                MatchError::InvalidConfig(format!(
                    "candidate strategy {strategy} is configured but no finder was supplied"
                ))
            })?;
            finders.push(finder);
        }

        for strategy in by_strategy.keys() {
            tracing::debug!("candidate strategy {} is not configured; disabled", strategy);
        }

        Ok(Self { cfg, finders })
    }

    /// Enabled strategies, in the order they run and take priority.
    pub fn strategies(&self) -> Vec<CandidateStrategy> {
        self.finders.iter().map(|f| f.strategy()).collect()
    }

    /// Returns the golden-record candidates for `record`.
    ///
    /// An empty list means no golden record matched; deciding to create one is up to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidRecord`] before any collaborator call if the record's entity
    /// type is not managed by MDM, and propagates the first finder failure unchanged.
    pub fn find_candidates(&self, record: &BaseRecord) -> MatchResult<Vec<MatchedCandidate>> {
        if !self.cfg.is_supported_type(record.entity_type()) {
            return Err(MatchError::InvalidRecord(format!(
                "entity type {} is not an MDM type",
                record.entity_type()
            )));
        }

        let span = tracing::info_span!(
            "match_pass",
            pass_id = %Uuid::new_v4().simple(),
            entity_type = %record.entity_type(),
        );
        let _guard = span.enter();

        let outputs = if self.cfg.parallel_finders() && self.finders.len() > 1 {
            self.finders
                .par_iter()
                .map(|finder| span.in_scope(|| run_finder(finder.as_ref(), record)))
                .collect::<MatchResult<Vec<_>>>()?
        } else {
            self.finders
                .iter()
                .map(|finder| run_finder(finder.as_ref(), record))
                .collect::<MatchResult<Vec<_>>>()?
        };

        let merged = merge_candidates(outputs);
        tracing::info!("matching pass produced {} candidate(s)", merged.len());
        Ok(merged)
    }
}

fn run_finder(
    finder: &dyn CandidateFinder,
    record: &BaseRecord,
) -> MatchResult<Vec<MatchedCandidate>> {
    match finder.find_candidates(record) {
        Ok(candidates) => {
            tracing::debug!(
                strategy = %finder.strategy(),
                "finder returned {} candidate(s)",
                candidates.len()
            );
            Ok(candidates)
        }
        Err(e) => {
            tracing::warn!(strategy = %finder.strategy(), "finder failed: {}", e);
            Err(e)
        }
    }
}

/// Folds finder outputs, given in priority order, into one deduplicated list.
///
/// A later entry for the same golden record replaces the kept one only if its tier is strictly
/// higher. The result is sorted by tier, strongest first; the sort is stable, so equal tiers
/// keep first-discovery order.
pub fn merge_candidates<I>(outputs: I) -> Vec<MatchedCandidate>
where
    I: IntoIterator<Item = Vec<MatchedCandidate>>,
{
    let mut merged: Vec<MatchedCandidate> = Vec::new();
    let mut positions: HashMap<InternalId, usize> = HashMap::new();

    for candidate in outputs.into_iter().flatten() {
        match positions.get(&candidate.candidate) {
            Some(&at) => {
                if candidate.tier() > merged[at].tier() {
                    merged[at] = candidate;
                }
            }
            None => {
                positions.insert(candidate.candidate, merged.len());
                merged.push(candidate);
            }
        }
    }

    merged.sort_by(|a, b| b.tier().cmp(&a.tier()));
    merged
}
