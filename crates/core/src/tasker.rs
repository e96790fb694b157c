//! Task scheduling across rounds.
//!
//! The tasker owns the cursor over this station's sampled subset of
//! the current round. When the subset is exhausted it asks the round
//! server again; a new round yields a fresh subset, the same round
//! yields nothing until the next one is published. On-demand requests
//! jump the queue ahead of sampled work.

use std::collections::VecDeque;
use std::sync::Mutex;

use spotcheck_api::{Assignment, DynRoundClient, ScResult};

use crate::sampler::pick_tasks;

/// One unit of work handed to the worker loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextTask {
    /// The assignment to check.
    pub assignment: Assignment,

    /// The round the cursor currently sits in, if one has been
    /// fetched. On-demand work can precede the first round.
    pub round_id: Option<String>,

    /// The per-node quota of the current round, for pacing. Zero
    /// until a round has been fetched.
    pub quota: u32,
}

#[derive(Debug)]
struct RoundState {
    /// The resolved round location; also the sampling randomness.
    location: String,
    round_id: String,
    quota: u32,
    pending: VecDeque<Assignment>,
}

/// The task source for the worker loop.
#[derive(Debug)]
pub struct Tasker {
    rounds: DynRoundClient,
    station_id: String,
    on_demand: Mutex<VecDeque<Assignment>>,
    state: tokio::sync::Mutex<Option<RoundState>>,
}

impl Tasker {
    /// Construct a [Tasker] for this station.
    pub fn new(rounds: DynRoundClient, station_id: String) -> Self {
        Self {
            rounds,
            station_id,
            on_demand: Mutex::new(VecDeque::new()),
            state: tokio::sync::Mutex::new(None),
        }
    }

    /// Queue an assignment to be checked ahead of sampled round work.
    ///
    /// On-demand checks still produce and submit measurements, they
    /// just skip the sampling step.
    pub fn queue_on_demand(&self, assignment: Assignment) {
        self.on_demand
            .lock()
            .expect("poisoned")
            .push_back(assignment);
    }

    /// Get the next assignment to check, refreshing the round when
    /// the sampled subset is exhausted.
    ///
    /// `Ok(None)` means the current round has no work left for this
    /// station; the caller should sleep and ask again.
    pub async fn next(&self) -> ScResult<Option<NextTask>> {
        let mut state = self.state.lock().await;

        if let Some(assignment) =
            self.on_demand.lock().expect("poisoned").pop_front()
        {
            return Ok(Some(NextTask {
                assignment,
                round_id: state.as_ref().map(|s| s.round_id.clone()),
                quota: state.as_ref().map(|s| s.quota).unwrap_or(0),
            }));
        }

        let exhausted = match &*state {
            None => true,
            Some(s) => s.pending.is_empty(),
        };
        if exhausted {
            let location = self.rounds.discover().await?;
            let unchanged = matches!(
                &*state, Some(s) if s.location == location);
            if !unchanged {
                let round = self.rounds.fetch_round(&location).await?;
                let picked = pick_tasks(
                    &round.assignments,
                    &self.station_id,
                    &location,
                    round.task_quota_per_node,
                );
                tracing::info!(
                    round_id = %round.round_id,
                    pool = round.assignments.len(),
                    picked = picked.len(),
                    "moving to a new round"
                );
                *state = Some(RoundState {
                    location,
                    round_id: round.round_id,
                    quota: round.task_quota_per_node,
                    pending: picked.into(),
                });
            }
        }

        Ok(state.as_mut().and_then(|s| {
            s.pending.pop_front().map(|assignment| NextTask {
                assignment,
                round_id: Some(s.round_id.clone()),
                quota: s.quota,
            })
        }))
    }
}
