use crate::core::errors::ChiaTienError;
use crate::core::models::expense::ParticipantShare;
use crate::core::models::participant::{Participant, RosterEntry};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    #[default]
    Equal,
    Manual,
}

impl std::fmt::Display for SplitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SplitMode::Equal => "equal",
            SplitMode::Manual => "manual",
        };
        write!(f, "{}", s)
    }
}

/// Result of [`SplitAllocator::finalize`], ready to be wrapped into an expense.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitAllocation {
    pub payer_id: String,
    pub amount: u64,
    pub participants: Vec<ParticipantShare>,
}

/// Share each of `k` participants gets out of `total`, rounded half up.
///
/// Returns 0 when nobody is selected.
pub fn equal_share(total: u64, k: usize) -> u64 {
    if k == 0 {
        return 0;
    }
    let k = k as u64;
    let quotient = total / k;
    let remainder = total % k;
    // remainder < k, so doubling it stays far below u64::MAX for any roster size
    if remainder * 2 >= k { quotient + 1 } else { quotient }
}

/// In-memory split session for one expense-entry flow.
///
/// Equal mode keeps every selected participant at `equal_share(total, k)` and
/// every unselected one at 0. The sum of shares may differ from the total by
/// up to `k - 1`; that slack is kept as is. Manual mode leaves amounts to the
/// user and never reconciles them against the total.
#[derive(Clone, Debug, Default)]
pub struct SplitAllocator {
    total_amount: u64,
    mode: SplitMode,
    participants: Vec<Participant>,
    payer_id: Option<String>,
}

impl SplitAllocator {
    pub fn new(roster: impl IntoIterator<Item = RosterEntry>) -> Self {
        let participants: Vec<Participant> = roster.into_iter().map(Participant::from_roster).collect();
        debug!("Opening split session with {} participants", participants.len());
        let mut allocator = SplitAllocator {
            total_amount: 0,
            mode: SplitMode::Equal,
            participants,
            payer_id: None,
        };
        allocator.recompute();
        allocator
    }

    /// Replaces the roster: everyone selected, equal mode, amounts rebuilt from
    /// the current total. The payer survives only if still on the roster.
    pub fn reset_roster(&mut self, roster: impl IntoIterator<Item = RosterEntry>) {
        self.participants = roster.into_iter().map(Participant::from_roster).collect();
        self.mode = SplitMode::Equal;
        if let Some(payer) = &self.payer_id {
            if !self.contains(payer) {
                debug!("Payer {} left the roster, clearing", payer);
                self.payer_id = None;
            }
        }
        info!("Roster switched to {} participants", self.participants.len());
        self.recompute();
    }

    pub fn total(&self) -> u64 {
        self.total_amount
    }

    pub fn mode(&self) -> SplitMode {
        self.mode
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn payer_id(&self) -> Option<&str> {
        self.payer_id.as_deref()
    }

    pub fn selected_count(&self) -> usize {
        self.participants.iter().filter(|p| p.selected).count()
    }

    /// Sum of the amounts currently held by selected participants.
    pub fn allocated_total(&self) -> u64 {
        self.participants
            .iter()
            .filter(|p| p.selected)
            .fold(0u64, |acc, p| acc.saturating_add(p.owed_amount))
    }

    /// `total - allocated_total`; negative when shares overshoot the total.
    pub fn rounding_slack(&self) -> i128 {
        self.total_amount as i128 - self.allocated_total() as i128
    }

    pub fn set_total(&mut self, amount: u64) {
        debug!("Total set to {} (mode {})", amount, self.mode);
        self.total_amount = amount;
        if self.mode == SplitMode::Equal {
            self.recompute();
        }
    }

    pub fn set_mode(&mut self, mode: SplitMode) {
        debug!("Split mode {} -> {}", self.mode, mode);
        self.mode = mode;
        if mode == SplitMode::Equal {
            self.recompute();
        }
    }

    /// Flips the participant's `selected` flag and returns the new value.
    pub fn toggle_participant(&mut self, user_id: &str) -> Result<bool, ChiaTienError> {
        let mode = self.mode;
        let participant = self.find_mut(user_id)?;
        participant.selected = !participant.selected;
        let selected = participant.selected;
        if mode == SplitMode::Manual && !selected {
            participant.owed_amount = 0;
        }
        debug!("Participant {} selected={}", user_id, selected);

        if mode == SplitMode::Equal {
            self.recompute();
        }
        Ok(selected)
    }

    pub fn set_participant_amount(&mut self, user_id: &str, amount: u64) -> Result<(), ChiaTienError> {
        if !self.contains(user_id) {
            warn!("Amount set for unknown participant {}", user_id);
            return Err(ChiaTienError::InvalidParticipant(user_id.to_string()));
        }
        if self.mode == SplitMode::Equal {
            warn!("Rejected manual amount for {} while in equal mode", user_id);
            return Err(ChiaTienError::AmountsAreDerived);
        }
        let participant = self.find_mut(user_id)?;
        participant.owed_amount = amount;
        debug!("Participant {} owes {}", user_id, amount);
        Ok(())
    }

    pub fn set_payer(&mut self, user_id: &str) -> Result<(), ChiaTienError> {
        if !self.contains(user_id) {
            warn!("Payer {} is not on the roster", user_id);
            return Err(ChiaTienError::InvalidParticipant(user_id.to_string()));
        }
        self.payer_id = Some(user_id.to_string());
        Ok(())
    }

    pub fn finalize(&self) -> Result<SplitAllocation, ChiaTienError> {
        let participants: Vec<ParticipantShare> = self
            .participants
            .iter()
            .filter(|p| p.selected)
            .map(|p| ParticipantShare {
                user_id: p.user_id.clone(),
                amount: p.owed_amount,
            })
            .collect();
        if participants.is_empty() {
            return Err(ChiaTienError::NoParticipantsSelected);
        }
        let payer_id = self.payer_id.clone().ok_or(ChiaTienError::NoPayer)?;

        if self.mode == SplitMode::Manual && self.rounding_slack() != 0 {
            debug!(
                "Manual split allocates {} of {}, submitting as is",
                self.allocated_total(),
                self.total_amount
            );
        }

        Ok(SplitAllocation {
            payer_id,
            amount: self.total_amount,
            participants,
        })
    }

    fn contains(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    fn find_mut(&mut self, user_id: &str) -> Result<&mut Participant, ChiaTienError> {
        self.participants
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| ChiaTienError::InvalidParticipant(user_id.to_string()))
    }

    fn recompute(&mut self) {
        let per_person = equal_share(self.total_amount, self.selected_count());
        for participant in &mut self.participants {
            participant.owed_amount = if participant.selected { per_person } else { 0 };
        }
        debug!(
            "Equal split: {} each across {} participants, slack {}",
            per_person,
            self.selected_count(),
            self.rounding_slack()
        );
    }
}
