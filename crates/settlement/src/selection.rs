//! Participant eligibility and winner selection

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::index;
use rand::Rng;
use tracing::debug;

use prizecraft_core::{Contest, EngagementKind, ParticipantId, Winner};

use crate::{Result, SocialClient};

/// A resolved, eligible engagement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub participant_id: ParticipantId,
    pub comment_ref: String,
}

impl Candidate {
    pub fn new(participant_id: impl Into<ParticipantId>, comment_ref: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            comment_ref: comment_ref.into(),
        }
    }

    pub fn into_winner(self) -> Winner {
        Winner::pending(self.participant_id, self.comment_ref)
    }
}

/// Identities that may never win a contest
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    pub bot: ParticipantId,
    pub creator: ParticipantId,
    pub post_author: Option<ParticipantId>,
}

impl Exclusions {
    pub fn contains(&self, id: &str) -> bool {
        id == self.bot || id == self.creator || self.post_author.as_deref() == Some(id)
    }
}

/// Drop excluded and empty identities, then dedup keeping the first occurrence
pub fn filter_eligible(candidates: Vec<Candidate>, exclusions: &Exclusions) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| !c.participant_id.is_empty() && !exclusions.contains(&c.participant_id))
        .filter(|c| seen.insert(c.participant_id.clone()))
        .collect()
}

/// Pick `count` candidates uniformly without replacement.
///
/// Everyone wins when the population doesn't exceed `count`. Winners keep
/// the order in which their comments were fetched.
pub fn select_winners<R: Rng + ?Sized>(
    candidates: Vec<Candidate>,
    count: u32,
    rng: &mut R,
) -> Vec<Candidate> {
    let count = count as usize;
    if candidates.len() <= count {
        return candidates;
    }

    let picked: HashSet<usize> = index::sample(rng, candidates.len(), count).into_iter().collect();
    candidates
        .into_iter()
        .enumerate()
        .filter(|(i, _)| picked.contains(i))
        .map(|(_, c)| c)
        .collect()
}

/// Builds the eligible population of a contest from its post's engagements
pub struct ParticipantSelector {
    social: Arc<dyn SocialClient>,
    bot_identity: ParticipantId,
}

impl ParticipantSelector {
    pub fn new(social: Arc<dyn SocialClient>, bot_identity: impl Into<ParticipantId>) -> Self {
        Self {
            social,
            bot_identity: bot_identity.into(),
        }
    }

    /// Eligible candidates for `contest`, in fetch order.
    ///
    /// A failed fetch, identity lookup or post author lookup fails the whole
    /// call so the contest is retried next tick rather than settled on a
    /// partial population or with the author left eligible.
    pub async fn eligible(&self, contest: &Contest) -> Result<Vec<Candidate>> {
        let replies = self.social.fetch_replies(&contest.post_ref).await?;
        let total = replies.len();

        let mut resolved = Vec::with_capacity(total);
        for reply in replies {
            if reply.kind == EngagementKind::Retweet {
                continue;
            }
            match self.social.resolve_participant(&reply.participant_id).await? {
                Some(identity) => resolved.push(Candidate::new(identity, reply.comment_ref)),
                None => debug!(
                    contest = %contest.id,
                    raw = %reply.participant_id,
                    "Skipping unresolvable participant"
                ),
            }
        }

        // A deleted post has no author left to exclude
        let post_author = self.social.post_author(&contest.post_ref).await?;

        let exclusions = Exclusions {
            bot: self.bot_identity.clone(),
            creator: contest.creator_id.clone(),
            post_author,
        };
        let eligible = filter_eligible(resolved, &exclusions);
        debug!(
            contest = %contest.id,
            engagements = total,
            eligible = eligible.len(),
            "Built eligible population"
        );
        Ok(eligible)
    }
}
