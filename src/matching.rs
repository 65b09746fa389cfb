//! Transcript → church/call matching.
//!
//! Matching is an ordered list of strategies. The church-resolving tiers run first
//! and the first tier that produces anything other than [`TierOutcome::NoMatch`]
//! decides; an ambiguous tier ends the match. Temporal refinement only runs for a
//! church that was already resolved. Ties never pick a winner.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Matcher strategies in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ParticipantMatch,
    TitleMatch,
    TemporalRefine,
}

impl MatchStrategy {
    /// Tiers that can resolve a church on their own.
    pub const CHURCH_TIERS: [MatchStrategy; 2] =
        [MatchStrategy::ParticipantMatch, MatchStrategy::TitleMatch];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::ParticipantMatch => "participant",
            MatchStrategy::TitleMatch => "title",
            MatchStrategy::TemporalRefine => "temporal",
        }
    }
}

/// Result of a single tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome<T> {
    Matched(T),
    /// More than one equally ranked candidate
    Ambiguous(Vec<T>),
    NoMatch,
}

/// Why a transcript went to the review queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    AutoMatchDisabled,
    AmbiguousParticipants,
    AmbiguousTitle,
    NoCandidate,
}

impl UnmatchedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnmatchedReason::AutoMatchDisabled => "auto_match_disabled",
            UnmatchedReason::AmbiguousParticipants => "ambiguous_participants",
            UnmatchedReason::AmbiguousTitle => "ambiguous_title",
            UnmatchedReason::NoCandidate => "no_candidate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryChurch {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryContact {
    pub church_id: String,
    pub email: String,
}

/// Church names and leader/coach emails known to one tenant.
#[derive(Debug, Clone, Default)]
pub struct ChurchDirectory {
    pub churches: Vec<DirectoryChurch>,
    pub contacts: Vec<DirectoryContact>,
}

/// A scheduled call considered by temporal refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateCall {
    pub id: Uuid,
    pub call_type: String,
    pub scheduled_at: DateTime<Utc>,
    pub completed: bool,
}

/// Identifying fields of a transcript the matcher looks at.
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    pub title: &'a str,
    pub participant_emails: &'a [String],
    pub meeting_date: Option<DateTime<Utc>>,
}

/// Church resolved by the first two tiers, or the reason none was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChurchResolution {
    Resolved {
        church_id: String,
        tier: MatchStrategy,
    },
    Unresolved(UnmatchedReason),
}

/// Final decision for one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub church_id: Option<String>,
    pub call_id: Option<Uuid>,
    pub call_type: Option<String>,
    /// Deepest tier that contributed to the result
    pub tier: Option<MatchStrategy>,
    pub reason: Option<UnmatchedReason>,
}

impl MatchResult {
    pub fn unmatched(reason: UnmatchedReason) -> Self {
        Self {
            church_id: None,
            call_id: None,
            call_type: None,
            tier: None,
            reason: Some(reason),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.church_id.is_some()
    }

    /// Metric tag for the deciding tier, `none` for unmatched.
    pub fn tier_label(&self) -> &'static str {
        self.tier.map(|t| t.as_str()).unwrap_or("none")
    }
}

/// Tiered matcher with a fixed temporal window.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    window: Duration,
}

impl Matcher {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Runs the church tiers in order.
    pub fn resolve_church(
        &self,
        directory: &ChurchDirectory,
        input: &MatchInput<'_>,
    ) -> ChurchResolution {
        for strategy in MatchStrategy::CHURCH_TIERS {
            let outcome = match strategy {
                MatchStrategy::ParticipantMatch => {
                    participant_tier(directory, input.participant_emails)
                }
                MatchStrategy::TitleMatch => title_tier(directory, input.title),
                MatchStrategy::TemporalRefine => continue,
            };

            match outcome {
                TierOutcome::Matched(church_id) => {
                    return ChurchResolution::Resolved {
                        church_id,
                        tier: strategy,
                    };
                }
                TierOutcome::Ambiguous(candidates) => {
                    tracing::debug!(
                        tier = strategy.as_str(),
                        ?candidates,
                        "Ambiguous church match"
                    );
                    let reason = match strategy {
                        MatchStrategy::ParticipantMatch => UnmatchedReason::AmbiguousParticipants,
                        _ => UnmatchedReason::AmbiguousTitle,
                    };
                    return ChurchResolution::Unresolved(reason);
                }
                TierOutcome::NoMatch => {}
            }
        }

        ChurchResolution::Unresolved(UnmatchedReason::NoCandidate)
    }

    /// Picks the call of an already resolved church closest to the meeting.
    ///
    /// Candidates lie within the window; the rank is (completed, distance,
    /// scheduled_at) ascending and an exact tie at the top is ambiguous.
    pub fn refine_call(
        &self,
        calls: &[CandidateCall],
        meeting_date: Option<DateTime<Utc>>,
    ) -> TierOutcome<CandidateCall> {
        let Some(meeting_date) = meeting_date else {
            return TierOutcome::NoMatch;
        };

        let mut ranked: Vec<(bool, Duration, DateTime<Utc>, &CandidateCall)> = calls
            .iter()
            .map(|call| {
                let distance = (call.scheduled_at - meeting_date).abs();
                (call.completed, distance, call.scheduled_at, call)
            })
            .filter(|(_, distance, _, _)| *distance <= self.window)
            .collect();

        ranked.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

        match ranked.as_slice() {
            [] => TierOutcome::NoMatch,
            [(c1, d1, s1, first), (c2, d2, s2, second), ..] if (c1, d1, s1) == (c2, d2, s2) => {
                TierOutcome::Ambiguous(vec![(*first).clone(), (*second).clone()])
            }
            [(_, _, _, best), ..] => TierOutcome::Matched((*best).clone()),
        }
    }

    /// Combines a church resolution with the temporal tier outcome.
    pub fn decide(
        &self,
        church: ChurchResolution,
        call: TierOutcome<CandidateCall>,
    ) -> MatchResult {
        match church {
            ChurchResolution::Unresolved(reason) => MatchResult::unmatched(reason),
            ChurchResolution::Resolved { church_id, tier } => match call {
                TierOutcome::Matched(call) => MatchResult {
                    church_id: Some(church_id),
                    call_id: Some(call.id),
                    call_type: Some(call.call_type),
                    tier: Some(MatchStrategy::TemporalRefine),
                    reason: None,
                },
                TierOutcome::Ambiguous(_) | TierOutcome::NoMatch => MatchResult {
                    church_id: Some(church_id),
                    call_id: None,
                    call_type: None,
                    tier: Some(tier),
                    reason: None,
                },
            },
        }
    }
}

fn participant_tier(directory: &ChurchDirectory, emails: &[String]) -> TierOutcome<String> {
    let hits: BTreeSet<&str> = emails
        .iter()
        .flat_map(|email| {
            directory
                .contacts
                .iter()
                .filter(move |contact| contact.email.eq_ignore_ascii_case(email))
                .map(|contact| contact.church_id.as_str())
        })
        .collect();

    single_or_ambiguous(hits.into_iter().map(str::to_string).collect())
}

fn title_tier(directory: &ChurchDirectory, title: &str) -> TierOutcome<String> {
    let title = normalize_text(title);
    if title.is_empty() {
        return TierOutcome::NoMatch;
    }

    let mut hits: Vec<(String, &str)> = Vec::new();
    for church in &directory.churches {
        let name = normalize_text(&church.name);
        if !name.is_empty()
            && title.contains(&name)
            && !hits.iter().any(|(_, id)| *id == church.id)
        {
            hits.push((name, church.id.as_str()));
        }
    }

    // A hit whose name sits inside a longer hit's name is shadowed by it.
    let maximal: Vec<&(String, &str)> = hits
        .iter()
        .filter(|(name, _)| {
            !hits
                .iter()
                .any(|(other, _)| other.len() > name.len() && other.contains(name.as_str()))
        })
        .collect();

    match maximal.as_slice() {
        [] => TierOutcome::NoMatch,
        [(_, id)] => TierOutcome::Matched((*id).to_string()),
        many => TierOutcome::Ambiguous(many.iter().map(|(_, id)| (*id).to_string()).collect()),
    }
}

fn single_or_ambiguous(mut hits: Vec<String>) -> TierOutcome<String> {
    match hits.len() {
        0 => TierOutcome::NoMatch,
        1 => TierOutcome::Matched(hits.remove(0)),
        _ => TierOutcome::Ambiguous(hits),
    }
}

/// Lower-cases and collapses every whitespace run to a single space.
pub fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
