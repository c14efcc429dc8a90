//! Qualification rank assignment.
//!
//! After placement, a group with active ranking gets a rank score (the
//! sum of the ten best current qualifications among its qualifying
//! in-competition finishers) and each such finisher is assigned the
//! highest qualification whose place or time threshold it meets. Time
//! thresholds derive from the leader time through per-qualification
//! percent tables.

use serde::{Deserialize, Serialize};

use crate::result::{Place, RaceResult};
use crate::time::OTime;

/// Sport qualification of a competitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualification {
    #[default]
    NotQualified,
    ThirdYouth,
    SecondYouth,
    FirstYouth,
    Third,
    Second,
    First,
    CandidateMaster,
    Master,
    InternationalMaster,
    MeritedMaster,
}

impl Qualification {
    /// Rank score this qualification contributes to its group.
    #[must_use]
    pub const fn scores(self) -> u32 {
        match self {
            Self::NotQualified => 0,
            Self::ThirdYouth => 1,
            Self::SecondYouth => 2,
            Self::FirstYouth => 3,
            Self::Third => 6,
            Self::Second => 25,
            Self::First => 50,
            Self::CandidateMaster => 80,
            Self::Master | Self::InternationalMaster | Self::MeritedMaster => 100,
        }
    }
}

/// Thresholds for awarding one qualification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingItem {
    /// The qualification this item awards.
    pub qual: Qualification,
    /// Whether the time threshold is derived from the group rank.
    #[serde(default)]
    pub use_scores: bool,
    /// Highest place still awarded (0 = place never awards).
    #[serde(default)]
    pub max_place: u32,
    /// Slowest time still awarded. Recomputed from the leader time
    /// when `use_scores` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time: Option<OTime>,
    /// Inactive items never award.
    #[serde(default)]
    pub is_active: bool,
}

impl RankingItem {
    fn scored(qual: Qualification, is_active: bool) -> Self {
        Self {
            qual,
            use_scores: true,
            max_place: 0,
            max_time: None,
            is_active,
        }
    }

    fn placed(qual: Qualification, max_place: u32) -> Self {
        Self {
            qual,
            use_scores: false,
            max_place,
            max_time: None,
            is_active: false,
        }
    }
}

/// Ranking configuration of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    /// Whether ranks are assigned in this group at all.
    #[serde(default)]
    pub is_active: bool,
    /// Computed group rank; unset with fewer than ten qualifying
    /// in-competition finishers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_scores: Option<u32>,
    /// Award thresholds per qualification.
    #[serde(default = "default_items")]
    pub items: Vec<RankingItem>,
}

impl Default for Ranking {
    fn default() -> Self {
        Self {
            is_active: false,
            rank_scores: None,
            items: default_items(),
        }
    }
}

fn default_items() -> Vec<RankingItem> {
    vec![
        RankingItem::placed(Qualification::Master, 2),
        RankingItem::placed(Qualification::CandidateMaster, 6),
        RankingItem::scored(Qualification::First, true),
        RankingItem::scored(Qualification::Second, true),
        RankingItem::scored(Qualification::Third, true),
        RankingItem::scored(Qualification::FirstYouth, false),
        RankingItem::scored(Qualification::SecondYouth, false),
        RankingItem::scored(Qualification::ThirdYouth, false),
    ]
}

/// Assigns qualification ranks within one placed group.
///
/// Runs after placement, so places and elapsed times must be current.
/// `qual_of` supplies a result's competitor qualification. The computed
/// group rank and derived time thresholds are written back into the
/// ranking record.
pub fn assign_ranks<F>(members: &mut [&mut RaceResult], ranking: &mut Ranking, qual_of: F)
where
    F: Fn(&RaceResult) -> Qualification,
{
    for result in members.iter_mut() {
        result.assigned_rank = Qualification::NotQualified;
    }
    if !ranking.is_active {
        ranking.rank_scores = None;
        return;
    }

    let rank = group_rank(members, &qual_of);
    ranking.rank_scores = rank;

    if let Some(rank) = rank {
        let leader = members
            .iter()
            .filter(|r| counts_for_rank(r))
            .filter_map(|r| r.elapsed)
            .min();
        if let Some(leader) = leader {
            for item in &mut ranking.items {
                if item.is_active && item.use_scores {
                    item.max_time = time_for_rank(leader, item.qual, rank);
                }
            }
        }
    }

    let mut items: Vec<&RankingItem> = ranking.items.iter().collect();
    items.sort_by(|a, b| b.qual.scores().cmp(&a.qual.scores()));

    for result in members.iter_mut() {
        let Place::Numbered(place) = result.place else {
            continue;
        };
        if !result.status.qualifies() {
            continue;
        }
        for item in &items {
            if !item.is_active {
                continue;
            }
            let within_place = item.max_place >= place;
            let within_time = result
                .elapsed
                .zip(item.max_time)
                .is_some_and(|(elapsed, max)| max >= elapsed);
            if within_place || within_time {
                result.assigned_rank = item.qual;
                break;
            }
        }
    }
}

/// Sum of the ten best qualification scores among qualifying
/// in-competition finishers; `None` with fewer than ten.
fn group_rank<F>(members: &[&mut RaceResult], qual_of: &F) -> Option<u32>
where
    F: Fn(&RaceResult) -> Qualification,
{
    let mut scores: Vec<u32> = members
        .iter()
        .filter(|r| counts_for_rank(r))
        .map(|r| qual_of(r).scores())
        .collect();
    if scores.len() < 10 {
        return None;
    }
    scores.sort_unstable_by(|a, b| b.cmp(a));
    Some(scores.iter().take(10).sum())
}

fn counts_for_rank(result: &RaceResult) -> bool {
    result.status.qualifies() && matches!(result.place, Place::Numbered(_))
}

fn time_for_rank(leader: OTime, qual: Qualification, rank: u32) -> Option<OTime> {
    let percent = percent_for_rank(qual, rank);
    if percent == 0 {
        return None;
    }
    let msec = (leader.as_msec() * i64::from(percent) + 50) / 100;
    Some(OTime::from_msec(msec))
}

/// Percent of the leader time still awarded, per qualification, keyed
/// by the lowest group rank each step applies from.
fn percent_for_rank(qual: Qualification, rank: u32) -> u32 {
    let table: &[(u32, u32)] = match qual {
        Qualification::First => &[
            (1_000, 136),
            (850, 133),
            (750, 130),
            (650, 127),
            (500, 124),
            (425, 121),
            (375, 118),
            (325, 115),
            (250, 112),
            (211, 109),
            (185, 106),
            (159, 103),
            (120, 100),
        ],
        Qualification::Second => &[
            (1_000, 151),
            (850, 148),
            (750, 145),
            (650, 142),
            (500, 139),
            (425, 136),
            (375, 133),
            (325, 130),
            (250, 127),
            (211, 124),
            (185, 121),
            (159, 118),
            (120, 115),
            (102, 112),
            (90, 109),
            (78, 106),
            (60, 103),
            (51, 100),
        ],
        Qualification::Third => &[
            (1_000, 169),
            (850, 166),
            (750, 163),
            (650, 160),
            (500, 157),
            (425, 154),
            (375, 151),
            (325, 148),
            (250, 145),
            (211, 142),
            (185, 139),
            (159, 136),
            (120, 133),
            (102, 130),
            (90, 127),
            (78, 124),
            (60, 121),
            (51, 118),
            (45, 115),
            (39, 112),
            (30, 109),
            (27, 106),
            (25, 103),
            (23, 100),
        ],
        Qualification::FirstYouth => &[
            (250, 0),
            (211, 172),
            (185, 168),
            (159, 164),
            (120, 160),
            (102, 156),
            (90, 152),
            (78, 148),
            (60, 144),
            (51, 140),
            (45, 136),
            (39, 132),
            (30, 128),
            (27, 124),
            (25, 120),
            (23, 116),
            (20, 112),
            (17, 108),
            (15, 104),
            (13, 100),
        ],
        Qualification::SecondYouth => &[
            (250, 0),
            (211, 205),
            (185, 200),
            (159, 195),
            (120, 190),
            (102, 185),
            (90, 180),
            (78, 175),
            (60, 170),
            (51, 165),
            (45, 160),
            (39, 155),
            (30, 150),
            (27, 145),
            (25, 140),
            (23, 135),
            (20, 130),
            (17, 125),
            (15, 120),
            (13, 115),
            (11, 110),
            (10, 105),
            (7, 100),
        ],
        _ => &[],
    };
    table
        .iter()
        .find(|(threshold, _)| *threshold <= rank)
        .map_or(0, |(_, percent)| *percent)
}
