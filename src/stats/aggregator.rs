use crate::db::models::{Role, VoteRecord};
use serde::{Deserialize, Serialize};

/// Aggregate view of the full vote set. Never persisted; recomputable at any
/// time with [`compute`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub average_all: Option<f64>,
    pub average_gdf: Option<f64>,
    pub average_sv: Option<f64>,
    pub total_votes: u64,
    pub count_gdf: u64,
    pub count_sv: u64,
}

impl Stats {
    /// All averages null, all counts zero.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Folds one vote into this aggregate without looking at the vote set.
    ///
    /// Each affected mean is rebuilt as `(mean * count + value) / (count + 1)`
    /// from the already-rounded previous mean, so the result can drift from
    /// [`compute`] by a tenth; reconciliation corrects that.
    pub fn with_vote(&self, role: Role, value: i32) -> Stats {
        let mut next = self.clone();
        next.average_all = Some(fold_mean(self.average_all, self.total_votes, value));
        next.total_votes += 1;
        match role {
            Role::Gdf => {
                next.average_gdf = Some(fold_mean(self.average_gdf, self.count_gdf, value));
                next.count_gdf += 1;
            }
            Role::Sv => {
                next.average_sv = Some(fold_mean(self.average_sv, self.count_sv, value));
                next.count_sv += 1;
            }
        }
        next
    }
}

/// Rounds to one decimal place, halves away from zero.
pub fn round_one_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn fold_mean(mean: Option<f64>, count: u64, value: i32) -> f64 {
    let previous_sum = mean.unwrap_or(0.0) * count as f64;
    round_one_decimal((previous_sum + value as f64) / (count + 1) as f64)
}

fn mean(sum: i64, count: u64) -> Option<f64> {
    (count > 0).then(|| round_one_decimal(sum as f64 / count as f64))
}

/// Canonical aggregate of `votes`. Order-independent and total over any input.
pub fn compute(votes: &[VoteRecord]) -> Stats {
    let (mut sum_gdf, mut count_gdf) = (0i64, 0u64);
    let (mut sum_sv, mut count_sv) = (0i64, 0u64);

    for vote in votes {
        match vote.role {
            Role::Gdf => {
                sum_gdf += i64::from(vote.value);
                count_gdf += 1;
            }
            Role::Sv => {
                sum_sv += i64::from(vote.value);
                count_sv += 1;
            }
        }
    }

    let total_votes = count_gdf + count_sv;
    Stats {
        average_all: mean(sum_gdf + sum_sv, total_votes),
        average_gdf: mean(sum_gdf, count_gdf),
        average_sv: mean(sum_sv, count_sv),
        total_votes,
        count_gdf,
        count_sv,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn votes(list: &[(Role, i32)]) -> Vec<VoteRecord> {
        list.iter()
            .map(|&(role, value)| VoteRecord { role, value })
            .collect()
    }

    fn assert_invariants(stats: &Stats) {
        assert_eq!(stats.total_votes, stats.count_gdf + stats.count_sv);
        assert_eq!(stats.average_all.is_none(), stats.total_votes == 0);
        assert_eq!(stats.average_gdf.is_none(), stats.count_gdf == 0);
        assert_eq!(stats.average_sv.is_none(), stats.count_sv == 0);
    }

    #[test]
    fn empty_input_yields_empty_stats() {
        let stats = compute(&[]);
        assert_eq!(stats, Stats::empty());
        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            json!({
                "averageAll": null,
                "averageGdf": null,
                "averageSv": null,
                "totalVotes": 0,
                "countGdf": 0,
                "countSv": 0,
            })
        );
    }

    #[test]
    fn one_vote_per_category() {
        let stats = compute(&votes(&[(Role::Gdf, 50), (Role::Sv, 70)]));
        assert_eq!(
            stats,
            Stats {
                average_all: Some(60.0),
                average_gdf: Some(50.0),
                average_sv: Some(70.0),
                total_votes: 2,
                count_gdf: 1,
                count_sv: 1,
            }
        );
    }

    #[test]
    fn missing_category_has_null_average() {
        let stats = compute(&votes(&[(Role::Sv, 10), (Role::Sv, 100)]));
        assert_eq!(stats.average_gdf, None);
        assert_eq!(stats.average_sv, Some(55.0));
        assert_eq!(stats.average_all, Some(55.0));
        assert_invariants(&stats);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // 41 / 4 = 10.25
        let stats = compute(&votes(&[
            (Role::Gdf, 10),
            (Role::Gdf, 10),
            (Role::Gdf, 10),
            (Role::Gdf, 11),
        ]));
        assert_eq!(stats.average_gdf, Some(10.3));

        // 43 / 4 = 10.75
        let stats = compute(&votes(&[
            (Role::Sv, 10),
            (Role::Sv, 11),
            (Role::Sv, 11),
            (Role::Sv, 11),
        ]));
        assert_eq!(stats.average_sv, Some(10.8));

        // 100 / 3 = 33.33..
        let stats = compute(&votes(&[(Role::Gdf, 30), (Role::Gdf, 30), (Role::Gdf, 40)]));
        assert_eq!(stats.average_gdf, Some(33.3));

        assert_eq!(round_one_decimal(0.25), 0.3);
        assert_eq!(round_one_decimal(-0.25), -0.3);
    }

    #[test]
    fn order_does_not_matter() {
        let mut list = votes(&[
            (Role::Gdf, 10),
            (Role::Sv, 35),
            (Role::Gdf, 99),
            (Role::Sv, 100),
            (Role::Gdf, 47),
        ]);
        let expected = compute(&list);
        assert_invariants(&expected);

        list.reverse();
        assert_eq!(compute(&list), expected);
        list.rotate_left(2);
        assert_eq!(compute(&list), expected);
        list.swap(0, 3);
        assert_eq!(compute(&list), expected);
    }

    #[test]
    fn invariants_hold_across_growing_vote_sets() {
        let mut list = Vec::new();
        for i in 0..40 {
            let role = if i % 3 == 0 { Role::Sv } else { Role::Gdf };
            list.push(VoteRecord {
                role,
                value: 10 + (i * 7) % 91,
            });
            assert_invariants(&compute(&list));
        }
    }

    #[test]
    fn with_vote_matches_compute_for_exact_means() {
        let base = compute(&votes(&[(Role::Gdf, 50)]));
        let next = base.with_vote(Role::Gdf, 60);
        assert_eq!(next.count_gdf, 2);
        assert_eq!(next.average_gdf, Some(55.0));
        assert_eq!(next, compute(&votes(&[(Role::Gdf, 50), (Role::Gdf, 60)])));
    }

    #[test]
    fn with_vote_on_empty_stats_starts_the_partition() {
        let next = Stats::empty().with_vote(Role::Sv, 42);
        assert_eq!(next, compute(&votes(&[(Role::Sv, 42)])));
        assert_invariants(&next);
    }
}
