//! Stratum weight totals from catch and specimen tables

use std::collections::BTreeMap;

use serde::Serialize;

use echostat_core::survey::{CatchRecord, SpecimenRecord};

/// Source of a weight total
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightGroup {
    /// Bulk haul weights from the catch table
    Unaged,
    /// Individually weighed specimens
    Aged,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupWeight {
    pub stratum_num: i64,
    pub group: WeightGroup,
    pub stratum_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StratumWeight {
    pub stratum_num: i64,
    pub weight_stratum_all: f64,
}

fn sum_by_stratum(rows: impl Iterator<Item = (i64, f64)>) -> BTreeMap<i64, f64> {
    let mut sums = BTreeMap::new();
    for (stratum, w) in rows {
        *sums.entry(stratum).or_insert(0.0) += w;
    }
    sums
}

/// Sum haul and specimen weights per stratum.
///
/// Returns the per-group table (all unaged rows, then all aged rows, strata
/// ascending within each group) and the combined total per stratum over the
/// union of strata.
pub fn sum_strata_weight(catch: &[CatchRecord], specimens: &[SpecimenRecord]) -> (Vec<GroupWeight>, Vec<StratumWeight>) {
    let unaged = sum_by_stratum(catch.iter().map(|c| (c.stratum_num, c.haul_weight)));
    let aged = sum_by_stratum(specimens.iter().map(|s| (s.stratum_num, s.weight)));

    let groups: Vec<GroupWeight> = [(WeightGroup::Unaged, &unaged), (WeightGroup::Aged, &aged)]
        .into_iter()
        .flat_map(|(group, sums)| {
            sums.iter().map(move |(&stratum_num, &stratum_weight)| GroupWeight {
                stratum_num,
                group,
                stratum_weight,
            })
        })
        .collect();

    let totals = sum_by_stratum(groups.iter().map(|g| (g.stratum_num, g.stratum_weight)))
        .into_iter()
        .map(|(stratum_num, weight_stratum_all)| StratumWeight {
            stratum_num,
            weight_stratum_all,
        })
        .collect();

    (groups, totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect()
    }

    #[test]
    fn test_sum_strata_weight() {
        let strata = [0, 1, 2, 4, 5];
        let weights = linspace(1.0, 5.0, 20);
        let lengths = linspace(10.0, 100.0, 20);
        let specimens: Vec<SpecimenRecord> = (0..20)
            .map(|i| SpecimenRecord {
                stratum_num: strata[i / 4],
                haul_num: (i / 4 + 1) as i64,
                length: lengths[i],
                weight: weights[i],
            })
            .collect();
        let catch: Vec<CatchRecord> = strata
            .iter()
            .zip([51.4, 0.6, 81.7, 16.2, 12.9])
            .enumerate()
            .map(|(i, (&stratum_num, haul_weight))| CatchRecord {
                stratum_num,
                haul_num: i as i64 + 1,
                haul_weight,
            })
            .collect();

        let (groups, totals) = sum_strata_weight(&catch, &specimens);

        assert_eq!(groups.len(), 10);
        assert_eq!(totals.len(), 5);
        assert!(groups[..5].iter().all(|g| g.group == WeightGroup::Unaged));
        assert!(groups[5..].iter().all(|g| g.group == WeightGroup::Aged));

        let expected = [56.663158, 9.231579, 93.7, 31.568421, 31.636842];
        for (t, e) in totals.iter().zip(expected) {
            assert!(
                (t.weight_stratum_all - e).abs() < 1e-6,
                "stratum {}: {} vs {}",
                t.stratum_num,
                t.weight_stratum_all,
                e
            );
        }
        let strata_out: Vec<i64> = totals.iter().map(|t| t.stratum_num).collect();
        assert_eq!(strata_out, vec![0, 1, 2, 4, 5]);
    }

    #[test]
    fn test_stratum_in_one_table_only() {
        let catch = vec![CatchRecord { stratum_num: 3, haul_num: 1, haul_weight: 2.0 }];
        let specimens = vec![SpecimenRecord { stratum_num: 1, haul_num: 2, length: 20.0, weight: 0.5 }];
        let (groups, totals) = sum_strata_weight(&catch, &specimens);
        assert_eq!(groups.len(), 2);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].stratum_num, 1);
        assert!((totals[0].weight_stratum_all - 0.5).abs() < 1e-12);
        assert!((totals[1].weight_stratum_all - 2.0).abs() < 1e-12);
    }
}
