//! Deduplicated observations, keyed by year then sub-period

use std::collections::BTreeMap;

use tracing::warn;

use crate::observations::RawObservation;

/// What a sub-period means for a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// sub-periods are months, anything outside 1..=12 is noise
    Monthly,
    /// one value per year, stored under sub-period 0
    Annual,
}

impl Granularity {
    fn accepts(self, sub_period: u32) -> bool {
        match self {
            Granularity::Monthly => (1..=12).contains(&sub_period),
            Granularity::Annual => sub_period == 0,
        }
    }
}

/// At most one value per `(year, sub-period)`, both levels iterating in ascending order
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodTable {
    granularity: Granularity,
    years: BTreeMap<i32, BTreeMap<u32, f64>>,
}

impl PeriodTable {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            years: BTreeMap::new(),
        }
    }

    /// Stores an observation, replacing any earlier value for the same period.
    ///
    /// Returns `false` when the sub-period is out of range for the granularity and the
    /// observation was dropped.
    pub fn insert(&mut self, observation: RawObservation) -> bool {
        if !self.granularity.accepts(observation.sub_period) {
            return false;
        }
        let previous = self
            .years
            .entry(observation.year)
            .or_default()
            .insert(observation.sub_period, observation.value);
        // annual tables are fed in date order and overwrite on purpose
        if let Some(previous) = previous {
            if self.granularity == Granularity::Monthly && previous != observation.value {
                warn!(
                    "{}-{} seen as both {previous} and {}, keeping the latter",
                    observation.year, observation.sub_period, observation.value
                );
            }
        }
        true
    }

    pub fn year(&self, year: i32) -> Option<&BTreeMap<u32, f64>> {
        self.years.get(&year)
    }

    pub fn years(&self) -> impl Iterator<Item = (i32, &BTreeMap<u32, f64>)> {
        self.years.iter().map(|(&year, periods)| (year, periods))
    }

    /// Number of `(year, sub-period)` pairs held
    pub fn len(&self) -> usize {
        self.years.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Drops every year before `start_year`
    pub fn retain_from(&mut self, start_year: i32) {
        self.years.retain(|&year, _| year >= start_year);
    }
}

/// Collapses observations into a table, last observation winning per period.
pub fn aggregate<I>(observations: I, granularity: Granularity) -> PeriodTable
where
    I: IntoIterator<Item = RawObservation>,
{
    let mut table = PeriodTable::new(granularity);
    for observation in observations {
        table.insert(observation);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn obs(year: i32, sub_period: u32, value: f64) -> RawObservation {
        RawObservation {
            year,
            sub_period,
            value,
        }
    }

    #[test]
    fn collapses_duplicates() {
        let table = aggregate(
            vec![obs(2023, 1, 5.0), obs(2023, 2, -2.0), obs(2023, 2, -2.0), obs(2023, 3, 3.0)],
            Granularity::Monthly,
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.year(2023).map(BTreeMap::len), Some(3));
    }

    #[test]
    fn last_write_wins() {
        let table = aggregate(
            vec![obs(2023, 4, 1.0), obs(2023, 4, 1.5)],
            Granularity::Monthly,
        );
        assert_eq!(table.year(2023).and_then(|m| m.get(&4)), Some(&1.5));
    }

    #[test]
    fn discards_months_out_of_range() {
        let mut table = PeriodTable::new(Granularity::Monthly);
        assert!(!table.insert(obs(2023, 0, 1.0)));
        assert!(!table.insert(obs(2023, 13, 1.0)));
        assert!(table.insert(obs(2023, 12, 1.0)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn annual_tables_only_take_sub_period_zero() {
        let table = aggregate(
            vec![obs(2020, 0, 10.0), obs(2020, 0, 11.0), obs(2021, 5, 12.0)],
            Granularity::Annual,
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.year(2020).and_then(|m| m.get(&0)), Some(&11.0));
    }

    #[test]
    fn iterates_in_ascending_order() {
        let table = aggregate(
            vec![obs(2024, 3, 1.0), obs(2022, 11, 1.0), obs(2022, 2, 1.0), obs(2023, 1, 1.0)],
            Granularity::Monthly,
        );
        let keys: Vec<(i32, Vec<u32>)> = table
            .years()
            .map(|(y, months)| (y, months.keys().copied().collect()))
            .collect();
        assert_eq!(
            keys,
            vec![(2022, vec![2, 11]), (2023, vec![1]), (2024, vec![3])]
        );
    }

    #[test]
    fn retain_from_drops_earlier_years() {
        let mut table = aggregate(
            vec![obs(2019, 1, 1.0), obs(2020, 1, 1.0), obs(2021, 1, 1.0)],
            Granularity::Monthly,
        );
        table.retain_from(2020);
        assert_eq!(table.years().map(|(y, _)| y).collect::<Vec<_>>(), vec![2020, 2021]);
    }

    #[test]
    fn empty_input_is_an_empty_table() {
        let table = aggregate(Vec::new(), Granularity::Monthly);
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    // repeated periods carry the same value, as they do on the pages we read
    fn observations() -> impl Strategy<Value = Vec<RawObservation>> {
        prop::collection::vec((2000i32..2030, 0u32..14), 0..60).prop_map(|keys| {
            keys.into_iter()
                .map(|(year, month)| obs(year, month, f64::from(year % 7) - f64::from(month) / 4.0))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn aggregation_ignores_input_order(
            (original, shuffled) in observations()
                .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
        ) {
            prop_assert_eq!(
                aggregate(original, Granularity::Monthly),
                aggregate(shuffled, Granularity::Monthly)
            );
        }

        #[test]
        fn one_value_per_period(input in observations()) {
            let distinct: std::collections::BTreeSet<(i32, u32)> = input
                .iter()
                .filter(|o| (1..=12).contains(&o.sub_period))
                .map(|o| (o.year, o.sub_period))
                .collect();
            prop_assert_eq!(aggregate(input, Granularity::Monthly).len(), distinct.len());
        }
    }
}
