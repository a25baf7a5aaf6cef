use crate::record::Temperature;

/// Running statistic for one station.
///
/// `min` and `max` stay `None` until the first observation, so an empty
/// accumulator never has to invent an out-of-range sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StationStats {
    count: u64,
    min: Option<Temperature>,
    max: Option<Temperature>,
    /// Exact sum in tenths. Wide enough that no `u64` count of `i32`
    /// values can overflow it.
    sum: i128,
}

impl StationStats {
    pub fn new(temperature: Temperature) -> Self {
        Self {
            count: 1,
            min: Some(temperature),
            max: Some(temperature),
            sum: i128::from(temperature.tenths()),
        }
    }

    pub fn record(&mut self, temperature: Temperature) {
        self.count += 1;
        self.min = Some(self.min.map_or(temperature, |m| m.min(temperature)));
        self.max = Some(self.max.map_or(temperature, |m| m.max(temperature)));
        self.sum += i128::from(temperature.tenths());
    }

    pub fn merge(&mut self, other: &StationStats) {
        self.count += other.count;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.sum += other.sum;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Option<Temperature> {
        self.min
    }

    pub fn max(&self) -> Option<Temperature> {
        self.max
    }

    pub fn sum_tenths(&self) -> i128 {
        self.sum
    }

    /// Unrounded mean in degrees.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / 10.0 / self.count as f64)
    }

    /// Mean rounded half away from zero to whole tenths, computed exactly.
    pub fn rounded_mean(&self) -> Option<Temperature> {
        if self.count == 0 {
            return None;
        }
        let count = i128::from(self.count);
        let magnitude = (2 * self.sum.abs() + count) / (2 * count);
        let tenths = if self.sum < 0 { -magnitude } else { magnitude };
        // the mean lies between min and max, which are i32 tenths
        i32::try_from(tenths).ok().map(Temperature::from_tenths)
    }
}
