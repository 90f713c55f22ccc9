use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSensor {
    pub address: String,
    pub last_seen: Instant,
}

/// What to do with an advertisement after it has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The sender was just selected; its reading is not used yet.
    Selected,
    /// The sender is the selected sensor; feed the reading.
    Feed,
    /// Some other sensor is selected.
    Ignore,
}

/// Discovered tilt sensors in discovery order, plus the one being displayed.
#[derive(Debug, Default)]
pub struct SensorRegistry {
    sensors: Vec<DiscoveredSensor>,
    selected: Option<String>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an advertisement from `address` seen at `now`.
    pub fn observe(&mut self, address: &str, now: Instant) -> Admission {
        match self.sensors.iter_mut().find(|s| s.address == address) {
            Some(sensor) => sensor.last_seen = now,
            None => {
                tracing::info!(%address, "Tilt sensor discovered");
                self.sensors.push(DiscoveredSensor {
                    address: address.to_string(),
                    last_seen: now,
                });
            }
        }

        match &self.selected {
            None => {
                tracing::info!(%address, "Tilt sensor selected");
                self.selected = Some(address.to_string());
                Admission::Selected
            }
            Some(selected) if selected == address => Admission::Feed,
            Some(_) => Admission::Ignore,
        }
    }

    /// Drop sensors not seen within `timeout`. Returns how many were removed.
    pub fn prune(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.sensors.len();
        self.sensors
            .retain(|s| now.saturating_duration_since(s.last_seen) < timeout);
        let removed = before - self.sensors.len();

        let selection_gone = self
            .selected
            .as_ref()
            .is_some_and(|sel| !self.sensors.iter().any(|s| &s.address == sel));
        if selection_gone {
            if let Some(address) = self.selected.take() {
                tracing::info!(%address, "Selected tilt sensor timed out");
            }
        }
        removed
    }

    pub fn sensors(&self) -> &[DiscoveredSensor] {
        &self.sensors
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Select a discovered sensor by address, or clear the selection with `None`.
    /// Returns false if the address is unknown.
    pub fn select(&mut self, address: Option<&str>) -> bool {
        match address {
            None => {
                self.selected = None;
                true
            }
            Some(address) if self.sensors.iter().any(|s| s.address == address) => {
                self.selected = Some(address.to_string());
                true
            }
            Some(_) => false,
        }
    }

    pub fn select_next(&mut self) -> Option<&str> {
        self.step_selection(1)
    }

    pub fn select_previous(&mut self) -> Option<&str> {
        self.step_selection(-1)
    }

    fn step_selection(&mut self, offset: isize) -> Option<&str> {
        let count = self.sensors.len() as isize;
        if count == 0 {
            self.selected = None;
            return None;
        }

        let current = self
            .selected
            .as_ref()
            .and_then(|sel| self.sensors.iter().position(|s| &s.address == sel));
        let next = match current {
            Some(i) => (i as isize + offset).rem_euclid(count),
            None if offset >= 0 => 0,
            None => count - 1,
        } as usize;

        self.selected = Some(self.sensors[next].address.clone());
        self.selected.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[test]
    fn first_sensor_is_selected_then_fed() {
        let mut reg = SensorRegistry::new();
        let t0 = Instant::now();

        assert_eq!(reg.observe("aa", t0), Admission::Selected);
        assert_eq!(reg.observe("bb", t0), Admission::Ignore);
        assert_eq!(reg.observe("aa", t0), Admission::Feed);
        assert_eq!(reg.sensors().len(), 2);
        assert_eq!(reg.selected(), Some("aa"));
    }

    #[test]
    fn stale_sensors_are_pruned() {
        let mut reg = SensorRegistry::new();
        let t0 = Instant::now();
        reg.observe("aa", t0);
        reg.observe("bb", t0 + Duration::from_secs(20));

        assert_eq!(reg.prune(t0 + Duration::from_secs(29), TIMEOUT), 0);
        assert_eq!(reg.prune(t0 + Duration::from_secs(30), TIMEOUT), 1);
        assert_eq!(reg.selected(), None);
        assert_eq!(reg.sensors()[0].address, "bb");
    }

    #[test]
    fn refreshed_sensor_survives_prune() {
        let mut reg = SensorRegistry::new();
        let t0 = Instant::now();
        reg.observe("aa", t0);
        reg.observe("aa", t0 + Duration::from_secs(25));
        assert_eq!(reg.prune(t0 + Duration::from_secs(40), TIMEOUT), 0);
        assert_eq!(reg.selected(), Some("aa"));
    }

    #[test]
    fn selection_cycles_with_wraparound() {
        let mut reg = SensorRegistry::new();
        let t0 = Instant::now();
        for addr in ["aa", "bb", "cc"] {
            reg.observe(addr, t0);
        }

        assert_eq!(reg.select_next(), Some("bb"));
        assert_eq!(reg.select_next(), Some("cc"));
        assert_eq!(reg.select_next(), Some("aa"));
        assert_eq!(reg.select_previous(), Some("cc"));
    }

    #[test]
    fn explicit_selection() {
        let mut reg = SensorRegistry::new();
        reg.observe("aa", Instant::now());
        reg.observe("bb", Instant::now());

        assert!(!reg.select(Some("zz")));
        assert!(reg.select(Some("bb")));
        assert_eq!(reg.selected(), Some("bb"));
        assert!(reg.select(None));
        assert_eq!(reg.select_previous(), Some("bb"));
    }

    #[test]
    fn empty_registry_has_nothing_to_select() {
        let mut reg = SensorRegistry::new();
        assert_eq!(reg.select_next(), None);
    }
}
