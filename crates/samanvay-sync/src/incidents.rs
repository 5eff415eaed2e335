use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use samanvay_core::Incident;
use tracing::debug;

use crate::notify::{Notification, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Inserted,
    Duplicate,
}

/// Pushes that land while a seed is outstanding stay ahead of the seeded set.
pub struct IncidentFeed {
    incidents: VecDeque<Incident>,
    ids: HashSet<i64>,
    pushed: u64,
    awaiting_seed: bool,
    pushed_while_awaiting: usize,
    notifier: Arc<dyn Notifier>,
}

impl IncidentFeed {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            incidents: VecDeque::new(),
            ids: HashSet::new(),
            pushed: 0,
            awaiting_seed: true,
            pushed_while_awaiting: 0,
            notifier,
        }
    }

    pub fn begin_reload(&mut self) {
        self.awaiting_seed = true;
        self.pushed_while_awaiting = 0;
    }

    #[must_use]
    pub const fn is_awaiting_seed(&self) -> bool {
        self.awaiting_seed
    }

    /// Repeated ids in `bulk` keep their first occurrence.
    pub fn initialize(&mut self, bulk: Vec<Incident>) {
        let keep = if self.awaiting_seed {
            self.pushed_while_awaiting
        } else {
            0
        };
        self.incidents.truncate(keep);
        self.ids = self.incidents.iter().map(|incident| incident.id).collect();

        let offered = bulk.len();
        for incident in bulk {
            if self.ids.insert(incident.id) {
                self.incidents.push_back(incident);
            }
        }

        let skipped = offered + keep - self.incidents.len();
        debug!(
            seeded = self.incidents.len() - keep,
            kept_pushed = keep,
            skipped,
            "incident feed initialized"
        );

        self.awaiting_seed = false;
        self.pushed_while_awaiting = 0;
    }

    pub fn on_incident_pushed(&mut self, incident: Incident) -> PushOutcome {
        if !self.ids.insert(incident.id) {
            debug!(incident_id = incident.id, "duplicate incident push ignored");
            return PushOutcome::Duplicate;
        }

        let alert = Notification::IncidentAlert {
            incident_id: incident.id,
            severity: incident.severity,
        };
        self.incidents.push_front(incident);
        self.pushed = self.pushed.saturating_add(1);
        if self.awaiting_seed {
            self.pushed_while_awaiting += 1;
        }

        self.notifier.notify(alert);
        PushOutcome::Inserted
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Incident> {
        self.incidents.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Incident> {
        self.incidents.iter()
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&Incident> {
        if !self.ids.contains(&id) {
            return None;
        }
        self.incidents.iter().find(|incident| incident.id == id)
    }

    #[must_use]
    pub const fn pushed_count(&self) -> u64 {
        self.pushed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}

impl std::fmt::Debug for IncidentFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentFeed")
            .field("len", &self.incidents.len())
            .field("pushed", &self.pushed)
            .field("awaiting_seed", &self.awaiting_seed)
            .finish_non_exhaustive()
    }
}
