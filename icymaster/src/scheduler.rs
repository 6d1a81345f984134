//! Ordonnanceur des lancements différés (`AT`).
//!
//! File à priorité triée par échéance, servie par une unique tâche : elle
//! dort jusqu'à la prochaine échéance et se réarme quand une entrée plus
//! proche est insérée. Le tir est remis au registre, qui ignore les entrées
//! périmées (player annulé entre-temps).

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::model::PlayerId;
use crate::registry::PlayerRegistry;

/// Action différée consommée au tir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    /// Passage `Scheduled → Running` via le registre.
    Launch(PlayerId),
    /// Fin de la durée de fonctionnement : QUIT vers le player.
    Stop(PlayerId),
}

#[derive(Debug)]
struct Entry {
    due: DateTime<Local>,
    /// Départage FIFO des échéances identiques.
    seq: u64,
    action: ScheduledAction,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

pub struct Scheduler {
    queue: Mutex<BinaryHeap<Reverse<Entry>>>,
    notify: Notify,
    seq: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
        })
    }

    /// Insère une entrée et réveille la tâche de garde.
    pub fn schedule(&self, due: DateTime<Local>, action: ScheduledAction) {
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        info!(?action, %due, "schedule entry added");
        self.queue
            .lock()
            .expect("scheduler queue poisoned")
            .push(Reverse(Entry { due, seq, action }));
        self.notify.notify_one();
    }

    /// Démarre la tâche de garde du minuteur.
    pub fn spawn(self: &Arc<Self>, registry: Arc<PlayerRegistry>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run(registry).await })
    }

    async fn run(&self, registry: Arc<PlayerRegistry>) {
        loop {
            let next_due = {
                let queue = self.queue.lock().expect("scheduler queue poisoned");
                queue.peek().map(|Reverse(entry)| entry.due)
            };
            match next_due {
                None => self.notify.notified().await,
                Some(due) => {
                    let now = Local::now();
                    if due <= now {
                        let entry = self
                            .queue
                            .lock()
                            .expect("scheduler queue poisoned")
                            .pop();
                        if let Some(Reverse(entry)) = entry {
                            self.fire(&registry, entry.action).await;
                        }
                    } else {
                        let wait = (due - now).to_std().unwrap_or(Duration::ZERO);
                        tokio::select! {
                            _ = tokio::time::sleep(wait) => {}
                            // Nouvelle entrée, peut-être plus proche.
                            _ = self.notify.notified() => {}
                        }
                    }
                }
            }
        }
    }

    async fn fire(&self, registry: &Arc<PlayerRegistry>, action: ScheduledAction) {
        match action {
            ScheduledAction::Launch(id) => registry.fire_scheduled(id).await,
            ScheduledAction::Stop(id) => {
                // Déjà arrêté ou crashé : la fin de durée est sans objet.
                if let Err(e) = registry.quit(id).await {
                    debug!(id, "end-of-duration stop skipped: {e}");
                }
            }
        }
    }
}

/// Prochaine occurrence locale de `hour:minute`, au moins une seconde dans
/// le futur : un `AT` visant l'instant courant ne doit pas tirer avant que
/// la session qui l'a émis ait reçu son `OK`.
pub fn next_occurrence(now: DateTime<Local>, hour: u32, minute: u32) -> DateTime<Local> {
    let margin = now + chrono::Duration::seconds(1);
    let mut date = now.date_naive();
    loop {
        if let Some(naive) = date.and_hms_opt(hour, minute, 0) {
            // earliest() tranche les heures locales ambiguës (DST).
            if let Some(candidate) = Local.from_local_datetime(&naive).earliest() {
                if candidate >= margin {
                    return candidate;
                }
            }
        }
        date = date.succ_opt().expect("calendar overflow");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn future_time_today_is_kept_today() {
        let now = Local.with_ymd_and_hms(2026, 8, 25, 8, 0, 0).unwrap();
        let due = next_occurrence(now, 9, 30);
        assert_eq!(due.date_naive(), now.date_naive());
        assert_eq!((due.hour(), due.minute(), due.second()), (9, 30, 0));
    }

    #[test]
    fn past_time_rolls_to_tomorrow() {
        let now = Local.with_ymd_and_hms(2026, 8, 25, 14, 0, 0).unwrap();
        let due = next_occurrence(now, 9, 30);
        assert_eq!(due.date_naive(), now.date_naive().succ_opt().unwrap());
    }

    #[test]
    fn exact_current_minute_is_pushed_a_day() {
        // 9:30:00 pile : la marge d'une seconde rejette l'occurrence du jour.
        let now = Local.with_ymd_and_hms(2026, 8, 25, 9, 30, 0).unwrap();
        let due = next_occurrence(now, 9, 30);
        assert!(due > now);
        assert_eq!(due.date_naive(), now.date_naive().succ_opt().unwrap());
    }

    #[test]
    fn seconds_before_the_minute_still_count_as_future() {
        let now = Local.with_ymd_and_hms(2026, 8, 25, 9, 29, 58).unwrap();
        let due = next_occurrence(now, 9, 30);
        assert_eq!(due.date_naive(), now.date_naive());
    }
}
