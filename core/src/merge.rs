//! Merged presence trackers.
//!
//! A merged tracker combines the home/away states of several member
//! trackers into one virtual tracker. The combination rule itself is a
//! pure recomputation over the members' last known states; the async
//! wiring funnels every member's watch channel through a single queue so
//! status changes apply one at a time, in arrival order.

use hashbrown::HashMap;
use roomsense_types::{MergeMode, PresenceState};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Aggregation state machine for one merged tracker.
pub struct MergedTracker {
    name: String,
    mode: MergeMode,
    members: HashMap<String, PresenceState>,
    status_tx: watch::Sender<PresenceState>,
}

impl MergedTracker {
    /// Membership is fixed here; there is no runtime add/remove.
    pub fn new(
        name: impl Into<String>,
        mode: MergeMode,
        member_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        let members = member_ids
            .into_iter()
            .map(|id| (id, PresenceState::Unknown))
            .collect();
        let (status_tx, _) = watch::channel(PresenceState::Unknown);
        Self { name: name.into(), mode, members, status_tx }
    }

    /// Record one member's new status and recompute the merged state.
    /// Updates for ids outside the configured membership are ignored.
    pub fn on_member_status_changed(&mut self, member_id: &str, status: PresenceState) {
        match self.members.get_mut(member_id) {
            Some(slot) => *slot = status,
            None => {
                tracing::debug!(tracker = %self.name, member = member_id, "status change for unknown member ignored");
                return;
            }
        }

        let merged = self.merged();
        self.status_tx.send_if_modified(|current| {
            if *current == merged {
                false
            } else {
                *current = merged;
                true
            }
        });
    }

    pub fn merged_status(&self) -> PresenceState {
        *self.status_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PresenceState> {
        self.status_tx.subscribe()
    }

    /// The combination rule. With no member state known the answer is
    /// unknown; otherwise `AwayWhenAny` goes away on the first away
    /// member, `AwayWhenAll` stays home while any member is home.
    fn merged(&self) -> PresenceState {
        if !self.members.values().any(|s| s.is_known()) {
            return PresenceState::Unknown;
        }
        let any = |wanted: PresenceState| self.members.values().any(|&s| s == wanted);
        match self.mode {
            MergeMode::AwayWhenAny => {
                if any(PresenceState::NotHome) {
                    PresenceState::NotHome
                } else {
                    PresenceState::Home
                }
            }
            MergeMode::AwayWhenAll => {
                if any(PresenceState::Home) {
                    PresenceState::Home
                } else {
                    PresenceState::NotHome
                }
            }
        }
    }
}

/// One member feed handed to [`MergedHandle::spawn`].
pub struct MergedMember {
    pub id: String,
    pub presence: watch::Receiver<PresenceState>,
}

/// A running merged tracker: the consumer task that owns the
/// [`MergedTracker`], plus one forwarder task per member.
#[derive(Debug)]
pub struct MergedHandle {
    name: String,
    mode: MergeMode,
    member_ids: Vec<String>,
    status_rx: watch::Receiver<PresenceState>,
    tasks: Vec<JoinHandle<()>>,
}

impl MergedHandle {
    pub fn spawn(name: impl Into<String>, mode: MergeMode, members: Vec<MergedMember>) -> Self {
        let name = name.into();
        let member_ids: Vec<String> = members.iter().map(|m| m.id.clone()).collect();

        let mut tracker = MergedTracker::new(name.clone(), mode, member_ids.iter().cloned());
        let status_rx = tracker.subscribe();

        // Seed from the members' current states so the merged value is
        // meaningful before the first change event arrives.
        for member in &members {
            tracker.on_member_status_changed(&member.id, *member.presence.borrow());
        }

        let (queue_tx, mut queue_rx) = mpsc::channel::<(String, PresenceState)>(16);
        let mut tasks = Vec::with_capacity(members.len() + 1);

        for MergedMember { id, presence: mut rx } in members {
            let queue_tx = queue_tx.clone();
            tasks.push(tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let status = *rx.borrow_and_update();
                    if queue_tx.send((id.clone(), status)).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(queue_tx);

        tasks.push(tokio::spawn(async move {
            while let Some((id, status)) = queue_rx.recv().await {
                tracker.on_member_status_changed(&id, status);
            }
        }));

        Self { name, mode, member_ids, status_rx, tasks }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    pub fn member_ids(&self) -> &[String] {
        &self.member_ids
    }

    pub fn status(&self) -> PresenceState {
        *self.status_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PresenceState> {
        self.status_rx.clone()
    }

    /// Stop all forwarders and the consumer. Idempotent.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tracker(mode: MergeMode) -> MergedTracker {
        MergedTracker::new(
            "family",
            mode,
            ["a", "b", "c"].into_iter().map(String::from),
        )
    }

    #[test]
    fn test_all_unknown_is_unknown_in_both_modes() {
        for mode in [MergeMode::AwayWhenAny, MergeMode::AwayWhenAll] {
            let tracker = make_tracker(mode);
            assert_eq!(tracker.merged_status(), PresenceState::Unknown);
        }
    }

    #[test]
    fn test_away_when_any_goes_away_on_first_away_member() {
        let mut tracker = make_tracker(MergeMode::AwayWhenAny);
        tracker.on_member_status_changed("a", PresenceState::Home);
        tracker.on_member_status_changed("b", PresenceState::NotHome);
        // {home, away, unknown} -> away
        assert_eq!(tracker.merged_status(), PresenceState::NotHome);
    }

    #[test]
    fn test_away_when_all_stays_home_while_any_member_is_home() {
        let mut tracker = make_tracker(MergeMode::AwayWhenAll);
        tracker.on_member_status_changed("a", PresenceState::Home);
        tracker.on_member_status_changed("b", PresenceState::NotHome);
        // {home, away, unknown} -> home
        assert_eq!(tracker.merged_status(), PresenceState::Home);
    }

    #[test]
    fn test_away_when_all_goes_away_once_no_member_is_home() {
        let mut tracker = make_tracker(MergeMode::AwayWhenAll);
        tracker.on_member_status_changed("a", PresenceState::NotHome);
        assert_eq!(tracker.merged_status(), PresenceState::NotHome);
    }

    #[test]
    fn test_away_when_any_comes_home_when_all_known_members_are_home() {
        let mut tracker = make_tracker(MergeMode::AwayWhenAny);
        tracker.on_member_status_changed("a", PresenceState::Home);
        assert_eq!(tracker.merged_status(), PresenceState::Home);
    }

    #[test]
    fn test_member_returning_to_unknown_can_blank_the_tracker() {
        let mut tracker = make_tracker(MergeMode::AwayWhenAny);
        tracker.on_member_status_changed("a", PresenceState::Home);
        tracker.on_member_status_changed("a", PresenceState::Unknown);
        assert_eq!(tracker.merged_status(), PresenceState::Unknown);
    }

    #[test]
    fn test_unknown_member_id_is_ignored() {
        let mut tracker = make_tracker(MergeMode::AwayWhenAny);
        tracker.on_member_status_changed("intruder", PresenceState::NotHome);
        assert_eq!(tracker.merged_status(), PresenceState::Unknown);
    }

    #[tokio::test]
    async fn test_wired_members_drive_merged_status() {
        let (tx_a, rx_a) = watch::channel(PresenceState::Unknown);
        let (tx_b, rx_b) = watch::channel(PresenceState::Unknown);

        let handle = MergedHandle::spawn(
            "family",
            MergeMode::AwayWhenAny,
            vec![
                MergedMember { id: "a".into(), presence: rx_a },
                MergedMember { id: "b".into(), presence: rx_b },
            ],
        );
        let mut status = handle.subscribe();
        assert_eq!(*status.borrow_and_update(), PresenceState::Unknown);

        tx_a.send_replace(PresenceState::Home);
        status.changed().await.unwrap();
        assert_eq!(*status.borrow_and_update(), PresenceState::Home);

        tx_b.send_replace(PresenceState::NotHome);
        status.changed().await.unwrap();
        assert_eq!(*status.borrow_and_update(), PresenceState::NotHome);

        handle.shutdown();
    }
}
