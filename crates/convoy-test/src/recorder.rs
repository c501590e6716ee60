//! Notifier that remembers what it was told

use convoy_core::{CollisionNotice, FollowMode, Notifier};
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    collisions: Mutex<Vec<CollisionNotice>>,
    missing_targets: Mutex<usize>,
    confirmations: Mutex<Vec<(FollowMode, usize)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collisions(&self) -> Vec<CollisionNotice> {
        self.collisions.lock().clone()
    }

    pub fn missing_targets(&self) -> usize {
        *self.missing_targets.lock()
    }

    pub fn confirmations(&self) -> Vec<(FollowMode, usize)> {
        self.confirmations.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn wall_collision(&self, notice: &CollisionNotice) {
        self.collisions.lock().push(notice.clone());
    }

    fn missing_target(&self) {
        *self.missing_targets.lock() += 1;
    }

    fn follow_confirmed(&self, mode: FollowMode, count: usize) {
        self.confirmations.lock().push((mode, count));
    }
}
