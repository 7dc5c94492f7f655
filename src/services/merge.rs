use crate::models::update::JobUpdate;

/// Filters updates arriving from several delivery paths for one job.
///
/// Percentage is the ordering key: arrival order across paths is not. The
/// first terminal update wins and everything after it is dropped.
#[derive(Debug, Default)]
pub struct UpdateMerger {
    last: Option<JobUpdate>,
    finished: bool,
}

impl UpdateMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the update if the consumer should see it.
    pub fn offer(&mut self, update: JobUpdate) -> Option<JobUpdate> {
        if self.finished {
            return None;
        }

        if update.is_terminal() {
            self.finished = true;
            self.last = Some(update.clone());
            return Some(update);
        }

        if let Some(last) = &self.last {
            if update.percentage < last.percentage {
                return None;
            }
            if update.percentage == last.percentage
                && update.status == last.status
                && update.stage == last.stage
            {
                return None;
            }
        }

        self.last = Some(update.clone());
        Some(update)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn latest(&self) -> Option<&JobUpdate> {
        self.last.as_ref()
    }
}
