//! Per-document render bookkeeping.
//!
//! Every render is tagged with the page, scale, and generation it was started
//! for. The generation moves on whenever earlier renders become stale (scale
//! change, new document, teardown), and a completion is only applied while
//! its tag still matches.

use pdf_engine::{RenderOutcome, RenderTask, TaskId};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Unrendered,
    Rendering(TaskId),
    Rendered,
}

/// What a render task was started for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTag {
    pub page_number: u32,
    pub scale: f32,
    pub generation: u64,
    pub task_id: TaskId,
}

#[derive(Debug)]
struct ActiveRender {
    tag: RenderTag,
    task: RenderTask,
}

#[derive(Debug)]
pub struct ViewerState {
    scale: f32,
    generation: u64,
    rendered_pages: BTreeSet<u32>,
    active_tasks: HashMap<u32, ActiveRender>,
}

impl ViewerState {
    pub fn new(scale: f32) -> Self {
        Self { scale, generation: 1, rendered_pages: BTreeSet::new(), active_tasks: HashMap::new() }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn render_state(&self, page_number: u32) -> RenderState {
        if let Some(active) = self.active_tasks.get(&page_number) {
            return RenderState::Rendering(active.tag.task_id);
        }
        if self.rendered_pages.contains(&page_number) {
            return RenderState::Rendered;
        }
        RenderState::Unrendered
    }

    pub fn rendered_pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.rendered_pages.iter().copied()
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered_pages.len()
    }

    pub fn active_count(&self) -> usize {
        self.active_tasks.len()
    }

    /// Tag for a render of `page_number` started now.
    pub fn tag_for(&self, page_number: u32, task_id: TaskId) -> RenderTag {
        RenderTag { page_number, scale: self.scale, generation: self.generation, task_id }
    }

    /// Record a started render. Any task already active for the page is
    /// cancelled; returns `true` in that case.
    pub fn begin(&mut self, tag: RenderTag, task: RenderTask) -> bool {
        self.rendered_pages.remove(&tag.page_number);

        match self.active_tasks.insert(tag.page_number, ActiveRender { tag, task }) {
            Some(previous) => {
                previous.task.cancel();
                true
            }
            None => false,
        }
    }

    /// A tag is current if it belongs to this generation and scale.
    pub fn is_current(&self, tag: &RenderTag) -> bool {
        tag.generation == self.generation && tag.scale == self.scale
    }

    pub fn mark_rendered(&mut self, page_number: u32) {
        self.rendered_pages.insert(page_number);
    }

    /// Remove and return every active task that reached a terminal state.
    pub fn take_finished(&mut self) -> Vec<(RenderTag, RenderOutcome)> {
        let mut finished = Vec::new();

        for active in self.active_tasks.values_mut() {
            if let Some(outcome) = active.task.try_outcome() {
                finished.push((active.tag, outcome));
            }
        }

        for (tag, _) in &finished {
            self.active_tasks.remove(&tag.page_number);
        }

        finished.sort_by_key(|(tag, _)| tag.page_number);
        finished
    }

    /// Cancel every active task and start a new generation. Returns how many
    /// tasks were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for (_, active) in self.active_tasks.drain() {
            if active.task.cancel() {
                cancelled += 1;
            }
        }
        self.generation += 1;
        cancelled
    }

    /// Switch to `scale`: every render becomes stale.
    pub fn rescale(&mut self, scale: f32) -> usize {
        let cancelled = self.cancel_all();
        self.rendered_pages.clear();
        self.scale = scale;
        cancelled
    }

    /// Forget everything about the current document, keeping the scale.
    pub fn reset(&mut self) -> usize {
        let cancelled = self.cancel_all();
        self.rendered_pages.clear();
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::RgbaImage;

    fn started(state: &mut ViewerState, page: u32) -> pdf_engine::RenderCompleter {
        let (task, completer) = RenderTask::channel(page);
        let tag = state.tag_for(page, task.id());
        state.begin(tag, task);
        completer
    }

    #[test]
    fn begin_marks_page_rendering() {
        let mut state = ViewerState::new(1.0);
        let _completer = started(&mut state, 2);

        assert!(matches!(state.render_state(2), RenderState::Rendering(_)));
        assert_eq!(state.render_state(1), RenderState::Unrendered);
        assert_eq!(state.active_count(), 1);
    }

    #[test]
    fn second_begin_cancels_previous_task() {
        let mut state = ViewerState::new(1.0);
        let first = started(&mut state, 1);

        let (task, _second) = RenderTask::channel(1);
        let tag = state.tag_for(1, task.id());
        assert!(state.begin(tag, task));

        assert!(first.is_cancelled());
        assert_eq!(state.active_count(), 1);
        assert_eq!(state.render_state(1), RenderState::Rendering(tag.task_id));
    }

    #[test]
    fn finished_tasks_leave_the_active_map() {
        let mut state = ViewerState::new(1.0);
        let completer = started(&mut state, 1);
        let _pending = started(&mut state, 2);

        completer.complete(Ok(RgbaImage::new(1, 1)));

        let finished = state.take_finished();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].0.page_number, 1);
        assert!(state.is_current(&finished[0].0));
        assert_eq!(state.active_count(), 1);
    }

    #[test]
    fn rescale_invalidates_everything() {
        let mut state = ViewerState::new(1.0);
        let completer = started(&mut state, 1);
        let tag = state.tag_for(1, 0);
        state.mark_rendered(3);

        assert_eq!(state.rescale(1.5), 1);

        assert!(completer.is_cancelled());
        assert_eq!(state.rendered_count(), 0);
        assert_eq!(state.active_count(), 0);
        assert!(!state.is_current(&tag));
        assert_eq!(state.scale(), 1.5);
    }

    #[test]
    fn reset_keeps_scale() {
        let mut state = ViewerState::new(1.25);
        state.mark_rendered(1);
        let before = state.generation();

        state.reset();

        assert_eq!(state.scale(), 1.25);
        assert_eq!(state.rendered_count(), 0);
        assert!(state.generation() > before);
    }
}
