//! Scoped ownership of the temp handles acquired by one dispatch.

use tengine_fsops::TempFileHandle;

/// Handles acquired by one dispatch; released together when the dispatch ends.
#[derive(Debug, Default)]
pub(crate) struct HandleScope {
    handles: Vec<TempFileHandle>,
}

impl HandleScope {
    pub(crate) fn adopt(&mut self, handle: TempFileHandle) -> usize {
        self.handles.push(handle);
        self.handles.len() - 1
    }

    pub(crate) fn get(&self, slot: usize) -> &TempFileHandle {
        &self.handles[slot]
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> &mut TempFileHandle {
        &mut self.handles[slot]
    }

    pub(crate) async fn release(&mut self, slot: usize) {
        self.handles[slot].release().await;
    }

    pub(crate) async fn release_all(&mut self) {
        for handle in &mut self.handles {
            handle.release().await;
        }
    }

    pub(crate) fn all_released(&self) -> bool {
        self.handles.iter().all(TempFileHandle::is_released)
    }
}
