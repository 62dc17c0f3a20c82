//! Contract for the rendering collaborator.

/// Receives frames from the simulation.
///
/// In zero-copy mode the GPU engine has already written the shared surface,
/// so only [`FrameSink::render`] is called.
pub trait FrameSink {
    /// Upload a host-side frame: `width * height` interleaved `(U, V)` pairs.
    fn update_texture(&mut self, data: &[f32]);

    fn render(&mut self);
}

/// Sink that counts calls and keeps the last uploaded frame.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordingSink {
    pub uploads: usize,
    pub renders: usize,
    pub last_frame: Vec<f32>,
}

#[cfg(test)]
impl FrameSink for RecordingSink {
    fn update_texture(&mut self, data: &[f32]) {
        self.uploads += 1;
        self.last_frame.clear();
        self.last_frame.extend_from_slice(data);
    }

    fn render(&mut self) {
        self.renders += 1;
    }
}
