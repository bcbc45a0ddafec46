use anyhow::Result;

/// Classifier backend trait.
///
/// A backend wraps one loaded model. It receives a read-only RGB24 frame and
/// returns one score per vocabulary entry of the category it was registered
/// for; the registry turns the scores into a label.
///
/// `classify` takes `&mut self` because model runtimes keep per-invocation
/// state (input/output tensors). The registry serializes calls through a
/// `Mutex`, so a backend never sees two frames at once.
pub trait ClassifierBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Score a frame. `pixels` is `width * height * 3` bytes of RGB24.
    fn classify(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<f32>>;

    /// Optional warm-up hook, run once at registration.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
