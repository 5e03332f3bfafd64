/// Trait for handling progress events while a feed is loaded
pub trait ProgressHandler {
    /// Set total number of files the loader will look for
    fn set_total_files(&self, count: usize) {
        let _ = count;
    }

    /// Called when starting to load a file
    fn on_start_file_load(&self, file: &str);

    /// Called when finished loading a file, whether or not it existed
    fn on_finish_file_load(&self, file: &str);
}

/// A no-op progress handler
pub struct NoOpProgressHandler;

impl ProgressHandler for NoOpProgressHandler {
    fn on_start_file_load(&self, _file: &str) {}
    fn on_finish_file_load(&self, _file: &str) {}
}
