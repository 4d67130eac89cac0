//! Link manager configuration

/// Configuration for the link manager
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Size of the session read buffer in bytes
    pub read_buffer_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024,
        }
    }
}
