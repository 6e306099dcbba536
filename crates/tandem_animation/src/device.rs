//! Host-memory device buffers.
//!
//! [`HostBuffer`] stands in for GPU memory when running headless: uploads land
//! in a plain byte vector. A [`HostBufferProbe`] keeps a view of that memory
//! after the buffer itself has been handed to the scheduler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::{BufferId, DeviceBuffer};

#[derive(Debug)]
struct HostMemory {
    bytes: Mutex<Vec<u8>>,
    uploads: AtomicU64,
    bytes_uploaded: AtomicU64,
}

/// A device buffer backed by host memory.
#[derive(Debug)]
pub struct HostBuffer {
    id: BufferId,
    size: usize,
    memory: Arc<HostMemory>,
}

impl HostBuffer {
    /// Creates a zeroed buffer of `size` bytes with a fresh id.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self::with_id(BufferId::next(), size)
    }

    /// Creates a zeroed buffer of `size` bytes with the given id.
    #[must_use]
    pub fn with_id(id: BufferId, size: usize) -> Self {
        Self {
            id,
            size,
            memory: Arc::new(HostMemory {
                bytes: Mutex::new(vec![0; size]),
                uploads: AtomicU64::new(0),
                bytes_uploaded: AtomicU64::new(0),
            }),
        }
    }

    /// Id of this buffer.
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Returns a handle that observes this buffer's memory.
    #[must_use]
    pub fn probe(&self) -> HostBufferProbe {
        HostBufferProbe {
            id: self.id,
            memory: Arc::clone(&self.memory),
        }
    }
}

impl DeviceBuffer for HostBuffer {
    fn id(&self) -> BufferId {
        self.id
    }

    fn size(&self) -> usize {
        self.size
    }

    fn upload(&mut self, offset: usize, data: &[u8]) {
        let mut bytes = self.memory.bytes.lock();
        bytes[offset..offset + data.len()].copy_from_slice(data);
        self.memory.uploads.fetch_add(1, Ordering::Relaxed);
        self.memory
            .bytes_uploaded
            .fetch_add(data.len() as u64, Ordering::Relaxed);
    }
}

/// Read-only observer of a [`HostBuffer`].
#[derive(Debug, Clone)]
pub struct HostBufferProbe {
    id: BufferId,
    memory: Arc<HostMemory>,
}

impl HostBufferProbe {
    /// Id of the observed buffer.
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Copy of the device-side contents.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.memory.bytes.lock().clone()
    }

    /// Number of uploads received.
    #[must_use]
    pub fn upload_count(&self) -> u64 {
        self.memory.uploads.load(Ordering::Relaxed)
    }

    /// Total bytes received.
    #[must_use]
    pub fn bytes_uploaded(&self) -> u64 {
        self.memory.bytes_uploaded.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_sees_uploads() {
        let mut device = HostBuffer::with_id(BufferId::new(7), 8);
        let probe = device.probe();

        device.upload(2, &[5, 6]);
        assert_eq!(probe.id(), BufferId::new(7));
        assert_eq!(probe.contents(), vec![0, 0, 5, 6, 0, 0, 0, 0]);
        assert_eq!(probe.upload_count(), 1);
        assert_eq!(probe.bytes_uploaded(), 2);
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        assert_ne!(HostBuffer::new(4).id(), HostBuffer::new(4).id());
    }

    #[test]
    fn test_device_size() {
        let device = HostBuffer::new(12);
        assert_eq!(DeviceBuffer::size(&device), 12);
        assert_eq!(DeviceBuffer::id(&device), device.id());
    }
}
