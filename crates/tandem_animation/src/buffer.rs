//! # Animation Buffers
//!
//! CPU-visible staging for one GPU buffer.
//!
//! ## State Machine
//!
//! ```text
//!            write() / write_pod() / write_with()
//!                 ┌──────────┐
//!                 ▼          │
//!          ┌─────────────┐   │        publish() (dirty only)
//!          │  Writable   │───┘  ───────────────────────────┐
//!          │ (mapped)    │                                 ▼
//!          └─────────────┘                      ┌─────────────────────┐
//!                 ▲                             │  PublishedToDevice  │
//!                 │        upload finished      │  (unmapped, copying)│
//!                 └─────────────────────────────└─────────────────────┘
//! ```
//!
//! Both transitions happen inside [`AnimationBuffer::publish`], under the
//! buffer lock, so a write can never observe the buffer while the device copy
//! is in flight.
//!
//! Only the dirty byte span is uploaded: if an animation touched 4 KB of a
//! 4 MB vertex buffer, 4 KB crosses the bus.

use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::Pod;
use parking_lot::Mutex;

/// Identity of a GPU buffer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

impl BufferId {
    /// Wraps a raw id handed out by a GPU resource manager.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocates a process-unique id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf#{}", self.0)
    }
}

/// Device-side storage behind an [`AnimationBuffer`].
///
/// This is the driver boundary: implementations copy staged bytes into memory
/// the GPU reads from. `upload` is only ever called on the render thread,
/// from inside the owning buffer's publish, with the buffer lock held.
pub trait DeviceBuffer: Send {
    /// Identity of the underlying GPU resource.
    fn id(&self) -> BufferId;

    /// Size of the device store in bytes.
    fn size(&self) -> usize;

    /// Copies `data` into the device store at byte `offset`.
    fn upload(&mut self, offset: usize, data: &[u8]);

    /// Required alignment of upload offsets and lengths, in bytes.
    ///
    /// The dirty span is widened to this alignment before upload.
    fn alignment(&self) -> usize {
        1
    }
}

/// Mapping state of an [`AnimationBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Mapped for CPU writes.
    Writable,
    /// Unmapped, contents being copied to the device.
    PublishedToDevice,
}

/// The GPU resource an animation writes into, given at registration.
pub enum BufferTarget {
    /// A device buffer; the staging buffer is created on first use and shared
    /// by every animation registered against the same [`BufferId`].
    Create(Box<dyn DeviceBuffer>),
    /// A device buffer that is already registered by another animation.
    Existing(BufferId),
}

impl BufferTarget {
    /// Convenience constructor for [`BufferTarget::Create`].
    pub fn create(device: impl DeviceBuffer + 'static) -> Self {
        Self::Create(Box::new(device))
    }

    /// Returns the id of the targeted resource.
    #[must_use]
    pub fn id(&self) -> BufferId {
        match self {
            Self::Create(device) => device.id(),
            Self::Existing(id) => *id,
        }
    }
}

impl fmt::Debug for BufferTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(device) => f.debug_tuple("Create").field(&device.id()).finish(),
            Self::Existing(id) => f.debug_tuple("Existing").field(id).finish(),
        }
    }
}

struct Staging {
    state: BufferState,
    /// CPU-visible mapped view of the device store.
    view: Box<[u8]>,
    /// Byte span written since the last publish.
    dirty: Option<Range<usize>>,
    device: Box<dyn DeviceBuffer>,
}

/// Staging area for one GPU buffer.
///
/// Written by CPU steps, published by the render thread once per frame.
pub struct AnimationBuffer {
    id: BufferId,
    capacity: usize,
    staging: Mutex<Staging>,
    uploads: AtomicU64,
    bytes_uploaded: AtomicU64,
}

impl AnimationBuffer {
    /// Creates a staging buffer sized to the device store, mapped and clean.
    #[must_use]
    pub fn new(device: Box<dyn DeviceBuffer>) -> Self {
        let id = device.id();
        let capacity = device.size();
        Self {
            id,
            capacity,
            staging: Mutex::new(Staging {
                state: BufferState::Writable,
                view: vec![0u8; capacity].into_boxed_slice(),
                dirty: None,
                device,
            }),
            uploads: AtomicU64::new(0),
            bytes_uploaded: AtomicU64::new(0),
        }
    }

    /// Returns the id of the GPU resource.
    #[inline]
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Returns the declared capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if writes happened since the last publish.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.staging.lock().dirty.is_some()
    }

    /// Returns the byte span waiting to be uploaded.
    #[must_use]
    pub fn dirty_span(&self) -> Option<Range<usize>> {
        self.staging.lock().dirty.clone()
    }

    /// Returns the mapping state. Outside of a publish this is always
    /// [`BufferState::Writable`].
    #[must_use]
    pub fn state(&self) -> BufferState {
        self.staging.lock().state
    }

    /// Number of device uploads performed.
    #[must_use]
    pub fn upload_count(&self) -> u64 {
        self.uploads.load(Ordering::Relaxed)
    }

    /// Total bytes copied to the device.
    #[must_use]
    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded.load(Ordering::Relaxed)
    }

    /// Writes raw bytes at `offset` in the mapped view.
    ///
    /// # Panics
    ///
    /// Panics if the write extends past [`capacity`](Self::capacity).
    pub fn write(&self, offset: usize, data: &[u8]) {
        self.write_with(offset..offset + data.len(), |view| {
            view.copy_from_slice(data);
        });
    }

    /// Writes a slice of plain-old-data values at byte `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the write extends past [`capacity`](Self::capacity).
    pub fn write_pod<T: Pod>(&self, offset: usize, values: &[T]) {
        self.write(offset, bytemuck::cast_slice(values));
    }

    /// Runs `f` on the mapped bytes in `range` and marks them dirty.
    ///
    /// The closure runs with the buffer lock held: keep it short.
    ///
    /// # Panics
    ///
    /// Panics if `range` is inverted or extends past
    /// [`capacity`](Self::capacity). Writing outside the declared extent would
    /// corrupt GPU memory and is treated as fatal.
    pub fn write_with<R>(&self, range: Range<usize>, f: impl FnOnce(&mut [u8]) -> R) -> R {
        assert!(
            range.start <= range.end && range.end <= self.capacity,
            "write of bytes {range:?} exceeds capacity {} of {}",
            self.capacity,
            self.id
        );

        let mut staging = self.staging.lock();
        assert_eq!(
            staging.state,
            BufferState::Writable,
            "{} written while published to device",
            self.id
        );

        let out = f(&mut staging.view[range.clone()]);
        if !range.is_empty() {
            staging.dirty = Some(match staging.dirty.take() {
                Some(span) => span.start.min(range.start)..span.end.max(range.end),
                None => range,
            });
        }
        out
    }

    /// Copies bytes out of the mapped view.
    ///
    /// # Panics
    ///
    /// Panics if `range` extends past [`capacity`](Self::capacity).
    #[must_use]
    pub fn read(&self, range: Range<usize>) -> Vec<u8> {
        self.staging.lock().view[range].to_vec()
    }

    /// Copies `count` plain-old-data values out of the mapped view.
    ///
    /// # Panics
    ///
    /// Panics if the range extends past [`capacity`](Self::capacity).
    #[must_use]
    pub fn read_pod<T: Pod>(&self, offset: usize, count: usize) -> Vec<T> {
        let bytes = self.read(offset..offset + count * std::mem::size_of::<T>());
        bytemuck::pod_collect_to_vec(&bytes)
    }

    /// Uploads pending writes to the device.
    ///
    /// Unmaps the view, copies the dirty span, remaps, clears the dirty flag.
    /// Returns `false` without touching the device if nothing was written.
    pub fn publish(&self) -> bool {
        let mut guard = self.staging.lock();
        let Some(span) = guard.dirty.take() else {
            return false;
        };

        let staging = &mut *guard;
        let span = align_span(span, staging.device.alignment(), self.capacity);
        staging.state = BufferState::PublishedToDevice;
        staging.device.upload(span.start, &staging.view[span.clone()]);
        staging.state = BufferState::Writable;

        self.uploads.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded
            .fetch_add(span.len() as u64, Ordering::Relaxed);
        tracing::trace!(buffer = %self.id, bytes = span.len(), "published to device");
        true
    }
}

/// Widens `span` outwards to multiples of `alignment`, clamped to `capacity`.
fn align_span(span: Range<usize>, alignment: usize, capacity: usize) -> Range<usize> {
    if alignment <= 1 {
        return span;
    }
    let start = span.start - span.start % alignment;
    let end = span.end.div_ceil(alignment) * alignment;
    start..end.min(capacity)
}

impl fmt::Debug for AnimationBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationBuffer")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("uploads", &self.upload_count())
            .finish_non_exhaustive()
    }
}
