//! Mirrored circular byte buffer
//!
//! Read and write positions run over `2 * capacity` logical slots: the low
//! bits select the physical byte, the next bit is the *mirror* flag telling
//! which lap the position is on. Equal offsets with equal mirrors means
//! empty, equal offsets with opposite mirrors means full, so no separate
//! count has to be kept in sync between the producer and the consumer.
//!
//! ```text
//!          mirror = 0                    mirror = 1
//! +---+---+---+---+---+---+---+|+~~~+~~~+~~~+~~~+~~~+~~~+~~~+
//! | 0 | 1 | 2 | 3 | 4 | 5 | 6 ||| 0 | 1 | 2 | 3 | 4 | 5 | 6 | Full
//! +---+---+---+---+---+---+---+|+~~~+~~~+~~~+~~~+~~~+~~~+~~~+
//!  read-^                       write-^
//! ```
//!
//! Capacity must be a power of two no larger than [`MAX_CAPACITY`] so every
//! wraparound is a mask. None of the operations block: writes and reads
//! transfer what fits and report the count.

use core::marker::PhantomData;
use core::ptr::NonNull;
use portable_atomic::{AtomicU16, Ordering};

/// Largest supported capacity (positions are 16-bit including the mirror bit)
pub const MAX_CAPACITY: usize = 1 << 15;

/// Rejected backing storage length
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CapacityError {
    /// Storage is zero bytes long
    Empty,
    /// Length is not a power of two
    NotPowerOfTwo(usize),
    /// Length exceeds [`MAX_CAPACITY`]
    TooLarge(usize),
}

#[cfg(feature = "std")]
impl core::fmt::Display for CapacityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CapacityError::Empty => write!(f, "Ring buffer storage is empty"),
            CapacityError::NotPowerOfTwo(len) => {
                write!(f, "Ring buffer capacity {} is not a power of two", len)
            }
            CapacityError::TooLarge(len) => {
                write!(f, "Ring buffer capacity {} exceeds {}", len, MAX_CAPACITY)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CapacityError {}

/// Smallest valid capacity that holds `len` bytes
pub const fn round_up_capacity(len: usize) -> Option<usize> {
    if len == 0 || len > MAX_CAPACITY {
        None
    } else {
        Some(len.next_power_of_two())
    }
}

/// A position split into its physical offset and mirror flag
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MirrorIndex {
    /// Physical byte offset, `0..capacity`
    pub offset: u16,
    /// Lap flag
    pub mirror: bool,
}

/// Coarse fill level
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RingBufferState {
    Empty,
    Full,
    /// Neither full nor empty
    HalfFull,
}

/// Fixed-capacity byte FIFO over caller-owned storage
pub struct RingBuffer<'a> {
    storage: NonNull<u8>,
    capacity: u16,
    read: AtomicU16,
    write: AtomicU16,
    _storage: PhantomData<&'a mut [u8]>,
}

// SAFETY: the buffer owns a unique borrow of its storage for 'a, so moving it
// to another context moves that borrow with it.
unsafe impl Send for RingBuffer<'_> {}

// SAFETY: through `&RingBuffer` the storage is only touched by a `Producer`
// (free region, published with a release store of `write`) and a `Consumer`
// (filled region, released with a release store of `read`). `split` hands out
// at most one of each; every other `&self` method only loads the positions.
unsafe impl Sync for RingBuffer<'_> {}

impl<'a> RingBuffer<'a> {
    /// Build a buffer over `storage`, whose length becomes the capacity
    pub fn new(storage: &'a mut [u8]) -> Result<Self, CapacityError> {
        let len = storage.len();
        if len == 0 {
            return Err(CapacityError::Empty);
        }
        if len > MAX_CAPACITY {
            return Err(CapacityError::TooLarge(len));
        }
        if !len.is_power_of_two() {
            return Err(CapacityError::NotPowerOfTwo(len));
        }

        Ok(Self {
            storage: NonNull::from(storage).cast::<u8>(),
            capacity: len as u16,
            read: AtomicU16::new(0),
            write: AtomicU16::new(0),
            _storage: PhantomData,
        })
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// Logically empty the buffer; stored bytes are left in place
    pub fn reset(&mut self) {
        *self.read.get_mut() = 0;
        *self.write.get_mut() = 0;
    }

    /// Queue as much of `data` as fits without touching unread bytes
    ///
    /// Returns the number of bytes written, which is less than `data.len()`
    /// when the buffer runs out of space.
    pub fn put(&mut self, data: &[u8]) -> usize {
        self.produce(data)
    }

    /// Queue all of `data`, overwriting the oldest unread bytes if needed
    ///
    /// Unlike [`put`](Self::put) this never refuses data: when `data` does not
    /// fit, the oldest unread bytes are silently dropped, and when `data` is
    /// longer than the capacity only its last `capacity` bytes are kept. Meant
    /// for best-effort channels (key events) where losing stale entries beats
    /// stalling the producer.
    pub fn put_force(&mut self, data: &[u8]) -> usize {
        let capacity = self.capacity as usize;
        let data = match data.len().checked_sub(capacity) {
            Some(excess) => &data[excess..],
            None => data,
        };
        if data.is_empty() {
            return 0;
        }

        let read = *self.read.get_mut();
        let write = *self.write.get_mut();
        let space = self.capacity - self.span(read, write);

        // SAFETY: `&mut self` excludes every other accessor and
        // `data.len() <= capacity`.
        unsafe { self.copy_in(write, data) };

        let len = data.len() as u16;
        let new_write = self.advance(write, len);
        *self.write.get_mut() = new_write;
        if len > space {
            // read side now sits exactly one lap behind: full
            *self.read.get_mut() = self.advance(new_write, self.capacity);
            #[cfg(feature = "defmt")]
            defmt::trace!("ring buffer dropped {} unread bytes", len - space);
        }
        data.len()
    }

    /// Queue one byte, returns false when full
    pub fn putchar(&mut self, ch: u8) -> bool {
        self.put(&[ch]) == 1
    }

    /// Queue one byte, dropping the oldest unread byte when full
    pub fn putchar_force(&mut self, ch: u8) {
        self.put_force(&[ch]);
    }

    /// Copy up to `out.len()` unread bytes into `out`, returns the count
    pub fn get(&mut self, out: &mut [u8]) -> usize {
        self.consume(out)
    }

    /// Pop one byte
    pub fn getchar(&mut self) -> Option<u8> {
        let mut ch = [0u8; 1];
        if self.get(&mut ch) == 1 {
            Some(ch[0])
        } else {
            None
        }
    }

    /// Copy up to `out.len()` unread bytes into `out` without consuming them
    pub fn peek(&mut self, out: &mut [u8]) -> usize {
        let read = *self.read.get_mut();
        let write = *self.write.get_mut();
        let len = out.len().min(self.span(read, write) as usize);
        // SAFETY: `&mut self` excludes every other accessor and `len` slots
        // after `read` hold unread data.
        unsafe { self.copy_out(read, &mut out[..len]) };
        len
    }

    /// Consume up to `len` unread bytes without copying them, returns the count
    pub fn skip(&mut self, len: usize) -> usize {
        let read = *self.read.get_mut();
        let write = *self.write.get_mut();
        let len = len.min(self.span(read, write) as usize);
        *self.read.get_mut() = self.advance(read, len as u16);
        len
    }

    /// Drop every unread byte without moving the write position
    pub fn discard(&mut self) {
        let write = *self.write.get_mut();
        *self.read.get_mut() = write;
    }

    /// Number of unread bytes
    pub fn data_len(&self) -> u16 {
        self.span(self.read.load(Ordering::Acquire), self.write.load(Ordering::Acquire))
    }

    /// Number of bytes that can be written without overwriting
    pub fn space_len(&self) -> u16 {
        self.capacity - self.data_len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.data_len() == self.capacity
    }

    pub fn state(&self) -> RingBufferState {
        match self.data_len() {
            0 => RingBufferState::Empty,
            len if len == self.capacity => RingBufferState::Full,
            _ => RingBufferState::HalfFull,
        }
    }

    /// Current read position
    pub fn read_index(&self) -> MirrorIndex {
        self.mirror_index(self.read.load(Ordering::Acquire))
    }

    /// Current write position
    pub fn write_index(&self) -> MirrorIndex {
        self.mirror_index(self.write.load(Ordering::Acquire))
    }

    /// Backing storage, for a peripheral that fills the buffer in place
    ///
    /// Pair with [`advance_write_to`](Self::advance_write_to) once the
    /// peripheral reports how far it wrote.
    pub fn storage_mut(&mut self) -> &mut [u8] {
        // SAFETY: `&mut self` is the unique access path to the storage for the
        // lifetime of the returned slice.
        unsafe { core::slice::from_raw_parts_mut(self.storage.as_ptr(), self.capacity as usize) }
    }

    /// Move the write position to physical `offset` after an in-place write
    ///
    /// The bytes between the old and the new offset become readable. If they
    /// exceed the free space the oldest unread bytes are dropped and the
    /// buffer ends up full. A full lap since the last call cannot be told
    /// apart from no progress. Returns the number of bytes committed.
    pub fn advance_write_to(&mut self, offset: u16) -> usize {
        let offset_mask = self.capacity - 1;
        let read = *self.read.get_mut();
        let write = *self.write.get_mut();
        let len = (offset & offset_mask).wrapping_sub(write & offset_mask) & offset_mask;
        let space = self.capacity - self.span(read, write);

        let new_write = self.advance(write, len);
        *self.write.get_mut() = new_write;
        if len > space {
            *self.read.get_mut() = self.advance(new_write, self.capacity);
            #[cfg(feature = "defmt")]
            defmt::warn!("RX overrun, {} bytes lost", len - space);
        }
        len as usize
    }

    /// Split into a lock-free single producer / single consumer pair
    pub fn split(&mut self) -> (Producer<'_, 'a>, Consumer<'_, 'a>) {
        let rb: &RingBuffer<'a> = self;
        (Producer { rb }, Consumer { rb })
    }

    fn produce(&self, data: &[u8]) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Relaxed);
        let space = (self.capacity - self.span(read, write)) as usize;
        let len = data.len().min(space);
        if len == 0 {
            return 0;
        }

        // SAFETY: the `len` slots after `write` are free; the consumer does not
        // read them before the release store below, and there is one producer.
        unsafe { self.copy_in(write, &data[..len]) };
        self.write.store(self.advance(write, len as u16), Ordering::Release);
        len
    }

    fn consume(&self, out: &mut [u8]) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Relaxed);
        let len = out.len().min(self.span(read, write) as usize);
        if len == 0 {
            return 0;
        }

        // SAFETY: the `len` slots after `read` were published by the producer's
        // release store, and it does not reuse them before `read` moves past.
        unsafe { self.copy_out(read, &mut out[..len]) };
        self.read.store(self.advance(read, len as u16), Ordering::Release);
        len
    }

    /// # Safety
    ///
    /// The caller must have exclusive use of the `data.len()` slots starting
    /// at `pos`, and `data.len() <= capacity`.
    unsafe fn copy_in(&self, pos: u16, data: &[u8]) {
        let offset = (pos & (self.capacity - 1)) as usize;
        let first = data.len().min(self.capacity as usize - offset);
        let base = self.storage.as_ptr();
        // SAFETY: `offset + first <= capacity` and the wrapped tail is
        // `data.len() - first <= offset`; `data` cannot alias the storage
        // because the storage is uniquely borrowed by this buffer.
        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr(), base.add(offset), first);
            core::ptr::copy_nonoverlapping(data.as_ptr().add(first), base, data.len() - first);
        }
    }

    /// # Safety
    ///
    /// The `out.len()` slots starting at `pos` must hold published data that
    /// no producer rewrites concurrently, and `out.len() <= capacity`.
    unsafe fn copy_out(&self, pos: u16, out: &mut [u8]) {
        let offset = (pos & (self.capacity - 1)) as usize;
        let first = out.len().min(self.capacity as usize - offset);
        let base = self.storage.as_ptr();
        // SAFETY: same bounds as `copy_in`, mirrored.
        unsafe {
            core::ptr::copy_nonoverlapping(base.add(offset), out.as_mut_ptr(), first);
            core::ptr::copy_nonoverlapping(base, out.as_mut_ptr().add(first), out.len() - first);
        }
    }

    fn mirror_index(&self, pos: u16) -> MirrorIndex {
        MirrorIndex {
            offset: pos & (self.capacity - 1),
            mirror: pos & self.capacity != 0,
        }
    }

    /// Mask over the `2 * capacity` logical positions
    fn position_mask(&self) -> u16 {
        self.capacity.wrapping_mul(2).wrapping_sub(1)
    }

    fn span(&self, read: u16, write: u16) -> u16 {
        write.wrapping_sub(read) & self.position_mask()
    }

    fn advance(&self, pos: u16, len: u16) -> u16 {
        pos.wrapping_add(len) & self.position_mask()
    }
}

/// Write half of a split [`RingBuffer`], for the interrupt or thread that fills it
pub struct Producer<'b, 'a> {
    rb: &'b RingBuffer<'a>,
}

impl Producer<'_, '_> {
    /// Same contract as [`RingBuffer::put`]
    pub fn put(&mut self, data: &[u8]) -> usize {
        self.rb.produce(data)
    }

    pub fn putchar(&mut self, ch: u8) -> bool {
        self.rb.produce(&[ch]) == 1
    }

    pub fn space_len(&self) -> u16 {
        self.rb.space_len()
    }

    pub fn capacity(&self) -> u16 {
        self.rb.capacity
    }
}

/// Read half of a split [`RingBuffer`], for the context that drains it
pub struct Consumer<'b, 'a> {
    rb: &'b RingBuffer<'a>,
}

impl Consumer<'_, '_> {
    /// Same contract as [`RingBuffer::get`]
    pub fn get(&mut self, out: &mut [u8]) -> usize {
        self.rb.consume(out)
    }

    pub fn getchar(&mut self) -> Option<u8> {
        let mut ch = [0u8; 1];
        if self.rb.consume(&mut ch) == 1 {
            Some(ch[0])
        } else {
            None
        }
    }

    pub fn data_len(&self) -> u16 {
        self.rb.data_len()
    }

    /// Drop everything published so far
    pub fn discard(&mut self) {
        let write = self.rb.write.load(Ordering::Acquire);
        self.rb.read.store(write, Ordering::Release);
    }
}
