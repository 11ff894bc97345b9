//! Serial ports with interrupt/DMA driven FIFOs
//!
//! Transmit: [`SerialPort::send`] queues bytes into the TX FIFO and, when no
//! transfer is running, moves up to [`DMA_TX_CHUNK`] bytes into a staging
//! buffer and starts the peripheral. Each completion interrupt
//! ([`SerialPort::on_tx_complete`]) refills the staging buffer until the FIFO
//! is drained, then calls the `after_send` hook.
//!
//! Receive: the RX FIFO storage doubles as a circular DMA target. The
//! peripheral writes into [`SerialPort::rx_dma_buffer`] and reports its
//! position through [`SerialPort::on_rx_event`] (idle line, half or full
//! transfer); the FIFO write position follows it. Ports without DMA feed
//! single bytes through [`SerialPort::on_rx_byte`]. Either way an overrun
//! drops the oldest unread bytes.

use crate::hal::{HalError, SerialHw};
use crate::ring_buffer::{CapacityError, RingBuffer};
use crate::types::{DMA_TX_CHUNK, UART_BAUD};
use heapless::LinearMap;

/// Board serial ports
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ComPort {
    Com1,
    Com2,
    Com3,
    Com4,
    Com5,
    Com6,
    Com7,
    Com8,
}

impl ComPort {
    pub const ALL: [ComPort; 8] = [
        ComPort::Com1,
        ComPort::Com2,
        ComPort::Com3,
        ComPort::Com4,
        ComPort::Com5,
        ComPort::Com6,
        ComPort::Com7,
        ComPort::Com8,
    ];

    /// Zero-based port number
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One serial peripheral with its TX and RX FIFOs
pub struct SerialPort<'a, H> {
    hw: H,
    tx: RingBuffer<'a>,
    rx: RingBuffer<'a>,
    dma_buf: [u8; DMA_TX_CHUNK],
    sending: bool,
    baud: u32,
}

impl<'a, H> SerialPort<'a, H>
where
    H: SerialHw,
{
    /// Build a port over caller-owned FIFO storage (power-of-two lengths)
    pub fn new(hw: H, tx_storage: &'a mut [u8], rx_storage: &'a mut [u8]) -> Result<Self, CapacityError> {
        Ok(Self {
            hw,
            tx: RingBuffer::new(tx_storage)?,
            rx: RingBuffer::new(rx_storage)?,
            dma_buf: [0; DMA_TX_CHUNK],
            sending: false,
            baud: UART_BAUD,
        })
    }

    /// Queue `data` for transmission without blocking
    ///
    /// Returns how many bytes were queued. When the TX FIFO is full the tail
    /// of `data` is not queued; the caller retries with the remainder once
    /// [`tx_space`](Self::tx_space) allows.
    ///
    /// An `Err` means the peripheral refused the transfer. Whatever fitted
    /// stays in the TX FIFO ([`tx_len`](Self::tx_len)) and goes out with
    /// [`restart_tx`](Self::restart_tx); do not send it again.
    pub fn send(&mut self, data: &[u8]) -> Result<usize, HalError> {
        if data.is_empty() {
            return Ok(0);
        }
        self.hw.before_send();

        let mut queued = self.tx.put(data);
        self.kick()?;
        if queued < data.len() {
            // the first chunk moved to the staging buffer and freed space
            queued += self.tx.put(&data[queued..]);
        }
        Ok(queued)
    }

    /// Queue one byte, returns false if the TX FIFO is full
    pub fn send_char(&mut self, byte: u8) -> Result<bool, HalError> {
        self.send(&[byte]).map(|queued| queued == 1)
    }

    /// Retry a transfer the peripheral refused, returns whether one is now in flight
    pub fn restart_tx(&mut self) -> Result<bool, HalError> {
        if self.sending || self.tx.is_empty() {
            return Ok(self.sending);
        }
        self.hw.before_send();
        self.start_chunk().map(|_| true)
    }

    /// Transfer-complete interrupt: start the next chunk or finish
    pub fn on_tx_complete(&mut self) -> Result<(), HalError> {
        if self.tx.is_empty() {
            self.sending = false;
            self.hw.after_send();
            return Ok(());
        }
        self.start_chunk()
    }

    /// DMA receive event: the peripheral's write offset inside the RX storage
    ///
    /// Returns the number of new bytes.
    pub fn on_rx_event(&mut self, dma_offset: u16) -> usize {
        self.rx.advance_write_to(dma_offset)
    }

    /// Byte-wise receive interrupt
    pub fn on_rx_byte(&mut self, byte: u8) {
        self.rx.putchar_force(byte);
    }

    /// Block receive from a driver that owns its own DMA buffer
    ///
    /// Returns the number of bytes stored; older unread bytes are dropped on
    /// overrun.
    pub fn on_rx_data(&mut self, data: &[u8]) -> usize {
        self.rx.put_force(data)
    }

    /// RX storage the receive DMA writes into
    pub fn rx_dma_buffer(&mut self) -> &mut [u8] {
        self.rx.storage_mut()
    }

    pub fn get_char(&mut self) -> Option<u8> {
        self.rx.getchar()
    }

    /// Copy received bytes into `out`, returns the count
    pub fn get_buf(&mut self, out: &mut [u8]) -> usize {
        self.rx.get(out)
    }

    /// Bytes waiting in the RX FIFO
    pub fn rx_len(&self) -> u16 {
        self.rx.data_len()
    }

    /// Bytes waiting in the TX FIFO (the chunk in flight is not counted)
    pub fn tx_len(&self) -> u16 {
        self.tx.data_len()
    }

    pub fn tx_space(&self) -> u16 {
        self.tx.space_len()
    }

    /// Drop queued TX bytes; a chunk already handed to the peripheral completes
    pub fn clear_tx(&mut self) {
        self.tx.reset();
    }

    /// Drop unread RX bytes, keeping the write position in step with the DMA
    pub fn clear_rx(&mut self) {
        self.rx.discard();
    }

    pub fn set_baud(&mut self, baud: u32) -> Result<(), HalError> {
        if baud == 0 {
            return Err(HalError::InvalidConfig);
        }
        self.hw.set_baud(baud)?;
        self.baud = baud;
        Ok(())
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    /// A transfer is in flight
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Nothing queued and nothing in flight
    pub fn is_tx_idle(&self) -> bool {
        !self.sending && self.tx.is_empty()
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Tear the port down, handing back the peripheral
    pub fn into_hw(self) -> H {
        self.hw
    }

    fn kick(&mut self) -> Result<(), HalError> {
        if self.sending || self.tx.is_empty() {
            return Ok(());
        }
        self.start_chunk()
    }

    /// The chunk leaves the FIFO only once the peripheral accepted it
    fn start_chunk(&mut self) -> Result<(), HalError> {
        let len = self.tx.peek(&mut self.dma_buf);
        if let Err(error) = self.hw.start_tx(&self.dma_buf[..len]) {
            self.sending = false;
            self.hw.after_send();
            #[cfg(feature = "defmt")]
            defmt::warn!("TX start failed, {} bytes kept: {:?}", self.tx.data_len(), error);
            return Err(error);
        }
        self.tx.skip(len);
        self.sending = true;
        Ok(())
    }
}

/// Serial ports keyed by [`ComPort`]
pub struct SerialPorts<'a, H, const N: usize> {
    ports: LinearMap<ComPort, SerialPort<'a, H>, N>,
}

impl<'a, H, const N: usize> SerialPorts<'a, H, N>
where
    H: SerialHw,
{
    pub const fn new() -> Self {
        Self { ports: LinearMap::new() }
    }

    /// Enable a port; re-adding a port replaces it
    pub fn add(&mut self, com: ComPort, port: SerialPort<'a, H>) -> Result<(), HalError> {
        self.ports
            .insert(com, port)
            .map(|_| ())
            .map_err(|_| HalError::InvalidConfig)
    }

    /// Disable a port, handing it back
    pub fn remove(&mut self, com: ComPort) -> Option<SerialPort<'a, H>> {
        self.ports.remove(&com)
    }

    pub fn is_enabled(&self, com: ComPort) -> bool {
        self.ports.contains_key(&com)
    }

    pub fn port(&mut self, com: ComPort) -> Result<&mut SerialPort<'a, H>, HalError> {
        self.ports.get_mut(&com).ok_or(HalError::UnknownPort)
    }

    pub fn send(&mut self, com: ComPort, data: &[u8]) -> Result<usize, HalError> {
        self.port(com)?.send(data)
    }

    pub fn send_char(&mut self, com: ComPort, byte: u8) -> Result<bool, HalError> {
        self.port(com)?.send_char(byte)
    }

    pub fn get_char(&mut self, com: ComPort) -> Result<Option<u8>, HalError> {
        Ok(self.port(com)?.get_char())
    }

    pub fn get_buf(&mut self, com: ComPort, out: &mut [u8]) -> Result<usize, HalError> {
        Ok(self.port(com)?.get_buf(out))
    }

    pub fn rx_len(&mut self, com: ComPort) -> Result<u16, HalError> {
        Ok(self.port(com)?.rx_len())
    }

    pub fn clear_tx(&mut self, com: ComPort) -> Result<(), HalError> {
        self.port(com)?.clear_tx();
        Ok(())
    }

    pub fn clear_rx(&mut self, com: ComPort) -> Result<(), HalError> {
        self.port(com)?.clear_rx();
        Ok(())
    }

    pub fn set_baud(&mut self, com: ComPort, baud: u32) -> Result<(), HalError> {
        self.port(com)?.set_baud(baud)
    }

    pub fn on_tx_complete(&mut self, com: ComPort) -> Result<(), HalError> {
        self.port(com)?.on_tx_complete()
    }

    pub fn on_rx_event(&mut self, com: ComPort, dma_offset: u16) -> Result<usize, HalError> {
        Ok(self.port(com)?.on_rx_event(dma_offset))
    }
}

impl<'a, H, const N: usize> Default for SerialPorts<'a, H, N>
where
    H: SerialHw,
{
    fn default() -> Self {
        Self::new()
    }
}
