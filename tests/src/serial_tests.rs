//! Serial ports: chunked TX, DMA RX and the COM echo loop

use crate::board_sim::{BoardSim, SimStorage};
use bsp_core::hal::mock::MockSerialHw;
use bsp_core::{ComPort, HalError, Rs485, SerialPort, SerialPorts, DMA_TX_CHUNK};
use embedded_hal_mock::eh1::digital::{Mock as PinMock, State as PinState, Transaction as PinTransaction};
use rstest::rstest;
use tokio_test::assert_ok;

fn complete_all<H: bsp_core::SerialHw>(port: &mut SerialPort<'_, H>) -> usize {
    let mut completions = 0;
    while port.is_sending() {
        assert_ok!(port.on_tx_complete());
        completions += 1;
    }
    completions
}

#[rstest]
#[case(1, 1)]
#[case(16, 1)]
#[case(17, 2)]
#[case(100, 7)]
fn test_transfers_per_message(#[case] len: usize, #[case] transfers: usize) {
    let mut tx = [0u8; 128];
    let mut rx = [0u8; 16];
    let mut port = SerialPort::new(MockSerialHw::new(), &mut tx, &mut rx).unwrap();

    let data: heapless::Vec<u8, 128> = (0..len).map(|i| i as u8).collect();
    assert_eq!(port.send(&data), Ok(len));
    complete_all(&mut port);

    assert_eq!(port.hw().transfers, transfers);
    assert!(port.hw().last_chunk_len <= DMA_TX_CHUNK);
    assert_eq!(&port.hw().transmitted[..], &data[..]);
    assert!(port.is_tx_idle());
}

#[test]
fn test_dma_overrun_keeps_newest() {
    println!("\n=== Circular DMA overrun ===");
    let mut tx = [0u8; 16];
    let mut rx = [0u8; 8];
    let mut port = SerialPort::new(MockSerialHw::new(), &mut tx, &mut rx).unwrap();

    port.rx_dma_buffer().copy_from_slice(b"abcdefgh");
    assert_eq!(port.on_rx_event(6), 6);
    // the DMA laps the reader: 6 more bytes, ending at offset 4
    port.rx_dma_buffer().copy_from_slice(b"ijklefgh");
    port.rx_dma_buffer()[6..].copy_from_slice(b"gh");
    assert_eq!(port.on_rx_event(4), 6);
    assert_eq!(port.rx_len(), 8);

    let mut out = [0u8; 8];
    assert_eq!(port.get_buf(&mut out), 8);
    assert_eq!(&out, b"efghijkl");
    println!("✓ oldest bytes dropped, newest 8 kept");
}

#[test]
fn test_registry_over_rs485_ports() {
    let enable = PinMock::new(&[
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
    ]);
    let mut tx = [0u8; 32];
    let mut rx = [0u8; 32];
    let port = SerialPort::new(Rs485::new(enable, MockSerialHw::new()), &mut tx, &mut rx).unwrap();

    let mut ports: SerialPorts<'_, Rs485<PinMock, MockSerialHw>, 4> = SerialPorts::new();
    ports.add(ComPort::Com3, port).unwrap();
    assert_eq!(ports.send(ComPort::Com1, b"x"), Err(HalError::UnknownPort));
    assert_eq!(ports.send(ComPort::Com3, b"hello"), Ok(5));
    ports.on_tx_complete(ComPort::Com3).unwrap();

    ports.set_baud(ComPort::Com3, 9_600).unwrap();
    assert_eq!(ports.port(ComPort::Com3).map(|p| p.baud()), Ok(9_600));

    let (mut enable, hw) = ports.remove(ComPort::Com3).unwrap().into_hw().release();
    assert_eq!(&hw.transmitted[..], b"hello");
    assert_eq!(hw.baud, Some(9_600));
    enable.done();
}

#[test]
fn test_rs485_released_when_tx_start_fails() {
    println!("\n=== RS-485 with a refusing peripheral ===");
    let enable = PinMock::new(&[
        PinTransaction::set(PinState::Low),
        // refused transfer: back to receive at once
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
        // retried transfer
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
    ]);
    let mut hw = MockSerialHw::new();
    hw.fail_tx = true;
    let mut tx = [0u8; 32];
    let mut rx = [0u8; 32];
    let mut port = SerialPort::new(Rs485::new(enable, hw), &mut tx, &mut rx).unwrap();

    assert_eq!(port.send(b"abc"), Err(HalError::SerialError));
    assert!(!port.is_sending());
    assert_eq!(port.tx_len(), 3);

    port.hw_mut().inner().fail_tx = false;
    assert_eq!(port.restart_tx(), Ok(true));
    assert_ok!(port.on_tx_complete());
    assert!(port.is_tx_idle());

    let (mut enable, hw) = port.into_hw().release();
    assert_eq!(&hw.transmitted[..], b"abc");
    assert_eq!(hw.transfers, 1);
    enable.done();
    println!("✓ transceiver released and queued bytes kept");
}

#[test]
fn test_board_echo() {
    println!("\n=== COM1 echo on the simulated board ===");
    let mut storage = SimStorage::new();
    let mut board = BoardSim::new(&mut storage).unwrap();

    assert_eq!(board.receive(b"AT+PING\r\n"), 9);
    board.step().unwrap();
    assert_eq!(board.transmitted(), b"AT+PING\r\n");

    let long: Vec<u8> = (0..150u8).collect();
    board.receive(&long);
    board.run_ms(5).unwrap();
    assert_eq!(&board.transmitted()[9..], &long[..]);
    println!("✓ {} bytes echoed", board.transmitted().len());
}
