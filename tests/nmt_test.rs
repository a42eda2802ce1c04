mod testing;

use canopen_master::frame::{pack, FunctionCode};
use canopen_master::nmt::{module_control, poll_node_state, send_module_control};
use canopen_master::{NmtCommand, NmtError, NmtState, RawFrame};
use testing::genf;
use testing::sim_server::SimServer;

#[test]
fn test_module_control_on_the_wire() {
    let f = module_control(NmtCommand::Start, 0x07).unwrap();
    let raw: RawFrame = pack(&f).unwrap();
    assert_eq!(raw, genf(0x000, &[0x01, 0x07]));

    let f = module_control(NmtCommand::ResetApplication, 0).unwrap();
    let raw: RawFrame = pack(&f).unwrap();
    assert_eq!(raw, genf(0x000, &[0x81, 0x00]));
}

#[test]
fn test_send_module_control() {
    let mut sim = SimServer::new(3);
    send_module_control(&mut sim, NmtCommand::EnterPreOperational, 3).unwrap();
    let sent = sim.last_received().unwrap();
    assert_eq!(sent.cob_id(), 0x000);
    assert_eq!(sent.nmt_control().unwrap(), (0x80, 0x03));
}

#[test]
fn test_poll_node_state() {
    let mut sim = SimServer::new(5);
    let (state, toggle) = poll_node_state(&mut sim, 5, 10).unwrap();
    assert_eq!(state, NmtState::Operational);
    assert!(!toggle);

    let request = sim.last_received().unwrap();
    assert!(request.is_from(FunctionCode::NodeGuard, 5));
    assert!(request.rtr);
    assert_eq!(sim.filter, Some(5));
}

#[test]
fn test_poll_node_state_timeout() {
    let mut sim = SimServer::new(5);
    let err = poll_node_state(&mut sim, 6, 10).unwrap_err();
    assert!(matches!(err, NmtError::Timeout));
}

#[test]
fn test_poll_node_state_transport_error() {
    let mut sim = SimServer::new(5);
    sim.fail_receive = true;
    let err = poll_node_state(&mut sim, 5, 10).unwrap_err();
    assert!(matches!(err, NmtError::Transport(_)));
}
