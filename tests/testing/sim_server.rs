use std::collections::{HashMap, VecDeque};

use canopen_master::frame::{CanopenFrame, FunctionCode, SdoPayload};
use canopen_master::util::crc16_canopen_with_lut;
use canopen_master::Transport;

#[derive(Debug, PartialEq)]
pub enum SimError {
    Bus,
    FilterUnsupported,
}

enum SimState {
    Idle,
    Upload { data: Vec<u8>, offset: usize, toggle: bool },
    Download { key: (u16, u8), buf: Vec<u8>, toggle: bool },
    Block { key: (u16, u8), buf: Vec<u8>, ack_seq: u8, block_size: u8, complete: bool, crc: bool },
}

/// In-memory SDO server for one node, speaking through the `Transport` trait.
///
/// Replies are queued when the client sends; `receive` hands them out in order.
/// With nothing queued it returns heartbeat frames of the node, or `repeat_reply`.
pub struct SimServer {
    pub node: u8,
    pub objects: HashMap<(u16, u8), Vec<u8>>,
    /// Every frame the client sent.
    pub received: Vec<CanopenFrame>,
    /// Toggle bits seen on segment frames, in order.
    pub toggles: Vec<bool>,
    pub filter: Option<u8>,
    pub reject_filter: bool,
    pub fail_receive: bool,
    /// Never reply, only produce heartbeats.
    pub silent: bool,
    /// Put a PDO and a heartbeat of the node in front of every reply.
    pub noise: bool,
    /// Abort the next initiate request with this code.
    pub abort_code: Option<u32>,
    /// Reply to uploads with a segmented initiate even for short objects.
    pub force_segmented: bool,
    pub block_size: u8,
    /// Block sizes announced in the following block acks, consumed front first.
    pub next_block_sizes: VecDeque<u8>,
    /// Sequence numbers to lose once each during block download.
    pub drop_segments: Vec<u8>,
    pub support_crc: bool,
    pub crc_mismatch: bool,
    /// SDO-Tx bytes put in front of every reply, e.g. an unknown command.
    pub stray_reply: Option<[u8; 8]>,
    /// Send the previous reply again ahead of every segment reply.
    pub duplicate_replies: bool,
    /// Abort with the code when the n-th segment request (1-based) arrives.
    pub abort_on_segment: Option<(usize, u32)>,
    /// SDO-Tx bytes handed out instead of heartbeats while nothing is queued.
    pub repeat_reply: Option<[u8; 8]>,
    last_reply: Option<[u8; 8]>,
    outbox: VecDeque<CanopenFrame>,
    state: SimState,
}

impl SimServer {
    pub fn new(node: u8) -> Self {
        SimServer {
            node,
            objects: HashMap::new(),
            received: Vec::new(),
            toggles: Vec::new(),
            filter: None,
            reject_filter: false,
            fail_receive: false,
            silent: false,
            noise: false,
            abort_code: None,
            force_segmented: false,
            block_size: 4,
            next_block_sizes: VecDeque::new(),
            drop_segments: Vec::new(),
            support_crc: false,
            crc_mismatch: false,
            stray_reply: None,
            duplicate_replies: false,
            abort_on_segment: None,
            repeat_reply: None,
            last_reply: None,
            outbox: VecDeque::new(),
            state: SimState::Idle,
        }
    }

    pub fn with_object(mut self, index: u16, subindex: u8, data: &[u8]) -> Self {
        self.objects.insert((index, subindex), data.to_vec());
        self
    }

    pub fn object(&self, index: u16, subindex: u8) -> Option<&Vec<u8>> {
        self.objects.get(&(index, subindex))
    }

    fn sdo_tx(&self, bytes: [u8; 8]) -> CanopenFrame {
        CanopenFrame::new(FunctionCode::SdoTx, self.node, false, &bytes).unwrap()
    }

    fn reply(&mut self, bytes: [u8; 8]) {
        if self.noise {
            let pdo = CanopenFrame::new(FunctionCode::Pdo1Tx, self.node, false, &[0xAA, 0xBB]).unwrap();
            let heartbeat = self.heartbeat();
            self.outbox.push_back(pdo);
            self.outbox.push_back(heartbeat);
        }
        if let Some(stray) = self.stray_reply {
            let frame = self.sdo_tx(stray);
            self.outbox.push_back(frame);
        }
        let frame = self.sdo_tx(bytes);
        self.outbox.push_back(frame);
        self.last_reply = Some(bytes);
    }

    /// Queues the previous reply again, then `bytes`.
    fn segment_reply(&mut self, bytes: [u8; 8]) {
        if let (true, Some(previous)) = (self.duplicate_replies, self.last_reply) {
            let frame = self.sdo_tx(previous);
            self.outbox.push_back(frame);
        }
        self.reply(bytes);
    }

    /// Takes the configured abort code once the segment count reaches its trigger.
    fn segment_abort(&mut self) -> Option<u32> {
        match self.abort_on_segment {
            Some((n, code)) if self.toggles.len() == n => {
                self.abort_on_segment = None;
                Some(code)
            }
            _ => None,
        }
    }

    fn reply_sdo(&mut self, command: u8, index: u16, subindex: u8, data: [u8; 4]) {
        self.reply(SdoPayload::new(command, index, subindex, data).to_bytes());
    }

    fn abort(&mut self, index: u16, subindex: u8, code: u32) {
        self.state = SimState::Idle;
        self.reply_sdo(0x80, index, subindex, code.to_le_bytes());
    }

    fn heartbeat(&self) -> CanopenFrame {
        CanopenFrame::new(FunctionCode::NodeGuard, self.node, false, &[0x05]).unwrap()
    }

    fn handle(&mut self, bytes: [u8; 8]) {
        let cmd = bytes[0];
        let index = u16::from_le_bytes([bytes[1], bytes[2]]);
        let subindex = bytes[3];

        if cmd == 0x80 {
            self.state = SimState::Idle;
            return;
        }
        if let SimState::Block { .. } = self.state {
            self.handle_block(bytes);
            return;
        }

        match cmd & 0xE0 {
            // initiate upload
            0x40 => {
                if let Some(code) = self.abort_code.take() {
                    return self.abort(index, subindex, code);
                }
                let Some(data) = self.objects.get(&(index, subindex)).cloned() else {
                    return self.abort(index, subindex, 0x0602_0000);
                };
                if data.len() <= 4 && !data.is_empty() && !self.force_segmented {
                    let mut buf = [0u8; 4];
                    buf[..data.len()].copy_from_slice(&data);
                    let n = (4 - data.len()) as u8;
                    self.reply_sdo(0x43 | (n << 2), index, subindex, buf);
                } else {
                    self.reply_sdo(0x41, index, subindex, (data.len() as u32).to_le_bytes());
                    self.state = SimState::Upload { data, offset: 0, toggle: false };
                }
            }
            // upload segment request
            0x60 => {
                let t = cmd & 0x10 != 0;
                self.toggles.push(t);
                if let Some(code) = self.segment_abort() {
                    return self.abort(0, 0, code);
                }
                let SimState::Upload { data, offset, toggle } = &mut self.state else {
                    return self.abort(0, 0, 0x0504_0001);
                };
                if t != *toggle {
                    return self.abort(0, 0, 0x0503_0000);
                }
                let len = (data.len() - *offset).min(7);
                let last = *offset + len == data.len();
                let mut out = [0u8; 8];
                out[0] = ((t as u8) << 4) | (((7 - len) as u8) << 1) | last as u8;
                out[1..1 + len].copy_from_slice(&data[*offset..*offset + len]);
                *offset += len;
                *toggle = !*toggle;
                if last {
                    self.state = SimState::Idle;
                }
                self.segment_reply(out);
            }
            // initiate download
            0x20 => {
                if let Some(code) = self.abort_code.take() {
                    return self.abort(index, subindex, code);
                }
                let expedited = cmd & 0x02 != 0;
                if expedited {
                    let len = if cmd & 0x01 != 0 { 4 - ((cmd >> 2) & 0x03) as usize } else { 4 };
                    self.objects.insert((index, subindex), bytes[4..4 + len].to_vec());
                } else {
                    self.objects.insert((index, subindex), Vec::new());
                    self.state = SimState::Download { key: (index, subindex), buf: Vec::new(), toggle: false };
                }
                self.reply_sdo(0x60, index, subindex, [0; 4]);
            }
            // download segment
            0x00 => {
                let t = cmd & 0x10 != 0;
                self.toggles.push(t);
                if let Some(code) = self.segment_abort() {
                    return self.abort(0, 0, code);
                }
                let SimState::Download { key, buf, toggle } = &mut self.state else {
                    return self.abort(0, 0, 0x0504_0001);
                };
                if t != *toggle {
                    return self.abort(0, 0, 0x0503_0000);
                }
                let len = 7 - ((cmd >> 1) & 0x07) as usize;
                buf.extend_from_slice(&bytes[1..1 + len]);
                *toggle = !*toggle;
                if cmd & 0x01 != 0 {
                    let (key, data) = (*key, std::mem::take(buf));
                    self.objects.insert(key, data);
                    self.state = SimState::Idle;
                }
                self.segment_reply([0x20 | ((t as u8) << 4), 0, 0, 0, 0, 0, 0, 0]);
            }
            // block download initiate
            0xC0 => {
                if let Some(code) = self.abort_code.take() {
                    return self.abort(index, subindex, code);
                }
                let crc = self.support_crc && cmd & 0x04 != 0;
                let block_size = self.block_size;
                self.state = SimState::Block {
                    key: (index, subindex),
                    buf: Vec::new(),
                    ack_seq: 0,
                    block_size,
                    complete: false,
                    crc,
                };
                self.reply_sdo(0xA0 | ((crc as u8) << 2), index, subindex, [block_size, 0, 0, 0]);
            }
            _ => self.abort(index, subindex, 0x0504_0001),
        }
    }

    fn handle_block(&mut self, bytes: [u8; 8]) {
        let next_size = self.next_block_sizes.front().copied();
        let crc_mismatch = self.crc_mismatch;
        let SimState::Block { key, buf, ack_seq, block_size, complete, crc } = &mut self.state else {
            return;
        };

        if *complete {
            // end block download
            if bytes[0] & 0xE3 != 0xC1 {
                return self.abort(0, 0, 0x0504_0001);
            }
            let excess = ((bytes[0] >> 2) & 0x07) as usize;
            let len = buf.len() - excess;
            buf.truncate(len);
            let received_crc = u16::from_le_bytes([bytes[1], bytes[2]]);
            if *crc && (crc16_canopen_with_lut(buf) != received_crc || crc_mismatch) {
                return self.abort(0, 0, 0x0504_0004);
            }
            let (key, data) = (*key, std::mem::take(buf));
            self.objects.insert(key, data);
            self.state = SimState::Idle;
            self.reply([0xA1, 0, 0, 0, 0, 0, 0, 0]);
            return;
        }

        let seqno = bytes[0] & 0x7F;
        let last = bytes[0] & 0x80 != 0;
        let mut accepted = false;
        if seqno == *ack_seq + 1 {
            if let Some(pos) = self.drop_segments.iter().position(|&s| s == seqno) {
                self.drop_segments.remove(pos);
            } else {
                buf.extend_from_slice(&bytes[1..8]);
                *ack_seq = seqno;
                accepted = true;
            }
        }

        if seqno == *block_size || last {
            let acked = *ack_seq;
            if last && accepted {
                *complete = true;
            }
            if let Some(size) = next_size {
                *block_size = size;
            }
            let new_size = *block_size;
            *ack_seq = 0;
            if next_size.is_some() {
                self.next_block_sizes.pop_front();
            }
            self.reply([0xA2, acked, new_size, 0, 0, 0, 0, 0]);
        }
    }

    /// Segment frames the client sent during block download, as (seqno, last).
    pub fn block_segments(&self) -> Vec<(u8, bool)> {
        let mut in_block = false;
        let mut segments = Vec::new();
        for frame in &self.received {
            let b = frame.bytes();
            if !in_block {
                if b[0] & 0xE1 == 0xC0 {
                    in_block = true;
                }
                continue;
            }
            if b[0] & 0xE3 == 0xC1 && segments.last().map_or(false, |&(_, last)| last) {
                break;
            }
            segments.push((b[0] & 0x7F, b[0] & 0x80 != 0));
        }
        segments
    }

    pub fn last_received(&self) -> Option<&CanopenFrame> {
        self.received.last()
    }
}

impl Transport for SimServer {
    type Error = SimError;

    fn send(&mut self, frame: &CanopenFrame) -> Result<(), SimError> {
        self.received.push(*frame);
        if self.silent || !frame.is_from(FunctionCode::SdoRx, self.node) || frame.data_len != 8 {
            return Ok(());
        }
        self.handle(frame.bytes());
        Ok(())
    }

    fn receive(&mut self) -> Result<CanopenFrame, SimError> {
        if self.fail_receive {
            return Err(SimError::Bus);
        }
        if let Some(frame) = self.outbox.pop_front() {
            return Ok(frame);
        }
        Ok(match self.repeat_reply {
            Some(bytes) => self.sdo_tx(bytes),
            None => self.heartbeat(),
        })
    }

    fn set_node_filter(&mut self, node: u8) -> Result<(), SimError> {
        if self.reject_filter {
            return Err(SimError::FilterUnsupported);
        }
        self.filter = Some(node);
        Ok(())
    }

    fn clear_node_filter(&mut self) -> Result<(), SimError> {
        self.filter = None;
        Ok(())
    }
}
