//! Socket usage summary (`ss -s`).

use crate::record::SocketRecord;
use crate::types::{Protocol, TcpState};
use serde::{Deserialize, Serialize};

/// Per-protocol and per-state socket counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// TCP sockets in any state.
    pub tcp_total: u32,
    /// CLOSED.
    pub tcp_closed: u32,
    /// LISTEN.
    pub tcp_listen: u32,
    /// SYN-SENT.
    pub tcp_syn_sent: u32,
    /// SYN-RECV.
    pub tcp_syn_recv: u32,
    /// ESTABLISHED.
    pub tcp_established: u32,
    /// CLOSE-WAIT.
    pub tcp_close_wait: u32,
    /// FIN-WAIT-1.
    pub tcp_fin_wait1: u32,
    /// CLOSING.
    pub tcp_closing: u32,
    /// LAST-ACK.
    pub tcp_last_ack: u32,
    /// FIN-WAIT-2.
    pub tcp_fin_wait2: u32,
    /// TIME-WAIT.
    pub tcp_time_wait: u32,
    /// UDP sockets.
    pub udp_total: u32,
    /// Unix stream sockets.
    pub unix_stream_total: u32,
    /// Unix datagram sockets.
    pub unix_dgram_total: u32,
}

impl Summary {
    /// Count a record set in one pass.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a SocketRecord>,
    {
        let mut summary = Self::default();
        for record in records {
            summary.add(record);
        }
        summary
    }

    /// Count one record.
    pub fn add(&mut self, record: &SocketRecord) {
        match record.protocol {
            Protocol::Tcp => {
                self.tcp_total += 1;
                if let Some(counter) = self.state_counter(record.state) {
                    *counter += 1;
                }
            }
            Protocol::Udp => self.udp_total += 1,
            Protocol::UnixStream => self.unix_stream_total += 1,
            Protocol::UnixDgram => self.unix_dgram_total += 1,
            Protocol::Unknown => {}
        }
    }

    /// Get the count for one TCP state; 0 for `Unknown`.
    pub fn tcp_state(&self, state: TcpState) -> u32 {
        match state {
            TcpState::Closed => self.tcp_closed,
            TcpState::Listen => self.tcp_listen,
            TcpState::SynSent => self.tcp_syn_sent,
            TcpState::SynRecv => self.tcp_syn_recv,
            TcpState::Established => self.tcp_established,
            TcpState::CloseWait => self.tcp_close_wait,
            TcpState::FinWait1 => self.tcp_fin_wait1,
            TcpState::Closing => self.tcp_closing,
            TcpState::LastAck => self.tcp_last_ack,
            TcpState::FinWait2 => self.tcp_fin_wait2,
            TcpState::TimeWait => self.tcp_time_wait,
            TcpState::Unknown => 0,
        }
    }

    /// TCP sockets in a state other than ESTABLISHED, CLOSED, TIME-WAIT or
    /// LISTEN.
    pub fn tcp_transient(&self) -> u32 {
        self.tcp_syn_sent
            + self.tcp_syn_recv
            + self.tcp_fin_wait1
            + self.tcp_fin_wait2
            + self.tcp_close_wait
            + self.tcp_last_ack
            + self.tcp_closing
    }

    /// Unix sockets of either type.
    pub fn unix_total(&self) -> u32 {
        self.unix_stream_total + self.unix_dgram_total
    }

    /// All counted sockets.
    pub fn total(&self) -> u32 {
        self.tcp_total + self.udp_total + self.unix_total()
    }

    fn state_counter(&mut self, state: TcpState) -> Option<&mut u32> {
        let counter = match state {
            TcpState::Closed => &mut self.tcp_closed,
            TcpState::Listen => &mut self.tcp_listen,
            TcpState::SynSent => &mut self.tcp_syn_sent,
            TcpState::SynRecv => &mut self.tcp_syn_recv,
            TcpState::Established => &mut self.tcp_established,
            TcpState::CloseWait => &mut self.tcp_close_wait,
            TcpState::FinWait1 => &mut self.tcp_fin_wait1,
            TcpState::Closing => &mut self.tcp_closing,
            TcpState::LastAck => &mut self.tcp_last_ack,
            TcpState::FinWait2 => &mut self.tcp_fin_wait2,
            TcpState::TimeWait => &mut self.tcp_time_wait,
            TcpState::Unknown => return None,
        };
        Some(counter)
    }
}

impl<'a> FromIterator<&'a SocketRecord> for Summary {
    fn from_iter<I: IntoIterator<Item = &'a SocketRecord>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}
