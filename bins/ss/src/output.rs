//! Output formatting for ss command.

use procsock::{SocketRecord, Summary};
use std::io::{self, Write};

/// Column widths, as Linux `ss` lays the table out.
const COL_NETID: usize = 6;
const COL_STATE: usize = 12;
const COL_RECVQ: usize = 8;
const COL_SENDQ: usize = 8;
const COL_LOCAL: usize = 40;
const COL_REMOTE: usize = 40;
const COL_PROCESS: usize = 30;

/// Display options for socket output.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayOptions {
    /// Show processes.
    pub processes: bool,
    /// Show extended info.
    pub extended: bool,
    /// Don't show header.
    pub no_header: bool,
}

/// Print sockets in JSON format.
pub fn print_json(sockets: &[SocketRecord], opts: &DisplayOptions) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_json(&mut handle, sockets, opts)
}

/// Write sockets as a JSON array.
pub fn write_json(
    w: &mut impl Write,
    sockets: &[SocketRecord],
    opts: &DisplayOptions,
) -> io::Result<()> {
    let json_sockets: Vec<_> = sockets.iter().map(|s| socket_to_json(s, opts)).collect();
    serde_json::to_writer_pretty(&mut *w, &json_sockets)?;
    writeln!(w)?;
    Ok(())
}

fn socket_to_json(sock: &SocketRecord, opts: &DisplayOptions) -> serde_json::Value {
    let mut json = serde_json::json!({
        "netid": sock.protocol.netid(),
        "family": sock.family.name(),
        "state": sock.state_name(),
        "recv_q": sock.recv_queue_bytes,
        "send_q": sock.send_queue_bytes,
        "local": sock.local_address,
        "peer": sock.remote_address,
    });

    if sock.family.is_inet() {
        json["local_port"] = serde_json::Value::Number(sock.local_port.into());
        json["peer_port"] = serde_json::Value::Number(sock.remote_port.into());
    }

    if !sock.unix_path.is_empty() {
        json["path"] = serde_json::Value::String(sock.unix_path.clone());
    }

    if opts.processes {
        json["process"] = serde_json::json!({
            "name": sock.process_name.as_deref().unwrap_or("?"),
            "pid": sock.owner_pid,
            "fd": sock.owner_fd,
        });
    }

    if opts.extended {
        json["pid"] = serde_json::Value::Number(sock.owner_pid.into());
        json["uid"] = serde_json::Value::Number(sock.uid.into());
        json["inode"] = serde_json::Value::Number(sock.inode.into());
    }

    json
}

/// Print sockets in text format.
pub fn print_text(sockets: &[SocketRecord], opts: &DisplayOptions) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_text(&mut handle, sockets, opts)
}

/// Write sockets as a table.
pub fn write_text(
    w: &mut impl Write,
    sockets: &[SocketRecord],
    opts: &DisplayOptions,
) -> io::Result<()> {
    if !opts.no_header {
        write_header(w, opts)?;
    }
    for sock in sockets {
        write_socket(w, sock, opts)?;
    }
    Ok(())
}

fn write_header(w: &mut impl Write, opts: &DisplayOptions) -> io::Result<()> {
    write!(
        w,
        "{:<COL_NETID$} {:<COL_STATE$} {:>COL_RECVQ$} {:>COL_SENDQ$} {:<COL_LOCAL$} {:<COL_REMOTE$}",
        "Netid", "State", "Recv-Q", "Send-Q", "Local Address:Port", "Peer Address:Port"
    )?;
    if opts.processes {
        write!(w, " {:<COL_PROCESS$}", "Process")?;
    }
    if opts.extended {
        write!(w, " {:<8}", "PID")?;
    }
    writeln!(w)
}

fn write_socket(w: &mut impl Write, sock: &SocketRecord, opts: &DisplayOptions) -> io::Result<()> {
    write!(
        w,
        "{:<COL_NETID$} {:<COL_STATE$} {:>COL_RECVQ$} {:>COL_SENDQ$} {:<COL_LOCAL$} {:<COL_REMOTE$}",
        sock.protocol.netid(),
        sock.state_name(),
        sock.recv_queue_bytes,
        sock.send_queue_bytes,
        sock.local_address,
        sock.remote_address
    )?;

    // Linux ss format: users:(("name",pid=123,fd=4))
    if opts.processes {
        if sock.owner_pid > 0 {
            write!(
                w,
                " users:((\"{}\",pid={},fd={}))",
                sock.process_name.as_deref().unwrap_or("?"),
                sock.owner_pid,
                sock.owner_fd
            )?;
        } else {
            write!(w, " ")?;
        }
    }

    if opts.extended {
        if sock.owner_pid > 0 {
            write!(w, " {:<8}", sock.owner_pid)?;
        } else {
            write!(w, " {:<8}", "-")?;
        }
    }

    writeln!(w)
}

/// Print summary statistics.
pub fn print_summary(summary: &Summary, json: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if json {
        write_summary_json(&mut handle, summary)
    } else {
        write_summary_text(&mut handle, summary)
    }
}

/// Write summary statistics as text.
pub fn write_summary_text(w: &mut impl Write, summary: &Summary) -> io::Result<()> {
    writeln!(w, "Total: {}", summary.total())?;
    writeln!(w)?;

    if summary.tcp_total > 0 {
        writeln!(
            w,
            "TCP:   {} (estab {}, closed {}, timewait {}, listen {})",
            summary.tcp_total,
            summary.tcp_established,
            summary.tcp_closed,
            summary.tcp_time_wait,
            summary.tcp_listen
        )?;

        if summary.tcp_transient() > 0 {
            writeln!(
                w,
                "       syn-sent: {}, syn-recv: {}",
                summary.tcp_syn_sent, summary.tcp_syn_recv
            )?;
            writeln!(
                w,
                "       fin-wait1: {}, fin-wait2: {}",
                summary.tcp_fin_wait1, summary.tcp_fin_wait2
            )?;
            writeln!(
                w,
                "       close-wait: {}, last-ack: {}, closing: {}",
                summary.tcp_close_wait, summary.tcp_last_ack, summary.tcp_closing
            )?;
        }
    }

    if summary.udp_total > 0 {
        writeln!(w, "UDP:   {}", summary.udp_total)?;
    }

    if summary.unix_total() > 0 {
        writeln!(
            w,
            "UNIX:  {} (stream: {}, dgram: {})",
            summary.unix_total(),
            summary.unix_stream_total,
            summary.unix_dgram_total
        )?;
    }

    Ok(())
}

/// Write summary statistics as JSON.
pub fn write_summary_json(w: &mut impl Write, summary: &Summary) -> io::Result<()> {
    let json = serde_json::json!({
        "total": summary.total(),
        "tcp": {
            "total": summary.tcp_total,
            "estab": summary.tcp_established,
            "closed": summary.tcp_closed,
            "timewait": summary.tcp_time_wait,
            "listen": summary.tcp_listen,
            "syn_sent": summary.tcp_syn_sent,
            "syn_recv": summary.tcp_syn_recv,
            "fin_wait1": summary.tcp_fin_wait1,
            "fin_wait2": summary.tcp_fin_wait2,
            "close_wait": summary.tcp_close_wait,
            "last_ack": summary.tcp_last_ack,
            "closing": summary.tcp_closing,
        },
        "udp": summary.udp_total,
        "unix": {
            "total": summary.unix_total(),
            "stream": summary.unix_stream_total,
            "dgram": summary.unix_dgram_total,
        },
    });
    serde_json::to_writer_pretty(&mut *w, &json)?;
    writeln!(w)?;
    Ok(())
}
