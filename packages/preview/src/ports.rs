// ABOUTME: Free local port discovery for a dev server that has not started yet
// ABOUTME: Uses OS-assigned ephemeral ports and skips ports browsers refuse to load

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::net::TcpListener;
use tracing::debug;

/// Ports Chromium-based browsers refuse to navigate to, sorted ascending
pub const UNSAFE_PORTS: &[u16] = &[
    1,     // tcpmux
    7,     // echo
    9,     // discard
    11,    // systat
    13,    // daytime
    15,    // netstat
    17,    // qotd
    19,    // chargen
    20,    // ftp data
    21,    // ftp access
    22,    // ssh
    23,    // telnet
    25,    // smtp
    37,    // time
    42,    // name
    43,    // nicname
    53,    // domain
    69,    // tftp
    77,    // priv-rjs
    79,    // finger
    87,    // ttylink
    95,    // supdup
    101,   // hostname
    102,   // iso-tsap
    103,   // gppitnp
    104,   // acr-nema
    109,   // pop2
    110,   // pop3
    111,   // sunrpc
    113,   // auth
    115,   // sftp
    117,   // uucp-path
    119,   // nntp
    123,   // ntp
    135,   // loc-srv / epmap
    137,   // netbios
    139,   // netbios
    143,   // imap2
    161,   // snmp
    179,   // bgp
    389,   // ldap
    427,   // slp
    465,   // smtp+ssl
    512,   // print / exec
    513,   // login
    514,   // shell
    515,   // printer
    526,   // tempo
    530,   // courier
    531,   // chat
    532,   // netnews
    540,   // uucp
    548,   // afp
    554,   // rtsp
    556,   // remotefs
    563,   // nntp+ssl
    587,   // smtp submission
    601,   // syslog-conn
    636,   // ldap+ssl
    989,   // ftps-data
    990,   // ftps
    993,   // imap+ssl
    995,   // pop3+ssl
    1719,  // h323gatestat
    1720,  // h323hostcall
    1723,  // pptp
    2049,  // nfs
    3659,  // apple-sasl
    4045,  // lockd
    4190,  // sieve
    5060,  // sip
    5061,  // sips
    6000,  // x11
    6566,  // sane-port
    6665,  // irc (alternate)
    6666,  // irc (alternate)
    6667,  // irc (default)
    6668,  // irc (alternate)
    6669,  // irc (alternate)
    6679,  // osaut
    6697,  // irc+tls
    10080, // amanda
];

static UNSAFE_PORT_SET: Lazy<HashSet<u16>> = Lazy::new(|| UNSAFE_PORTS.iter().copied().collect());

/// Whether browsers will refuse to load a page served on `port`
pub fn is_unsafe_port(port: u16) -> bool {
    UNSAFE_PORT_SET.contains(&port)
}

/// Pick a free loopback port for a server that is about to start.
///
/// Binds `127.0.0.1:0`, reads back the port the OS assigned and releases the
/// listener. Candidates on the unsafe list are discarded and the loop tries
/// again; there is no attempt cap because the OS almost never hands those out.
pub fn suggest_port() -> std::io::Result<u16> {
    loop {
        let port = {
            let listener = TcpListener::bind(("127.0.0.1", 0))?;
            listener.local_addr()?.port()
        };

        if !is_unsafe_port(port) {
            debug!("Suggesting free port {}", port);
            return Ok(port);
        }
        debug!("Skipping unsafe ephemeral port {}", port);
    }
}
