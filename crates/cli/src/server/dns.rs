use doh_proxy_infrastructure::dns::transport::tcp::{
    read_with_length_prefix, send_with_length_prefix,
};
use doh_proxy_infrastructure::dns::DnsServerHandler;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

const TCP_SESSION_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn start_dns_server(
    socket_addr: SocketAddr,
    handler: Arc<DnsServerHandler>,
    udp: bool,
    tcp: bool,
) -> anyhow::Result<()> {
    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let mut join_set: JoinSet<()> = JoinSet::new();

    if udp {
        let socket = Arc::new(create_udp_socket(domain, socket_addr)?);
        let handler = Arc::clone(&handler);
        info!(bind_address = %socket_addr, "starting udp service");
        join_set.spawn(async move {
            run_udp_worker(socket, handler).await;
        });
    }

    if tcp {
        let listener = create_tcp_listener(domain, socket_addr)?;
        let handler = Arc::clone(&handler);
        info!(bind_address = %socket_addr, "starting tcp service");
        join_set.spawn(async move {
            run_tcp_listener(listener, handler).await;
        });
    }

    if join_set.is_empty() {
        anyhow::bail!("neither UDP nor TCP listeners are enabled");
    }

    while join_set.join_next().await.is_some() {}
    Ok(())
}

async fn run_udp_worker(socket: Arc<UdpSocket>, handler: Arc<DnsServerHandler>) {
    let mut recv_buf = [0u8; 4096];

    loop {
        let (n, from) = match socket.recv_from(&mut recv_buf).await {
            Ok(received) => received,
            Err(e) => {
                error!(error = %e, "UDP recv error");
                continue;
            }
        };

        let query = recv_buf[..n].to_vec();
        let handler = Arc::clone(&handler);
        let socket = Arc::clone(&socket);
        tokio::spawn(async move {
            if let Some(response) = handler.handle(&query).await {
                if let Err(e) = socket.send_to(&response, from).await {
                    error!(client = %from, error = %e, "error writing DNS response");
                }
            }
        });
    }
}

async fn run_tcp_listener(listener: TcpListener, handler: Arc<DnsServerHandler>) {
    loop {
        let (stream, from) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "TCP accept error");
                continue;
            }
        };
        debug!(client = %from, "TCP connection accepted");
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            run_tcp_session(stream, handler).await;
        });
    }
}

/// Serves length-prefixed queries on one connection until the client goes
/// quiet or away.
async fn run_tcp_session(mut stream: TcpStream, handler: Arc<DnsServerHandler>) {
    loop {
        let query =
            match tokio::time::timeout(TCP_SESSION_TIMEOUT, read_with_length_prefix(&mut stream))
                .await
            {
                Ok(Ok(query)) => query,
                Ok(Err(e)) => {
                    debug!(error = %e, "TCP session closed");
                    return;
                }
                Err(_) => {
                    debug!("TCP session idle timeout");
                    return;
                }
            };

        let Some(response) = handler.handle(&query).await else {
            continue;
        };
        if let Err(e) = send_with_length_prefix(&mut stream, &response).await {
            error!(error = %e, "error writing DNS response");
            return;
        }
    }
}

fn create_udp_socket(domain: Domain, socket_addr: SocketAddr) -> anyhow::Result<UdpSocket> {
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(8 * 1024 * 1024)?;
    socket.set_send_buffer_size(4 * 1024 * 1024)?;
    socket.bind(&socket_addr.into())?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

fn create_tcp_listener(domain: Domain, socket_addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = socket.into();
    Ok(TcpListener::from_std(std_listener)?)
}
