use futures::StreamExt as _;
use futures_util::SinkExt as _;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use crate::protocol::message::{
    AC_STATUS_QUERY, AirTouchCodec, GROUP_NAME_QUERY, GROUP_STATUS_QUERY, verify_checksum,
};
use crate::protocol::{
    self, AcMode, AcStatus, Envelope, GroupStatus, decode_ac_status, decode_group_names,
    decode_group_status, encode_ac_control, encode_group_temperature, unframe,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("lookup of `{1}` failed")]
    LookupHost(#[source] std::io::Error, String),
    #[error("`{0}` did not resolve to any address")]
    NoAddress(String),
    #[error("could not connect to `{1}` over TCP")]
    Connect(#[source] std::io::Error, String),
    #[error("could not send out the request")]
    Send(#[source] std::io::Error),
    #[error("could not read data from the stream")]
    Receive(#[source] std::io::Error),
    #[error("the console closed the connection without replying")]
    Closed,
    #[error("the console did not reply within {0}")]
    Timeout(humantime::Duration),
    #[error("could not process the message")]
    Protocol(#[source] protocol::Error),
}

#[derive(clap::Parser, Clone, Debug)]
#[group(id = "connection::Args")]
pub struct Args {
    /// Address of the AirTouch console, as `host:port` (the console listens on port 9004).
    #[arg(long, short = 'a')]
    pub address: String,

    /// Give up on a request if the console hasn't replied in this amount of time.
    ///
    /// This covers connecting, sending the request and reading the reply.
    #[arg(long, default_value = "5s")]
    pub timeout: humantime::Duration,

    /// Reject replies whose checksum does not match their contents.
    ///
    /// By default a mismatch is only logged.
    #[arg(long)]
    pub verify_checksum: bool,
}

type ConsoleIo = Framed<TcpStream, AirTouchCodec>;

/// Request/reply exchange with the console.
///
/// Every request is sent over a fresh TCP connection, which is closed once the reply is read.
pub struct Connection {
    args: Args,
}

impl Connection {
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    /// Send a complete frame and wait for the single frame the console replies with.
    pub async fn send(&self, frame: &[u8]) -> Result<Envelope, Error> {
        let raw = tokio::time::timeout(*self.args.timeout, self.exchange(frame))
            .await
            .map_err(|_| Error::Timeout(self.args.timeout))??;
        match verify_checksum(&raw) {
            Ok(()) => {}
            Err(e) if self.args.verify_checksum => return Err(Error::Protocol(e)),
            Err(e) => warn!(message = "reply checksum", error = (&e as &dyn std::error::Error)),
        }
        unframe(&raw).map_err(Error::Protocol)
    }

    async fn exchange(&self, frame: &[u8]) -> Result<Vec<u8>, Error> {
        let mut io = self.connect().await?;
        trace!(message = "sending", frame = ?frame);
        io.send(frame).await.map_err(Error::Send)?;
        let reply = io.next().await.ok_or(Error::Closed)?.map_err(Error::Receive)?;
        trace!(message = "received", reply = ?reply);
        Ok(reply)
    }

    async fn connect(&self) -> Result<ConsoleIo, Error> {
        let address = &self.args.address;
        debug!(message = "connecting...", address);
        let addresses = tokio::net::lookup_host(address)
            .await
            .map_err(|e| Error::LookupHost(e, address.to_string()))?
            .collect::<Vec<_>>();
        debug!(message = "resolved", ?addresses);
        if addresses.is_empty() {
            return Err(Error::NoAddress(address.to_string()));
        }
        let socket = TcpStream::connect(&*addresses)
            .await
            .map_err(|e| Error::Connect(e, address.to_string()))?;
        let nodelay_result = socket.set_nodelay(true);
        trace!(message = "setting nodelay", is_error = ?nodelay_result.err());
        info!(message = "connected", address);
        Ok(Framed::new(socket, AirTouchCodec::default()))
    }

    pub async fn ac_status(&self) -> Result<AcStatus, Error> {
        let reply = self.send(&AC_STATUS_QUERY).await?;
        decode_ac_status(reply.payload()).map_err(Error::Protocol)
    }

    /// Status of up to `limit` groups, without their names.
    pub async fn group_status(&self, limit: usize) -> Result<Vec<GroupStatus>, Error> {
        let reply = self.send(&GROUP_STATUS_QUERY).await?;
        decode_group_status(reply.payload(), limit).map_err(Error::Protocol)
    }

    /// Status of up to `limit` groups, including their names.
    pub async fn groups(&self, limit: usize) -> Result<Vec<GroupStatus>, Error> {
        // Names are assigned to the groups the status reply created.
        let mut groups = self.group_status(limit).await?;
        let reply = self.send(&GROUP_NAME_QUERY).await?;
        decode_group_names(reply.payload(), &mut groups, limit).map_err(Error::Protocol)?;
        Ok(groups)
    }

    /// Switch the AC to `mode`. The console replies with the updated AC status.
    pub async fn set_mode(&self, mode: AcMode) -> Result<AcStatus, Error> {
        info!(message = "switching AC mode", %mode);
        let frame = encode_ac_control(mode).map_err(Error::Protocol)?;
        let reply = self.send(&frame).await?;
        decode_ac_status(reply.payload()).map_err(Error::Protocol)
    }

    /// Set the target temperature of a group. The console replies with the group status.
    pub async fn set_group_temperature(
        &self,
        group_number: u8,
        setpoint: u64,
        limit: usize,
    ) -> Result<Vec<GroupStatus>, Error> {
        info!(message = "setting group temperature", group_number, setpoint);
        let frame = encode_group_temperature(group_number, setpoint).map_err(Error::Protocol)?;
        let reply = self.send(&frame).await?;
        decode_group_status(reply.payload(), limit).map_err(Error::Protocol)
    }
}
