pub(crate) mod command;
pub(crate) mod wire;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite, BufStream};

use self::wire::Message;
use crate::{
    error::{Error, Result},
    options::ServerAddress,
};

/// A connection to a single server, used exclusively by one operation at a time.
///
/// Implementations own the transport. The write path only needs to hand a framed [`Message`] to
/// the server and, when the message expects one, get the server's reply back.
pub trait Connection: Send {
    /// The address of the server on the other end of this connection.
    fn address(&self) -> &ServerAddress;

    /// Sends `message` without waiting for a reply. Used for the legacy write opcodes and for
    /// OP_MSG with the `moreToCome` flag set.
    fn send_message(&mut self, message: Message) -> BoxFuture<'_, Result<()>>;

    /// Sends `message` and waits for the server's reply to it.
    fn send_and_receive_message(&mut self, message: Message) -> BoxFuture<'_, Result<Message>>;
}

/// A [`Connection`] over any bidirectional byte stream.
#[derive(Debug)]
pub struct StreamConnection<S> {
    address: ServerAddress,
    stream: BufStream<S>,
    max_message_size_bytes: Option<i32>,

    // Set once an I/O error has left the stream at an unknown position; the connection cannot be
    // used afterwards.
    errored: bool,
}

impl<S> StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps `stream`, an established connection to the server at `address`.
    pub fn new(address: ServerAddress, stream: S) -> Self {
        Self {
            address,
            stream: BufStream::new(stream),
            max_message_size_bytes: None,
            errored: false,
        }
    }

    /// Caps the size of the replies this connection accepts, typically at the limit the server
    /// advertised.
    pub fn with_max_message_size_bytes(mut self, max_message_size_bytes: i32) -> Self {
        self.max_message_size_bytes = Some(max_message_size_bytes);
        self
    }

    /// Whether a network error has made this connection unusable.
    pub fn is_errored(&self) -> bool {
        self.errored
    }

    fn check_usable(&self) -> Result<()> {
        if self.errored {
            return Err(Error::internal(format!(
                "connection to {} cannot be used after a network error",
                self.address
            )));
        }
        Ok(())
    }

    async fn write_message(&mut self, message: &Message) -> Result<()> {
        self.check_usable()?;
        let result = message.write_to(&mut self.stream).await;
        self.record(result)
    }

    async fn read_reply(&mut self, request_id: i32) -> Result<Message> {
        let result = Message::read_from(&mut self.stream, self.max_message_size_bytes).await;
        let reply = self.record(result)?;
        if reply.response_to() != request_id {
            self.errored = true;
            return Err(Error::invalid_response(format!(
                "expected a reply to request {}, got a reply to request {}",
                request_id,
                reply.response_to()
            )));
        }
        Ok(reply)
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref error) = result {
            if error.is_network_error() {
                self.errored = true;
            }
        }
        result
    }
}

impl<S> Connection for StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn address(&self) -> &ServerAddress {
        &self.address
    }

    fn send_message(&mut self, message: Message) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.write_message(&message).await })
    }

    fn send_and_receive_message(&mut self, message: Message) -> BoxFuture<'_, Result<Message>> {
        Box::pin(async move {
            self.write_message(&message).await?;
            self.read_reply(message.request_id()).await
        })
    }
}
