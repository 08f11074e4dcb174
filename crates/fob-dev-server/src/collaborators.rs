use crate::hmr::HmrChannel;
use crate::server::{DevServer, DevServerHandle};
use fob_hmr::{ChannelOptions, Collaborators, ServerOptions};

/// Axum dev servers and SSE update channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxumCollaborators;

impl Collaborators for AxumCollaborators {
    type Server = DevServer;
    type Channel = HmrChannel;

    fn create_server(&self, options: ServerOptions) -> DevServer {
        DevServer::new(options)
    }

    fn create_channel(&self, options: ChannelOptions<DevServerHandle>) -> HmrChannel {
        HmrChannel::new(options)
    }
}
