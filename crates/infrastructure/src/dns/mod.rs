pub mod bootstrap;
pub mod cache;
pub mod clock;
pub mod doh;
pub mod hosts;
pub mod server;
pub mod transport;

pub use bootstrap::BootstrapResolver;
pub use cache::ResponseCache;
pub use doh::{DohProvider, DohProviderOptions};
pub use hosts::HostsFileProvider;
pub use server::DnsServerHandler;
