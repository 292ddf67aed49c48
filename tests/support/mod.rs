pub mod flaky_server;
pub mod h2_server;
pub mod recording;
pub mod socket_guard;
