// Upstream data providers. Everything past this module works on structured records only.
pub mod assets;
pub mod direction;
pub mod fixtures;
pub mod http;
pub mod wiki;
