//! Twitch API clients: the GraphQL discovery feed and the Helix REST
//! endpoints used for post-broadcast metadata.

pub mod error;
pub mod gql;
pub mod helix;
pub mod images;

pub use error::TwitchApiError;
pub use gql::{GQL_CLIENT_ID, GqlFeed, StreamEdge, StreamNode, StreamsPage};
pub use helix::{HelixClient, HelixGame, HelixUser, HelixVideo};
pub use images::{set_box_art_size, set_profile_image_width};
