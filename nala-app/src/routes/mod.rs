pub mod channels;
pub mod chats;
pub mod health;
pub mod messages;
pub mod status;

use axum::Router;

pub fn router() -> Router {
    Router::new()
        .merge(health::router())
        .merge(channels::router())
        .merge(chats::router())
        .merge(messages::router())
        .merge(status::router())
}
